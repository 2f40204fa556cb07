use std::path::PathBuf;

/// Failures the pipeline distinguishes from plain I/O trouble.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("no page files found in {}", path.display())]
    InputMissing { path: PathBuf },

    #[error("malformed record {}: {reason}", path.display())]
    MalformedRecord { path: PathBuf, reason: String },

    #[error(
        "REFUSED: {} is protected curated knowledge ({rule}); edit it by hand or write to a drafts directory",
        path.display()
    )]
    GovernanceRefusal { path: PathBuf, rule: String },

    #[error("{service} unavailable: {reason}")]
    UpstreamUnavailable { service: String, reason: String },
}

impl PipelineError {
    pub fn is_refusal(&self) -> bool {
        matches!(self, Self::GovernanceRefusal { .. })
    }
}
