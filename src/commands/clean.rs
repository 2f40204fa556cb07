use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::cli::CleanArgs;
use crate::governance::{DRAFT_PREFIX, GovernancePolicy, is_refusal};
use crate::layout::ProjectLayout;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanSummary {
    pub removed: usize,
    pub refused: usize,
    pub failed: usize,
}

impl CleanSummary {
    fn absorb(&mut self, other: CleanSummary) {
        self.removed += other.removed;
        self.refused += other.refused;
        self.failed += other.failed;
    }
}

pub fn run(args: CleanArgs) -> Result<()> {
    let (layout, policy) = args.project.resolve()?;

    info!(root = %layout.root.display(), all = args.all, "cleaning regenerable artifacts");
    let summary = clean_project(&layout, &policy, args.all)?;

    info!(
        removed = summary.removed,
        refused = summary.refused,
        failed = summary.failed,
        "clean completed"
    );

    Ok(())
}

/// Empties the regenerable directories and, with `include_drafts`, removes
/// `DRAFT_*.md` files from the drafts directory. Sources and curated
/// knowledge are never visited.
pub fn clean_project(
    layout: &ProjectLayout,
    policy: &GovernancePolicy,
    include_drafts: bool,
) -> Result<CleanSummary> {
    let mut summary = CleanSummary::default();

    for directory in [&layout.extracted, &layout.chunks, &layout.index] {
        let cleaned = clean_directory(directory, policy)?;
        info!(
            path = %directory.display(),
            removed = cleaned.removed,
            "cleaned directory"
        );
        summary.absorb(cleaned);
    }

    if include_drafts {
        let cleaned = clean_drafts(&layout.drafts, policy)?;
        info!(path = %layout.drafts.display(), removed = cleaned.removed, "cleaned drafts");
        summary.absorb(cleaned);
    }

    Ok(summary)
}

/// Removes everything below `directory`, keeping the directory itself.
/// Links are never followed: a symlink is deleted as a link, whatever it
/// points at.
pub fn clean_directory(directory: &Path, policy: &GovernancePolicy) -> Result<CleanSummary> {
    let mut summary = CleanSummary::default();
    if !directory.is_dir() {
        return Ok(summary);
    }

    let walker = WalkDir::new(directory)
        .min_depth(1)
        .contents_first(true)
        .sort_by_file_name();
    for entry in walker {
        let entry = entry.with_context(|| format!("failed to walk {}", directory.display()))?;
        if entry.file_type().is_dir() {
            if let Err(error) = fs::remove_dir(entry.path()) {
                warn!(path = %entry.path().display(), error = %error, "directory left in place");
            }
        } else {
            remove_one(entry.path(), policy, &mut summary);
        }
    }

    Ok(summary)
}

/// Removes `DRAFT_*.md` files directly inside `drafts`.
pub fn clean_drafts(drafts: &Path, policy: &GovernancePolicy) -> Result<CleanSummary> {
    let mut summary = CleanSummary::default();
    if !drafts.is_dir() {
        return Ok(summary);
    }

    let walker = WalkDir::new(drafts)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();
    for entry in walker {
        let entry = entry.with_context(|| format!("failed to walk {}", drafts.display()))?;
        let is_draft = entry.file_type().is_file()
            && entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(DRAFT_PREFIX) && name.ends_with(".md"));
        if is_draft {
            remove_one(entry.path(), policy, &mut summary);
        }
    }

    Ok(summary)
}

fn remove_one(path: &Path, policy: &GovernancePolicy, summary: &mut CleanSummary) {
    match policy.remove_file(path) {
        Ok(()) => summary.removed += 1,
        Err(error) if is_refusal(&error) => {
            warn!(path = %path.display(), error = %error, "refused to delete");
            summary.refused += 1;
        }
        Err(error) => {
            warn!(path = %path.display(), error = %format!("{error:#}"), "could not delete");
            summary.failed += 1;
        }
    }
}
