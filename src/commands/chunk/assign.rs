use super::*;

/// Provenance stamped onto every chunk of one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentIdentity {
    pub name: String,
    pub project_name: Option<String>,
    pub relative_path: Option<String>,
}

impl DocumentIdentity {
    pub fn from_provenance(directory_name: &str, provenance: DocumentProvenance) -> Self {
        Self {
            name: provenance
                .source_document
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| directory_name.to_string()),
            project_name: provenance.project_name,
            relative_path: provenance.relative_path,
        }
    }
}

/// `<document>_chunk_<index>` with a 4-digit zero-padded, 1-based index.
/// Past 9999 the padding stops holding and ids lose their sort order.
pub fn chunk_id(document: &str, chunk_index: usize) -> String {
    format!("{document}_chunk_{chunk_index:04}")
}

/// Stamps ids, indices and provenance in list order. Only `created_at`
/// depends on anything but the input.
pub fn assign_records(identity: &DocumentIdentity, chunks: Vec<CandidateChunk>) -> Vec<ChunkRecord> {
    let total_chunks = chunks.len();

    chunks
        .into_iter()
        .enumerate()
        .map(|(offset, chunk)| {
            let chunk_index = offset + 1;
            ChunkRecord {
                id: chunk_id(&identity.name, chunk_index),
                project_name: identity.project_name.clone(),
                source_document: identity.name.clone(),
                relative_path: identity.relative_path.clone(),
                section: chunk.section,
                page_start: chunk.page_start,
                page_end: chunk.page_end,
                raw_text: chunk.text,
                token_count_estimate: chunk.token_estimate,
                chunk_index,
                total_chunks,
                created_at: now_utc_string(),
            }
        })
        .collect()
}
