//! Read side of the chunk store shared by embed, search and synth.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::warn;
use walkdir::WalkDir;

use crate::error::PipelineError;
use crate::model::ChunkRecord;
use crate::util::read_json;

/// Every chunk record below `root`, ordered by (document, relative path,
/// chunk index). Manifests and other `_`-prefixed files are skipped;
/// unreadable records are logged and skipped. A missing root yields no
/// records. Symlinks are not followed.
pub fn load_chunk_records(root: &Path) -> Result<Vec<ChunkRecord>> {
    let mut records = Vec::new();
    if !root.is_dir() {
        return Ok(records);
    }

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        if name.starts_with('_') || !name.ends_with(".json") {
            continue;
        }

        match read_json::<ChunkRecord>(entry.path()) {
            Ok(record) => records.push(record),
            Err(error) => {
                let error = PipelineError::MalformedRecord {
                    path: entry.path().to_path_buf(),
                    reason: format!("{error:#}"),
                };
                warn!(error = %error, "skipping chunk record");
            }
        }
    }

    records.sort_by(|left, right| {
        left.source_document
            .cmp(&right.source_document)
            .then_with(|| left.relative_path.cmp(&right.relative_path))
            .then(left.chunk_index.cmp(&right.chunk_index))
            .then_with(|| left.id.cmp(&right.id))
    });
    Ok(records)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    use tempfile::TempDir;

    use crate::util::write_json_pretty;

    fn record(document: &str, index: usize) -> ChunkRecord {
        ChunkRecord {
            id: format!("{document}_chunk_{index:04}"),
            project_name: None,
            source_document: document.to_string(),
            relative_path: None,
            section: None,
            page_start: 1,
            page_end: 1,
            raw_text: format!("text of {document} {index}"),
            token_count_estimate: 4,
            chunk_index: index,
            total_chunks: 2,
            created_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn loads_records_recursively_in_document_order() {
        let dir = TempDir::new().expect("tempdir");
        let root = dir.path();
        for (sub, doc, index) in [("b", "beta", 2), ("b", "beta", 1), ("a/deep", "alpha", 1)] {
            let record = record(doc, index);
            write_json_pretty(&root.join(sub).join(format!("{}.json", record.id)), &record)
                .expect("write");
        }
        fs::write(root.join("b/_chunking_metadata.json"), "{}").expect("manifest");
        fs::write(root.join("b/notes.txt"), "ignored").expect("notes");
        fs::write(root.join("a/broken.json"), "{ not json").expect("broken");

        let records = load_chunk_records(root).expect("load");
        let ids = records.iter().map(|r| r.id.as_str()).collect::<Vec<&str>>();

        assert_eq!(ids, vec!["alpha_chunk_0001", "beta_chunk_0001", "beta_chunk_0002"]);
    }

    #[test]
    fn same_named_documents_stay_grouped_by_project() {
        let dir = TempDir::new().expect("tempdir");
        for (project, index) in [("ProjB", 1), ("ProjA", 2), ("ProjA", 1), ("ProjB", 2)] {
            let mut record = record("manual", index);
            record.relative_path = Some(project.to_string());
            write_json_pretty(
                &dir.path().join(project).join("manual").join(format!("{}.json", record.id)),
                &record,
            )
            .expect("write");
        }

        let records = load_chunk_records(dir.path()).expect("load");
        let order = records
            .iter()
            .map(|r| (r.relative_path.as_deref().unwrap_or_default(), r.chunk_index))
            .collect::<Vec<(&str, usize)>>();

        assert_eq!(order, vec![("ProjA", 1), ("ProjA", 2), ("ProjB", 1), ("ProjB", 2)]);
    }

    #[test]
    fn missing_root_is_empty() {
        let dir = TempDir::new().expect("tempdir");
        assert!(load_chunk_records(&dir.path().join("absent")).expect("load").is_empty());
    }
}
