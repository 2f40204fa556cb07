use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::cli::StatusArgs;
use crate::governance::{DRAFT_PREFIX, GovernancePolicy};
use crate::layout::{CHUNKING_METADATA_FILE, INDEX_DB_FILE, INDEX_METADATA_FILE, ProjectLayout};
use crate::model::{ChunkingManifest, IndexMetadata};
use crate::util::read_json;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectStatus {
    pub pdf_files: usize,
    pub page_files: usize,
    pub chunk_files: usize,
    pub chunks_recorded: usize,
    pub failed_documents: usize,
    pub index_present: bool,
    pub indexed_chunks: Option<usize>,
    pub drafts: usize,
    pub curated_files: usize,
}

pub fn run(args: StatusArgs) -> Result<()> {
    let (layout, policy) = args.project.resolve()?;
    info!(
        root = %layout.root.display(),
        protection_rules = policy.rules().len(),
        "status requested"
    );

    let status = collect_status(&layout, &policy)?;

    info!(
        path = %layout.sources.display(),
        pdf_files = status.pdf_files,
        "sources"
    );
    info!(
        path = %layout.extracted.display(),
        page_files = status.page_files,
        "extracted pages"
    );
    info!(
        path = %layout.chunks.display(),
        chunk_files = status.chunk_files,
        chunks_recorded = status.chunks_recorded,
        failed_documents = status.failed_documents,
        "chunks"
    );
    if status.index_present {
        info!(
            path = %layout.index.display(),
            indexed_chunks = status.indexed_chunks.unwrap_or_default(),
            "index present (not truth)"
        );
    } else {
        warn!(path = %layout.index.display(), "index missing");
    }
    info!(path = %layout.drafts.display(), drafts = status.drafts, "drafts awaiting review");
    info!(
        synth = %layout.synth.display(),
        topics = %layout.topics.display(),
        curated_files = status.curated_files,
        "curated knowledge (never written by the pipeline)"
    );

    Ok(())
}

pub fn collect_status(layout: &ProjectLayout, policy: &GovernancePolicy) -> Result<ProjectStatus> {
    let mut status = ProjectStatus::default();

    walk_files(&layout.sources, &mut |_, name| {
        if Path::new(name)
            .extension()
            .and_then(|extension| extension.to_str())
            .is_some_and(|extension| extension.eq_ignore_ascii_case("pdf"))
        {
            status.pdf_files += 1;
        }
    })?;

    walk_files(&layout.extracted, &mut |_, name| {
        if name.starts_with("page_") && name.ends_with(".md") {
            status.page_files += 1;
        }
    })?;

    let mut manifests = Vec::new();
    walk_files(&layout.chunks, &mut |path, name| {
        if name == CHUNKING_METADATA_FILE {
            manifests.push(path.to_path_buf());
        } else if !name.starts_with('_') && name.ends_with(".json") {
            status.chunk_files += 1;
        }
    })?;
    for manifest_path in manifests {
        match read_json::<ChunkingManifest>(&manifest_path) {
            Ok(manifest) if manifest.error.is_some() => status.failed_documents += 1,
            Ok(manifest) => status.chunks_recorded += manifest.chunks_created,
            Err(error) => {
                warn!(path = %manifest_path.display(), error = %format!("{error:#}"), "unreadable manifest")
            }
        }
    }

    status.index_present = layout.index.join(INDEX_DB_FILE).is_file();
    let metadata_path = layout.index.join(INDEX_METADATA_FILE);
    if status.index_present && metadata_path.is_file() {
        status.indexed_chunks = read_json::<IndexMetadata>(&metadata_path)
            .map(|metadata| metadata.chunk_count)
            .ok();
    }

    walk_files(&layout.drafts, &mut |_, name| {
        if name.starts_with(DRAFT_PREFIX) && name.ends_with(".md") {
            status.drafts += 1;
        }
    })?;

    for curated_root in [&layout.synth, &layout.topics] {
        walk_files(curated_root, &mut |path, _| {
            if !policy.classify(path).is_allowed() {
                status.curated_files += 1;
            }
        })?;
    }

    Ok(status)
}

fn walk_files(dir: &Path, visit: &mut dyn FnMut(&Path, &str)) -> Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to walk {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            visit(entry.path(), name);
        }
    }

    Ok(())
}
