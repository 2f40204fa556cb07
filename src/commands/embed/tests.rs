use super::*;

use tempfile::TempDir;

use crate::error::PipelineError;
use crate::governance::is_refusal;
use crate::layout::ProjectLayout;
use crate::semantic::{DEFAULT_EMBEDDING_DIM, DEFAULT_MODEL_ID, SemanticModelConfig};
use crate::util::{read_json, write_json_pretty};

struct AxisEmbedder {
    config: SemanticModelConfig,
}

impl AxisEmbedder {
    fn new() -> Self {
        Self {
            config: SemanticModelConfig {
                model_id: "axis-3".to_string(),
                model_name: "axis".to_string(),
                dimensions: 3,
                normalization: "none".to_string(),
                backend: "test".to_string(),
            },
        }
    }
}

impl Embedder for AxisEmbedder {
    fn config(&self) -> &SemanticModelConfig {
        &self.config
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, PipelineError> {
        if text.contains("offline") {
            return Err(PipelineError::UpstreamUnavailable {
                service: "axis".to_string(),
                reason: "offline".to_string(),
            });
        }
        Ok(vec![text.len() as f32, 0.0, 1.0])
    }
}

fn record(document: &str, index: usize, text: &str) -> ChunkRecord {
    ChunkRecord {
        id: format!("{document}_chunk_{index:04}"),
        project_name: Some("Fleet".to_string()),
        source_document: document.to_string(),
        relative_path: Some("Fleet".to_string()),
        section: Some("Scope".to_string()),
        page_start: 2,
        page_end: 3,
        raw_text: text.to_string(),
        token_count_estimate: 10,
        chunk_index: index,
        total_chunks: 2,
        created_at: "2026-01-01T00:00:00Z".to_string(),
    }
}

struct Workspace {
    _dir: TempDir,
    layout: ProjectLayout,
    policy: GovernancePolicy,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let layout = ProjectLayout::new(dir.path());
        let policy = GovernancePolicy::for_layout(&layout);
        Self {
            _dir: dir,
            layout,
            policy,
        }
    }

    fn add_chunk(&self, record: &ChunkRecord) {
        let path = self
            .layout
            .chunks
            .join(&record.source_document)
            .join(format!("{}.json", record.id));
        write_json_pretty(&path, record).expect("write chunk");
    }
}

#[test]
fn builds_database_ids_metadata_and_marker() {
    let ws = Workspace::new();
    ws.add_chunk(&record("manual", 2, "second chunk about brakes"));
    ws.add_chunk(&record("manual", 1, "first chunk about brakes"));
    ws.add_chunk(&record("guide", 1, "guide chunk"));

    let embedder = LocalHashEmbedder::new(DEFAULT_MODEL_ID);
    let metadata = build_index(&ws.layout.chunks, &ws.layout.index, &embedder, false, &ws.policy)
        .expect("build")
        .expect("built");

    assert_eq!(metadata.chunk_count, 3);
    assert_eq!(metadata.embedding_dimension, DEFAULT_EMBEDDING_DIM);
    assert!(!metadata.is_truth);
    assert!(metadata.regenerable);
    assert!(ws.layout.index.join(INDEX_MARKER_FILE).is_file());

    let ids: Vec<String> =
        read_json(&ws.layout.index.join(INDEX_CHUNK_IDS_FILE)).expect("chunk ids");
    assert_eq!(
        ids,
        vec!["guide_chunk_0001", "manual_chunk_0001", "manual_chunk_0002"]
    );

    let stored: IndexMetadata =
        read_json(&ws.layout.index.join(INDEX_METADATA_FILE)).expect("metadata");
    assert_eq!(stored.model, DEFAULT_MODEL_ID);

    let (model_id, chunks) = load_index(&ws.layout.index.join(INDEX_DB_FILE)).expect("load");
    assert_eq!(model_id, DEFAULT_MODEL_ID);
    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[1].chunk_id, "manual_chunk_0001");
    assert_eq!(chunks[1].section.as_deref(), Some("Scope"));
    assert_eq!((chunks[1].page_start, chunks[1].page_end), (2, 3));
    assert_eq!(chunks[1].embedding.len(), DEFAULT_EMBEDDING_DIM);
}

#[test]
fn same_named_documents_in_different_projects_are_all_indexed() {
    let ws = Workspace::new();
    for project in ["ProjA", "ProjB"] {
        let mut chunk = record("manual", 1, &format!("{project} brake notes"));
        chunk.project_name = Some(project.to_string());
        chunk.relative_path = Some(project.to_string());
        let path = ws
            .layout
            .chunks
            .join(project)
            .join("manual")
            .join(format!("{}.json", chunk.id));
        write_json_pretty(&path, &chunk).expect("write chunk");
    }

    let embedder = AxisEmbedder::new();
    let metadata = build_index(&ws.layout.chunks, &ws.layout.index, &embedder, false, &ws.policy)
        .expect("build")
        .expect("built");
    assert_eq!(metadata.chunk_count, 2);

    let ids: Vec<String> =
        read_json(&ws.layout.index.join(INDEX_CHUNK_IDS_FILE)).expect("chunk ids");
    assert_eq!(ids, vec!["manual_chunk_0001", "manual_chunk_0001"]);

    let (_, chunks) = load_index(&ws.layout.index.join(INDEX_DB_FILE)).expect("load");
    let projects = chunks
        .iter()
        .map(|chunk| (chunk.project_name.as_deref(), chunk.raw_text.as_str()))
        .collect::<Vec<(Option<&str>, &str)>>();
    assert_eq!(
        projects,
        vec![
            (Some("ProjA"), "ProjA brake notes"),
            (Some("ProjB"), "ProjB brake notes"),
        ]
    );
}

#[test]
fn existing_index_is_kept_unless_forced() {
    let ws = Workspace::new();
    ws.add_chunk(&record("manual", 1, "first"));
    let embedder = AxisEmbedder::new();

    build_index(&ws.layout.chunks, &ws.layout.index, &embedder, false, &ws.policy)
        .expect("first build")
        .expect("built");

    ws.add_chunk(&record("manual", 2, "second"));
    let skipped = build_index(&ws.layout.chunks, &ws.layout.index, &embedder, false, &ws.policy)
        .expect("second build");
    assert!(skipped.is_none());
    let (_, chunks) = load_index(&ws.layout.index.join(INDEX_DB_FILE)).expect("load");
    assert_eq!(chunks.len(), 1);

    let rebuilt = build_index(&ws.layout.chunks, &ws.layout.index, &embedder, true, &ws.policy)
        .expect("forced build")
        .expect("rebuilt");
    assert_eq!(rebuilt.chunk_count, 2);

    let (model_id, chunks) = load_index(&ws.layout.index.join(INDEX_DB_FILE)).expect("load");
    assert_eq!(model_id, "axis-3");
    assert_eq!(chunks[1].embedding, vec!["Scope\n\nsecond".len() as f32, 0.0, 1.0]);
}

#[test]
fn empty_chunk_store_is_an_error() {
    let ws = Workspace::new();
    let embedder = AxisEmbedder::new();

    let error = build_index(&ws.layout.chunks, &ws.layout.index, &embedder, false, &ws.policy)
        .expect_err("no chunks");

    assert!(format!("{error:#}").contains("no chunk records found"));
    assert!(!ws.layout.index.exists());
}

#[test]
fn embedder_failure_aborts_before_writing() {
    let ws = Workspace::new();
    ws.add_chunk(&record("manual", 1, "service offline"));
    let embedder = AxisEmbedder::new();

    let error = build_index(&ws.layout.chunks, &ws.layout.index, &embedder, false, &ws.policy)
        .expect_err("embedder offline");

    assert!(matches!(
        error.downcast_ref::<PipelineError>(),
        Some(PipelineError::UpstreamUnavailable { .. })
    ));
    assert!(!ws.layout.index.exists());
}

#[test]
fn protected_index_location_is_refused() {
    let ws = Workspace::new();
    ws.add_chunk(&record("manual", 1, "first"));
    let embedder = AxisEmbedder::new();
    let target = ws.layout.procedures.join("index");

    let error = build_index(&ws.layout.chunks, &target, &embedder, false, &ws.policy)
        .expect_err("refused");

    assert!(is_refusal(&error));
    assert!(!target.exists());
}
