use serde::{Deserialize, Serialize};

/// `_extraction_metadata.json`, one per extracted document directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionMetadata {
    pub source_document: String,
    pub source_file: String,
    pub source_hash: Option<String>,
    pub project_name: Option<String>,
    pub relative_path: Option<String>,
    pub extraction_time: String,
    pub extractor: String,
    pub extractor_version: String,
    pub pages_extracted: usize,
    pub output_directory: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The subset of the extraction metadata the chunker propagates onto chunks.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentProvenance {
    #[serde(default)]
    pub source_document: Option<String>,
    #[serde(default)]
    pub project_name: Option<String>,
    #[serde(default)]
    pub relative_path: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    pub id: String,
    #[serde(default)]
    pub project_name: Option<String>,
    pub source_document: String,
    #[serde(default)]
    pub relative_path: Option<String>,
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub page_start: u32,
    #[serde(default)]
    pub page_end: u32,
    pub raw_text: String,
    #[serde(default)]
    pub token_count_estimate: usize,
    #[serde(default)]
    pub chunk_index: usize,
    #[serde(default)]
    pub total_chunks: usize,
    #[serde(default)]
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRange {
    pub min: usize,
    pub max: usize,
}

/// `_chunking_metadata.json`, one per chunked document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingManifest {
    pub source_document: String,
    pub project_name: Option<String>,
    pub relative_path: Option<String>,
    pub input_directory: String,
    pub output_directory: String,
    pub processing_time: String,
    pub processor: String,
    pub processor_version: String,
    pub pages_processed: usize,
    pub chunks_created: usize,
    pub token_range: TokenRange,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// `index/metadata.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMetadata {
    pub created_at: String,
    pub generator: String,
    pub generator_version: String,
    pub model: String,
    pub model_name: String,
    pub chunk_count: usize,
    pub embedding_dimension: usize,
    pub is_truth: bool,
    pub regenerable: bool,
    pub warning: String,
}
