use std::path::{Path, PathBuf};

pub const SOURCES_DIR: &str = "sources";
pub const EXTRACTED_DIR: &str = "extracted";
pub const CHUNKS_DIR: &str = "chunks";
pub const INDEX_DIR: &str = "index";
pub const SYNTH_DIR: &str = "synth";
pub const DRAFTS_DIR: &str = "drafts";
pub const PROCEDURES_DIR: &str = "procedures";
pub const PROMPTS_DIR: &str = "prompts";
pub const TOPICS_DIR: &str = "topics";

/// Directory layout of a knowledge project, rooted at one directory.
///
/// `sources/` holds the original PDFs, `synth/` and `topics/` the curated
/// knowledge; `extracted/`, `chunks/` and `index/` are regenerable.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    pub root: PathBuf,
    pub sources: PathBuf,
    pub extracted: PathBuf,
    pub chunks: PathBuf,
    pub index: PathBuf,
    pub synth: PathBuf,
    pub drafts: PathBuf,
    pub procedures: PathBuf,
    pub prompts: PathBuf,
    pub topics: PathBuf,
    pub topic_drafts: PathBuf,
}

impl ProjectLayout {
    pub fn new(root: &Path) -> Self {
        let synth = root.join(SYNTH_DIR);
        let topics = root.join(TOPICS_DIR);
        Self {
            root: root.to_path_buf(),
            sources: root.join(SOURCES_DIR),
            extracted: root.join(EXTRACTED_DIR),
            chunks: root.join(CHUNKS_DIR),
            index: root.join(INDEX_DIR),
            drafts: synth.join(DRAFTS_DIR),
            procedures: synth.join(PROCEDURES_DIR),
            synth,
            prompts: root.join(PROMPTS_DIR),
            topic_drafts: topics.join(DRAFTS_DIR),
            topics,
        }
    }
}

pub const EXTRACTION_METADATA_FILE: &str = "_extraction_metadata.json";
pub const CHUNKING_METADATA_FILE: &str = "_chunking_metadata.json";
pub const INDEX_DB_FILE: &str = "chunk_index.sqlite";
pub const INDEX_METADATA_FILE: &str = "metadata.json";
pub const INDEX_CHUNK_IDS_FILE: &str = "chunk_ids.json";
pub const INDEX_MARKER_FILE: &str = "_INDEX_IS_NOT_TRUTH";
