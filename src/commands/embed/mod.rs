use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use rusqlite::{Connection, OpenFlags, params};
use tracing::info;

use crate::cli::EmbedArgs;
use crate::corpus::load_chunk_records;
use crate::governance::GovernancePolicy;
use crate::layout::{INDEX_CHUNK_IDS_FILE, INDEX_DB_FILE, INDEX_MARKER_FILE, INDEX_METADATA_FILE};
use crate::model::{ChunkRecord, IndexMetadata};
use crate::semantic::{
    Embedder, LocalHashEmbedder, chunk_payload_for_embedding, decode_embedding_blob,
    embedding_text_hash, encode_embedding_blob,
};
use crate::util::now_utc_string;

mod run;
mod store;
#[cfg(test)]
mod tests;

pub use run::{build_index, run};
pub use store::{IndexedChunk, load_index};

use store::*;
