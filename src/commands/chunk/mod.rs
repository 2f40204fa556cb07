use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use regex::Regex;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::cli::ChunkArgs;
use crate::error::PipelineError;
use crate::governance::{GovernancePolicy, is_refusal};
use crate::layout::{CHUNKING_METADATA_FILE, EXTRACTION_METADATA_FILE};
use crate::model::{ChunkRecord, ChunkingManifest, DocumentProvenance, TokenRange};
use crate::util::{file_name_str, now_utc_string, read_json};

mod assign;
mod run;
pub(crate) mod segment;

pub use run::run;

use assign::*;
use run::*;
use segment::*;
