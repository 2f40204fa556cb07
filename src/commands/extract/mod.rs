use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::cli::ExtractArgs;
use crate::governance::{GovernancePolicy, is_refusal};
use crate::layout::EXTRACTION_METADATA_FILE;
use crate::model::ExtractionMetadata;
use crate::util::{now_utc_string, sha256_file};

mod bbox;
mod render;
mod run;
#[cfg(test)]
mod tests;

pub use run::run;

use bbox::*;
use render::*;
use run::*;
