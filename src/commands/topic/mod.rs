use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, SecondsFormat, Utc};
use regex::{Regex, RegexBuilder};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::cli::{TopicArgs, TopicDraftArgs};
use crate::corpus::load_chunk_records;
use crate::governance::{DRAFT_PREFIX, GovernancePolicy};
use crate::layout::ProjectLayout;
use crate::model::ChunkRecord;
use crate::util::{file_name_str, utc_compact_string};

mod draft;
mod lookup;

pub use draft::run as run_draft;
pub use lookup::run;

use draft::*;
use lookup::*;
