use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::governance::GovernancePolicy;
use crate::layout::ProjectLayout;
use crate::llm::{ANTHROPIC_MESSAGES_URL, DEFAULT_MODEL};
use crate::semantic::DEFAULT_MODEL_ID;

#[derive(Parser, Debug)]
#[command(
    name = "docknow",
    version,
    about = "Turn PDFs into chunked, searchable, human-reviewable knowledge"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract PDF pages to markdown (mechanical, no LLM).
    Extract(ExtractArgs),
    /// Split extracted pages into chunk records (deterministic, no LLM).
    Chunk(ChunkArgs),
    /// Build the regenerable embedding index from chunks.
    Embed(EmbedArgs),
    /// Search raw chunks (non-authoritative).
    Search(SearchArgs),
    /// Generate a draft knowledge file with a language model.
    Synth(SynthArgs),
    /// Look up a curated topic (read-only).
    Topic(TopicArgs),
    /// Assemble a topic draft from curated knowledge (no LLM).
    TopicDraft(TopicDraftArgs),
    /// Remove regenerable artifacts; curated knowledge is never touched.
    Clean(CleanArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ProjectArgs {
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// JSON file replacing the compiled-in protected-path rules.
    #[arg(long)]
    pub policy: Option<PathBuf>,
}

impl ProjectArgs {
    pub fn resolve(&self) -> Result<(ProjectLayout, GovernancePolicy)> {
        let layout = ProjectLayout::new(&self.root);
        let policy = match &self.policy {
            Some(path) => GovernancePolicy::from_file(&layout.root, path)?,
            None => GovernancePolicy::for_layout(&layout),
        };
        Ok((layout, policy))
    }
}

#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    #[arg(long)]
    pub sources: Option<PathBuf>,

    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Extract a single PDF instead of everything under the sources directory.
    #[arg(long)]
    pub file: Option<PathBuf>,

    #[arg(long)]
    pub max_pages: Option<usize>,
}

#[derive(Args, Debug, Clone)]
pub struct ChunkArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    #[arg(long)]
    pub input: Option<PathBuf>,

    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Only chunk this document directory (relative to the input directory).
    #[arg(long)]
    pub doc: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct EmbedArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    #[arg(long)]
    pub input: Option<PathBuf>,

    #[arg(long)]
    pub output: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_MODEL_ID)]
    pub model_id: String,

    /// Rebuild even when an index already exists.
    #[arg(long, default_value_t = false)]
    pub force: bool,
}

#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    pub query: String,

    #[arg(long, default_value_t = 20)]
    pub limit: usize,

    /// Characters of context around a lexical match.
    #[arg(long, default_value_t = 300)]
    pub context: usize,

    /// Rank by embedding similarity using the index.
    #[arg(long, default_value_t = false)]
    pub semantic: bool,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum SynthesisType {
    Glossary,
    Rules,
    Invariants,
    Procedures,
    Contradictions,
    Questions,
}

impl SynthesisType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Glossary => "glossary",
            Self::Rules => "rules",
            Self::Invariants => "invariants",
            Self::Procedures => "procedures",
            Self::Contradictions => "contradictions",
            Self::Questions => "questions",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct SynthArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    #[arg(value_enum)]
    pub synthesis_type: SynthesisType,

    #[arg(long)]
    pub topic: String,

    /// Maximum number of chunks placed in the prompt.
    #[arg(long)]
    pub limit: Option<usize>,

    /// Write here instead of the drafts directory (still subject to governance).
    #[arg(long)]
    pub output: Option<PathBuf>,

    #[arg(long, default_value = DEFAULT_MODEL)]
    pub model: String,

    #[arg(long, default_value_t = 4096)]
    pub max_tokens: u32,

    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[arg(long, default_value = ANTHROPIC_MESSAGES_URL)]
    pub api_url: String,
}

#[derive(Args, Debug, Clone)]
pub struct TopicArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    #[arg(required_unless_present = "list")]
    pub topic: Option<String>,

    /// Show the newest draft when no curated topic exists.
    #[arg(long, default_value_t = false)]
    pub show_draft: bool,

    /// List the curated topics instead of looking one up.
    #[arg(long, default_value_t = false)]
    pub list: bool,
}

#[derive(Args, Debug, Clone)]
pub struct TopicDraftArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    pub topic: String,

    /// Write here instead of topics/drafts (still subject to governance).
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Maximum number of chunks cited.
    #[arg(long, default_value_t = 20)]
    pub citations: usize,
}

#[derive(Args, Debug, Clone)]
pub struct CleanArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Also delete DRAFT_*.md files from the drafts directory.
    #[arg(long, default_value_t = false)]
    pub all: bool,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[command(flatten)]
    pub project: ProjectArgs,
}
