use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::info;

use crate::cli::{SynthArgs, SynthesisType};
use crate::corpus::load_chunk_records;
use crate::governance::GovernancePolicy;
use crate::layout::ProjectLayout;
use crate::llm::{AnthropicClient, LanguageModel};
use crate::model::ChunkRecord;
use crate::util::utc_compact_string;

const SYSTEM_PROMPT: &str = "You draft knowledge files from document excerpts. \
Use only the excerpts provided. Cite the chunk id for every statement. \
Never infer, never fill gaps, and say so when the excerpts are silent.";

const TOPIC_SLUG_MAX_CHARS: usize = 50;

/// Everything a draft needs before the model is called.
#[derive(Debug, Clone)]
pub struct SynthesisPlan {
    pub synthesis_type: SynthesisType,
    pub topic: String,
    pub target: PathBuf,
    pub template: String,
    pub chunks: Vec<ChunkRecord>,
}

pub fn run(args: SynthArgs) -> Result<()> {
    let (layout, policy) = args.project.resolve()?;
    let now = Utc::now();

    let plan = plan_synthesis(
        &layout,
        &policy,
        args.synthesis_type,
        &args.topic,
        args.limit,
        args.output.clone(),
        now,
    )?;

    info!(
        synthesis_type = plan.synthesis_type.as_str(),
        topic = %plan.topic,
        chunks = plan.chunks.len(),
        target = %plan.target.display(),
        model = %args.model,
        "starting synthesis"
    );

    let api_key = args
        .api_key
        .clone()
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| anyhow!("no API key: pass --api-key or set ANTHROPIC_API_KEY"))?;
    let client = AnthropicClient::new(api_key, args.model.clone(), args.max_tokens)?
        .with_endpoint(args.api_url.clone());

    let path = generate_draft(&plan, &client, &policy, now)?;
    info!(path = %path.display(), "draft written; requires human review");

    Ok(())
}

/// Resolves and gates the target, then loads the template and chunks. A
/// refused target fails here, before any model call.
pub fn plan_synthesis(
    layout: &ProjectLayout,
    policy: &GovernancePolicy,
    synthesis_type: SynthesisType,
    topic: &str,
    limit: Option<usize>,
    output: Option<PathBuf>,
    now: DateTime<Utc>,
) -> Result<SynthesisPlan> {
    let target = output
        .unwrap_or_else(|| layout.drafts.join(draft_file_name(synthesis_type, topic, now)));
    policy.check_write(&target)?;

    let template = load_prompt_template(&layout.prompts, synthesis_type)?;

    let mut chunks = load_chunk_records(&layout.chunks)?;
    if let Some(limit) = limit {
        chunks.truncate(limit);
    }
    if chunks.is_empty() {
        bail!("no chunk records found in {}", layout.chunks.display());
    }

    Ok(SynthesisPlan {
        synthesis_type,
        topic: topic.to_string(),
        target,
        template,
        chunks,
    })
}

pub fn generate_draft(
    plan: &SynthesisPlan,
    model: &dyn LanguageModel,
    policy: &GovernancePolicy,
    now: DateTime<Utc>,
) -> Result<PathBuf> {
    let prompt = build_prompt(&plan.template, &plan.topic, &plan.chunks);
    let response = model.complete(SYSTEM_PROMPT, &prompt)?;

    let content = format!(
        "{}{}\n",
        draft_header(plan, model.model_name(), now),
        response.trim()
    );
    policy.write_text(&plan.target, &content)?;

    Ok(plan.target.clone())
}

pub fn prompt_file_name(synthesis_type: SynthesisType) -> String {
    format!("synthesize_{}.md", synthesis_type.as_str())
}

pub fn load_prompt_template(prompts_dir: &Path, synthesis_type: SynthesisType) -> Result<String> {
    let path = prompts_dir.join(prompt_file_name(synthesis_type));
    if !path.is_file() {
        bail!("prompt template not found: {}", path.display());
    }
    fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display()))
}

/// `DRAFT_<type>_<topic slug>_<UTC stamp>.md`
pub fn draft_file_name(synthesis_type: SynthesisType, topic: &str, now: DateTime<Utc>) -> String {
    format!(
        "DRAFT_{}_{}_{}.md",
        synthesis_type.as_str(),
        topic_slug(topic),
        utc_compact_string(now)
    )
}

fn topic_slug(topic: &str) -> String {
    let mut slug = String::new();
    for character in topic.trim().chars().flat_map(char::to_lowercase) {
        if character.is_alphanumeric() {
            slug.push(character);
        } else if !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
    }

    let slug = slug
        .chars()
        .take(TOPIC_SLUG_MAX_CHARS)
        .collect::<String>()
        .trim_end_matches('_')
        .to_string();
    if slug.is_empty() {
        "all".to_string()
    } else {
        slug
    }
}

/// One citation header plus text per chunk, separated by `---`.
pub fn format_chunks_for_prompt(chunks: &[ChunkRecord]) -> String {
    chunks
        .iter()
        .map(|chunk| {
            let mut header = format!("[{}] {}", chunk.id, chunk.source_document);
            if let Some(section) = chunk.section.as_deref().filter(|s| !s.trim().is_empty()) {
                header.push_str(&format!(", Section: {section}"));
            }
            header.push_str(&format!(", pp. {}-{}", chunk.page_start, chunk.page_end));
            format!("{header}\n\n{}", chunk.raw_text.trim())
        })
        .collect::<Vec<String>>()
        .join("\n\n---\n\n")
}

pub fn build_prompt(template: &str, topic: &str, chunks: &[ChunkRecord]) -> String {
    format!(
        "{}\n\n## Topic\n\n{}\n\n## Source chunks\n\n{}\n",
        template.trim(),
        topic.trim(),
        format_chunks_for_prompt(chunks)
    )
}

fn draft_header(plan: &SynthesisPlan, model: &str, now: DateTime<Utc>) -> String {
    format!(
        "# DRAFT - NOT AUTHORITATIVE\n\
\n\
> **Warning:** generated by a language model from raw chunks.\n\
> DO NOT treat this as truth. This draft requires HUMAN REVIEW before\n\
> anything in it is promoted into curated knowledge.\n\
>\n\
> - Type: {}\n\
> - Topic: {}\n\
> - Model: {}\n\
> - Chunks provided: {}\n\
> - Generated: {}\n\
\n\
---\n\
\n",
        plan.synthesis_type.as_str(),
        plan.topic,
        model,
        plan.chunks.len(),
        now.to_rfc3339_opts(SecondsFormat::Secs, true)
    )
}
