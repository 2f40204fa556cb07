use std::io::{self, Write};

use anyhow::{Context, Result, bail};
use regex::RegexBuilder;
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::SearchArgs;
use crate::commands::embed::{IndexedChunk, load_index};
use crate::corpus::load_chunk_records;
use crate::layout::INDEX_DB_FILE;
use crate::model::ChunkRecord;
use crate::semantic::{Embedder, LocalHashEmbedder, cosine_similarity};

const BANNER: &str = "RAW CHUNK SEARCH - NON-AUTHORITATIVE";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub rank: usize,
    pub chunk_id: String,
    pub source_document: String,
    pub project_name: Option<String>,
    pub section: Option<String>,
    pub page_start: u32,
    pub page_end: u32,
    pub context: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

#[derive(Debug, Serialize)]
struct SearchResponse<'a> {
    authoritative: bool,
    warning: &'a str,
    query: &'a str,
    mode: &'a str,
    returned: usize,
    results: &'a [SearchHit],
}

pub fn run(args: SearchArgs) -> Result<()> {
    let (layout, _) = args.project.resolve()?;
    let query = args.query.trim();
    if query.is_empty() {
        bail!("search query is empty");
    }

    let (mode, hits) = if args.semantic {
        let db_path = layout.index.join(INDEX_DB_FILE);
        if !db_path.exists() {
            bail!(
                "no index at {}; run `docknow embed` first",
                db_path.display()
            );
        }
        let (model_id, chunks) = load_index(&db_path)?;
        let embedder = LocalHashEmbedder::new(&model_id);
        ("semantic", semantic_search(&chunks, &embedder, query, args.limit, args.context)?)
    } else {
        let records = load_chunk_records(&layout.chunks)?;
        if records.is_empty() {
            warn!(path = %layout.chunks.display(), "no chunk records to search");
        }
        ("lexical", lexical_search(&records, query, args.limit, args.context)?)
    };

    info!(query = %query, mode, hits = hits.len(), "search completed");

    let mut output = io::BufWriter::new(io::stdout().lock());
    if args.json {
        let response = SearchResponse {
            authoritative: false,
            warning: "raw document excerpts, not authoritative knowledge",
            query,
            mode,
            returned: hits.len(),
            results: &hits,
        };
        serde_json::to_writer_pretty(&mut output, &response)
            .context("failed to serialize search json output")?;
        writeln!(output)?;
    } else {
        write_text_response(&mut output, query, mode, &hits)?;
    }
    output.flush()?;

    Ok(())
}

/// Case-insensitive substring search in chunk order, stopping at `limit`.
pub fn lexical_search(
    records: &[ChunkRecord],
    query: &str,
    limit: usize,
    context_chars: usize,
) -> Result<Vec<SearchHit>> {
    let pattern = RegexBuilder::new(&regex::escape(query))
        .case_insensitive(true)
        .build()
        .context("failed to compile search pattern")?;

    let mut hits = Vec::new();
    for record in records {
        if hits.len() >= limit {
            break;
        }
        let Some(found) = pattern.find(&record.raw_text) else {
            continue;
        };

        hits.push(SearchHit {
            rank: hits.len() + 1,
            chunk_id: record.id.clone(),
            source_document: record.source_document.clone(),
            project_name: record.project_name.clone(),
            section: record.section.clone(),
            page_start: record.page_start,
            page_end: record.page_end,
            context: context_window(&record.raw_text, found.start(), found.end(), context_chars),
            score: None,
        });
    }

    Ok(hits)
}

/// Ranks indexed chunks by cosine similarity to the embedded query. Ties
/// keep index order.
pub fn semantic_search(
    chunks: &[IndexedChunk],
    embedder: &dyn Embedder,
    query: &str,
    limit: usize,
    context_chars: usize,
) -> Result<Vec<SearchHit>> {
    let query_vector = embedder.embed(query)?;

    let mut scored = chunks
        .iter()
        .map(|chunk| (cosine_similarity(&query_vector, &chunk.embedding), chunk))
        .collect::<Vec<(f64, &IndexedChunk)>>();
    scored.sort_by(|left, right| right.0.total_cmp(&left.0));

    Ok(scored
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(offset, (score, chunk))| SearchHit {
            rank: offset + 1,
            chunk_id: chunk.chunk_id.clone(),
            source_document: chunk.source_document.clone(),
            project_name: chunk.project_name.clone(),
            section: chunk.section.clone(),
            page_start: chunk.page_start,
            page_end: chunk.page_end,
            context: leading_excerpt(&chunk.raw_text, context_chars),
            score: Some(score),
        })
        .collect())
}

/// Up to `context_chars / 2` characters either side of the byte range
/// `start..end`, with `...` marking truncation.
pub fn context_window(text: &str, start: usize, end: usize, context_chars: usize) -> String {
    let half = context_chars / 2;

    let skip = text[..start].chars().count().saturating_sub(half);
    let window_start = text[..start]
        .char_indices()
        .nth(skip)
        .map(|(index, _)| index)
        .unwrap_or(start);
    let window_end = text[end..]
        .char_indices()
        .nth(half)
        .map(|(index, _)| end + index)
        .unwrap_or(text.len());

    let mut context = String::new();
    if window_start > 0 {
        context.push_str("...");
    }
    context.push_str(&text[window_start..window_end]);
    if window_end < text.len() {
        context.push_str("...");
    }
    context
}

fn leading_excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => format!("{}...", &text[..index]),
        None => text.to_string(),
    }
}

pub fn write_text_response<W: Write>(
    output: &mut W,
    query: &str,
    mode: &str,
    hits: &[SearchHit],
) -> Result<()> {
    let rule = "=".repeat(80);
    writeln!(output, "{rule}")?;
    writeln!(output, "{BANNER}")?;
    writeln!(output, "{rule}")?;
    writeln!(
        output,
        "WARNING: raw document excerpts, NOT authoritative knowledge. Verify against the source documents."
    )?;
    writeln!(output)?;
    writeln!(output, "Query: {query}")?;
    writeln!(output, "Mode: {mode}")?;
    writeln!(output, "Matches: {}", hits.len())?;
    writeln!(output)?;

    if hits.is_empty() {
        writeln!(output, "No matches found.")?;
    }

    for hit in hits {
        writeln!(output, "[{}] {}", hit.rank, hit.source_document)?;
        writeln!(output, "    Section: {}", hit.section.as_deref().unwrap_or("N/A"))?;
        writeln!(output, "    Pages: {}-{}", hit.page_start, hit.page_end)?;
        writeln!(output, "    Chunk: {}", hit.chunk_id)?;
        if let Some(score) = hit.score {
            writeln!(output, "    Score: {score:.4}")?;
        }
        writeln!(output)?;
        writeln!(output, "    {}", hit.context)?;
        writeln!(output)?;
        writeln!(output, "{}", "-".repeat(80))?;
    }

    writeln!(output, "{rule}")?;
    writeln!(output, "REMINDER: this is raw search, NON-AUTHORITATIVE.")?;
    writeln!(output, "{rule}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::semantic::{DEFAULT_MODEL_ID, embed_text_local};

    fn record(document: &str, index: usize, text: &str) -> ChunkRecord {
        ChunkRecord {
            id: format!("{document}_chunk_{index:04}"),
            project_name: Some("Fleet".to_string()),
            source_document: document.to_string(),
            relative_path: None,
            section: Some("Brakes".to_string()),
            page_start: 4,
            page_end: 5,
            raw_text: text.to_string(),
            token_count_estimate: 10,
            chunk_index: index,
            total_chunks: 3,
            created_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    fn indexed(id: &str, text: &str) -> IndexedChunk {
        IndexedChunk {
            chunk_id: id.to_string(),
            source_document: "manual".to_string(),
            project_name: Some("Fleet".to_string()),
            relative_path: Some("Fleet".to_string()),
            section: None,
            page_start: 1,
            page_end: 1,
            raw_text: text.to_string(),
            embedding: embed_text_local(text, 384),
        }
    }

    #[test]
    fn lexical_search_is_case_insensitive_and_ordered() {
        let records = vec![
            record("alpha", 1, "Check the HYDRAULIC pressure daily."),
            record("alpha", 2, "Nothing relevant here."),
            record("beta", 1, "hydraulic lines must be inspected."),
        ];

        let hits = lexical_search(&records, "Hydraulic", 20, 300).expect("search");

        let ids = hits.iter().map(|hit| hit.chunk_id.as_str()).collect::<Vec<&str>>();
        assert_eq!(ids, vec!["alpha_chunk_0001", "beta_chunk_0001"]);
        assert_eq!(hits[0].rank, 1);
        assert_eq!(hits[1].rank, 2);
        assert_eq!(hits[0].context, "Check the HYDRAULIC pressure daily.");
        assert_eq!(hits[0].section.as_deref(), Some("Brakes"));
        assert_eq!(hits[0].score, None);
    }

    #[test]
    fn lexical_search_respects_limit_and_literal_queries() {
        let records = (1..=5)
            .map(|index| record("doc", index, "value (a+b) appears"))
            .collect::<Vec<ChunkRecord>>();

        let hits = lexical_search(&records, "(a+b)", 2, 300).expect("search");
        assert_eq!(hits.len(), 2);
        assert!(lexical_search(&records, "missing", 20, 300).expect("search").is_empty());
    }

    #[test]
    fn context_window_marks_truncation() {
        let text = "0123456789ABCDEFGHIJ";
        let start = text.find("AB").expect("found");

        assert_eq!(context_window(text, start, start + 2, 4), "...89ABCD...");
        assert_eq!(context_window(text, 0, 2, 4), "0123...");
        assert_eq!(context_window(text, 18, 20, 4), "...GHIJ");
        assert_eq!(context_window(text, start, start + 2, 100), text);
    }

    #[test]
    fn context_window_respects_char_boundaries() {
        let text = "ééé brake ééé";
        let start = text.find("brake").expect("found");

        assert_eq!(context_window(text, start, start + 5, 4), "...é brake é...");
    }

    #[test]
    fn semantic_search_ranks_by_similarity() {
        let chunks = vec![
            indexed("manual_chunk_0001", "cabin lighting schedule for night flights"),
            indexed("manual_chunk_0002", "inspect hydraulic brake pressure before departure"),
            indexed("manual_chunk_0003", "hydraulic fluid reservoir levels"),
        ];
        let embedder = LocalHashEmbedder::new(DEFAULT_MODEL_ID);

        let hits = semantic_search(&chunks, &embedder, "hydraulic brake pressure", 2, 10)
            .expect("search");

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].chunk_id, "manual_chunk_0002");
        assert!(hits[0].score.expect("score") > hits[1].score.expect("score"));
        assert_eq!(hits[0].context, "inspect hy...");
        assert_eq!(hits[0].project_name.as_deref(), Some("Fleet"));
    }

    #[test]
    fn text_response_is_labelled_non_authoritative() {
        let records = vec![record("alpha", 1, "brake pressure")];
        let hits = lexical_search(&records, "brake", 20, 300).expect("search");

        let mut buffer = Vec::new();
        write_text_response(&mut buffer, "brake", "lexical", &hits).expect("write");
        let text = String::from_utf8(buffer).expect("utf8");

        assert!(text.contains("NON-AUTHORITATIVE"));
        assert!(text.contains("[1] alpha"));
        assert!(text.contains("    Section: Brakes"));
        assert!(text.contains("    Pages: 4-5"));
        assert!(text.contains("    Chunk: alpha_chunk_0001"));
    }

    #[test]
    fn empty_results_say_so() {
        let mut buffer = Vec::new();
        write_text_response(&mut buffer, "nothing", "lexical", &[]).expect("write");
        let text = String::from_utf8(buffer).expect("utf8");

        assert!(text.contains("Matches: 0"));
        assert!(text.contains("No matches found."));
    }
}
