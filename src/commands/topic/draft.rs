use super::*;

const GENERATOR: &str = "docknow topic-draft";
const RELATED_TERM_LIMIT: usize = 10;

/// Fields of one `### Term` glossary entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlossaryEntry {
    pub term: String,
    pub definition: Option<String>,
    pub sources: Vec<String>,
    pub notes: Option<String>,
}

/// An `IF/WHEN ... THEN ...` statement from the curated rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CuratedRule {
    pub condition: String,
    pub consequence: String,
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedureRef {
    pub name: String,
    pub file: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Citation {
    pub chunk_id: String,
    pub source_document: String,
    pub section: Option<String>,
    pub page_start: u32,
    pub page_end: u32,
}

/// What the curated files (and, for citations only, the raw chunks) say
/// about a topic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicEvidence {
    pub glossary: Option<GlossaryEntry>,
    pub related_terms: Vec<String>,
    pub rules: Vec<CuratedRule>,
    pub procedures: Vec<ProcedureRef>,
    pub citations: Vec<Citation>,
}

pub fn run(args: TopicDraftArgs) -> Result<()> {
    let (layout, policy) = args.project.resolve()?;
    let topic = args.topic.trim();
    if topic.is_empty() {
        bail!("topic is empty");
    }

    let path = write_topic_draft(
        &layout,
        &policy,
        topic,
        args.output.clone(),
        args.citations,
        Utc::now(),
    )?;
    info!(topic, path = %path.display(), "topic draft written; requires human review");

    Ok(())
}

/// Gates the target, gathers evidence and writes the draft. Nothing is read
/// when the target is refused.
pub fn write_topic_draft(
    layout: &ProjectLayout,
    policy: &GovernancePolicy,
    topic: &str,
    output: Option<PathBuf>,
    citation_limit: usize,
    now: DateTime<Utc>,
) -> Result<PathBuf> {
    let target =
        output.unwrap_or_else(|| layout.topic_drafts.join(topic_draft_file_name(topic, now)));
    policy.check_write(&target)?;

    let evidence = gather_evidence(layout, topic, citation_limit)?;
    info!(
        topic,
        glossary = evidence.glossary.is_some(),
        rules = evidence.rules.len(),
        procedures = evidence.procedures.len(),
        citations = evidence.citations.len(),
        "gathered curated evidence"
    );

    policy.write_text(&target, &render_topic_draft(topic, &evidence, now))?;
    Ok(target)
}

/// `DRAFT_<normalized topic>_<UTC stamp>.md`
pub fn topic_draft_file_name(topic: &str, now: DateTime<Utc>) -> String {
    format!(
        "{DRAFT_PREFIX}{}_{}.md",
        normalize_topic_name(topic),
        utc_compact_string(now)
    )
}

pub fn gather_evidence(
    layout: &ProjectLayout,
    topic: &str,
    citation_limit: usize,
) -> Result<TopicEvidence> {
    let mut evidence = TopicEvidence::default();

    let glossary_path = layout.synth.join("glossary.md");
    if glossary_path.is_file() {
        let glossary = read_markdown(&glossary_path)?;
        evidence.glossary = find_glossary_entry(topic, &glossary)?;
        evidence.related_terms = related_terms(topic, &glossary);
    }

    let rules_path = layout.synth.join("rules.md");
    if rules_path.is_file() {
        evidence.rules = extract_rules(topic, &read_markdown(&rules_path)?)?;
    }

    evidence.procedures = find_procedures(&layout.procedures, topic)?;
    evidence.citations = find_citations(&load_chunk_records(&layout.chunks)?, topic, citation_limit);

    Ok(evidence)
}

/// `(term, body)` for every `### term` heading, in file order.
pub fn glossary_entries(glossary: &str) -> Vec<(String, String)> {
    let mut entries = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;

    for line in glossary.lines() {
        if let Some(term) = glossary_term(line) {
            if let Some((previous, body)) = current.take() {
                entries.push((previous, body.join("\n").trim().to_string()));
            }
            current = Some((term.to_string(), Vec::new()));
        } else if let Some((_, body)) = current.as_mut() {
            body.push(line);
        }
    }
    if let Some((term, body)) = current {
        entries.push((term, body.join("\n").trim().to_string()));
    }

    entries
}

fn glossary_term(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("###")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    Some(rest.trim()).filter(|term| !term.is_empty())
}

/// Exact term match first, then the first term containing the topic.
pub fn find_glossary_entry(topic: &str, glossary: &str) -> Result<Option<GlossaryEntry>> {
    let needle = topic.trim().to_lowercase();
    let entries = glossary_entries(glossary);

    let found = entries
        .iter()
        .find(|(term, _)| term.to_lowercase() == needle)
        .or_else(|| {
            entries
                .iter()
                .find(|(term, _)| term.to_lowercase().contains(&needle))
        });
    let Some((term, body)) = found else {
        return Ok(None);
    };

    let source = Regex::new(r"\*\*Source\*\*:\s*\[([^\]]*)\]")
        .context("failed to compile glossary source regex")?;

    Ok(Some(GlossaryEntry {
        term: term.clone(),
        definition: labelled_field(body, "Definition"),
        sources: source
            .captures_iter(body)
            .filter_map(|captures| captures.get(1))
            .map(|value| value.as_str().to_string())
            .collect(),
        notes: labelled_field(body, "Notes"),
    }))
}

/// Text after `**label**:` up to the next `**`-led line.
fn labelled_field(body: &str, label: &str) -> Option<String> {
    let marker = format!("**{label}**:");
    let mut lines = body.lines();
    let first = lines.find_map(|line| line.trim_start().strip_prefix(marker.as_str()))?;

    let mut value = vec![first.trim()];
    value.extend(lines.take_while(|line| !line.trim_start().starts_with("**")));
    let value = value.join("\n").trim().to_string();
    (!value.is_empty()).then_some(value)
}

/// Other glossary terms whose entries mention the topic.
pub fn related_terms(topic: &str, glossary: &str) -> Vec<String> {
    let needle = topic.trim().to_lowercase();
    glossary_entries(glossary)
        .into_iter()
        .filter(|(term, body)| {
            body.to_lowercase().contains(&needle) && !term.to_lowercase().contains(&needle)
        })
        .map(|(term, _)| term)
        .take(RELATED_TERM_LIMIT)
        .collect()
}

/// Rules mentioning the topic. A rule starts at a line beginning with `IF`
/// or `WHEN` and runs until the next such line or heading.
pub fn extract_rules(topic: &str, rules: &str) -> Result<Vec<CuratedRule>> {
    let opener = RegexBuilder::new(r"^\s*(?:[-*]\s+)?(IF|WHEN)\s")
        .case_insensitive(true)
        .build()
        .context("failed to compile rule opener regex")?;
    let statement = RegexBuilder::new(r"(?s)(?:IF|WHEN)\s+(.*?)\s+THEN\s+(.*)")
        .case_insensitive(true)
        .build()
        .context("failed to compile rule regex")?;
    let citation =
        Regex::new(r"\[[^\]]*?,\s*p\.\d+\]").context("failed to compile citation regex")?;

    let mut blocks = Vec::<Vec<&str>>::new();
    let mut open = false;
    for line in rules.lines() {
        if opener.is_match(line) {
            blocks.push(vec![line]);
            open = true;
        } else if line.starts_with('#') {
            open = false;
        } else if open {
            if let Some(block) = blocks.last_mut() {
                block.push(line);
            }
        }
    }

    let needle = topic.trim().to_lowercase();
    Ok(blocks
        .iter()
        .map(|block| block.join("\n"))
        .filter(|text| text.to_lowercase().contains(&needle))
        .filter_map(|text| {
            let captures = statement.captures(&text)?;
            Some(CuratedRule {
                condition: captures.get(1)?.as_str().trim().to_string(),
                consequence: captures.get(2)?.as_str().trim().to_string(),
                source: citation.find(&text).map(|m| m.as_str().to_string()),
            })
        })
        .collect())
}

/// Non-draft procedure files mentioning the topic.
pub fn find_procedures(procedures_dir: &Path, topic: &str) -> Result<Vec<ProcedureRef>> {
    let needle = topic.trim().to_lowercase();
    let mut procedures = Vec::new();

    for path in markdown_files(procedures_dir)? {
        let Some(file) = file_name_str(&path) else {
            continue;
        };
        if file.starts_with(DRAFT_PREFIX) {
            continue;
        }
        if !read_markdown(&path)?.to_lowercase().contains(&needle) {
            continue;
        }

        let stem = path.file_stem().and_then(|stem| stem.to_str()).unwrap_or(file);
        procedures.push(ProcedureRef {
            name: display_name(stem),
            file: file.to_string(),
        });
    }

    Ok(procedures)
}

/// Chunks whose raw text mentions the topic, for citation only.
pub fn find_citations(records: &[ChunkRecord], topic: &str, limit: usize) -> Vec<Citation> {
    let needle = topic.trim().to_lowercase();
    records
        .iter()
        .filter(|record| record.raw_text.to_lowercase().contains(&needle))
        .take(limit)
        .map(|record| Citation {
            chunk_id: record.id.clone(),
            source_document: record.source_document.clone(),
            section: record.section.clone(),
            page_start: record.page_start,
            page_end: record.page_end,
        })
        .collect()
}

pub fn render_topic_draft(topic: &str, evidence: &TopicEvidence, now: DateTime<Utc>) -> String {
    let stamp = now.to_rfc3339_opts(SecondsFormat::Secs, true);
    let mut out = format!(
        "# Topic: {topic}\n\n\
> **Status**: DRAFT\n\
> **Created**: {stamp}\n\
> **Reviewed By**: NOT REVIEWED\n\n\
---\n\n\
## Definition\n\n"
    );

    match evidence.glossary.as_ref().and_then(|entry| {
        entry.definition.as_ref().map(|definition| (entry, definition))
    }) {
        Some((entry, definition)) => {
            out.push_str(&format!("**Primary Definition** ({}):\n{definition}\n\n", entry.term));
            if !entry.sources.is_empty() {
                out.push_str(&format!("**Source**: {}\n\n", entry.sources.join(", ")));
            }
        }
        None => out.push_str(
            "**Primary Definition**:\nNOT FOUND IN GLOSSARY\n\n\
**Action Required**: search the source documents or mark as not defined.\n\n",
        ),
    }

    out.push_str("---\n\n## Related Terms\n\n");
    if evidence.related_terms.is_empty() {
        out.push_str("NOT SPECIFIED IN SOURCE\n\n");
    } else {
        out.push_str("| Term | Relationship | Source |\n|------|--------------|--------|\n");
        for term in &evidence.related_terms {
            out.push_str(&format!("| {term} | mentions | [glossary.md] |\n"));
        }
        out.push('\n');
    }

    out.push_str("---\n\n## Sources\n\n");
    if evidence.citations.is_empty() {
        out.push_str("NO SOURCES FOUND\n\n");
    } else {
        let mut seen = Vec::<(&str, u32)>::new();
        for citation in &evidence.citations {
            let key = (citation.source_document.as_str(), citation.page_start);
            if seen.contains(&key) {
                continue;
            }
            seen.push(key);
            out.push_str(&format!(
                "- {}, Section: {}, pp. {}-{} [{}]\n",
                citation.source_document,
                citation.section.as_deref().unwrap_or("N/A"),
                citation.page_start,
                citation.page_end,
                citation.chunk_id
            ));
        }
        out.push('\n');
    }
    out.push_str("**Coverage Assessment**: UNKNOWN (draft)\n**Confidence**: LOW (draft)\n\n");

    out.push_str("---\n\n## Rules\n\n");
    if evidence.rules.is_empty() {
        out.push_str("NO RULES SPECIFIED IN SOURCE\n\n");
    } else {
        for (offset, rule) in evidence.rules.iter().enumerate() {
            out.push_str(&format!(
                "### Rule {} (from curated rules.md)\n\
**Condition**: {}\n\
**Consequence**: {}\n\
**Source**: {}\n\n",
                offset + 1,
                rule.condition,
                rule.consequence,
                rule.source.as_deref().unwrap_or("Source not found")
            ));
        }
    }

    out.push_str("---\n\n## Behavior\n\n");
    match evidence.glossary.as_ref().and_then(|entry| entry.notes.as_deref()) {
        Some(notes) => out.push_str(&format!("{notes}\n\n**Source**: [glossary.md]\n\n")),
        None => out.push_str("BEHAVIOR NOT SPECIFIED IN SOURCE\n\n"),
    }

    out.push_str("---\n\n## Procedures\n\n");
    if evidence.procedures.is_empty() {
        out.push_str("NO PROCEDURES SPECIFIED IN SOURCE\n\n");
    } else {
        for procedure in &evidence.procedures {
            out.push_str(&format!(
                "### {}\n\n**Source**: synth/procedures/{}\n\n",
                procedure.name, procedure.file
            ));
        }
    }

    out.push_str(
        "---\n\n## Limitations\n\nNO LIMITATIONS SPECIFIED IN SOURCE\n\n\
---\n\n## Open Questions\n\n\
> Gaps in the documentation, not assumptions.\n\n\
1. **Complete definition needed.** Searched glossary.md, rules.md and procedures/.\n\n\
---\n\n## Verification Status\n\n\
- [ ] All citations verified against source documents\n\
- [ ] All \"NOT SPECIFIED\" claims verified\n\
- [ ] No inferences or assumptions present\n\
- [ ] Human review completed\n\n\
---\n\n## Metadata\n\n",
    );

    let mut documents = evidence
        .citations
        .iter()
        .map(|citation| citation.source_document.as_str())
        .collect::<Vec<&str>>();
    documents.dedup();
    for document in documents {
        out.push_str(&format!("- {document}\n"));
    }
    out.push_str(&format!(
        "\n**Chunks Analyzed**: {} chunks mentioning the topic\n**Generated By**: {GENERATOR} {}\n\n",
        evidence.citations.len(),
        env!("CARGO_PKG_VERSION")
    ));
    out.push_str(
        "---\n\n**REMINDER**: this topic file is a DRAFT assembled from curated knowledge.\n\
It requires human review before promotion. DO NOT treat it as authoritative.\n",
    );

    out
}
