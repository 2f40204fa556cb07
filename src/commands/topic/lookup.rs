use super::*;

pub const GLOSSARY_MATCH_LIMIT: usize = 5;
pub const RELATED_TOPIC_LIMIT: usize = 10;

/// Outcome of a topic lookup. Only `Curated` is authoritative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopicLookup {
    Curated {
        path: PathBuf,
        content: String,
    },
    Draft {
        path: PathBuf,
        content: String,
    },
    NotFound {
        glossary_matches: Vec<String>,
        curated_topics: Vec<String>,
    },
}

pub fn run(args: TopicArgs) -> Result<()> {
    let (layout, _) = args.project.resolve()?;
    let mut output = io::BufWriter::new(io::stdout().lock());

    if args.list {
        let topics = list_curated_topics(&layout.topics)?;
        info!(path = %layout.topics.display(), topics = topics.len(), "listing curated topics");
        write_topic_list(&mut output, &topics)?;
        output.flush()?;
        return Ok(());
    }

    let Some(topic) = args.topic.as_deref().map(str::trim).filter(|t| !t.is_empty()) else {
        bail!("topic is empty");
    };

    let found = lookup_topic(&layout, topic, args.show_draft)?;
    write_lookup(&mut output, topic, &found)?;
    output.flush()?;

    match found {
        TopicLookup::Curated { path, .. } => {
            info!(topic, path = %path.display(), "curated topic found");
            Ok(())
        }
        TopicLookup::Draft { path, .. } => {
            warn!(topic, path = %path.display(), "showing unreviewed draft");
            Ok(())
        }
        TopicLookup::NotFound { .. } => bail!("no curated topic for '{topic}'"),
    }
}

/// `"HSI pointers"` becomes `hsi_pointers`.
pub fn normalize_topic_name(topic: &str) -> String {
    topic
        .trim()
        .to_lowercase()
        .replace([' ', '/', '\\'], "_")
}

/// Curated topic file first, then (when asked) the newest draft, otherwise
/// the non-authoritative options.
pub fn lookup_topic(layout: &ProjectLayout, topic: &str, show_draft: bool) -> Result<TopicLookup> {
    if let Some(path) = find_topic_file(&layout.topics, topic) {
        let content = read_markdown(&path)?;
        return Ok(TopicLookup::Curated { path, content });
    }

    if show_draft {
        if let Some(path) = find_draft_file(&layout.topic_drafts, topic)? {
            let content = read_markdown(&path)?;
            return Ok(TopicLookup::Draft { path, content });
        }
    }

    Ok(TopicLookup::NotFound {
        glossary_matches: search_glossary_headings(&layout.synth.join("glossary.md"), topic)?,
        curated_topics: list_curated_topics(&layout.topics)?,
    })
}

pub fn find_topic_file(topics_dir: &Path, topic: &str) -> Option<PathBuf> {
    let path = topics_dir.join(format!("{}.md", normalize_topic_name(topic)));
    path.is_file().then_some(path)
}

/// `DRAFT_<topic>.md`, else the lexically last `DRAFT_<topic>_*.md`.
pub fn find_draft_file(drafts_dir: &Path, topic: &str) -> Result<Option<PathBuf>> {
    let normalized = normalize_topic_name(topic);
    let exact = drafts_dir.join(format!("{DRAFT_PREFIX}{normalized}.md"));
    if exact.is_file() {
        return Ok(Some(exact));
    }

    let stamped_prefix = format!("{DRAFT_PREFIX}{normalized}_");
    let newest = markdown_files(drafts_dir)?
        .into_iter()
        .filter(|path| {
            file_name_str(path).is_some_and(|name| name.starts_with(&stamped_prefix))
        })
        .max();
    Ok(newest)
}

/// `###` glossary headings that mention the topic, case-insensitively.
pub fn search_glossary_headings(glossary_path: &Path, topic: &str) -> Result<Vec<String>> {
    if !glossary_path.is_file() {
        return Ok(Vec::new());
    }

    let needle = topic.to_lowercase();
    let content = read_markdown(glossary_path)?;
    Ok(content
        .lines()
        .filter(|line| line.starts_with("###") && line.to_lowercase().contains(&needle))
        .map(|line| line.trim_matches(|c| c == '#' || c == ' ').to_string())
        .collect())
}

/// Display names of the curated topic files, skipping `_`-prefixed ones.
pub fn list_curated_topics(topics_dir: &Path) -> Result<Vec<String>> {
    let mut topics = markdown_files(topics_dir)?
        .iter()
        .filter_map(|path| {
            let name = file_name_str(path)?;
            if name.starts_with('_') {
                return None;
            }
            path.file_stem()
                .and_then(|stem| stem.to_str())
                .map(display_name)
        })
        .collect::<Vec<String>>();
    topics.sort();
    Ok(topics)
}

/// `hsi_pointers` becomes `Hsi Pointers`.
pub fn display_name(stem: &str) -> String {
    stem.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut characters = word.chars();
            match characters.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(characters.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// `.md` files directly inside `dir`; a missing directory has none.
pub(super) fn markdown_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to walk {}", dir.display()))?;
        let is_markdown = entry.file_type().is_file()
            && entry
                .path()
                .extension()
                .is_some_and(|extension| extension == "md");
        if is_markdown {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

pub(super) fn read_markdown(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

pub fn write_lookup<W: Write>(output: &mut W, topic: &str, found: &TopicLookup) -> Result<()> {
    let rule = "=".repeat(80);
    match found {
        TopicLookup::Curated { path, content } => {
            writeln!(output, "{rule}")?;
            writeln!(output, "AUTHORITATIVE TOPIC (CURATED)")?;
            writeln!(output, "{rule}")?;
            writeln!(output)?;
            writeln!(output, "{}", content.trim_end())?;
            writeln!(output)?;
            writeln!(output, "{rule}")?;
            writeln!(output, "Source: {}", path.display())?;
            writeln!(output, "Status: AUTHORITATIVE (human-reviewed)")?;
            writeln!(output, "{rule}")?;
        }
        TopicLookup::Draft { path, content } => {
            writeln!(output, "{rule}")?;
            writeln!(output, "DRAFT TOPIC - NOT AUTHORITATIVE")?;
            writeln!(output, "{rule}")?;
            writeln!(output)?;
            writeln!(output, "WARNING: this draft has NOT been human-reviewed.")?;
            writeln!(output, "Do NOT treat it as authoritative knowledge.")?;
            writeln!(output)?;
            writeln!(output, "{}", content.trim_end())?;
            writeln!(output)?;
            writeln!(output, "{rule}")?;
            writeln!(output, "Source: {}", path.display())?;
            writeln!(output, "Status: DRAFT (requires human review)")?;
            writeln!(output, "{rule}")?;
        }
        TopicLookup::NotFound {
            glossary_matches,
            curated_topics,
        } => write_options(output, topic, glossary_matches, curated_topics)?,
    }
    Ok(())
}

fn write_options<W: Write>(
    output: &mut W,
    topic: &str,
    glossary_matches: &[String],
    curated_topics: &[String],
) -> Result<()> {
    let rule = "=".repeat(80);
    writeln!(output, "{rule}")?;
    writeln!(output, "TOPIC NOT FOUND: '{topic}'")?;
    writeln!(output, "{rule}")?;
    writeln!(output)?;
    writeln!(output, "No curated topic file exists for this topic.")?;
    writeln!(output, "Search results are NOT authoritative.")?;
    writeln!(output)?;
    writeln!(output, "OPTIONS:")?;
    writeln!(output)?;
    writeln!(output, "1. CREATE DRAFT TOPIC (for human review)")?;
    writeln!(output, "   docknow topic-draft \"{topic}\"")?;
    writeln!(output)?;

    if !glossary_matches.is_empty() {
        writeln!(output, "2. GLOSSARY REFERENCES (non-authoritative)")?;
        for term in glossary_matches.iter().take(GLOSSARY_MATCH_LIMIT) {
            writeln!(output, "   - {term}")?;
        }
        if glossary_matches.len() > GLOSSARY_MATCH_LIMIT {
            writeln!(
                output,
                "   ... and {} more",
                glossary_matches.len() - GLOSSARY_MATCH_LIMIT
            )?;
        }
        writeln!(output)?;
    }

    if !curated_topics.is_empty() {
        writeln!(output, "3. CURATED TOPICS (authoritative)")?;
        for name in curated_topics.iter().take(RELATED_TOPIC_LIMIT) {
            writeln!(output, "   - {name}")?;
        }
        if curated_topics.len() > RELATED_TOPIC_LIMIT {
            writeln!(
                output,
                "   ... and {} more",
                curated_topics.len() - RELATED_TOPIC_LIMIT
            )?;
        }
        writeln!(output)?;
    }

    writeln!(output, "4. SEARCH RAW CHUNKS (non-authoritative)")?;
    writeln!(output, "   docknow search \"{topic}\"")?;
    writeln!(output)?;
    writeln!(output, "{rule}")?;
    writeln!(output, "REMINDER: only curated topic files are authoritative.")?;
    writeln!(output, "{rule}")?;
    Ok(())
}

pub fn write_topic_list<W: Write>(output: &mut W, topics: &[String]) -> Result<()> {
    if topics.is_empty() {
        writeln!(output, "No curated topics found.")?;
        return Ok(());
    }
    writeln!(output, "CURATED TOPICS:")?;
    for topic in topics {
        writeln!(output, "  - {topic}")?;
    }
    Ok(())
}
