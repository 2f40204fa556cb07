use super::*;

pub const MIN_CHUNK_TOKENS: usize = 300;
pub const MAX_CHUNK_TOKENS: usize = 800;
/// Informational only; falls out of the min/max bounds and the merge policy.
pub const TARGET_CHUNK_TOKENS: usize = 500;

const TOKENS_PER_WORD: f64 = 1.3;

/// Text under one heading within a single page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub heading: Option<String>,
    pub text: String,
    pub level: u8,
    pub page: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateChunk {
    pub section: Option<String>,
    pub text: String,
    pub page_start: u32,
    pub page_end: u32,
    pub token_estimate: usize,
}

/// Word-count proxy for language-model tokens.
pub fn estimate_tokens(text: &str) -> usize {
    tokens_for_words(text.split_whitespace().count())
}

pub fn tokens_for_words(words: usize) -> usize {
    (words as f64 * TOKENS_PER_WORD).round() as usize
}

/// Number of leading lines that form the extractor's page preamble: title,
/// provenance quotes and blanks, through the first `---` rule. Quote or
/// rule lines further down the page are body text.
fn preamble_length(lines: &[&str]) -> usize {
    for (index, line) in lines.iter().enumerate() {
        if line.starts_with("---") {
            return index + 1;
        }
        let preamble_shaped =
            line.trim().is_empty() || line.starts_with('>') || line.starts_with("# ");
        if !preamble_shaped {
            return index;
        }
    }
    lines.len()
}

#[derive(Debug)]
struct SectionAccumulator {
    heading: Option<String>,
    level: u8,
    lines: Vec<String>,
}

impl SectionAccumulator {
    fn untitled() -> Self {
        Self {
            heading: None,
            level: 0,
            lines: Vec::new(),
        }
    }

    fn titled(heading: String, level: u8) -> Self {
        Self {
            heading: Some(heading),
            level,
            lines: Vec::new(),
        }
    }

    fn close(self, page: u32, sections: &mut Vec<Section>) {
        let text = self.lines.join("\n").trim().to_string();
        if text.is_empty() {
            return;
        }

        sections.push(Section {
            heading: self.heading,
            text,
            level: self.level,
            page,
        });
    }
}

#[derive(Debug)]
pub struct Segmenter {
    heading: Regex,
    paragraph_break: Regex,
}

impl Segmenter {
    pub fn new() -> Result<Self> {
        Ok(Self {
            heading: Regex::new(r"^(#{2,4})\s+(.+)$")
                .context("failed to compile heading regex")?,
            paragraph_break: Regex::new(r"\n\s*\n")
                .context("failed to compile paragraph break regex")?,
        })
    }

    pub fn segment_page(&self, content: &str, page: u32) -> Vec<CandidateChunk> {
        let sections = self.extract_sections(content, page);
        self.chunk_sections(&sections)
    }

    pub fn extract_sections(&self, content: &str, page: u32) -> Vec<Section> {
        let mut sections = Vec::new();
        let mut current = SectionAccumulator::untitled();

        let lines = content.split('\n').collect::<Vec<&str>>();
        for line in &lines[preamble_length(&lines)..] {
            if let Some(captures) = self.heading.captures(line) {
                let level = captures.get(1).map(|m| m.as_str().len()).unwrap_or(0) as u8;
                let heading = captures
                    .get(2)
                    .map(|m| m.as_str().trim().to_string())
                    .unwrap_or_default();

                let previous =
                    std::mem::replace(&mut current, SectionAccumulator::titled(heading, level));
                previous.close(page, &mut sections);
                continue;
            }

            current.lines.push(line.to_string());
        }

        current.close(page, &mut sections);
        sections
    }

    pub fn chunk_sections(&self, sections: &[Section]) -> Vec<CandidateChunk> {
        let mut chunks = Vec::new();

        for section in sections {
            let tokens = estimate_tokens(&section.text);
            if tokens <= MAX_CHUNK_TOKENS {
                chunks.push(CandidateChunk {
                    section: section.heading.clone(),
                    text: section.text.clone(),
                    page_start: section.page,
                    page_end: section.page,
                    token_estimate: tokens,
                });
                continue;
            }

            self.split_section(section, &mut chunks);
        }

        chunks
    }

    /// Greedy paragraph packing; a single paragraph over the limit is kept whole.
    fn split_section(&self, section: &Section, chunks: &mut Vec<CandidateChunk>) {
        let mut buffer = Vec::<&str>::new();
        let mut buffer_words = 0usize;

        let flush = |buffer: &[&str], words: usize, chunks: &mut Vec<CandidateChunk>| {
            chunks.push(CandidateChunk {
                section: section.heading.clone(),
                text: buffer.join("\n\n"),
                page_start: section.page,
                page_end: section.page,
                token_estimate: tokens_for_words(words),
            });
        };

        for paragraph in self.paragraph_break.split(&section.text) {
            let words = paragraph.split_whitespace().count();

            if !buffer.is_empty() && tokens_for_words(buffer_words + words) > MAX_CHUNK_TOKENS {
                flush(&buffer, buffer_words, chunks);
                buffer.clear();
                buffer_words = 0;
            }

            buffer.push(paragraph);
            buffer_words += words;
        }

        if !buffer.is_empty() {
            flush(&buffer, buffer_words, chunks);
        }
    }
}

/// Folds undersized chunks into their successor when both share a heading
/// and the result stays within the maximum. One pass, left to right.
pub fn merge_small_chunks(chunks: Vec<CandidateChunk>) -> Vec<CandidateChunk> {
    let mut remaining = chunks.into_iter();
    let Some(mut current) = remaining.next() else {
        return Vec::new();
    };

    let mut merged = Vec::new();
    for chunk in remaining {
        let combined = current.token_estimate + chunk.token_estimate;

        if chunk.section == current.section
            && combined <= MAX_CHUNK_TOKENS
            && current.token_estimate < MIN_CHUNK_TOKENS
        {
            current.text.push_str("\n\n");
            current.text.push_str(&chunk.text);
            current.page_end = chunk.page_end;
            current.token_estimate = combined;
        } else {
            merged.push(std::mem::replace(&mut current, chunk));
        }
    }

    merged.push(current);
    merged
}
