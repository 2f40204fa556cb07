use super::*;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextLine {
    pub words: Vec<String>,
    /// Line box height, used as the font size.
    pub height: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextBlock {
    pub lines: Vec<TextLine>,
}

impl TextBlock {
    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(|line| line.words.join(" "))
            .collect::<Vec<String>>()
            .join(" ")
            .trim()
            .to_string()
    }

    fn max_height(&self) -> f64 {
        self.lines
            .iter()
            .map(|line| line.height)
            .fold(0.0, f64::max)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PdfPage {
    pub blocks: Vec<TextBlock>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedBlock {
    pub text: String,
    pub heading_level: u8,
}

/// Reads the XHTML that `pdftotext -bbox-layout` prints into
/// page/block/line/word structure. Entities in word text and attributes are
/// decoded by the XML reader.
pub fn parse_bbox_layout(xhtml: &str) -> Result<Vec<PdfPage>> {
    let mut reader = Reader::from_str(xhtml);
    let mut pages = Vec::<PdfPage>::new();
    let mut word = None::<String>;

    loop {
        let event = reader
            .read_event()
            .with_context(|| format!("malformed bbox layout at byte {}", reader.buffer_position()))?;

        match event {
            Event::Start(element) => {
                if element.name().as_ref() == b"word" {
                    word = Some(String::new());
                } else {
                    open_element(&mut pages, &element)?;
                }
            }
            Event::Empty(element) => open_element(&mut pages, &element)?,
            Event::Text(text) => {
                if let Some(word) = word.as_mut() {
                    word.push_str(&text.unescape().context("bad entity in word text")?);
                }
            }
            Event::End(element) if element.name().as_ref() == b"word" => {
                let Some(text) = word.take() else {
                    continue;
                };
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                if let Some(line) = pages
                    .last_mut()
                    .and_then(|page| page.blocks.last_mut())
                    .and_then(|block| block.lines.last_mut())
                {
                    line.words.push(text.to_string());
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(pages)
}

fn open_element(pages: &mut Vec<PdfPage>, element: &BytesStart<'_>) -> Result<()> {
    match element.name().as_ref() {
        b"page" => pages.push(PdfPage::default()),
        b"block" => {
            if let Some(page) = pages.last_mut() {
                page.blocks.push(TextBlock::default());
            }
        }
        b"line" => {
            let height = match (
                attribute_f64(element, "yMin")?,
                attribute_f64(element, "yMax")?,
            ) {
                (Some(top), Some(bottom)) => (bottom - top).abs(),
                _ => 0.0,
            };
            if let Some(block) = pages.last_mut().and_then(|page| page.blocks.last_mut()) {
                block.lines.push(TextLine {
                    words: Vec::new(),
                    height,
                });
            }
        }
        _ => {}
    }
    Ok(())
}

fn attribute_f64(element: &BytesStart<'_>, name: &str) -> Result<Option<f64>> {
    let Some(attribute) = element
        .try_get_attribute(name)
        .with_context(|| format!("bad attributes on <{}>", String::from_utf8_lossy(element.name().as_ref())))?
    else {
        return Ok(None);
    };
    let value = attribute
        .unescape_value()
        .with_context(|| format!("bad {name} attribute"))?;
    Ok(value.trim().parse::<f64>().ok())
}

/// Heading tiers relative to the page's median line height: above 1.5×,
/// 1.25× and 1.1× give levels 1, 2 and 3.
pub fn annotate_headings(page: &PdfPage) -> Vec<AnnotatedBlock> {
    let mut heights = page
        .blocks
        .iter()
        .flat_map(|block| block.lines.iter().map(|line| line.height))
        .filter(|height| *height > 0.0)
        .collect::<Vec<f64>>();
    heights.sort_by(f64::total_cmp);
    let median = heights.get(heights.len() / 2).copied();

    page.blocks
        .iter()
        .filter_map(|block| {
            let text = block.text();
            if text.is_empty() {
                return None;
            }

            let heading_level = match median {
                Some(median) => {
                    let size = block.max_height();
                    if size > median * 1.5 {
                        1
                    } else if size > median * 1.25 {
                        2
                    } else if size > median * 1.1 {
                        3
                    } else {
                        0
                    }
                }
                None => 0,
            };

            Some(AnnotatedBlock {
                text,
                heading_level,
            })
        })
        .collect()
}
