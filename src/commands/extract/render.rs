use super::*;

/// Page markdown: a fixed preamble the chunker skips, then one paragraph or
/// `##`/`###`/`####` heading per block.
pub fn format_page_markdown(doc_name: &str, page_number: usize, blocks: &[AnnotatedBlock]) -> String {
    let mut lines = vec![
        format!("# {doc_name} - Page {page_number}"),
        String::new(),
        format!("> Extracted from: {doc_name}"),
        format!("> Page: {page_number}"),
        "> Extraction: Mechanical (no LLM)".to_string(),
        String::new(),
        "---".to_string(),
        String::new(),
    ];

    for block in blocks {
        let line = match block.heading_level {
            1 => format!("## {}", block.text),
            2 => format!("### {}", block.text),
            3 => format!("#### {}", block.text),
            _ => block.text.clone(),
        };
        lines.push(line);
        lines.push(String::new());
    }

    lines.join("\n")
}

pub fn page_file_name(page_number: usize) -> String {
    format!("page_{page_number:04}.md")
}
