use super::*;

use std::fs;

use tempfile::TempDir;

use crate::commands::chunk::segment::Segmenter;
use crate::layout::ProjectLayout;

fn line(y_min: f64, height: f64, words: &[&str]) -> String {
    let words = words
        .iter()
        .map(|word| format!(r#"<word xMin="72.0" yMin="{y_min}" xMax="90.0" yMax="{}">{word}</word>"#, y_min + height))
        .collect::<Vec<String>>()
        .join("\n");
    format!(
        r#"<line xMin="72.0" yMin="{y_min:.6}" xMax="540.0" yMax="{:.6}">
{words}
</line>"#,
        y_min + height
    )
}

fn block(lines: &[String]) -> String {
    format!(
        "<block xMin=\"72.0\" yMin=\"0.0\" xMax=\"540.0\" yMax=\"700.0\">\n{}\n</block>",
        lines.join("\n")
    )
}

fn document(pages: &[Vec<String>]) -> String {
    let pages = pages
        .iter()
        .map(|blocks| {
            format!(
                "<page width=\"612.000000\" height=\"792.000000\">\n<flow>\n{}\n</flow>\n</page>",
                blocks.join("\n")
            )
        })
        .collect::<Vec<String>>()
        .join("\n");
    format!(
        "<!DOCTYPE html>\n<html xmlns=\"http://www.w3.org/1999/xhtml\">\n<head>\n<title></title>\n</head>\n<body>\n<doc>\n{pages}\n</doc>\n</body>\n</html>\n"
    )
}

fn sample_page() -> Vec<String> {
    vec![
        block(&[line(50.0, 20.0, &["Chapter", "One"])]),
        block(&[line(90.0, 14.0, &["Scope"])]),
        block(&[
            line(120.0, 10.0, &["The", "system", "shall"]),
            line(132.0, 10.0, &["reject", "&lt;null&gt;", "input."]),
        ]),
        block(&[line(150.0, 11.5, &["Minor", "label"])]),
        block(&[line(170.0, 10.0, &["Body", "text", "again."])]),
        block(&[line(190.0, 10.0, &["Tom", "&amp;", "Jerry"])]),
    ]
}

#[test]
fn parser_builds_pages_blocks_lines_and_words() {
    let pages = parse_bbox_layout(&document(&[sample_page(), vec![]])).expect("parse");

    assert_eq!(pages.len(), 2);
    assert_eq!(pages[0].blocks.len(), 6);
    assert!(pages[1].blocks.is_empty());

    let paragraph = &pages[0].blocks[2];
    assert_eq!(paragraph.lines.len(), 2);
    assert_eq!(paragraph.lines[0].height, 10.0);
    assert_eq!(paragraph.text(), "The system shall reject <null> input.");
    assert_eq!(pages[0].blocks[5].text(), "Tom & Jerry");
}

#[test]
fn heading_levels_follow_median_line_height() {
    let pages = parse_bbox_layout(&document(&[sample_page()])).expect("parse");
    let annotated = annotate_headings(&pages[0]);

    let levels = annotated
        .iter()
        .map(|block| (block.text.as_str(), block.heading_level))
        .collect::<Vec<(&str, u8)>>();

    // Line heights 20, 14, 10, 10, 11.5, 10, 10: the median is 10.
    assert_eq!(
        levels,
        vec![
            ("Chapter One", 1),
            ("Scope", 2),
            ("The system shall reject <null> input.", 0),
            ("Minor label", 3),
            ("Body text again.", 0),
            ("Tom & Jerry", 0),
        ]
    );
}

#[test]
fn numeric_character_references_are_decoded() {
    let page = vec![block(&[line(
        10.0,
        12.0,
        &["driver&#x27;s", "seat", "&#8212;", "&#39;fixed&#39;", "&quot;A&quot;"],
    )])];
    let pages = parse_bbox_layout(&document(&[page])).expect("parse");

    assert_eq!(pages[0].blocks[0].text(), "driver's seat \u{2014} 'fixed' \"A\"");
}

#[test]
fn malformed_layout_is_an_error() {
    let broken = "<doc><page><block><line yMin=\"1\" yMax=\"2\"><word>x</line></block></page></doc>";
    assert!(parse_bbox_layout(broken).is_err());
}

#[test]
fn uniform_text_has_no_headings() {
    let page = vec![
        block(&[line(10.0, 12.0, &["one"])]),
        block(&[line(30.0, 12.0, &["two"])]),
    ];
    let pages = parse_bbox_layout(&document(&[page])).expect("parse");

    assert!(
        annotate_headings(&pages[0])
            .iter()
            .all(|block| block.heading_level == 0)
    );
}

#[test]
fn page_markdown_carries_preamble_and_heading_markers() {
    let blocks = vec![
        AnnotatedBlock {
            text: "Chapter One".to_string(),
            heading_level: 1,
        },
        AnnotatedBlock {
            text: "Scope".to_string(),
            heading_level: 2,
        },
        AnnotatedBlock {
            text: "Minor".to_string(),
            heading_level: 3,
        },
        AnnotatedBlock {
            text: "Body.".to_string(),
            heading_level: 0,
        },
    ];

    let markdown = format_page_markdown("manual", 7, &blocks);

    assert!(markdown.starts_with("# manual - Page 7\n\n> Extracted from: manual\n> Page: 7\n"));
    assert!(markdown.contains("> Extraction: Mechanical (no LLM)\n\n---\n\n"));
    assert!(markdown.contains("\n## Chapter One\n\n### Scope\n\n#### Minor\n\nBody.\n"));
    assert_eq!(page_file_name(7), "page_0007.md");
    assert_eq!(page_file_name(12345), "page_12345.md");
}

#[test]
fn rendered_pages_segment_into_titled_sections() {
    let pages = parse_bbox_layout(&document(&[sample_page()])).expect("parse");
    let markdown = format_page_markdown("manual", 1, &annotate_headings(&pages[0]));

    let segmenter = Segmenter::new().expect("segmenter");
    let sections = segmenter.extract_sections(&markdown, 1);

    let headings = sections
        .iter()
        .map(|section| section.heading.as_deref())
        .collect::<Vec<Option<&str>>>();
    assert_eq!(headings, vec![Some("Scope"), Some("Minor label")]);
    assert!(sections[0].text.contains("reject <null> input."));
    assert_eq!(sections[1].text, "Body text again.\n\nTom & Jerry");
}

#[test]
fn source_location_mirrors_relative_directory() {
    let sources = Path::new("/work/sources");
    let output = Path::new("/work/extracted");

    let nested = SourceLocation::resolve(
        Path::new("/work/sources/Fleet/2024/Ops Manual.pdf"),
        sources,
        output,
    );
    assert_eq!(nested.document, "Ops Manual");
    assert_eq!(nested.project_name.as_deref(), Some("Fleet"));
    assert_eq!(nested.relative_path.as_deref(), Some("Fleet/2024"));
    assert_eq!(
        nested.output_directory,
        PathBuf::from("/work/extracted/Fleet/2024/Ops Manual")
    );

    let flat = SourceLocation::resolve(Path::new("/work/sources/guide.PDF"), sources, output);
    assert_eq!(flat.document, "guide");
    assert_eq!(flat.project_name, None);
    assert_eq!(flat.relative_path, None);
    assert_eq!(flat.output_directory, PathBuf::from("/work/extracted/guide"));

    let outside = SourceLocation::resolve(Path::new("/elsewhere/loose.pdf"), sources, output);
    assert_eq!(outside.project_name, None);
    assert_eq!(outside.output_directory, PathBuf::from("/work/extracted/loose"));
}

#[test]
fn discover_pdfs_is_recursive_sorted_and_case_insensitive() {
    let dir = TempDir::new().expect("tempdir");
    let root = dir.path();
    fs::create_dir_all(root.join("B/inner")).expect("mkdir");
    fs::create_dir_all(root.join("A")).expect("mkdir");
    fs::write(root.join("B/inner/deep.PDF"), b"%PDF").expect("write");
    fs::write(root.join("A/first.pdf"), b"%PDF").expect("write");
    fs::write(root.join("A/notes.txt"), b"text").expect("write");
    fs::write(root.join("top.pdf"), b"%PDF").expect("write");

    let found = discover_pdfs(root).expect("discover");

    assert_eq!(
        found,
        vec![
            root.join("A/first.pdf"),
            root.join("B/inner/deep.PDF"),
            root.join("top.pdf"),
        ]
    );
}

#[test]
fn write_pages_numbers_files_and_passes_the_gate() {
    let dir = TempDir::new().expect("tempdir");
    let layout = ProjectLayout::new(dir.path());
    let policy = GovernancePolicy::for_layout(&layout);
    let pages = parse_bbox_layout(&document(&[sample_page(), vec![]])).expect("parse");

    let output = layout.extracted.join("manual");
    write_pages("manual", &pages, &output, &policy).expect("write pages");

    let first = fs::read_to_string(output.join("page_0001.md")).expect("page 1");
    assert!(first.contains("## Chapter One"));
    let second = fs::read_to_string(output.join("page_0002.md")).expect("page 2");
    assert!(second.starts_with("# manual - Page 2"));

    let refused = write_pages("manual", &pages, &layout.procedures.join("manual"), &policy)
        .expect_err("procedures are curated");
    assert!(is_refusal(&refused));
    assert!(!layout.procedures.exists());
}

#[test]
fn unreadable_pdf_records_error_in_metadata() {
    let dir = TempDir::new().expect("tempdir");
    let layout = ProjectLayout::new(dir.path());
    let policy = GovernancePolicy::for_layout(&layout);

    let missing = layout.sources.join("ghost.pdf");
    let location = SourceLocation::resolve(&missing, &layout.sources, &layout.extracted);
    let metadata = extract_pdf(&missing, &location, "test", None, &policy).expect("metadata");

    assert!(metadata.error.is_some());
    assert_eq!(metadata.pages_extracted, 0);
    let stored: ExtractionMetadata =
        crate::util::read_json(&location.output_directory.join(EXTRACTION_METADATA_FILE))
            .expect("metadata file");
    assert_eq!(stored.source_document, "ghost");
    assert!(stored.error.is_some());
}
