use super::*;

const EXTRACTOR: &str = "pdftotext -bbox-layout";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractRunSummary {
    pub documents_extracted: usize,
    pub documents_failed: usize,
    pub pages_extracted: usize,
}

/// Where a PDF's pages land and what provenance they carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub document: String,
    pub project_name: Option<String>,
    pub relative_path: Option<String>,
    pub output_directory: PathBuf,
}

impl SourceLocation {
    pub fn resolve(pdf_path: &Path, sources_root: &Path, output_root: &Path) -> Self {
        let document = pdf_path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("document")
            .to_string();

        let relative_dir = pdf_path
            .parent()
            .and_then(|parent| parent.strip_prefix(sources_root).ok())
            .map(Path::to_path_buf)
            .unwrap_or_default();

        let components = relative_dir
            .components()
            .filter_map(|component| component.as_os_str().to_str())
            .collect::<Vec<&str>>();

        Self {
            output_directory: output_root.join(&relative_dir).join(&document),
            document,
            project_name: components.first().map(|name| name.to_string()),
            relative_path: (!components.is_empty()).then(|| components.join("/")),
        }
    }
}

pub fn run(args: ExtractArgs) -> Result<()> {
    let (layout, policy) = args.project.resolve()?;
    let sources_root = args.sources.clone().unwrap_or_else(|| layout.sources.clone());
    let output_root = args.output.clone().unwrap_or_else(|| layout.extracted.clone());

    let pdfs = match &args.file {
        Some(file) => {
            if !file.is_file() {
                bail!("pdf not found: {}", file.display());
            }
            vec![file.clone()]
        }
        None => discover_pdfs(&sources_root)?,
    };

    if pdfs.is_empty() {
        bail!("no pdf files found in {}", sources_root.display());
    }

    info!(
        sources = %sources_root.display(),
        output = %output_root.display(),
        documents = pdfs.len(),
        max_pages = ?args.max_pages,
        "starting extraction"
    );

    let extractor_version =
        command_version("pdftotext", &["-v"]).unwrap_or_else(|| "unknown".to_string());
    let mut summary = ExtractRunSummary::default();

    for pdf_path in &pdfs {
        let location = SourceLocation::resolve(pdf_path, &sources_root, &output_root);
        let result = extract_pdf(
            pdf_path,
            &location,
            &extractor_version,
            args.max_pages,
            &policy,
        );

        match result {
            Ok(metadata) if metadata.error.is_none() => {
                info!(
                    document = %metadata.source_document,
                    pages = metadata.pages_extracted,
                    "extracted document"
                );
                summary.documents_extracted += 1;
                summary.pages_extracted += metadata.pages_extracted;
            }
            Ok(_) => summary.documents_failed += 1,
            Err(error) if is_refusal(&error) => return Err(error),
            Err(error) => {
                warn!(pdf = %pdf_path.display(), error = %format!("{error:#}"), "extraction failed");
                summary.documents_failed += 1;
            }
        }
    }

    info!(
        documents_extracted = summary.documents_extracted,
        documents_failed = summary.documents_failed,
        pages_extracted = summary.pages_extracted,
        "extraction completed"
    );

    Ok(())
}

/// PDFs below `root`, case-insensitive on the extension. Symlinks are not
/// followed.
pub fn discover_pdfs(root: &Path) -> Result<Vec<PathBuf>> {
    let mut pdfs = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.with_context(|| format!("failed to walk {}", root.display()))?;
        if entry.file_type().is_file() && is_pdf(entry.path()) {
            pdfs.push(entry.into_path());
        }
    }
    pdfs.sort();
    Ok(pdfs)
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| extension.eq_ignore_ascii_case("pdf"))
}

/// Extracts one PDF. Tool failures are recorded in the returned metadata
/// (and its file); only write failures come back as `Err`.
pub fn extract_pdf(
    pdf_path: &Path,
    location: &SourceLocation,
    extractor_version: &str,
    max_pages: Option<usize>,
    policy: &GovernancePolicy,
) -> Result<ExtractionMetadata> {
    let mut metadata = ExtractionMetadata {
        source_document: location.document.clone(),
        source_file: pdf_path.display().to_string(),
        source_hash: None,
        project_name: location.project_name.clone(),
        relative_path: location.relative_path.clone(),
        extraction_time: now_utc_string(),
        extractor: EXTRACTOR.to_string(),
        extractor_version: extractor_version.to_string(),
        pages_extracted: 0,
        output_directory: location.output_directory.display().to_string(),
        error: None,
    };
    let metadata_path = location.output_directory.join(EXTRACTION_METADATA_FILE);

    let pages = match sha256_file(pdf_path).and_then(|hash| {
        metadata.source_hash = Some(hash);
        let xhtml = run_pdftotext_bbox(pdf_path, max_pages)?;
        parse_bbox_layout(&xhtml)
    }) {
        Ok(pages) => pages,
        Err(error) => {
            warn!(pdf = %pdf_path.display(), error = %format!("{error:#}"), "extraction failed");
            metadata.error = Some(format!("{error:#}"));
            policy.write_json(&metadata_path, &metadata)?;
            return Ok(metadata);
        }
    };

    write_pages(&location.document, &pages, &location.output_directory, policy)?;
    metadata.pages_extracted = pages.len();
    policy.write_json(&metadata_path, &metadata)?;

    Ok(metadata)
}

pub fn write_pages(
    document: &str,
    pages: &[PdfPage],
    output_directory: &Path,
    policy: &GovernancePolicy,
) -> Result<()> {
    for (offset, page) in pages.iter().enumerate() {
        let page_number = offset + 1;
        let markdown = format_page_markdown(document, page_number, &annotate_headings(page));
        policy.write_text(&output_directory.join(page_file_name(page_number)), &markdown)?;
    }
    Ok(())
}

fn run_pdftotext_bbox(pdf_path: &Path, max_pages: Option<usize>) -> Result<String> {
    let mut command = Command::new("pdftotext");
    command.arg("-bbox-layout").arg("-enc").arg("UTF-8").arg("-f").arg("1");
    if let Some(max_pages) = max_pages {
        command.arg("-l").arg(max_pages.to_string());
    }
    command.arg(pdf_path).arg("-");

    let output = command
        .output()
        .with_context(|| format!("failed to execute pdftotext for {}", pdf_path.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "pdftotext returned non-zero exit status for {}: {}",
            pdf_path.display(),
            stderr.trim()
        );
    }

    Ok(String::from_utf8_lossy(&output.stdout).replace('\u{0000}', ""))
}

fn command_version(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let source = if stdout.trim().is_empty() {
        stderr.trim()
    } else {
        stdout.trim()
    };

    source
        .lines()
        .next()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.to_string())
}
