use super::*;

const PROCESSOR: &str = "docknow chunk";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkRunSummary {
    pub documents_processed: usize,
    pub documents_failed: usize,
    pub chunks_created: usize,
    pub token_range: Option<TokenRange>,
}

impl ChunkRunSummary {
    fn record(&mut self, manifest: &ChunkingManifest) {
        if manifest.error.is_some() {
            self.documents_failed += 1;
            return;
        }

        self.documents_processed += 1;
        self.chunks_created += manifest.chunks_created;
        if manifest.chunks_created == 0 {
            return;
        }

        let observed = manifest.token_range;
        self.token_range = Some(match self.token_range {
            Some(range) => TokenRange {
                min: range.min.min(observed.min),
                max: range.max.max(observed.max),
            },
            None => observed,
        });
    }
}

pub fn run(args: ChunkArgs) -> Result<()> {
    let (layout, policy) = args.project.resolve()?;
    let input_root = args.input.clone().unwrap_or_else(|| layout.extracted.clone());
    let output_root = args.output.clone().unwrap_or_else(|| layout.chunks.clone());

    let documents = match &args.doc {
        Some(doc) => {
            let doc_dir = input_root.join(doc);
            if !doc_dir.is_dir() {
                bail!("document not found: {}", doc_dir.display());
            }
            vec![doc_dir]
        }
        None => discover_documents(&input_root)?,
    };

    if documents.is_empty() {
        bail!("no extracted documents found in {}", input_root.display());
    }

    info!(
        input = %input_root.display(),
        output = %output_root.display(),
        documents = documents.len(),
        min_tokens = MIN_CHUNK_TOKENS,
        target_tokens = TARGET_CHUNK_TOKENS,
        max_tokens = MAX_CHUNK_TOKENS,
        "starting chunking"
    );

    let summary = chunk_documents(&documents, &input_root, &output_root, &policy)?;
    let range = summary.token_range.unwrap_or_default();

    info!(
        documents_processed = summary.documents_processed,
        documents_failed = summary.documents_failed,
        chunks_created = summary.chunks_created,
        token_min = range.min,
        token_max = range.max,
        "chunking completed"
    );

    Ok(())
}

pub fn page_file_regex() -> Result<Regex> {
    Regex::new(r"^page_(\d+)\.md$").context("failed to compile page file regex")
}

/// Directories holding page files (or extraction provenance). A document
/// directory is not searched further, and `_`-prefixed directories are
/// skipped.
pub fn discover_documents(root: &Path) -> Result<Vec<PathBuf>> {
    let page_file = page_file_regex()?;
    let mut documents = Vec::new();

    // Files sort ahead of subdirectories, so a document is recognised
    // before any of its subdirectories would be entered.
    let mut walker = WalkDir::new(root)
        .sort_by(|left, right| {
            left.file_type()
                .is_dir()
                .cmp(&right.file_type().is_dir())
                .then_with(|| left.file_name().cmp(right.file_name()))
        })
        .into_iter()
        .filter_entry(|entry| {
            entry.depth() == 0
                || !entry.file_type().is_dir()
                || !entry.file_name().to_string_lossy().starts_with('_')
        });

    while let Some(entry) = walker.next() {
        let entry = entry.with_context(|| format!("failed to walk {}", root.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        if page_file.is_match(&name) || name == EXTRACTION_METADATA_FILE {
            if let Some(doc_dir) = entry.path().parent() {
                documents.push(doc_dir.to_path_buf());
            }
            walker.skip_current_dir();
        }
    }

    documents.sort();
    Ok(documents)
}

/// Page files of one document in numeric page order.
pub fn list_page_files(doc_dir: &Path, page_file: &Regex) -> Result<Vec<(u32, PathBuf)>> {
    let entries = fs::read_dir(doc_dir)
        .with_context(|| format!("failed to read {}", doc_dir.display()))?;

    let mut pages = Vec::new();
    for entry in entries {
        let entry =
            entry.with_context(|| format!("failed to read entry in {}", doc_dir.display()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let Some(name) = file_name_str(&path) else {
            continue;
        };
        let Some(number) = page_file
            .captures(name)
            .and_then(|captures| captures.get(1))
            .and_then(|value| value.as_str().parse::<u32>().ok())
        else {
            continue;
        };

        pages.push((number, path));
    }

    pages.sort();
    Ok(pages)
}

/// Chunks each document in turn. A failing document is logged and skipped;
/// a governance refusal stops the batch.
pub fn chunk_documents(
    documents: &[PathBuf],
    input_root: &Path,
    output_root: &Path,
    policy: &GovernancePolicy,
) -> Result<ChunkRunSummary> {
    let segmenter = Segmenter::new()?;
    let page_file = page_file_regex()?;
    let mut summary = ChunkRunSummary::default();

    for doc_dir in documents {
        match chunk_document(&segmenter, &page_file, doc_dir, input_root, output_root, policy) {
            Ok(manifest) => {
                if manifest.error.is_none() {
                    info!(
                        document = %manifest.source_document,
                        chunks = manifest.chunks_created,
                        token_min = manifest.token_range.min,
                        token_max = manifest.token_range.max,
                        "chunked document"
                    );
                }
                summary.record(&manifest);
            }
            Err(error) if is_refusal(&error) => return Err(error),
            Err(error) => {
                warn!(document = %doc_dir.display(), error = %format!("{error:#}"), "document failed");
                summary.documents_failed += 1;
            }
        }
    }

    Ok(summary)
}

pub fn chunk_document(
    segmenter: &Segmenter,
    page_file: &Regex,
    doc_dir: &Path,
    input_root: &Path,
    output_root: &Path,
    policy: &GovernancePolicy,
) -> Result<ChunkingManifest> {
    let directory_name = file_name_str(doc_dir).unwrap_or("document");
    let relative = doc_dir
        .strip_prefix(input_root)
        .unwrap_or_else(|_| Path::new(directory_name));
    let doc_output_dir = output_root.join(relative);

    let identity = DocumentIdentity::from_provenance(directory_name, load_provenance(doc_dir));

    let mut manifest = ChunkingManifest {
        source_document: identity.name.clone(),
        project_name: identity.project_name.clone(),
        relative_path: identity.relative_path.clone(),
        input_directory: doc_dir.display().to_string(),
        output_directory: doc_output_dir.display().to_string(),
        processing_time: now_utc_string(),
        processor: PROCESSOR.to_string(),
        processor_version: env!("CARGO_PKG_VERSION").to_string(),
        pages_processed: 0,
        chunks_created: 0,
        token_range: TokenRange::default(),
        error: None,
    };
    let manifest_path = doc_output_dir.join(CHUNKING_METADATA_FILE);

    let pages = list_page_files(doc_dir, page_file)?;
    if pages.is_empty() {
        let error = PipelineError::InputMissing {
            path: doc_dir.to_path_buf(),
        };
        warn!(document = %identity.name, error = %error, "skipping document");
        manifest.error = Some(error.to_string());
        policy.write_json(&manifest_path, &manifest)?;
        return Ok(manifest);
    }

    let mut candidates = Vec::new();
    for (page_number, page_path) in &pages {
        let content = fs::read_to_string(page_path)
            .with_context(|| format!("failed to read {}", page_path.display()))?;
        candidates.extend(segmenter.segment_page(&content, *page_number));
        manifest.pages_processed += 1;
    }

    let records = assign_records(&identity, merge_small_chunks(candidates));
    manifest.token_range = observed_token_range(&records);

    for record in &records {
        let chunk_path = doc_output_dir.join(format!("{}.json", record.id));
        policy.write_json(&chunk_path, record)?;
        manifest.chunks_created += 1;
    }

    policy.write_json(&manifest_path, &manifest)?;
    Ok(manifest)
}

fn observed_token_range(records: &[ChunkRecord]) -> TokenRange {
    let estimates = records.iter().map(|record| record.token_count_estimate);
    TokenRange {
        min: estimates.clone().min().unwrap_or(0),
        max: estimates.max().unwrap_or(0),
    }
}

fn load_provenance(doc_dir: &Path) -> DocumentProvenance {
    let path = doc_dir.join(EXTRACTION_METADATA_FILE);
    if !path.exists() {
        return DocumentProvenance::default();
    }

    match read_json::<DocumentProvenance>(&path) {
        Ok(provenance) => provenance,
        Err(error) => {
            let error = PipelineError::MalformedRecord {
                path,
                reason: format!("{error:#}"),
            };
            warn!(error = %error, "ignoring extraction provenance");
            DocumentProvenance::default()
        }
    }
}
