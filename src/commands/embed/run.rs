use super::*;

const GENERATOR: &str = "docknow embed";
const INDEX_WARNING: &str =
    "This index is NOT truth. It is a regenerable search aid built from raw chunks.";
const MARKER_TEXT: &str = "This directory holds a regenerable search index.\n\
It is NOT a source of truth. Delete it freely and rebuild with `docknow embed`.\n";

pub fn run(args: EmbedArgs) -> Result<()> {
    let (layout, policy) = args.project.resolve()?;
    let chunks_dir = args.input.clone().unwrap_or_else(|| layout.chunks.clone());
    let index_dir = args.output.clone().unwrap_or_else(|| layout.index.clone());
    let embedder = LocalHashEmbedder::new(&args.model_id);

    info!(
        input = %chunks_dir.display(),
        output = %index_dir.display(),
        model_id = %embedder.config().model_id,
        force = args.force,
        "starting embedding"
    );

    match build_index(&chunks_dir, &index_dir, &embedder, args.force, &policy)? {
        Some(metadata) => info!(
            path = %index_dir.display(),
            model_id = %metadata.model,
            chunks = metadata.chunk_count,
            dimension = metadata.embedding_dimension,
            "index built"
        ),
        None => info!(
            path = %index_dir.join(INDEX_DB_FILE).display(),
            "index already exists; pass --force to rebuild"
        ),
    }

    Ok(())
}

/// Builds the index from scratch. Returns `None` when an index is present
/// and `force` is off.
pub fn build_index(
    chunks_dir: &Path,
    index_dir: &Path,
    embedder: &dyn Embedder,
    force: bool,
    policy: &GovernancePolicy,
) -> Result<Option<IndexMetadata>> {
    let db_path = index_dir.join(INDEX_DB_FILE);
    if db_path.exists() && !force {
        return Ok(None);
    }

    let artifacts = [
        db_path.clone(),
        index_dir.join(INDEX_CHUNK_IDS_FILE),
        index_dir.join(INDEX_METADATA_FILE),
        index_dir.join(INDEX_MARKER_FILE),
    ];
    for artifact in &artifacts {
        policy.check_write(artifact)?;
    }

    let records = load_chunk_records(chunks_dir)?;
    if records.is_empty() {
        bail!("no chunk records found in {}", chunks_dir.display());
    }

    let config = embedder.config().clone();
    let mut rows = Vec::with_capacity(records.len());
    for record in records {
        let payload = chunk_payload_for_embedding(&record);
        let vector = embedder.embed(&payload)?;
        rows.push(EmbeddingRow {
            text_hash: embedding_text_hash(&payload),
            embedding: encode_embedding_blob(&vector),
            record,
        });
    }

    fs::create_dir_all(index_dir)
        .with_context(|| format!("failed to create directory: {}", index_dir.display()))?;
    if db_path.exists() {
        policy.remove_file(&db_path)?;
    }

    let mut connection = create_index_database(&db_path)?;
    let stored = insert_embeddings(&mut connection, &config.model_id, config.dimensions, &rows)?;
    info!(model_id = %config.model_id, stored, "embeddings committed");

    let chunk_ids = rows
        .iter()
        .map(|row| row.record.id.clone())
        .collect::<Vec<String>>();
    policy.write_json(&index_dir.join(INDEX_CHUNK_IDS_FILE), &chunk_ids)?;

    let metadata = IndexMetadata {
        created_at: now_utc_string(),
        generator: GENERATOR.to_string(),
        generator_version: env!("CARGO_PKG_VERSION").to_string(),
        model: config.model_id.clone(),
        model_name: config.model_name.clone(),
        chunk_count: stored,
        embedding_dimension: config.dimensions,
        is_truth: false,
        regenerable: true,
        warning: INDEX_WARNING.to_string(),
    };
    policy.write_json(&index_dir.join(INDEX_METADATA_FILE), &metadata)?;
    policy.write_text(&index_dir.join(INDEX_MARKER_FILE), MARKER_TEXT)?;

    Ok(Some(metadata))
}
