use super::*;

#[derive(Debug, Clone)]
pub(super) struct EmbeddingRow {
    pub(super) record: ChunkRecord,
    pub(super) text_hash: String,
    pub(super) embedding: Vec<u8>,
}

/// One row of the index as search reads it back.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedChunk {
    pub chunk_id: String,
    pub source_document: String,
    pub project_name: Option<String>,
    pub relative_path: Option<String>,
    pub section: Option<String>,
    pub page_start: u32,
    pub page_end: u32,
    pub raw_text: String,
    pub embedding: Vec<f32>,
}

pub(super) fn create_index_database(db_path: &Path) -> Result<Connection> {
    let connection = Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("failed to create index database: {}", db_path.display()))?;

    connection
        .pragma_update(None, "synchronous", "NORMAL")
        .context("failed to set synchronous=NORMAL for index")?;

    connection
        .execute_batch(
            "
            CREATE TABLE IF NOT EXISTS chunk_embeddings (
              row_id INTEGER PRIMARY KEY,
              chunk_id TEXT NOT NULL,
              source_document TEXT NOT NULL,
              project_name TEXT,
              relative_path TEXT,
              section TEXT,
              page_start INTEGER NOT NULL,
              page_end INTEGER NOT NULL,
              chunk_index INTEGER NOT NULL,
              raw_text TEXT NOT NULL,
              text_hash TEXT NOT NULL,
              model_id TEXT NOT NULL,
              embedding_dim INTEGER NOT NULL,
              embedding BLOB NOT NULL,
              generated_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_chunk_embeddings_document
              ON chunk_embeddings(source_document, relative_path, chunk_index);
            CREATE INDEX IF NOT EXISTS idx_chunk_embeddings_chunk
              ON chunk_embeddings(chunk_id);
            ",
        )
        .context("failed to create chunk_embeddings schema")?;

    Ok(connection)
}

pub(super) fn insert_embeddings(
    connection: &mut Connection,
    model_id: &str,
    dimensions: usize,
    rows: &[EmbeddingRow],
) -> Result<usize> {
    let generated_at = now_utc_string();
    let tx = connection.transaction()?;
    {
        let mut statement = tx.prepare(
            "
            INSERT INTO chunk_embeddings(
              chunk_id, source_document, project_name, relative_path, section,
              page_start, page_end, chunk_index, raw_text, text_hash,
              model_id, embedding_dim, embedding, generated_at
            )
            VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            ",
        )?;

        for row in rows {
            let record = &row.record;
            statement.execute(params![
                record.id,
                record.source_document,
                record.project_name,
                record.relative_path,
                record.section,
                i64::from(record.page_start),
                i64::from(record.page_end),
                record.chunk_index as i64,
                record.raw_text,
                row.text_hash,
                model_id,
                dimensions as i64,
                row.embedding,
                generated_at,
            ])?;
        }
    }
    let stored = tx.query_row("SELECT COUNT(*) FROM chunk_embeddings", [], |row| {
        row.get::<_, i64>(0)
    })?;
    tx.commit()?;

    Ok(stored as usize)
}

/// Reads every embedding of the index, in (document, relative path, chunk
/// index) order.
/// Rows whose blob does not match their declared dimension are skipped.
pub fn load_index(db_path: &Path) -> Result<(String, Vec<IndexedChunk>)> {
    let connection = Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .with_context(|| format!("failed to open index database: {}", db_path.display()))?;

    let mut statement = connection.prepare(
        "
        SELECT chunk_id, source_document, project_name, relative_path, section,
               page_start, page_end, raw_text, model_id, embedding_dim, embedding
        FROM chunk_embeddings
        ORDER BY source_document ASC, relative_path ASC, chunk_index ASC, row_id ASC
        ",
    )?;

    let mut rows = statement.query([])?;
    let mut model_id = String::new();
    let mut out = Vec::<IndexedChunk>::new();

    while let Some(row) = rows.next()? {
        let row_model: String = row.get(8)?;
        let dimension = row.get::<_, i64>(9)? as usize;
        let blob: Vec<u8> = row.get(10)?;
        let Some(embedding) = decode_embedding_blob(&blob, dimension) else {
            continue;
        };

        model_id = row_model;
        out.push(IndexedChunk {
            chunk_id: row.get(0)?,
            source_document: row.get(1)?,
            project_name: row.get(2)?,
            relative_path: row.get(3)?,
            section: row.get(4)?,
            page_start: row.get::<_, i64>(5)? as u32,
            page_end: row.get::<_, i64>(6)? as u32,
            raw_text: row.get(7)?,
            embedding,
        });
    }

    Ok((model_id, out))
}
