use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::PipelineError;
use crate::model::ChunkRecord;

pub const DEFAULT_MODEL_ID: &str = "hash-bow-384-v1";
pub const DEFAULT_MODEL_NAME: &str = "local hashed bag-of-words and bigrams";
pub const DEFAULT_EMBEDDING_DIM: usize = 384;
pub const DEFAULT_NORMALIZATION: &str = "l2";
pub const DEFAULT_BACKEND: &str = "local-hash-v1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticModelConfig {
    pub model_id: String,
    pub model_name: String,
    pub dimensions: usize,
    pub normalization: String,
    pub backend: String,
}

pub fn resolve_model_config(model_id: &str) -> SemanticModelConfig {
    let trimmed = model_id.trim();
    let resolved_id = if trimmed.is_empty() {
        DEFAULT_MODEL_ID
    } else {
        trimmed
    };

    SemanticModelConfig {
        model_id: resolved_id.to_string(),
        model_name: if resolved_id == DEFAULT_MODEL_ID {
            DEFAULT_MODEL_NAME.to_string()
        } else {
            resolved_id.to_string()
        },
        dimensions: DEFAULT_EMBEDDING_DIM,
        normalization: DEFAULT_NORMALIZATION.to_string(),
        backend: DEFAULT_BACKEND.to_string(),
    }
}

/// Turns text into a fixed-length vector. Implementations must be
/// deterministic for a given config so index and query vectors agree.
pub trait Embedder {
    fn config(&self) -> &SemanticModelConfig;

    fn embed(&self, text: &str) -> Result<Vec<f32>, PipelineError>;
}

#[derive(Debug, Clone)]
pub struct LocalHashEmbedder {
    config: SemanticModelConfig,
}

impl LocalHashEmbedder {
    pub fn new(model_id: &str) -> Self {
        Self {
            config: resolve_model_config(model_id),
        }
    }
}

impl Embedder for LocalHashEmbedder {
    fn config(&self) -> &SemanticModelConfig {
        &self.config
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, PipelineError> {
        Ok(embed_text_local(text, self.config.dimensions))
    }
}

pub fn normalize_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<&str>>().join(" ")
}

/// Section heading (when present) followed by the chunk body.
pub fn chunk_payload_for_embedding(record: &ChunkRecord) -> String {
    let body = normalize_whitespace(&record.raw_text);
    match record
        .section
        .as_deref()
        .map(normalize_whitespace)
        .filter(|section| !section.is_empty())
    {
        Some(section) => format!("{section}\n\n{body}"),
        None => body,
    }
}

pub fn embedding_text_hash(payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn embed_text_local(payload: &str, dimensions: usize) -> Vec<f32> {
    let dims = dimensions.max(8);
    let mut vector = vec![0_f32; dims];
    let tokens = tokenize_payload(payload);

    if tokens.is_empty() {
        return vector;
    }

    for token in &tokens {
        let hash = stable_hash(token);
        let index = (hash % dims as u64) as usize;
        let sign = if (hash >> 63) & 1 == 0 { 1.0 } else { -1.0 };
        let weight = 1.0 + (((hash >> 48) & 0xFF) as f32 / 255.0);
        vector[index] += sign * weight;
    }

    normalize_vector(&mut vector);
    vector
}

/// Dot product; equals cosine similarity for L2-normalised inputs.
pub fn cosine_similarity(left: &[f32], right: &[f32]) -> f64 {
    if left.len() != right.len() || left.is_empty() {
        return 0.0;
    }

    left.iter()
        .zip(right.iter())
        .map(|(left_value, right_value)| f64::from(*left_value) * f64::from(*right_value))
        .sum::<f64>()
}

pub fn encode_embedding_blob(values: &[f32]) -> Vec<u8> {
    let mut out = Vec::<u8>::with_capacity(values.len() * 4);
    for value in values {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

pub fn decode_embedding_blob(blob: &[u8], expected_dim: usize) -> Option<Vec<f32>> {
    if expected_dim == 0 || blob.len() != expected_dim.saturating_mul(4) {
        return None;
    }

    Some(
        blob.chunks_exact(4)
            .map(|bytes| f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
            .collect(),
    )
}

// First eight bytes of SHA-256, so vectors survive toolchain upgrades.
fn stable_hash(value: &str) -> u64 {
    let digest = Sha256::digest(value.as_bytes());
    let mut bytes = [0_u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

fn tokenize_payload(payload: &str) -> Vec<String> {
    let words = payload
        .split_whitespace()
        .map(|value| {
            value
                .chars()
                .filter(|character| character.is_alphanumeric())
                .flat_map(char::to_lowercase)
                .collect::<String>()
        })
        .filter(|value| !value.is_empty())
        .collect::<Vec<String>>();

    let mut features = Vec::<String>::with_capacity(words.len() * 2);
    for (index, word) in words.iter().enumerate() {
        features.push(format!("w:{word}"));
        if let Some(next) = words.get(index + 1) {
            features.push(format!("b:{word}_{next}"));
        }
    }
    features
}

fn normalize_vector(values: &mut [f32]) {
    let squared_norm = values
        .iter()
        .map(|value| f64::from(*value) * f64::from(*value))
        .sum::<f64>();

    if squared_norm <= 0.0 {
        return;
    }

    let norm = squared_norm.sqrt() as f32;
    for value in values {
        *value /= norm;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(section: Option<&str>, text: &str) -> ChunkRecord {
        ChunkRecord {
            id: "doc_chunk_0001".to_string(),
            project_name: None,
            source_document: "doc".to_string(),
            relative_path: None,
            section: section.map(str::to_string),
            page_start: 1,
            page_end: 1,
            raw_text: text.to_string(),
            token_count_estimate: 4,
            chunk_index: 1,
            total_chunks: 1,
            created_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn local_embedding_is_deterministic_and_unit_length() {
        let embedder = LocalHashEmbedder::new(DEFAULT_MODEL_ID);
        let first = embedder.embed("Brake pressure must stay above the limit").expect("embed");
        let second = embedder.embed("brake   pressure must stay above the limit!").expect("embed");

        assert_eq!(first.len(), DEFAULT_EMBEDDING_DIM);
        assert_eq!(first, second);
        let norm = first.iter().map(|v| f64::from(*v).powi(2)).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn empty_text_embeds_to_zero_vector() {
        let vector = embed_text_local("  ...  ", 16);
        assert_eq!(vector, vec![0.0; 16]);
        assert_eq!(cosine_similarity(&vector, &vector), 0.0);
    }

    #[test]
    fn related_text_scores_higher_than_unrelated_text() {
        let query = embed_text_local("hydraulic brake pressure", DEFAULT_EMBEDDING_DIM);
        let related = embed_text_local(
            "check the hydraulic brake pressure before departure",
            DEFAULT_EMBEDDING_DIM,
        );
        let unrelated = embed_text_local(
            "the cabin lighting schedule for night flights",
            DEFAULT_EMBEDDING_DIM,
        );

        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }

    #[test]
    fn blob_decoding_checks_dimension() {
        let values = vec![0.5_f32, -1.25, 3.0];
        let blob = encode_embedding_blob(&values);

        assert_eq!(blob.len(), 12);
        assert_eq!(decode_embedding_blob(&blob, 3), Some(values));
        assert_eq!(decode_embedding_blob(&blob, 4), None);
        assert_eq!(decode_embedding_blob(&[], 0), None);
    }

    #[test]
    fn model_config_defaults_and_custom_ids() {
        assert_eq!(resolve_model_config("  ").model_id, DEFAULT_MODEL_ID);
        assert_eq!(resolve_model_config("").model_name, DEFAULT_MODEL_NAME);

        let custom = resolve_model_config("team-hash");
        assert_eq!(custom.model_name, "team-hash");
        assert_eq!(custom.dimensions, DEFAULT_EMBEDDING_DIM);
    }

    #[test]
    fn payload_prefixes_section_heading() {
        assert_eq!(
            chunk_payload_for_embedding(&record(Some("Scope"), "line one\n\nline  two")),
            "Scope\n\nline one line two"
        );
        assert_eq!(
            chunk_payload_for_embedding(&record(Some("  "), "body")),
            "body"
        );
        assert_eq!(chunk_payload_for_embedding(&record(None, "body")), "body");
    }
}
