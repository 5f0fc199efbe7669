use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Errors raised while loading or persisting the similarity artifact.
#[derive(Debug, Error)]
pub enum TableError {
    #[error("failed to read similarity table: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse similarity table: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Immutable item-type to item-type similarity scores in [0, 1].
///
/// Built offline from word embeddings (see [`build_table`]), persisted as
/// JSON and loaded read-only at scoring time. Never mutated once loaded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeSimilarityTable {
    entries: HashMap<String, HashMap<String, f64>>,
}

impl TypeSimilarityTable {
    pub fn new(entries: HashMap<String, HashMap<String, f64>>) -> Self {
        Self { entries }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, TableError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), TableError> {
        fs::write(path, serde_json::to_string(self)?)?;
        Ok(())
    }

    /// Similarity of two item types.
    ///
    /// Looks up `a -> b` first; when that entry is absent or zero, falls
    /// back to `b -> a`, so the lookup is symmetric even if only one
    /// direction was written. Unknown types score 0.
    pub fn score(&self, a: &str, b: &str) -> f64 {
        let direct = self
            .entries
            .get(a)
            .and_then(|row| row.get(b))
            .copied()
            .unwrap_or(0.0);
        if direct != 0.0 {
            return direct;
        }
        self.entries
            .get(b)
            .and_then(|row| row.get(a))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Source of embedding vectors for item-type names.
pub trait EmbeddingLookup {
    fn vector(&self, term: &str) -> Option<&[f32]>;
}

/// Word embeddings loaded from word2vec text format: one `term v1 v2 ...`
/// row per line, no header.
#[derive(Debug, Default)]
pub struct WordEmbeddings {
    vectors: HashMap<String, Vec<f32>>,
}

impl WordEmbeddings {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, TableError> {
        let raw = fs::read_to_string(path)?;
        let mut vectors = HashMap::new();
        for line in raw.lines() {
            let mut fields = line.split_whitespace();
            let Some(term) = fields.next() else { continue };
            let vector: Vec<f32> = fields.filter_map(|f| f.parse().ok()).collect();
            if !vector.is_empty() {
                vectors.insert(term.to_string(), vector);
            }
        }
        Ok(Self { vectors })
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

impl EmbeddingLookup for WordEmbeddings {
    fn vector(&self, term: &str) -> Option<&[f32]> {
        self.vectors.get(term).map(Vec::as_slice)
    }
}

impl EmbeddingLookup for HashMap<String, Vec<f32>> {
    fn vector(&self, term: &str) -> Option<&[f32]> {
        self.get(term).map(Vec::as_slice)
    }
}

/// Build the similarity table for every pair of known types.
///
/// Types without an embedding vector get no pair entries (only the fixed
/// self-similarity of 1.0) and are logged. Negative cosines clamp to 0 so
/// every stored score stays in [0, 1].
pub fn build_table(types: &[String], embeddings: &dyn EmbeddingLookup) -> TypeSimilarityTable {
    let mut entries: HashMap<String, HashMap<String, f64>> = HashMap::new();

    for a in types {
        let row = entries.entry(a.clone()).or_default();
        row.insert(a.clone(), 1.0);

        let Some(vector_a) = embeddings.vector(a) else {
            info!("type {} absent from embedding space, skipping pairs", a);
            continue;
        };
        for b in types {
            if a == b {
                continue;
            }
            let Some(vector_b) = embeddings.vector(b) else {
                info!("type {} absent from embedding space, skipping pair", b);
                continue;
            };
            let similarity = cosine_similarity(vector_a, vector_b).max(0.0) as f64;
            entries
                .entry(a.clone())
                .or_default()
                .insert(b.clone(), similarity.min(1.0));
        }
    }

    TypeSimilarityTable::new(entries)
}

/// Cosine similarity between two embedding vectors. Dimension mismatch and
/// zero-norm inputs score 0.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
