//! Domain types shared by the store, the matcher and the worker pool.

use serde::{Deserialize, Serialize};

use crate::error::{FaceError, Result};

/// One detected face, as produced by the detection collaborator.
///
/// The dimensionality is whatever the embedding model emits; nothing here
/// assumes a fixed length.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FaceEmbedding(Vec<f32>);

impl FaceEmbedding {
    pub fn new(values: Vec<f32>) -> Self { Self(values) }

    pub fn as_slice(&self) -> &[f32] { &self.0 }

    pub fn dim(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }

    pub fn is_finite(&self) -> bool { self.0.iter().all(|v| v.is_finite()) }
}

impl From<Vec<f32>> for FaceEmbedding {
    fn from(values: Vec<f32>) -> Self { Self(values) }
}

impl AsRef<[f32]> for FaceEmbedding {
    fn as_ref(&self) -> &[f32] { &self.0 }
}

/// A registered face: who it is, where the image came from, and its embedding.
///
/// Records are created once per detected face at registration time and are
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub source: String,
    pub embedding: FaceEmbedding,
}

impl EmbeddingRecord {
    pub fn new(name: impl Into<String>, source: impl Into<String>, embedding: impl Into<FaceEmbedding>) -> Self {
        Self { name: name.into(), source: source.into(), embedding: embedding.into() }
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(FaceError::InvalidRecord("record has no name".to_string()));
        }
        if self.embedding.is_empty() {
            return Err(FaceError::InvalidRecord(format!("record '{}' has an empty embedding", self.name)));
        }
        if !self.embedding.is_finite() {
            return Err(FaceError::InvalidRecord(format!("record '{}' has non-finite embedding values", self.name)));
        }
        Ok(())
    }
}

/// Best match of a query against a record collection.
///
/// `similarity == 0.0` with empty `name`/`source` is the "no match" sentinel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub name: String,
    pub source: String,
    pub similarity: f32,
}

impl MatchResult {
    pub fn no_match() -> Self {
        Self { name: String::new(), source: String::new(), similarity: 0.0 }
    }

    pub fn is_match(&self) -> bool { self.similarity > 0.0 }
}

/// A face returned by the detector: its embedding and the detector's confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedFace {
    pub embedding: FaceEmbedding,
    pub score: f32,
}

/// How strict a match has to be. Named policies resolve to configured thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum MatchPolicy {
    /// Pooled image search ("is this the same person").
    #[default]
    Strict,
    /// Direct match against the canonical store ("worth a look").
    Lenient,
    Custom(f32),
}
