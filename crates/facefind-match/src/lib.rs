//! Best-match search of a query embedding against a record collection.
//!
//! Every call is a linear scan: O(N·D) for N candidates of dimension D. There
//! is no index. That is fine for the number of registered people this system
//! expects, and is the first thing to revisit if that number grows.

use std::sync::Arc;

use facefind_core::config::{MatchingConfig, MetricKind};
use facefind_core::error::{FaceError, Result};
use facefind_core::types::{EmbeddingRecord, MatchResult};
use tracing::trace;

/// Similarity score in `[0, 1]`, higher is more alike. Inputs have equal length.
pub trait Similarity: Send + Sync {
    fn name(&self) -> &'static str;
    fn similarity(&self, a: &[f32], b: &[f32]) -> f32;
}

/// Cosine similarity, clamped to `[0, 1]`. A zero vector scores 0 against anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cosine;

impl Similarity for Cosine {
    fn name(&self) -> &'static str { "cosine" }

    fn similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        // f64 accumulation so small-magnitude vectors do not underflow.
        let mut dot = 0f64;
        let mut na = 0f64;
        let mut nb = 0f64;
        for (&x, &y) in a.iter().zip(b) {
            let (x, y) = (f64::from(x), f64::from(y));
            dot += x * y;
            na += x * x;
            nb += y * y;
        }
        if na == 0.0 || nb == 0.0 { return 0.0; }
        ((dot / (na.sqrt() * nb.sqrt())) as f32).clamp(0.0, 1.0)
    }
}

/// Distance-derived score: `1 - multiplier * ||a - b|| / 100`, floored at 0.
#[derive(Debug, Clone, Copy)]
pub struct EuclideanFalloff {
    pub multiplier: f32,
}

impl Default for EuclideanFalloff {
    fn default() -> Self { Self { multiplier: 50.0 } }
}

impl Similarity for EuclideanFalloff {
    fn name(&self) -> &'static str { "euclidean" }

    fn similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        let dist = a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt();
        (1.0 - self.multiplier * dist / 100.0).clamp(0.0, 1.0)
    }
}

pub fn metric_from_config(cfg: &MatchingConfig) -> Arc<dyn Similarity> {
    match cfg.metric {
        MetricKind::Cosine => Arc::new(Cosine),
        MetricKind::Euclidean => Arc::new(EuclideanFalloff { multiplier: cfg.euclidean_multiplier }),
    }
}

/// Best candidate for `query`, or the no-match sentinel when the best score is below `threshold`.
///
/// The first candidate in collection order wins ties. A candidate whose
/// embedding length differs from the query is an error, not a skip, and so is
/// a query with a NaN or infinite component.
pub fn find_best(
    query: &[f32],
    candidates: &[EmbeddingRecord],
    threshold: f32,
    metric: &dyn Similarity,
) -> Result<MatchResult> {
    if query.is_empty() {
        let expected = candidates.first().map(|c| c.embedding.dim()).unwrap_or(0);
        return Err(FaceError::DimensionMismatch { expected, actual: 0 });
    }
    if let Some(pos) = query.iter().position(|v| !v.is_finite()) {
        return Err(FaceError::MalformedQuery(format!("non-finite component at index {pos}")));
    }
    let mut best: Option<(usize, f32)> = None;
    for (idx, candidate) in candidates.iter().enumerate() {
        let emb = candidate.embedding.as_slice();
        if emb.len() != query.len() {
            return Err(FaceError::DimensionMismatch { expected: emb.len(), actual: query.len() });
        }
        let score = metric.similarity(query, emb);
        if best.map_or(true, |(_, s)| score > s) { best = Some((idx, score)); }
    }
    let Some((idx, score)) = best else { return Ok(MatchResult::no_match()) };
    trace!(metric = metric.name(), best = idx, score, threshold, "scored candidates");
    if score >= threshold && score > 0.0 {
        let c = &candidates[idx];
        Ok(MatchResult { name: c.name.clone(), source: c.source.clone(), similarity: score })
    } else {
        Ok(MatchResult::no_match())
    }
}
