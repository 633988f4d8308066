//! Append-only, insertion-ordered collection of embedding records.
//!
//! The coordinator owns the canonical instance; every worker owns a private
//! one seeded from a snapshot and extended by insert broadcasts, so a worker
//! copy is always a prefix of the canonical store.

use tracing::warn;

use crate::error::{FaceError, Result};
use crate::types::EmbeddingRecord;

#[derive(Debug, Clone, Default)]
pub struct EmbeddingRecordStore {
    records: Vec<EmbeddingRecord>,
    dimension: Option<usize>,
}

impl EmbeddingRecordStore {
    pub fn new() -> Self { Self::default() }

    /// Build a store from previously persisted records, skipping entries that fail validation.
    pub fn from_records(records: Vec<EmbeddingRecord>) -> Self {
        let mut store = Self::new();
        for (idx, record) in records.into_iter().enumerate() {
            if let Err(e) = store.append(record) {
                warn!(index = idx, error = %e, "skipping invalid persisted record");
            }
        }
        store
    }

    pub fn append(&mut self, record: EmbeddingRecord) -> Result<()> {
        record.validate()?;
        let dim = record.embedding.dim();
        match self.dimension {
            Some(expected) if expected != dim => {
                return Err(FaceError::DimensionMismatch { expected, actual: dim });
            }
            Some(_) => {}
            None => self.dimension = Some(dim),
        }
        self.records.push(record);
        Ok(())
    }

    pub fn snapshot(&self) -> Vec<EmbeddingRecord> { self.records.clone() }

    pub fn records(&self) -> &[EmbeddingRecord] { &self.records }

    pub fn iter(&self) -> impl Iterator<Item = &EmbeddingRecord> { self.records.iter() }

    pub fn len(&self) -> usize { self.records.len() }

    pub fn is_empty(&self) -> bool { self.records.is_empty() }

    /// Embedding length shared by every record, once the first one is in.
    pub fn dimension(&self) -> Option<usize> { self.dimension }
}
