use crate::error::Result;
use crate::types::{DetectedFace, EmbeddingRecord};

/// Face detection and embedding extraction, provided by an ML backend.
pub trait FaceDetector: Send + Sync {
    fn dim(&self) -> usize;
    fn detect(&self, image: &[u8]) -> anyhow::Result<Vec<DetectedFace>>;
}

/// Blob storage for uploaded person images. Returns the stored image's source identifier.
pub trait BlobStore: Send + Sync {
    fn upload(&self, source: &str, image: &[u8]) -> anyhow::Result<String>;
}

/// Whole-collection durability for the canonical record store.
pub trait RecordPersistence: Send + Sync {
    fn load(&self) -> Result<Vec<EmbeddingRecord>>;
    fn save(&self, records: &[EmbeddingRecord]) -> Result<()>;
}
