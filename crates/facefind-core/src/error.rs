use thiserror::Error;

#[derive(Debug, Error)]
pub enum FaceError {
    #[error("No face detected in the input image")]
    NoFaceDetected,

    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Worker {worker} did not reply within {timeout_ms}ms")]
    WorkerTimeout { worker: usize, timeout_ms: u64 },

    #[error("Worker {worker} faulted: {reason}")]
    WorkerFault { worker: usize, reason: String },

    #[error("Failed to persist embedding records: {0}")]
    PersistFailed(String),

    #[error("Face detection failed: {0}")]
    Detection(String),

    #[error("Image upload failed: {0}")]
    UploadFailed(String),

    #[error("Invalid embedding record: {0}")]
    InvalidRecord(String),

    #[error("Malformed query embedding: {0}")]
    MalformedQuery(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Worker pool is shut down")]
    PoolClosed,
}

impl FaceError {
    /// Transient failures the caller may retry as a whole.
    pub fn is_transient(&self) -> bool {
        matches!(self, FaceError::WorkerTimeout { .. } | FaceError::WorkerFault { .. })
    }
}

pub type Result<T> = std::result::Result<T, FaceError>;
