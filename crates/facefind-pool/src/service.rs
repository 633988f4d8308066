//! Boundary API for the web layer: register a person from an image, or search by image.

use std::sync::Arc;

use facefind_core::error::{FaceError, Result};
use facefind_core::traits::{BlobStore, FaceDetector};
use facefind_core::types::{FaceEmbedding, MatchPolicy, MatchResult};
use tracing::{debug, error, info};

use crate::coordinator::Coordinator;

/// Keeps the caller-supplied source as the image's identifier; nothing is uploaded.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughBlobStore;

impl BlobStore for PassthroughBlobStore {
    fn upload(&self, source: &str, _image: &[u8]) -> anyhow::Result<String> { Ok(source.to_string()) }
}

pub struct FaceService {
    detector: Arc<dyn FaceDetector>,
    blobs: Arc<dyn BlobStore>,
    coordinator: Arc<Coordinator>,
}

impl FaceService {
    pub fn new(detector: Arc<dyn FaceDetector>, blobs: Arc<dyn BlobStore>, coordinator: Arc<Coordinator>) -> Self {
        debug!(dim = detector.dim(), "face service ready");
        Self { detector, blobs, coordinator }
    }

    pub fn coordinator(&self) -> &Arc<Coordinator> { &self.coordinator }

    /// Detect faces, upload the image, then register every detected face under `name`.
    ///
    /// Returns the number of faces registered.
    pub async fn register_person(&self, name: &str, source: &str, image: Vec<u8>) -> Result<usize> {
        let image = Arc::new(image);
        let embeddings = self.detect(image.clone()).await?;
        if embeddings.is_empty() { return Err(FaceError::NoFaceDetected); }

        let blobs = self.blobs.clone();
        let key = source.to_string();
        let stored = tokio::task::spawn_blocking(move || blobs.upload(&key, &image))
            .await
            .map_err(|e| FaceError::UploadFailed(e.to_string()))?
            .map_err(|e| {
                error!(error = %e, "image upload failed");
                FaceError::UploadFailed(format!("{e:#}"))
            })?;

        let count = self.coordinator.insert(name, &stored, &embeddings).await?;
        info!(%name, source = %stored, faces = count, "person registered");
        Ok(count)
    }

    pub async fn search_by_image(&self, image: Vec<u8>) -> Result<MatchResult> {
        self.search_by_image_with(image, MatchPolicy::Strict).await
    }

    pub async fn search_by_image_with(&self, image: Vec<u8>, policy: MatchPolicy) -> Result<MatchResult> {
        let embeddings = self.detect(Arc::new(image)).await?;
        self.coordinator.search_with(&embeddings, policy).await
    }

    async fn detect(&self, image: Arc<Vec<u8>>) -> Result<Vec<FaceEmbedding>> {
        let detector = self.detector.clone();
        let faces = tokio::task::spawn_blocking(move || detector.detect(&image))
            .await
            .map_err(|e| FaceError::Detection(e.to_string()))?
            .map_err(|e| FaceError::Detection(format!("{e:#}")))?;
        Ok(faces.into_iter().map(|f| f.embedding).collect())
    }
}
