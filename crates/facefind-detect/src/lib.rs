//! Stand-in for the ML face detector.
//!
//! Real detection and embedding extraction live outside this workspace. The
//! hashing detector derives a deterministic, L2-normalized embedding from the
//! image bytes so the rest of the pipeline can be exercised without a model:
//! identical images produce identical embeddings, and an empty image has no face.

use std::hash::Hasher;

use anyhow::{bail, Result};
use facefind_core::traits::FaceDetector;
use facefind_core::types::{DetectedFace, FaceEmbedding};
use tracing::debug;
use twox_hash::XxHash64;

const WINDOW: usize = 64;

pub struct HashingDetector { dim: usize }

impl HashingDetector {
    pub fn new(dim: usize) -> Self { Self { dim } }

    fn embed(&self, image: &[u8]) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for (i, window) in image.chunks(WINDOW).enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            hasher.write(window);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = (v.iter().map(|x| x * x).sum::<f32>()).sqrt().max(1e-6);
        for x in &mut v { *x /= norm; }
        v
    }
}

impl FaceDetector for HashingDetector {
    fn dim(&self) -> usize { self.dim }

    fn detect(&self, image: &[u8]) -> Result<Vec<DetectedFace>> {
        if self.dim == 0 { bail!("detector dimension must be positive"); }
        if image.is_empty() {
            debug!("empty image, no face");
            return Ok(Vec::new());
        }
        let embedding = FaceEmbedding::new(self.embed(image));
        Ok(vec![DetectedFace { embedding, score: 1.0 }])
    }
}
