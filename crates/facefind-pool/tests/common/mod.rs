#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use facefind_core::config::{InsertMode, PoolConfig, Settings};
use facefind_core::error::{FaceError, Result};
use facefind_core::traits::RecordPersistence;
use facefind_core::types::{EmbeddingRecord, FaceEmbedding};
use facefind_match::{Cosine, Similarity};

pub fn rec(name: &str, v: &[f32]) -> EmbeddingRecord {
    EmbeddingRecord::new(name, format!("https://img.example/{name}.jpg"), v.to_vec())
}

pub fn emb(v: &[f32]) -> FaceEmbedding { FaceEmbedding::new(v.to_vec()) }

pub fn pool_config(size: usize, search_timeout_ms: u64) -> PoolConfig {
    PoolConfig { size, search_timeout_ms, insert_timeout_ms: 2_000 }
}

pub fn settings(size: usize, mode: InsertMode) -> Settings {
    let mut s = Settings::default();
    s.pool = pool_config(size, 2_000);
    s.insert.mode = mode;
    s
}

/// Cosine, but records how many scorings run at once and on which worker threads.
#[derive(Default)]
pub struct CountingCosine {
    pub delay: Duration,
    pub calls: AtomicUsize,
    current: AtomicUsize,
    pub max_concurrent: AtomicUsize,
    pub threads: Mutex<HashSet<String>>,
}

impl CountingCosine {
    pub fn with_delay(delay: Duration) -> Self { Self { delay, ..Self::default() } }
}

impl Similarity for CountingCosine {
    fn name(&self) -> &'static str { "counter" }

    fn similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent.fetch_max(now, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(name) = thread::current().name() {
            self.threads.lock().unwrap().insert(name.to_string());
        }
        thread::sleep(self.delay);
        self.current.fetch_sub(1, Ordering::SeqCst);
        Cosine.similarity(a, b)
    }
}

/// Sleeps on its first scoring only.
pub struct SlowOnce {
    pub delay: Duration,
    slept: AtomicBool,
}

impl SlowOnce {
    pub fn new(delay: Duration) -> Self { Self { delay, slept: AtomicBool::new(false) } }
}

impl Similarity for SlowOnce {
    fn name(&self) -> &'static str { "slow-once" }

    fn similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        if !self.slept.swap(true, Ordering::SeqCst) { thread::sleep(self.delay); }
        Cosine.similarity(a, b)
    }
}

/// Panics when the query's first component is 42.
pub struct Tripwire;

impl Similarity for Tripwire {
    fn name(&self) -> &'static str { "tripwire" }

    fn similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        if a.first() == Some(&42.0) { panic!("tripwire hit"); }
        Cosine.similarity(a, b)
    }
}

/// Accepts loads, fails every save.
pub struct BrokenDisk {
    pub initial: Vec<EmbeddingRecord>,
}

impl RecordPersistence for BrokenDisk {
    fn load(&self) -> Result<Vec<EmbeddingRecord>> { Ok(self.initial.clone()) }

    fn save(&self, _records: &[EmbeddingRecord]) -> Result<()> {
        Err(FaceError::PersistFailed("disk full".to_string()))
    }
}

pub fn arc<M: Similarity + 'static>(m: M) -> Arc<dyn Similarity> { Arc::new(m) }
