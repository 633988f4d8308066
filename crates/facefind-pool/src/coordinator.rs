//! Caller-facing search/insert API and sole owner of the canonical record store.

use std::sync::Arc;

use facefind_core::config::{InsertMode, MatchingConfig, Settings};
use facefind_core::error::{FaceError, Result};
use facefind_core::store::EmbeddingRecordStore;
use facefind_core::traits::RecordPersistence;
use facefind_core::types::{EmbeddingRecord, FaceEmbedding, MatchPolicy, MatchResult};
use facefind_match::{find_best, metric_from_config, Similarity};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::pool::WorkerPool;

pub struct Coordinator {
    /// Canonical store. Held across append, broadcast and persist so there is
    /// one writer at a time and workers see inserts in canonical order.
    store: Mutex<EmbeddingRecordStore>,
    pool: WorkerPool,
    persistence: Arc<dyn RecordPersistence>,
    matching: MatchingConfig,
    metric: Arc<dyn Similarity>,
    insert_mode: InsertMode,
}

impl Coordinator {
    /// Load the persisted records and start the worker pool on them.
    pub fn start(settings: &Settings, persistence: Arc<dyn RecordPersistence>) -> Result<Self> {
        Self::start_with_metric(settings, persistence, metric_from_config(&settings.matching))
    }

    /// As [`start`](Self::start), scoring with `metric` instead of the configured one.
    pub fn start_with_metric(
        settings: &Settings,
        persistence: Arc<dyn RecordPersistence>,
        metric: Arc<dyn Similarity>,
    ) -> Result<Self> {
        settings.validate()?;
        let store = EmbeddingRecordStore::from_records(persistence.load()?);
        if let Some(stored) = store.dimension().filter(|&d| d != settings.detector.dim) {
            warn!(stored, configured = settings.detector.dim, "record file dimension differs from detector.dim; searches will fail until they agree");
        }
        let pool = WorkerPool::new(&settings.pool, store.snapshot(), metric.clone())?;
        info!(records = store.len(), insert_mode = ?settings.insert.mode, "coordinator ready");
        Ok(Self {
            store: Mutex::new(store),
            pool,
            persistence,
            matching: settings.matching.clone(),
            metric,
            insert_mode: settings.insert.mode,
        })
    }

    pub fn pool(&self) -> &WorkerPool { &self.pool }

    pub fn matching(&self) -> &MatchingConfig { &self.matching }

    /// Pooled search with the strict threshold. Only the first embedding is used.
    pub async fn search(&self, queries: &[FaceEmbedding]) -> Result<MatchResult> {
        self.search_with(queries, MatchPolicy::Strict).await
    }

    pub async fn search_with(&self, queries: &[FaceEmbedding], policy: MatchPolicy) -> Result<MatchResult> {
        let query = queries.first().ok_or(FaceError::NoFaceDetected)?;
        if queries.len() > 1 { debug!(faces = queries.len(), "searching with the first face only"); }
        let threshold = self.matching.threshold(policy);
        match self.pool.dispatch(query.clone(), threshold).await {
            Err(FaceError::WorkerFault { worker, reason }) => {
                self.recover(worker).await;
                Err(FaceError::WorkerFault { worker, reason })
            }
            Err(e @ (FaceError::DimensionMismatch { .. } | FaceError::MalformedQuery(_))) => {
                error!(error = %e, "malformed embedding reached the matcher");
                Err(e)
            }
            other => other,
        }
    }

    /// Match against the canonical store directly, bypassing the pool.
    ///
    /// Sees every committed insert, at the cost of holding the store lock for the scan.
    pub async fn match_canonical(&self, queries: &[FaceEmbedding], policy: MatchPolicy) -> Result<MatchResult> {
        let query = queries.first().ok_or(FaceError::NoFaceDetected)?;
        let store = self.store.lock().await;
        find_best(query.as_slice(), store.records(), self.matching.threshold(policy), self.metric.as_ref())
    }

    /// Register one record per embedding, broadcast them, then persist the whole store.
    ///
    /// A failed write returns `PersistFailed` after the in-memory store and
    /// the workers were already updated; the next successful write covers it.
    /// In acknowledged mode a worker that misses the ack deadline is logged,
    /// not returned: the records are committed and a retry would duplicate them.
    pub async fn insert(&self, name: &str, source: &str, embeddings: &[FaceEmbedding]) -> Result<usize> {
        if embeddings.is_empty() { return Err(FaceError::NoFaceDetected); }
        let records: Vec<EmbeddingRecord> = embeddings
            .iter()
            .map(|e| EmbeddingRecord::new(name, source, e.clone()))
            .collect();

        let mut store = self.store.lock().await;
        check_batch(&store, &records)?;

        let mut unreachable = Vec::new();
        let mut late_acks = 0usize;
        for record in &records {
            store.append(record.clone())?;
            let outcome = match self.insert_mode {
                InsertMode::Eventual => self.pool.broadcast(record),
                InsertMode::Acknowledged => self.pool.broadcast_acknowledged(record).await,
            };
            match outcome {
                Ok(down) => unreachable.extend(down),
                Err(FaceError::WorkerTimeout { worker, timeout_ms }) => {
                    late_acks += 1;
                    warn!(worker, timeout_ms, "insert committed before every worker acknowledged it");
                }
                Err(e) => return Err(e),
            }
        }
        info!(%name, faces = records.len(), total = store.len(), "registered embeddings");

        unreachable.sort_unstable();
        unreachable.dedup();
        for worker in unreachable {
            if let Err(e) = self.pool.restart_faulted(worker, store.snapshot()) {
                error!(worker, error = %e, "failed to restart worker");
            }
        }

        let snapshot = store.snapshot();
        let persistence = self.persistence.clone();
        let saved = tokio::task::spawn_blocking(move || persistence.save(&snapshot))
            .await
            .map_err(|e| FaceError::PersistFailed(e.to_string()))
            .and_then(|r| r);
        drop(store);
        if let Err(e) = saved {
            error!(error = %e, "record file not updated; in-memory store is ahead of disk");
            return Err(e);
        }
        if late_acks > 0 { debug!(late_acks, "insert returned without full acknowledgment"); }
        Ok(records.len())
    }

    pub async fn snapshot(&self) -> Vec<EmbeddingRecord> { self.store.lock().await.snapshot() }

    pub async fn len(&self) -> usize { self.store.lock().await.len() }

    pub async fn is_empty(&self) -> bool { self.store.lock().await.is_empty() }

    pub async fn shutdown(&self) { self.pool.shutdown().await }

    async fn recover(&self, worker: usize) {
        let store = self.store.lock().await;
        match self.pool.restart_faulted(worker, store.snapshot()) {
            Ok(true) => warn!(worker, "faulted worker replaced"),
            Ok(false) => debug!(worker, "worker already replaced"),
            Err(e) => error!(worker, error = %e, "failed to restart worker"),
        }
    }
}

/// Reject the whole batch up front so a bad face never leaves a partial registration.
fn check_batch(store: &EmbeddingRecordStore, records: &[EmbeddingRecord]) -> Result<()> {
    let mut expected = store.dimension();
    for record in records {
        record.validate()?;
        let dim = record.embedding.dim();
        match expected {
            Some(e) if e != dim => return Err(FaceError::DimensionMismatch { expected: e, actual: dim }),
            Some(_) => {}
            None => expected = Some(dim),
        }
    }
    Ok(())
}
