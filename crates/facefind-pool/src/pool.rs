//! Fixed-size dispatcher over isolated workers.
//!
//! Searches go to exactly one worker, inserts go to all of them. A semaphore
//! with one permit per worker bounds in-flight searches; callers beyond that
//! wait here instead of piling onto a worker queue.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use facefind_core::config::PoolConfig;
use facefind_core::error::{FaceError, Result};
use facefind_core::types::{EmbeddingRecord, FaceEmbedding, MatchResult};
use facefind_match::Similarity;
use futures::future::join_all;
use tokio::sync::{oneshot, Semaphore};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::worker::{InsertNotification, SearchRequest, WorkerHandle, WorkerMessage};

pub struct WorkerPool {
    slots: Vec<RwLock<WorkerHandle>>,
    permits: Semaphore,
    cursor: AtomicUsize,
    metric: Arc<dyn Similarity>,
    search_timeout: Duration,
    insert_timeout: Duration,
}

impl WorkerPool {
    /// Start `cfg.size` workers, each seeded with its own copy of `snapshot`.
    pub fn new(cfg: &PoolConfig, snapshot: Vec<EmbeddingRecord>, metric: Arc<dyn Similarity>) -> Result<Self> {
        if cfg.size == 0 {
            return Err(FaceError::InvalidConfig("pool.size must be at least 1".to_string()));
        }
        let mut slots = Vec::with_capacity(cfg.size);
        for id in 0..cfg.size {
            slots.push(RwLock::new(WorkerHandle::spawn(id, snapshot.clone(), metric.clone())?));
        }
        info!(workers = cfg.size, records = snapshot.len(), metric = metric.name(), "worker pool started");
        Ok(Self {
            slots,
            permits: Semaphore::new(cfg.size),
            cursor: AtomicUsize::new(0),
            metric,
            search_timeout: cfg.search_timeout(),
            insert_timeout: cfg.insert_timeout(),
        })
    }

    pub fn size(&self) -> usize { self.slots.len() }

    pub fn search_timeout(&self) -> Duration { self.search_timeout }

    /// Searches currently queued or running on each worker.
    pub fn pending(&self) -> Vec<usize> {
        self.slots.iter().map(|s| read(s).pending()).collect()
    }

    /// Run one search on one worker and wait for its answer.
    ///
    /// On timeout the caller is released with `WorkerTimeout`; the worker is
    /// left alone and its late reply is dropped.
    pub async fn dispatch(&self, query: FaceEmbedding, threshold: f32) -> Result<MatchResult> {
        let _permit = self.permits.acquire().await.map_err(|_| FaceError::PoolClosed)?;
        let worker = self.pick();
        let (tx, pending, faulted) = {
            let slot = read(&self.slots[worker]);
            let tx = slot.tx.clone().ok_or(FaceError::PoolClosed)?;
            (tx, slot.pending.clone(), slot.faulted.clone())
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        pending.fetch_add(1, Ordering::AcqRel);
        if tx.send(WorkerMessage::Search(SearchRequest { query, threshold, reply: reply_tx })).is_err() {
            pending.fetch_sub(1, Ordering::AcqRel);
            faulted.store(true, Ordering::Release);
            error!(worker, "worker channel closed");
            return Err(FaceError::WorkerFault { worker, reason: "worker is not running".to_string() });
        }
        debug!(worker, threshold, "search dispatched");

        match timeout(self.search_timeout, reply_rx).await {
            Ok(Ok(Err(FaceError::WorkerFault { reason, .. }))) => {
                faulted.store(true, Ordering::Release);
                Err(FaceError::WorkerFault { worker, reason })
            }
            Ok(Ok(result)) => result,
            Ok(Err(_)) => {
                faulted.store(true, Ordering::Release);
                error!(worker, "worker dropped a search without replying");
                Err(FaceError::WorkerFault { worker, reason: "worker stopped before replying".to_string() })
            }
            Err(_) => {
                let timeout_ms = self.search_timeout.as_millis() as u64;
                warn!(worker, timeout_ms, "search timed out");
                Err(FaceError::WorkerTimeout { worker, timeout_ms })
            }
        }
    }

    /// Enqueue `record` on every worker without waiting for it to be applied.
    ///
    /// Returns the workers that could not be reached; they need a restart.
    pub fn broadcast(&self, record: &EmbeddingRecord) -> Result<Vec<usize>> {
        let mut unreachable = Vec::new();
        for (worker, slot) in self.slots.iter().enumerate() {
            let slot = read(slot);
            let tx = slot.tx.as_ref().ok_or(FaceError::PoolClosed)?;
            let note = InsertNotification { record: record.clone(), ack: None };
            if tx.send(WorkerMessage::Insert(note)).is_err() {
                slot.faulted.store(true, Ordering::Release);
                warn!(worker, "insert not delivered, worker is down");
                unreachable.push(worker);
            }
        }
        debug!(name = %record.name, workers = self.slots.len() - unreachable.len(), "insert broadcast");
        Ok(unreachable)
    }

    /// Like [`broadcast`](Self::broadcast), then wait until every reachable worker applied it.
    pub async fn broadcast_acknowledged(&self, record: &EmbeddingRecord) -> Result<Vec<usize>> {
        let mut unreachable = Vec::new();
        let mut acks = Vec::with_capacity(self.slots.len());
        for (worker, slot) in self.slots.iter().enumerate() {
            let slot = read(slot);
            let tx = slot.tx.as_ref().ok_or(FaceError::PoolClosed)?;
            let (ack_tx, ack_rx) = oneshot::channel();
            let note = InsertNotification { record: record.clone(), ack: Some(ack_tx) };
            if tx.send(WorkerMessage::Insert(note)).is_err() {
                slot.faulted.store(true, Ordering::Release);
                unreachable.push(worker);
            } else {
                acks.push((worker, ack_rx));
            }
        }

        let wait = self.insert_timeout;
        let outcomes = join_all(acks.into_iter().map(|(worker, rx)| async move { (worker, timeout(wait, rx).await) })).await;
        let mut timed_out = None;
        for (worker, outcome) in outcomes {
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(_)) => {
                    self.mark_faulted(worker);
                    unreachable.push(worker);
                }
                Err(_) => {
                    warn!(worker, "insert acknowledgment timed out");
                    if timed_out.is_none() { timed_out = Some(worker); }
                }
            }
        }
        if let Some(worker) = timed_out {
            return Err(FaceError::WorkerTimeout { worker, timeout_ms: wait.as_millis() as u64 });
        }
        debug!(name = %record.name, "insert acknowledged by all workers");
        Ok(unreachable)
    }

    /// Replace worker `worker` with a fresh one seeded from `snapshot`, if it is marked faulted.
    ///
    /// Returns whether a restart happened. Siblings are not touched.
    pub fn restart_faulted(&self, worker: usize, snapshot: Vec<EmbeddingRecord>) -> Result<bool> {
        let slot = self.slots.get(worker).ok_or_else(|| FaceError::WorkerFault {
            worker,
            reason: "no such worker".to_string(),
        })?;
        let mut slot = write(slot);
        if slot.tx.is_none() { return Err(FaceError::PoolClosed); }
        if !slot.faulted.load(Ordering::Acquire) { return Ok(false); }
        let records = snapshot.len();
        let fresh = WorkerHandle::spawn(worker, snapshot, self.metric.clone())?;
        // The old thread has exited or exits once its channel closes; it is not joined.
        let old = std::mem::replace(&mut *slot, fresh);
        drop(old);
        info!(worker = slot.id, records, "worker restarted");
        Ok(true)
    }

    /// Close every worker channel and wait for the worker threads to finish their queues.
    pub async fn shutdown(&self) {
        self.permits.close();
        let mut threads = Vec::new();
        for slot in &self.slots {
            let mut slot = write(slot);
            slot.tx = None;
            if let Some(t) = slot.thread.take() { threads.push(t); }
        }
        let joined = tokio::task::spawn_blocking(move || {
            for t in threads {
                if t.join().is_err() { error!("worker thread panicked during shutdown"); }
            }
        })
        .await;
        if let Err(e) = joined { error!(error = %e, "failed to join worker threads"); }
        info!("worker pool stopped");
    }

    fn mark_faulted(&self, worker: usize) {
        if let Some(slot) = self.slots.get(worker) { read(slot).faulted.store(true, Ordering::Release); }
    }

    /// Least-busy worker; ties go to the first one at or after a rotating cursor.
    fn pick(&self) -> usize {
        let n = self.slots.len();
        let start = self.cursor.fetch_add(1, Ordering::Relaxed) % n;
        (0..n)
            .map(|k| (start + k) % n)
            .min_by_key(|&i| read(&self.slots[i]).pending())
            .unwrap_or(start)
    }
}

fn read(slot: &RwLock<WorkerHandle>) -> RwLockReadGuard<'_, WorkerHandle> {
    slot.read().unwrap_or_else(|e| e.into_inner())
}

fn write(slot: &RwLock<WorkerHandle>) -> RwLockWriteGuard<'_, WorkerHandle> {
    slot.write().unwrap_or_else(|e| e.into_inner())
}
