use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use facefind_core::error::{FaceError, Result};
use facefind_core::store::EmbeddingRecordStore;
use facefind_core::types::{EmbeddingRecord, FaceEmbedding, MatchResult};
use facefind_match::{find_best, Similarity};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, warn};

pub(crate) struct SearchRequest {
    pub query: FaceEmbedding,
    pub threshold: f32,
    pub reply: oneshot::Sender<Result<MatchResult>>,
}

pub(crate) struct InsertNotification {
    pub record: EmbeddingRecord,
    pub ack: Option<oneshot::Sender<()>>,
}

pub(crate) enum WorkerMessage {
    Search(SearchRequest),
    Insert(InsertNotification),
}

/// Dispatcher-side view of one running worker.
pub(crate) struct WorkerHandle {
    pub id: usize,
    pub tx: Option<mpsc::UnboundedSender<WorkerMessage>>,
    /// Searches sent but not yet answered.
    pub pending: Arc<AtomicUsize>,
    pub faulted: Arc<AtomicBool>,
    pub thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    pub fn spawn(id: usize, snapshot: Vec<EmbeddingRecord>, metric: Arc<dyn Similarity>) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));
        let worker = Worker {
            id,
            store: EmbeddingRecordStore::from_records(snapshot),
            metric,
            pending: pending.clone(),
        };
        let thread = thread::Builder::new()
            .name(format!("face-worker-{id}"))
            .spawn(move || worker.run(rx))
            .map_err(|e| FaceError::WorkerFault { worker: id, reason: format!("spawn failed: {e}") })?;
        Ok(Self { id, tx: Some(tx), pending, faulted: Arc::new(AtomicBool::new(false)), thread: Some(thread) })
    }

    pub fn pending(&self) -> usize { self.pending.load(Ordering::Acquire) }
}

struct Worker {
    id: usize,
    store: EmbeddingRecordStore,
    metric: Arc<dyn Similarity>,
    pending: Arc<AtomicUsize>,
}

impl Worker {
    fn run(mut self, mut rx: mpsc::UnboundedReceiver<WorkerMessage>) {
        debug!(worker = self.id, records = self.store.len(), "worker started");
        while let Some(msg) = rx.blocking_recv() {
            match msg {
                WorkerMessage::Search(req) => {
                    if !self.search(req) { break; }
                }
                WorkerMessage::Insert(note) => self.insert(note),
            }
        }
        debug!(worker = self.id, "worker stopped");
    }

    /// Returns false when the worker must stop.
    fn search(&mut self, req: SearchRequest) -> bool {
        let SearchRequest { query, threshold, reply } = req;
        let store = &self.store;
        let metric = self.metric.as_ref();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            find_best(query.as_slice(), store.records(), threshold, metric)
        }));
        self.pending.fetch_sub(1, Ordering::AcqRel);
        match outcome {
            Ok(result) => {
                if let Err(e) = &result { warn!(worker = self.id, error = %e, "search failed"); }
                if reply.send(result).is_err() {
                    debug!(worker = self.id, "requester gone, reply discarded");
                }
                true
            }
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                error!(worker = self.id, %reason, "worker panicked during search");
                let _ = reply.send(Err(FaceError::WorkerFault { worker: self.id, reason }));
                false
            }
        }
    }

    fn insert(&mut self, note: InsertNotification) {
        let name = note.record.name.clone();
        match self.store.append(note.record) {
            Ok(()) => debug!(worker = self.id, %name, records = self.store.len(), "applied insert"),
            Err(e) => error!(worker = self.id, %name, error = %e, "insert rejected by worker copy"),
        }
        if let Some(ack) = note.ack { let _ = ack.send(()); }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
