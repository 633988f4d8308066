//! Worker pool that runs face similarity search over per-worker record copies.
//!
//! ```text
//!  caller ──search──► Coordinator ──dispatch──► WorkerPool ──► one Worker ──► MatchResult
//!  caller ──insert──► Coordinator ──append──► canonical store
//!                                  └─broadcast─► every Worker (FIFO per worker)
//! ```
//!
//! Each worker owns its copy of the records and applies inserts in arrival
//! order, so its copy is always a prefix of the canonical store. Copies are
//! eventually consistent: a search routed to a worker that has not applied a
//! recent insert yet can miss that record. `InsertMode::Acknowledged` makes
//! inserts wait until every worker applied them.

pub mod coordinator;
pub mod pool;
pub mod service;
mod worker;

pub use coordinator::Coordinator;
pub use pool::WorkerPool;
pub use service::{FaceService, PassthroughBlobStore};
