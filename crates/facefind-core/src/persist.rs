//! JSON record file backing the canonical store across restarts.
//!
//! The file holds one JSON array of `{name, source, embedding}` objects and is
//! always rewritten as a whole: a temp file in the same directory is written,
//! flushed and renamed over the target.

use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{FaceError, Result};
use crate::traits::RecordPersistence;
use crate::types::EmbeddingRecord;

pub struct JsonRecordFile {
    path: PathBuf,
}

impl JsonRecordFile {
    pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into() } }

    pub fn path(&self) -> &Path { &self.path }
}

impl RecordPersistence for JsonRecordFile {
    fn load(&self) -> Result<Vec<EmbeddingRecord>> {
        let bytes = match fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "no record file yet, starting empty");
                return Ok(Vec::new());
            }
            Err(e) => return Err(FaceError::PersistFailed(format!("read {}: {}", self.path.display(), e))),
        };
        if bytes.iter().all(|b| b.is_ascii_whitespace()) { return Ok(Vec::new()); }
        let records: Vec<EmbeddingRecord> = serde_json::from_slice(&bytes)
            .map_err(|e| FaceError::PersistFailed(format!("parse {}: {}", self.path.display(), e)))?;
        info!(path = %self.path.display(), count = records.len(), "loaded embedding records");
        Ok(records)
    }

    fn save(&self, records: &[EmbeddingRecord]) -> Result<()> {
        let fail = |what: &str, e: &dyn std::fmt::Display| {
            FaceError::PersistFailed(format!("{} {}: {}", what, self.path.display(), e))
        };
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let tmp = NamedTempFile::new_in(&dir).map_err(|e| fail("create temp for", &e))?;
        {
            let mut writer = BufWriter::new(tmp.as_file());
            let mut ser = Serializer::with_formatter(&mut writer, PrettyFormatter::with_indent(b" "));
            records.serialize(&mut ser).map_err(|e| fail("serialize", &e))?;
            writer.flush().map_err(|e| fail("flush", &e))?;
        }
        tmp.as_file().sync_all().map_err(|e| fail("sync", &e))?;
        tmp.persist(&self.path).map_err(|e| fail("rename into", &e.error))?;
        debug!(path = %self.path.display(), count = records.len(), "wrote embedding records");
        Ok(())
    }
}

/// Keeps the last saved collection in memory. For tests and ephemeral setups.
#[derive(Default)]
pub struct MemoryPersistence {
    saved: Mutex<Vec<EmbeddingRecord>>,
}

impl MemoryPersistence {
    pub fn new() -> Self { Self::default() }

    pub fn with_records(records: Vec<EmbeddingRecord>) -> Self { Self { saved: Mutex::new(records) } }

    pub fn saved(&self) -> Vec<EmbeddingRecord> {
        self.saved.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl RecordPersistence for MemoryPersistence {
    fn load(&self) -> Result<Vec<EmbeddingRecord>> { Ok(self.saved()) }

    fn save(&self, records: &[EmbeddingRecord]) -> Result<()> {
        *self.saved.lock().unwrap_or_else(|e| e.into_inner()) = records.to_vec();
        Ok(())
    }
}
