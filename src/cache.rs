//! In-memory build results.
//!
//! Written by the converter invoker after a successful build in preview or
//! feed mode; read by the preview server and the feed assembler. Entries are
//! never evicted and live as long as the process.

use parking_lot::Mutex;
use std::{collections::BTreeMap, path::PathBuf};

/// Last rendered output of one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Raw converter stdout
    pub body: String,
    /// Absolute path of the source document
    pub source: PathBuf,
    /// Sibling metadata document passed to the converter, if any
    pub metadata_file: Option<PathBuf>,
}

/// Document identifier → last rendered output.
///
/// The lock is only held for single map operations, never across a
/// converter run.
#[derive(Debug, Default)]
pub struct BuildCache {
    entries: Mutex<BTreeMap<String, CacheEntry>>,
}

impl BuildCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a result, replacing any earlier one for the same document.
    pub fn insert(&self, id: impl Into<String>, entry: CacheEntry) {
        self.entries.lock().insert(id.into(), entry);
    }

    #[cfg(test)]
    pub fn get(&self, id: &str) -> Option<CacheEntry> {
        self.entries.lock().get(id).cloned()
    }

    pub fn body(&self, id: &str) -> Option<String> {
        self.entries.lock().get(id).map(|entry| entry.body.clone())
    }

    #[cfg(test)]
    pub fn contains(&self, id: &str) -> bool {
        self.entries.lock().contains_key(id)
    }

    pub fn keys(&self) -> Vec<String> {
        self.entries.lock().keys().cloned().collect()
    }

    /// Copy of all entries, ordered by identifier.
    pub fn snapshot(&self) -> Vec<(String, CacheEntry)> {
        self.entries
            .lock()
            .iter()
            .map(|(id, entry)| (id.clone(), entry.clone()))
            .collect()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
