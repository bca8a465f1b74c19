use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::SinkError;
use crate::sink::LogSink;

/// Keeps every entry in memory. Clones share the same storage.
///
/// Meant for tests that need to inspect what was logged.
#[derive(Clone, Default)]
pub struct MemorySink {
    entries: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        MemorySink::default()
    }

    /// Raw entries, in delivery order.
    pub fn entries(&self) -> Vec<Vec<u8>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Entries parsed as JSON. Entries that are not valid JSON are skipped.
    pub fn json(&self) -> Vec<serde_json::Value> {
        self.entries()
            .iter()
            .filter_map(|entry| serde_json::from_slice(entry).ok())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

#[async_trait]
impl LogSink for MemorySink {
    async fn send(&self, entry: &[u8]) -> Result<(), SinkError> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(entry.to_vec());
        Ok(())
    }
}
