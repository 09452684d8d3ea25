//! Reporting sink capability.

use crate::error::{Result, TelemetryError};
use kvp_pool::KvpRecord;
use std::sync::Mutex;

/// Anything that can persist a key/value record for the host.
pub trait ReportSink: Send + Sync {
    /// Persist one record.
    fn write_record(&self, key: &str, value: &str) -> Result<()>;
}

/// In-memory sink, for tests and for embedding without a pool file.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<KvpRecord>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the records written so far, in write order.
    pub fn records(&self) -> Vec<KvpRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl ReportSink for MemorySink {
    fn write_record(&self, key: &str, value: &str) -> Result<()> {
        let mut records = self
            .records
            .lock()
            .map_err(|e| TelemetryError::LockPoisoned(e.to_string()))?;
        records.push(KvpRecord::new(key, value));
        Ok(())
    }
}
