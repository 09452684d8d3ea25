//! File-backed KVP reporting handler.
//!
//! Wraps one pool file store as a [`ReportSink`]. The store is opened on
//! first use, so an unusable pool path surfaces as a write failure rather
//! than a startup failure. On that first open a pool file last modified
//! before the current boot is emptied.

use crate::config::TelemetryConfig;
use crate::error::{Result, TelemetryError};
use crate::event::{EventResult, EventType, ReportingEvent};
use crate::sink::ReportSink;
use kvp_pool::{KvpRecord, PoolStore, WriteLocation};
use kvp_report::{format_timestamp, sanitize};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info};
use uuid::Uuid;

/// Key prefix for published events.
pub const EVENT_PREFIX: &str = "CLOUD_INIT";

/// Largest event value written in one record; longer events are split.
pub const MAX_EVENT_VALUE_SIZE: usize = 1024;

/// Space kept free in each event chunk for the `msg_i` digits.
const CHUNK_SLACK: usize = 8;

#[derive(Serialize)]
struct EventValue<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    event_type: EventType,
    ts: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<EventResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    msg_i: Option<usize>,
    msg: &'a str,
}

/// Reporting sink backed by a KVP pool file.
#[derive(Debug)]
pub struct KvpReportingHandler {
    path: PathBuf,
    truncate_stale: bool,
    incarnation: u64,
    store: Mutex<Option<PoolStore>>,
}

impl KvpReportingHandler {
    /// Handler for `path`; the file is not touched until the first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            truncate_stale: true,
            incarnation: boot_time()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs())
                .unwrap_or(0),
            store: Mutex::new(None),
        }
    }

    pub fn from_config(config: &TelemetryConfig) -> Self {
        Self::new(&config.kvp_pool_file).with_stale_truncation(config.truncate_stale_pool)
    }

    /// Handler whose pool file is opened immediately.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let handler = Self::new(path);
        handler.with_store(|_| Ok(()))?;
        Ok(handler)
    }

    pub fn with_stale_truncation(mut self, enabled: bool) -> Self {
        self.truncate_stale = enabled;
        self
    }

    pub fn with_incarnation(mut self, incarnation: u64) -> Self {
        self.incarnation = incarnation;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Boot-scoped number embedded in event keys.
    pub fn incarnation(&self) -> u64 {
        self.incarnation
    }

    /// Append a record; repeated keys accumulate.
    pub fn write_key(&self, key: &str, value: &str) -> Result<WriteLocation> {
        self.with_store(|store| store.append(key, value))
    }

    /// Overwrite the first record with `key`, appending if there is none.
    pub fn set_key(&self, key: &str, value: &str) -> Result<WriteLocation> {
        self.with_store(|store| store.overwrite(key, value))
    }

    /// Records from `generation` onwards.
    pub fn iterate_kvps(&self, generation: u64) -> Result<Vec<KvpRecord>> {
        self.with_store(|store| store.records(generation))
    }

    /// Write an event as one or more records, returning how many.
    pub fn publish_event(&self, event: &ReportingEvent) -> Result<usize> {
        let name = sanitize(&event.name);
        let description = sanitize(&event.description);
        let ts = format_timestamp(&event.timestamp);
        let key = format!(
            "{}|{}|{}|{}|{}",
            EVENT_PREFIX,
            self.incarnation,
            event.event_type,
            name,
            Uuid::new_v4()
        );

        let mut value = EventValue {
            name: &name,
            event_type: event.event_type,
            ts: &ts,
            result: event.result,
            msg_i: None,
            msg: &description,
        };
        let whole = serde_json::to_string(&value)?;
        if whole.len() <= MAX_EVENT_VALUE_SIZE {
            self.write_key(&key, &whole)?;
            return Ok(1);
        }

        value.msg_i = Some(0);
        value.msg = "";
        let overhead = serde_json::to_string(&value)?.len();
        let room = MAX_EVENT_VALUE_SIZE.saturating_sub(overhead + CHUNK_SLACK);
        if room == 0 {
            return Err(TelemetryError::EventTooLarge {
                overhead,
                max: MAX_EVENT_VALUE_SIZE,
            });
        }

        let chunks = split_for_json(&description, room);
        for (i, chunk) in chunks.iter().enumerate() {
            value.msg_i = Some(i);
            value.msg = chunk;
            let encoded = serde_json::to_string(&value)?;
            self.write_key(&format!("{}|{}", key, i), &encoded)?;
        }
        debug!(key = %key, chunks = chunks.len(), "Published split event");
        Ok(chunks.len())
    }

    fn with_store<T>(
        &self,
        op: impl FnOnce(&mut PoolStore) -> kvp_pool::Result<T>,
    ) -> Result<T> {
        let mut guard = self
            .store
            .lock()
            .map_err(|e| TelemetryError::LockPoisoned(e.to_string()))?;

        let store = match guard.take() {
            Some(store) => store,
            None => self.open_store()?,
        };
        let store = guard.insert(store);
        Ok(op(store)?)
    }

    fn open_store(&self) -> Result<PoolStore> {
        let mut store = PoolStore::open(&self.path)?;
        if self.truncate_stale {
            truncate_if_stale(&mut store)?;
        }
        Ok(store)
    }
}

impl ReportSink for KvpReportingHandler {
    fn write_record(&self, key: &str, value: &str) -> Result<()> {
        self.write_key(key, value).map(|_| ())
    }
}

fn truncate_if_stale(store: &mut PoolStore) -> Result<()> {
    let Some(boot) = boot_time() else {
        return Ok(());
    };
    if store.slot_count()? == 0 {
        return Ok(());
    }
    if store.modified()? < boot {
        info!(
            path = %store.path().display(),
            "Truncating KVP pool file left over from a previous boot"
        );
        store.truncate()?;
    }
    Ok(())
}

/// Split `text` into pieces whose JSON-escaped length fits `room`.
///
/// Input is sanitized printable ASCII, so only `"` and `\` need escaping.
fn split_for_json(text: &str, room: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut used = 0;

    for ch in text.chars() {
        let cost = if ch == '"' || ch == '\\' { 2 } else { 1 };
        if used + cost > room && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            used = 0;
        }
        current.push(ch);
        used += cost;
    }
    if !current.is_empty() || chunks.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Current boot time from `/proc/stat`.
#[cfg(target_os = "linux")]
pub fn boot_time() -> Option<SystemTime> {
    let content = std::fs::read_to_string("/proc/stat").ok()?;
    for line in content.lines() {
        if let Some(rest) = line.strip_prefix("btime") {
            if let Ok(secs) = rest.trim().parse::<u64>() {
                return Some(UNIX_EPOCH + Duration::from_secs(secs));
            }
        }
    }
    None
}

#[cfg(not(target_os = "linux"))]
pub fn boot_time() -> Option<SystemTime> {
    None
}
