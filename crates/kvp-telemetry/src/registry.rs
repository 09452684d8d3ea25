//! Named registry of reporting sinks.
//!
//! The registry is an owned service object: create one at telemetry startup,
//! hand an `Arc` to every component that reports, and unregister sinks at
//! shutdown. [`HandlerRegistry::global`] exists for callers that cannot
//! thread a handle through.

use crate::error::{Result, TelemetryError};
use crate::sink::ReportSink;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use tracing::debug;

/// Name the KVP sink is registered under.
pub const KVP_SINK_NAME: &str = "telemetry";

static GLOBAL: OnceLock<Arc<HandlerRegistry>> = OnceLock::new();

/// Name → sink bindings.
#[derive(Default)]
pub struct HandlerRegistry {
    items: RwLock<HashMap<String, Arc<dyn ReportSink>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide instance.
    pub fn global() -> Arc<HandlerRegistry> {
        GLOBAL.get_or_init(|| Arc::new(HandlerRegistry::new())).clone()
    }

    /// Bind `name` to `sink`. Fails if the name is taken.
    pub fn register(&self, name: impl Into<String>, sink: Arc<dyn ReportSink>) -> Result<()> {
        let name = name.into();
        let mut items = self
            .items
            .write()
            .map_err(|e| TelemetryError::LockPoisoned(e.to_string()))?;

        match items.entry(name) {
            Entry::Occupied(entry) => Err(TelemetryError::DuplicateRegistration(entry.key().clone())),
            Entry::Vacant(entry) => {
                debug!(name = %entry.key(), "Registered reporting sink");
                entry.insert(sink);
                Ok(())
            }
        }
    }

    /// Remove the binding for `name`, returning the sink.
    pub fn unregister(&self, name: &str) -> Result<Arc<dyn ReportSink>> {
        let mut items = self
            .items
            .write()
            .map_err(|e| TelemetryError::LockPoisoned(e.to_string()))?;

        let sink = items
            .remove(name)
            .ok_or_else(|| TelemetryError::NotRegistered(name.to_string()))?;
        debug!(name, "Unregistered reporting sink");
        Ok(sink)
    }

    /// Sink bound to `name`. Absence means the feature is disabled.
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn ReportSink>> {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .items
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Drop every binding, returning how many were removed.
    pub fn clear(&self) -> usize {
        let mut items = self.items.write().unwrap_or_else(PoisonError::into_inner);
        let removed = items.len();
        items.clear();
        removed
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("names", &self.names())
            .finish()
    }
}
