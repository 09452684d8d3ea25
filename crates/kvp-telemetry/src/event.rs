//! Lifecycle and diagnostic events published through the KVP handler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of reporting event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    Start,
    Finish,
    Diagnostic,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Start => "start",
            EventType::Finish => "finish",
            EventType::Diagnostic => "diagnostic",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome attached to finish events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventResult {
    Success,
    Warn,
    Fail,
}

/// One reporting event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportingEvent {
    pub event_type: EventType,
    /// Stage name, e.g. `init-network/config-ssh`.
    pub name: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
    pub result: Option<EventResult>,
}

impl ReportingEvent {
    pub fn start(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            event_type: EventType::Start,
            name: name.into(),
            description: description.into(),
            timestamp: Utc::now(),
            result: None,
        }
    }

    pub fn finish(
        name: impl Into<String>,
        description: impl Into<String>,
        result: EventResult,
    ) -> Self {
        Self {
            event_type: EventType::Finish,
            name: name.into(),
            description: description.into(),
            timestamp: Utc::now(),
            result: Some(result),
        }
    }

    /// Free-form diagnostic message.
    pub fn diagnostic(description: impl Into<String>) -> Self {
        Self {
            event_type: EventType::Diagnostic,
            name: "diagnostic".to_string(),
            description: description.into(),
            timestamp: Utc::now(),
            result: None,
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serde_tags() {
        assert_eq!(serde_json::to_string(&EventType::Finish).unwrap(), "\"finish\"");
        assert_eq!(serde_json::to_string(&EventResult::Fail).unwrap(), "\"FAIL\"");
    }

    #[test]
    fn test_constructors() {
        let event = ReportingEvent::finish("init", "done", EventResult::Success);
        assert_eq!(event.event_type, EventType::Finish);
        assert_eq!(event.result, Some(EventResult::Success));

        let diag = ReportingEvent::diagnostic("msg");
        assert_eq!(diag.name, "diagnostic");
        assert!(diag.result.is_none());
    }
}
