//! Canonical provisioning report layout.

use crate::agent::AgentTag;
use crate::encode::encode_lines;
use crate::reportable::ReportableError;
use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;

/// Overall provisioning result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportResult {
    Success,
    Error,
}

impl ReportResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportResult::Success => "success",
            ReportResult::Error => "error",
        }
    }
}

impl fmt::Display for ReportResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Format a timestamp as ISO-8601 UTC with microseconds and `+00:00`.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// One report, before encoding.
///
/// The four header fields always come first; `details` follow in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningReport {
    pub result: ReportResult,
    pub agent: AgentTag,
    pub timestamp: DateTime<Utc>,
    pub vm_id: String,
    pub details: Vec<String>,
}

impl ProvisioningReport {
    /// Success report: header fields only.
    pub fn success(agent: AgentTag, timestamp: DateTime<Utc>, vm_id: impl Into<String>) -> Self {
        Self {
            result: ReportResult::Success,
            agent,
            timestamp,
            vm_id: vm_id.into(),
            details: Vec::new(),
        }
    }

    /// Failure report for a reportable error.
    pub fn failure(error: &ReportableError, vm_id: impl Into<String>) -> Self {
        Self {
            result: ReportResult::Error,
            agent: error.agent.clone(),
            timestamp: error.timestamp,
            vm_id: vm_id.into(),
            details: error.detail_lines(),
        }
    }

    /// Ordered `field=value` lines.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![
            format!("result={}", self.result),
            format!("agent={}", self.agent),
            format!("timestamp={}", format_timestamp(&self.timestamp)),
            format!("vm_id={}", self.vm_id),
        ];
        lines.extend(self.details.iter().cloned());
        lines
    }

    /// Encode to one bounded string.
    pub fn encode(&self) -> String {
        encode_lines(self.lines())
    }
}

/// Encode a reportable error.
///
/// `vm_id` takes precedence over the id recorded on the error; with
/// neither, the field is left empty.
pub fn encode_error(error: &ReportableError, vm_id: Option<&str>) -> String {
    let vm_id = vm_id.or(error.vm_id.as_deref()).unwrap_or_default();
    ProvisioningReport::failure(error, vm_id).encode()
}
