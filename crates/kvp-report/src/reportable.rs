//! Structured provisioning failures.
//!
//! A `ReportableError` is built where provisioning fails, encoded once, and
//! handed to the reporter. It is not persisted beyond that report.

use crate::agent::AgentTag;
use crate::report::ProvisioningReport;
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Troubleshooting link appended as the last field of failure reports.
pub const DOCUMENTATION_URL: &str = "https://aka.ms/linuxprovisioningerror";

/// Machine-readable failure category.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ReportKind {
    /// Failure without a more specific category.
    Generic,
    /// No DHCP lease could be obtained.
    DhcpLease,
    /// No interface was available for DHCP.
    DhcpInterfaceNotFound,
    /// Metadata service request failed.
    ImdsUrlError,
    /// Metadata service response could not be parsed.
    ImdsMetadataParsing,
    /// Host never acknowledged the OS disk pre-provisioning shutdown.
    OsDiskPpsFailure,
    /// Error nobody handled.
    UnhandledException,
    /// Caller-defined tag.
    Other(String),
}

impl ReportKind {
    pub fn as_str(&self) -> &str {
        match self {
            ReportKind::Generic => "generic",
            ReportKind::DhcpLease => "dhcp_lease",
            ReportKind::DhcpInterfaceNotFound => "dhcp_interface_not_found",
            ReportKind::ImdsUrlError => "imds_url_error",
            ReportKind::ImdsMetadataParsing => "imds_metadata_parsing",
            ReportKind::OsDiskPpsFailure => "os_disk_pps_failure",
            ReportKind::UnhandledException => "unhandled_exception",
            ReportKind::Other(tag) => tag,
        }
    }

    /// Parse a tag, mapping unknown tags to `Other`.
    pub fn parse_str(s: &str) -> Self {
        match s {
            "generic" => ReportKind::Generic,
            "dhcp_lease" => ReportKind::DhcpLease,
            "dhcp_interface_not_found" => ReportKind::DhcpInterfaceNotFound,
            "imds_url_error" => ReportKind::ImdsUrlError,
            "imds_metadata_parsing" => ReportKind::ImdsMetadataParsing,
            "os_disk_pps_failure" => ReportKind::OsDiskPpsFailure,
            "unhandled_exception" => ReportKind::UnhandledException,
            other => ReportKind::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A provisioning failure destined for the host.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind}: {reason}")]
pub struct ReportableError {
    /// Human-readable reason.
    pub reason: String,
    pub kind: ReportKind,
    /// Extra `key=value` context, in report order.
    pub supporting_data: Vec<(String, String)>,
    pub timestamp: DateTime<Utc>,
    /// VM id known at construction, if any.
    pub vm_id: Option<String>,
    pub agent: AgentTag,
    pub documentation_url: String,
}

impl ReportableError {
    /// Generic error with the current time and agent.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            kind: ReportKind::Generic,
            supporting_data: Vec::new(),
            timestamp: Utc::now(),
            vm_id: None,
            agent: AgentTag::current(),
            documentation_url: DOCUMENTATION_URL.to_string(),
        }
    }

    pub fn with_kind(mut self, kind: ReportKind) -> Self {
        self.kind = kind;
        self
    }

    /// Append one supporting `key=value` pair.
    pub fn with_data(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.supporting_data.push((key.into(), value.to_string()));
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn with_vm_id(mut self, vm_id: impl Into<String>) -> Self {
        self.vm_id = Some(vm_id.into());
        self
    }

    pub fn with_agent(mut self, agent: AgentTag) -> Self {
        self.agent = agent;
        self
    }

    pub fn dhcp_lease(duration: Duration, interface: Option<&str>) -> Self {
        let error = Self::new("failure to obtain DHCP lease")
            .with_kind(ReportKind::DhcpLease)
            .with_data("duration", format_secs(duration));
        match interface {
            Some(interface) => error.with_data("interface", interface),
            None => error,
        }
    }

    pub fn dhcp_interface_not_found(duration: Duration) -> Self {
        Self::new("failure to find DHCP interface")
            .with_kind(ReportKind::DhcpInterfaceNotFound)
            .with_data("duration", format_secs(duration))
    }

    /// Metadata fetch failure; `status` is the HTTP status when one was
    /// received.
    pub fn imds_url_error(url: &str, status: Option<u16>, duration: Duration) -> Self {
        let error = Self::new("failure to fetch IMDS")
            .with_kind(ReportKind::ImdsUrlError)
            .with_data("url", url);
        let error = match status {
            Some(code) => error.with_data("http_code", code),
            None => error,
        };
        error.with_data("duration", format_secs(duration))
    }

    pub fn imds_metadata_parsing(cause: &dyn std::error::Error) -> Self {
        Self::new("error parsing IMDS metadata")
            .with_kind(ReportKind::ImdsMetadataParsing)
            .with_data("exception", cause)
    }

    pub fn os_disk_pps_failure() -> Self {
        Self::new("error waiting for host shutdown").with_kind(ReportKind::OsDiskPpsFailure)
    }

    /// Wrap an error nobody handled, recording its source chain.
    pub fn unhandled(cause: &dyn std::error::Error) -> Self {
        let mut error = Self::new("unhandled exception")
            .with_kind(ReportKind::UnhandledException)
            .with_data("exception", cause);

        let mut source = cause.source();
        let mut chain = Vec::new();
        while let Some(inner) = source {
            chain.push(inner.to_string());
            source = inner.source();
        }
        if !chain.is_empty() {
            error = error.with_data("caused_by", chain.join(" <- "));
        }
        error
    }

    /// Error-specific lines that follow the report header.
    pub fn detail_lines(&self) -> Vec<String> {
        let mut lines = Vec::with_capacity(self.supporting_data.len() + 3);
        lines.push(format!("reason={}", self.reason));
        lines.push(format!("kind={}", self.kind));
        lines.extend(
            self.supporting_data
                .iter()
                .map(|(key, value)| format!("{}={}", key, value)),
        );
        lines.push(format!("documentation_url={}", self.documentation_url));
        lines
    }

    /// Encode as one bounded report for `vm_id`.
    pub fn as_encoded_report(&self, vm_id: &str) -> String {
        ProvisioningReport::failure(self, vm_id).encode()
    }
}

fn format_secs(duration: Duration) -> String {
    format!("{:.3}", duration.as_secs_f64())
}
