//! Provisioning report encoding.
//!
//! Turns provisioning outcomes into one bounded string that fits a single
//! KVP value:
//!
//! ```text
//! result=<success|error>,agent=Cloud-Init/<version>,timestamp=<ISO-8601 UTC>,vm_id=<id>[,reason=..][,kind=..][,<context>..]
//! ```
//!
//! Field order is significant to the host-side parser and is preserved
//! exactly. Reports longer than [`MAX_REPORT_BYTES`] keep their prefix.

pub mod agent;
pub mod encode;
pub mod report;
pub mod reportable;

pub use agent::{AgentTag, AGENT_NAME};
pub use encode::{encode_lines, sanitize, truncate_report, FIELD_SEPARATOR, QUOTE_CHAR};
pub use report::{encode_error, format_timestamp, ProvisioningReport, ReportResult};
pub use reportable::{ReportKind, ReportableError, DOCUMENTATION_URL};

/// Upper bound for an encoded report, equal to the KVP value width.
pub const MAX_REPORT_BYTES: usize = 2048;
