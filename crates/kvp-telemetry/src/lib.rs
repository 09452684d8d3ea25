//! Provisioning status reporting to the Hyper-V host.
//!
//! A provisioning agent registers a [`KvpReportingHandler`] under the
//! well-known sink name at startup, then reports success or failure
//! through a [`Reporter`]. The report lands in the KVP pool file shared
//! with the host under the `PROVISIONING_REPORT` key.
//!
//! ```no_run
//! use kvp_telemetry::{register_kvp_handler, HandlerRegistry, Reporter, TelemetryConfig};
//!
//! let registry = HandlerRegistry::global();
//! let config = TelemetryConfig::default();
//! register_kvp_handler(&registry, &config)?;
//!
//! let reporter = Reporter::from_config(registry, &config);
//! reporter.report_success("91267c52-9f02-4cfe-b1f4-a4da7ebac2cf");
//! # Ok::<(), kvp_telemetry::TelemetryError>(())
//! ```
//!
//! Reporting never fails the caller. Every entry point returns whether
//! the report was delivered and logs the reason when it was not.

pub mod config;
pub mod error;
pub mod event;
pub mod handler;
pub mod identity;
pub mod lifecycle;
pub mod logging;
pub mod registry;
pub mod reporter;
pub mod sink;

pub use config::{load_config, resolve_config_path, ConfigSource, TelemetryConfig};
pub use error::{Result, TelemetryError};
pub use event::{EventResult, EventType, ReportingEvent};
pub use handler::{KvpReportingHandler, EVENT_PREFIX, MAX_EVENT_VALUE_SIZE};
pub use identity::{convert_system_uuid_to_vm_id, SmbiosIdentity, StaticIdentity, VmIdentity};
pub use lifecycle::{register_kvp_handler, unregister_kvp_handler};
pub use registry::{HandlerRegistry, KVP_SINK_NAME};
pub use reporter::{
    Clock, FailureKind, ReportOutcome, Reporter, SkipReason, PROVISIONING_REPORT_KEY,
    SKIPPED_MESSAGE,
};
pub use sink::{MemorySink, ReportSink};
