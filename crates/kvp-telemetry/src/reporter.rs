//! Provisioning report entry points.
//!
//! Every operation here is a single best-effort attempt. Nothing below this
//! boundary is allowed to fail provisioning: a missing sink, an unusable
//! pool file, or an encoding problem is logged once and turned into a
//! `false` / non-delivered outcome.

use crate::config::TelemetryConfig;
use crate::error::TelemetryError;
use crate::identity::{SmbiosIdentity, VmIdentity};
use crate::registry::{HandlerRegistry, KVP_SINK_NAME};
use crate::sink::ReportSink;
use chrono::{DateTime, Utc};
use kvp_pool::PoolError;
use kvp_report::{AgentTag, ProvisioningReport, ReportableError};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Key every provisioning report is written under.
pub const PROVISIONING_REPORT_KEY: &str = "PROVISIONING_REPORT";

/// Logged when no KVP sink is registered.
pub const SKIPPED_MESSAGE: &str = "KVP handler not enabled, skipping host report.";

/// Why a report was not attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    SinkNotRegistered,
}

/// Why an attempted write failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Report could not be encoded into a record.
    Encoding,
    /// Pool file could not be opened.
    StoreUnavailable,
    /// Write to an open pool file failed.
    Io,
    /// Any other sink failure.
    Sink,
}

impl From<&TelemetryError> for FailureKind {
    fn from(err: &TelemetryError) -> Self {
        match err {
            TelemetryError::Pool(PoolError::Encoding(_)) => FailureKind::Encoding,
            TelemetryError::Pool(PoolError::StoreUnavailable { .. }) => {
                FailureKind::StoreUnavailable
            }
            TelemetryError::Pool(PoolError::Io(_)) | TelemetryError::Io(_) => FailureKind::Io,
            _ => FailureKind::Sink,
        }
    }
}

/// Result of one report attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportOutcome {
    Delivered,
    Skipped(SkipReason),
    Failed(FailureKind),
}

impl ReportOutcome {
    pub fn delivered(&self) -> bool {
        matches!(self, ReportOutcome::Delivered)
    }
}

/// Time source for report timestamps.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Assembles provisioning reports and hands them to the registered sink.
pub struct Reporter {
    registry: Arc<HandlerRegistry>,
    identity: Arc<dyn VmIdentity>,
    agent: AgentTag,
    sink_name: String,
    clock: Clock,
}

impl Reporter {
    /// Reporter using SMBIOS identity, the running agent, and the KVP sink.
    pub fn new(registry: Arc<HandlerRegistry>) -> Self {
        Self {
            registry,
            identity: Arc::new(SmbiosIdentity::default()),
            agent: AgentTag::current(),
            sink_name: KVP_SINK_NAME.to_string(),
            clock: Arc::new(Utc::now),
        }
    }

    pub fn from_config(registry: Arc<HandlerRegistry>, config: &TelemetryConfig) -> Self {
        Self::new(registry)
            .with_agent(config.agent())
            .with_sink_name(config.sink_name.clone())
    }

    pub fn with_identity(mut self, identity: Arc<dyn VmIdentity>) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_agent(mut self, agent: AgentTag) -> Self {
        self.agent = agent;
        self
    }

    pub fn with_sink_name(mut self, sink_name: impl Into<String>) -> Self {
        self.sink_name = sink_name.into();
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// Report a provisioning failure. Returns whether it reached the sink.
    pub fn report_failure(&self, error: &ReportableError) -> bool {
        self.report_failure_outcome(error).delivered()
    }

    pub fn report_failure_outcome(&self, error: &ReportableError) -> ReportOutcome {
        let Some(sink) = self.sink() else {
            return ReportOutcome::Skipped(SkipReason::SinkNotRegistered);
        };
        let vm_id = self.resolve_vm_id(error.vm_id.as_deref());
        let mut report = ProvisioningReport::failure(error, vm_id);
        report.agent = self.agent.clone();
        self.deliver(sink.as_ref(), &report.encode())
    }

    /// Report successful provisioning of `vm_id`.
    pub fn report_success(&self, vm_id: &str) -> bool {
        self.report_success_outcome(vm_id).delivered()
    }

    pub fn report_success_outcome(&self, vm_id: &str) -> ReportOutcome {
        let Some(sink) = self.sink() else {
            return ReportOutcome::Skipped(SkipReason::SinkNotRegistered);
        };
        let report = ProvisioningReport::success(self.agent.clone(), (self.clock)(), vm_id);
        self.deliver(sink.as_ref(), &report.encode())
    }

    /// Write an already-encoded report.
    pub fn report_via_kvp(&self, report: &str) -> bool {
        self.submit(report).delivered()
    }

    /// Look up the sink and write `report` under the report key.
    pub fn submit(&self, report: &str) -> ReportOutcome {
        match self.sink() {
            Some(sink) => self.deliver(sink.as_ref(), report),
            None => ReportOutcome::Skipped(SkipReason::SinkNotRegistered),
        }
    }

    /// Registered sink, or `None` after logging the skip message.
    fn sink(&self) -> Option<Arc<dyn ReportSink>> {
        let sink = self.registry.lookup(&self.sink_name);
        if sink.is_none() {
            info!(sink = %self.sink_name, "{}", SKIPPED_MESSAGE);
        }
        sink
    }

    fn deliver(&self, sink: &dyn ReportSink, report: &str) -> ReportOutcome {
        match sink.write_record(PROVISIONING_REPORT_KEY, report) {
            Ok(()) => {
                debug!(sink = %self.sink_name, bytes = report.len(), "Provisioning report written");
                ReportOutcome::Delivered
            }
            Err(err) => {
                let kind = FailureKind::from(&err);
                warn!(
                    sink = %self.sink_name,
                    error = %err,
                    kind = ?kind,
                    "Failed to write provisioning report"
                );
                ReportOutcome::Failed(kind)
            }
        }
    }

    fn resolve_vm_id(&self, fallback: Option<&str>) -> String {
        match self.identity.query_vm_id() {
            Ok(vm_id) => vm_id,
            Err(err) => {
                debug!(error = %err, "Failed to query VM id, reporting without it");
                fallback.unwrap_or_default().to_string()
            }
        }
    }
}

impl fmt::Debug for Reporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reporter")
            .field("registry", &self.registry)
            .field("agent", &self.agent)
            .field("sink_name", &self.sink_name)
            .finish_non_exhaustive()
    }
}
