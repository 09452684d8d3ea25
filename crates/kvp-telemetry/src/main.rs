//! kvp-telemetry - provisioning reports over Hyper-V KVP
//!
//! Operator and integration-test entry point. Exit status:
//! 0 when the report was delivered, 2 when it was skipped, 1 on failure.

use clap::{Args, Parser, Subcommand};
use kvp_pool::PoolStore;
use kvp_report::{ReportKind, ReportableError};
use kvp_telemetry::logging::{init_logging, LogConfig, LogFormat};
use kvp_telemetry::{
    load_config, register_kvp_handler, HandlerRegistry, KvpReportingHandler, ReportOutcome,
    Reporter, SmbiosIdentity, TelemetryConfig, VmIdentity,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, warn};
use tracing_subscriber::filter::LevelFilter;

/// Report provisioning status to the Hyper-V host through the KVP pool file
#[derive(Parser)]
#[command(name = "kvp-telemetry")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Config file (JSON)
    #[arg(long, global = true, env = "KVP_TELEMETRY_CONFIG")]
    config: Option<PathBuf>,

    /// Override the pool file from the config
    #[arg(long, global = true)]
    pool_file: Option<PathBuf>,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<LevelFilter>,

    /// Log format (human, jsonl)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the pool's records as JSON lines
    Dump(DumpArgs),

    /// Report successful provisioning
    ReportSuccess(ReportSuccessArgs),

    /// Report a provisioning failure
    ReportFailure(ReportFailureArgs),

    /// Write an already-encoded report
    Send(SendArgs),

    /// Overwrite a key in the pool, appending if absent
    Set(SetArgs),
}

#[derive(Args, Debug)]
struct DumpArgs {
    /// Skip this many slots from the start of the pool
    #[arg(long, default_value_t = 0)]
    generation: u64,
}

#[derive(Args, Debug)]
struct ReportSuccessArgs {
    /// VM id; queried from SMBIOS when omitted
    #[arg(long)]
    vm_id: Option<String>,
}

#[derive(Args, Debug)]
struct ReportFailureArgs {
    /// Failure reason
    #[arg(long)]
    reason: String,

    /// Failure kind tag (e.g. dhcp_lease)
    #[arg(long)]
    kind: Option<String>,

    /// Supporting data as key=value, repeatable
    #[arg(long = "data", value_parser = parse_key_value)]
    data: Vec<(String, String)>,
}

#[derive(Args, Debug)]
struct SendArgs {
    /// Encoded report
    report: String,
}

#[derive(Args, Debug)]
struct SetArgs {
    key: String,
    value: String,
}

/// Process exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum ExitCode {
    Delivered = 0,
    Failed = 1,
    Skipped = 2,
}

impl From<ReportOutcome> for ExitCode {
    fn from(outcome: ReportOutcome) -> Self {
        match outcome {
            ReportOutcome::Delivered => ExitCode::Delivered,
            ReportOutcome::Skipped(_) => ExitCode::Skipped,
            ReportOutcome::Failed(_) => ExitCode::Failed,
        }
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code as u8)
    }
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got '{}'", s)),
    }
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    let log_config = LogConfig::from_env(cli.global.log_level, cli.global.log_format);
    init_logging(&log_config);

    let config = match load_config(cli.global.config.as_deref()) {
        Ok((config, source)) => {
            debug!(source = %source, "Loaded telemetry config");
            config
        }
        Err(err) => {
            error!(error = %err, "Failed to load telemetry config");
            return ExitCode::Failed.into();
        }
    };
    let config = match cli.global.pool_file {
        Some(path) => config.with_pool_file(path),
        None => config,
    };

    let code = match cli.command {
        Commands::Dump(args) => run_dump(&config, &args),
        Commands::Set(args) => run_set(&config, &args),
        Commands::ReportSuccess(args) => run_report(&config, |reporter| {
            let vm_id = args.vm_id.clone().unwrap_or_else(query_vm_id);
            reporter.report_success_outcome(&vm_id)
        }),
        Commands::ReportFailure(args) => run_report(&config, |reporter| {
            let mut error = ReportableError::new(args.reason.clone());
            if let Some(kind) = &args.kind {
                error = error.with_kind(ReportKind::parse_str(kind));
            }
            for (key, value) in &args.data {
                error = error.with_data(key.clone(), value);
            }
            reporter.report_failure_outcome(&error)
        }),
        Commands::Send(args) => run_report(&config, |reporter| reporter.submit(&args.report)),
    };
    code.into()
}

fn query_vm_id() -> String {
    SmbiosIdentity::default().query_vm_id().unwrap_or_else(|err| {
        debug!(error = %err, "Failed to query VM id");
        String::new()
    })
}

fn run_report<F>(config: &TelemetryConfig, report: F) -> ExitCode
where
    F: FnOnce(&Reporter) -> ReportOutcome,
{
    let registry = Arc::new(HandlerRegistry::new());
    if let Err(err) = register_kvp_handler(&registry, config) {
        error!(error = %err, "Failed to register KVP handler");
        return ExitCode::Failed;
    }
    let reporter = Reporter::from_config(registry, config);
    report(&reporter).into()
}

fn run_set(config: &TelemetryConfig, args: &SetArgs) -> ExitCode {
    let handler = KvpReportingHandler::from_config(config);
    match handler.set_key(&args.key, &args.value) {
        Ok(location) => {
            debug!(slot = location.slot_index(), key = %args.key, "Key written");
            ExitCode::Delivered
        }
        Err(err) => {
            error!(error = %err, key = %args.key, "Failed to write key");
            ExitCode::Failed
        }
    }
}

fn run_dump(config: &TelemetryConfig, args: &DumpArgs) -> ExitCode {
    let store = match PoolStore::open(&config.kvp_pool_file) {
        Ok(store) => store,
        Err(err) => {
            error!(error = %err, "Failed to open pool file");
            return ExitCode::Failed;
        }
    };
    let records = match store.iterate(args.generation) {
        Ok(records) => records,
        Err(err) => {
            error!(error = %err, "Failed to read pool file");
            return ExitCode::Failed;
        }
    };

    for record in records {
        match record {
            Ok(record) => match serde_json::to_string(&record) {
                Ok(line) => println!("{}", line),
                Err(err) => warn!(error = %err, "Failed to serialize record"),
            },
            Err(err) => warn!(error = %err, "Skipping unreadable slot"),
        }
    }
    ExitCode::Delivered
}
