//! Telemetry configuration loading and resolution.
//!
//! Resolution order for the config file: CLI argument → environment
//! variable → XDG config dir → system config → built-in defaults.

use crate::error::{Result, TelemetryError};
use crate::registry::KVP_SINK_NAME;
use kvp_pool::DEFAULT_POOL_PATH;
use kvp_report::AgentTag;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming a config file.
const ENV_CONFIG_PATH: &str = "KVP_TELEMETRY_CONFIG";

/// Standard config file name.
const CONFIG_FILENAME: &str = "telemetry.json";

/// Application name for XDG and system directories.
const APP_NAME: &str = "kvp-telemetry";

/// Telemetry settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Register the KVP handler at startup.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Pool file shared with the host.
    #[serde(default = "default_pool_file")]
    pub kvp_pool_file: PathBuf,

    /// Registry name for the KVP handler.
    #[serde(default = "default_sink_name")]
    pub sink_name: String,

    /// Empty a pool file left over from a previous boot on first open.
    #[serde(default = "default_true")]
    pub truncate_stale_pool: bool,

    /// Override for the agent version in reports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_version: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_pool_file() -> PathBuf {
    PathBuf::from(DEFAULT_POOL_PATH)
}

fn default_sink_name() -> String {
    KVP_SINK_NAME.to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            kvp_pool_file: default_pool_file(),
            sink_name: default_sink_name(),
            truncate_stale_pool: true,
            agent_version: None,
        }
    }
}

impl TelemetryConfig {
    /// Load and validate a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TelemetryConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sink_name.trim().is_empty() {
            return Err(TelemetryError::Config("sink_name must not be empty".to_string()));
        }
        if self.kvp_pool_file.as_os_str().is_empty() {
            return Err(TelemetryError::Config(
                "kvp_pool_file must not be empty".to_string(),
            ));
        }
        if let Some(version) = &self.agent_version {
            if version.trim().is_empty() {
                return Err(TelemetryError::Config(
                    "agent_version must not be empty when set".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Agent tag for reports.
    pub fn agent(&self) -> AgentTag {
        match &self.agent_version {
            Some(version) => AgentTag::new(version.clone()),
            None => AgentTag::current(),
        }
    }

    pub fn with_pool_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.kvp_pool_file = path.into();
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_stale_truncation(mut self, enabled: bool) -> Self {
        self.truncate_stale_pool = enabled;
        self
    }
}

/// Where the config file was found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConfigSource {
    CliArgument,
    Environment,
    XdgConfig,
    SystemConfig,
    #[default]
    BuiltinDefault,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::CliArgument => write!(f, "CLI argument"),
            ConfigSource::Environment => write!(f, "environment variable"),
            ConfigSource::XdgConfig => write!(f, "XDG config"),
            ConfigSource::SystemConfig => write!(f, "system config"),
            ConfigSource::BuiltinDefault => write!(f, "builtin default"),
        }
    }
}

/// Find the config file to load, if any.
pub fn resolve_config_path(cli_path: Option<&Path>) -> (Option<PathBuf>, ConfigSource) {
    // An explicit path is returned even if missing so loading reports it.
    if let Some(path) = cli_path {
        return (Some(path.to_path_buf()), ConfigSource::CliArgument);
    }

    if let Ok(env_path) = std::env::var(ENV_CONFIG_PATH) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return (Some(path), ConfigSource::Environment);
        }
    }

    if let Some(xdg_config) = dirs::config_dir() {
        let path = xdg_config.join(APP_NAME).join(CONFIG_FILENAME);
        if path.exists() {
            return (Some(path), ConfigSource::XdgConfig);
        }
    }

    let system_path = PathBuf::from("/etc").join(APP_NAME).join(CONFIG_FILENAME);
    if system_path.exists() {
        return (Some(system_path), ConfigSource::SystemConfig);
    }

    (None, ConfigSource::BuiltinDefault)
}

/// Resolve and load the config, falling back to defaults.
pub fn load_config(cli_path: Option<&Path>) -> Result<(TelemetryConfig, ConfigSource)> {
    match resolve_config_path(cli_path) {
        (Some(path), source) => Ok((TelemetryConfig::load(&path)?, source)),
        (None, source) => Ok((TelemetryConfig::default(), source)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = TelemetryConfig::default();
        assert!(config.enabled);
        assert_eq!(config.kvp_pool_file, PathBuf::from("/var/lib/hyperv/.kvp_pool_1"));
        assert_eq!(config.sink_name, "telemetry");
        assert!(config.truncate_stale_pool);
        assert_eq!(config.agent(), AgentTag::current());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: TelemetryConfig =
            serde_json::from_str(r#"{"kvp_pool_file": "/tmp/pool"}"#).unwrap();
        assert_eq!(config.kvp_pool_file, PathBuf::from("/tmp/pool"));
        assert!(config.enabled);
        assert_eq!(config.sink_name, "telemetry");
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("telemetry.json");
        std::fs::write(
            &path,
            r#"{"enabled": false, "agent_version": "23.4", "truncate_stale_pool": false}"#,
        )
        .unwrap();

        let config = TelemetryConfig::load(&path).unwrap();
        assert!(!config.enabled);
        assert!(!config.truncate_stale_pool);
        assert_eq!(config.agent().to_string(), "Cloud-Init/23.4");
    }

    #[test]
    fn test_validate_rejects_empty_sink_name() {
        let config = TelemetryConfig {
            sink_name: "  ".to_string(),
            ..TelemetryConfig::default()
        };
        assert!(matches!(config.validate(), Err(TelemetryError::Config(_))));
    }

    #[test]
    fn test_load_invalid_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("telemetry.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            TelemetryConfig::load(&path),
            Err(TelemetryError::Json(_))
        ));
    }

    #[test]
    fn test_cli_path_wins() {
        let (path, source) = resolve_config_path(Some(Path::new("/nonexistent/telemetry.json")));
        assert_eq!(path, Some(PathBuf::from("/nonexistent/telemetry.json")));
        assert_eq!(source, ConfigSource::CliArgument);
    }
}
