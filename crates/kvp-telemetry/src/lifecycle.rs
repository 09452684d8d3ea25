//! Telemetry startup and teardown.

use crate::config::TelemetryConfig;
use crate::error::Result;
use crate::handler::KvpReportingHandler;
use crate::registry::HandlerRegistry;
use std::sync::Arc;
use tracing::info;

/// Register the KVP handler described by `config`.
///
/// Returns `None` without touching the registry when telemetry is disabled.
pub fn register_kvp_handler(
    registry: &HandlerRegistry,
    config: &TelemetryConfig,
) -> Result<Option<Arc<KvpReportingHandler>>> {
    if !config.enabled {
        info!("KVP telemetry disabled by configuration");
        return Ok(None);
    }
    config.validate()?;

    let handler = Arc::new(KvpReportingHandler::from_config(config));
    registry.register(config.sink_name.clone(), handler.clone())?;
    info!(
        sink = %config.sink_name,
        path = %config.kvp_pool_file.display(),
        "KVP telemetry enabled"
    );
    Ok(Some(handler))
}

/// Remove the KVP handler registered for `config`.
pub fn unregister_kvp_handler(registry: &HandlerRegistry, config: &TelemetryConfig) -> Result<()> {
    registry.unregister(&config.sink_name)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TelemetryError;
    use tempfile::TempDir;

    #[test]
    fn test_register_and_unregister() {
        let dir = TempDir::new().unwrap();
        let config = TelemetryConfig::default().with_pool_file(dir.path().join("pool"));
        let registry = HandlerRegistry::new();

        let handler = register_kvp_handler(&registry, &config).unwrap().unwrap();
        assert_eq!(handler.path(), dir.path().join("pool"));
        assert!(registry.contains("telemetry"));

        unregister_kvp_handler(&registry, &config).unwrap();
        assert!(!registry.contains("telemetry"));
    }

    #[test]
    fn test_disabled_registers_nothing() {
        let config = TelemetryConfig::default().with_enabled(false);
        let registry = HandlerRegistry::new();
        assert!(register_kvp_handler(&registry, &config).unwrap().is_none());
        assert!(registry.names().is_empty());
    }

    #[test]
    fn test_double_registration_fails() {
        let dir = TempDir::new().unwrap();
        let config = TelemetryConfig::default().with_pool_file(dir.path().join("pool"));
        let registry = HandlerRegistry::new();
        register_kvp_handler(&registry, &config).unwrap();
        assert!(matches!(
            register_kvp_handler(&registry, &config),
            Err(TelemetryError::DuplicateRegistration(_))
        ));
    }
}
