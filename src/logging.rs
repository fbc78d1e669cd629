use anyhow::Result;
use tracing_subscriber::EnvFilter;
use crate::config::LogConfig;

/// Install the global fmt subscriber. `RUST_LOG` takes precedence over the configured
/// level. A second call keeps the subscriber that is already installed.
pub fn setup_logging(cfg: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(&cfg.level))?;

    let installed = if cfg.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .try_init()
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
    };

    if installed.is_err() {
        tracing::debug!("Global subscriber already installed");
    }
    Ok(())
}

/// Root span carrying the service name; instrument the service's main future with it.
pub fn service_span(name: &str) -> tracing::Span {
    tracing::info_span!("service", name = %name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_logging_is_idempotent() {
        let cfg = LogConfig { level: "debug".to_string(), json: true };
        assert!(setup_logging(&cfg).is_ok());
        let cfg = LogConfig { level: "info".to_string(), json: false };
        assert!(setup_logging(&cfg).is_ok(), "Second install should be a no-op");
    }
}
