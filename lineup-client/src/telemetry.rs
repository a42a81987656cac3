//! Tracing subscriber setup.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogConfig;
use crate::error::{ClientError, ClientResult};

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured filter when it is set. Call once at
/// startup; a second call fails because a subscriber is already installed.
pub fn init_tracing(config: &LogConfig) -> ClientResult<()> {
    let env_filter = build_filter(config)?;
    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if config.json {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()
    };
    installed.map_err(|e| ClientError::Telemetry(format!("Failed to init subscriber: {}", e)))?;

    tracing::debug!(filter = %config.filter, json = config.json, "Tracing initialized");
    Ok(())
}

fn build_filter(config: &LogConfig) -> ClientResult<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.filter)
            .map_err(|e| ClientError::Telemetry(format!("Invalid log filter '{}': {}", config.filter, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configured_filter_parses() {
        let config = LogConfig {
            filter: "lineup_cache=debug,info".to_string(),
            json: false,
        };
        if std::env::var("RUST_LOG").is_err() {
            let filter = build_filter(&config).unwrap();
            assert!(filter.to_string().contains("lineup_cache=debug"));
        }
    }

    #[test]
    fn test_garbage_filter_rejected() {
        let config = LogConfig {
            filter: "lineup_cache=notalevel".to_string(),
            json: true,
        };
        if std::env::var("RUST_LOG").is_err() {
            assert!(matches!(build_filter(&config), Err(ClientError::Telemetry(_))));
        }
    }
}
