/**
 * Server Configuration
 *
 * Loads the process configuration and opens the registry it names.
 *
 * # Configuration Sources
 *
 * `.env` (via `dotenv`, loaded by the binary), then `LIVE_CONFIG` TOML, then
 * `LIVE_*` environment variables; see [`LiveConfig`].
 */

use crate::backend::error::BackendError;
use crate::backend::registry::ConnectionRegistry;
use crate::shared::{ConfigError, LiveConfig};

/// Load configuration from the environment and log what this process is
pub fn load_config() -> Result<LiveConfig, ConfigError> {
    let config = LiveConfig::from_env()?;
    tracing::info!(
        "[Server] Process {}/{} version {} (http {}, control {})",
        config.process_index,
        config.process_count,
        config.version,
        config.http_port(),
        config.control_port()
    );
    Ok(config)
}

/// Open the registry database named by `config`; failure stops startup
pub async fn load_registry(config: &LiveConfig) -> Result<ConnectionRegistry, BackendError> {
    match ConnectionRegistry::connect(&config.database_url).await {
        Ok(registry) => {
            tracing::info!("[Server] Registry ready");
            Ok(registry)
        }
        Err(e) => {
            tracing::error!("[Server] Failed to open registry {}: {}", config.database_url, e);
            Err(e)
        }
    }
}
