//! Loading [`ServiceConfig`] from disk and the environment.

use std::fs;
use std::path::Path;

use tallymart_types::{Result, ServiceConfig, TallymartError};
use tracing::{debug, info};

/// Read `path` (if given) as TOML, then apply `TALLYMART_*` overrides from
/// the process environment and a `.env` file, then validate.
pub fn load_config(path: Option<&Path>) -> Result<ServiceConfig> {
    if let Ok(env_file) = dotenvy::dotenv() {
        debug!(path = %env_file.display(), ".env loaded");
    }

    let mut config = match path {
        Some(path) => {
            let raw = fs::read_to_string(path).map_err(|e| {
                TallymartError::Configuration(format!("read {}: {e}", path.display()))
            })?;
            ServiceConfig::from_toml_str(&raw)?
        }
        None => ServiceConfig::default(),
    };
    config.apply_env_overrides(|key| std::env::var(key).ok());
    config.validate()?;

    info!(
        gateway = %config.gateway.base_url,
        export_dir = %config.checkout.export_dir,
        api_key_set = !config.gateway.api_key.is_empty(),
        "configuration loaded"
    );
    Ok(config)
}
