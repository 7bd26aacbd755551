//! Tracing subscriber setup.

use tallymart_types::{LoggingConfig, Result, TallymartError};
use tracing_subscriber::EnvFilter;

/// Install the global subscriber. `RUST_LOG` wins over `config.filter`.
///
/// Fails if the filter does not parse or a subscriber is already set.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.filter)
            .map_err(|e| TallymartError::Configuration(format!("logging.filter: {e}")))?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);
    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| TallymartError::Configuration(format!("tracing init: {e}")))
}
