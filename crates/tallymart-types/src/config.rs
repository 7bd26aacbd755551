//! Configuration types for a Tallymart deployment.
//!
//! Loaded from TOML; secrets and deployment-specific URLs can be overridden
//! from the environment (see [`ServiceConfig::apply_env_overrides`]).

use serde::{Deserialize, Serialize};

use crate::{constants, Result, TallymartError};

/// Top-level service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub gateway: GatewayConfig,
    pub checkout: CheckoutConfig,
    pub logging: LoggingConfig,
}

/// Payment provider client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// API root, e.g. `https://api.nowpayments.io/v1`.
    pub base_url: String,
    /// Sent as `x-api-key`.
    pub api_key: String,
    /// Public domain the provider calls back; the webhook path is appended.
    pub api_domain: String,
    /// Fiat currency prices are quoted in.
    pub price_currency: String,
    pub timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: constants::DEFAULT_GATEWAY_BASE_URL.to_string(),
            api_key: String::new(),
            api_domain: "http://localhost:8080".to_string(),
            price_currency: constants::DEFAULT_PRICE_CURRENCY.to_string(),
            timeout_secs: constants::DEFAULT_GATEWAY_TIMEOUT_SECS,
        }
    }
}

impl GatewayConfig {
    /// IPN callback URL handed to the provider for every payment.
    #[must_use]
    pub fn callback_url(&self) -> String {
        format!(
            "{}{}",
            self.api_domain.trim_end_matches('/'),
            constants::WEBHOOK_PATH
        )
    }
}

/// Checkout engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckoutConfig {
    /// Directory export artifacts are written into.
    pub export_dir: String,
    /// How long the inventory claim waits for its write section.
    pub claim_timeout_ms: u64,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            export_dir: constants::DEFAULT_EXPORT_DIR.to_string(),
            claim_timeout_ms: constants::DEFAULT_CLAIM_TIMEOUT_MS,
        }
    }
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

impl ServiceConfig {
    /// Parse a TOML document. Missing sections fall back to defaults.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        toml::from_str(input).map_err(|e| TallymartError::Configuration(e.to_string()))
    }

    /// Apply `TALLYMART_*` overrides from `lookup` (normally `std::env::var`).
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("TALLYMART_GATEWAY_API_KEY") {
            self.gateway.api_key = v;
        }
        if let Some(v) = lookup("TALLYMART_GATEWAY_BASE_URL") {
            self.gateway.base_url = v;
        }
        if let Some(v) = lookup("TALLYMART_API_DOMAIN") {
            self.gateway.api_domain = v;
        }
        if let Some(v) = lookup("TALLYMART_EXPORT_DIR") {
            self.checkout.export_dir = v;
        }
    }

    /// Reject configurations the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.gateway.base_url.trim().is_empty() {
            return Err(TallymartError::Configuration(
                "gateway.base_url must be set".into(),
            ));
        }
        if self.gateway.timeout_secs == 0 {
            return Err(TallymartError::Configuration(
                "gateway.timeout_secs must be > 0".into(),
            ));
        }
        if self.checkout.export_dir.trim().is_empty() {
            return Err(TallymartError::Configuration(
                "checkout.export_dir must be set".into(),
            ));
        }
        Ok(())
    }
}
