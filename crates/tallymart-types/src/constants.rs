//! System-wide constants for the Tallymart core.

/// Decimal places kept for fiat-equivalent amounts.
pub const MONEY_SCALE: u32 = 8;

/// Fiat currency every price and balance is denominated in.
pub const DEFAULT_PRICE_CURRENCY: &str = "usd";

/// Default page size for transaction and listing queries.
pub const DEFAULT_PAGE_LIMIT: usize = 10;

/// Hard ceiling on a single page of results.
pub const MAX_PAGE_LIMIT: usize = 500;

/// Maximum listings a single checkout may claim.
pub const MAX_CHECKOUT_QUANTITY: usize = 10_000;

/// How many times a `PersistenceConflict` is retried before surfacing.
pub const MAX_CONFLICT_RETRIES: u32 = 2;

/// Default time the inventory store waits for its write section (ms).
pub const DEFAULT_CLAIM_TIMEOUT_MS: u64 = 250;

/// Default provider request timeout (seconds).
pub const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 30;

/// Default provider API root.
pub const DEFAULT_GATEWAY_BASE_URL: &str = "https://api.nowpayments.io/v1";

/// Path the provider posts IPN callbacks to, relative to the API domain.
pub const WEBHOOK_PATH: &str = "/api/payments/nowpayments/webhook";

/// Default directory export artifacts are written to.
pub const DEFAULT_EXPORT_DIR: &str = "uploads";

/// Number of accounts returned in the dashboard leaderboard.
pub const DASHBOARD_TOP_CLIENTS: usize = 5;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Service name used in logs and export headers.
pub const SERVICE_NAME: &str = "Tallymart";
