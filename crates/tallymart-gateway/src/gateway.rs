//! The outbound provider seam.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tallymart_types::{ProviderPaymentHandle, Result, TallymartError, TransactionId};

/// Everything the provider needs to open a payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    /// Sent as the provider's order reference; webhooks come back keyed on it.
    pub transaction_id: TransactionId,
    pub amount: Decimal,
    pub price_currency: String,
    pub pay_currency: String,
    pub callback_url: String,
    pub description: Option<String>,
}

impl PaymentRequest {
    /// Reject requests the provider would refuse anyway.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();
        if self.amount <= Decimal::ZERO {
            errors.push("valid amount is required");
        }
        if self.pay_currency.trim().is_empty() {
            errors.push("pay currency is required");
        }
        if self.price_currency.trim().is_empty() {
            errors.push("price currency is required");
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(TallymartError::validation(errors.join(", ")))
        }
    }
}

/// Smallest payable amount for a currency pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MinimumAmount {
    pub currency_from: String,
    pub currency_to: String,
    pub min_amount: Decimal,
    pub fiat_equivalent: Option<Decimal>,
}

/// A crypto payment provider.
///
/// Implementations perform network I/O only; callers must not hold any
/// account or inventory lock across these calls.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a payment and return the provider's identifiers for it.
    async fn create_payment_request(&self, request: &PaymentRequest) -> Result<ProviderPaymentHandle>;

    /// Pay currencies enabled for this merchant.
    async fn list_currencies(&self) -> Result<Vec<String>>;

    async fn minimum_amount(&self, pay_currency: &str, price_currency: &str) -> Result<MinimumAmount>;

    /// Provider name for logs.
    fn name(&self) -> &str;
}
