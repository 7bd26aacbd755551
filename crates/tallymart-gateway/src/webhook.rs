//! Inbound payment callbacks (IPN).

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tallymart_types::{ReportedStatus, Result, TallymartError};

use crate::amount;

/// A provider callback normalized into Tallymart terms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    /// The provider's order reference, which Tallymart sets to its own
    /// transaction id.
    pub provider_transaction_ref: String,
    pub payment_id: Option<String>,
    pub reported_status: ReportedStatus,
    pub amount_paid: Option<Decimal>,
    pub price_amount: Option<Decimal>,
    pub pay_amount: Option<Decimal>,
    pub pay_currency: Option<String>,
    pub payin_hash: Option<String>,
    pub payout_hash: Option<String>,
    pub network: Option<String>,
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(default, deserialize_with = "amount::id_string")]
    payment_id: Option<String>,
    #[serde(default)]
    payment_status: Option<String>,
    #[serde(default, deserialize_with = "amount::id_string")]
    order_id: Option<String>,
    #[serde(default, deserialize_with = "amount::flexible")]
    actually_paid: Option<Decimal>,
    #[serde(default, deserialize_with = "amount::flexible")]
    price_amount: Option<Decimal>,
    #[serde(default, deserialize_with = "amount::flexible")]
    pay_amount: Option<Decimal>,
    #[serde(default)]
    pay_currency: Option<String>,
    #[serde(default)]
    payin_hash: Option<String>,
    #[serde(default)]
    payout_hash: Option<String>,
    #[serde(default)]
    network: Option<String>,
}

fn malformed(reason: impl Into<String>) -> TallymartError {
    TallymartError::MalformedEvent {
        reason: reason.into(),
    }
}

/// Normalize a raw callback body.
///
/// The order reference and status are required; an unrecognized status is
/// not an error here and comes back as [`ReportedStatus::Unknown`].
pub fn parse_webhook_event(payload: &[u8]) -> Result<WebhookEvent> {
    let raw: RawEvent =
        serde_json::from_slice(payload).map_err(|e| malformed(format!("invalid payload: {e}")))?;

    let provider_transaction_ref = raw
        .order_id
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| malformed("order_id is missing"))?;
    let status = raw
        .payment_status
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| malformed("payment_status is missing"))?;

    Ok(WebhookEvent {
        provider_transaction_ref,
        payment_id: raw.payment_id,
        reported_status: ReportedStatus::parse(&status),
        amount_paid: raw.actually_paid,
        price_amount: raw.price_amount,
        pay_amount: raw.pay_amount,
        pay_currency: raw.pay_currency,
        payin_hash: raw.payin_hash,
        payout_hash: raw.payout_hash,
        network: raw.network,
    })
}
