//! HTTP client for the NOWPayments API.

use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tallymart_types::{GatewayConfig, ProviderPaymentHandle, Result, TallymartError};
use tracing::{debug, info, warn};

use crate::amount;
use crate::gateway::{MinimumAmount, PaymentGateway, PaymentRequest};

const API_KEY_HEADER: &str = "x-api-key";

/// `POST /payment` body.
#[derive(Serialize)]
struct CreatePaymentBody<'a> {
    #[serde(with = "rust_decimal::serde::float")]
    price_amount: Decimal,
    price_currency: &'a str,
    pay_currency: &'a str,
    ipn_callback_url: &'a str,
    order_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    order_description: Option<&'a str>,
}

/// `POST /payment` answer; only the fields we keep.
#[derive(Deserialize)]
struct CreatePaymentReply {
    #[serde(default, deserialize_with = "amount::id_string")]
    payment_id: Option<String>,
    #[serde(default, deserialize_with = "amount::id_string")]
    purchase_id: Option<String>,
    #[serde(default)]
    pay_address: Option<String>,
    #[serde(default, deserialize_with = "amount::flexible")]
    pay_amount: Option<Decimal>,
    #[serde(default)]
    pay_currency: Option<String>,
    #[serde(default, deserialize_with = "amount::flexible")]
    price_amount: Option<Decimal>,
    #[serde(default)]
    network: Option<String>,
    #[serde(default, deserialize_with = "amount::id_string")]
    order_id: Option<String>,
}

#[derive(Deserialize)]
struct CoinsReply {
    #[serde(default, rename = "selectedCurrencies")]
    selected_currencies: Vec<String>,
}

#[derive(Deserialize)]
struct MinAmountReply {
    #[serde(default)]
    currency_from: Option<String>,
    #[serde(default)]
    currency_to: Option<String>,
    #[serde(default, deserialize_with = "amount::flexible")]
    min_amount: Option<Decimal>,
    #[serde(default, deserialize_with = "amount::flexible")]
    fiat_equivalent: Option<Decimal>,
}

/// NOWPayments client. Cheap to clone; the inner connection pool is shared.
#[derive(Clone)]
pub struct NowPaymentsClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl NowPaymentsClient {
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(TallymartError::Configuration(
                "gateway.api_key must be set".into(),
            ));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("tallymart/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TallymartError::Configuration(format!("http client: {e}")))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response, what: &str) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, %body, what, "provider returned an error");
            return Err(TallymartError::GatewayUnavailable {
                reason: format!("{what}: HTTP {status}: {body}"),
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|e| TallymartError::GatewayUnavailable {
                reason: format!("{what}: unreadable response: {e}"),
            })
    }

    fn unreachable(what: &str, err: &reqwest::Error) -> TallymartError {
        warn!(error = %err, what, "provider unreachable");
        TallymartError::GatewayUnavailable {
            reason: format!("{what}: {err}"),
        }
    }
}

#[async_trait]
impl PaymentGateway for NowPaymentsClient {
    async fn create_payment_request(&self, request: &PaymentRequest) -> Result<ProviderPaymentHandle> {
        request.validate()?;
        let body = CreatePaymentBody {
            price_amount: request.amount,
            price_currency: &request.price_currency,
            pay_currency: &request.pay_currency,
            ipn_callback_url: &request.callback_url,
            order_id: request.transaction_id.to_string(),
            order_description: request.description.as_deref(),
        };
        debug!(tx = %request.transaction_id, amount = %request.amount, pay_currency = %request.pay_currency, "creating provider payment");

        let response = self
            .http
            .post(self.url("/payment"))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Self::unreachable("create payment", &e))?;
        let reply: CreatePaymentReply = Self::read_json(response, "create payment").await?;

        let payment_id = reply.payment_id.ok_or_else(|| TallymartError::GatewayUnavailable {
            reason: "create payment: response carried no payment_id".into(),
        })?;
        info!(tx = %request.transaction_id, payment_id = %payment_id, "provider payment created");

        Ok(ProviderPaymentHandle {
            payment_id,
            purchase_id: reply.purchase_id,
            pay_address: reply.pay_address,
            pay_amount: reply.pay_amount,
            pay_currency: reply.pay_currency,
            price_amount: reply.price_amount,
            network: reply.network,
            order_id: reply.order_id,
        })
    }

    async fn list_currencies(&self) -> Result<Vec<String>> {
        let response = self
            .http
            .get(self.url("/merchant/coins"))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| Self::unreachable("list currencies", &e))?;
        let reply: CoinsReply = Self::read_json(response, "list currencies").await?;
        Ok(reply.selected_currencies)
    }

    async fn minimum_amount(&self, pay_currency: &str, price_currency: &str) -> Result<MinimumAmount> {
        if pay_currency.trim().is_empty() {
            return Err(TallymartError::validation("cryptocurrency is required"));
        }
        let response = self
            .http
            .get(self.url("/min-amount"))
            .header(API_KEY_HEADER, &self.api_key)
            .query(&[
                ("currency_from", pay_currency),
                ("currency_to", price_currency),
                ("fiat_equivalent", price_currency),
                ("is_fee_paid_by_user", "False"),
            ])
            .send()
            .await
            .map_err(|e| Self::unreachable("minimum amount", &e))?;
        let reply: MinAmountReply = Self::read_json(response, "minimum amount").await?;

        Ok(MinimumAmount {
            currency_from: reply.currency_from.unwrap_or_else(|| pay_currency.to_string()),
            currency_to: reply.currency_to.unwrap_or_else(|| price_currency.to_string()),
            min_amount: reply.min_amount.unwrap_or(Decimal::ZERO),
            fiat_equivalent: reply.fiat_equivalent,
        })
    }

    fn name(&self) -> &str {
        "nowpayments"
    }
}
