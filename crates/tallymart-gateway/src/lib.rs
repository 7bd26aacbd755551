//! # tallymart-gateway
//!
//! **Payment Gateway Adapter**: translates between Tallymart and the external
//! crypto payment provider. Holds no business state.
//!
//! - [`PaymentGateway`]: the outbound seam (payment creation, currency
//!   catalogue, minimum amounts), implemented over HTTP by [`NowPaymentsClient`]
//! - [`parse_webhook_event`]: normalizes the provider's inbound callback
//!   into a [`WebhookEvent`]
//!
//! Network failures and non-2xx answers surface as
//! `TallymartError::GatewayUnavailable`; payloads that cannot be normalized
//! surface as `TallymartError::MalformedEvent`.

mod amount;
pub mod gateway;
pub mod nowpayments;
pub mod webhook;

pub use gateway::{MinimumAmount, PaymentGateway, PaymentRequest};
pub use nowpayments::NowPaymentsClient;
pub use webhook::{parse_webhook_event, WebhookEvent};
