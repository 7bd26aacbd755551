//! HTTP behaviour of the NOWPayments client against a mock provider.

use rust_decimal::Decimal;
use serde_json::json;
use tallymart_gateway::{NowPaymentsClient, PaymentGateway, PaymentRequest};
use tallymart_types::{GatewayConfig, TallymartError, TransactionId};
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer) -> NowPaymentsClient {
    NowPaymentsClient::new(&GatewayConfig {
        base_url: server.uri(),
        api_key: "test-key".into(),
        timeout_secs: 5,
        ..GatewayConfig::default()
    })
    .unwrap()
}

fn request(tx: TransactionId) -> PaymentRequest {
    PaymentRequest {
        transaction_id: tx,
        amount: Decimal::new(25, 0),
        price_currency: "usd".into(),
        pay_currency: "btc".into(),
        callback_url: "https://shop.example/api/payments/nowpayments/webhook".into(),
        description: Some("Balance deposit by alice".into()),
    }
}

#[tokio::test]
async fn create_payment_sends_order_reference_and_maps_reply() {
    let server = MockServer::start().await;
    let tx = TransactionId::new();

    Mock::given(method("POST"))
        .and(path("/payment"))
        .and(header("x-api-key", "test-key"))
        .and(body_partial_json(json!({
            "price_amount": 25.0,
            "price_currency": "usd",
            "pay_currency": "btc",
            "order_id": tx.to_string(),
            "ipn_callback_url": "https://shop.example/api/payments/nowpayments/webhook"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "payment_id": "5745459419",
            "payment_status": "waiting",
            "pay_address": "3EZ2uTdVDAMFXTfc6uLDDKR6o8qKBZXVkj",
            "price_amount": 25,
            "price_currency": "usd",
            "pay_amount": 0.00042,
            "pay_currency": "btc",
            "order_id": tx.to_string(),
            "purchase_id": 4944856743u64,
            "network": "btc"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let handle = client_for(&server)
        .create_payment_request(&request(tx))
        .await
        .unwrap();

    assert_eq!(handle.payment_id, "5745459419");
    assert_eq!(handle.purchase_id.as_deref(), Some("4944856743"));
    assert_eq!(handle.pay_amount, Some(Decimal::new(42, 5)));
    assert_eq!(handle.network.as_deref(), Some("btc"));
    assert_eq!(handle.order_id, Some(tx.to_string()));
}

#[tokio::test]
async fn non_2xx_is_gateway_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/payment"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .create_payment_request(&request(TransactionId::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, TallymartError::GatewayUnavailable { .. }));
    assert!(err.is_retryable());
    assert!(err.to_string().contains("503"));
}

#[tokio::test]
async fn reply_without_payment_id_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/payment"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "payment_status": "waiting" })))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .create_payment_request(&request(TransactionId::new()))
        .await
        .unwrap_err();
    assert!(matches!(err, TallymartError::GatewayUnavailable { .. }));
}

#[tokio::test]
async fn unreachable_provider_is_gateway_unavailable() {
    let server = MockServer::start().await;
    let client = client_for(&server);
    drop(server);

    let err = client.list_currencies().await.unwrap_err();
    assert!(matches!(err, TallymartError::GatewayUnavailable { .. }));
}

#[tokio::test]
async fn invalid_request_never_reaches_the_provider() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut bad = request(TransactionId::new());
    bad.amount = Decimal::ZERO;
    let err = client_for(&server).create_payment_request(&bad).await.unwrap_err();
    assert!(matches!(err, TallymartError::Validation { .. }));
}

#[tokio::test]
async fn lists_merchant_currencies() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/merchant/coins"))
        .and(header("x-api-key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "selectedCurrencies": ["btc", "eth", "usdttrc20"]
        })))
        .mount(&server)
        .await;

    let coins = client_for(&server).list_currencies().await.unwrap();
    assert_eq!(coins, vec!["btc", "eth", "usdttrc20"]);
}

#[tokio::test]
async fn minimum_amount_passes_currency_pair() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/min-amount"))
        .and(query_param("currency_from", "eth"))
        .and(query_param("currency_to", "usd"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "currency_from": "eth",
            "currency_to": "usd",
            "min_amount": 0.0012,
            "fiat_equivalent": "3.95"
        })))
        .mount(&server)
        .await;

    let min = client_for(&server).minimum_amount("eth", "usd").await.unwrap();
    assert_eq!(min.min_amount, Decimal::new(12, 4));
    assert_eq!(min.fiat_equivalent, Some(Decimal::new(395, 2)));
}
