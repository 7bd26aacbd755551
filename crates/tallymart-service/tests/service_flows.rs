//! End-to-end flows through the caller-facing surface with a stub provider.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde_json::json;
use tallymart_checkout::FsExportSink;
use tallymart_gateway::{MinimumAmount, PaymentGateway, PaymentRequest};
use tallymart_ledger::TransactionFilter;
use tallymart_service::{ConfigValueType, CreatePayment, Tallymart};
use tallymart_types::{
    AccountId, AccountRole, ListingFilter, ListingStatus, NewListing, PaymentStatus,
    ProviderPaymentHandle, Result, ServiceConfig, TallymartError, TransactionKind,
};

#[derive(Default)]
struct StubGateway {
    down: bool,
    seen: Mutex<Vec<PaymentRequest>>,
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn create_payment_request(&self, request: &PaymentRequest) -> Result<ProviderPaymentHandle> {
        self.seen.lock().push(request.clone());
        if self.down {
            return Err(TallymartError::GatewayUnavailable {
                reason: "503 Service Unavailable".into(),
            });
        }
        let n = self.seen.lock().len();
        Ok(ProviderPaymentHandle {
            payment_id: format!("pay-{n}"),
            purchase_id: Some(format!("purchase-{n}")),
            pay_address: Some("bc1qstubaddress".into()),
            pay_amount: Some(Decimal::new(151, 5)),
            pay_currency: Some(request.pay_currency.clone()),
            price_amount: Some(request.amount),
            network: Some("btc".into()),
            order_id: Some(request.transaction_id.to_string()),
        })
    }

    async fn list_currencies(&self) -> Result<Vec<String>> {
        Ok(vec!["btc".into(), "eth".into()])
    }

    async fn minimum_amount(&self, pay_currency: &str, price_currency: &str) -> Result<MinimumAmount> {
        Ok(MinimumAmount {
            currency_from: pay_currency.into(),
            currency_to: price_currency.into(),
            min_amount: Decimal::new(1, 4),
            fiat_equivalent: Some(Decimal::new(5, 0)),
        })
    }

    fn name(&self) -> &str {
        "stub"
    }
}

struct Fixture {
    core: Tallymart,
    gateway: Arc<StubGateway>,
    _exports: tempfile::TempDir,
}

fn fixture_with(gateway: StubGateway) -> Fixture {
    let exports = tempfile::tempdir().unwrap();
    let gateway = Arc::new(gateway);
    let core = Tallymart::new(
        ServiceConfig::default(),
        Arc::clone(&gateway) as Arc<dyn PaymentGateway>,
        Arc::new(FsExportSink::new(exports.path(), "/uploads")),
    );
    Fixture {
        core,
        gateway,
        _exports: exports,
    }
}

fn fixture() -> Fixture {
    fixture_with(StubGateway::default())
}

impl Fixture {
    fn account(&self, name: &str, role: AccountRole) -> AccountId {
        self.core.register_account(name, role).data.unwrap().id
    }

    fn balance(&self, id: AccountId) -> Decimal {
        self.core.ledger().account(id).unwrap().balance
    }

    async fn pay(&self, username: &str, amount: i64) -> tallymart_types::ApiResponse<tallymart_service::PaymentCreated> {
        self.core
            .create_payment(CreatePayment {
                username: username.into(),
                amount: Decimal::new(amount, 0),
                pay_currency: "BTC".into(),
                description: None,
            })
            .await
    }
}

fn webhook(order_id: &str, status: &str, paid: serde_json::Value) -> Vec<u8> {
    json!({
        "payment_id": 77,
        "payment_status": status,
        "order_id": order_id,
        "price_amount": 100,
        "actually_paid": paid,
        "pay_currency": "btc",
    })
    .to_string()
    .into_bytes()
}

#[tokio::test]
async fn payment_is_recorded_waiting_then_settled_by_webhook() {
    let f = fixture();
    let alice = f.account("alice", AccountRole::Client);

    let created = f.pay("alice", 100).await;
    assert!(created.success, "{:?}", created.message);
    let created = created.data.unwrap();
    assert_eq!(created.status, PaymentStatus::Waiting);
    assert_eq!(created.payment.payment_id, "pay-1");

    let sent = f.gateway.seen.lock()[0].clone();
    assert_eq!(sent.transaction_id, created.transaction_id);
    assert_eq!(sent.pay_currency, "btc");
    assert_eq!(sent.callback_url, "http://localhost:8080/api/payments/nowpayments/webhook");
    assert_eq!(sent.description.as_deref(), Some("Balance deposit by alice"));

    let stored = f.core.ledger().transaction(created.transaction_id).unwrap();
    assert_eq!(stored.provider_payment_id.as_deref(), Some("pay-1"));
    assert_eq!(stored.pay_address.as_deref(), Some("bc1qstubaddress"));

    let order = created.transaction_id.to_string();
    let ack = f.core.handle_webhook(&webhook(&order, "finished", json!(100)));
    assert!(ack.success);
    assert_eq!(ack.data.unwrap().status, "finished");
    assert_eq!(f.balance(alice), Decimal::new(100, 0));

    let again = f.core.handle_webhook(&webhook(&order, "finished", json!(100)));
    assert!(again.success);
    assert_eq!(again.data.unwrap().status, "duplicate");
    assert_eq!(f.balance(alice), Decimal::new(100, 0));

    let status = f.core.get_payment_status(alice, "pay-1").data.unwrap();
    assert_eq!(status.status, PaymentStatus::Finished);
    assert_eq!(status.account_balance, Decimal::new(100, 0));
    assert!(status.finished_at.is_some());
    assert!(f.core.verify_balance(alice).data.unwrap().consistent);
}

#[tokio::test]
async fn gateway_outage_leaves_entry_waiting() {
    let f = fixture_with(StubGateway {
        down: true,
        ..StubGateway::default()
    });
    let alice = f.account("alice", AccountRole::Client);

    let response = f.pay("alice", 40).await;
    assert!(!response.success);
    assert_eq!(response.status_code, 502);

    let entries = f.core.ledger().query(&TransactionFilter::for_account(alice));
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, PaymentStatus::Waiting);
    assert!(entries[0].provider_payment_id.is_none());
    assert_eq!(f.balance(alice), Decimal::ZERO);
}

#[tokio::test]
async fn invalid_payment_input_records_nothing() {
    let f = fixture();
    let alice = f.account("alice", AccountRole::Client);

    let unknown = f.pay("nobody", 10).await;
    assert_eq!(unknown.status_code, 404);

    let zero = f.pay("alice", 0).await;
    assert_eq!(zero.status_code, 400);

    let no_currency = f
        .core
        .create_payment(CreatePayment {
            username: "alice".into(),
            amount: Decimal::TEN,
            pay_currency: " ".into(),
            description: None,
        })
        .await;
    assert_eq!(no_currency.status_code, 400);

    assert!(f.core.ledger().query(&TransactionFilter::for_account(alice)).is_empty());
    assert!(f.gateway.seen.lock().is_empty());
}

#[tokio::test]
async fn catalogue_calls_pass_through() {
    let f = fixture();
    assert_eq!(f.core.list_currencies().await.data.unwrap(), vec!["btc", "eth"]);
    let min = f.core.minimum_amount("btc").await.data.unwrap();
    assert_eq!(min.currency_to, "usd");
    assert_eq!(f.core.minimum_amount("").await.status_code, 400);
}

#[tokio::test]
async fn webhook_rejections_and_ignored_statuses() {
    let f = fixture();
    f.account("alice", AccountRole::Client);
    let created = f.pay("alice", 100).await.data.unwrap();
    let order = created.transaction_id.to_string();

    let malformed = f.core.handle_webhook(b"not json");
    assert!(!malformed.success);
    assert_eq!(malformed.status_code, 400);

    let unknown_tx = f
        .core
        .handle_webhook(&webhook("0192f0c2-8d4e-7c1a-9f00-00000000dead", "finished", json!(1)));
    assert_eq!(unknown_tx.status_code, 404);

    let odd = f.core.handle_webhook(&webhook(&order, "on_hold", json!(null)));
    assert!(odd.success);
    assert_eq!(odd.data.unwrap().status, "on_hold");

    let partial = f.core.handle_webhook(&webhook(&order, "partially_paid", json!(40)));
    assert!(partial.success);
    let tx = f.core.ledger().transaction(created.transaction_id).unwrap();
    assert_eq!(tx.remaining_amount, Decimal::new(60, 0));
    assert!(tx.is_partial_payment);
}

#[test]
fn admin_adjustments_require_an_admin() {
    let f = fixture();
    let admin = f.account("root", AccountRole::Admin);
    let alice = f.account("alice", AccountRole::Client);

    let added = f
        .core
        .admin_add_balance(admin, alice, Decimal::new(30, 0), Some("promo".into()));
    assert!(added.success);
    assert_eq!(added.data.unwrap().new_balance, Decimal::new(30, 0));

    let by_client = f.core.admin_add_balance(alice, alice, Decimal::ONE, None);
    assert_eq!(by_client.status_code, 400);

    let overdraw = f
        .core
        .admin_deduct_balance(admin, alice, Decimal::new(31, 0), None);
    assert_eq!(overdraw.status_code, 400);

    let deducted = f
        .core
        .admin_deduct_balance(admin, alice, Decimal::new(10, 0), None)
        .data
        .unwrap();
    assert_eq!(deducted.new_balance, Decimal::new(20, 0));
    assert_eq!(deducted.transaction.kind, TransactionKind::AdminDeduction);
    assert_eq!(deducted.transaction.acting_admin, Some(admin));

    let listed = f
        .core
        .get_transactions("alice", TransactionFilter::default(), 1, 10)
        .data
        .unwrap();
    assert_eq!(listed.balance, Decimal::new(20, 0));
    assert_eq!(listed.transactions.items.len(), 2);
    assert_eq!(listed.statistics.total_deposited, Decimal::new(30, 0));

    let charge = f.core.system_charge(alice, Decimal::new(5, 0), "Monthly listing fee");
    assert_eq!(charge.data.unwrap().new_balance, Decimal::new(15, 0));
    assert!(f.core.verify_balance(alice).data.unwrap().consistent);
}

#[test]
fn transactions_are_scoped_to_their_owner() {
    let f = fixture();
    let admin = f.account("root", AccountRole::Admin);
    let alice = f.account("alice", AccountRole::Client);
    let bob = f.account("bob", AccountRole::Client);
    let tx = f
        .core
        .admin_add_balance(admin, alice, Decimal::ONE, None)
        .data
        .unwrap()
        .transaction;

    assert!(f.core.get_transaction(alice, &tx.id.to_string()).success);
    assert_eq!(f.core.get_transaction(bob, &tx.id.to_string()).status_code, 404);
    assert_eq!(f.core.get_transaction(AccountId::new(), "x").status_code, 404);

    let views = f.core.transaction_views(alice).data.unwrap();
    assert_eq!(views.completed.len(), 1);
    assert!(views.active.is_empty());
    assert_eq!(f.core.list_all_transactions(&TransactionFilter::default(), 1, 10).data.unwrap().items.len(), 1);
}

fn license(category: &str, key: &str) -> NewListing {
    NewListing {
        category: category.into(),
        title: format!("{category} suite"),
        edition: Some("Pro".into()),
        region: "Global".into(),
        license_key: key.into(),
        description: None,
    }
}

#[test]
fn listings_checkout_and_dashboard() {
    let f = fixture();
    let admin = f.account("root", AccountRole::Admin);
    let seller = f.account("sam", AccountRole::Seller);
    let buyer = f.account("bob", AccountRole::Buyer);

    assert!(f.core.upsert_price(admin, "office", Decimal::new(12, 0), true).success);
    assert_eq!(f.core.upsert_price(buyer, "office", Decimal::ONE, true).status_code, 400);

    let report = f
        .core
        .import_listings(
            seller,
            vec![
                license("office", "K-1"),
                license("office", "K-2"),
                license("missing", "K-3"),
                license("office", "K-1"),
            ],
        )
        .data
        .unwrap();
    assert_eq!(report.accepted, 2);
    let rows: Vec<_> = report.rejected.iter().map(|r| r.row).collect();
    assert_eq!(rows, vec![3, 4]);

    assert_eq!(f.core.create_listing(buyer, license("office", "K-9")).status_code, 400);

    f.core.admin_add_balance(admin, buyer, Decimal::new(50, 0), None);
    let filter = ListingFilter {
        category: Some("office".into()),
        ..ListingFilter::default()
    };
    assert_eq!(f.core.count_listings(&filter).data, Some(2));

    let receipt = f.core.checkout("bob", 2, &filter);
    assert!(receipt.success, "{:?}", receipt.message);
    let receipt = receipt.data.unwrap();
    assert_eq!(receipt.total_cost, Decimal::new(24, 0));
    assert!(receipt.export.is_some());
    assert_eq!(f.balance(buyer), Decimal::new(26, 0));
    assert_eq!(f.balance(seller), Decimal::new(24, 0));

    let sold = f
        .core
        .listings_by_seller(seller, Some(ListingStatus::Sold), 1, 10)
        .data
        .unwrap();
    assert_eq!(sold.items.len(), 2);

    let dash = f.core.dashboard().data.unwrap();
    assert_eq!(dash.active_clients, 1);
    assert_eq!(dash.total_client_balance, Decimal::new(26, 0));
    assert_eq!(dash.listings_by_category["office"]["Sold"], 2);

    let empty = f.core.checkout("bob", 1, &filter);
    assert_eq!(empty.status_code, 400);
}

#[test]
fn seller_suspension_hides_listings() {
    let f = fixture();
    let admin = f.account("root", AccountRole::Admin);
    let seller = f.account("sam", AccountRole::Seller);
    f.core.upsert_price(admin, "os", Decimal::new(3, 0), false);
    f.core.create_listing(seller, license("os", "OS-1"));
    f.core.create_listing(seller, license("os", "OS-2"));

    assert_eq!(f.core.update_seller_status(seller, ListingStatus::Suspended).data, Some(2));
    assert_eq!(f.core.count_listings(&ListingFilter::default()).data, Some(0));
    assert_eq!(f.core.update_seller_status(seller, ListingStatus::Sold).status_code, 400);
    assert_eq!(f.core.update_seller_status(seller, ListingStatus::Available).data, Some(2));
    assert_eq!(f.core.search_listings(&ListingFilter::default(), 1, 10).data.unwrap().items.len(), 2);
}

#[test]
fn import_size_follows_settings() {
    let f = fixture();
    let admin = f.account("root", AccountRole::Admin);
    let seller = f.account("sam", AccountRole::Seller);
    f.core.upsert_price(admin, "os", Decimal::ONE, false);

    assert!(f.core.update_setting(admin, "import_max_records", json!(1), None).success);
    let too_many = f
        .core
        .import_listings(seller, vec![license("os", "A"), license("os", "B")]);
    assert_eq!(too_many.status_code, 400);
    assert!(f.core.import_listings(seller, vec![]).status_code == 400);

    let created = f.core.create_setting(
        admin,
        "site_banner",
        json!("Spring sale"),
        ConfigValueType::String,
        None,
    );
    assert_eq!(created.status_code, 201);
    assert_eq!(created.data.unwrap().updated_by, Some(admin));
    assert_eq!(
        f.core
            .create_setting(seller, "x_y", json!(1), ConfigValueType::Number, None)
            .status_code,
        400
    );
    assert_eq!(f.core.get_setting("site_banner").data.unwrap().value, json!("Spring sale"));
    assert!(f.core.delete_setting(admin, "site_banner").success);
    assert_eq!(f.core.get_setting("site_banner").status_code, 404);
    assert_eq!(
        f.core.reset_setting(admin, "import_max_records").data.unwrap().value,
        json!(1000)
    );
    assert!(f.core.list_settings().data.unwrap().len() >= 5);
}

#[test]
fn deactivated_accounts_cannot_buy() {
    let f = fixture();
    let buyer = f.account("bob", AccountRole::Buyer);
    assert!(f.core.set_account_active(buyer, false).success);
    assert_eq!(f.core.checkout("bob", 1, &ListingFilter::default()).status_code, 403);
    assert_eq!(f.core.register_account("bob", AccountRole::Buyer).status_code, 409);
}
