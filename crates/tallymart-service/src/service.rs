//! Caller-facing operations. Every method folds its outcome into an
//! [`ApiResponse`] envelope; errors never escape as panics.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tallymart_checkout::{
    CheckoutEngine, CheckoutReceipt, ExportSink, FsExportSink, ImportReport, InventoryStore,
    PriceCatalog,
};
use tallymart_gateway::{MinimumAmount, NowPaymentsClient, PaymentGateway, PaymentRequest};
use tallymart_ledger::{AccountStatistics, AdminDesk, Adjustment, LedgerStore, TransactionFilter};
use tallymart_reconcile::{ReconcileOutcome, ReconciliationEngine};
use tallymart_types::{
    Account, AccountId, AccountRole, AdjustDirection, ApiResponse, Listing, ListingFilter,
    ListingStatus, NewListing, NewTransaction, Page, PaymentStatus, PriceRef,
    ProviderPaymentHandle, Result, ServiceConfig, TallymartError, Transaction, TransactionId,
    TransactionKind,
};
use tracing::{error, info, warn};

use crate::config_store::{ConfigEntry, ConfigStore, ConfigValueType, IMPORT_MAX_RECORDS};
use crate::dashboard::{dashboard_stats, DashboardStats};

/// Public path prefix export locators are served under.
const EXPORT_PUBLIC_PREFIX: &str = "/uploads";

/// Input to [`Tallymart::create_payment`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePayment {
    pub username: String,
    pub amount: Decimal,
    pub pay_currency: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCreated {
    pub transaction_id: TransactionId,
    pub status: PaymentStatus,
    pub payment: ProviderPaymentHandle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountTransactions {
    pub balance: Decimal,
    pub transactions: Page<Transaction>,
    pub statistics: AccountStatistics,
}

/// Polling view of one payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentStatusView {
    pub status: PaymentStatus,
    pub amount_received: Decimal,
    pub remaining_amount: Decimal,
    pub is_partial_payment: bool,
    pub price_amount: Decimal,
    pub actually_paid: Decimal,
    pub pay_address: Option<String>,
    pub pay_currency: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub account_balance: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionViews {
    pub active: Vec<Transaction>,
    pub completed: Vec<Transaction>,
    pub failed: Vec<Transaction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceCheck {
    pub balance: Decimal,
    pub from_ledger: Decimal,
    pub consistent: bool,
}

/// What the provider gets back from a webhook delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAck {
    pub status: String,
    pub outcome: Option<ReconcileOutcome>,
}

/// The assembled marketplace core.
pub struct Tallymart {
    config: ServiceConfig,
    ledger: Arc<LedgerStore>,
    admin: AdminDesk,
    gateway: Arc<dyn PaymentGateway>,
    reconciler: ReconciliationEngine,
    inventory: Arc<InventoryStore>,
    checkout: CheckoutEngine,
    settings: ConfigStore,
}

impl Tallymart {
    /// Wire the core around an explicit gateway and export sink.
    pub fn new(
        config: ServiceConfig,
        gateway: Arc<dyn PaymentGateway>,
        sink: Arc<dyn ExportSink>,
    ) -> Self {
        let ledger = Arc::new(LedgerStore::new());
        let inventory = Arc::new(InventoryStore::with_claim_timeout(
            Arc::new(PriceCatalog::new()),
            Duration::from_millis(config.checkout.claim_timeout_ms),
        ));
        Self {
            admin: AdminDesk::new(Arc::clone(&ledger)),
            reconciler: ReconciliationEngine::new(Arc::clone(&ledger)),
            checkout: CheckoutEngine::new(Arc::clone(&ledger), Arc::clone(&inventory), sink),
            settings: ConfigStore::with_defaults(),
            config,
            ledger,
            gateway,
            inventory,
        }
    }

    /// Wire the core with the NOWPayments client and a filesystem sink.
    pub fn from_config(config: ServiceConfig) -> Result<Self> {
        config.validate()?;
        let gateway = Arc::new(NowPaymentsClient::new(&config.gateway)?);
        let sink = Arc::new(FsExportSink::new(
            Path::new(&config.checkout.export_dir),
            EXPORT_PUBLIC_PREFIX,
        ));
        info!(provider = gateway.name(), "tallymart core assembled");
        Ok(Self::new(config, gateway, sink))
    }

    #[must_use]
    pub fn ledger(&self) -> &Arc<LedgerStore> {
        &self.ledger
    }

    #[must_use]
    pub fn inventory(&self) -> &Arc<InventoryStore> {
        &self.inventory
    }

    #[must_use]
    pub fn settings(&self) -> &ConfigStore {
        &self.settings
    }

    fn require_admin(&self, acting_admin: AccountId) -> Result<Account> {
        let admin = self.ledger.account(acting_admin)?;
        if admin.role == AccountRole::Admin && admin.is_active {
            Ok(admin)
        } else {
            Err(TallymartError::validation(format!(
                "account {acting_admin} is not an active admin"
            )))
        }
    }

    // =================================================================
    // Accounts
    // =================================================================

    pub fn register_account(&self, username: &str, role: AccountRole) -> ApiResponse<Account> {
        ApiResponse::from_result(
            self.ledger.register_account(username, role),
            "Account created successfully",
        )
    }

    pub fn set_account_active(&self, account_id: AccountId, active: bool) -> ApiResponse<Account> {
        ApiResponse::from_result(
            self.ledger.set_active(account_id, active),
            if active {
                "Account activated"
            } else {
                "Account deactivated"
            },
        )
    }

    // =================================================================
    // Payments
    // =================================================================

    /// Open a crypto deposit. The entry is recorded as `waiting` before the
    /// provider is called and stays `waiting` if the call fails.
    pub async fn create_payment(&self, input: CreatePayment) -> ApiResponse<PaymentCreated> {
        ApiResponse::from_result(
            self.try_create_payment(input).await,
            "Payment address generated successfully",
        )
    }

    async fn try_create_payment(&self, input: CreatePayment) -> Result<PaymentCreated> {
        let account = self
            .ledger
            .find_by_username(&input.username)
            .ok_or_else(|| TallymartError::BuyerNotFound(input.username.clone()))?;
        if !account.is_active {
            return Err(TallymartError::AccountInactive(account.id));
        }

        let description = input
            .description
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| format!("Balance deposit by {}", account.username));
        let mut request = PaymentRequest {
            transaction_id: TransactionId::new(),
            amount: input.amount,
            price_currency: self.config.gateway.price_currency.clone(),
            pay_currency: input.pay_currency.trim().to_lowercase(),
            callback_url: self.config.gateway.callback_url(),
            description: Some(description.clone()),
        };
        request.validate()?;

        let pending = self.ledger.record_transaction(NewTransaction {
            price_currency: request.price_currency.clone(),
            pay_currency: Some(request.pay_currency.clone()),
            ..NewTransaction::new(account.id, TransactionKind::CryptoPayment, request.amount)
                .with_status(PaymentStatus::Waiting)
                .with_description(description)
        })?;
        request.transaction_id = pending.id;

        let handle = match self.gateway.create_payment_request(&request).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!(
                    transaction = %pending.id,
                    provider = self.gateway.name(),
                    error = %e,
                    "payment request failed; entry left waiting"
                );
                return Err(e);
            }
        };
        let stored = self.ledger.attach_provider_handle(
            pending.id,
            &handle,
            Some(request.callback_url.clone()),
        )?;
        info!(
            transaction = %stored.id,
            account = %account.id,
            payment_id = %handle.payment_id,
            amount = %request.amount,
            "payment created"
        );
        Ok(PaymentCreated {
            transaction_id: stored.id,
            status: stored.status,
            payment: handle,
        })
    }

    pub async fn list_currencies(&self) -> ApiResponse<Vec<String>> {
        ApiResponse::from_result(
            self.gateway.list_currencies().await,
            "Currencies retrieved successfully",
        )
    }

    pub async fn minimum_amount(&self, pay_currency: &str) -> ApiResponse<MinimumAmount> {
        if pay_currency.trim().is_empty() {
            return TallymartError::validation("currency is required").into();
        }
        ApiResponse::from_result(
            self.gateway
                .minimum_amount(pay_currency.trim(), &self.config.gateway.price_currency)
                .await,
            "Minimum amount retrieved successfully",
        )
    }

    /// Provider callback. Succeeds for duplicates and unknown statuses so the
    /// provider stops retrying; fails for unparseable payloads, unknown
    /// transactions and retryable conditions.
    pub fn handle_webhook(&self, payload: &[u8]) -> ApiResponse<WebhookAck> {
        match self.reconciler.handle_webhook(payload) {
            Ok(outcome) => ApiResponse::ok_with_message(
                WebhookAck {
                    status: outcome.reported_status(),
                    outcome: Some(outcome),
                },
                "Webhook processed successfully",
            ),
            Err(e @ (TallymartError::MalformedEvent { .. } | TallymartError::TransactionNotFound(_))) => {
                e.into()
            }
            Err(e) if e.is_retryable() => e.into(),
            Err(e) => {
                error!(error = %e, "webhook could not be applied; acknowledged");
                ApiResponse::ok_with_message(
                    WebhookAck {
                        status: "error".to_string(),
                        outcome: None,
                    },
                    e.to_string(),
                )
            }
        }
    }

    // =================================================================
    // Ledger reads
    // =================================================================

    pub fn get_transactions(
        &self,
        username: &str,
        filter: TransactionFilter,
        page: usize,
        limit: usize,
    ) -> ApiResponse<AccountTransactions> {
        let result = self
            .ledger
            .find_by_username(username)
            .ok_or_else(|| TallymartError::BuyerNotFound(username.to_string()))
            .and_then(|account| {
                let filter = TransactionFilter {
                    account_id: Some(account.id),
                    ..filter
                };
                Ok(AccountTransactions {
                    balance: account.balance,
                    transactions: self.ledger.list_transactions(&filter, page, limit),
                    statistics: self.ledger.statistics(account.id)?,
                })
            });
        ApiResponse::from_result(result, "Transactions retrieved successfully")
    }

    /// By internal id or provider payment id, scoped to the owner.
    pub fn get_transaction(&self, account_id: AccountId, reference: &str) -> ApiResponse<Transaction> {
        let result = self
            .ledger
            .account(account_id)
            .and_then(|_| self.ledger.find_for_account(account_id, reference));
        ApiResponse::from_result(result, "Transaction retrieved successfully")
    }

    pub fn get_payment_status(&self, account_id: AccountId, reference: &str) -> ApiResponse<PaymentStatusView> {
        let result = self.ledger.account(account_id).and_then(|account| {
            let tx = self.ledger.find_for_account(account_id, reference)?;
            Ok(PaymentStatusView {
                status: tx.status,
                amount_received: tx.amount_received,
                remaining_amount: tx.remaining_amount,
                is_partial_payment: tx.is_partial_payment,
                price_amount: tx.price_amount,
                actually_paid: tx.actually_paid,
                pay_address: tx.pay_address,
                pay_currency: tx.pay_currency,
                created_at: tx.created_at,
                updated_at: tx.updated_at,
                finished_at: tx.finished_at,
                account_balance: account.balance,
            })
        });
        ApiResponse::from_result(result, "Payment status retrieved successfully")
    }

    /// Every account's entries; admin view.
    pub fn list_all_transactions(
        &self,
        filter: &TransactionFilter,
        page: usize,
        limit: usize,
    ) -> ApiResponse<Page<Transaction>> {
        ApiResponse::ok(self.ledger.list_transactions(filter, page, limit))
    }

    pub fn statistics(&self, account_id: AccountId) -> ApiResponse<AccountStatistics> {
        ApiResponse::from_result(
            self.ledger.statistics(account_id),
            "Statistics retrieved successfully",
        )
    }

    pub fn transaction_views(&self, account_id: AccountId) -> ApiResponse<TransactionViews> {
        let result = self.ledger.account(account_id).map(|_| TransactionViews {
            active: self.ledger.active_transactions(account_id),
            completed: self.ledger.completed_transactions(account_id),
            failed: self.ledger.failed_transactions(account_id),
        });
        ApiResponse::from_result(result, "Transactions retrieved successfully")
    }

    /// Compare the stored balance with the fold over applied entries.
    pub fn verify_balance(&self, account_id: AccountId) -> ApiResponse<BalanceCheck> {
        let result = self.ledger.account(account_id).map(|account| {
            let from_ledger = self.ledger.balance_from_ledger(account_id);
            BalanceCheck {
                balance: account.balance,
                from_ledger,
                consistent: account.balance == from_ledger,
            }
        });
        ApiResponse::from_result(result, "Balance verified")
    }

    // =================================================================
    // Admin balance operations
    // =================================================================

    pub fn admin_add_balance(
        &self,
        acting_admin: AccountId,
        account_id: AccountId,
        amount: Decimal,
        note: Option<String>,
    ) -> ApiResponse<Adjustment> {
        ApiResponse::from_result(
            self.admin
                .adjust(account_id, amount, AdjustDirection::Deposit, note, acting_admin),
            "Balance added successfully",
        )
    }

    pub fn admin_deduct_balance(
        &self,
        acting_admin: AccountId,
        account_id: AccountId,
        amount: Decimal,
        note: Option<String>,
    ) -> ApiResponse<Adjustment> {
        ApiResponse::from_result(
            self.admin
                .adjust(account_id, amount, AdjustDirection::Deduction, note, acting_admin),
            "Balance deducted successfully",
        )
    }

    pub fn system_charge(&self, account_id: AccountId, amount: Decimal, description: &str) -> ApiResponse<Adjustment> {
        ApiResponse::from_result(
            self.admin.system_charge(account_id, amount, description),
            "Charge applied",
        )
    }

    // =================================================================
    // Inventory and checkout
    // =================================================================

    pub fn checkout(&self, username: &str, quantity: usize, filter: &ListingFilter) -> ApiResponse<CheckoutReceipt> {
        ApiResponse::from_result(
            self.checkout.checkout(username, quantity, filter),
            "Purchase completed successfully",
        )
    }

    pub fn upsert_price(
        &self,
        acting_admin: AccountId,
        category: &str,
        unit_price: Decimal,
        show_description: bool,
    ) -> ApiResponse<PriceRef> {
        let result = self.require_admin(acting_admin).and_then(|_| {
            self.inventory
                .catalog()
                .upsert_price(category, unit_price, show_description)
        });
        ApiResponse::from_result(result, "Price saved")
    }

    pub fn list_prices(&self) -> ApiResponse<Vec<PriceRef>> {
        ApiResponse::ok(self.inventory.catalog().list_prices())
    }

    fn require_seller(&self, seller_id: AccountId) -> Result<Account> {
        let seller = self.ledger.account(seller_id)?;
        if !seller.is_active {
            return Err(TallymartError::AccountInactive(seller_id));
        }
        if seller.role != AccountRole::Seller {
            return Err(TallymartError::validation(format!(
                "account {seller_id} is not a seller"
            )));
        }
        Ok(seller)
    }

    pub fn create_listing(&self, seller_id: AccountId, listing: NewListing) -> ApiResponse<Listing> {
        let result = self
            .require_seller(seller_id)
            .and_then(|_| self.inventory.create_listing(seller_id, listing));
        ApiResponse::from_result(result, "Listing created successfully")
    }

    /// Bulk add. Batches over the `import_max_records` setting are refused
    /// whole; otherwise bad rows are reported and good rows kept.
    pub fn import_listings(&self, seller_id: AccountId, rows: Vec<NewListing>) -> ApiResponse<ImportReport> {
        let max_rows = usize::try_from(self.settings.get_u64(IMPORT_MAX_RECORDS, 1000)).unwrap_or(usize::MAX);
        let result = self.require_seller(seller_id).and_then(|_| {
            if rows.is_empty() {
                return Err(TallymartError::validation("no rows to import"));
            }
            if rows.len() > max_rows {
                return Err(TallymartError::validation(format!(
                    "import has {} rows, maximum is {max_rows}",
                    rows.len()
                )));
            }
            self.inventory.import_listings(seller_id, rows)
        });
        ApiResponse::from_result(result, "Import processed")
    }

    pub fn listings_by_seller(
        &self,
        seller_id: AccountId,
        status: Option<ListingStatus>,
        page: usize,
        limit: usize,
    ) -> ApiResponse<Page<Listing>> {
        let result = self
            .ledger
            .account(seller_id)
            .map(|_| self.inventory.listings_by_seller(seller_id, status, page, limit));
        ApiResponse::from_result(result, "Listings retrieved successfully")
    }

    pub fn search_listings(&self, filter: &ListingFilter, page: usize, limit: usize) -> ApiResponse<Page<Listing>> {
        ApiResponse::ok(self.inventory.search_available(filter, page, limit))
    }

    /// Count-only form of [`Tallymart::search_listings`].
    pub fn count_listings(&self, filter: &ListingFilter) -> ApiResponse<usize> {
        ApiResponse::ok(self.inventory.count_available(filter))
    }

    /// Suspend or re-activate every unsold listing of a seller.
    pub fn update_seller_status(&self, seller_id: AccountId, status: ListingStatus) -> ApiResponse<usize> {
        let result = self
            .ledger
            .account(seller_id)
            .and_then(|_| self.inventory.update_seller_status(seller_id, status));
        ApiResponse::from_result(result, "Seller listings updated")
    }

    pub fn dashboard(&self) -> ApiResponse<DashboardStats> {
        ApiResponse::ok(dashboard_stats(&self.ledger, &self.inventory))
    }

    // =================================================================
    // Settings
    // =================================================================

    pub fn list_settings(&self) -> ApiResponse<Vec<ConfigEntry>> {
        ApiResponse::ok(self.settings.list())
    }

    pub fn get_setting(&self, key: &str) -> ApiResponse<ConfigEntry> {
        ApiResponse::from_result(self.settings.get(key), "Configuration retrieved")
    }

    pub fn create_setting(
        &self,
        acting_admin: AccountId,
        key: &str,
        value: Value,
        value_type: ConfigValueType,
        description: Option<String>,
    ) -> ApiResponse<ConfigEntry> {
        let result = self.require_admin(acting_admin).and_then(|_| {
            self.settings
                .create(key, value, value_type, description, Some(acting_admin))
        });
        match result {
            Ok(entry) => ApiResponse {
                status_code: 201,
                ..ApiResponse::ok_with_message(entry, "Configuration created successfully")
            },
            Err(e) => e.into(),
        }
    }

    pub fn update_setting(
        &self,
        acting_admin: AccountId,
        key: &str,
        value: Value,
        description: Option<String>,
    ) -> ApiResponse<ConfigEntry> {
        let result = self
            .require_admin(acting_admin)
            .and_then(|_| self.settings.update(key, value, description, Some(acting_admin)));
        ApiResponse::from_result(result, "Configuration updated successfully")
    }

    pub fn reset_setting(&self, acting_admin: AccountId, key: &str) -> ApiResponse<ConfigEntry> {
        let result = self
            .require_admin(acting_admin)
            .and_then(|_| self.settings.reset(key, Some(acting_admin)));
        ApiResponse::from_result(result, "Configuration reset to default value")
    }

    pub fn delete_setting(&self, acting_admin: AccountId, key: &str) -> ApiResponse<ConfigEntry> {
        let result = self
            .require_admin(acting_admin)
            .and_then(|_| self.settings.delete(key));
        ApiResponse::from_result(result, "Configuration deleted successfully")
    }
}
