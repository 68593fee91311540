//! # Checkout Orchestrator
//!
//! Completes a sale as one database transaction.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        complete_sale(request)                           │
//! │                                                                         │
//! │  validate_checkout (no transaction yet)                                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  STARTED ─────────── BEGIN                                             │
//! │       │   next_sequence (first statement: takes the write lock)         │
//! │       ▼                                                                 │
//! │  SEQUENCED ───────── branch, session, customer, loyalty quote, totals  │
//! │       │   record_sale (+ held transaction → COMPLETED)                  │
//! │       ▼                                                                 │
//! │  RECORDED                                                              │
//! │       │   adjust(-qty) per line                                         │
//! │       ▼                                                                 │
//! │  INVENTORY_ADJUSTED                                                    │
//! │       │   apply_redeem, apply_earn                                      │
//! │       ▼                                                                 │
//! │  LOYALTY_APPLIED                                                       │
//! │       │   add_to_session_total(+total)                                  │
//! │       ▼                                                                 │
//! │  SESSION_UPDATED                                                       │
//! │       │   COMMIT                                                        │
//! │       ▼                                                                 │
//! │  COMMITTED                                                             │
//! │                                                                         │
//! │  Any error, or the timeout firing ──► FAILED                           │
//! │  (the transaction is dropped, which rolls it back)                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing partial is ever visible: either every row above is written, or
//! none are and the daily sequence is not consumed.

use std::fmt;
use std::time::Duration;

use apotheca_core::checkout::{
    cart_subtotal, compute_totals, settle_payment, validate_checkout, CheckoutRequest,
};
use apotheca_core::invoice::{format_invoice_number, BusinessClock};
use apotheca_core::{
    CoreError, LoyaltyPolicy, Money, MovementReason, Points, TaxRate, ValidationError,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, error, info, warn};

use crate::error::{DbError, DbResult};
use crate::repository::branch::BranchRepository;
use crate::repository::customer::CustomerRepository;
use crate::repository::held::HeldTransactionRepository;
use crate::repository::inventory::{InventoryAdjuster, StockAdjustment};
use crate::repository::loyalty::LoyaltyLedger;
use crate::repository::sale::{NewPayment, NewSale, SaleRecorder};
use crate::repository::sequence::SequenceGenerator;
use crate::repository::session::SessionAggregator;

/// Default upper bound for one checkout transaction.
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(30);

// =============================================================================
// State
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutState {
    Started,
    Sequenced,
    Recorded,
    InventoryAdjusted,
    LoyaltyApplied,
    SessionUpdated,
    Committed,
    Failed,
}

impl CheckoutState {
    /// The only state this one may advance to.
    pub const fn successor(self) -> Option<CheckoutState> {
        match self {
            CheckoutState::Started => Some(CheckoutState::Sequenced),
            CheckoutState::Sequenced => Some(CheckoutState::Recorded),
            CheckoutState::Recorded => Some(CheckoutState::InventoryAdjusted),
            CheckoutState::InventoryAdjusted => Some(CheckoutState::LoyaltyApplied),
            CheckoutState::LoyaltyApplied => Some(CheckoutState::SessionUpdated),
            CheckoutState::SessionUpdated => Some(CheckoutState::Committed),
            CheckoutState::Committed | CheckoutState::Failed => None,
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, CheckoutState::Committed | CheckoutState::Failed)
    }
}

impl fmt::Display for CheckoutState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CheckoutState::Started => "STARTED",
            CheckoutState::Sequenced => "SEQUENCED",
            CheckoutState::Recorded => "RECORDED",
            CheckoutState::InventoryAdjusted => "INVENTORY_ADJUSTED",
            CheckoutState::LoyaltyApplied => "LOYALTY_APPLIED",
            CheckoutState::SessionUpdated => "SESSION_UPDATED",
            CheckoutState::Committed => "COMMITTED",
            CheckoutState::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// Progress of one checkout, kept for error reporting.
#[derive(Debug)]
struct CheckoutRun {
    state: CheckoutState,
    invoice_number: Option<String>,
}

impl CheckoutRun {
    fn new() -> Self {
        CheckoutRun {
            state: CheckoutState::Started,
            invoice_number: None,
        }
    }

    fn advance(&mut self, to: CheckoutState) -> DbResult<()> {
        if self.state.successor() != Some(to) {
            return Err(DbError::Internal(format!(
                "checkout cannot move from {} to {}",
                self.state, to
            )));
        }
        debug!(from = %self.state, to = %to, "Checkout advanced");
        self.state = to;
        Ok(())
    }

    fn fail(&mut self) {
        if !self.state.is_terminal() {
            self.state = CheckoutState::Failed;
        }
    }
}

// =============================================================================
// Policy & Result
// =============================================================================

/// Business settings a checkout runs under.
#[derive(Debug, Clone, Copy)]
pub struct CheckoutPolicy {
    pub loyalty: LoyaltyPolicy,
    pub vat_rate: TaxRate,
    /// Local time for business dates and invoice numbers.
    pub clock: BusinessClock,
    pub transaction_timeout: Duration,
}

impl Default for CheckoutPolicy {
    fn default() -> Self {
        CheckoutPolicy {
            loyalty: LoyaltyPolicy::default(),
            vat_rate: TaxRate::zero(),
            clock: BusinessClock::utc(),
            transaction_timeout: DEFAULT_TRANSACTION_TIMEOUT,
        }
    }
}

/// What the counter prints after a successful checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedSale {
    pub sale_id: String,
    pub invoice_number: String,
    pub daily_sequence: i64,
    pub points_earned: Points,
    pub points_redeemed: Points,
    pub subtotal_cents: Money,
    pub discount_cents: Money,
    pub tax_cents: Money,
    pub total_cents: Money,
    pub change_cents: Money,
}

// =============================================================================
// Orchestrator
// =============================================================================

#[derive(Debug, Clone)]
pub struct CheckoutOrchestrator {
    pool: SqlitePool,
    policy: CheckoutPolicy,
}

impl CheckoutOrchestrator {
    pub fn new(pool: SqlitePool, policy: CheckoutPolicy) -> Self {
        CheckoutOrchestrator { pool, policy }
    }

    pub fn policy(&self) -> &CheckoutPolicy {
        &self.policy
    }

    /// Completes a sale or changes nothing.
    pub async fn complete_sale(&self, request: &CheckoutRequest) -> DbResult<CompletedSale> {
        validate_checkout(request)?;

        let limit = self.policy.transaction_timeout;
        let mut run = CheckoutRun::new();

        let result = match tokio::time::timeout(limit, self.execute(request, &mut run)).await {
            Ok(result) => result,
            Err(_) => Err(DbError::Timeout(limit.as_millis() as u64)),
        };

        match result {
            Ok(sale) => {
                info!(
                    sale_id = %sale.sale_id,
                    invoice_number = %sale.invoice_number,
                    session_id = %request.session_id,
                    total = %sale.total_cents,
                    "Sale completed"
                );
                Ok(sale)
            }
            Err(e) => {
                let at = run.state;
                run.fail();
                let invoice_number = run.invoice_number.as_deref().unwrap_or("-");
                if e.as_rule().is_some() {
                    warn!(
                        invoice_number = %invoice_number,
                        session_id = %request.session_id,
                        state = %at,
                        error = %e,
                        "Checkout rejected"
                    );
                } else {
                    error!(
                        invoice_number = %invoice_number,
                        session_id = %request.session_id,
                        state = %at,
                        error = %e,
                        "Checkout failed"
                    );
                }
                Err(e)
            }
        }
    }

    async fn execute(&self, request: &CheckoutRequest, run: &mut CheckoutRun) -> DbResult<CompletedSale> {
        let now = Utc::now();
        let business_date = self.policy.clock.business_date(now);

        let mut tx = self.pool.begin().await?;

        let daily_sequence =
            SequenceGenerator::next_sequence(&mut tx, &request.branch_id, business_date).await?;
        run.advance(CheckoutState::Sequenced)?;

        let branch_code = BranchRepository::code_in(&mut tx, &request.branch_id)
            .await?
            .ok_or_else(|| CoreError::BranchNotFound(request.branch_id.clone()))?;
        Self::check_session(&mut tx, request).await?;

        let balance = match &request.customer_id {
            Some(customer_id) => {
                CustomerRepository::find_in(&mut tx, customer_id)
                    .await?
                    .ok_or_else(|| CoreError::CustomerNotFound(customer_id.clone()))?;
                LoyaltyLedger::find_account(&mut tx, customer_id)
                    .await?
                    .map(|account| account.points_balance)
            }
            None => None,
        };

        let subtotal = cart_subtotal(&request.items);
        let quote = self
            .policy
            .loyalty
            .quote(balance, subtotal, request.points_to_redeem)?;
        let totals = compute_totals(
            &request.items,
            &request.discount,
            quote.redemption_value,
            self.policy.vat_rate,
        )?;
        let change = settle_payment(&totals, &request.payment)?;

        let invoice_number =
            format_invoice_number(&branch_code, &self.policy.clock.local(now), daily_sequence);
        run.invoice_number = Some(invoice_number.clone());

        let header = NewSale {
            invoice_number: invoice_number.clone(),
            branch_id: request.branch_id.clone(),
            session_id: request.session_id.clone(),
            pharmacist_session_id: request.pharmacist_session_id.clone(),
            customer_id: request.customer_id.clone(),
            discount_type: request.discount.discount_type,
            discount_id_number: request.discount.discount_id_number.clone(),
            totals,
            points_earned: quote.earned,
            points_redeemed: quote.redeemed,
            daily_sequence,
            business_date,
            created_at: now,
        };
        let payment = NewPayment {
            payment_method: request.payment.payment_method,
            amount_tendered_cents: request.payment.amount_tendered_cents,
            change_cents: change,
            reference_number: request.payment.reference_number.clone(),
        };

        let sale_id = SaleRecorder::record_sale(&mut tx, &header, &request.items, &payment).await?;
        if let Some(held_id) = &request.held_transaction_id {
            HeldTransactionRepository::mark_completed(&mut tx, held_id, request).await?;
        }
        run.advance(CheckoutState::Recorded)?;

        for item in &request.items {
            InventoryAdjuster::adjust(
                &mut tx,
                &StockAdjustment {
                    branch_id: request.branch_id.clone(),
                    product_id: item.product_id.clone(),
                    delta: -item.quantity,
                    reason: MovementReason::Sale,
                    reference_id: Some(sale_id.clone()),
                },
            )
            .await?;
        }
        run.advance(CheckoutState::InventoryAdjusted)?;

        if let Some(customer_id) = &request.customer_id {
            LoyaltyLedger::apply_redeem(&mut tx, customer_id, quote.redeemed, Some(&sale_id)).await?;
            LoyaltyLedger::apply_earn(&mut tx, customer_id, quote.earned, Some(&sale_id)).await?;
        }
        run.advance(CheckoutState::LoyaltyApplied)?;

        SessionAggregator::add_to_session_total(&mut tx, &request.session_id, totals.total_cents).await?;
        run.advance(CheckoutState::SessionUpdated)?;

        tx.commit().await?;
        run.advance(CheckoutState::Committed)?;

        Ok(CompletedSale {
            sale_id,
            invoice_number,
            daily_sequence,
            points_earned: quote.earned,
            points_redeemed: quote.redeemed,
            subtotal_cents: totals.subtotal_cents,
            discount_cents: totals.discount_cents,
            tax_cents: totals.tax_cents,
            total_cents: totals.total_cents,
            change_cents: change,
        })
    }

    /// The session must be open at the request's branch, and the pharmacist
    /// session must be a live part of it.
    async fn check_session(conn: &mut SqliteConnection, request: &CheckoutRequest) -> DbResult<()> {
        let session = SessionAggregator::find_in(conn, &request.session_id)
            .await?
            .ok_or_else(|| CoreError::SessionNotFound(request.session_id.clone()))?;

        if !session.is_open() {
            return Err(CoreError::SessionNotOpen(session.id).into());
        }
        if session.branch_id != request.branch_id {
            return Err(ValidationError::Mismatch {
                field: "branchId".to_string(),
                reason: "session belongs to another branch".to_string(),
            }
            .into());
        }

        let pharmacist_session =
            SessionAggregator::find_pharmacist_session_in(conn, &request.pharmacist_session_id)
                .await?
                .ok_or_else(|| {
                    DbError::not_found("PharmacistSession", &request.pharmacist_session_id)
                })?;

        if pharmacist_session.session_id != session.id || pharmacist_session.end_time.is_some() {
            return Err(ValidationError::Mismatch {
                field: "pharmacistSessionId".to_string(),
                reason: "not an active part of this sales session".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::Database;
    use crate::repository::fixture::{
        self, AMOXICILLIN, BRANCH, CUSTOMER, PARACETAMOL, PHARMACIST_SESSION, SESSION, VITAMIN_C,
    };
    use apotheca_core::checkout::{DiscountInput, HoldRequest, LineItemInput, PaymentInput};
    use apotheca_core::{DiscountType, HeldStatus, PaymentMethod};

    fn line(product: &str, quantity: i64, cents: i64) -> LineItemInput {
        LineItemInput {
            product_id: product.to_string(),
            quantity,
            unit_price_cents: Money::from_cents(cents),
        }
    }

    fn request(items: Vec<LineItemInput>, tendered: i64) -> CheckoutRequest {
        CheckoutRequest {
            branch_id: BRANCH.to_string(),
            session_id: SESSION.to_string(),
            pharmacist_session_id: PHARMACIST_SESSION.to_string(),
            customer_id: None,
            held_transaction_id: None,
            items,
            discount: DiscountInput::default(),
            points_to_redeem: Points::zero(),
            payment: PaymentInput {
                payment_method: PaymentMethod::Cash,
                amount_tendered_cents: Money::from_cents(tendered),
                reference_number: None,
            },
        }
    }

    fn orchestrator(db: &Database) -> CheckoutOrchestrator {
        db.checkout(CheckoutPolicy::default())
    }

    #[test]
    fn test_state_order() {
        let mut run = CheckoutRun::new();
        for to in [
            CheckoutState::Sequenced,
            CheckoutState::Recorded,
            CheckoutState::InventoryAdjusted,
            CheckoutState::LoyaltyApplied,
            CheckoutState::SessionUpdated,
            CheckoutState::Committed,
        ] {
            run.advance(to).unwrap();
        }
        assert!(run.state.is_terminal());

        // committed runs never become failed
        run.fail();
        assert_eq!(run.state, CheckoutState::Committed);
    }

    #[test]
    fn test_out_of_order_transition_is_internal_error() {
        let mut run = CheckoutRun::new();
        let err = run.advance(CheckoutState::Recorded).unwrap_err();
        assert!(matches!(err, DbError::Internal(_)));
        assert_eq!(run.state, CheckoutState::Started);

        run.fail();
        assert_eq!(run.state, CheckoutState::Failed);
        assert!(run.advance(CheckoutState::Sequenced).is_err());
    }

    #[tokio::test]
    async fn test_fourth_sale_of_the_day() {
        let db = fixture::database().await;
        let checkout = orchestrator(&db);

        for _ in 0..3 {
            checkout
                .complete_sale(&request(vec![line(VITAMIN_C, 1, 1_500)], 2_000))
                .await
                .unwrap();
        }

        let mut req = request(vec![line(AMOXICILLIN, 1, 12_000), line(PARACETAMOL, 2, 5_000)], 25_000);
        req.customer_id = Some(CUSTOMER.to_string());
        let sale = checkout.complete_sale(&req).await.unwrap();

        let today = Utc::now().format("%m%d%y").to_string();
        assert!(sale.invoice_number.starts_with(&format!("B01-{}-", today)));
        assert!(sale.invoice_number.ends_with("-0004"));
        assert_eq!(sale.daily_sequence, 4);
        assert_eq!(sale.subtotal_cents.cents(), 22_000);
        assert_eq!(sale.total_cents.cents(), 22_000);
        assert_eq!(sale.change_cents.cents(), 3_000);
        assert_eq!(sale.points_earned, Points::from_hundredths(110));

        assert_eq!(fixture::stock_of(db.pool(), AMOXICILLIN).await, 19);
        assert_eq!(fixture::stock_of(db.pool(), PARACETAMOL).await, 3);
        assert_eq!(fixture::stock_of(db.pool(), VITAMIN_C).await, 97);

        let account = db.loyalty().get_account(CUSTOMER).await.unwrap().unwrap();
        assert_eq!(account.points_balance, Points::from_hundredths(8_110));

        let session = db.sessions().get(SESSION).await.unwrap().unwrap();
        assert_eq!(session.total_sales_cents.cents(), 3 * 1_500 + 22_000);

        let detail = db.sales().get_detail(&sale.sale_id).await.unwrap().unwrap();
        assert_eq!(detail.items.len(), 2);
        assert_eq!(detail.items[0].product_id, AMOXICILLIN);
        assert_eq!(detail.payment.unwrap().change_cents.cents(), 3_000);
    }

    #[tokio::test]
    async fn test_insufficient_stock_changes_nothing() {
        let db = fixture::database().await;
        let err = orchestrator(&db)
            .complete_sale(&request(vec![line(VITAMIN_C, 1, 1_500), line(PARACETAMOL, 7, 5_000)], 40_000))
            .await
            .unwrap_err();

        match err {
            DbError::Rule(CoreError::InsufficientStock { available, requested, .. }) => {
                assert_eq!(available, 5);
                assert_eq!(requested, 7);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        assert_eq!(fixture::stock_of(db.pool(), PARACETAMOL).await, 5);
        assert_eq!(fixture::stock_of(db.pool(), VITAMIN_C).await, 100);
        assert!(db.sales().list_for_session(SESSION).await.unwrap().is_empty());

        let today = CheckoutPolicy::default().clock.business_date(Utc::now());
        assert_eq!(db.sequences().peek_next_sequence(BRANCH, today).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_redemption_over_cap_is_rejected() {
        let db = fixture::database().await;
        let mut req = request(vec![line(VITAMIN_C, 10, 1_500)], 15_000);
        req.customer_id = Some(CUSTOMER.to_string());
        req.discount.discount_type = DiscountType::Points;
        req.points_to_redeem = Points::from_whole(100);

        let err = orchestrator(&db).complete_sale(&req).await.unwrap_err();
        match err {
            DbError::Rule(CoreError::InvalidRedemption { max, .. }) => {
                assert_eq!(max, Points::from_whole(1));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let account = db.loyalty().get_account(CUSTOMER).await.unwrap().unwrap();
        assert_eq!(account.points_balance, Points::from_whole(80));
        assert_eq!(fixture::stock_of(db.pool(), VITAMIN_C).await, 100);
    }

    #[tokio::test]
    async fn test_redemption_within_cap() {
        let db = fixture::database().await;
        let mut req = request(vec![line(VITAMIN_C, 10, 1_500)], 15_000);
        req.customer_id = Some(CUSTOMER.to_string());
        req.discount.discount_type = DiscountType::Points;
        req.points_to_redeem = Points::from_whole(1);

        let sale = orchestrator(&db).complete_sale(&req).await.unwrap();
        assert_eq!(sale.discount_cents.cents(), 100);
        assert_eq!(sale.total_cents.cents(), 14_900);
        assert_eq!(sale.change_cents.cents(), 100);
        assert_eq!(sale.points_earned, Points::from_hundredths(75));

        let account = db.loyalty().get_account(CUSTOMER).await.unwrap().unwrap();
        assert_eq!(account.points_balance, Points::from_hundredths(7_975));
        assert_eq!(
            account.points_balance.hundredths(),
            account.lifetime_earned.hundredths() - account.lifetime_redeemed.hundredths()
        );

        let history = db.loyalty().history(CUSTOMER, 10).await.unwrap();
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn test_closed_session_rejects_sale() {
        let db = fixture::database().await;
        db.sessions().close_session(SESSION).await.unwrap();

        let err = orchestrator(&db)
            .complete_sale(&request(vec![line(VITAMIN_C, 1, 1_500)], 1_500))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Rule(CoreError::SessionNotOpen(_))));
        assert_eq!(fixture::stock_of(db.pool(), VITAMIN_C).await, 100);
    }

    #[tokio::test]
    async fn test_unknown_customer() {
        let db = fixture::database().await;
        let mut req = request(vec![line(VITAMIN_C, 1, 1_500)], 1_500);
        req.customer_id = Some("ghost".to_string());

        let err = orchestrator(&db).complete_sale(&req).await.unwrap_err();
        assert!(matches!(err, DbError::Rule(CoreError::CustomerNotFound(_))));
    }

    #[tokio::test]
    async fn test_underpayment_rolls_back() {
        let db = fixture::database().await;
        let err = orchestrator(&db)
            .complete_sale(&request(vec![line(AMOXICILLIN, 1, 12_000)], 10_000))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Rule(CoreError::InvalidPaymentAmount { .. })));
        assert_eq!(fixture::stock_of(db.pool(), AMOXICILLIN).await, 20);
    }

    #[tokio::test]
    async fn test_held_cart_completes_once() {
        let db = fixture::database().await;
        let items = vec![line(AMOXICILLIN, 2, 12_000)];
        let held = db
            .held()
            .hold(&HoldRequest {
                session_id: SESSION.to_string(),
                branch_id: BRANCH.to_string(),
                customer_id: None,
                items: items.clone(),
                note: None,
            })
            .await
            .unwrap();

        let mut req = request(items, 24_000);
        req.held_transaction_id = Some(held.id.clone());
        orchestrator(&db).complete_sale(&req).await.unwrap();

        let held = db.held().get(&held.id).await.unwrap().unwrap();
        assert_eq!(held.status, HeldStatus::Completed);

        let err = orchestrator(&db).complete_sale(&req).await.unwrap_err();
        assert!(matches!(err, DbError::Rule(CoreError::HeldTransactionNotActive { .. })));
        assert_eq!(fixture::stock_of(db.pool(), AMOXICILLIN).await, 18);
    }

    #[tokio::test]
    async fn test_held_cart_must_match_the_sale() {
        let db = fixture::database().await;
        let held = db
            .held()
            .hold(&HoldRequest {
                session_id: SESSION.to_string(),
                branch_id: BRANCH.to_string(),
                customer_id: None,
                items: vec![line(AMOXICILLIN, 2, 12_000)],
                note: None,
            })
            .await
            .unwrap();

        let mut other_cart = request(vec![line(VITAMIN_C, 1, 1_500)], 1_500);
        other_cart.held_transaction_id = Some(held.id.clone());
        let err = orchestrator(&db).complete_sale(&other_cart).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Rule(CoreError::Validation(ValidationError::Mismatch { .. }))
        ));

        let held = db.held().get(&held.id).await.unwrap().unwrap();
        assert_eq!(held.status, HeldStatus::Held);
        assert_eq!(fixture::stock_of(db.pool(), VITAMIN_C).await, 100);
        assert!(db.sales().list_for_session(SESSION).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_overflowing_price_is_a_validation_error() {
        let db = fixture::database().await;
        let err = orchestrator(&db)
            .complete_sale(&request(vec![line(VITAMIN_C, 3, 3_074_457_345_618_258_603)], 1_500))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Rule(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));
        assert_eq!(fixture::stock_of(db.pool(), VITAMIN_C).await, 100);
    }

    #[tokio::test]
    async fn test_vat_exempt_senior_discount() {
        let db = fixture::database().await;
        let policy = CheckoutPolicy {
            vat_rate: TaxRate::from_bps(1_200),
            ..CheckoutPolicy::default()
        };
        let checkout = db.checkout(policy);

        let taxed = checkout
            .complete_sale(&request(vec![line(AMOXICILLIN, 1, 12_000)], 20_000))
            .await
            .unwrap();
        assert_eq!(taxed.tax_cents.cents(), 1_440);
        assert_eq!(taxed.total_cents.cents(), 13_440);

        let mut req = request(vec![line(AMOXICILLIN, 1, 12_000)], 20_000);
        req.discount = DiscountInput {
            discount_type: DiscountType::Senior,
            discount_cents: Money::from_cents(2_400),
            discount_id_number: Some("SC-12345".to_string()),
        };
        let senior = checkout.complete_sale(&req).await.unwrap();
        assert_eq!(senior.tax_cents.cents(), 0);
        assert_eq!(senior.total_cents.cents(), 9_600);
        assert_eq!(senior.daily_sequence, 2);
    }
}
