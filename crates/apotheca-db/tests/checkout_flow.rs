//! End-to-end checkout against a file-backed database.
//!
//! These go through the public repositories only, the way the HTTP layer
//! does, and use a real file so several pooled connections compete for the
//! SQLite write lock.

use std::collections::HashSet;
use std::time::Duration;

use apotheca_core::checkout::{
    CheckoutRequest, DiscountInput, HoldRequest, LineItemInput, PaymentInput, ReturnLineInput,
    ReturnRequest,
};
use apotheca_core::{HeldStatus, Money, PaymentMethod, Points, SaleStatus};
use apotheca_db::repository::branch::NewBranch;
use apotheca_db::repository::customer::NewCustomer;
use apotheca_db::repository::product::{ImportRow, NewProduct};
use apotheca_db::repository::staff::NewPharmacist;
use apotheca_db::{CheckoutPolicy, Database, DbConfig, DbError};
use tempfile::TempDir;

struct Shop {
    db: Database,
    branch_id: String,
    session_id: String,
    pharmacist_session_id: String,
    product_id: String,
    _dir: TempDir,
}

const BARCODE: &str = "4800000000017";

async fn open_shop(stock: i64) -> Shop {
    let dir = TempDir::new().unwrap();
    let db = Database::new(DbConfig::new(dir.path().join("apotheca.db")))
        .await
        .unwrap();

    let branch = db
        .branches()
        .create(&NewBranch {
            branch_code: "B07".to_string(),
            branch_name: "Harbor Branch".to_string(),
            address: None,
        })
        .await
        .unwrap();

    let pharmacist = db
        .staff()
        .create_pharmacist(&NewPharmacist {
            name: "Ana Reyes".to_string(),
            branch_id: branch.id.clone(),
            pin: "4321".to_string(),
        })
        .await
        .unwrap();

    let product = db
        .products()
        .create(&NewProduct {
            name: "Cetirizine 10mg".to_string(),
            barcode: Some(BARCODE.to_string()),
            price_cents: Money::from_cents(2_000),
            critical_level: 5,
            ..Default::default()
        })
        .await
        .unwrap();

    let summary = db
        .products()
        .bulk_import(
            &branch.id,
            &[ImportRow {
                barcode: BARCODE.to_string(),
                name: None,
                brand_name: None,
                price_cents: None,
                quantity: stock,
                expiry_date: None,
            }],
        )
        .await
        .unwrap();
    assert_eq!(summary.stocked, 1);

    let opened = db
        .sessions()
        .open_session(&branch.id, &pharmacist.id)
        .await
        .unwrap();

    Shop {
        db,
        branch_id: branch.id,
        session_id: opened.session.id,
        pharmacist_session_id: opened.pharmacist_session.id,
        product_id: product.id,
        _dir: dir,
    }
}

impl Shop {
    fn sale(&self, quantity: i64, tendered: i64) -> CheckoutRequest {
        CheckoutRequest {
            branch_id: self.branch_id.clone(),
            session_id: self.session_id.clone(),
            pharmacist_session_id: self.pharmacist_session_id.clone(),
            customer_id: None,
            held_transaction_id: None,
            items: vec![LineItemInput {
                product_id: self.product_id.clone(),
                quantity,
                unit_price_cents: Money::from_cents(2_000),
            }],
            discount: DiscountInput::default(),
            points_to_redeem: Points::zero(),
            payment: PaymentInput {
                payment_method: PaymentMethod::Cash,
                amount_tendered_cents: Money::from_cents(tendered),
                reference_number: None,
            },
        }
    }

    async fn stock(&self) -> i64 {
        self.db
            .inventory()
            .get_active(&self.branch_id, &self.product_id)
            .await
            .unwrap()
            .unwrap()
            .stock
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_checkouts_get_distinct_sequences() {
    let shop = open_shop(50).await;
    let checkout = shop.db.checkout(CheckoutPolicy::default());

    let mut handles = Vec::new();
    for _ in 0..10 {
        let checkout = checkout.clone();
        let request = shop.sale(1, 2_000);
        handles.push(tokio::spawn(async move {
            checkout.complete_sale(&request).await
        }));
    }

    let mut sequences = HashSet::new();
    let mut invoices = HashSet::new();
    for handle in handles {
        let sale = handle.await.unwrap().unwrap();
        sequences.insert(sale.daily_sequence);
        invoices.insert(sale.invoice_number);
    }

    assert_eq!(sequences, (1..=10).collect::<HashSet<i64>>());
    assert_eq!(invoices.len(), 10);
    assert_eq!(shop.stock().await, 40);

    let session = shop.db.sessions().get(&shop.session_id).await.unwrap().unwrap();
    assert_eq!(session.total_sales_cents, Money::from_cents(20_000));
}

#[tokio::test]
async fn test_concurrent_checkouts_never_oversell() {
    let shop = open_shop(3).await;
    let checkout = shop.db.checkout(CheckoutPolicy::default());

    let mut handles = Vec::new();
    for _ in 0..5 {
        let checkout = checkout.clone();
        let request = shop.sale(1, 2_000);
        handles.push(tokio::spawn(async move {
            checkout.complete_sale(&request).await
        }));
    }

    let mut completed = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            completed += 1;
        }
    }

    assert_eq!(completed, 3);
    assert_eq!(shop.stock().await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_checkout_timeout_rolls_back() {
    let shop = open_shop(10).await;
    let impatient = shop.db.checkout(CheckoutPolicy {
        transaction_timeout: Duration::from_millis(200),
        ..CheckoutPolicy::default()
    });

    // another writer sits on the write lock
    let mut blocker = shop.db.pool().begin().await.unwrap();
    sqlx::query("UPDATE branch_inventory SET updated_at = updated_at WHERE product_id = ?1")
        .bind(&shop.product_id)
        .execute(&mut *blocker)
        .await
        .unwrap();

    let err = impatient
        .complete_sale(&shop.sale(2, 4_000))
        .await
        .unwrap_err();
    assert!(matches!(err, DbError::Timeout(200)));

    blocker.rollback().await.unwrap();

    // nothing from the timed-out attempt survived: the sequence is still free
    let sale = shop
        .db
        .checkout(CheckoutPolicy::default())
        .complete_sale(&shop.sale(1, 2_000))
        .await
        .unwrap();
    assert_eq!(sale.daily_sequence, 1);
    assert_eq!(shop.stock().await, 9);
    assert_eq!(
        shop.db.sales().list_for_session(&shop.session_id).await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn test_hold_recall_complete() {
    let shop = open_shop(10).await;

    let held = shop
        .db
        .held()
        .hold(&HoldRequest {
            session_id: shop.session_id.clone(),
            branch_id: shop.branch_id.clone(),
            customer_id: None,
            items: shop.sale(2, 0).items,
            note: Some("customer went to the ATM".to_string()),
        })
        .await
        .unwrap();
    assert_eq!(held.hold_number, 1);

    // Holding does not reserve stock
    assert_eq!(shop.stock().await, 10);

    let recalled = shop.db.held().items(&held.id).await.unwrap();
    assert_eq!(recalled.len(), 1);
    assert_eq!(recalled[0].quantity, 2);

    let mut request = shop.sale(recalled[0].quantity, 5_000);
    request.held_transaction_id = Some(held.id.clone());

    let sale = shop
        .db
        .checkout(CheckoutPolicy::default())
        .complete_sale(&request)
        .await
        .unwrap();
    assert_eq!(sale.total_cents, Money::from_cents(4_000));
    assert_eq!(sale.change_cents, Money::from_cents(1_000));

    let held = shop.db.held().get(&held.id).await.unwrap().unwrap();
    assert_eq!(held.status, HeldStatus::Completed);
    assert_eq!(shop.stock().await, 8);
}

#[tokio::test]
async fn test_loyalty_and_return_roundtrip() {
    let shop = open_shop(20).await;

    let customer = shop
        .db
        .customers()
        .create_with_card(&NewCustomer {
            name: "Lito Garcia".to_string(),
            phone: None,
            address: None,
            card_id: "CARD-7777".to_string(),
        })
        .await
        .unwrap();
    assert!(customer.account.points_balance.is_zero());

    // 10 × 20.00 = 200.00 earns one point
    let mut request = shop.sale(10, 20_000);
    request.customer_id = Some(customer.customer.id.clone());
    let sale = shop
        .db
        .checkout(CheckoutPolicy::default())
        .complete_sale(&request)
        .await
        .unwrap();
    assert_eq!(sale.points_earned, Points::from_whole(1));

    let account = shop
        .db
        .loyalty()
        .get_account(&customer.customer.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(account.points_balance, Points::from_whole(1));
    assert_eq!(
        account.points_balance,
        account.lifetime_earned - account.lifetime_redeemed
    );

    let receipt = shop
        .db
        .returns()
        .process_return(&ReturnRequest {
            sale_id: sale.sale_id.clone(),
            items: vec![ReturnLineInput {
                product_id: shop.product_id.clone(),
                quantity: 4,
            }],
            reason: "wrong strength".to_string(),
            pharmacist_session_id: None,
        })
        .await
        .unwrap();

    assert_eq!(receipt.sale_status, SaleStatus::PartiallyReturned);
    assert_eq!(receipt.sales_return.refund_cents, Money::from_cents(8_000));
    assert_eq!(shop.stock().await, 14);

    // Returning more than what is left is refused
    let err = shop
        .db
        .returns()
        .process_return(&ReturnRequest {
            sale_id: sale.sale_id,
            items: vec![ReturnLineInput {
                product_id: shop.product_id.clone(),
                quantity: 7,
            }],
            reason: "changed mind".to_string(),
            pharmacist_session_id: None,
        })
        .await
        .unwrap_err();
    assert!(err.as_rule().is_some());
    assert_eq!(shop.stock().await, 14);
}
