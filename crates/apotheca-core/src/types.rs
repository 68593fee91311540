//! # Domain Types
//!
//! Persisted entities and their lifecycle enums.
//!
//! ## Type Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  Branch ──┬── InventoryRecord ──── InventoryMovement (audit)           │
//! │           │                                                             │
//! │           └── SalesSession ──┬── PharmacistSession                     │
//! │                              ├── HeldTransaction ── HeldTransactionItem│
//! │                              └── Sale ──┬── SaleItem                   │
//! │                                         ├── Payment                    │
//! │                                         └── SalesReturn ── ReturnItem  │
//! │                                                                         │
//! │  Customer ── LoyaltyAccount ── LoyaltyLedgerEntry (append-only)        │
//! │                                                                         │
//! │  Supplier ── ProductSupplier ── PriceHistoryEntry                      │
//! │                                                                         │
//! │  Prescription ── PrescriptionItem                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Soft deletion is always a `status` column, never a boolean flag.
//! Every id is a UUID v4 string; business ids (branch code, invoice number,
//! employee id, card id) sit beside it.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::loyalty::Points;
use crate::money::Money;

// =============================================================================
// Lifecycle Enums
// =============================================================================

/// Lifecycle of master data rows (branches, staff, products, suppliers,
/// inventory).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordStatus {
    #[default]
    Active,
    Inactive,
    Archived,
}

/// Lifecycle of a parked cart.
///
/// ```text
/// HELD ──recall + complete──► COMPLETED
///   │
///   └────── discard ────────► DISCARDED
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HeldStatus {
    #[default]
    Held,
    Completed,
    Discarded,
}

impl fmt::Display for HeldStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HeldStatus::Held => "HELD",
            HeldStatus::Completed => "COMPLETED",
            HeldStatus::Discarded => "DISCARDED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SaleStatus {
    #[default]
    Completed,
    PartiallyReturned,
    Returned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Cash,
    Card,
    Gcash,
    Maya,
}

impl PaymentMethod {
    /// Non-cash tenders must carry the terminal/e-wallet reference.
    pub const fn requires_reference(&self) -> bool {
        !matches!(self, PaymentMethod::Cash)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountType {
    #[default]
    None,
    /// Senior citizen discount.
    Senior,
    /// Person with disability discount.
    Pwd,
    /// Discount funded by redeemed loyalty points.
    Points,
    Promo,
}

impl DiscountType {
    /// Senior and PWD purchases are exempt from VAT.
    pub const fn is_vat_exempt(&self) -> bool {
        matches!(self, DiscountType::Senior | DiscountType::Pwd)
    }

    /// Statutory discounts need the customer's id card number on record.
    pub const fn requires_id_number(&self) -> bool {
        matches!(self, DiscountType::Senior | DiscountType::Pwd)
    }
}

/// Why stock moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementReason {
    Sale,
    Return,
    BulkImport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LedgerEntryType {
    Earned,
    Redeemed,
}

/// Who a bearer token belongs to.
///
/// ADMIN and MANAGER log into the management system with a password;
/// PHARMACIST logs into the counter with a PIN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Manager,
    Pharmacist,
}

impl Role {
    /// Management system users (the `isPMSUser` gate).
    pub const fn is_pms_user(&self) -> bool {
        matches!(self, Role::Admin | Role::Manager)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Admin => "ADMIN",
            Role::Manager => "MANAGER",
            Role::Pharmacist => "PHARMACIST",
        };
        f.write_str(s)
    }
}

// =============================================================================
// Branches & Staff
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    pub id: String,
    /// Short code embedded in invoice numbers (`B01`).
    pub branch_code: String,
    pub branch_name: String,
    pub address: Option<String>,
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
}

/// A management system account. The password hash never leaves the db crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub employee_id: String,
    pub name: String,
    pub email: Option<String>,
    pub role: Role,
    pub branch_id: Option<String>,
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
}

/// Counter staff who log in with a PIN.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Pharmacist {
    pub id: String,
    pub name: String,
    pub branch_id: String,
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Products & Inventory
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub brand_name: Option<String>,
    pub barcode: Option<String>,
    pub category: Option<String>,
    /// Strength and form, e.g. "500mg tablet".
    pub dosage: Option<String>,
    pub price_cents: Money,
    pub markup_bps: i64,
    /// Stock at or below this level shows on the low-stock dashboard.
    pub critical_level: i64,
    pub requires_prescription: bool,
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A product as the counter sees it: catalogue data plus branch stock.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct ProductListing {
    pub id: String,
    pub name: String,
    pub brand_name: Option<String>,
    pub barcode: Option<String>,
    pub dosage: Option<String>,
    pub price_cents: Money,
    pub requires_prescription: bool,
    /// `None` when the branch has no active inventory row.
    pub stock: Option<i64>,
    pub expiry_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct InventoryRecord {
    pub id: String,
    pub branch_id: String,
    pub product_id: String,
    pub stock: i64,
    pub expiry_date: Option<NaiveDate>,
    pub status: RecordStatus,
    pub updated_at: DateTime<Utc>,
}

/// One audit row per stock change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct InventoryMovement {
    pub id: String,
    pub inventory_id: String,
    pub reason: MovementReason,
    pub quantity_delta: i64,
    pub previous_stock: i64,
    pub current_stock: i64,
    /// Sale, return or import batch that caused the movement.
    pub reference_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Low-stock dashboard row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct LowStockItem {
    pub product_id: String,
    pub name: String,
    pub brand_name: Option<String>,
    pub stock: i64,
    pub critical_level: i64,
    pub expiry_date: Option<NaiveDate>,
}

// =============================================================================
// Customers & Loyalty
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
}

/// Running balance for one customer.
///
/// Invariant: `points_balance == lifetime_earned - lifetime_redeemed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct LoyaltyAccount {
    pub customer_id: String,
    pub card_id: String,
    pub points_balance: Points,
    pub lifetime_earned: Points,
    pub lifetime_redeemed: Points,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct LoyaltyLedgerEntry {
    pub id: String,
    pub customer_id: String,
    pub entry_type: LedgerEntryType,
    pub points: Points,
    pub balance_after: Points,
    pub sale_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Customer lookup result for the counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerWithCard {
    pub customer: Customer,
    pub account: LoyaltyAccount,
}

// =============================================================================
// Sessions
// =============================================================================

/// A cashier work period at a branch. Closed once `end_time` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct SalesSession {
    pub id: String,
    pub branch_id: String,
    pub opened_by: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub total_sales_cents: Money,
}

impl SalesSession {
    pub fn is_open(&self) -> bool {
        self.end_time.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct PharmacistSession {
    pub id: String,
    pub session_id: String,
    pub staff_id: String,
    /// Share of the session's sales credited to this pharmacist.
    pub share_bps: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

// =============================================================================
// Sales
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub id: String,
    pub invoice_number: String,
    pub branch_id: String,
    pub session_id: String,
    pub pharmacist_session_id: String,
    /// `None` for walk-in customers.
    pub customer_id: Option<String>,
    pub payment_method: PaymentMethod,
    pub discount_type: DiscountType,
    pub discount_id_number: Option<String>,
    pub subtotal_cents: Money,
    pub discount_cents: Money,
    pub tax_cents: Money,
    pub total_cents: Money,
    pub points_earned: Points,
    pub points_redeemed: Points,
    pub daily_sequence: i64,
    pub business_date: NaiveDate,
    pub status: SaleStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub line_number: i64,
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: Money,
    pub subtotal_cents: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: String,
    pub sale_id: String,
    pub payment_method: PaymentMethod,
    pub amount_tendered_cents: Money,
    pub change_cents: Money,
    pub reference_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A sale with everything it owns, for receipts and return lookups.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleDetail {
    #[serde(flatten)]
    pub sale: Sale,
    pub items: Vec<SaleItem>,
    pub payment: Option<Payment>,
}

// =============================================================================
// Held Transactions
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct HeldTransaction {
    pub id: String,
    /// 1, 2, 3... within the session.
    pub hold_number: i64,
    pub session_id: String,
    pub branch_id: String,
    pub customer_id: Option<String>,
    pub subtotal_cents: Money,
    pub note: Option<String>,
    pub status: HeldStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct HeldTransactionItem {
    pub id: String,
    pub held_transaction_id: String,
    pub line_number: i64,
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
    pub unit_price_cents: Money,
    pub subtotal_cents: Money,
}

// =============================================================================
// Returns
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct SalesReturn {
    pub id: String,
    pub sale_id: String,
    pub branch_id: String,
    pub pharmacist_session_id: Option<String>,
    pub reason: String,
    pub refund_cents: Money,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct ReturnItem {
    pub id: String,
    pub return_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: Money,
    pub subtotal_cents: Money,
}

// =============================================================================
// Prescriptions
// =============================================================================

/// A doctor's prescription recorded at the counter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Prescription {
    pub id: String,
    pub branch_id: String,
    pub pharmacist_id: String,
    pub patient_name: String,
    pub patient_age: Option<i64>,
    pub doctor_name: String,
    /// Doctor's PRC license number.
    pub prc_number: Option<String>,
    pub prescription_number: Option<String>,
    pub prescription_date: Option<NaiveDate>,
    pub diagnosis: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionItem {
    pub id: String,
    pub prescription_id: String,
    pub line_number: i64,
    pub product_id: String,
    pub product_name: String,
    pub quantity: i64,
    pub instructions: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrescriptionDetail {
    #[serde(flatten)]
    pub prescription: Prescription,
    pub items: Vec<PrescriptionItem>,
}

// =============================================================================
// Suppliers & Pricing
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Supplier {
    pub id: String,
    pub supplier_name: String,
    pub contact_person: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct ProductSupplier {
    pub id: String,
    pub product_id: String,
    pub supplier_id: String,
    pub supplier_price_cents: Money,
    /// Government-mandated maximum retail price, if any.
    pub ceiling_price_cents: Option<Money>,
    pub is_preferred: bool,
    /// ARCHIVED once the supplier is removed from the product.
    pub status: RecordStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct PriceHistoryEntry {
    pub id: String,
    pub product_id: String,
    pub supplier_id: Option<String>,
    pub supplier_price_cents: Money,
    pub markup_bps: i64,
    pub ceiling_price_cents: Option<Money>,
    pub unit_price_cents: Money,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(serde_json::to_string(&PaymentMethod::Gcash).unwrap(), "\"GCASH\"");
        assert_eq!(
            serde_json::to_string(&SaleStatus::PartiallyReturned).unwrap(),
            "\"PARTIALLY_RETURNED\""
        );
        assert_eq!(
            serde_json::to_string(&MovementReason::BulkImport).unwrap(),
            "\"BULK_IMPORT\""
        );
        let role: Role = serde_json::from_str("\"MANAGER\"").unwrap();
        assert_eq!(role, Role::Manager);
    }

    #[test]
    fn test_discount_rules() {
        assert!(DiscountType::Senior.is_vat_exempt());
        assert!(DiscountType::Pwd.requires_id_number());
        assert!(!DiscountType::Points.is_vat_exempt());
        assert_eq!(DiscountType::default(), DiscountType::None);
    }

    #[test]
    fn test_role_gates() {
        assert!(Role::Admin.is_pms_user());
        assert!(Role::Manager.is_pms_user());
        assert!(!Role::Pharmacist.is_pms_user());
    }

    #[test]
    fn test_payment_reference_requirement() {
        assert!(!PaymentMethod::Cash.requires_reference());
        assert!(PaymentMethod::Card.requires_reference());
        assert!(PaymentMethod::Gcash.requires_reference());
    }

    #[test]
    fn test_held_status_display() {
        assert_eq!(HeldStatus::Discarded.to_string(), "DISCARDED");
        assert_eq!(HeldStatus::default(), HeldStatus::Held);
    }
}
