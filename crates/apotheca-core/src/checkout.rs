//! # Checkout Math
//!
//! Request shapes for completing, holding and returning sales, plus the pure
//! arithmetic that turns a cart into the numbers printed on the receipt.
//!
//! ## Totals
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  subtotal  = Σ quantity × unit_price                                   │
//! │  discount  = manual discount + value of redeemed points                │
//! │  tax       = VAT on (subtotal - discount), zero for SENIOR / PWD        │
//! │  total     = subtotal - discount + tax                                 │
//! │  change    = tendered - total                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything here runs before a transaction is opened; a failure is a 400.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::loyalty::Points;
use crate::money::{Money, TaxRate};
use crate::types::{DiscountType, PaymentMethod};
use crate::validation::{validate_id, validate_price_cents, validate_quantity};
use crate::{MAX_CART_ITEMS, MAX_CART_TOTAL_CENTS};

// =============================================================================
// Request Types
// =============================================================================

/// One cart line as sent by the counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemInput {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: Money,
}

impl LineItemInput {
    pub fn subtotal(&self) -> Money {
        self.unit_price_cents.multiply_quantity(self.quantity)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountInput {
    #[serde(default)]
    pub discount_type: DiscountType,
    /// Manual discount amount. Points discounts are derived, not sent.
    #[serde(default)]
    pub discount_cents: Money,
    #[serde(default)]
    pub discount_id_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInput {
    pub payment_method: PaymentMethod,
    pub amount_tendered_cents: Money,
    #[serde(default)]
    pub reference_number: Option<String>,
}

/// Body of `POST /api/sales`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub branch_id: String,
    pub session_id: String,
    pub pharmacist_session_id: String,
    #[serde(default)]
    pub customer_id: Option<String>,
    /// Set when completing a recalled held transaction.
    #[serde(default)]
    pub held_transaction_id: Option<String>,
    pub items: Vec<LineItemInput>,
    #[serde(flatten)]
    pub discount: DiscountInput,
    #[serde(default)]
    pub points_to_redeem: Points,
    #[serde(flatten)]
    pub payment: PaymentInput,
}

/// Body of `POST /api/transactions/hold`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldRequest {
    pub session_id: String,
    pub branch_id: String,
    #[serde(default)]
    pub customer_id: Option<String>,
    pub items: Vec<LineItemInput>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnLineInput {
    pub product_id: String,
    pub quantity: i64,
}

/// Body of `POST /api/returns`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReturnRequest {
    pub sale_id: String,
    pub items: Vec<ReturnLineInput>,
    pub reason: String,
    #[serde(default)]
    pub pharmacist_session_id: Option<String>,
}

// =============================================================================
// Totals
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleTotals {
    pub subtotal_cents: Money,
    pub discount_cents: Money,
    pub tax_cents: Money,
    pub total_cents: Money,
}

/// Sum of line subtotals.
pub fn cart_subtotal(items: &[LineItemInput]) -> Money {
    items.iter().map(LineItemInput::subtotal).sum()
}

/// Computes receipt totals once the loyalty redemption value is known.
pub fn compute_totals(
    items: &[LineItemInput],
    discount: &DiscountInput,
    redemption_value: Money,
    vat_rate: TaxRate,
) -> CoreResult<SaleTotals> {
    let subtotal = cart_subtotal(items);
    let discount_total = discount.discount_cents + redemption_value;

    if discount_total > subtotal {
        return Err(ValidationError::OutOfRange {
            field: "discount".to_string(),
            min: 0,
            max: subtotal.cents(),
        }
        .into());
    }

    let taxable = subtotal - discount_total;
    let tax = if discount.discount_type.is_vat_exempt() {
        Money::zero()
    } else {
        taxable.calculate_tax(vat_rate)
    };

    Ok(SaleTotals {
        subtotal_cents: subtotal,
        discount_cents: discount_total,
        tax_cents: tax,
        total_cents: subtotal - discount_total + tax,
    })
}

/// Checks the tendered amount against the total and returns the change.
pub fn settle_payment(totals: &SaleTotals, payment: &PaymentInput) -> CoreResult<Money> {
    let total = totals.total_cents;
    let tendered = payment.amount_tendered_cents;

    if total.is_positive() && !tendered.is_positive() {
        return Err(CoreError::InvalidPaymentAmount {
            reason: "tendered amount must be positive".to_string(),
        });
    }
    if tendered < total {
        return Err(CoreError::InvalidPaymentAmount {
            reason: format!("tendered {} is less than total {}", tendered, total),
        });
    }

    Ok(tendered - total)
}

// =============================================================================
// Request Validation
// =============================================================================

fn validate_items(items: &[LineItemInput]) -> CoreResult<()> {
    if items.is_empty() {
        return Err(ValidationError::required("items").into());
    }
    if items.len() > MAX_CART_ITEMS {
        return Err(CoreError::CartTooLarge {
            max: MAX_CART_ITEMS,
        });
    }
    let mut subtotal = Money::zero();
    for item in items {
        validate_id("productId", &item.product_id)?;
        validate_quantity(item.quantity)?;
        validate_price_cents("unitPriceCents", item.unit_price_cents.cents())?;
        subtotal = item
            .unit_price_cents
            .checked_multiply_quantity(item.quantity)
            .and_then(|line| subtotal.checked_add(line))
            .ok_or_else(cart_total_out_of_range)?;
    }
    if subtotal.cents() > MAX_CART_TOTAL_CENTS {
        return Err(cart_total_out_of_range());
    }
    Ok(())
}

fn cart_total_out_of_range() -> CoreError {
    ValidationError::OutOfRange {
        field: "subtotalCents".to_string(),
        min: 0,
        max: MAX_CART_TOTAL_CENTS,
    }
    .into()
}

/// Rejects malformed checkout requests before any database work.
pub fn validate_checkout(request: &CheckoutRequest) -> CoreResult<()> {
    validate_id("branchId", &request.branch_id)?;
    validate_id("sessionId", &request.session_id)?;
    validate_id("pharmacistSessionId", &request.pharmacist_session_id)?;
    validate_items(&request.items)?;

    let discount = &request.discount;
    if discount.discount_cents.is_negative() {
        return Err(ValidationError::MustBePositive {
            field: "discountCents".to_string(),
        }
        .into());
    }
    validate_price_cents("discountCents", discount.discount_cents.cents())?;
    if discount.discount_type == DiscountType::None && !discount.discount_cents.is_zero() {
        return Err(ValidationError::invalid(
            "discountType",
            "a discount amount needs a discount type",
        )
        .into());
    }
    if discount.discount_type.requires_id_number()
        && discount
            .discount_id_number
            .as_deref()
            .map_or(true, |id| id.trim().is_empty())
    {
        return Err(ValidationError::required("discountIdNumber").into());
    }

    let redeeming = request.points_to_redeem.is_positive();
    if request.points_to_redeem.hundredths() < 0 {
        return Err(ValidationError::MustBePositive {
            field: "pointsToRedeem".to_string(),
        }
        .into());
    }
    if redeeming && discount.discount_type != DiscountType::Points {
        return Err(ValidationError::invalid(
            "discountType",
            "redeeming points requires discount type POINTS",
        )
        .into());
    }
    if redeeming && request.customer_id.is_none() {
        return Err(ValidationError::required("customerId").into());
    }
    if discount.discount_type == DiscountType::Points && !discount.discount_cents.is_zero() {
        return Err(ValidationError::invalid(
            "discountCents",
            "points discounts are computed from pointsToRedeem",
        )
        .into());
    }

    let payment = &request.payment;
    if payment.payment_method.requires_reference()
        && payment
            .reference_number
            .as_deref()
            .map_or(true, |r| r.trim().is_empty())
    {
        return Err(ValidationError::required("referenceNumber").into());
    }

    Ok(())
}

pub fn validate_hold(request: &HoldRequest) -> CoreResult<()> {
    validate_id("sessionId", &request.session_id)?;
    validate_id("branchId", &request.branch_id)?;
    validate_items(&request.items)
}

pub fn validate_return(request: &ReturnRequest) -> CoreResult<()> {
    validate_id("saleId", &request.sale_id)?;
    if request.reason.trim().is_empty() {
        return Err(ValidationError::required("reason").into());
    }
    if request.items.is_empty() {
        return Err(ValidationError::required("items").into());
    }
    for item in &request.items {
        validate_id("productId", &item.product_id)?;
        validate_quantity(item.quantity)?;
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
