//! Selling price from supplier cost.
//!
//! `unit_price = min(supplier_price × (1 + markup), ceiling_price)`
//!
//! The ceiling is the government maximum retail price for regulated
//! medicines; when present it always wins over the markup.

use crate::money::Money;

/// Computes the shelf price for a product.
///
/// ```rust
/// use apotheca_core::money::Money;
/// use apotheca_core::pricing::selling_price;
///
/// // ₱80.00 + 30% = ₱104.00, capped at ₱100.00
/// let price = selling_price(Money::from_cents(8_000), 3_000, Some(Money::from_cents(10_000)));
/// assert_eq!(price.cents(), 10_000);
/// ```
pub fn selling_price(supplier_price: Money, markup_bps: u32, ceiling: Option<Money>) -> Money {
    let marked_up = supplier_price.apply_markup(markup_bps);
    match ceiling {
        Some(ceiling) if ceiling.is_positive() => marked_up.min(ceiling),
        _ => marked_up,
    }
}
