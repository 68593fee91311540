//! # Loyalty Rules
//!
//! Star points earned on purchases and redeemed as a discount.
//!
//! ## Point Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Loyalty Point Flow                               │
//! │                                                                         │
//! │  Subtotal (pre-discount) ₱220.00                                       │
//! │       │                                                                 │
//! │       ├──► points_earned()  ÷ 200 → 1.10 points (half-up, 2 dp)        │
//! │       │                                                                 │
//! │       └──► max_redeemable() ÷ 100 → floor → 2 points                   │
//! │                  │                                                      │
//! │                  ▼                                                      │
//! │            min(balance, 2) ── requested > max? ──► InvalidRedemption   │
//! │                  │                                                      │
//! │                  ▼                                                      │
//! │            redemption_value() × ₱1.00 per point → discount             │
//! │                                                                         │
//! │  balance_after = balance_before - redeemed + earned                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Points are fixed-point with two decimals, stored as hundredths.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;

// =============================================================================
// Points
// =============================================================================

/// Loyalty points in hundredths (110 = 1.10 points).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
pub struct Points(i64);

impl Points {
    #[inline]
    pub const fn from_hundredths(hundredths: i64) -> Self {
        Points(hundredths)
    }

    #[inline]
    pub const fn from_whole(points: i64) -> Self {
        Points(points * 100)
    }

    #[inline]
    pub const fn hundredths(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Points(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for Points {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, (self.0 / 100).abs(), (self.0 % 100).abs())
    }
}

impl Add for Points {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Points(self.0 + other.0)
    }
}

impl Sub for Points {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Points(self.0 - other.0)
    }
}

// =============================================================================
// Policy
// =============================================================================

/// Configurable earn/redeem ratios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoyaltyPolicy {
    /// Whole pesos of subtotal per point earned.
    pub currency_per_point: i64,

    /// Whole pesos of subtotal per point that may be redeemed.
    pub currency_per_redeemable_point: i64,

    /// Discount value of one redeemed point, in centavos.
    pub point_value_cents: i64,
}

impl Default for LoyaltyPolicy {
    fn default() -> Self {
        LoyaltyPolicy {
            currency_per_point: 200,
            currency_per_redeemable_point: 100,
            point_value_cents: 100,
        }
    }
}

/// Outcome of applying the policy to one sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoyaltyQuote {
    pub earned: Points,
    pub redeemed: Points,
    /// Discount granted for the redeemed points.
    pub redemption_value: Money,
}

impl LoyaltyQuote {
    pub const fn none() -> Self {
        LoyaltyQuote {
            earned: Points::zero(),
            redeemed: Points::zero(),
            redemption_value: Money::zero(),
        }
    }
}

impl LoyaltyPolicy {
    /// Points earned on a pre-discount subtotal, rounded half up to 0.01.
    pub fn points_earned(&self, subtotal: Money) -> Points {
        if !subtotal.is_positive() || self.currency_per_point <= 0 {
            return Points::zero();
        }
        // hundredths of a point = centavos / pesos-per-point
        let divisor = self.currency_per_point as i128;
        let hundredths = (subtotal.cents() as i128 * 2 + divisor) / (divisor * 2);
        Points::from_hundredths(hundredths as i64)
    }

    /// Upper bound for a redemption: `min(balance, floor(subtotal / ratio))`.
    pub fn max_redeemable(&self, balance: Points, subtotal: Money) -> Points {
        if !subtotal.is_positive() || self.currency_per_redeemable_point <= 0 {
            return Points::zero();
        }
        let whole = subtotal.cents() / (self.currency_per_redeemable_point * 100);
        let cap = Points::from_whole(whole);
        let bounded = if balance < cap { balance } else { cap };
        if bounded.hundredths() < 0 {
            Points::zero()
        } else {
            bounded
        }
    }

    /// Peso value of redeemed points, rounded half up to the centavo.
    pub fn redemption_value(&self, points: Points) -> Money {
        let cents = (points.hundredths() as i128 * self.point_value_cents as i128 + 50) / 100;
        Money::from_cents(cents as i64)
    }

    /// Checks a redemption request and returns the quote for the sale.
    ///
    /// `balance` is `None` when the customer has no loyalty account; such
    /// sales earn nothing and cannot redeem.
    pub fn quote(
        &self,
        balance: Option<Points>,
        subtotal: Money,
        requested: Points,
    ) -> CoreResult<LoyaltyQuote> {
        let Some(balance) = balance else {
            if requested.is_zero() {
                return Ok(LoyaltyQuote::none());
            }
            return Err(CoreError::InvalidRedemption {
                requested,
                max: Points::zero(),
            });
        };

        let max = self.max_redeemable(balance, subtotal);
        if requested.hundredths() < 0 || requested > max {
            return Err(CoreError::InvalidRedemption { requested, max });
        }

        Ok(LoyaltyQuote {
            earned: self.points_earned(subtotal),
            redeemed: requested,
            redemption_value: self.redemption_value(requested),
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
