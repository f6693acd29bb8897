//! # Coupon Evaluator
//!
//! Coupon types plus the pure eligibility and discount rules.
//!
//! ## Evaluation Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     discount(coupon, total, now)                        │
//! │                                                                         │
//! │  status == Disabled? ──────────────────────────────► 0                 │
//! │  stock > 0 && used_count >= stock? ────────────────► 0                 │
//! │  now outside [start_time, end_time]? ──────────────► 0                 │
//! │  window unparsable? ───────────────────────────────► 0                 │
//! │  total < min_amount? ──────────────────────────────► 0                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  FixedAmount  ─► value                                                  │
//! │  Percentage   ─► total × (1 - rate), only when 0 < rate < 1             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Units
//! - `FixedAmount`: `value` is cents off.
//! - `Percentage`: `value` is the *pay* rate in basis points. `8000` means
//!   the customer pays 80%, i.e. a 20% discount.
//!
//! Unparsable validity bounds are rejected when a coupon is created
//! (see [`Coupon::validity_window`]); at evaluation time they make the
//! coupon quietly invalid.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::RecordState;

/// Format of `start_time` / `end_time`, interpreted as UTC.
pub const COUPON_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Basis points in a whole (100%).
const FULL_BPS: i64 = 10_000;

// =============================================================================
// Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum CouponKind {
    /// Spend `min_amount`, save `value`.
    FixedAmount,
    /// Pay `value` basis points of the total.
    Percentage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum CouponStatus {
    #[default]
    Enabled,
    Disabled,
}

/// A coupon template that users can claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Coupon {
    pub id: i64,
    pub name: String,
    pub kind: CouponKind,
    pub value: i64,
    pub min_amount: Money,

    /// Window start, `YYYY-MM-DD HH:MM:SS`.
    pub start_time: String,

    /// Window end, `YYYY-MM-DD HH:MM:SS`.
    pub end_time: String,

    /// Total claimable; `0` means unbounded.
    pub stock: i64,
    pub used_count: i64,
    pub status: CouponStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[cfg_attr(
        feature = "sqlx",
        sqlx(rename = "deleted_at", try_from = "Option<DateTime<Utc>>")
    )]
    #[serde(skip)]
    pub state: RecordState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum UserCouponStatus {
    #[default]
    Unused,
    Used,
    Expired,
}

/// A coupon claimed by a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct UserCoupon {
    pub id: i64,
    pub user_id: i64,
    pub coupon_id: i64,

    /// Order the coupon was spent on.
    pub order_id: Option<i64>,
    pub status: UserCouponStatus,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[cfg_attr(
        feature = "sqlx",
        sqlx(rename = "deleted_at", try_from = "Option<DateTime<Utc>>")
    )]
    #[serde(skip)]
    pub state: RecordState,
}

// =============================================================================
// Window Parsing
// =============================================================================

/// Parses a coupon bound in [`COUPON_TIME_FORMAT`].
pub fn parse_coupon_time(field: &str, value: &str) -> CoreResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), COUPON_TIME_FORMAT).map_err(|e| {
        CoreError::InvalidCouponWindow {
            reason: format!("{field} '{value}': {e}"),
        }
    })
}

// =============================================================================
// Evaluation
// =============================================================================

impl Coupon {
    /// Parses and checks the validity window.
    ///
    /// ## Rules
    /// - Both bounds must match `YYYY-MM-DD HH:MM:SS`
    /// - `start_time` must not be after `end_time`
    pub fn validity_window(&self) -> CoreResult<(NaiveDateTime, NaiveDateTime)> {
        let start = parse_coupon_time("start_time", &self.start_time)?;
        let end = parse_coupon_time("end_time", &self.end_time)?;
        if start > end {
            return Err(CoreError::InvalidCouponWindow {
                reason: format!("start_time {} is after end_time {}", self.start_time, self.end_time),
            });
        }
        Ok((start, end))
    }

    /// Whether the bounded stock is used up. Unbounded coupons never are.
    #[inline]
    pub fn is_exhausted(&self) -> bool {
        self.stock > 0 && self.used_count >= self.stock
    }

    /// Checks whether the coupon can be applied at `now`.
    ///
    /// ## Example
    /// ```rust,ignore
    /// if coupon.is_valid(Utc::now()) {
    ///     // show "Apply" button
    /// }
    /// ```
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        if self.status != CouponStatus::Enabled || !self.state.is_active() {
            return false;
        }
        if self.is_exhausted() {
            return false;
        }
        match self.validity_window() {
            Ok((start, end)) => {
                let now = now.naive_utc();
                now >= start && now <= end
            }
            Err(_) => false,
        }
    }

    /// Computes the discount this coupon grants on `order_total` at `now`.
    ///
    /// Returns zero whenever the coupon is not valid or the total is below
    /// `min_amount`. Percentage coupons with a rate outside `(0, 1)` are
    /// misconfigured and also yield zero.
    pub fn discount(&self, order_total: Money, now: DateTime<Utc>) -> Money {
        if !self.is_valid(now) || order_total < self.min_amount {
            return Money::zero();
        }

        match self.kind {
            CouponKind::FixedAmount => Money::from_cents(self.value.max(0)),
            CouponKind::Percentage => {
                if self.value <= 0 || self.value >= FULL_BPS {
                    return Money::zero();
                }
                // pay rate 8000 → 2000 bps off
                order_total.percent_of((FULL_BPS - self.value) as u32)
            }
        }
    }

    /// Human-readable description for presentation layers.
    ///
    /// ## Example
    /// ```text
    /// FixedAmount, min 100.00, value 15.00  →  "Spend 100.00, save 15.00"
    /// Percentage, value 8000                →  "20% off"
    /// ```
    pub fn display_text(&self) -> String {
        match self.kind {
            CouponKind::FixedAmount => format!(
                "Spend {}, save {}",
                self.min_amount,
                Money::from_cents(self.value)
            ),
            CouponKind::Percentage => {
                if self.value <= 0 || self.value >= FULL_BPS {
                    return String::new();
                }
                let off_bps = FULL_BPS - self.value;
                format!("{}% off", off_bps as f64 / 100.0)
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
