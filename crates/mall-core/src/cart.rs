//! # Cart Items
//!
//! One row per user / product / SKU. Adding the same combination again
//! merges into the existing row instead of creating a duplicate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::RecordState;
use crate::validation::{validate_quantity, ValidationResult};

/// `sku_id` used when the product is bought without a variant.
pub const NO_SKU: i64 = 0;

/// A line in a user's shopping cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CartItem {
    pub id: i64,
    pub user_id: i64,
    pub product_id: i64,
    pub sku_id: i64,
    pub quantity: i64,

    /// Whether the line is included at checkout.
    pub selected: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[cfg_attr(
        feature = "sqlx",
        sqlx(rename = "deleted_at", try_from = "Option<DateTime<Utc>>")
    )]
    #[serde(skip)]
    pub state: RecordState,
}

impl CartItem {
    #[inline]
    pub fn has_sku(&self) -> bool {
        self.sku_id != NO_SKU
    }
}

/// Quantity after adding `added` to an existing line.
///
/// ## Example
/// ```rust
/// use mall_core::cart::merged_quantity;
///
/// assert_eq!(merged_quantity(2, 3).unwrap(), 5);
/// assert!(merged_quantity(2, 0).is_err());
/// ```
pub fn merged_quantity(existing: i64, added: i64) -> ValidationResult<i64> {
    validate_quantity(added)?;
    let merged = existing.checked_add(added).ok_or(ValidationError::OutOfRange {
        field: "quantity".to_string(),
        min: 1,
        max: crate::MAX_ITEM_QUANTITY,
    })?;
    validate_quantity(merged)?;
    Ok(merged)
}

/// Sum of `unit_price × quantity` over the selected lines.
pub fn selected_total<'a>(lines: impl IntoIterator<Item = (&'a CartItem, Money)>) -> Money {
    lines
        .into_iter()
        .filter(|(item, _)| item.selected)
        .map(|(item, unit_price)| unit_price.multiply_quantity(item.quantity))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: i64, quantity: i64, selected: bool) -> CartItem {
        let now = Utc::now();
        CartItem {
            id,
            user_id: 1,
            product_id: id,
            sku_id: NO_SKU,
            quantity,
            selected,
            created_at: now,
            updated_at: now,
            state: RecordState::Active,
        }
    }

    #[test]
    fn test_merged_quantity_respects_cap() {
        assert_eq!(merged_quantity(1, 1).unwrap(), 2);
        assert!(merged_quantity(crate::MAX_ITEM_QUANTITY, 1).is_err());
        assert!(merged_quantity(1, -2).is_err());
    }

    #[test]
    fn test_selected_total_skips_unselected_lines() {
        let a = item(1, 2, true);
        let b = item(2, 5, false);
        let total = selected_total([(&a, Money::from_cents(250)), (&b, Money::from_cents(999))]);
        assert_eq!(total.cents(), 500);
    }
}
