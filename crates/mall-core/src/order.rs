//! # Orders
//!
//! Order and order-item types, order number generation, and the snapshot
//! step that freezes product data into order items.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   PendingPayment ──pay──► PendingShipment ──ship──► Shipped            │
//! │         │                                              │                │
//! │       cancel                                        receive             │
//! │         │                                              │                │
//! │         ▼                                              ▼                │
//! │     Cancelled                                      Completed            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! An [`OrderItem`] copies name, image, specifications and price from the
//! live product/SKU at order time. Later catalog edits never change what an
//! order shows.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{Product, ProductSku, ProductStatus, RecordState};
use crate::validation::validate_quantity;

// =============================================================================
// Status Enums
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    PendingPayment,
    PendingShipment,
    Shipped,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::PendingPayment => "pending_payment",
            OrderStatus::PendingShipment => "pending_shipment",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum PayStatus {
    #[default]
    Unpaid,
    Paid,
}

// =============================================================================
// Order
// =============================================================================

/// A placed order.
///
/// All monetary fields are non-negative and
/// `pay_amount == total_amount + freight - discount_amount`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Order {
    pub id: i64,
    pub order_no: String,
    pub user_id: i64,
    pub address_id: i64,
    pub total_amount: Money,
    pub freight: Money,
    pub discount_amount: Money,
    pub pay_amount: Money,
    pub pay_status: PayStatus,
    pub pay_time: Option<DateTime<Utc>>,
    pub payment_method: String,
    pub order_status: OrderStatus,
    pub cancel_reason: String,
    pub cancel_time: Option<DateTime<Utc>>,
    pub remark: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[cfg_attr(
        feature = "sqlx",
        sqlx(rename = "deleted_at", try_from = "Option<DateTime<Utc>>")
    )]
    #[serde(skip)]
    pub state: RecordState,
}

impl Order {
    /// Only unpaid orders can be cancelled or paid.
    #[inline]
    pub fn is_pending_payment(&self) -> bool {
        self.order_status == OrderStatus::PendingPayment && self.pay_status == PayStatus::Unpaid
    }

    /// Fails with `InvalidOrderStatus` unless the order awaits payment.
    pub fn ensure_pending_payment(&self, operation: &'static str) -> CoreResult<()> {
        if self.is_pending_payment() {
            Ok(())
        } else {
            Err(CoreError::InvalidOrderStatus {
                order_no: self.order_no.clone(),
                current_status: self.order_status.as_str().to_string(),
                operation,
            })
        }
    }
}

/// A frozen line of an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderItem {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub sku_id: i64,
    pub product_name: String,
    pub product_image: String,
    #[cfg_attr(feature = "sqlx", sqlx(json))]
    pub specifications: BTreeMap<String, String>,
    pub price: Money,
    pub quantity: i64,
    pub total_amount: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Order Number
// =============================================================================

/// Formats an order number: `YYYYMMDDHHMMSS` followed by a 4-digit suffix.
///
/// ## Example
/// ```rust
/// use chrono::{TimeZone, Utc};
/// use mall_core::order::format_order_no;
///
/// let at = Utc.with_ymd_and_hms(2024, 3, 9, 8, 5, 1).unwrap();
/// assert_eq!(format_order_no(at, 42), "202403090805010042");
/// ```
pub fn format_order_no(at: DateTime<Utc>, suffix: u16) -> String {
    format!("{}{:04}", at.format("%Y%m%d%H%M%S"), suffix % 10_000)
}

/// Generates an order number for `at` with a random suffix.
///
/// Collisions within the same second are possible; the `order_no` column
/// is unique, so the repository retries on conflict.
pub fn generate_order_no(at: DateTime<Utc>) -> String {
    let suffix = rand::thread_rng().gen_range(0..10_000u16);
    format_order_no(at, suffix)
}

// =============================================================================
// Snapshot
// =============================================================================

/// An order item before it has an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub product_id: i64,
    pub sku_id: i64,
    pub product_name: String,
    pub product_image: String,
    pub specifications: BTreeMap<String, String>,
    pub price: Money,
    pub quantity: i64,
    pub total_amount: Money,
}

/// Freezes the product (and optional SKU) into an order line.
///
/// ## Rules
/// - `quantity` must be at least 1
/// - the product must be listed
/// - the SKU, when given, must belong to the product
/// - stock (SKU stock when a SKU is given) must cover `quantity`
/// - SKU price and image win over the product's
pub fn snapshot_item(
    product: &Product,
    sku: Option<&ProductSku>,
    quantity: i64,
) -> CoreResult<NewOrderItem> {
    validate_quantity(quantity)?;

    if product.status != ProductStatus::Listed || !product.state.is_active() {
        return Err(CoreError::NotFound {
            entity: "Product",
            id: product.id,
        });
    }

    if let Some(sku) = sku {
        if sku.product_id != product.id {
            return Err(CoreError::NotFound {
                entity: "ProductSku",
                id: sku.id,
            });
        }
    }

    let available = sku.map_or(product.stock, |s| s.stock);
    if available < quantity {
        return Err(CoreError::InsufficientStock {
            product_id: product.id,
            available,
            requested: quantity,
        });
    }

    let price = sku.map_or(product.price, |s| s.price);
    let product_image = sku
        .map(|s| s.image.as_str())
        .filter(|image| !image.is_empty())
        .unwrap_or_else(|| product.cover_image())
        .to_string();

    Ok(NewOrderItem {
        product_id: product.id,
        sku_id: sku.map_or(crate::cart::NO_SKU, |s| s.id),
        product_name: product.name.clone(),
        product_image,
        specifications: sku.map(|s| s.specifications.clone()).unwrap_or_default(),
        price,
        quantity,
        total_amount: price.multiply_quantity(quantity),
    })
}

// =============================================================================
// Totals
// =============================================================================

/// Monetary fields of a new order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub total_amount: Money,
    pub freight: Money,
    pub discount_amount: Money,
    pub pay_amount: Money,
}

impl OrderTotals {
    /// Computes totals; the discount is capped so `pay_amount` never goes
    /// below zero.
    pub fn compute(items: &[NewOrderItem], freight: Money, discount: Money) -> Self {
        let total_amount: Money = items.iter().map(|item| item.total_amount).sum();
        let freight = freight.max(Money::zero());
        let gross = total_amount + freight;
        let discount_amount = discount.max(Money::zero()).min(gross);

        OrderTotals {
            total_amount,
            freight,
            discount_amount,
            pay_amount: gross.saturating_sub(discount_amount),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn product(stock: i64) -> Product {
        let now = Utc::now();
        Product {
            id: 7,
            name: "Linen Shirt".to_string(),
            category_id: 1,
            description: String::new(),
            price: Money::from_cents(5900),
            original_price: None,
            stock,
            sales: 0,
            images: vec!["front.jpg".to_string(), "back.jpg".to_string()],
            video_url: String::new(),
            status: ProductStatus::Listed,
            is_hot: false,
            is_new: true,
            sort: 0,
            created_at: now,
            updated_at: now,
            state: RecordState::Active,
        }
    }

    fn sku(stock: i64) -> ProductSku {
        let now = Utc::now();
        ProductSku {
            id: 70,
            product_id: 7,
            name: "Blue / M".to_string(),
            specifications: BTreeMap::from([
                ("color".to_string(), "blue".to_string()),
                ("size".to_string(), "M".to_string()),
            ]),
            price: Money::from_cents(6400),
            stock,
            sales: 0,
            image: "blue.jpg".to_string(),
            created_at: now,
            updated_at: now,
            state: RecordState::Active,
        }
    }

    #[test]
    fn test_order_no_shape() {
        let at = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 58).unwrap();
        let no = generate_order_no(at);
        assert_eq!(no.len(), 18);
        assert!(no.starts_with("20241231235958"));
        assert!(no.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_snapshot_from_product() {
        let item = snapshot_item(&product(10), None, 2).unwrap();
        assert_eq!(item.sku_id, crate::cart::NO_SKU);
        assert_eq!(item.product_image, "front.jpg");
        assert_eq!(item.total_amount.cents(), 11800);
        assert!(item.specifications.is_empty());
    }

    #[test]
    fn test_snapshot_prefers_sku_fields() {
        let item = snapshot_item(&product(0), Some(&sku(3)), 3).unwrap();
        assert_eq!(item.sku_id, 70);
        assert_eq!(item.price.cents(), 6400);
        assert_eq!(item.product_image, "blue.jpg");
        assert_eq!(item.specifications["size"], "M");
    }

    #[test]
    fn test_snapshot_is_independent_of_later_edits() {
        let mut live = product(10);
        let item = snapshot_item(&live, None, 1).unwrap();
        live.name = "Renamed".to_string();
        live.price = Money::from_cents(1);
        assert_eq!(item.product_name, "Linen Shirt");
        assert_eq!(item.price.cents(), 5900);
    }

    #[test]
    fn test_snapshot_rejects_insufficient_stock() {
        let err = snapshot_item(&product(1), None, 2).unwrap_err();
        assert!(matches!(
            err,
            CoreError::InsufficientStock { available: 1, requested: 2, .. }
        ));
    }

    #[test]
    fn test_snapshot_rejects_unlisted_and_foreign_sku() {
        let mut p = product(5);
        p.status = ProductStatus::Unlisted;
        assert!(snapshot_item(&p, None, 1).is_err());

        let mut other = sku(5);
        other.product_id = 99;
        assert!(snapshot_item(&product(5), Some(&other), 1).is_err());
    }

    #[test]
    fn test_totals_never_negative() {
        let items = vec![snapshot_item(&product(10), None, 1).unwrap()];
        let totals = OrderTotals::compute(&items, Money::from_cents(1000), Money::from_cents(500));
        assert_eq!(totals.total_amount.cents(), 5900);
        assert_eq!(totals.pay_amount.cents(), 6400);

        let totals = OrderTotals::compute(&items, Money::zero(), Money::from_cents(99999));
        assert_eq!(totals.discount_amount.cents(), 5900);
        assert!(totals.pay_amount.is_zero());
    }
}
