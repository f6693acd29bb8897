//! # Order Repository
//!
//! Orders and their frozen item snapshots.
//!
//! ## Order Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Order Lifecycle                                   │
//! │                                                                         │
//! │  1. CREATE (one transaction)                                           │
//! │     ├── address must belong to the user                                │
//! │     ├── guarded stock decrement per item                               │
//! │     ├── optional coupon → discount, claim marked used                  │
//! │     ├── INSERT orders (order_no retried on collision)                  │
//! │     └── INSERT order_items (snapshots)                                 │
//! │                                                                         │
//! │  2. PAY                                                                │
//! │     └── pending_payment/unpaid → pending_shipment/paid                 │
//! │                                                                         │
//! │  3. (OPTIONAL) CANCEL                                                  │
//! │     ├── pending_payment only                                           │
//! │     ├── stock restored                                                 │
//! │     └── coupon claim returned to unused                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::repository::coupon::mark_used_in;
use crate::repository::product::{decrement_stock_in, restore_stock_in};
use mall_core::cart::NO_SKU;
use mall_core::order::generate_order_no;
use mall_core::{
    CoreError, Coupon, Money, NewOrderItem, Order, OrderItem, OrderStatus, OrderTotals,
    PageRequest, UserCoupon, UserCouponStatus, ValidationError,
};

const ORDER_COLUMNS: &str = "id, order_no, user_id, address_id, total_amount, freight, \
     discount_amount, pay_amount, pay_status, pay_time, payment_method, order_status, \
     cancel_reason, cancel_time, remark, created_at, updated_at, deleted_at";

const ORDER_ITEM_COLUMNS: &str = "id, order_id, product_id, sku_id, product_name, product_image, \
     specifications, price, quantity, total_amount, created_at, updated_at";

/// Attempts at drawing a fresh random order number suffix.
const ORDER_NO_ATTEMPTS: usize = 5;

/// Input for [`OrderRepository::create`].
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: i64,
    pub address_id: i64,
    pub items: Vec<NewOrderItem>,
    pub freight: Money,
    pub remark: String,
    /// A claimed, unused coupon to spend on this order.
    pub user_coupon_id: Option<i64>,
}

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Places an order.
    ///
    /// Everything happens in one transaction: any failure (stock, coupon,
    /// address) leaves stock and coupons untouched.
    pub async fn create(&self, order: NewOrder, now: DateTime<Utc>) -> DbResult<Order> {
        if order.items.is_empty() {
            return Err(CoreError::from(ValidationError::Required {
                field: "items".to_string(),
            })
            .into());
        }

        let mut tx = self.pool.begin().await?;

        let address: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM addresses WHERE id = ?1 AND user_id = ?2 AND deleted_at IS NULL",
        )
        .bind(order.address_id)
        .bind(order.user_id)
        .fetch_optional(&mut *tx)
        .await?;
        if address.is_none() {
            return Err(DbError::not_found("Address", order.address_id));
        }

        for item in &order.items {
            let sku_id = (item.sku_id != NO_SKU).then_some(item.sku_id);
            decrement_stock_in(&mut tx, item.product_id, sku_id, item.quantity).await?;
        }

        let subtotal: Money = order.items.iter().map(|item| item.total_amount).sum();
        let discount = match order.user_coupon_id {
            Some(user_coupon_id) => {
                coupon_discount(&mut tx, order.user_id, user_coupon_id, subtotal, now).await?
            }
            None => Money::zero(),
        };
        let totals = OrderTotals::compute(&order.items, order.freight, discount);

        let created = insert_order(&mut tx, &order, &totals, now).await?;

        for item in &order.items {
            sqlx::query(
                "INSERT INTO order_items \
                    (order_id, product_id, sku_id, product_name, product_image, specifications, \
                     price, quantity, total_amount, created_at, updated_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
            )
            .bind(created.id)
            .bind(item.product_id)
            .bind(item.sku_id)
            .bind(&item.product_name)
            .bind(&item.product_image)
            .bind(Json(&item.specifications))
            .bind(item.price)
            .bind(item.quantity)
            .bind(item.total_amount)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        if let Some(user_coupon_id) = order.user_coupon_id {
            mark_used_in(&mut tx, order.user_id, user_coupon_id, created.id).await?;
        }

        tx.commit().await?;

        info!(
            order_no = %created.order_no,
            user_id = created.user_id,
            pay_amount = %created.pay_amount,
            "Order created"
        );
        Ok(created)
    }

    pub async fn get(&self, id: i64) -> DbResult<Order> {
        sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Order", id))
    }

    /// Gets an order only if it belongs to `user_id`.
    pub async fn get_for_user(&self, user_id: i64, id: i64) -> DbResult<Order> {
        sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE id = ?1 AND user_id = ?2 AND deleted_at IS NULL"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Order", id))
    }

    pub async fn get_by_no(&self, order_no: &str) -> DbResult<Order> {
        sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE order_no = ?1 AND deleted_at IS NULL"
        ))
        .bind(order_no)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Order", order_no))
    }

    /// Item snapshots of an order.
    pub async fn items(&self, order_id: i64) -> DbResult<Vec<OrderItem>> {
        let items = sqlx::query_as::<_, OrderItem>(&format!(
            "SELECT {ORDER_ITEM_COLUMNS} FROM order_items WHERE order_id = ?1 ORDER BY id"
        ))
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// A page of the user's orders, newest first.
    pub async fn list_by_user(
        &self,
        user_id: i64,
        status: Option<OrderStatus>,
        page: PageRequest,
    ) -> DbResult<(Vec<Order>, i64)> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM orders \
             WHERE user_id = ?1 AND (?2 IS NULL OR order_status = ?2) AND deleted_at IS NULL",
        )
        .bind(user_id)
        .bind(status)
        .fetch_one(&self.pool)
        .await?;

        let orders = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE user_id = ?1 AND (?2 IS NULL OR order_status = ?2) AND deleted_at IS NULL \
             ORDER BY id DESC LIMIT ?3 OFFSET ?4"
        ))
        .bind(user_id)
        .bind(status)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((orders, total))
    }

    /// Cancels an unpaid order, restoring stock and any spent coupon.
    pub async fn cancel(
        &self,
        user_id: i64,
        id: i64,
        reason: &str,
        now: DateTime<Utc>,
    ) -> DbResult<Order> {
        let mut tx = self.pool.begin().await?;

        let order = sqlx::query_as::<_, Order>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE id = ?1 AND user_id = ?2 AND deleted_at IS NULL"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("Order", id))?;

        order.ensure_pending_payment("cancel")?;

        let items = sqlx::query_as::<_, OrderItem>(&format!(
            "SELECT {ORDER_ITEM_COLUMNS} FROM order_items WHERE order_id = ?1"
        ))
        .bind(id)
        .fetch_all(&mut *tx)
        .await?;

        for item in &items {
            let sku_id = (item.sku_id != NO_SKU).then_some(item.sku_id);
            restore_stock_in(&mut tx, item.product_id, sku_id, item.quantity).await?;
        }

        sqlx::query(
            "UPDATE user_coupons SET status = 'unused', order_id = NULL, used_at = NULL, \
                updated_at = ?1 \
             WHERE order_id = ?2 AND status = 'used'",
        )
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        let cancelled = sqlx::query_as::<_, Order>(&format!(
            "UPDATE orders SET order_status = 'cancelled', cancel_reason = ?1, cancel_time = ?2, \
                updated_at = ?2 \
             WHERE id = ?3 \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(reason)
        .bind(now)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(order_no = %cancelled.order_no, "Order cancelled");
        Ok(cancelled)
    }

    /// Records payment and moves the order to shipment.
    pub async fn mark_paid(
        &self,
        user_id: i64,
        id: i64,
        payment_method: &str,
        now: DateTime<Utc>,
    ) -> DbResult<Order> {
        let order = self.get_for_user(user_id, id).await?;
        order.ensure_pending_payment("pay")?;

        // The status guard makes a concurrent cancel/pay lose cleanly.
        let paid = sqlx::query_as::<_, Order>(&format!(
            "UPDATE orders SET pay_status = 'paid', pay_time = ?1, payment_method = ?2, \
                order_status = 'pending_shipment', updated_at = ?1 \
             WHERE id = ?3 AND order_status = 'pending_payment' AND pay_status = 'unpaid' \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(now)
        .bind(payment_method)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match paid {
            Some(paid) => {
                info!(order_no = %paid.order_no, "Order paid");
                Ok(paid)
            }
            None => {
                let current = self.get(id).await?;
                Err(current.ensure_pending_payment("pay").err().map_or_else(
                    || DbError::Conflict(format!("order {} changed concurrently", order.order_no)),
                    DbError::from,
                ))
            }
        }
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

/// Discount granted by the user's unused claim on `subtotal`.
async fn coupon_discount(
    tx: &mut Transaction<'_, Sqlite>,
    user_id: i64,
    user_coupon_id: i64,
    subtotal: Money,
    now: DateTime<Utc>,
) -> DbResult<Money> {
    let claim = sqlx::query_as::<_, UserCoupon>(
        "SELECT id, user_id, coupon_id, order_id, status, used_at, created_at, updated_at, \
            deleted_at \
         FROM user_coupons WHERE id = ?1 AND user_id = ?2 AND deleted_at IS NULL",
    )
    .bind(user_coupon_id)
    .bind(user_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| DbError::not_found("UserCoupon", user_coupon_id))?;

    if claim.status != UserCouponStatus::Unused {
        return Err(CoreError::CouponUnavailable {
            coupon_id: claim.coupon_id,
        }
        .into());
    }

    let coupon = sqlx::query_as::<_, Coupon>(
        "SELECT id, name, kind, value, min_amount, start_time, end_time, stock, used_count, \
            status, created_at, updated_at, deleted_at \
         FROM coupons WHERE id = ?1",
    )
    .bind(claim.coupon_id)
    .fetch_one(&mut **tx)
    .await?;

    // Claims already counted against stock; judge the window and status only.
    let coupon = Coupon {
        used_count: 0,
        ..coupon
    };

    let discount = coupon.discount(subtotal, now);
    if discount.is_zero() {
        return Err(CoreError::CouponUnavailable {
            coupon_id: coupon.id,
        }
        .into());
    }
    Ok(discount)
}

/// Inserts the order row, drawing a new number on collision.
async fn insert_order(
    tx: &mut Transaction<'_, Sqlite>,
    order: &NewOrder,
    totals: &OrderTotals,
    now: DateTime<Utc>,
) -> DbResult<Order> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        let order_no = generate_order_no(now);

        let inserted = sqlx::query_as::<_, Order>(&format!(
            "INSERT INTO orders \
                (order_no, user_id, address_id, total_amount, freight, discount_amount, \
                 pay_amount, remark, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9) \
             RETURNING {ORDER_COLUMNS}"
        ))
        .bind(&order_no)
        .bind(order.user_id)
        .bind(order.address_id)
        .bind(totals.total_amount)
        .bind(totals.freight)
        .bind(totals.discount_amount)
        .bind(totals.pay_amount)
        .bind(&order.remark)
        .bind(now)
        .fetch_one(&mut **tx)
        .await
        .map_err(DbError::from);

        match inserted {
            Err(e) if e.is_unique_violation_on("order_no") && attempt < ORDER_NO_ATTEMPTS => {
                warn!(%order_no, attempt, "Order number collision, retrying");
            }
            other => {
                if let Ok(created) = &other {
                    debug!(order_id = created.id, order_no = %created.order_no, "Order row inserted");
                }
                return other;
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::address::AddressInput;
    use crate::repository::coupon::tests::{coupon_input, noon};
    use crate::repository::product::tests::{product_input, seed_category};
    use crate::repository::test_db;
    use crate::repository::user::NewUser;
    use crate::Database;
    use mall_core::order::snapshot_item;
    use mall_core::{CouponKind, PayStatus, Role};

    struct Fixture {
        db: Database,
        user: i64,
        address: i64,
        product: i64,
    }

    async fn fixture() -> Fixture {
        let db = test_db().await;
        let user = db
            .users()
            .create(NewUser {
                username: "buyer".to_string(),
                password_hash: "hash".to_string(),
                nickname: String::new(),
                phone: None,
                email: None,
                role: Role::User,
            })
            .await
            .unwrap()
            .id;
        let address = db
            .addresses()
            .create(
                user,
                AddressInput {
                    name: "Buyer".to_string(),
                    phone: "13800000000".to_string(),
                    detail: "1 Main St".to_string(),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .id;
        let category = seed_category(&db).await;
        let product = db
            .products()
            .create(product_input("Kettle", category, 6_000))
            .await
            .unwrap()
            .id;

        Fixture {
            db,
            user,
            address,
            product,
        }
    }

    async fn new_order(f: &Fixture, quantity: i64, user_coupon_id: Option<i64>) -> NewOrder {
        let product = f.db.products().get(f.product).await.unwrap();
        NewOrder {
            user_id: f.user,
            address_id: f.address,
            items: vec![snapshot_item(&product, None, quantity).unwrap()],
            freight: Money::from_cents(500),
            remark: String::new(),
            user_coupon_id,
        }
    }

    #[tokio::test]
    async fn test_create_order_snapshots_items_and_takes_stock() {
        let f = fixture().await;
        let repo = f.db.orders();

        let order = repo.create(new_order(&f, 2, None).await, noon()).await.unwrap();

        assert_eq!(order.order_no.len(), 18);
        assert!(order.order_no.starts_with("20240615120000"));
        assert_eq!(order.total_amount, Money::from_cents(12_000));
        assert_eq!(order.pay_amount, Money::from_cents(12_500));
        assert_eq!(order.order_status, OrderStatus::PendingPayment);

        let items = repo.items(order.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].product_name, "Kettle");

        // Renaming the product does not touch the snapshot.
        let mut renamed = product_input("Kettle v2", 1, 6_000);
        renamed.stock = 8;
        f.db.products().update(f.product, renamed).await.unwrap();
        assert_eq!(repo.items(order.id).await.unwrap()[0].product_name, "Kettle");

        assert_eq!(repo.get_by_no(&order.order_no).await.unwrap().id, order.id);
    }

    #[tokio::test]
    async fn test_insufficient_stock_rolls_back() {
        let f = fixture().await;
        let repo = f.db.orders();

        let mut order = new_order(&f, 2, None).await;
        order.items[0].quantity = 50;

        let err = repo.create(order, noon()).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock { .. })
        ));
        assert_eq!(f.db.products().get(f.product).await.unwrap().stock, 10);
        let (orders, total) = repo
            .list_by_user(f.user, None, PageRequest::default())
            .await
            .unwrap();
        assert!(orders.is_empty());
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn test_order_with_coupon_marks_it_used() {
        let f = fixture().await;
        let coupons = f.db.coupons();
        let coupon = coupons
            .create(coupon_input(CouponKind::FixedAmount, 1_500, 0))
            .await
            .unwrap();
        let claim = coupons.claim(f.user, coupon.id, noon()).await.unwrap();

        let order = f
            .db
            .orders()
            .create(new_order(&f, 2, Some(claim.id)).await, noon())
            .await
            .unwrap();

        assert_eq!(order.discount_amount, Money::from_cents(1_500));
        assert_eq!(order.pay_amount, Money::from_cents(11_000));

        let used = coupons
            .list_for_user(f.user, Some(UserCouponStatus::Used))
            .await
            .unwrap();
        assert_eq!(used.len(), 1);
        assert_eq!(used[0].order_id, Some(order.id));

        // Spending the same claim twice fails.
        let err = f
            .db
            .orders()
            .create(new_order(&f, 2, Some(claim.id)).await, noon())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::CouponUnavailable { .. })
        ));
    }

    #[tokio::test]
    async fn test_cancel_restores_stock_and_blocks_payment() {
        let f = fixture().await;
        let repo = f.db.orders();
        let order = repo.create(new_order(&f, 3, None).await, noon()).await.unwrap();
        assert_eq!(f.db.products().get(f.product).await.unwrap().stock, 7);

        let cancelled = repo
            .cancel(f.user, order.id, "changed my mind", noon())
            .await
            .unwrap();
        assert_eq!(cancelled.order_status, OrderStatus::Cancelled);
        assert_eq!(cancelled.cancel_reason, "changed my mind");

        let product = f.db.products().get(f.product).await.unwrap();
        assert_eq!(product.stock, 10);
        assert_eq!(product.sales, 0);

        assert!(matches!(
            repo.mark_paid(f.user, order.id, "card", noon()).await,
            Err(DbError::Domain(CoreError::InvalidOrderStatus { .. }))
        ));
        assert!(matches!(
            repo.cancel(f.user, order.id, "again", noon()).await,
            Err(DbError::Domain(CoreError::InvalidOrderStatus { .. }))
        ));
    }

    #[tokio::test]
    async fn test_mark_paid_and_list_by_status() {
        let f = fixture().await;
        let repo = f.db.orders();
        let first = repo.create(new_order(&f, 1, None).await, noon()).await.unwrap();
        repo.create(new_order(&f, 1, None).await, noon()).await.unwrap();

        let paid = repo.mark_paid(f.user, first.id, "card", noon()).await.unwrap();
        assert_eq!(paid.pay_status, PayStatus::Paid);
        assert_eq!(paid.order_status, OrderStatus::PendingShipment);
        assert_eq!(paid.payment_method, "card");

        let (pending, total) = repo
            .list_by_user(f.user, Some(OrderStatus::PendingPayment), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_ne!(pending[0].id, first.id);

        assert!(matches!(
            repo.get_for_user(f.user + 1, first.id).await,
            Err(DbError::NotFound { .. })
        ));
    }
}
