//! # Cart Repository
//!
//! Cart lines keyed by user / product / SKU. A partial unique index on
//! active rows guarantees one line per combination; adding an existing
//! combination merges the quantity.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use mall_core::cart::{merged_quantity, NO_SKU};
use mall_core::validation::validate_quantity;
use mall_core::{CartItem, CoreError};

const CART_COLUMNS: &str =
    "id, user_id, product_id, sku_id, quantity, selected, created_at, updated_at, deleted_at";

/// Repository for cart database operations.
#[derive(Debug, Clone)]
pub struct CartRepository {
    pool: SqlitePool,
}

impl CartRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CartRepository { pool }
    }

    /// The user's cart, oldest line first.
    pub async fn list(&self, user_id: i64) -> DbResult<Vec<CartItem>> {
        let items = sqlx::query_as::<_, CartItem>(&format!(
            "SELECT {CART_COLUMNS} FROM cart_items \
             WHERE user_id = ?1 AND deleted_at IS NULL ORDER BY id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(items)
    }

    /// Adds `quantity` of a product (and SKU, or [`NO_SKU`]) to the cart.
    ///
    /// ## Rules
    /// - The product must exist; a SKU must belong to it
    /// - An existing line for the same combination grows instead of
    ///   duplicating, and is re-selected
    pub async fn add(
        &self,
        user_id: i64,
        product_id: i64,
        sku_id: i64,
        quantity: i64,
    ) -> DbResult<CartItem> {
        validate_quantity(quantity).map_err(CoreError::from)?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let product: Option<i64> =
            sqlx::query_scalar("SELECT id FROM products WHERE id = ?1 AND deleted_at IS NULL")
                .bind(product_id)
                .fetch_optional(&mut *tx)
                .await?;
        if product.is_none() {
            return Err(DbError::not_found("Product", product_id));
        }

        if sku_id != NO_SKU {
            let sku: Option<i64> = sqlx::query_scalar(
                "SELECT id FROM product_skus \
                 WHERE id = ?1 AND product_id = ?2 AND deleted_at IS NULL",
            )
            .bind(sku_id)
            .bind(product_id)
            .fetch_optional(&mut *tx)
            .await?;
            if sku.is_none() {
                return Err(DbError::not_found("SKU", sku_id));
            }
        }

        let existing = sqlx::query_as::<_, CartItem>(&format!(
            "SELECT {CART_COLUMNS} FROM cart_items \
             WHERE user_id = ?1 AND product_id = ?2 AND sku_id = ?3 AND deleted_at IS NULL"
        ))
        .bind(user_id)
        .bind(product_id)
        .bind(sku_id)
        .fetch_optional(&mut *tx)
        .await?;

        let item = match existing {
            Some(line) => {
                let merged = merged_quantity(line.quantity, quantity).map_err(CoreError::from)?;
                sqlx::query_as::<_, CartItem>(&format!(
                    "UPDATE cart_items SET quantity = ?1, selected = 1, updated_at = ?2 \
                     WHERE id = ?3 RETURNING {CART_COLUMNS}"
                ))
                .bind(merged)
                .bind(now)
                .bind(line.id)
                .fetch_one(&mut *tx)
                .await?
            }
            None => {
                sqlx::query_as::<_, CartItem>(&format!(
                    "INSERT INTO cart_items \
                        (user_id, product_id, sku_id, quantity, selected, created_at, updated_at) \
                     VALUES (?1, ?2, ?3, ?4, 1, ?5, ?5) \
                     RETURNING {CART_COLUMNS}"
                ))
                .bind(user_id)
                .bind(product_id)
                .bind(sku_id)
                .bind(quantity)
                .bind(now)
                .fetch_one(&mut *tx)
                .await?
            }
        };

        tx.commit().await?;

        debug!(user_id, cart_item_id = item.id, quantity = item.quantity, "Cart line saved");
        Ok(item)
    }

    /// Sets a line's quantity.
    pub async fn update_quantity(&self, user_id: i64, id: i64, quantity: i64) -> DbResult<CartItem> {
        validate_quantity(quantity).map_err(CoreError::from)?;

        sqlx::query_as::<_, CartItem>(&format!(
            "UPDATE cart_items SET quantity = ?1, updated_at = ?2 \
             WHERE id = ?3 AND user_id = ?4 AND deleted_at IS NULL \
             RETURNING {CART_COLUMNS}"
        ))
        .bind(quantity)
        .bind(Utc::now())
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("CartItem", id))
    }

    /// Toggles whether a line is included at checkout.
    pub async fn set_selected(&self, user_id: i64, id: i64, selected: bool) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE cart_items SET selected = ?1, updated_at = ?2 \
             WHERE id = ?3 AND user_id = ?4 AND deleted_at IS NULL",
        )
        .bind(selected)
        .bind(Utc::now())
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("CartItem", id));
        }
        Ok(())
    }

    /// Selects or deselects every line. Returns the number of lines touched.
    pub async fn select_all(&self, user_id: i64, selected: bool) -> DbResult<u64> {
        let result = sqlx::query(
            "UPDATE cart_items SET selected = ?1, updated_at = ?2 \
             WHERE user_id = ?3 AND deleted_at IS NULL",
        )
        .bind(selected)
        .bind(Utc::now())
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Removes a line.
    pub async fn remove(&self, user_id: i64, id: i64) -> DbResult<()> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE cart_items SET deleted_at = ?1, updated_at = ?1 \
             WHERE id = ?2 AND user_id = ?3 AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("CartItem", id));
        }
        Ok(())
    }

    /// Removes the selected lines (after checkout).
    pub async fn clear_selected(&self, user_id: i64) -> DbResult<u64> {
        let now = Utc::now();
        let result = sqlx::query(
            "UPDATE cart_items SET deleted_at = ?1, updated_at = ?1 \
             WHERE user_id = ?2 AND selected = 1 AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
