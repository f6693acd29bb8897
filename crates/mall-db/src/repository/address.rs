//! # Address Repository
//!
//! Shipping addresses owned by a user.
//!
//! ## Default Address Invariant
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  At most one active address per user has is_default = 1.               │
//! │                                                                         │
//! │  BEGIN                                                                 │
//! │    UPDATE addresses SET is_default = 0 WHERE user_id = ? ...           │
//! │    INSERT / UPDATE the target row with is_default = 1                  │
//! │  COMMIT                                                                │
//! │                                                                         │
//! │  - A user's first address becomes the default                          │
//! │  - Deleting the default promotes the most recent remaining address     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every lookup is scoped by `user_id`; another user's address reads as
//! not found.

use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::debug;

use crate::error::{DbError, DbResult};
use mall_core::Address;

const ADDRESS_COLUMNS: &str = "id, user_id, name, phone, province, city, district, detail, \
     postcode, tag, is_default, created_at, updated_at, deleted_at";

/// Address fields supplied on create and update.
#[derive(Debug, Clone, Default)]
pub struct AddressInput {
    pub name: String,
    pub phone: String,
    pub province: String,
    pub city: String,
    pub district: String,
    pub detail: String,
    pub postcode: String,
    pub tag: String,
    pub is_default: bool,
}

/// Repository for address database operations.
#[derive(Debug, Clone)]
pub struct AddressRepository {
    pool: SqlitePool,
}

impl AddressRepository {
    pub fn new(pool: SqlitePool) -> Self {
        AddressRepository { pool }
    }

    /// Lists a user's addresses, default first, then newest.
    pub async fn list_by_user(&self, user_id: i64) -> DbResult<Vec<Address>> {
        let addresses = sqlx::query_as::<_, Address>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM addresses \
             WHERE user_id = ?1 AND deleted_at IS NULL \
             ORDER BY is_default DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(addresses)
    }

    /// Gets one of the user's addresses.
    pub async fn get_for_user(&self, user_id: i64, id: i64) -> DbResult<Address> {
        sqlx::query_as::<_, Address>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM addresses \
             WHERE id = ?1 AND user_id = ?2 AND deleted_at IS NULL"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Address", id))
    }

    /// The user's default address, if any.
    pub async fn default_for_user(&self, user_id: i64) -> DbResult<Option<Address>> {
        let address = sqlx::query_as::<_, Address>(&format!(
            "SELECT {ADDRESS_COLUMNS} FROM addresses \
             WHERE user_id = ?1 AND is_default = 1 AND deleted_at IS NULL"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(address)
    }

    /// Creates an address. The user's first address is always the default.
    pub async fn create(&self, user_id: i64, input: AddressInput) -> DbResult<Address> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let existing: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM addresses WHERE user_id = ?1 AND deleted_at IS NULL",
        )
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        let is_default = input.is_default || existing == 0;
        if is_default {
            clear_default(&mut tx, user_id, None).await?;
        }

        let address = sqlx::query_as::<_, Address>(&format!(
            "INSERT INTO addresses \
                (user_id, name, phone, province, city, district, detail, postcode, tag, \
                 is_default, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11) \
             RETURNING {ADDRESS_COLUMNS}"
        ))
        .bind(user_id)
        .bind(&input.name)
        .bind(&input.phone)
        .bind(&input.province)
        .bind(&input.city)
        .bind(&input.district)
        .bind(&input.detail)
        .bind(&input.postcode)
        .bind(&input.tag)
        .bind(is_default)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(user_id, address_id = address.id, is_default, "Address created");
        Ok(address)
    }

    /// Replaces an address's fields.
    ///
    /// Unsetting the flag on the current default is ignored so the user
    /// keeps a default; use [`set_default`](Self::set_default) on another
    /// address instead.
    pub async fn update(&self, user_id: i64, id: i64, input: AddressInput) -> DbResult<Address> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let currently_default: Option<bool> = sqlx::query_scalar(
            "SELECT is_default FROM addresses \
             WHERE id = ?1 AND user_id = ?2 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let currently_default =
            currently_default.ok_or_else(|| DbError::not_found("Address", id))?;
        let is_default = input.is_default || currently_default;

        if is_default {
            clear_default(&mut tx, user_id, Some(id)).await?;
        }

        let address = sqlx::query_as::<_, Address>(&format!(
            "UPDATE addresses SET \
                name = ?1, phone = ?2, province = ?3, city = ?4, district = ?5, \
                detail = ?6, postcode = ?7, tag = ?8, is_default = ?9, updated_at = ?10 \
             WHERE id = ?11 AND user_id = ?12 AND deleted_at IS NULL \
             RETURNING {ADDRESS_COLUMNS}"
        ))
        .bind(&input.name)
        .bind(&input.phone)
        .bind(&input.province)
        .bind(&input.city)
        .bind(&input.district)
        .bind(&input.detail)
        .bind(&input.postcode)
        .bind(&input.tag)
        .bind(is_default)
        .bind(now)
        .bind(id)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(user_id, address_id = id, "Address updated");
        Ok(address)
    }

    /// Makes `id` the user's only default address.
    pub async fn set_default(&self, user_id: i64, id: i64) -> DbResult<Address> {
        let mut tx = self.pool.begin().await?;

        clear_default(&mut tx, user_id, Some(id)).await?;

        let address = sqlx::query_as::<_, Address>(&format!(
            "UPDATE addresses SET is_default = 1, updated_at = ?1 \
             WHERE id = ?2 AND user_id = ?3 AND deleted_at IS NULL \
             RETURNING {ADDRESS_COLUMNS}"
        ))
        .bind(Utc::now())
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        // Dropping the transaction rolls back the cleared flags.
        let address = address.ok_or_else(|| DbError::not_found("Address", id))?;
        tx.commit().await?;

        debug!(user_id, address_id = id, "Default address set");
        Ok(address)
    }

    /// Soft-deletes an address.
    ///
    /// When the default is removed, the newest remaining address inherits
    /// the flag.
    pub async fn delete(&self, user_id: i64, id: i64) -> DbResult<()> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let was_default: Option<bool> = sqlx::query_scalar(
            "UPDATE addresses SET deleted_at = ?1, updated_at = ?1 \
             WHERE id = ?2 AND user_id = ?3 AND deleted_at IS NULL \
             RETURNING is_default",
        )
        .bind(now)
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let was_default = was_default.ok_or_else(|| DbError::not_found("Address", id))?;

        if was_default {
            sqlx::query("UPDATE addresses SET is_default = 0 WHERE id = ?1")
                .bind(id)
                .execute(&mut *tx)
                .await?;

            sqlx::query(
                "UPDATE addresses SET is_default = 1, updated_at = ?1 \
                 WHERE id = ( \
                    SELECT id FROM addresses \
                    WHERE user_id = ?2 AND deleted_at IS NULL \
                    ORDER BY id DESC LIMIT 1)",
            )
            .bind(now)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        debug!(user_id, address_id = id, "Address deleted");
        Ok(())
    }
}

/// Clears the default flag on the user's active addresses, except `keep`.
async fn clear_default(
    tx: &mut Transaction<'_, Sqlite>,
    user_id: i64,
    keep: Option<i64>,
) -> DbResult<()> {
    sqlx::query(
        "UPDATE addresses SET is_default = 0 \
         WHERE user_id = ?1 AND id != ?2 AND is_default = 1 AND deleted_at IS NULL",
    )
    .bind(user_id)
    .bind(keep.unwrap_or(0))
    .execute(&mut **tx)
    .await?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
