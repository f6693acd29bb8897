//! # Coupon Repository
//!
//! Coupon templates and the per-user claims made from them.
//!
//! ## Claim Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  claim(user, coupon, now)                                              │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BEGIN                                                                 │
//! │    load coupon ─► disabled / outside window ─► CouponUnavailable       │
//! │    UPDATE coupons SET used_count = used_count + 1                      │
//! │      WHERE id = ? AND (stock = 0 OR used_count < stock)                │
//! │      rows_affected = 0 ─► CouponExhausted                              │
//! │    INSERT user_coupons (status = unused)                               │
//! │  COMMIT                                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `used_count` counts claims, so the guarded increment is what keeps a
//! bounded coupon from being over-issued under concurrent claims.

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use mall_core::coupon::parse_coupon_time;
use mall_core::{
    CoreError, Coupon, CouponKind, CouponStatus, Money, UserCoupon, UserCouponStatus,
    ValidationError,
};

const COUPON_COLUMNS: &str = "id, name, kind, value, min_amount, start_time, end_time, \
     stock, used_count, status, created_at, updated_at, deleted_at";

const USER_COUPON_COLUMNS: &str =
    "id, user_id, coupon_id, order_id, status, used_at, created_at, updated_at, deleted_at";

/// Coupon template fields supplied on create.
#[derive(Debug, Clone)]
pub struct CouponInput {
    pub name: String,
    pub kind: CouponKind,
    /// Cents for fixed-amount coupons, pay-rate basis points for percentage.
    pub value: i64,
    pub min_amount: Money,
    pub start_time: String,
    pub end_time: String,
    /// `0` = unbounded.
    pub stock: i64,
    pub status: CouponStatus,
}

impl CouponInput {
    /// Rejects configurations the evaluator would silently treat as invalid.
    fn validate(&self) -> Result<(), CoreError> {
        let start = parse_coupon_time("start_time", &self.start_time)?;
        let end = parse_coupon_time("end_time", &self.end_time)?;
        if start > end {
            return Err(CoreError::InvalidCouponWindow {
                reason: "start_time must not be after end_time".to_string(),
            });
        }

        if self.stock < 0 {
            return Err(ValidationError::Negative {
                field: "stock".to_string(),
            }
            .into());
        }
        if self.min_amount.is_negative() {
            return Err(ValidationError::Negative {
                field: "min_amount".to_string(),
            }
            .into());
        }

        match self.kind {
            CouponKind::FixedAmount if self.value <= 0 => Err(ValidationError::OutOfRange {
                field: "value".to_string(),
                min: 1,
                max: i64::MAX,
            }
            .into()),
            CouponKind::Percentage if self.value <= 0 || self.value >= 10_000 => {
                Err(ValidationError::OutOfRange {
                    field: "value".to_string(),
                    min: 1,
                    max: 9_999,
                }
                .into())
            }
            _ => Ok(()),
        }
    }
}

/// Repository for coupon database operations.
#[derive(Debug, Clone)]
pub struct CouponRepository {
    pool: SqlitePool,
}

impl CouponRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CouponRepository { pool }
    }

    /// Creates a coupon template after validating its window and value.
    pub async fn create(&self, input: CouponInput) -> DbResult<Coupon> {
        input.validate()?;

        let coupon = sqlx::query_as::<_, Coupon>(&format!(
            "INSERT INTO coupons \
                (name, kind, value, min_amount, start_time, end_time, stock, status, \
                 created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9) \
             RETURNING {COUPON_COLUMNS}"
        ))
        .bind(&input.name)
        .bind(input.kind)
        .bind(input.value)
        .bind(input.min_amount)
        .bind(input.start_time.trim())
        .bind(input.end_time.trim())
        .bind(input.stock)
        .bind(input.status)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        info!(coupon_id = coupon.id, name = %coupon.name, "Coupon created");
        Ok(coupon)
    }

    pub async fn get(&self, id: i64) -> DbResult<Coupon> {
        sqlx::query_as::<_, Coupon>(&format!(
            "SELECT {COUPON_COLUMNS} FROM coupons WHERE id = ?1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("Coupon", id))
    }

    /// Coupons that can be claimed at `now`.
    pub async fn list_available(&self, now: DateTime<Utc>) -> DbResult<Vec<Coupon>> {
        let coupons = sqlx::query_as::<_, Coupon>(&format!(
            "SELECT {COUPON_COLUMNS} FROM coupons \
             WHERE status = 'enabled' AND deleted_at IS NULL ORDER BY id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(coupons.into_iter().filter(|c| c.is_valid(now)).collect())
    }

    /// Claims one unit of a coupon for a user.
    pub async fn claim(
        &self,
        user_id: i64,
        coupon_id: i64,
        now: DateTime<Utc>,
    ) -> DbResult<UserCoupon> {
        let mut tx = self.pool.begin().await?;

        let coupon = sqlx::query_as::<_, Coupon>(&format!(
            "SELECT {COUPON_COLUMNS} FROM coupons WHERE id = ?1 AND deleted_at IS NULL"
        ))
        .bind(coupon_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("Coupon", coupon_id))?;

        if coupon.is_exhausted() {
            return Err(CoreError::CouponExhausted { coupon_id }.into());
        }
        if !coupon.is_valid(now) {
            return Err(CoreError::CouponUnavailable { coupon_id }.into());
        }

        let claimed = sqlx::query(
            "UPDATE coupons SET used_count = used_count + 1, updated_at = ?1 \
             WHERE id = ?2 AND (stock = 0 OR used_count < stock)",
        )
        .bind(now)
        .bind(coupon_id)
        .execute(&mut *tx)
        .await?;
        if claimed.rows_affected() == 0 {
            return Err(CoreError::CouponExhausted { coupon_id }.into());
        }

        let user_coupon = sqlx::query_as::<_, UserCoupon>(&format!(
            "INSERT INTO user_coupons (user_id, coupon_id, status, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?4) \
             RETURNING {USER_COUPON_COLUMNS}"
        ))
        .bind(user_id)
        .bind(coupon_id)
        .bind(UserCouponStatus::Unused)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(user_id, coupon_id, user_coupon_id = user_coupon.id, "Coupon claimed");
        Ok(user_coupon)
    }

    /// A user's claimed coupons, newest first, optionally by status.
    pub async fn list_for_user(
        &self,
        user_id: i64,
        status: Option<UserCouponStatus>,
    ) -> DbResult<Vec<UserCoupon>> {
        let coupons = sqlx::query_as::<_, UserCoupon>(&format!(
            "SELECT {USER_COUPON_COLUMNS} FROM user_coupons \
             WHERE user_id = ?1 AND (?2 IS NULL OR status = ?2) AND deleted_at IS NULL \
             ORDER BY id DESC"
        ))
        .bind(user_id)
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        Ok(coupons)
    }

    /// One of the user's claimed coupons with its template.
    pub async fn get_for_user(&self, user_id: i64, id: i64) -> DbResult<(UserCoupon, Coupon)> {
        let user_coupon = sqlx::query_as::<_, UserCoupon>(&format!(
            "SELECT {USER_COUPON_COLUMNS} FROM user_coupons \
             WHERE id = ?1 AND user_id = ?2 AND deleted_at IS NULL"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("UserCoupon", id))?;

        let coupon = self.get(user_coupon.coupon_id).await?;
        Ok((user_coupon, coupon))
    }

    /// Marks a claimed coupon as spent on `order_id`.
    pub async fn mark_used(&self, user_id: i64, id: i64, order_id: i64) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        mark_used_in(&mut tx, user_id, id, order_id).await?;
        tx.commit().await?;
        Ok(())
    }
}

/// Flips an unused claim to used inside a caller's transaction.
pub(crate) async fn mark_used_in(
    tx: &mut Transaction<'_, Sqlite>,
    user_id: i64,
    user_coupon_id: i64,
    order_id: i64,
) -> DbResult<()> {
    let now = Utc::now();
    let result = sqlx::query(
        "UPDATE user_coupons SET status = 'used', order_id = ?1, used_at = ?2, updated_at = ?2 \
         WHERE id = ?3 AND user_id = ?4 AND status = 'unused' AND deleted_at IS NULL",
    )
    .bind(order_id)
    .bind(now)
    .bind(user_coupon_id)
    .bind(user_id)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("UserCoupon (unused)", user_coupon_id));
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::repository::test_db;
    use crate::repository::user::NewUser;
    use crate::Database;
    use chrono::TimeZone;
    use mall_core::Role;

    pub(crate) fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    pub(crate) fn coupon_input(kind: CouponKind, value: i64, stock: i64) -> CouponInput {
        CouponInput {
            name: "Summer".to_string(),
            kind,
            value,
            min_amount: Money::from_cents(10_000),
            start_time: "2024-06-01 00:00:00".to_string(),
            end_time: "2024-06-30 23:59:59".to_string(),
            stock,
            status: CouponStatus::Enabled,
        }
    }

    async fn seed_user(db: &Database, username: &str) -> i64 {
        db.users()
            .create(NewUser {
                username: username.to_string(),
                password_hash: "hash".to_string(),
                nickname: String::new(),
                phone: None,
                email: None,
                role: Role::User,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_create_rejects_bad_window_and_rate() {
        let db = test_db().await;
        let repo = db.coupons();

        let mut unparsable = coupon_input(CouponKind::FixedAmount, 1_500, 0);
        unparsable.start_time = "June 1st".to_string();
        assert!(matches!(
            repo.create(unparsable).await,
            Err(DbError::Domain(CoreError::InvalidCouponWindow { .. }))
        ));

        let mut inverted = coupon_input(CouponKind::FixedAmount, 1_500, 0);
        inverted.end_time = "2024-05-01 00:00:00".to_string();
        assert!(matches!(
            repo.create(inverted).await,
            Err(DbError::Domain(CoreError::InvalidCouponWindow { .. }))
        ));

        assert!(matches!(
            repo.create(coupon_input(CouponKind::Percentage, 10_000, 0)).await,
            Err(DbError::Domain(CoreError::Validation(_)))
        ));

        let ok = repo
            .create(coupon_input(CouponKind::Percentage, 8_000, 0))
            .await
            .unwrap();
        assert_eq!(ok.display_text(), "20% off");
    }

    #[tokio::test]
    async fn test_claim_respects_stock() {
        let db = test_db().await;
        let alice = seed_user(&db, "alice").await;
        let bob = seed_user(&db, "bob").await;
        let repo = db.coupons();

        let coupon = repo
            .create(coupon_input(CouponKind::FixedAmount, 1_500, 1))
            .await
            .unwrap();

        let claim = repo.claim(alice, coupon.id, noon()).await.unwrap();
        assert_eq!(claim.status, UserCouponStatus::Unused);
        assert_eq!(repo.get(coupon.id).await.unwrap().used_count, 1);

        assert!(matches!(
            repo.claim(bob, coupon.id, noon()).await,
            Err(DbError::Domain(CoreError::CouponExhausted { .. }))
        ));
        assert!(repo.list_available(noon()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_claim_outside_window_is_unavailable() {
        let db = test_db().await;
        let user = seed_user(&db, "alice").await;
        let repo = db.coupons();
        let coupon = repo
            .create(coupon_input(CouponKind::FixedAmount, 1_500, 0))
            .await
            .unwrap();

        let later = Utc.with_ymd_and_hms(2024, 7, 2, 0, 0, 0).unwrap();
        assert!(matches!(
            repo.claim(user, coupon.id, later).await,
            Err(DbError::Domain(CoreError::CouponUnavailable { .. }))
        ));
        assert_eq!(repo.list_available(noon()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_list_for_user_by_status() {
        let db = test_db().await;
        let user = seed_user(&db, "alice").await;
        let repo = db.coupons();
        let coupon = repo
            .create(coupon_input(CouponKind::FixedAmount, 1_500, 0))
            .await
            .unwrap();

        let first = repo.claim(user, coupon.id, noon()).await.unwrap();
        repo.claim(user, coupon.id, noon()).await.unwrap();

        let all = repo.list_for_user(user, None).await.unwrap();
        assert_eq!(all.len(), 2);

        let unused = repo
            .list_for_user(user, Some(UserCouponStatus::Unused))
            .await
            .unwrap();
        assert_eq!(unused.len(), 2);

        let (claimed, template) = repo.get_for_user(user, first.id).await.unwrap();
        assert_eq!(claimed.id, first.id);
        assert_eq!(template.id, coupon.id);
        assert!(repo.get_for_user(user + 1, first.id).await.is_err());
    }
}
