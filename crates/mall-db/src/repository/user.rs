//! # User Repository
//!
//! Account storage: registration, login lookup, profile and password
//! updates. Users are never hard-deleted.
//!
//! ## Login Lookup
//! ```text
//! identifier ──► username = ?  OR  phone = ?  OR  email = ?
//!                     (first active match wins)
//! ```

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use mall_core::{Role, User, UserStatus};

const USER_COLUMNS: &str = "id, username, password_hash, nickname, phone, email, avatar, \
     role, status, last_login_at, created_at, updated_at, deleted_at";

/// Columns that must be unique across users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueUserField {
    Username,
    Phone,
    Email,
}

impl UniqueUserField {
    pub fn column(&self) -> &'static str {
        match self {
            UniqueUserField::Username => "username",
            UniqueUserField::Phone => "phone",
            UniqueUserField::Email => "email",
        }
    }
}

/// Input for [`UserRepository::create`].
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub nickname: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub role: Role,
}

/// Editable profile fields.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub nickname: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub avatar: Option<String>,
}

/// Repository for user database operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    /// Inserts an active user.
    ///
    /// A race on a unique column surfaces as `DbError::UniqueViolation`.
    pub async fn create(&self, user: NewUser) -> DbResult<User> {
        let now = Utc::now();

        let created = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users \
                (username, password_hash, nickname, phone, email, role, status, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.username)
        .bind(&user.password_hash)
        .bind(&user.nickname)
        .bind(&user.phone)
        .bind(&user.email)
        .bind(user.role)
        .bind(UserStatus::Active)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        debug!(user_id = created.id, username = %created.username, "User created");
        Ok(created)
    }

    /// Gets an active user by id.
    pub async fn find_by_id(&self, id: i64) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = ?1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Like [`find_by_id`](Self::find_by_id) but missing users are an error.
    pub async fn get(&self, id: i64) -> DbResult<User> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("User", id))
    }

    /// Finds a user by username, phone or email.
    pub async fn find_by_login(&self, identifier: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users \
             WHERE (username = ?1 OR phone = ?1 OR email = ?1) AND deleted_at IS NULL \
             ORDER BY id LIMIT 1"
        ))
        .bind(identifier)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    /// Checks whether `value` is already used in `field`, optionally
    /// ignoring the user `except_id` (for profile edits).
    pub async fn is_taken(
        &self,
        field: UniqueUserField,
        value: &str,
        except_id: Option<i64>,
    ) -> DbResult<bool> {
        // Soft-deleted users keep their unique values.
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM users WHERE {} = ?1 AND id != ?2",
            field.column()
        ))
        .bind(value)
        .bind(except_id.unwrap_or(0))
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    /// Records a successful login.
    pub async fn touch_last_login(&self, id: i64, at: DateTime<Utc>) -> DbResult<()> {
        sqlx::query("UPDATE users SET last_login_at = ?1 WHERE id = ?2")
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Applies the provided profile fields; `None` leaves a field untouched.
    /// An empty phone or email clears it.
    pub async fn update_profile(&self, id: i64, update: ProfileUpdate) -> DbResult<User> {
        let current = self.get(id).await?;

        let nickname = update.nickname.unwrap_or(current.nickname);
        let avatar = update.avatar.unwrap_or(current.avatar);
        let phone = match update.phone {
            Some(phone) if phone.is_empty() => None,
            Some(phone) => Some(phone),
            None => current.phone,
        };
        let email = match update.email {
            Some(email) if email.is_empty() => None,
            Some(email) => Some(email),
            None => current.email,
        };

        let updated = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET nickname = ?1, phone = ?2, email = ?3, avatar = ?4, updated_at = ?5 \
             WHERE id = ?6 AND deleted_at IS NULL \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(nickname)
        .bind(phone)
        .bind(email)
        .bind(avatar)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("User", id))?;

        debug!(user_id = id, "Profile updated");
        Ok(updated)
    }

    /// Replaces the stored password hash.
    pub async fn update_password(&self, id: i64, password_hash: &str) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = ?1, updated_at = ?2 \
             WHERE id = ?3 AND deleted_at IS NULL",
        )
        .bind(password_hash)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }
        Ok(())
    }

    /// Enables or disables an account.
    pub async fn set_status(&self, id: i64, status: UserStatus) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE users SET status = ?1, updated_at = ?2 WHERE id = ?3 AND deleted_at IS NULL",
        )
        .bind(status)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("User", id));
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_db;

    fn new_user(username: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            password_hash: "hash".to_string(),
            nickname: String::new(),
            phone: None,
            email: None,
            role: Role::User,
        }
    }

    #[tokio::test]
    async fn test_create_and_login_lookup() {
        let db = test_db().await;
        let repo = db.users();

        let mut input = new_user("alice");
        input.phone = Some("13800000000".to_string());
        input.email = Some("alice@example.com".to_string());
        let user = repo.create(input).await.unwrap();

        assert_eq!(user.role, Role::User);
        assert_eq!(user.status, UserStatus::Active);
        assert!(user.state.is_active());

        for identifier in ["alice", "13800000000", "alice@example.com"] {
            let found = repo.find_by_login(identifier).await.unwrap().unwrap();
            assert_eq!(found.id, user.id);
        }
        assert!(repo.find_by_login("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_is_unique_violation() {
        let db = test_db().await;
        let repo = db.users();

        repo.create(new_user("alice")).await.unwrap();
        let err = repo.create(new_user("alice")).await.unwrap_err();
        assert!(err.is_unique_violation_on("username"));
    }

    #[tokio::test]
    async fn test_is_taken_excludes_self() {
        let db = test_db().await;
        let repo = db.users();

        let mut input = new_user("alice");
        input.email = Some("a@example.com".to_string());
        let alice = repo.create(input).await.unwrap();

        let field = UniqueUserField::Email;
        assert!(repo.is_taken(field, "a@example.com", None).await.unwrap());
        assert!(!repo
            .is_taken(field, "a@example.com", Some(alice.id))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_update_profile_and_password() {
        let db = test_db().await;
        let repo = db.users();
        let user = repo.create(new_user("carol")).await.unwrap();

        let updated = repo
            .update_profile(
                user.id,
                ProfileUpdate {
                    nickname: Some("Caz".to_string()),
                    email: Some("c@example.com".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.nickname, "Caz");
        assert_eq!(updated.email.as_deref(), Some("c@example.com"));
        assert_eq!(updated.phone, None);

        repo.update_password(user.id, "new-hash").await.unwrap();
        assert_eq!(repo.get(user.id).await.unwrap().password_hash, "new-hash");

        assert!(matches!(
            repo.update_password(999, "x").await,
            Err(DbError::NotFound { .. })
        ));
    }
}
