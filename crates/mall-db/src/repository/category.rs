//! # Category Repository
//!
//! Storage for the self-referential category hierarchy.
//!
//! ## Hierarchy Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  parent_id = 0            → root, level 1                              │
//! │  parent_id = p            → p must exist, level = p.level + 1          │
//! │  re-parent under self     → refused                                    │
//! │  re-parent under subtree  → refused (would create a cycle)             │
//! │  delete with children     → refused                                    │
//! │  delete with products     → refused                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Tree assembly happens in [`mall_core::category_tree`]; this module only
//! returns flat, ordered rows.

use chrono::Utc;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::debug;

use crate::error::{DbError, DbResult};
use mall_core::category_tree::is_in_subtree;
use mall_core::types::child_level;
use mall_core::{Category, CategoryStatus, CoreError, ROOT_CATEGORY_ID};

const CATEGORY_COLUMNS: &str =
    "id, name, parent_id, level, sort, status, created_at, updated_at, deleted_at";

/// Fields supplied when creating or editing a category.
#[derive(Debug, Clone)]
pub struct CategoryInput {
    pub name: String,
    pub parent_id: i64,
    pub sort: i32,
    pub status: CategoryStatus,
}

/// Repository for category database operations.
#[derive(Debug, Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
}

impl CategoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CategoryRepository { pool }
    }

    /// All active categories ordered by `sort`, then `id`.
    ///
    /// Hidden categories are included only when `include_hidden` is set.
    pub async fn list_all(&self, include_hidden: bool) -> DbResult<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories \
             WHERE deleted_at IS NULL AND (?1 OR status = 'visible') \
             ORDER BY sort ASC, id ASC"
        ))
        .bind(include_hidden)
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    /// Direct children of `parent_id`.
    pub async fn children(&self, parent_id: i64, include_hidden: bool) -> DbResult<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories \
             WHERE parent_id = ?1 AND deleted_at IS NULL AND (?2 OR status = 'visible') \
             ORDER BY sort ASC, id ASC"
        ))
        .bind(parent_id)
        .bind(include_hidden)
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    pub async fn find(&self, id: i64) -> DbResult<Option<Category>> {
        let category = sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = ?1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(category)
    }

    pub async fn get(&self, id: i64) -> DbResult<Category> {
        self.find(id)
            .await?
            .ok_or_else(|| DbError::not_found("Category", id))
    }

    /// Creates a category under `input.parent_id`.
    pub async fn create(&self, input: CategoryInput) -> DbResult<Category> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let level = level_under(&mut tx, input.parent_id).await?;

        let category = sqlx::query_as::<_, Category>(&format!(
            "INSERT INTO categories (name, parent_id, level, sort, status, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6) \
             RETURNING {CATEGORY_COLUMNS}"
        ))
        .bind(&input.name)
        .bind(input.parent_id)
        .bind(level)
        .bind(input.sort)
        .bind(input.status)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        debug!(category_id = category.id, parent_id = category.parent_id, "Category created");
        Ok(category)
    }

    /// Updates a category, re-leveling its subtree when the parent changes.
    pub async fn update(&self, id: i64, input: CategoryInput) -> DbResult<Category> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, Category>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = ?1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("Category", id))?;

        let reparented = current.parent_id != input.parent_id;
        let level = if reparented {
            let all = sqlx::query_as::<_, Category>(&format!(
                "SELECT {CATEGORY_COLUMNS} FROM categories WHERE deleted_at IS NULL"
            ))
            .fetch_all(&mut *tx)
            .await?;

            if input.parent_id != ROOT_CATEGORY_ID && is_in_subtree(&all, id, input.parent_id) {
                return Err(CoreError::InvalidHierarchy {
                    reason: "a category cannot be moved under itself or its descendants"
                        .to_string(),
                }
                .into());
            }
            level_under(&mut tx, input.parent_id).await?
        } else {
            current.level
        };

        let category = sqlx::query_as::<_, Category>(&format!(
            "UPDATE categories SET name = ?1, parent_id = ?2, level = ?3, sort = ?4, \
                status = ?5, updated_at = ?6 \
             WHERE id = ?7 \
             RETURNING {CATEGORY_COLUMNS}"
        ))
        .bind(&input.name)
        .bind(input.parent_id)
        .bind(level)
        .bind(input.sort)
        .bind(input.status)
        .bind(now)
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        if level != current.level {
            // Descendants follow their ancestor's new depth.
            sqlx::query(
                "WITH RECURSIVE subtree(id, level) AS ( \
                    SELECT id, level FROM categories WHERE id = ?1 \
                    UNION ALL \
                    SELECT c.id, subtree.level + 1 FROM categories c \
                    JOIN subtree ON c.parent_id = subtree.id \
                    WHERE c.deleted_at IS NULL \
                 ) \
                 UPDATE categories \
                 SET level = (SELECT level FROM subtree WHERE subtree.id = categories.id) \
                 WHERE id IN (SELECT id FROM subtree WHERE id != ?1)",
            )
            .bind(id)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        debug!(category_id = id, reparented, "Category updated");
        Ok(category)
    }

    /// Shows or hides a category.
    pub async fn set_status(&self, id: i64, status: CategoryStatus) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE categories SET status = ?1, updated_at = ?2 \
             WHERE id = ?3 AND deleted_at IS NULL",
        )
        .bind(status)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Category", id));
        }
        Ok(())
    }

    /// Soft-deletes a leaf category that no product references.
    ///
    /// The dependency checks and the delete share one transaction.
    pub async fn delete(&self, id: i64) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<i64> =
            sqlx::query_scalar("SELECT id FROM categories WHERE id = ?1 AND deleted_at IS NULL")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        if exists.is_none() {
            return Err(DbError::not_found("Category", id));
        }

        let children: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM categories WHERE parent_id = ?1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if children > 0 {
            return Err(DbError::Conflict(
                "category has subcategories, remove them first".to_string(),
            ));
        }

        let products: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM products WHERE category_id = ?1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;
        if products > 0 {
            return Err(DbError::Conflict(
                "category still has products, move or delete them first".to_string(),
            ));
        }

        let now = Utc::now();
        sqlx::query("UPDATE categories SET deleted_at = ?1, updated_at = ?1 WHERE id = ?2")
            .bind(now)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(category_id = id, "Category deleted");
        Ok(())
    }
}

/// Level for a category placed under `parent_id`; the parent must exist.
async fn level_under(tx: &mut Transaction<'_, Sqlite>, parent_id: i64) -> DbResult<i32> {
    if parent_id == ROOT_CATEGORY_ID {
        return Ok(child_level(None));
    }

    let parent_level: Option<i32> =
        sqlx::query_scalar("SELECT level FROM categories WHERE id = ?1 AND deleted_at IS NULL")
            .bind(parent_id)
            .fetch_optional(&mut **tx)
            .await?;

    match parent_level {
        Some(level) => Ok(child_level(Some(level))),
        None => Err(CoreError::InvalidHierarchy {
            reason: format!("parent category {parent_id} does not exist"),
        }
        .into()),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
