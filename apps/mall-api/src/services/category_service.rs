//! Category browsing and administration.
//!
//! The storefront tree (visible categories, orphans dropped) is served
//! from the cache when one is configured; every admin write invalidates it.

use mall_core::validation::validate_category_name;
use mall_core::{
    build_tree, Category, CategoryNode, CategoryStatus, CategoryTree, OrphanPolicy,
    ROOT_CATEGORY_ID,
};
use mall_db::{CategoryInput, CategoryRepository};
use serde::Deserialize;
use tracing::{info, warn};

use crate::cache::CategoryCache;
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Deserialize)]
pub struct CategoryRequest {
    pub name: String,
    #[serde(default)]
    pub parent_id: i64,
    #[serde(default)]
    pub sort: i32,
    #[serde(default)]
    pub status: CategoryStatus,
}

impl CategoryRequest {
    fn into_input(self) -> ApiResult<CategoryInput> {
        let name = self.name.trim().to_string();
        validate_category_name(&name)?;
        if self.parent_id < ROOT_CATEGORY_ID {
            return Err(ApiError::validation("parent_id must not be negative"));
        }

        Ok(CategoryInput {
            name,
            parent_id: self.parent_id,
            sort: self.sort,
            status: self.status,
        })
    }
}

#[derive(Clone)]
pub struct CategoryService {
    categories: CategoryRepository,
    cache: CategoryCache,
}

impl CategoryService {
    pub fn new(categories: CategoryRepository, cache: CategoryCache) -> Self {
        CategoryService { categories, cache }
    }

    /// Flat list ordered by sort then id.
    pub async fn list(&self, include_hidden: bool) -> ApiResult<Vec<Category>> {
        Ok(self.categories.list_all(include_hidden).await?)
    }

    /// The storefront tree.
    pub async fn tree(&self) -> ApiResult<Vec<CategoryNode>> {
        if let Some(tree) = self.cache.get_tree().await {
            return Ok(tree);
        }

        let tree = self.build(OrphanPolicy::Drop, false).await?;
        self.cache.put_tree(&tree.roots).await;
        Ok(tree.roots)
    }

    /// Full tree for administrators, including hidden categories and the
    /// list of orphaned ids.
    pub async fn admin_tree(&self, policy: OrphanPolicy) -> ApiResult<CategoryTree> {
        self.build(policy, true).await
    }

    async fn build(&self, policy: OrphanPolicy, include_hidden: bool) -> ApiResult<CategoryTree> {
        // Hidden parents must be present while building or their children
        // would be reported as orphans.
        let categories = self.categories.list_all(true).await?;
        let mut tree = build_tree(categories, policy);
        if !include_hidden {
            tree = tree.without_hidden();
        }

        if !tree.orphans.is_empty() {
            warn!(orphans = ?tree.orphans, ?policy, "Categories with missing parents");
        }
        Ok(tree)
    }

    /// Hidden categories are reported as missing unless `include_hidden`.
    pub async fn get(&self, id: i64, include_hidden: bool) -> ApiResult<Category> {
        let category = self.categories.get(id).await?;
        if !include_hidden && category.status == CategoryStatus::Hidden {
            return Err(ApiError::NotFound(format!("Category not found: {id}")));
        }
        Ok(category)
    }

    pub async fn children(&self, id: i64, include_hidden: bool) -> ApiResult<Vec<Category>> {
        if id != ROOT_CATEGORY_ID {
            self.get(id, include_hidden).await?;
        }
        Ok(self.categories.children(id, include_hidden).await?)
    }

    pub async fn create(&self, req: CategoryRequest) -> ApiResult<Category> {
        let category = self.categories.create(req.into_input()?).await?;
        self.cache.invalidate_tree().await;

        info!(category_id = category.id, name = %category.name, "Category created");
        Ok(category)
    }

    pub async fn update(&self, id: i64, req: CategoryRequest) -> ApiResult<Category> {
        let category = self.categories.update(id, req.into_input()?).await?;
        self.cache.invalidate_tree().await;

        info!(category_id = id, "Category updated");
        Ok(category)
    }

    pub async fn set_status(&self, id: i64, status: CategoryStatus) -> ApiResult<()> {
        self.categories.set_status(id, status).await?;
        self.cache.invalidate_tree().await;

        info!(category_id = id, ?status, "Category status changed");
        Ok(())
    }

    pub async fn delete(&self, id: i64) -> ApiResult<()> {
        self.categories.delete(id).await?;
        self.cache.invalidate_tree().await;

        info!(category_id = id, "Category deleted");
        Ok(())
    }
}
