//! # Product Repository
//!
//! Database operations for products and their SKUs.
//!
//! ## Key Operations
//! - Filtered, sorted, paginated listing
//! - Hot / new shelves
//! - CRUD with soft delete
//! - Guarded stock decrements
//!
//! ## Listing Filters
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  GET /api/products?category_id=3&keyword=phone&sort=price_asc          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ProductFilter { category_id, keyword, is_hot, is_new, status, sort }  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  WHERE deleted_at IS NULL                                              │
//! │    AND (?1 IS NULL OR category_id = ?1)       ← unset filters pass     │
//! │    AND (?2 IS NULL OR instr(lower(name), lower(?2)) > 0 ...)           │
//! │  ORDER BY <ProductSort::order_clause()>       ← fixed clause per sort  │
//! │  LIMIT page_size OFFSET (page - 1) * page_size                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Stock Updates
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  ❌ WRONG: read stock, check in Rust, write absolute value          │
//! │     (two concurrent orders both see stock = 1)                      │
//! │                                                                     │
//! │  ✅ CORRECT: one guarded statement                                  │
//! │     UPDATE products SET stock = stock - ?q                          │
//! │     WHERE id = ? AND stock >= ?q                                    │
//! │     rows_affected = 0 → NotFound or InsufficientStock               │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::Utc;
use sqlx::types::Json;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::debug;

use crate::error::{DbError, DbResult};
use mall_core::{
    CoreError, Money, PageRequest, Product, ProductSku, ProductStatus, ValidationError,
};

const PRODUCT_COLUMNS: &str = "id, name, category_id, description, price, original_price, \
     stock, sales, images, video_url, status, is_hot, is_new, sort, \
     created_at, updated_at, deleted_at";

const SKU_COLUMNS: &str = "id, product_id, name, specifications, price, stock, sales, image, \
     created_at, updated_at, deleted_at";

/// Shared by the page query and its count query. Parameters ?1..?5.
const LIST_FILTER: &str = "deleted_at IS NULL \
     AND (?1 IS NULL OR category_id = ?1) \
     AND (?2 IS NULL OR instr(lower(name), lower(?2)) > 0 \
          OR instr(lower(description), lower(?2)) > 0) \
     AND (?3 IS NULL OR is_hot = ?3) \
     AND (?4 IS NULL OR is_new = ?4) \
     AND (?5 IS NULL OR status = ?5)";

// =============================================================================
// Filters
// =============================================================================

/// Listing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProductSort {
    /// Merchandising order: `sort` then id, both descending.
    #[default]
    Default,
    Sales,
    PriceAsc,
    PriceDesc,
    Newest,
}

impl ProductSort {
    fn order_clause(&self) -> &'static str {
        match self {
            ProductSort::Default => "sort DESC, id DESC",
            ProductSort::Sales => "sales DESC, id DESC",
            ProductSort::PriceAsc => "price ASC, id DESC",
            ProductSort::PriceDesc => "price DESC, id DESC",
            ProductSort::Newest => "created_at DESC, id DESC",
        }
    }

    /// Parses a `sort` query value; unknown or missing values fall back
    /// to [`ProductSort::Default`].
    pub fn parse_or_default(value: Option<&str>) -> Self {
        value
            .and_then(|v| v.parse().ok())
            .unwrap_or_default()
    }
}

impl FromStr for ProductSort {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sales" => Ok(ProductSort::Sales),
            "price_asc" => Ok(ProductSort::PriceAsc),
            "price_desc" => Ok(ProductSort::PriceDesc),
            "new" => Ok(ProductSort::Newest),
            "default" => Ok(ProductSort::Default),
            _ => Err(()),
        }
    }
}

/// Product listing filter. `None` fields do not constrain the result.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub category_id: Option<i64>,
    pub keyword: Option<String>,
    pub is_hot: Option<bool>,
    pub is_new: Option<bool>,
    pub status: Option<ProductStatus>,
    pub sort: ProductSort,
}

/// Product fields supplied on create and update.
#[derive(Debug, Clone)]
pub struct ProductInput {
    pub name: String,
    pub category_id: i64,
    pub description: String,
    pub price: Money,
    pub original_price: Option<Money>,
    pub stock: i64,
    pub images: Vec<String>,
    pub video_url: String,
    pub status: ProductStatus,
    pub is_hot: bool,
    pub is_new: bool,
    pub sort: i32,
}

/// SKU fields supplied on create.
#[derive(Debug, Clone)]
pub struct SkuInput {
    pub name: String,
    pub specifications: BTreeMap<String, String>,
    pub price: Money,
    pub stock: i64,
    pub image: String,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
///
/// let filter = ProductFilter { keyword: Some("phone".into()), ..Default::default() };
/// let (products, total) = repo.list(&filter, PageRequest::default()).await?;
///
/// let product = repo.get(7).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Lists one page of products matching `filter`.
    ///
    /// ## Returns
    /// `(page_items, total_matching)`
    pub async fn list(
        &self,
        filter: &ProductFilter,
        page: PageRequest,
    ) -> DbResult<(Vec<Product>, i64)> {
        debug!(?filter, page = page.page, page_size = page.page_size, "Listing products");

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM products WHERE {LIST_FILTER}"))
                .bind(filter.category_id)
                .bind(filter.keyword.as_deref())
                .bind(filter.is_hot)
                .bind(filter.is_new)
                .bind(filter.status)
                .fetch_one(&self.pool)
                .await?;

        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE {LIST_FILTER} \
             ORDER BY {} LIMIT ?6 OFFSET ?7",
            filter.sort.order_clause()
        ))
        .bind(filter.category_id)
        .bind(filter.keyword.as_deref())
        .bind(filter.is_hot)
        .bind(filter.is_new)
        .bind(filter.status)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        debug!(count = products.len(), total, "Listing returned products");
        Ok((products, total))
    }

    /// Listed products flagged hot, merchandising order.
    pub async fn hot(&self, limit: i64) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE deleted_at IS NULL AND status = 'listed' AND is_hot = 1 \
             ORDER BY sort DESC, id DESC LIMIT ?1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Listed products flagged new, newest first.
    pub async fn newest(&self, limit: i64) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products \
             WHERE deleted_at IS NULL AND status = 'listed' AND is_new = 1 \
             ORDER BY created_at DESC, id DESC LIMIT ?1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Gets a product by its ID.
    ///
    /// ## Returns
    /// * `Ok(Some(Product))` - Product found
    /// * `Ok(None)` - Product not found or soft-deleted
    pub async fn find(&self, id: i64) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    pub async fn get(&self, id: i64) -> DbResult<Product> {
        self.find(id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", id))
    }

    /// Active SKUs of a product, in creation order.
    pub async fn skus(&self, product_id: i64) -> DbResult<Vec<ProductSku>> {
        let skus = sqlx::query_as::<_, ProductSku>(&format!(
            "SELECT {SKU_COLUMNS} FROM product_skus \
             WHERE product_id = ?1 AND deleted_at IS NULL ORDER BY id"
        ))
        .bind(product_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(skus)
    }

    pub async fn get_sku(&self, sku_id: i64) -> DbResult<ProductSku> {
        sqlx::query_as::<_, ProductSku>(&format!(
            "SELECT {SKU_COLUMNS} FROM product_skus WHERE id = ?1 AND deleted_at IS NULL"
        ))
        .bind(sku_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::not_found("SKU", sku_id))
    }

    /// Inserts a new product.
    ///
    /// ## Returns
    /// * `Ok(Product)` - Inserted product with generated id and timestamps
    /// * `Err(DbError::Domain)` - Category doesn't exist
    pub async fn create(&self, input: ProductInput) -> DbResult<Product> {
        debug!(name = %input.name, category_id = input.category_id, "Inserting product");

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        ensure_category(&mut tx, input.category_id).await?;

        let product = sqlx::query_as::<_, Product>(&format!(
            "INSERT INTO products ( \
                name, category_id, description, price, original_price, stock, images, \
                video_url, status, is_hot, is_new, sort, created_at, updated_at \
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?13) \
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(&input.name)
        .bind(input.category_id)
        .bind(&input.description)
        .bind(input.price)
        .bind(input.original_price)
        .bind(input.stock)
        .bind(Json(&input.images))
        .bind(&input.video_url)
        .bind(input.status)
        .bind(input.is_hot)
        .bind(input.is_new)
        .bind(input.sort)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(product)
    }

    /// Replaces a product's editable fields. Stock and sales counters
    /// other than `stock` are left alone.
    pub async fn update(&self, id: i64, input: ProductInput) -> DbResult<Product> {
        debug!(id, "Updating product");

        let mut tx = self.pool.begin().await?;
        ensure_category(&mut tx, input.category_id).await?;

        let product = sqlx::query_as::<_, Product>(&format!(
            "UPDATE products SET \
                name = ?1, category_id = ?2, description = ?3, price = ?4, \
                original_price = ?5, stock = ?6, images = ?7, video_url = ?8, \
                status = ?9, is_hot = ?10, is_new = ?11, sort = ?12, updated_at = ?13 \
             WHERE id = ?14 AND deleted_at IS NULL \
             RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(&input.name)
        .bind(input.category_id)
        .bind(&input.description)
        .bind(input.price)
        .bind(input.original_price)
        .bind(input.stock)
        .bind(Json(&input.images))
        .bind(&input.video_url)
        .bind(input.status)
        .bind(input.is_hot)
        .bind(input.is_new)
        .bind(input.sort)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("Product", id))?;

        tx.commit().await?;
        Ok(product)
    }

    /// Lists or unlists a product.
    pub async fn set_status(&self, id: i64, status: ProductStatus) -> DbResult<()> {
        let result = sqlx::query(
            "UPDATE products SET status = ?1, updated_at = ?2 WHERE id = ?3 AND deleted_at IS NULL",
        )
        .bind(status)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }
        Ok(())
    }

    /// Soft-deletes a product together with its SKUs.
    ///
    /// Order items keep their own snapshot of the product, so history
    /// is unaffected.
    pub async fn soft_delete(&self, id: i64) -> DbResult<()> {
        debug!(id, "Soft-deleting product");

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE products SET deleted_at = ?1, updated_at = ?1 \
             WHERE id = ?2 AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        sqlx::query(
            "UPDATE product_skus SET deleted_at = ?1, updated_at = ?1 \
             WHERE product_id = ?2 AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    /// Adds a SKU to an existing product.
    pub async fn add_sku(&self, product_id: i64, input: SkuInput) -> DbResult<ProductSku> {
        // Existence check doubles as the soft-delete filter.
        self.get(product_id).await?;

        let sku = sqlx::query_as::<_, ProductSku>(&format!(
            "INSERT INTO product_skus \
                (product_id, name, specifications, price, stock, image, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7) \
             RETURNING {SKU_COLUMNS}"
        ))
        .bind(product_id)
        .bind(&input.name)
        .bind(Json(&input.specifications))
        .bind(input.price)
        .bind(input.stock)
        .bind(&input.image)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;

        debug!(product_id, sku_id = sku.id, "SKU added");
        Ok(sku)
    }

    /// Takes `quantity` units from stock and adds them to sales.
    ///
    /// `sku_id` of `None` draws from the product itself.
    pub async fn decrement_stock(
        &self,
        product_id: i64,
        sku_id: Option<i64>,
        quantity: i64,
    ) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        decrement_stock_in(&mut tx, product_id, sku_id, quantity).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE deleted_at IS NULL")
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }
}

// =============================================================================
// Transaction Helpers
// =============================================================================

async fn ensure_category(tx: &mut Transaction<'_, Sqlite>, category_id: i64) -> DbResult<()> {
    let exists: Option<i64> =
        sqlx::query_scalar("SELECT id FROM categories WHERE id = ?1 AND deleted_at IS NULL")
            .bind(category_id)
            .fetch_optional(&mut **tx)
            .await?;

    if exists.is_none() {
        return Err(CoreError::from(ValidationError::InvalidFormat {
            field: "category_id".to_string(),
            reason: format!("category {category_id} does not exist"),
        })
        .into());
    }
    Ok(())
}

/// Guarded stock decrement inside a caller's transaction.
///
/// SKU purchases draw from the SKU's stock; both the SKU and the product
/// count the sale.
pub(crate) async fn decrement_stock_in(
    tx: &mut Transaction<'_, Sqlite>,
    product_id: i64,
    sku_id: Option<i64>,
    quantity: i64,
) -> DbResult<()> {
    let now = Utc::now();

    let affected = match sku_id {
        Some(sku_id) => sqlx::query(
            "UPDATE product_skus SET stock = stock - ?1, sales = sales + ?1, updated_at = ?2 \
             WHERE id = ?3 AND product_id = ?4 AND stock >= ?1 AND deleted_at IS NULL",
        )
        .bind(quantity)
        .bind(now)
        .bind(sku_id)
        .bind(product_id)
        .execute(&mut **tx)
        .await?
        .rows_affected(),
        None => sqlx::query(
            "UPDATE products SET stock = stock - ?1, sales = sales + ?1, updated_at = ?2 \
             WHERE id = ?3 AND stock >= ?1 AND deleted_at IS NULL",
        )
        .bind(quantity)
        .bind(now)
        .bind(product_id)
        .execute(&mut **tx)
        .await?
        .rows_affected(),
    };

    if affected == 0 {
        let available: Option<i64> = match sku_id {
            Some(sku_id) => sqlx::query_scalar(
                "SELECT stock FROM product_skus \
                 WHERE id = ?1 AND product_id = ?2 AND deleted_at IS NULL",
            )
            .bind(sku_id)
            .bind(product_id)
            .fetch_optional(&mut **tx)
            .await?,
            None => sqlx::query_scalar(
                "SELECT stock FROM products WHERE id = ?1 AND deleted_at IS NULL",
            )
            .bind(product_id)
            .fetch_optional(&mut **tx)
            .await?,
        };

        return Err(match (available, sku_id) {
            (Some(available), _) => CoreError::InsufficientStock {
                product_id,
                available,
                requested: quantity,
            }
            .into(),
            (None, Some(sku_id)) => DbError::not_found("SKU", sku_id),
            (None, None) => DbError::not_found("Product", product_id),
        });
    }

    if sku_id.is_some() {
        sqlx::query("UPDATE products SET sales = sales + ?1, updated_at = ?2 WHERE id = ?3")
            .bind(quantity)
            .bind(now)
            .bind(product_id)
            .execute(&mut **tx)
            .await?;
    }

    debug!(product_id, ?sku_id, quantity, "Stock decremented");
    Ok(())
}

/// Puts `quantity` units back (order cancellation).
pub(crate) async fn restore_stock_in(
    tx: &mut Transaction<'_, Sqlite>,
    product_id: i64,
    sku_id: Option<i64>,
    quantity: i64,
) -> DbResult<()> {
    let now = Utc::now();

    if let Some(sku_id) = sku_id {
        sqlx::query(
            "UPDATE product_skus SET stock = stock + ?1, sales = MAX(sales - ?1, 0), updated_at = ?2 \
             WHERE id = ?3",
        )
        .bind(quantity)
        .bind(now)
        .bind(sku_id)
        .execute(&mut **tx)
        .await?;

        sqlx::query("UPDATE products SET sales = MAX(sales - ?1, 0), updated_at = ?2 WHERE id = ?3")
            .bind(quantity)
            .bind(now)
            .bind(product_id)
            .execute(&mut **tx)
            .await?;
    } else {
        sqlx::query(
            "UPDATE products SET stock = stock + ?1, sales = MAX(sales - ?1, 0), updated_at = ?2 \
             WHERE id = ?3",
        )
        .bind(quantity)
        .bind(now)
        .bind(product_id)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::repository::category::CategoryInput;
    use crate::repository::test_db;
    use crate::Database;
    use mall_core::CategoryStatus;

    pub(crate) async fn seed_category(db: &Database) -> i64 {
        db.categories()
            .create(CategoryInput {
                name: "Phones".to_string(),
                parent_id: 0,
                sort: 0,
                status: CategoryStatus::Visible,
            })
            .await
            .unwrap()
            .id
    }

    pub(crate) fn product_input(name: &str, category_id: i64, price_cents: i64) -> ProductInput {
        ProductInput {
            name: name.to_string(),
            category_id,
            description: String::new(),
            price: Money::from_cents(price_cents),
            original_price: None,
            stock: 10,
            images: vec![format!("https://img.example.com/{name}.png")],
            video_url: String::new(),
            status: ProductStatus::Listed,
            is_hot: false,
            is_new: false,
            sort: 0,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_round_trips_json_columns() {
        let db = test_db().await;
        let category = seed_category(&db).await;
        let repo = db.products();

        let created = repo
            .create(product_input("Pixel", category, 49_900))
            .await
            .unwrap();
        let fetched = repo.get(created.id).await.unwrap();

        assert_eq!(fetched.name, "Pixel");
        assert_eq!(fetched.price, Money::from_cents(49_900));
        assert_eq!(fetched.cover_image(), "https://img.example.com/Pixel.png");

        let mut specs = BTreeMap::new();
        specs.insert("color".to_string(), "black".to_string());
        let sku = repo
            .add_sku(
                created.id,
                SkuInput {
                    name: "Black".to_string(),
                    specifications: specs,
                    price: Money::from_cents(51_900),
                    stock: 3,
                    image: String::new(),
                },
            )
            .await
            .unwrap();
        assert_eq!(sku.specifications["color"], "black");
        assert_eq!(repo.skus(created.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_requires_existing_category() {
        let db = test_db().await;
        let err = db
            .products()
            .create(product_input("Ghost", 77, 100))
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_list_filters_and_sorts() {
        let db = test_db().await;
        let category = seed_category(&db).await;
        let repo = db.products();

        repo.create(product_input("Cheap phone", category, 100))
            .await
            .unwrap();
        repo.create(product_input("Pricey phone", category, 900))
            .await
            .unwrap();
        let mut hidden = product_input("Unlisted phone", category, 500);
        hidden.status = ProductStatus::Unlisted;
        repo.create(hidden).await.unwrap();

        let filter = ProductFilter {
            keyword: Some("PHONE".to_string()),
            status: Some(ProductStatus::Listed),
            sort: ProductSort::PriceAsc,
            ..Default::default()
        };
        let (products, total) = repo.list(&filter, PageRequest::default()).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(products[0].name, "Cheap phone");
        assert_eq!(products[1].name, "Pricey phone");

        let page = PageRequest::new(Some(2), Some(1));
        let (products, total) = repo.list(&filter, page).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].name, "Pricey phone");

        let (_, all) = repo
            .list(&ProductFilter::default(), PageRequest::default())
            .await
            .unwrap();
        assert_eq!(all, 3);
    }

    #[tokio::test]
    async fn test_hot_and_new_shelves() {
        let db = test_db().await;
        let category = seed_category(&db).await;
        let repo = db.products();

        let mut hot = product_input("Hot", category, 100);
        hot.is_hot = true;
        repo.create(hot).await.unwrap();
        let mut new = product_input("New", category, 100);
        new.is_new = true;
        repo.create(new).await.unwrap();

        let hot = repo.hot(10).await.unwrap();
        assert_eq!(hot.len(), 1);
        assert_eq!(hot[0].name, "Hot");

        let new = repo.newest(10).await.unwrap();
        assert_eq!(new.len(), 1);
        assert_eq!(new[0].name, "New");
    }

    #[tokio::test]
    async fn test_decrement_stock_never_goes_negative() {
        let db = test_db().await;
        let category = seed_category(&db).await;
        let repo = db.products();
        let product = repo
            .create(product_input("Pixel", category, 100))
            .await
            .unwrap();

        repo.decrement_stock(product.id, None, 7).await.unwrap();
        let err = repo.decrement_stock(product.id, None, 4).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock {
                available: 3,
                requested: 4,
                ..
            })
        ));

        let after = repo.get(product.id).await.unwrap();
        assert_eq!(after.stock, 3);
        assert_eq!(after.sales, 7);

        assert!(matches!(
            repo.decrement_stock(999, None, 1).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_soft_delete_hides_product() {
        let db = test_db().await;
        let category = seed_category(&db).await;
        let repo = db.products();
        let product = repo
            .create(product_input("Pixel", category, 100))
            .await
            .unwrap();

        repo.soft_delete(product.id).await.unwrap();
        assert!(repo.find(product.id).await.unwrap().is_none());
        assert_eq!(repo.count().await.unwrap(), 0);
        assert!(matches!(
            repo.soft_delete(product.id).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[test]
    fn test_sort_parsing() {
        assert_eq!(ProductSort::parse_or_default(Some("sales")), ProductSort::Sales);
        assert_eq!(ProductSort::parse_or_default(Some("new")), ProductSort::Newest);
        assert_eq!(ProductSort::parse_or_default(Some("bogus")), ProductSort::Default);
        assert_eq!(ProductSort::parse_or_default(None), ProductSort::Default);
    }
}
