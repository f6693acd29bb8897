//! Product browsing and administration.

use std::collections::BTreeMap;

use mall_core::validation::{
    normalize_limit, validate_keyword, validate_max_len, validate_non_negative,
    validate_product_name,
};
use mall_core::{
    Category, Money, Page, PageRequest, Product, ProductSku, ProductStatus, ValidationError,
};
use mall_db::{
    CategoryRepository, ProductFilter, ProductInput, ProductRepository, ProductSort, SkuInput,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ApiError, ApiResult};

/// Query string of `GET /api/products`.
#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub category_id: Option<i64>,
    pub keyword: Option<String>,
    pub sort: Option<String>,
    pub is_hot: Option<bool>,
    pub is_new: Option<bool>,
    pub status: Option<ProductStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

/// Create/update body. Money fields are integer cents.
#[derive(Debug, Deserialize)]
pub struct ProductRequest {
    pub name: String,
    pub category_id: i64,
    #[serde(default)]
    pub description: String,
    pub price: Money,
    pub original_price: Option<Money>,
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub video_url: String,
    #[serde(default)]
    pub status: ProductStatus,
    #[serde(default)]
    pub is_hot: bool,
    #[serde(default)]
    pub is_new: bool,
    #[serde(default)]
    pub sort: i32,
}

impl ProductRequest {
    fn into_input(self) -> ApiResult<ProductInput> {
        let name = self.name.trim().to_string();
        validate_product_name(&name)?;
        validate_non_negative("price", self.price.cents())?;
        if let Some(original) = self.original_price {
            validate_non_negative("original_price", original.cents())?;
        }
        validate_non_negative("stock", self.stock)?;
        validate_max_len("video_url", &self.video_url, 255)?;
        if self.images.len() > 20 {
            return Err(ValidationError::OutOfRange {
                field: "images".to_string(),
                min: 0,
                max: 20,
            }
            .into());
        }

        Ok(ProductInput {
            name,
            category_id: self.category_id,
            description: self.description,
            price: self.price,
            original_price: self.original_price,
            stock: self.stock,
            images: self.images,
            video_url: self.video_url,
            status: self.status,
            is_hot: self.is_hot,
            is_new: self.is_new,
            sort: self.sort,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct SkuRequest {
    pub name: String,
    #[serde(default)]
    pub specifications: BTreeMap<String, String>,
    pub price: Money,
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub image: String,
}

/// Product with its SKUs and category.
#[derive(Debug, Serialize)]
pub struct ProductDetail {
    #[serde(flatten)]
    pub product: Product,
    pub skus: Vec<ProductSku>,
    pub category: Option<Category>,
}

#[derive(Clone)]
pub struct ProductService {
    products: ProductRepository,
    categories: CategoryRepository,
}

impl ProductService {
    pub fn new(products: ProductRepository, categories: CategoryRepository) -> Self {
        ProductService {
            products,
            categories,
        }
    }

    /// Paged listing. The storefront always sees listed products only;
    /// administrators may filter by any status or none.
    pub async fn list(&self, query: ProductQuery, is_admin: bool) -> ApiResult<Page<Product>> {
        let page = PageRequest::new(query.page, query.page_size);
        let status = if is_admin {
            query.status
        } else {
            Some(ProductStatus::Listed)
        };

        let filter = ProductFilter {
            category_id: query.category_id.filter(|id| *id > 0),
            keyword: validate_keyword(query.keyword.as_deref())?,
            is_hot: query.is_hot,
            is_new: query.is_new,
            status,
            sort: ProductSort::parse_or_default(query.sort.as_deref()),
        };

        let (list, total) = self.products.list(&filter, page).await?;
        Ok(Page::new(list, total, page))
    }

    pub async fn hot(&self, limit: Option<i64>) -> ApiResult<Vec<Product>> {
        Ok(self.products.hot(normalize_limit(limit)).await?)
    }

    pub async fn newest(&self, limit: Option<i64>) -> ApiResult<Vec<Product>> {
        Ok(self.products.newest(normalize_limit(limit)).await?)
    }

    /// Unlisted products are reported as missing to non-admins.
    pub async fn detail(&self, id: i64, is_admin: bool) -> ApiResult<ProductDetail> {
        let product = self.visible_product(id, is_admin).await?;
        let skus = self.products.skus(id).await?;
        let category = self.categories.find(product.category_id).await?;

        Ok(ProductDetail {
            product,
            skus,
            category,
        })
    }

    pub async fn skus(&self, id: i64, is_admin: bool) -> ApiResult<Vec<ProductSku>> {
        self.visible_product(id, is_admin).await?;
        Ok(self.products.skus(id).await?)
    }

    async fn visible_product(&self, id: i64, is_admin: bool) -> ApiResult<Product> {
        let product = self.products.get(id).await?;
        if !is_admin && product.status != ProductStatus::Listed {
            return Err(ApiError::NotFound(format!("Product not found: {id}")));
        }
        Ok(product)
    }

    pub async fn create(&self, req: ProductRequest) -> ApiResult<Product> {
        let product = self.products.create(req.into_input()?).await?;

        info!(product_id = product.id, name = %product.name, "Product created");
        Ok(product)
    }

    pub async fn update(&self, id: i64, req: ProductRequest) -> ApiResult<Product> {
        let product = self.products.update(id, req.into_input()?).await?;

        info!(product_id = id, "Product updated");
        Ok(product)
    }

    pub async fn set_status(&self, id: i64, status: ProductStatus) -> ApiResult<()> {
        self.products.set_status(id, status).await?;

        info!(product_id = id, ?status, "Product status changed");
        Ok(())
    }

    pub async fn delete(&self, id: i64) -> ApiResult<()> {
        self.products.soft_delete(id).await?;

        info!(product_id = id, "Product deleted");
        Ok(())
    }

    pub async fn add_sku(&self, product_id: i64, req: SkuRequest) -> ApiResult<ProductSku> {
        let name = req.name.trim().to_string();
        validate_product_name(&name)?;
        validate_non_negative("price", req.price.cents())?;
        validate_non_negative("stock", req.stock)?;

        let sku = self
            .products
            .add_sku(
                product_id,
                SkuInput {
                    name,
                    specifications: req.specifications,
                    price: req.price,
                    stock: req.stock,
                    image: req.image,
                },
            )
            .await?;

        info!(product_id, sku_id = sku.id, "SKU created");
        Ok(sku)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mall_core::CategoryStatus;
    use mall_db::{CategoryInput, Database, DbConfig};

    async fn setup() -> (ProductService, i64) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let category = db
            .categories()
            .create(CategoryInput {
                name: "Phones".to_string(),
                parent_id: 0,
                sort: 0,
                status: CategoryStatus::Visible,
            })
            .await
            .unwrap();
        (
            ProductService::new(db.products(), db.categories()),
            category.id,
        )
    }

    fn request(name: &str, category_id: i64, price: i64) -> ProductRequest {
        ProductRequest {
            name: name.to_string(),
            category_id,
            description: String::new(),
            price: Money::from_cents(price),
            original_price: None,
            stock: 5,
            images: vec![],
            video_url: String::new(),
            status: ProductStatus::Listed,
            is_hot: false,
            is_new: false,
            sort: 0,
        }
    }

    #[tokio::test]
    async fn test_storefront_only_sees_listed() {
        let (products, category) = setup().await;
        products.create(request("Shown", category, 100)).await.unwrap();
        let hidden = products
            .create(ProductRequest {
                status: ProductStatus::Unlisted,
                ..request("Hidden", category, 100)
            })
            .await
            .unwrap();

        let page = products.list(ProductQuery::default(), false).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.list[0].name, "Shown");

        let everything = products.list(ProductQuery::default(), true).await.unwrap();
        assert_eq!(everything.total, 2);

        let asked_for_unlisted = products
            .list(
                ProductQuery {
                    status: Some(ProductStatus::Unlisted),
                    ..Default::default()
                },
                false,
            )
            .await
            .unwrap();
        assert_eq!(asked_for_unlisted.total, 1);
        assert_eq!(asked_for_unlisted.list[0].name, "Shown");

        assert!(matches!(
            products.detail(hidden.id, false).await,
            Err(ApiError::NotFound(_))
        ));
        assert!(products.detail(hidden.id, true).await.is_ok());
    }

    #[tokio::test]
    async fn test_price_sort_and_paging() {
        let (products, category) = setup().await;
        for (name, price) in [("B", 300), ("A", 100), ("C", 200)] {
            products.create(request(name, category, price)).await.unwrap();
        }

        let page = products
            .list(
                ProductQuery {
                    sort: Some("price_asc".to_string()),
                    page: Some(1),
                    page_size: Some(2),
                    ..Default::default()
                },
                false,
            )
            .await
            .unwrap();

        assert_eq!(page.total, 3);
        let names: Vec<&str> = page.list.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["A", "C"]);
    }

    #[tokio::test]
    async fn test_create_validation() {
        let (products, category) = setup().await;

        assert!(matches!(
            products.create(request("Neg", category, -1)).await,
            Err(ApiError::Validation(_))
        ));
        assert!(matches!(
            products.create(request("Nowhere", 999, 100)).await,
            Err(ApiError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_detail_includes_skus_and_category() {
        let (products, category) = setup().await;
        let product = products.create(request("Phone", category, 1000)).await.unwrap();
        products
            .add_sku(
                product.id,
                SkuRequest {
                    name: "Phone 128G".to_string(),
                    specifications: BTreeMap::from([("storage".to_string(), "128G".to_string())]),
                    price: Money::from_cents(1200),
                    stock: 3,
                    image: String::new(),
                },
            )
            .await
            .unwrap();

        let detail = products.detail(product.id, false).await.unwrap();

        assert_eq!(detail.skus.len(), 1);
        assert_eq!(detail.category.map(|c| c.id), Some(category));
    }
}
