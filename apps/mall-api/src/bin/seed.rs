//! Seeds an administrator account and a small sample catalog.
//!
//! ```text
//! DATABASE_URL=sqlite://mall.db \
//! SEED_ADMIN_USERNAME=admin SEED_ADMIN_PASSWORD=change-me \
//!     cargo run -p mall-api --bin seed
//! ```
//!
//! Safe to run twice: an existing admin username is left alone and the
//! catalog is only seeded into an empty database.

use std::collections::BTreeMap;
use std::env;

use anyhow::{bail, Context};
use mall_api::auth::hash_password;
use mall_api::MallConfig;
use mall_core::validation::{validate_password, validate_username};
use mall_core::{CategoryStatus, Money, ProductStatus, Role};
use mall_db::{
    CategoryInput, Database, DbConfig, NewUser, ProductInput, SkuInput, UniqueUserField,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = MallConfig::load().context("loading configuration")?;
    let db = Database::new(DbConfig::new(config.database_url.clone()))
        .await
        .context("connecting to database")?;

    seed_admin(&db).await?;
    seed_catalog(&db).await?;

    db.close().await;
    Ok(())
}

async fn seed_admin(db: &Database) -> anyhow::Result<()> {
    let username = env::var("SEED_ADMIN_USERNAME").unwrap_or_else(|_| "admin".to_string());
    let Ok(password) = env::var("SEED_ADMIN_PASSWORD") else {
        bail!("SEED_ADMIN_PASSWORD must be set");
    };

    validate_username(&username)?;
    validate_password("SEED_ADMIN_PASSWORD", &password)?;

    if db
        .users()
        .is_taken(UniqueUserField::Username, &username, None)
        .await?
    {
        info!(username = %username, "Admin account already exists, skipping");
        return Ok(());
    }

    let admin = db
        .users()
        .create(NewUser {
            username,
            password_hash: hash_password(&password)?,
            nickname: "Administrator".to_string(),
            phone: None,
            email: None,
            role: Role::Admin,
        })
        .await?;

    info!(user_id = admin.id, username = %admin.username, "Admin account created");
    Ok(())
}

async fn seed_catalog(db: &Database) -> anyhow::Result<()> {
    if db.products().count().await? > 0 {
        info!("Catalog already has products, skipping");
        return Ok(());
    }

    let categories = db.categories();
    let electronics = categories
        .create(category("Electronics", 0, 1))
        .await?;
    let phones = categories.create(category("Phones", electronics.id, 1)).await?;
    let laptops = categories.create(category("Laptops", electronics.id, 2)).await?;
    let home = categories.create(category("Home", 0, 2)).await?;

    let products = db.products();
    let phone = products
        .create(product("Pocket Phone", phones.id, 2_999_00, 50, true, true))
        .await?;
    for (storage, price) in [("128G", 2_999_00), ("256G", 3_499_00)] {
        products
            .add_sku(
                phone.id,
                SkuInput {
                    name: format!("Pocket Phone {storage}"),
                    specifications: BTreeMap::from([("storage".to_string(), storage.to_string())]),
                    price: Money::from_cents(price),
                    stock: 25,
                    image: String::new(),
                },
            )
            .await?;
    }

    products
        .create(product("Thin Laptop", laptops.id, 6_499_00, 20, true, false))
        .await?;
    products
        .create(product("Ceramic Mug", home.id, 39_90, 200, false, true))
        .await?;

    info!("Sample catalog created");
    Ok(())
}

fn category(name: &str, parent_id: i64, sort: i32) -> CategoryInput {
    CategoryInput {
        name: name.to_string(),
        parent_id,
        sort,
        status: CategoryStatus::Visible,
    }
}

fn product(
    name: &str,
    category_id: i64,
    price_cents: i64,
    stock: i64,
    is_hot: bool,
    is_new: bool,
) -> ProductInput {
    ProductInput {
        name: name.to_string(),
        category_id,
        description: format!("{name} (sample)"),
        price: Money::from_cents(price_cents),
        original_price: None,
        stock,
        images: Vec::new(),
        video_url: String::new(),
        status: ProductStatus::Listed,
        is_hot,
        is_new,
        sort: 0,
    }
}
