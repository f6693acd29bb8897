//! Service layer.
//!
//! Each service receives the repositories (and collaborators) it needs at
//! construction; handlers reach them through [`crate::state::AppState`].
//!
//! ```text
//! handler ──► service (validation, logging, cache) ──► repository ──► SQLite
//! ```

pub mod address_service;
pub mod auth_service;
pub mod category_service;
pub mod product_service;
pub mod user_service;

pub use address_service::AddressService;
pub use auth_service::AuthService;
pub use category_service::CategoryService;
pub use product_service::ProductService;
pub use user_service::UserService;
