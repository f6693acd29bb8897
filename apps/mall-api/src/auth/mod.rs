//! Authentication: session tokens, password hashing and the auth gate.
//!
//! ```text
//! Authorization: Bearer <token>
//!        │
//!        ▼
//! require_auth ──► TokenService::parse ──► CurrentUser in request extensions
//!        │
//!        ▼
//! require_admin (admin routes only) ──► 403 unless role = admin
//! ```

pub mod middleware;
pub mod password;
pub mod token;

pub use middleware::{optional_auth, require_admin, require_auth, CurrentUser};
pub use password::{hash_password, verify_password, PasswordError};
pub use token::{AuthError, Claims, TokenService};
