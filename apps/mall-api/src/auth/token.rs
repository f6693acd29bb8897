//! JWT token service.
//!
//! Handles session token issuance, validation, and refresh. Tokens are
//! HS256 signed with a single shared secret and carry
//! `{user_id, username, role, iss, sub, iat, exp}`.
//!
//! There is no revocation list: a token stays valid until it expires,
//! even after logout or refresh.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use mall_core::Role;
use serde::{Deserialize, Serialize};

use crate::config::MallConfig;

/// JWT claims structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i64,
    pub username: String,
    pub role: Role,

    /// Issuer
    pub iss: String,

    /// Subject (username)
    pub sub: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,
}

/// Token and authorization header failures.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Authorization header is required")]
    MissingHeader,

    #[error("Authorization header format must be Bearer {{token}}")]
    MalformedHeader,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Invalid or expired token")]
    ExpiredToken,

    #[error("Failed to sign token: {0}")]
    Signing(String),
}

/// Stateless token service; safe to share across tasks.
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    lifetime: Duration,
}

impl TokenService {
    /// Create a new token service.
    pub fn new(secret: &str, issuer: impl Into<String>, lifetime_hours: i64) -> Self {
        TokenService {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            issuer: issuer.into(),
            lifetime: Duration::hours(lifetime_hours),
        }
    }

    pub fn from_config(config: &MallConfig) -> Self {
        TokenService::new(
            &config.jwt_secret,
            config.jwt_issuer.clone(),
            config.jwt_expire_hours,
        )
    }

    /// Issue a token valid from now for the configured lifetime.
    pub fn issue(&self, user_id: i64, username: &str, role: Role) -> Result<String, AuthError> {
        self.issue_at(user_id, username, role, Utc::now())
    }

    /// Issue a token as if the current time were `now`.
    pub fn issue_at(
        &self,
        user_id: i64,
        username: &str,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let exp = now + self.lifetime;

        let claims = Claims {
            user_id,
            username: username.to_string(),
            role,
            iss: self.issuer.clone(),
            sub: username.to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::Signing(e.to_string()))
    }

    /// Validate a token and return its claims.
    ///
    /// ## Errors
    /// - `ExpiredToken` when `exp` has passed
    /// - `InvalidToken` for anything else: bad signature, another
    ///   algorithm, wrong issuer, garbage input
    pub fn parse(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);
        validation.leeway = 0;

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
                _ => AuthError::InvalidToken,
            })
    }

    /// Re-issue a still-valid token with a fresh expiry.
    pub fn refresh(&self, token: &str) -> Result<String, AuthError> {
        let claims = self.parse(token)?;
        self.issue(claims.user_id, &claims.username, claims.role)
    }
}
