//! Auth gate middleware.
//!
//! ## Per-request states
//! ```text
//! no header                      → 401 "Authorization header is required"
//! header without "Bearer " scheme → 401 "Authorization header format must be Bearer {token}"
//! bad signature / expired        → 401 "Invalid or expired token"
//! valid                          → CurrentUser attached, request continues
//! ```
//!
//! `require_admin` runs after `require_auth` and answers 403 for non-admins.
//! `optional_auth` never rejects.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{FromRequestParts, OptionalFromRequestParts, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use mall_core::Role;
use tracing::debug;

use super::token::{AuthError, Claims, TokenService};
use crate::error::ApiError;
use crate::state::AppState;

/// Identity attached to an authenticated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CurrentUser {
    pub user_id: i64,
    pub username: String,
    pub role: Role,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

impl From<Claims> for CurrentUser {
    fn from(claims: Claims) -> Self {
        CurrentUser {
            user_id: claims.user_id,
            username: claims.username,
            role: claims.role,
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized("User not authenticated".to_string()))
    }
}

impl<S: Send + Sync> OptionalFromRequestParts<S> for CurrentUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<CurrentUser>().cloned())
    }
}

/// Extracts the bearer token from the `Authorization` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers.get(AUTHORIZATION).ok_or(AuthError::MissingHeader)?;
    let value = value.to_str().map_err(|_| AuthError::MalformedHeader)?;

    match value.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim()),
        _ => Err(AuthError::MalformedHeader),
    }
}

fn authenticate(tokens: &TokenService, headers: &HeaderMap) -> Result<CurrentUser, AuthError> {
    let token = bearer_token(headers)?;
    tokens.parse(token).map(CurrentUser::from)
}

/// Rejects unauthenticated requests with 401.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = authenticate(&state.tokens, request.headers())?;
    request.extensions_mut().insert(user);
    Ok(next.run(request).await)
}

/// Rejects non-admins with 403. Must be layered inside [`require_auth`].
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<CurrentUser>()
        .ok_or_else(|| ApiError::Unauthorized("User not authenticated".to_string()))?;

    if !user.is_admin() {
        return Err(ApiError::Forbidden("Admin privileges required".to_string()));
    }

    Ok(next.run(request).await)
}

/// Attaches the user when a valid token is present; never rejects.
pub async fn optional_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticate(&state.tokens, request.headers()) {
        Ok(user) => {
            request.extensions_mut().insert(user);
        }
        Err(AuthError::MissingHeader) => {}
        Err(e) => debug!(error = %e, "Ignoring bad credentials on optional-auth route"),
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token(&headers("Bearer abc.def")).unwrap(), "abc.def");
        assert!(matches!(
            bearer_token(&HeaderMap::new()),
            Err(AuthError::MissingHeader)
        ));
        assert!(matches!(
            bearer_token(&headers("Token abc")),
            Err(AuthError::MalformedHeader)
        ));
        assert!(matches!(
            bearer_token(&headers("Bearer ")),
            Err(AuthError::MalformedHeader)
        ));
    }

    #[test]
    fn test_authenticate_maps_claims() {
        let tokens = TokenService::new("s", "online-mall", 1);
        let token = tokens.issue(5, "dave", Role::User).unwrap();

        let user = authenticate(&tokens, &headers(&format!("Bearer {token}"))).unwrap();

        assert_eq!(
            user,
            CurrentUser {
                user_id: 5,
                username: "dave".to_string(),
                role: Role::User,
            }
        );
        assert!(!user.is_admin());
    }
}
