//! Authentication service.
//!
//! Registration, login and token refresh.

use std::sync::Arc;

use chrono::Utc;
use mall_core::validation::{
    validate_email, validate_max_len, validate_password, validate_phone, validate_username,
};
use mall_core::{Role, User};
use mall_db::{NewUser, UniqueUserField, UserRepository};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::auth::{hash_password, verify_password, TokenService};
use crate::error::{ApiError, ApiResult};

pub const BAD_CREDENTIALS: &str = "invalid username or password";
pub const ACCOUNT_DISABLED: &str = "account disabled";

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub nickname: Option<String>,
}

/// `username` may also be a phone number or email address.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthPayload {
    pub token: String,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct TokenPayload {
    pub token: String,
}

/// Authentication service.
#[derive(Clone)]
pub struct AuthService {
    users: UserRepository,
    tokens: Arc<TokenService>,
}

impl AuthService {
    pub fn new(users: UserRepository, tokens: Arc<TokenService>) -> Self {
        AuthService { users, tokens }
    }

    /// Creates an active `user` account and signs it in.
    pub async fn register(&self, req: RegisterRequest) -> ApiResult<AuthPayload> {
        let username = req.username.trim().to_string();
        validate_username(&username)?;
        validate_password("password", &req.password)?;

        let phone = non_empty(req.phone);
        let email = non_empty(req.email);
        let nickname = req.nickname.map(|n| n.trim().to_string()).unwrap_or_default();

        if let Some(phone) = &phone {
            validate_phone(phone)?;
        }
        if let Some(email) = &email {
            validate_email(email)?;
        }
        validate_max_len("nickname", &nickname, 50)?;

        self.ensure_available(UniqueUserField::Username, &username).await?;
        if let Some(phone) = &phone {
            self.ensure_available(UniqueUserField::Phone, phone).await?;
        }
        if let Some(email) = &email {
            self.ensure_available(UniqueUserField::Email, email).await?;
        }

        let password_hash = hash_password(&req.password)?;

        let user = self
            .users
            .create(NewUser {
                username,
                password_hash,
                nickname,
                phone,
                email,
                role: Role::User,
            })
            .await?;

        info!(user_id = user.id, username = %user.username, "User registered");

        let token = self.tokens.issue(user.id, &user.username, user.role)?;
        Ok(AuthPayload { token, user })
    }

    /// Verifies credentials and issues a token carrying the stored role.
    pub async fn login(&self, req: LoginRequest) -> ApiResult<AuthPayload> {
        let identifier = req.username.trim();
        if identifier.is_empty() || req.password.is_empty() {
            return Err(ApiError::validation(BAD_CREDENTIALS));
        }

        let Some(mut user) = self.users.find_by_login(identifier).await? else {
            warn!(identifier = %identifier, "Login for unknown account");
            return Err(ApiError::validation(BAD_CREDENTIALS));
        };

        if !verify_password(&req.password, &user.password_hash) {
            warn!(user_id = user.id, "Login with wrong password");
            return Err(ApiError::validation(BAD_CREDENTIALS));
        }

        if !user.is_active() {
            return Err(ApiError::validation(ACCOUNT_DISABLED));
        }

        let now = Utc::now();
        self.users.touch_last_login(user.id, now).await?;
        user.last_login_at = Some(now);

        info!(user_id = user.id, "User logged in");

        let token = self.tokens.issue(user.id, &user.username, user.role)?;
        Ok(AuthPayload { token, user })
    }

    pub fn refresh(&self, token: &str) -> ApiResult<TokenPayload> {
        let token = self.tokens.refresh(token)?;
        Ok(TokenPayload { token })
    }

    async fn ensure_available(&self, field: UniqueUserField, value: &str) -> ApiResult<()> {
        if self.users.is_taken(field, value, None).await? {
            return Err(ApiError::Conflict(format!(
                "{} already exists",
                field.column()
            )));
        }
        Ok(())
    }
}

/// Trims an optional field; blank becomes `None`.
pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
