//! Profile and password management for the signed-in user.

use mall_core::validation::{validate_email, validate_max_len, validate_password, validate_phone};
use mall_core::User;
use mall_db::{ProfileUpdate, UniqueUserField, UserRepository};
use serde::Deserialize;
use tracing::info;

use crate::auth::{hash_password, verify_password};
use crate::error::{ApiError, ApiResult};

/// Absent fields stay unchanged; an empty phone or email clears it.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProfileRequest {
    pub nickname: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Clone)]
pub struct UserService {
    users: UserRepository,
}

impl UserService {
    pub fn new(users: UserRepository) -> Self {
        UserService { users }
    }

    pub async fn profile(&self, user_id: i64) -> ApiResult<User> {
        Ok(self.users.get(user_id).await?)
    }

    pub async fn update_profile(&self, user_id: i64, req: UpdateProfileRequest) -> ApiResult<User> {
        let nickname = req.nickname.map(|n| n.trim().to_string());
        let phone = req.phone.map(|p| p.trim().to_string());
        let email = req.email.map(|e| e.trim().to_string());
        let avatar = req.avatar.map(|a| a.trim().to_string());

        if let Some(nickname) = &nickname {
            validate_max_len("nickname", nickname, 50)?;
        }
        if let Some(avatar) = &avatar {
            validate_max_len("avatar", avatar, 255)?;
        }
        if let Some(phone) = phone.as_deref().filter(|p| !p.is_empty()) {
            validate_phone(phone)?;
            self.ensure_available(UniqueUserField::Phone, phone, user_id)
                .await?;
        }
        if let Some(email) = email.as_deref().filter(|e| !e.is_empty()) {
            validate_email(email)?;
            self.ensure_available(UniqueUserField::Email, email, user_id)
                .await?;
        }

        let user = self
            .users
            .update_profile(
                user_id,
                ProfileUpdate {
                    nickname,
                    phone,
                    email,
                    avatar,
                },
            )
            .await?;

        info!(user_id, "Profile updated");
        Ok(user)
    }

    pub async fn change_password(&self, user_id: i64, req: ChangePasswordRequest) -> ApiResult<()> {
        validate_password("new_password", &req.new_password)?;

        let user = self.users.get(user_id).await?;
        if !verify_password(&req.old_password, &user.password_hash) {
            return Err(ApiError::validation("old password is incorrect"));
        }

        let hash = hash_password(&req.new_password)?;
        self.users.update_password(user_id, &hash).await?;

        info!(user_id, "Password changed");
        Ok(())
    }

    async fn ensure_available(
        &self,
        field: UniqueUserField,
        value: &str,
        user_id: i64,
    ) -> ApiResult<()> {
        if self.users.is_taken(field, value, Some(user_id)).await? {
            return Err(ApiError::Conflict(format!(
                "{} already exists",
                field.column()
            )));
        }
        Ok(())
    }
}
