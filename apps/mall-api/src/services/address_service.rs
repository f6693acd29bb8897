//! Shipping addresses of the signed-in user.
//!
//! The single-default rule is enforced by the repository inside one
//! transaction; this layer only validates input.

use mall_core::validation::{validate_max_len, validate_phone, validate_text};
use mall_core::Address;
use mall_db::{AddressInput, AddressRepository};
use serde::Deserialize;
use tracing::info;

use crate::error::ApiResult;

#[derive(Debug, Deserialize)]
pub struct AddressRequest {
    pub name: String,
    pub phone: String,
    pub province: String,
    pub city: String,
    pub district: String,
    pub detail: String,
    #[serde(default)]
    pub postcode: String,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub is_default: bool,
}

impl AddressRequest {
    fn into_input(self) -> ApiResult<AddressInput> {
        let input = AddressInput {
            name: self.name.trim().to_string(),
            phone: self.phone.trim().to_string(),
            province: self.province.trim().to_string(),
            city: self.city.trim().to_string(),
            district: self.district.trim().to_string(),
            detail: self.detail.trim().to_string(),
            postcode: self.postcode.trim().to_string(),
            tag: self.tag.trim().to_string(),
            is_default: self.is_default,
        };

        validate_text("name", &input.name, 50)?;
        validate_phone(&input.phone)?;
        validate_text("province", &input.province, 50)?;
        validate_text("city", &input.city, 50)?;
        validate_text("district", &input.district, 50)?;
        validate_text("detail", &input.detail, 255)?;
        validate_max_len("postcode", &input.postcode, 20)?;
        validate_max_len("tag", &input.tag, 20)?;

        Ok(input)
    }
}

#[derive(Clone)]
pub struct AddressService {
    addresses: AddressRepository,
}

impl AddressService {
    pub fn new(addresses: AddressRepository) -> Self {
        AddressService { addresses }
    }

    pub async fn list(&self, user_id: i64) -> ApiResult<Vec<Address>> {
        Ok(self.addresses.list_by_user(user_id).await?)
    }

    pub async fn get(&self, user_id: i64, id: i64) -> ApiResult<Address> {
        Ok(self.addresses.get_for_user(user_id, id).await?)
    }

    pub async fn create(&self, user_id: i64, req: AddressRequest) -> ApiResult<Address> {
        let address = self.addresses.create(user_id, req.into_input()?).await?;

        info!(user_id, address_id = address.id, is_default = address.is_default, "Address created");
        Ok(address)
    }

    pub async fn update(&self, user_id: i64, id: i64, req: AddressRequest) -> ApiResult<Address> {
        let address = self.addresses.update(user_id, id, req.into_input()?).await?;

        info!(user_id, address_id = id, "Address updated");
        Ok(address)
    }

    pub async fn set_default(&self, user_id: i64, id: i64) -> ApiResult<Address> {
        let address = self.addresses.set_default(user_id, id).await?;

        info!(user_id, address_id = id, "Default address changed");
        Ok(address)
    }

    pub async fn delete(&self, user_id: i64, id: i64) -> ApiResult<()> {
        self.addresses.delete(user_id, id).await?;

        info!(user_id, address_id = id, "Address deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use mall_db::{Database, DbConfig};

    fn request(detail: &str, is_default: bool) -> AddressRequest {
        AddressRequest {
            name: "Ann".to_string(),
            phone: "13800000000".to_string(),
            province: "Zhejiang".to_string(),
            city: "Hangzhou".to_string(),
            district: "Xihu".to_string(),
            detail: detail.to_string(),
            postcode: String::new(),
            tag: "home".to_string(),
            is_default,
        }
    }

    #[tokio::test]
    async fn test_validation_happens_before_write() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let addresses = AddressService::new(db.addresses());

        let mut bad = request("No. 1", false);
        bad.phone = "call me".to_string();

        assert!(matches!(
            addresses.create(1, bad).await,
            Err(ApiError::Validation(_))
        ));
        assert!(addresses.list(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_new_default_replaces_old() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let user = db
            .users()
            .create(mall_db::NewUser {
                username: "ann".to_string(),
                password_hash: "x".to_string(),
                nickname: String::new(),
                phone: None,
                email: None,
                role: mall_core::Role::User,
            })
            .await
            .unwrap();
        let addresses = AddressService::new(db.addresses());

        let first = addresses.create(user.id, request("No. 1", false)).await.unwrap();
        assert!(first.is_default);

        let second = addresses.create(user.id, request("No. 2", true)).await.unwrap();

        let list = addresses.list(user.id).await.unwrap();
        let defaults: Vec<i64> = list.iter().filter(|a| a.is_default).map(|a| a.id).collect();
        assert_eq!(defaults, vec![second.id]);
    }
}
