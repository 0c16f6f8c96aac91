use common::data::{ApiKey, User};
use common::payloads::{CreateKey, UpdateKey};

use crate::error::ApiError;
use crate::http::ApiClient;

pub struct UserClient<'a> {
    api: &'a ApiClient,
}

impl<'a> UserClient<'a> {
    pub(crate) fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    fn base_url(&self) -> String {
        format!("{}/users/me", self.api.base_url())
    }

    pub async fn me(&self) -> Result<User, ApiError> {
        self.api.get(&self.base_url()).await
    }

    pub async fn keys(&self) -> Result<Vec<ApiKey>, ApiError> {
        let url = format!("{}/keys", self.base_url());
        self.api.get(&url).await
    }

    pub async fn create_key(&self, body: &CreateKey) -> Result<ApiKey, ApiError> {
        let url = format!("{}/keys", self.base_url());
        self.api.post(&url, body).await
    }

    pub async fn update_key(&self, key: &str, body: &UpdateKey) -> Result<(), ApiError> {
        let url = format!("{}/keys/{}", self.base_url(), key);
        self.api.patch_unit(&url, body).await
    }

    pub async fn delete_key(&self, key: &str) -> Result<(), ApiError> {
        let url = format!("{}/keys/{}", self.base_url(), key);
        self.api.delete(&url).await
    }
}
