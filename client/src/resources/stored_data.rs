use std::collections::BTreeMap;

use url::Url;

use common::data::{ResourceRef, StoredData};

use crate::error::ApiError;
use crate::http::ApiClient;
use crate::pagination::{collect_pages, MAX_LIMIT};

pub struct StoredDataClient<'a> {
    api: &'a ApiClient,
}

impl<'a> StoredDataClient<'a> {
    pub(crate) fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    fn base_url(&self, datastore: &str) -> String {
        self.api.datastore_url(datastore, "stored_data")
    }

    pub async fn list(&self, datastore: &str) -> Result<Vec<StoredData>, ApiError> {
        let probe = format!("{}?limit=1", self.base_url(datastore));
        let (_, total) = self.api.get_with_total(&probe).await?;
        collect_pages(total, MAX_LIMIT, move |page, limit| {
            self.page(datastore, page, limit)
        })
        .await
    }

    async fn page(
        &self,
        datastore: &str,
        page: u64,
        limit: u64,
    ) -> Result<Vec<StoredData>, ApiError> {
        let url = format!("{}?page={page}&limit={limit}", self.base_url(datastore));
        let refs: Vec<ResourceRef> = self.api.get(&url).await?;
        let mut items = Vec::with_capacity(refs.len());
        for r in refs {
            items.push(self.get(datastore, &r.id).await?);
        }
        Ok(items)
    }

    pub async fn get(&self, datastore: &str, stored_data: &str) -> Result<StoredData, ApiError> {
        let url = format!("{}/{}", self.base_url(datastore), stored_data);
        self.api.get(&url).await
    }

    pub async fn add_tags(
        &self,
        datastore: &str,
        stored_data: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<(), ApiError> {
        let url = format!("{}/{}/tags", self.base_url(datastore), stored_data);
        self.api.post_unit(&url, tags).await
    }

    pub async fn delete_tags(
        &self,
        datastore: &str,
        stored_data: &str,
        keys: &[String],
    ) -> Result<(), ApiError> {
        let base = format!("{}/{}/tags", self.base_url(datastore), stored_data);
        let url = Url::parse_with_params(&base, keys.iter().map(|k| ("tags", k.as_str()))).unwrap();
        self.api.delete(url.as_str()).await
    }

    pub async fn delete(&self, datastore: &str, stored_data: &str) -> Result<(), ApiError> {
        let url = format!("{}/{}", self.base_url(datastore), stored_data);
        self.api.delete(&url).await
    }
}
