use url::Url;

use common::data::{Offering, ResourceRef};
use common::payloads::CreateOffering;

use crate::error::ApiError;
use crate::http::ApiClient;
use crate::resources::ConfigurationClient;

pub struct OfferingClient<'a> {
    api: &'a ApiClient,
}

impl<'a> OfferingClient<'a> {
    pub(crate) fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    fn base_url(&self, datastore: &str) -> String {
        self.api.datastore_url(datastore, "offerings")
    }

    /// Publish a configuration on an endpoint.
    pub async fn create(
        &self,
        datastore: &str,
        configuration: &str,
        body: &CreateOffering,
    ) -> Result<Offering, ApiError> {
        let url = format!(
            "{}/{}/offerings",
            self.api.datastore_url(datastore, "configurations"),
            configuration
        );
        self.api.post(&url, body).await
    }

    pub async fn get(&self, datastore: &str, offering: &str) -> Result<Offering, ApiError> {
        let url = format!("{}/{}", self.base_url(datastore), offering);
        self.api.get(&url).await
    }

    pub async fn delete(&self, datastore: &str, offering: &str) -> Result<(), ApiError> {
        let url = format!("{}/{}", self.base_url(datastore), offering);
        self.api.delete(&url).await
    }

    pub async fn ids_for_stored_data(
        &self,
        datastore: &str,
        stored_data: &str,
    ) -> Result<Vec<String>, ApiError> {
        let url =
            Url::parse_with_params(&self.base_url(datastore), &[("stored_data", stored_data)])
                .unwrap();
        let refs: Vec<ResourceRef> = self.api.get(url.as_str()).await?;
        Ok(refs.into_iter().map(|r| r.id).collect())
    }

    /// Tear down every service published from a stored data: each offering
    /// goes first, then the configuration it was built on.
    pub async fn unpublish_stored_data(
        &self,
        datastore: &str,
        stored_data: &str,
    ) -> Result<Vec<String>, ApiError> {
        let configurations = ConfigurationClient::new(self.api);
        let ids = self.ids_for_stored_data(datastore, stored_data).await?;
        let mut deleted = Vec::with_capacity(ids.len());
        for id in ids {
            let offering = self.get(datastore, &id).await?;
            self.delete(datastore, &id).await?;
            if let Some(configuration) = offering.configuration {
                configurations.delete(datastore, &configuration.id).await?;
            }
            deleted.push(id);
        }
        Ok(deleted)
    }
}
