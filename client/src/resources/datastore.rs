use common::data::Datastore;

use crate::error::ApiError;
use crate::http::ApiClient;

pub struct DatastoreClient<'a> {
    api: &'a ApiClient,
}

impl<'a> DatastoreClient<'a> {
    pub(crate) fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    pub async fn get(&self, datastore: &str) -> Result<Datastore, ApiError> {
        let url = format!("{}/datastores/{}", self.api.base_url(), datastore);
        self.api.get(&url).await
    }

    /// Id of the first endpoint able to serve `kind` ("WMTS-TMS",
    /// "WMS-VECTOR", "WFS").
    pub async fn endpoint(&self, datastore: &str, kind: &str) -> Result<String, ApiError> {
        let ds = self.get(datastore).await?;
        ds.endpoint_id(kind)
            .map(str::to_string)
            .ok_or_else(|| {
                ApiError::Unavailable(format!(
                    "no endpoint of type {kind} on datastore {datastore}"
                ))
            })
    }
}
