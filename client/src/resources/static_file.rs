use std::path::Path;

use common::data::StaticFile;

use crate::error::ApiError;
use crate::http::ApiClient;
use crate::multipart::MultipartBody;

pub struct StaticClient<'a> {
    api: &'a ApiClient,
}

impl<'a> StaticClient<'a> {
    pub(crate) fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    fn base_url(&self, datastore: &str) -> String {
        self.api.datastore_url(datastore, "statics")
    }

    /// Upload a GeoServer SLD style; WMS-VECTOR relations reference it by id.
    pub async fn create_geoserver_style(
        &self,
        datastore: &str,
        name: &str,
        path: &Path,
    ) -> Result<StaticFile, ApiError> {
        let mut body = MultipartBody::new();
        body.add_field("name", name);
        body.add_field("type", "GEOSERVER-STYLE");
        body.add_file_field("file", path)?;
        self.api.post_multipart(&self.base_url(datastore), body).await
    }

    /// Replace the file behind an existing style static.
    pub async fn update_file(
        &self,
        datastore: &str,
        static_file: &str,
        path: &Path,
    ) -> Result<(), ApiError> {
        let url = format!("{}/{}", self.base_url(datastore), static_file);
        let mut body = MultipartBody::new();
        body.add_file_field("file", path)?;
        self.api.put_multipart_unit(&url, body).await
    }

    pub async fn delete(&self, datastore: &str, static_file: &str) -> Result<(), ApiError> {
        let url = format!("{}/{}", self.base_url(datastore), static_file);
        self.api.delete(&url).await
    }
}
