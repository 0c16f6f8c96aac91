use common::data::CheckExecution;

use crate::error::ApiError;
use crate::http::ApiClient;

pub struct CheckClient<'a> {
    api: &'a ApiClient,
}

impl<'a> CheckClient<'a> {
    pub(crate) fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    fn base_url(&self, datastore: &str) -> String {
        self.api.datastore_url(datastore, "checks")
    }

    pub async fn execution(&self, datastore: &str, execution: &str) -> Result<CheckExecution, ApiError> {
        let url = format!("{}/executions/{}", self.base_url(datastore), execution);
        self.api.get(&url).await
    }

    /// Check logs come back in one piece; only processing executions page
    /// their logs.
    pub async fn execution_logs(&self, datastore: &str, execution: &str) -> Result<String, ApiError> {
        let url = format!("{}/executions/{}/logs", self.base_url(datastore), execution);
        self.api.get_text(&url).await
    }
}
