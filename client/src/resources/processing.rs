use url::Url;

use common::data::{Execution, Processing, ResourceRef};
use common::payloads::CreateExecution;

use crate::error::ApiError;
use crate::http::ApiClient;
use crate::pagination::{collect_log_pages, MAX_LIMIT};

pub struct ProcessingClient<'a> {
    api: &'a ApiClient,
}

impl<'a> ProcessingClient<'a> {
    pub(crate) fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    fn base_url(&self, datastore: &str) -> String {
        self.api.datastore_url(datastore, "processings")
    }

    pub async fn list(&self, datastore: &str) -> Result<Vec<Processing>, ApiError> {
        self.api.get(&self.base_url(datastore)).await
    }

    /// The platform renames its processings between releases; callers pass
    /// every name a processing has been known under.
    pub async fn find_by_names(
        &self,
        datastore: &str,
        names: &[&str],
    ) -> Result<Processing, ApiError> {
        self.list(datastore)
            .await?
            .into_iter()
            .find(|p| names.contains(&p.name.as_str()))
            .ok_or_else(|| {
                ApiError::Unavailable(format!("processing {names:?} not available on server"))
            })
    }

    pub async fn find_by_ids(&self, datastore: &str, ids: &[&str]) -> Result<Processing, ApiError> {
        self.list(datastore)
            .await?
            .into_iter()
            .find(|p| ids.contains(&p.id.as_str()))
            .ok_or_else(|| {
                ApiError::Unavailable(format!("processing {ids:?} not available on server"))
            })
    }

    /// Create an execution; it does not run until [`Self::launch`] is called,
    /// which leaves a window to tag its output stored data.
    pub async fn create_execution(
        &self,
        datastore: &str,
        body: &CreateExecution,
    ) -> Result<Execution, ApiError> {
        let url = format!("{}/executions", self.base_url(datastore));
        self.api.post(&url, body).await
    }

    pub async fn launch(&self, datastore: &str, execution: &str) -> Result<(), ApiError> {
        let url = format!("{}/executions/{}/launch", self.base_url(datastore), execution);
        self.api.post_empty(&url).await
    }

    pub async fn execution(&self, datastore: &str, execution: &str) -> Result<Execution, ApiError> {
        let url = format!("{}/executions/{}", self.base_url(datastore), execution);
        self.api.get(&url).await
    }

    pub async fn executions_for_stored_data(
        &self,
        datastore: &str,
        stored_data: &str,
    ) -> Result<Vec<Execution>, ApiError> {
        let base = format!("{}/executions", self.base_url(datastore));
        let url =
            Url::parse_with_params(&base, &[("output_stored_data", stored_data)]).unwrap();
        let refs: Vec<ResourceRef> = self.api.get(url.as_str()).await?;
        let mut executions = Vec::with_capacity(refs.len());
        for r in refs {
            executions.push(self.execution(datastore, &r.id).await?);
        }
        Ok(executions)
    }

    /// Full log text of an execution, rebuilt from the paged log endpoint.
    pub async fn execution_logs(&self, datastore: &str, execution: &str) -> Result<String, ApiError> {
        let base = format!("{}/executions/{}/logs", self.base_url(datastore), execution);
        let (_, total) = self.api.get_with_total(&format!("{base}?limit=1")).await?;
        collect_log_pages(total, MAX_LIMIT, move |page, limit| {
            let url = format!("{base}?page={page}&limit={limit}");
            async move { self.api.get_text(&url).await }
        })
        .await
    }
}
