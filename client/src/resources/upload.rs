use std::fs;
use std::path::Path;

use common::data::{CheckExecution, ResourceRef, Upload, UploadCheckReport, UploadStatus};
use common::payloads::CreateUpload;

use crate::error::ApiError;
use crate::http::ApiClient;
use crate::multipart::MultipartBody;
use crate::pagination::{collect_pages, MAX_LIMIT};
use crate::resources::CheckClient;

pub struct UploadClient<'a> {
    api: &'a ApiClient,
}

impl<'a> UploadClient<'a> {
    pub(crate) fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    fn base_url(&self, datastore: &str) -> String {
        self.api.datastore_url(datastore, "uploads")
    }

    pub async fn create(&self, datastore: &str, body: &CreateUpload) -> Result<Upload, ApiError> {
        self.api.post(&self.base_url(datastore), body).await
    }

    pub async fn get(&self, datastore: &str, upload: &str) -> Result<Upload, ApiError> {
        let url = format!("{}/{}", self.base_url(datastore), upload);
        self.api.get(&url).await
    }

    pub async fn status(&self, datastore: &str, upload: &str) -> Result<UploadStatus, ApiError> {
        Ok(self.get(datastore, upload).await?.status)
    }

    pub async fn list(&self, datastore: &str) -> Result<Vec<Upload>, ApiError> {
        let probe = format!("{}?limit=1", self.base_url(datastore));
        let (_, total) = self.api.get_with_total(&probe).await?;
        collect_pages(total, MAX_LIMIT, move |page, limit| {
            self.page(datastore, page, limit)
        })
        .await
    }

    async fn page(&self, datastore: &str, page: u64, limit: u64) -> Result<Vec<Upload>, ApiError> {
        let url = format!("{}?page={page}&limit={limit}", self.base_url(datastore));
        let refs: Vec<ResourceRef> = self.api.get(&url).await?;
        let mut uploads = Vec::with_capacity(refs.len());
        for r in refs {
            uploads.push(self.get(datastore, &r.id).await?);
        }
        Ok(uploads)
    }

    /// Deliver one file into an open upload, followed by the `.md5` sidecar
    /// the platform verifies the delivery against.
    pub async fn upload_file(
        &self,
        datastore: &str,
        upload: &str,
        path: &Path,
    ) -> Result<(), ApiError> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ApiError::Io(format!("no file name in {}", path.display())))?
            .to_string();
        let digest = common::md5_file(fs::File::open(path)?)?;
        let url = format!("{}/{}/data", self.base_url(datastore), upload);

        let mut body = MultipartBody::new();
        body.add_file_field("file", path)?;
        self.api.post_multipart_unit(&url, body).await?;

        let mut sidecar = MultipartBody::new();
        sidecar.add_bytes_field(
            "file",
            &format!("{filename}.md5"),
            "text/plain",
            format!("{digest}  {filename}\n").as_bytes(),
        );
        self.api.post_multipart_unit(&url, sidecar).await
    }

    /// Close the upload; the platform then runs its checks and the status
    /// moves from OPEN towards CLOSED.
    pub async fn close(&self, datastore: &str, upload: &str) -> Result<(), ApiError> {
        let url = format!("{}/{}/close", self.base_url(datastore), upload);
        self.api.post_empty(&url).await
    }

    pub async fn delete(&self, datastore: &str, upload: &str) -> Result<(), ApiError> {
        let url = format!("{}/{}", self.base_url(datastore), upload);
        self.api.delete(&url).await
    }

    pub async fn checks(
        &self,
        datastore: &str,
        upload: &str,
    ) -> Result<UploadCheckReport, ApiError> {
        let url = format!("{}/{}/checks", self.base_url(datastore), upload);
        self.api.get(&url).await
    }

    /// Every check execution attached to the upload, whatever its bucket.
    pub async fn check_executions(
        &self,
        datastore: &str,
        upload: &str,
    ) -> Result<Vec<CheckExecution>, ApiError> {
        let report = self.checks(datastore, upload).await?;
        let checks = CheckClient::new(self.api);
        let mut executions = Vec::new();
        for id in report.execution_ids() {
            executions.push(checks.execution(datastore, id).await?);
        }
        Ok(executions)
    }
}
