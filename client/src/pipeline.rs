//! Upload → database integration → publication.
//!
//! The platform does the actual work; this module creates the jobs and
//! watches them. Polling is bounded: a fixed tick, a retry budget with
//! exponential backoff for failed polls, an overall deadline, and a
//! cancellation token. A stuck server ends the pipeline with an error
//! instead of being polled forever.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use async_stream::try_stream;
use futures_util::Stream;
use log::{debug, warn};
use tokio::time::{interval, sleep, sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use common::checktree::CheckTree;
use common::data::{
    ConfigurationType, Execution, ExecutionStatus, Offering, StoredDataStatus, UploadStatus,
};
use common::payloads::{
    CreateConfiguration, CreateExecution, CreateOffering, CreateUpload, WmsVectorRelation,
};

use crate::error::ApiError;
use crate::http::ApiClient;
use crate::resources::relations_from_tree;

/// Names the vector-db integration processing has been published under.
const INTEGRATION_PROCESSING_NAMES: &[&str] = &[
    "Intégration de données vecteur livrées en base",
    "Intégration de vecteurs livrés en base",
];

/// Names of the tile-pyramid generation processing.
pub const PYRAMID_PROCESSING_NAMES: &[&str] = &[
    "Calcul ou mise à jour de pyramide vecteur",
    "Création de pyramide vecteur",
];

#[derive(Clone, Debug)]
pub struct PollOptions {
    /// Tick of the status poll.
    pub interval: Duration,
    /// Consecutive failed polls tolerated before giving up. Each failure
    /// backs off exponentially (1, 2, 4, ... seconds).
    pub max_failures: u32,
    /// Deadline for the whole wait.
    pub timeout: Duration,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            max_failures: 7,
            timeout: Duration::from_secs(3600),
        }
    }
}

#[derive(Clone, Debug)]
pub enum PipelineEvent {
    UploadCreated { upload_id: String },
    FileSent { name: String },
    UploadClosing,
    UploadStatus { status: UploadStatus },
    ChecksProgress { passed: usize, failed: usize, total: usize },
    IntegrationStarted { execution_id: String, stored_data_id: String },
    IntegrationStatus { status: ExecutionStatus },
    StoredDataStatus { status: StoredDataStatus },
    DataReady { stored_data_id: String },
}

#[derive(Clone, Debug)]
pub struct UploadRequest {
    pub name: String,
    pub description: String,
    pub srs: String,
    pub files: Vec<PathBuf>,
}

impl UploadRequest {
    pub fn new(name: &str, srs: &str, files: Vec<PathBuf>) -> Self {
        Self {
            name: name.to_string(),
            description: name.to_string(),
            srs: srs.to_string(),
            files,
        }
    }
}

#[derive(Clone, Debug)]
pub struct PublishRequest {
    pub kind: ConfigurationType,
    pub name: String,
    pub layer_name: String,
    pub title: String,
    pub summary: String,
    /// (title, url) shown as the layer attribution.
    pub attribution: Option<(String, String)>,
    /// Tables to publish; empty means every table of the stored data.
    pub tables: Vec<String>,
    /// SLD file, required for WMS-VECTOR.
    pub style: Option<PathBuf>,
    /// Zoom range of a WMTS-TMS publication.
    pub bottom_level: String,
    pub top_level: String,
    /// Extra tags stamped on the created configuration.
    pub tags: BTreeMap<String, String>,
}

impl PublishRequest {
    pub fn new(kind: ConfigurationType, name: &str, layer_name: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
            layer_name: layer_name.to_string(),
            title: name.to_string(),
            summary: name.to_string(),
            attribution: None,
            tables: Vec::new(),
            style: None,
            bottom_level: "18".to_string(),
            top_level: "8".to_string(),
            tags: BTreeMap::new(),
        }
    }
}

pub struct Pipeline<'a> {
    api: &'a ApiClient,
    datastore: String,
    options: PollOptions,
    cancel: CancellationToken,
}

impl<'a> Pipeline<'a> {
    pub fn new(api: &'a ApiClient, datastore: &str) -> Self {
        let options = PollOptions {
            interval: api.settings().check_interval,
            ..PollOptions::default()
        };
        Self {
            api,
            datastore: datastore.to_string(),
            options,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_options(mut self, options: PollOptions) -> Self {
        self.options = options;
        self
    }

    /// Token callers can keep to abort the pipeline from elsewhere.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// One failed poll: burn a retry, back off, or give up.
    async fn absorb<T, Fut>(&self, failures: &mut u32, fut: Fut) -> Result<Option<T>, ApiError>
    where
        Fut: Future<Output = Result<T, ApiError>>,
    {
        match fut.await {
            Ok(value) => {
                *failures = 0;
                Ok(Some(value))
            }
            Err(e) => {
                *failures += 1;
                if *failures > self.options.max_failures {
                    return Err(e);
                }
                let to_sleep = 1u64 << (*failures - 1).min(6);
                warn!(
                    "poll failed ({e}); retry {}/{} in {to_sleep}s",
                    failures, self.options.max_failures
                );
                sleep(Duration::from_secs(to_sleep)).await;
                Ok(None)
            }
        }
    }

    /// Create the upload, deliver the files, close it, then watch the checks
    /// and the integration job until the stored data is generated.
    pub fn run(
        &self,
        request: UploadRequest,
    ) -> impl Stream<Item = Result<PipelineEvent, ApiError>> + '_ {
        try_stream! {
            let uploads = self.api.uploads();
            let body = CreateUpload::vector(&request.name, &request.description, &request.srs);
            let upload = uploads.create(&self.datastore, &body).await?;
            debug!("created upload {}", upload.id);
            yield PipelineEvent::UploadCreated { upload_id: upload.id.clone() };

            for path in &request.files {
                uploads.upload_file(&self.datastore, &upload.id, path).await?;
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| path.display().to_string());
                yield PipelineEvent::FileSent { name };
            }

            uploads.close(&self.datastore, &upload.id).await?;
            yield PipelineEvent::UploadClosing;

            let deadline = Instant::now() + self.options.timeout;
            let mut ticker = interval(self.options.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut failures = 0u32;

            // Checks run while the upload converges on CLOSED.
            loop {
                let tick: Result<(), ApiError> = tokio::select! {
                    _ = ticker.tick() => Ok(()),
                    _ = self.cancel.cancelled() => Err(ApiError::Cancelled),
                    _ = sleep_until(deadline) => Err(ApiError::Timeout),
                };
                tick?;
                let Some(status) = self
                    .absorb(&mut failures, uploads.status(&self.datastore, &upload.id))
                    .await?
                else {
                    continue;
                };
                let Some(checks) = self
                    .absorb(&mut failures, uploads.checks(&self.datastore, &upload.id))
                    .await?
                else {
                    continue;
                };
                yield PipelineEvent::ChecksProgress {
                    passed: checks.passed.len(),
                    failed: checks.failed.len(),
                    total: checks.execution_ids().len(),
                };
                yield PipelineEvent::UploadStatus { status: status.clone() };

                match status {
                    UploadStatus::Closed => break,
                    UploadStatus::Unstable | UploadStatus::Deleted => {
                        let logs = self.check_failure_logs(&upload.id).await;
                        Err(ApiError::JobFailed { status: status.to_string(), logs })?;
                    }
                    _ => {}
                }
            }

            // Upload is closed: run the database integration.
            let processings = self.api.processings();
            let processing = processings
                .find_by_names(&self.datastore, INTEGRATION_PROCESSING_NAMES)
                .await?;
            let body = CreateExecution::from_upload(&processing.id, &upload.id, &request.name);
            let execution = processings.create_execution(&self.datastore, &body).await?;
            let stored_data_id = execution
                .output_stored_data_id()
                .ok_or_else(|| {
                    ApiError::Decode("no output stored data on created execution".to_string())
                })?
                .to_string();

            let mut tags = BTreeMap::new();
            tags.insert("upload_id".to_string(), upload.id.clone());
            tags.insert("proc_int_id".to_string(), execution.id.clone());
            self.api
                .stored_data()
                .add_tags(&self.datastore, &stored_data_id, &tags)
                .await?;

            processings.launch(&self.datastore, &execution.id).await?;
            yield PipelineEvent::IntegrationStarted {
                execution_id: execution.id.clone(),
                stored_data_id: stored_data_id.clone(),
            };

            // Watch the stored data until it is generated.
            loop {
                let tick: Result<(), ApiError> = tokio::select! {
                    _ = ticker.tick() => Ok(()),
                    _ = self.cancel.cancelled() => Err(ApiError::Cancelled),
                    _ = sleep_until(deadline) => Err(ApiError::Timeout),
                };
                tick?;
                let Some(stored_data) = self
                    .absorb(
                        &mut failures,
                        self.api.stored_data().get(&self.datastore, &stored_data_id),
                    )
                    .await?
                else {
                    continue;
                };

                if let Some(proc_int_id) = stored_data.tag("proc_int_id") {
                    if let Some(exec) = self
                        .absorb(&mut failures, processings.execution(&self.datastore, proc_int_id))
                        .await?
                    {
                        yield PipelineEvent::IntegrationStatus { status: exec.status };
                    }
                }
                yield PipelineEvent::StoredDataStatus { status: stored_data.status.clone() };

                match stored_data.status {
                    StoredDataStatus::Generated => {
                        yield PipelineEvent::DataReady { stored_data_id: stored_data_id.clone() };
                        break;
                    }
                    StoredDataStatus::Unstable | StoredDataStatus::Deleted => {
                        let logs = processings
                            .execution_logs(&self.datastore, &execution.id)
                            .await
                            .unwrap_or_default();
                        Err(ApiError::JobFailed {
                            status: stored_data.status.to_string(),
                            logs,
                        })?;
                    }
                    _ => {}
                }
            }
        }
    }

    /// Best-effort log collection for a failed upload; never masks the
    /// failure it documents.
    async fn check_failure_logs(&self, upload: &str) -> String {
        let Ok(report) = self.api.uploads().checks(&self.datastore, upload).await else {
            return String::new();
        };
        let checks = self.api.checks();
        let mut logs = String::new();
        for failed in &report.failed {
            if let Ok(text) = checks.execution_logs(&self.datastore, &failed.id).await {
                logs.push_str(&text);
            }
        }
        logs
    }

    /// Bounded poll of any execution until it reaches a terminal status.
    /// FAILURE and ABORTED come back as [`ApiError::JobFailed`] with the
    /// execution logs attached.
    pub async fn wait_for_execution(&self, execution_id: &str) -> Result<Execution, ApiError> {
        let processings = self.api.processings();
        let deadline = Instant::now() + self.options.timeout;
        let mut ticker = interval(self.options.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut failures = 0u32;
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.cancel.cancelled() => return Err(ApiError::Cancelled),
                _ = sleep_until(deadline) => return Err(ApiError::Timeout),
            }
            let Some(execution) = self
                .absorb(&mut failures, processings.execution(&self.datastore, execution_id))
                .await?
            else {
                continue;
            };
            if !execution.status.is_terminal() {
                continue;
            }
            if execution.status == ExecutionStatus::Success {
                return Ok(execution);
            }
            let logs = processings
                .execution_logs(&self.datastore, execution_id)
                .await
                .unwrap_or_default();
            return Err(ApiError::JobFailed {
                status: execution.status.to_string(),
                logs,
            });
        }
    }

    /// Generate a tile pyramid from a generated vector db and wait for it.
    /// Returns the pyramid stored data id.
    pub async fn generate_pyramid(
        &self,
        vectordb_id: &str,
        output_name: &str,
    ) -> Result<String, ApiError> {
        let processings = self.api.processings();
        let processing = processings
            .find_by_names(&self.datastore, PYRAMID_PROCESSING_NAMES)
            .await?;
        let body = CreateExecution::from_stored_data(&processing.id, vectordb_id, output_name);
        let execution = processings.create_execution(&self.datastore, &body).await?;
        let pyramid_id = execution
            .output_stored_data_id()
            .ok_or_else(|| {
                ApiError::Decode("no output stored data on created execution".to_string())
            })?
            .to_string();

        let mut tags = BTreeMap::new();
        tags.insert("vectordb_id".to_string(), vectordb_id.to_string());
        tags.insert("proc_pyr_creat_id".to_string(), execution.id.clone());
        self.api
            .stored_data()
            .add_tags(&self.datastore, &pyramid_id, &tags)
            .await?;

        processings.launch(&self.datastore, &execution.id).await?;
        self.wait_for_execution(&execution.id).await?;
        Ok(pyramid_id)
    }

    /// Publish a generated stored data: configuration, endpoint lookup,
    /// offering, then the cross-reference tags.
    pub async fn publish(
        &self,
        stored_data_id: &str,
        request: &PublishRequest,
    ) -> Result<Offering, ApiError> {
        let stored_data = self.api.stored_data().get(&self.datastore, stored_data_id).await?;

        let mut body = match request.kind {
            ConfigurationType::WmtsTms => CreateConfiguration::wmts_tms(
                &request.name,
                &request.layer_name,
                stored_data_id,
                &request.title,
                &request.summary,
                &request.bottom_level,
                &request.top_level,
            ),
            ConfigurationType::Wfs => {
                let relations = relations_from_tree(&self.table_selection(&stored_data, request)?);
                CreateConfiguration::wfs(
                    &request.name,
                    &request.layer_name,
                    stored_data_id,
                    &request.title,
                    &request.summary,
                    relations,
                )
            }
            ConfigurationType::WmsVector => {
                let style_path = request.style.as_ref().ok_or_else(|| {
                    ApiError::Unavailable(
                        "a style file is required for a WMS-VECTOR publication".to_string(),
                    )
                })?;
                let style = self
                    .api
                    .statics()
                    .create_geoserver_style(
                        &self.datastore,
                        &format!("{}_style", request.layer_name),
                        style_path,
                    )
                    .await?;
                let tree = self.table_selection(&stored_data, request)?;
                let relations = relations_from_tree(&tree)
                    .into_iter()
                    .map(|r| WmsVectorRelation {
                        name: r.native_name,
                        style: style.id.clone(),
                    })
                    .collect();
                CreateConfiguration::wms_vector(
                    &request.name,
                    &request.layer_name,
                    stored_data_id,
                    &request.title,
                    &request.summary,
                    relations,
                )
            }
        };
        if let Some((title, url)) = &request.attribution {
            body = body.with_attribution(title, url);
        }

        let configuration = self.api.configurations().create(&self.datastore, &body).await?;
        let endpoint = self
            .api
            .datastores()
            .endpoint(&self.datastore, &request.kind.to_string())
            .await?;
        let offering = self
            .api
            .offerings()
            .create(&self.datastore, &configuration.id, &CreateOffering::public(&endpoint))
            .await?;

        if !request.tags.is_empty() {
            self.api
                .configurations()
                .add_tags(&self.datastore, &configuration.id, &request.tags)
                .await?;
        }
        let mut tags = BTreeMap::new();
        tags.insert("published".to_string(), "true".to_string());
        if let Some(url) = offering.first_url() {
            tags.insert("tms_url".to_string(), url.to_string());
        }
        self.api
            .stored_data()
            .add_tags(&self.datastore, stored_data_id, &tags)
            .await?;

        Ok(offering)
    }

    fn table_selection(
        &self,
        stored_data: &common::data::StoredData,
        request: &PublishRequest,
    ) -> Result<CheckTree<String>, ApiError> {
        let mut tree = CheckTree::new();
        for table in stored_data.tables() {
            let id = tree.add_root(table.name.clone());
            for attribute in table.attributes.keys() {
                tree.add_child(id, attribute.clone());
            }
            if request.tables.is_empty() || request.tables.contains(&table.name) {
                tree.set_checked(id, true);
            }
        }
        if tree.selected_roots().is_empty() {
            return Err(ApiError::Unavailable(format!(
                "none of the requested tables {:?} exist in stored data {}",
                request.tables, stored_data.id
            )));
        }
        Ok(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_poll_options() {
        let options = PollOptions::default();
        assert_eq!(options.interval, Duration::from_millis(500));
        assert_eq!(options.max_failures, 7);
    }

    #[test]
    fn upload_request_defaults_description_to_name() {
        let request = UploadRequest::new("communes", "EPSG:4326", vec![]);
        assert_eq!(request.description, "communes");
    }

    #[test]
    fn publish_request_zoom_defaults() {
        let request = PublishRequest::new(ConfigurationType::WmtsTms, "communes", "communes_tms");
        assert_eq!(request.bottom_level, "18");
        assert_eq!(request.top_level, "8");
        assert_eq!(request.title, "communes");
    }
}
