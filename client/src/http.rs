//! HTTP verb wrappers over [`reqwest`].
//!
//! Every non-success status and every transport failure is normalized into a
//! single error kind carrying a readable description, extracted from the
//! platform's `{error, error_description}` body when the server sent one.

use log::{debug, error};
use reqwest::header::{HeaderValue, CONTENT_RANGE, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use common::payloads::ApiErrorBody;

use crate::error::ApiError;
use crate::multipart::MultipartBody;
use crate::pagination;
use crate::resources::{
    CheckClient, ConfigurationClient, DatastoreClient, OfferingClient, ProcessingClient,
    StaticClient, StoredDataClient, UploadClient, UserClient,
};
use crate::settings::Settings;

pub struct ApiClient {
    http: Client,
    settings: Settings,
}

impl ApiClient {
    pub fn new(settings: Settings) -> Result<Self, ApiError> {
        let http = Client::builder()
            .user_agent(settings.user_agent.clone())
            .timeout(settings.request_timeout)
            .build()?;
        Ok(Self { http, settings })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn base_url(&self) -> &str {
        &self.settings.base_url
    }

    /// `{base}/datastores/{datastore}/{suffix}` — the root of almost every
    /// resource path.
    pub fn datastore_url(&self, datastore: &str, suffix: &str) -> String {
        format!("{}/datastores/{}/{}", self.settings.base_url, datastore, suffix)
    }

    pub fn datastores(&self) -> DatastoreClient<'_> {
        DatastoreClient::new(self)
    }

    pub fn uploads(&self) -> UploadClient<'_> {
        UploadClient::new(self)
    }

    pub fn stored_data(&self) -> StoredDataClient<'_> {
        StoredDataClient::new(self)
    }

    pub fn processings(&self) -> ProcessingClient<'_> {
        ProcessingClient::new(self)
    }

    pub fn checks(&self) -> CheckClient<'_> {
        CheckClient::new(self)
    }

    pub fn configurations(&self) -> ConfigurationClient<'_> {
        ConfigurationClient::new(self)
    }

    pub fn offerings(&self) -> OfferingClient<'_> {
        OfferingClient::new(self)
    }

    pub fn statics(&self) -> StaticClient<'_> {
        StaticClient::new(self)
    }

    pub fn users(&self) -> UserClient<'_> {
        UserClient::new(self)
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.settings.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send(&self, method: &str, url: &str, req: RequestBuilder) -> Result<Response, ApiError> {
        debug!("{method} {url}");
        let resp = self.authed(req).send().await?;
        let status = resp.status();
        if !status.is_success() {
            // The platform puts the interesting part in the body.
            let fallback = status.to_string();
            let text = resp.text().await.unwrap_or_default();
            let description = if text.trim().is_empty() {
                fallback
            } else {
                match serde_json::from_str::<ApiErrorBody>(&text) {
                    Ok(body) => body.describe(&fallback),
                    Err(e) => format!("{fallback} (invalid JSON: {e})"),
                }
            };
            error!("{method} {url} failed: {description}");
            return Err(ApiError::Status {
                code: status.as_u16(),
                description,
            });
        }
        Ok(resp)
    }

    async fn json_body<T: DeserializeOwned>(method: &str, url: &str, resp: Response) -> Result<T, ApiError> {
        let mime = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        if !mime.starts_with("application/json") {
            return Err(ApiError::InvalidContentType(format!(
                "Response mime-type is '{mime}' not 'application/json' as required."
            )));
        }
        let text = resp.text().await?;
        debug!("{method} response from {url}. Received content size: {}", text.len());
        Ok(serde_json::from_str(&text)?)
    }

    pub async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        let resp = self.send("GET", url, self.http.get(url)).await?;
        Self::json_body("GET", url, resp).await
    }

    /// GET returning the raw body (execution logs are plain text pages).
    pub async fn get_text(&self, url: &str) -> Result<String, ApiError> {
        let resp = self.send("GET", url, self.http.get(url)).await?;
        Ok(resp.text().await?)
    }

    /// GET returning the body plus the collection total parsed from the
    /// `Content-Range` response header. This is the pagination probe.
    pub async fn get_with_total(&self, url: &str) -> Result<(String, u64), ApiError> {
        let resp = self.send("GET", url, self.http.get(url)).await?;
        let range = resp
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v: &HeaderValue| v.to_str().ok())
            .ok_or_else(|| {
                ApiError::InvalidContentRange(format!("No Content-Range header on {url}"))
            })?;
        let total = pagination::parse_content_range(range)?;
        Ok((resp.text().await?, total))
    }

    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let resp = self.send("POST", url, self.http.post(url).json(body)).await?;
        Self::json_body("POST", url, resp).await
    }

    /// POST where the response body is irrelevant (tag updates).
    pub async fn post_unit<B: Serialize>(&self, url: &str, body: &B) -> Result<(), ApiError> {
        self.send("POST", url, self.http.post(url).json(body)).await?;
        Ok(())
    }

    /// POST with an empty body (closing an upload, launching an execution).
    pub async fn post_empty(&self, url: &str) -> Result<(), ApiError> {
        self.send("POST", url, self.http.post(url)).await?;
        Ok(())
    }

    pub async fn put<B: Serialize, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let resp = self.send("PUT", url, self.http.put(url).json(body)).await?;
        Self::json_body("PUT", url, resp).await
    }

    pub async fn patch_unit<B: Serialize>(&self, url: &str, body: &B) -> Result<(), ApiError> {
        self.send("PATCH", url, self.http.patch(url).json(body)).await?;
        Ok(())
    }

    pub async fn delete(&self, url: &str) -> Result<(), ApiError> {
        self.send("DELETE", url, self.http.delete(url)).await?;
        Ok(())
    }

    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        url: &str,
        body: MultipartBody,
    ) -> Result<T, ApiError> {
        let content_type = body.content_type();
        let req = self
            .http
            .post(url)
            .header(CONTENT_TYPE, content_type)
            .body(body.finish());
        let resp = self.send("POST", url, req).await?;
        Self::json_body("POST", url, resp).await
    }

    pub async fn post_multipart_unit(&self, url: &str, body: MultipartBody) -> Result<(), ApiError> {
        let content_type = body.content_type();
        let req = self
            .http
            .post(url)
            .header(CONTENT_TYPE, content_type)
            .body(body.finish());
        self.send("POST", url, req).await?;
        Ok(())
    }

    pub async fn put_multipart_unit(&self, url: &str, body: MultipartBody) -> Result<(), ApiError> {
        let content_type = body.content_type();
        let req = self
            .http
            .put(url)
            .header(CONTENT_TYPE, content_type)
            .body(body.finish());
        self.send("PUT", url, req).await?;
        Ok(())
    }
}
