use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

fn status_str(v: &impl Serialize) -> String {
    serde_json::to_value(v)
        .unwrap()
        .as_str()
        .unwrap()
        .to_string()
}

/// Bare `{"_id": ...}` element of a collection page.
/// List endpoints only return ids; the full resource is re-fetched per id.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ResourceRef {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct QuotaUse {
    #[serde(rename = "use")]
    pub used: u64,
    pub quota: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct StorageUse {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "use")]
    pub used: u64,
    pub quota: u64,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Storages {
    #[serde(default)]
    pub data: Vec<StorageUse>,
    pub uploads: Option<QuotaUse>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct EndpointUrl {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub url: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Endpoint {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub urls: Vec<EndpointUrl>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct EndpointSlot {
    pub endpoint: Endpoint,
}

/// A tenant-scoped storage/processing account on the platform.
/// Read-only mirror of server state, fetched on demand and never cached.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Datastore {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub technical_name: String,
    #[serde(default)]
    pub storages: Storages,
    #[serde(default)]
    pub endpoints: Vec<EndpointSlot>,
}

impl Datastore {
    /// (use, quota) for a storage backend ("POSTGRESQL", "FILESYSTEM" or "S3").
    pub fn storage_use_and_quota(&self, kind: &str) -> (u64, u64) {
        self.storages
            .data
            .iter()
            .find(|s| s.kind == kind)
            .map(|s| (s.used, s.quota))
            .unwrap_or((0, 0))
    }

    pub fn upload_use_and_quota(&self) -> (u64, u64) {
        self.storages
            .uploads
            .as_ref()
            .map(|u| (u.used, u.quota))
            .unwrap_or((0, 0))
    }

    /// First endpoint able to serve `kind` ("WMTS-TMS", "WMS-VECTOR", "WFS").
    pub fn endpoint_id(&self, kind: &str) -> Option<&str> {
        self.endpoints
            .iter()
            .map(|s| &s.endpoint)
            .find(|e| e.kind == kind)
            .map(|e| e.id.as_str())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum UploadStatus {
    Created,
    Generating,
    Unstable,
    Open,
    Closed,
    Checking,
    Deleted,
    /// The platform occasionally grows upload statuses; don't fail the whole
    /// deserialization over one.
    #[serde(untagged)]
    Other(String),
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", status_str(self))
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Upload {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub status: UploadStatus,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub srs: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum StoredDataStatus {
    Created,
    Generating,
    Generated,
    Unstable,
    Modifying,
    Deleted,
}

impl fmt::Display for StoredDataStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", status_str(self))
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct TableRelation {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    pub primary_key: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct TypeInfos {
    #[serde(default)]
    pub relations: Vec<TableRelation>,
    #[serde(default)]
    pub levels: Vec<String>,
}

/// A named dataset resource on the server (vector db, pyramid, ...).
/// `tags` is free-form and stashes cross-references like `upload_id`,
/// `proc_int_id` or `vectordb_id`.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct StoredData {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub status: StoredDataStatus,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    pub type_infos: Option<TypeInfos>,
}

impl StoredData {
    /// Database tables of a vector-db stored data, empty otherwise.
    pub fn tables(&self) -> Vec<&TableRelation> {
        match &self.type_infos {
            Some(infos) => infos.relations.iter().filter(|r| r.kind == "TABLE").collect(),
            None => Vec::new(),
        }
    }

    /// Zoom levels of a pyramid stored data, empty otherwise.
    pub fn zoom_levels(&self) -> &[String] {
        match &self.type_infos {
            Some(infos) => &infos.levels,
            None => &[],
        }
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExecutionStatus {
    Created,
    Waiting,
    Progress,
    Success,
    Failure,
    Aborted,
}

impl ExecutionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failure | Self::Aborted)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", status_str(self))
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Processing {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

/// A server-side asynchronous job run record. All fields are
/// server-authoritative; the client only polls and displays them.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Execution {
    #[serde(rename = "_id")]
    pub id: String,
    pub status: ExecutionStatus,
    pub processing: Processing,
    pub creation: Option<String>,
    pub launch: Option<String>,
    pub start: Option<String>,
    pub finish: Option<String>,
    #[serde(default)]
    pub parameters: Value,
    #[serde(default)]
    pub inputs: Value,
    #[serde(default)]
    pub output: Value,
}

impl Execution {
    /// Id of the stored data this execution writes, when it has one.
    pub fn output_stored_data_id(&self) -> Option<&str> {
        self.output
            .get("stored_data")
            .and_then(|sd| sd.get("_id"))
            .and_then(Value::as_str)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckStatus {
    Waiting,
    Progress,
    Success,
    Failure,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", status_str(self))
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Check {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CheckExecution {
    #[serde(rename = "_id")]
    pub id: String,
    pub status: CheckStatus,
    pub check: Check,
    pub creation: Option<String>,
    pub start: Option<String>,
    pub finish: Option<String>,
}

/// Check executions attached to an upload, keyed by their progress bucket.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct UploadCheckReport {
    #[serde(default)]
    pub asked: Vec<ResourceRef>,
    #[serde(default)]
    pub in_progress: Vec<ResourceRef>,
    #[serde(default)]
    pub passed: Vec<ResourceRef>,
    #[serde(default)]
    pub failed: Vec<ResourceRef>,
}

impl UploadCheckReport {
    pub fn execution_ids(&self) -> Vec<&str> {
        self.asked
            .iter()
            .chain(&self.in_progress)
            .chain(&self.passed)
            .chain(&self.failed)
            .map(|r| r.id.as_str())
            .collect()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub enum ConfigurationType {
    #[serde(rename = "WMS-VECTOR")]
    WmsVector,
    #[serde(rename = "WMTS-TMS")]
    WmtsTms,
    #[serde(rename = "WFS")]
    Wfs,
}

impl fmt::Display for ConfigurationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", status_str(self))
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Attribution {
    pub title: String,
    pub url: String,
}

/// Publication metadata for an OGC service, prior to any offering.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Configuration {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ConfigurationType,
    pub name: String,
    pub layer_name: String,
    pub status: Option<String>,
    #[serde(default)]
    pub type_infos: Value,
    pub attribution: Option<Attribution>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

/// Endpoint URLs come back typed on recent platform versions and as plain
/// strings on older ones.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(untagged)]
pub enum OfferingUrl {
    Typed {
        #[serde(rename = "type")]
        kind: String,
        url: String,
    },
    Plain(String),
}

impl OfferingUrl {
    pub fn url(&self) -> &str {
        match self {
            OfferingUrl::Typed { url, .. } => url,
            OfferingUrl::Plain(url) => url,
        }
    }
}

/// A published service: the visible result of a configuration bound to an
/// endpoint.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Offering {
    #[serde(rename = "_id")]
    pub id: String,
    pub open: Option<bool>,
    pub available: Option<bool>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub status: Option<String>,
    pub layer_name: Option<String>,
    pub visibility: Option<String>,
    pub endpoint: Option<Endpoint>,
    pub configuration: Option<ResourceRef>,
    #[serde(default)]
    pub urls: Vec<OfferingUrl>,
}

impl Offering {
    pub fn first_url(&self) -> Option<&str> {
        self.urls.first().map(OfferingUrl::url)
    }
}

/// A static file stored on the platform, e.g. a GeoServer SLD style.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct StaticFile {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub description: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,
    pub email: Option<String>,
    pub creation: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ApiKey {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub user_agent: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serialization() {
        let tests = [
            (UploadStatus::Open, "OPEN"),
            (UploadStatus::Closed, "CLOSED"),
            (UploadStatus::Other("QUARANTINED".to_string()), "QUARANTINED"),
        ];
        for (src, expected) in tests {
            assert_eq!(
                serde_json::from_str::<UploadStatus>(&serde_json::to_string(&src).unwrap())
                    .unwrap(),
                src
            );
            assert_eq!(format!("{}", &src), expected);
            assert_eq!(
                serde_json::to_value(src.clone()).unwrap().as_str().unwrap(),
                expected
            );
        }
    }

    #[test]
    fn terminal_execution_statuses() {
        assert!(ExecutionStatus::Success.is_terminal());
        assert!(ExecutionStatus::Failure.is_terminal());
        assert!(ExecutionStatus::Aborted.is_terminal());
        assert!(!ExecutionStatus::Progress.is_terminal());
        assert!(!ExecutionStatus::Waiting.is_terminal());
    }

    #[test]
    fn stored_data_tables_and_levels() {
        let raw = serde_json::json!({
            "_id": "sd1",
            "name": "communes",
            "type": "VECTOR-DB",
            "status": "GENERATED",
            "tags": {"upload_id": "u1"},
            "type_infos": {
                "relations": [
                    {"name": "commune", "type": "TABLE",
                     "attributes": {"nom": "varchar", "geom": "geometry"},
                     "primary_key": "fid"},
                    {"name": "commune_idx", "type": "INDEX", "attributes": {}}
                ]
            }
        });
        let sd: StoredData = serde_json::from_value(raw).unwrap();
        assert_eq!(sd.status, StoredDataStatus::Generated);
        let tables = sd.tables();
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].name, "commune");
        assert!(sd.zoom_levels().is_empty());
        assert_eq!(sd.tag("upload_id"), Some("u1"));
    }

    #[test]
    fn datastore_quota_lookup() {
        let raw = serde_json::json!({
            "_id": "ds",
            "name": "Sandbox",
            "technical_name": "sandbox",
            "storages": {
                "data": [
                    {"type": "POSTGRESQL", "use": 12, "quota": 100},
                    {"type": "S3", "use": 4, "quota": 50}
                ],
                "uploads": {"use": 1, "quota": 10}
            },
            "endpoints": [
                {"endpoint": {"_id": "ep1", "name": "WMTS", "type": "WMTS-TMS", "urls": []}}
            ]
        });
        let ds: Datastore = serde_json::from_value(raw).unwrap();
        assert_eq!(ds.storage_use_and_quota("POSTGRESQL"), (12, 100));
        assert_eq!(ds.storage_use_and_quota("FILESYSTEM"), (0, 0));
        assert_eq!(ds.upload_use_and_quota(), (1, 10));
        assert_eq!(ds.endpoint_id("WMTS-TMS"), Some("ep1"));
        assert_eq!(ds.endpoint_id("WFS"), None);
    }

    #[test]
    fn execution_output_stored_data() {
        let raw = serde_json::json!({
            "_id": "e1",
            "status": "PROGRESS",
            "processing": {"_id": "p1", "name": "integration"},
            "creation": "2024-01-01T00:00:00Z",
            "inputs": {"upload": [{"_id": "u1"}]},
            "output": {"stored_data": {"_id": "sd1", "name": "communes"}}
        });
        let exec: Execution = serde_json::from_value(raw).unwrap();
        assert_eq!(exec.output_stored_data_id(), Some("sd1"));
        assert_eq!(exec.processing.name, "integration");
        assert!(exec.launch.is_none());
    }

    #[test]
    fn offering_url_forms() {
        let typed: Offering = serde_json::from_value(serde_json::json!({
            "_id": "o1",
            "urls": [{"type": "TMS", "url": "https://example.org/tms"}]
        }))
        .unwrap();
        let plain: Offering = serde_json::from_value(serde_json::json!({
            "_id": "o2",
            "urls": ["https://example.org/wmts"]
        }))
        .unwrap();
        assert_eq!(typed.first_url(), Some("https://example.org/tms"));
        assert_eq!(plain.first_url(), Some("https://example.org/wmts"));
    }
}
