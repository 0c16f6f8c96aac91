use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::data::{Attribution, ConfigurationType};

/// Error body the platform attaches to non-2xx responses.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ApiErrorBody {
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Vec<String>,
}

impl ApiErrorBody {
    /// Human-readable description, falling back to the transport's own
    /// message when the body carries nothing better.
    pub fn describe(&self, fallback: &str) -> String {
        let error = self.error.as_deref().unwrap_or(fallback);
        format!("{} : {}", error, self.error_description.join(","))
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CreateUpload {
    pub name: String,
    pub description: String,
    pub srs: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl CreateUpload {
    /// The only upload type this client delivers.
    pub fn vector(name: &str, description: &str, srs: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            srs: srs.to_string(),
            kind: "VECTOR".to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct ExecutionInputs {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub upload: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stored_data: Vec<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct OutputStoredData {
    pub name: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ExecutionOutput {
    pub stored_data: OutputStoredData,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CreateExecution {
    pub processing: String,
    pub inputs: ExecutionInputs,
    pub output: ExecutionOutput,
    #[serde(default)]
    pub parameters: Value,
}

impl CreateExecution {
    /// Execution consuming an upload and producing a named stored data.
    pub fn from_upload(processing: &str, upload_id: &str, output_name: &str) -> Self {
        Self {
            processing: processing.to_string(),
            inputs: ExecutionInputs {
                upload: vec![upload_id.to_string()],
                stored_data: Vec::new(),
            },
            output: ExecutionOutput {
                stored_data: OutputStoredData {
                    name: output_name.to_string(),
                },
            },
            parameters: Value::Object(Default::default()),
        }
    }

    /// Execution consuming a stored data (e.g. pyramid generation from a
    /// vector db) and producing a named stored data.
    pub fn from_stored_data(processing: &str, stored_data_id: &str, output_name: &str) -> Self {
        Self {
            processing: processing.to_string(),
            inputs: ExecutionInputs {
                upload: Vec::new(),
                stored_data: vec![stored_data_id.to_string()],
            },
            output: ExecutionOutput {
                stored_data: OutputStoredData {
                    name: output_name.to_string(),
                },
            },
            parameters: Value::Object(Default::default()),
        }
    }
}

/// One published table of a WFS service.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct WfsRelation {
    pub native_name: String,
    pub public_name: String,
    pub title: String,
    #[serde(rename = "abstract")]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
}

impl WfsRelation {
    pub fn from_table(table: &str) -> Self {
        Self {
            native_name: table.to_string(),
            public_name: table.to_string(),
            title: table.to_string(),
            summary: table.to_string(),
            keywords: Vec::new(),
        }
    }
}

/// One rendered table of a WMS-VECTOR service; `style` is the id of an
/// uploaded GeoServer style static.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct WmsVectorRelation {
    pub name: String,
    pub style: String,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CreateConfiguration {
    #[serde(rename = "type")]
    pub kind: ConfigurationType,
    pub name: String,
    pub layer_name: String,
    pub type_infos: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribution: Option<Attribution>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metadata: Vec<String>,
}

impl CreateConfiguration {
    pub fn wmts_tms(
        name: &str,
        layer_name: &str,
        pyramid_id: &str,
        title: &str,
        summary: &str,
        bottom_level: &str,
        top_level: &str,
    ) -> Self {
        Self {
            kind: ConfigurationType::WmtsTms,
            name: name.to_string(),
            layer_name: layer_name.to_string(),
            type_infos: serde_json::json!({
                "title": title,
                "abstract": summary,
                "used_data": [{
                    "stored_data": pyramid_id,
                    "bottom_level": bottom_level,
                    "top_level": top_level,
                }],
            }),
            attribution: None,
            metadata: Vec::new(),
        }
    }

    pub fn wfs(
        name: &str,
        layer_name: &str,
        vectordb_id: &str,
        title: &str,
        summary: &str,
        relations: Vec<WfsRelation>,
    ) -> Self {
        Self {
            kind: ConfigurationType::Wfs,
            name: name.to_string(),
            layer_name: layer_name.to_string(),
            type_infos: serde_json::json!({
                "title": title,
                "abstract": summary,
                "used_data": [{
                    "stored_data": vectordb_id,
                    "relations": relations,
                }],
            }),
            attribution: None,
            metadata: Vec::new(),
        }
    }

    pub fn wms_vector(
        name: &str,
        layer_name: &str,
        vectordb_id: &str,
        title: &str,
        summary: &str,
        relations: Vec<WmsVectorRelation>,
    ) -> Self {
        Self {
            kind: ConfigurationType::WmsVector,
            name: name.to_string(),
            layer_name: layer_name.to_string(),
            type_infos: serde_json::json!({
                "title": title,
                "abstract": summary,
                "used_data": [{
                    "stored_data": vectordb_id,
                    "relations": relations,
                }],
            }),
            attribution: None,
            metadata: Vec::new(),
        }
    }

    pub fn with_attribution(mut self, title: &str, url: &str) -> Self {
        self.attribution = Some(Attribution {
            title: title.to_string(),
            url: url.to_string(),
        });
        self
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CreateOffering {
    pub visibility: String,
    pub endpoint: String,
    pub open: bool,
}

impl CreateOffering {
    pub fn public(endpoint: &str) -> Self {
        Self {
            visibility: "PUBLIC".to_string(),
            endpoint: endpoint.to_string(),
            open: true,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct CreateKey {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub whitelist: Vec<String>,
}

/// PATCH body; only the set fields are sent.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct UpdateKey {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whitelist: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_body_description() {
        let body: ApiErrorBody = serde_json::from_str(
            r#"{"error": "quota exceeded", "error_description": ["upload quota", "10 over"]}"#,
        )
        .unwrap();
        assert_eq!(
            body.describe("transport said no"),
            "quota exceeded : upload quota,10 over"
        );

        let empty: ApiErrorBody = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.describe("transport said no"), "transport said no : ");
    }

    #[test]
    fn create_execution_skips_empty_inputs() {
        let body = CreateExecution::from_upload("proc-1", "up-1", "my db");
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["inputs"]["upload"][0], "up-1");
        assert!(v["inputs"].get("stored_data").is_none());
        assert_eq!(v["output"]["stored_data"]["name"], "my db");
    }

    #[test]
    fn wfs_configuration_shape() {
        let body = CreateConfiguration::wfs(
            "Communes",
            "communes_wfs",
            "sd-1",
            "Communes",
            "Les communes",
            vec![WfsRelation::from_table("commune")],
        )
        .with_attribution("IGN", "https://www.ign.fr");
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["type"], "WFS");
        assert_eq!(v["type_infos"]["used_data"][0]["stored_data"], "sd-1");
        assert_eq!(
            v["type_infos"]["used_data"][0]["relations"][0]["native_name"],
            "commune"
        );
        assert_eq!(
            v["type_infos"]["used_data"][0]["relations"][0]["abstract"],
            "commune"
        );
        assert_eq!(v["attribution"]["url"], "https://www.ign.fr");
        assert!(v.get("metadata").is_none());
    }

    #[test]
    fn update_key_only_sends_set_fields() {
        let body = UpdateKey {
            name: Some("renamed".to_string()),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_string(&body).unwrap(),
            r#"{"name":"renamed"}"#
        );
    }
}
