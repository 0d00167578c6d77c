//! Apifox project snapshot loading.
//!
//! A snapshot bundles everything the generator needs from one Apifox project:
//! the operation details, the shared data schemas and the folder tree. It can be
//! read from a local file or fetched over HTTP, as JSON or YAML.
//!
//! # Examples
//!
//! ```no_run
//! use autoapi_core::snapshot::ProjectSnapshot;
//! use autoapi_core::error::Result;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<()> {
//! let snapshot = ProjectSnapshot::from_file_or_url("apifox-snapshot.json").await?;
//! println!("{} operations", snapshot.api_details.len());
//! let registry = snapshot.registry();
//! println!("{} shared schemas", registry.len());
//! # Ok(())
//! # }
//! ```

// Internal imports (std, crate)
use std::path::Path;

use crate::schema::{SchemaComponent, SchemaNode, SchemaRegistry, SchemaType};
use crate::tree::ApiTreeNode;
use crate::Error;

// External imports (alphabetized)
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use tokio::fs;
use url::Url;

/// Everything exported from one Apifox project
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSnapshot {
    #[serde(default)]
    pub api_details: Vec<ApiOperation>,

    #[serde(default)]
    pub data_schemas: Vec<SchemaComponent>,

    #[serde(default)]
    pub api_tree: Vec<ApiTreeNode>,
}

impl ProjectSnapshot {
    /// Load a snapshot from a file path or an `http(s)` URL
    pub async fn from_file_or_url<P: AsRef<str>>(location: P) -> crate::Result<Self> {
        let location = location.as_ref();

        match Url::parse(location) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Self::from_url(url.as_str()).await,
            _ => Self::from_file(location).await,
        }
    }

    pub async fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).await?;
        Self::parse_content(&content).map_err(|e| {
            Error::snapshot(format!(
                "Failed to parse project snapshot at {}: {}",
                path.display(),
                e
            ))
        })
    }

    pub async fn from_url(url: &str) -> crate::Result<Self> {
        let response = reqwest::get(url).await.map_err(|e| {
            Error::snapshot(format!("Failed to fetch project snapshot from {}: {}", url, e))
        })?;

        if !response.status().is_success() {
            return Err(Error::snapshot(format!(
                "Failed to fetch project snapshot from {}: HTTP {}",
                url,
                response.status()
            )));
        }

        let content = response.text().await?;
        Self::parse_content(&content).map_err(|e| {
            Error::snapshot(format!(
                "Failed to parse project snapshot from {}: {}",
                url, e
            ))
        })
    }

    /// Parse content as JSON, falling back to YAML
    pub fn parse_content(content: &str) -> Result<Self, String> {
        let json_error = match serde_json::from_str(content) {
            Ok(snapshot) => return Ok(snapshot),
            Err(e) => e,
        };

        match serde_yaml::from_str(content) {
            Ok(snapshot) => Ok(snapshot),
            Err(yaml_error) => Err(format!(
                "content is neither a valid JSON nor YAML snapshot (json: {json_error}; yaml: {yaml_error})"
            )),
        }
    }

    /// Shared schema registry built from `dataSchemas`
    pub fn registry(&self) -> SchemaRegistry {
        SchemaRegistry::from_components(self.data_schemas.iter().cloned())
    }

    pub fn operation(&self, id: i64) -> Option<&ApiOperation> {
        self.api_details.iter().find(|op| op.id == id)
    }
}

/// One API operation as described by Apifox
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiOperation {
    #[serde(default)]
    pub id: i64,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub method: String,

    #[serde(default)]
    pub path: String,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub parameters: ApiParameters,

    #[serde(default)]
    pub request_body: Option<RequestBody>,

    #[serde(default)]
    pub responses: Vec<ApiResponse>,

    #[serde(default)]
    pub project_id: Option<i64>,
}

impl ApiOperation {
    /// `METHOD path`, used to name an operation in logs and failures
    pub fn label(&self) -> String {
        format!("{} {}", self.method.to_uppercase(), self.path)
    }

    /// The 200 response, if declared
    pub fn success_response(&self) -> Option<&ApiResponse> {
        self.responses.iter().find(|r| r.code == "200")
    }

    /// Request body JSON schema, if it declares anything
    pub fn body_schema(&self) -> Option<&SchemaNode> {
        self.request_body
            .as_ref()
            .and_then(|body| body.json_schema.as_ref())
            .filter(|schema| **schema != SchemaNode::default())
    }

    /// Form fields of a request body without a JSON schema
    pub fn body_parameters(&self) -> &[ApiParameter] {
        self.request_body
            .as_ref()
            .map(|body| body.parameters.as_slice())
            .unwrap_or_default()
    }

    pub fn has_body(&self) -> bool {
        self.body_schema().is_some() || !self.body_parameters().is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiParameters {
    #[serde(default)]
    pub path: Vec<ApiParameter>,

    #[serde(default)]
    pub query: Vec<ApiParameter>,
}

/// A path, query or form parameter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiParameter {
    #[serde(default)]
    pub name: String,

    #[serde(default, deserialize_with = "lenient_bool")]
    pub required: bool,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub example: Option<JsonValue>,

    #[serde(rename = "type", default)]
    pub param_type: Option<String>,

    #[serde(default)]
    pub schema: Option<SchemaNode>,

    #[serde(default)]
    pub items: Option<SchemaNode>,

    #[serde(rename = "enum", default)]
    pub enum_values: Vec<JsonValue>,
}

impl ApiParameter {
    /// View the parameter as a schema node.
    ///
    /// An embedded `schema` with a declared type wins; otherwise the flat
    /// `type`/`items`/`enum` fields are used, and a missing type means `string`.
    pub fn as_schema(&self) -> SchemaNode {
        if let Some(schema) = self.schema.as_ref().filter(|s| !s.types.is_empty()) {
            let mut node = schema.clone();
            if node.description.is_none() {
                node.description = self.description.clone();
            }
            if node.example_value.is_none() {
                node.example_value = self.example.clone();
            }
            return node;
        }

        let ty = self
            .param_type
            .as_deref()
            .filter(|t| !t.is_empty())
            .map(SchemaType::from)
            .unwrap_or(SchemaType::String);
        SchemaNode {
            types: vec![ty],
            items: self.items.clone().map(Box::new),
            enum_values: self.enum_values.clone(),
            description: self.description.clone(),
            example_value: self.example.clone(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestBody {
    /// Content kind, e.g. `application/json` or `multipart/form-data`
    #[serde(rename = "type", default)]
    pub body_type: Option<String>,

    #[serde(default)]
    pub parameters: Vec<ApiParameter>,

    #[serde(default)]
    pub json_schema: Option<SchemaNode>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    /// Status code, normalized to a string
    #[serde(default, deserialize_with = "lenient_code")]
    pub code: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub json_schema: Option<SchemaNode>,
}

fn lenient_code<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match JsonValue::deserialize(deserializer)? {
        JsonValue::String(s) => s,
        JsonValue::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match JsonValue::deserialize(deserializer)? {
        JsonValue::Bool(b) => b,
        JsonValue::String(s) => s == "true",
        JsonValue::Number(n) => n.as_i64() == Some(1),
        _ => false,
    })
}
