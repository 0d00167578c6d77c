//! JSON-Schema-like data model for Apifox project metadata.
//!
//! A [`SchemaNode`] is one fragment of a request or response schema. Nodes may
//! point into the [`SchemaRegistry`] through `$ref`, and may pull in other
//! shared schemas through the Apifox `x-apifox-refs` composition extension.
//! Resolution never mutates registry entries: composition works on copies.

pub mod params;
pub mod registry;
pub mod resolver;

// Internal imports (std, crate)
use std::collections::BTreeMap;
use std::fmt;

// External imports (alphabetized)
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use serde_value::Value as SerdeValue;

pub use params::{ParameterTypeResolver, ResolvedType};
pub use registry::{SchemaComponent, SchemaRegistry};
pub use resolver::{RenderedType, SchemaGraphResolver, VisitedRefSet};

/// The `type` keyword of a schema node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SchemaType {
    Object,
    Array,
    String,
    Integer,
    Number,
    Boolean,
    File,
    Null,
    Date,
    DateTime,
    /// Any type name this generator does not know about
    Other(String),
}

impl SchemaType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Object => "object",
            Self::Array => "array",
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::File => "file",
            Self::Null => "null",
            Self::Date => "date",
            Self::DateTime => "date-time",
            Self::Other(name) => name,
        }
    }

    /// Object and array types need structural resolution
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Object | Self::Array)
    }
}

impl From<String> for SchemaType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "object" => Self::Object,
            "array" => Self::Array,
            "string" => Self::String,
            "integer" | "int32" | "int64" => Self::Integer,
            "number" => Self::Number,
            "boolean" => Self::Boolean,
            "file" => Self::File,
            "null" => Self::Null,
            "date" => Self::Date,
            "date-time" => Self::DateTime,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for SchemaType {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<SchemaType> for String {
    fn from(value: SchemaType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One entry of the `x-apifox-refs` composition extension
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompositionRef {
    /// Pointer to the shared schema being merged in
    #[serde(rename = "$ref", default)]
    pub reference: String,

    /// Partial schemas deep-merged onto the referenced schema's properties
    #[serde(rename = "x-apifox-overrides", default)]
    pub overrides: BTreeMap<String, JsonValue>,
}

impl CompositionRef {
    pub fn reference_id(&self) -> Option<&str> {
        reference_id(&self.reference)
    }
}

/// A JSON-Schema-like fragment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaNode {
    /// Declared type(s). Empty means unspecified.
    #[serde(
        rename = "type",
        default,
        deserialize_with = "deserialize_types",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub types: Vec<SchemaType>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, SchemaNode>,

    #[serde(
        rename = "required",
        default,
        deserialize_with = "deserialize_names",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub required_names: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<SchemaNode>>,

    /// Pointer into the shared schema registry, e.g. `#/definitions/1234`
    #[serde(rename = "$ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    /// Authoritative property order
    #[serde(
        rename = "x-apifox-orders",
        default,
        deserialize_with = "deserialize_names",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub ordering_key: Vec<String>,

    #[serde(
        rename = "x-apifox-refs",
        default,
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub composition_refs: BTreeMap<String, CompositionRef>,

    /// Placeholder property the Apifox editor has not finished defining
    #[serde(
        rename = "x-tmp-pending-properties",
        default,
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub pending: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(rename = "enum", default, skip_serializing_if = "Vec::is_empty")]
    pub enum_values: Vec<JsonValue>,

    #[serde(rename = "example", default, skip_serializing_if = "Option::is_none")]
    pub example_value: Option<JsonValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// Coarse shape of a node, used to pick a rendering path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeShape {
    Reference,
    Object,
    Array,
    Null,
    Primitive,
    Unspecified,
}

impl SchemaNode {
    /// Convenience constructor for a node with a single type
    pub fn of_type(ty: impl Into<SchemaType>) -> Self {
        Self {
            types: vec![ty.into()],
            ..Default::default()
        }
    }

    /// Convenience constructor for a `$ref` node pointing at a registry id
    pub fn reference_to(id: impl fmt::Display) -> Self {
        Self {
            reference: Some(format!("#/definitions/{id}")),
            ..Default::default()
        }
    }

    /// The registry id this node points at, if any
    pub fn reference_id(&self) -> Option<&str> {
        self.reference.as_deref().and_then(reference_id)
    }

    /// Declared types other than `null`
    pub fn non_null_types(&self) -> impl Iterator<Item = &SchemaType> {
        self.types.iter().filter(|t| **t != SchemaType::Null)
    }

    pub fn is_nullable(&self) -> bool {
        self.types.contains(&SchemaType::Null)
    }

    pub fn shape(&self) -> NodeShape {
        if self.reference_id().is_some() {
            return NodeShape::Reference;
        }
        match self.non_null_types().next() {
            Some(SchemaType::Object) => NodeShape::Object,
            Some(SchemaType::Array) => NodeShape::Array,
            Some(_) => NodeShape::Primitive,
            None if self.is_nullable() => NodeShape::Null,
            None if !self.properties.is_empty() || !self.composition_refs.is_empty() => {
                NodeShape::Object
            }
            None if self.items.is_some() => NodeShape::Array,
            None => NodeShape::Unspecified,
        }
    }

    /// True when this node renders as a named declaration rather than a primitive
    pub fn is_structural(&self) -> bool {
        matches!(
            self.shape(),
            NodeShape::Reference | NodeShape::Object | NodeShape::Array
        ) || self.types.iter().any(SchemaType::is_structural)
    }

    /// Human readable doc text: title followed by description
    pub fn doc_text(&self) -> Option<String> {
        let text = format!(
            "{}{}",
            self.title.as_deref().unwrap_or_default(),
            self.description.as_deref().unwrap_or_default()
        );
        let text = text.trim().replace('\n', "; ");
        (!text.is_empty()).then_some(text)
    }
}

/// Extract the registry id from a `$ref` pointer (its last path segment)
pub fn reference_id(reference: &str) -> Option<&str> {
    reference
        .rsplit('/')
        .next()
        .map(str::trim)
        .filter(|id| !id.is_empty() && *id != "#")
}

/// Deserialize a `type` keyword given either as one string or a list of strings
fn deserialize_types<'de, D>(deserializer: D) -> Result<Vec<SchemaType>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = SerdeValue::deserialize(deserializer)?;

    match value {
        SerdeValue::String(s) => Ok(vec![SchemaType::from(s)]),
        SerdeValue::Seq(seq) => {
            let mut result: Vec<SchemaType> = Vec::new();
            for item in seq {
                if let SerdeValue::String(s) = item {
                    let ty = SchemaType::from(s);
                    if !result.contains(&ty) {
                        result.push(ty);
                    }
                } else {
                    return Err(serde::de::Error::custom(
                        "Expected string or array of strings",
                    ));
                }
            }
            Ok(result)
        }
        SerdeValue::Unit | SerdeValue::Option(None) => Ok(Vec::new()),
        _ => Err(serde::de::Error::custom(
            "Expected string or array of strings",
        )),
    }
}

/// Deserialize a list of names, ignoring values that are not a list
///
/// Apifox occasionally writes `required: true` on a property instead of listing
/// names on its parent.
fn deserialize_names<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = SerdeValue::deserialize(deserializer)?;

    match value {
        SerdeValue::Seq(seq) => Ok(seq
            .into_iter()
            .filter_map(|item| match item {
                SerdeValue::String(s) => Some(s),
                _ => None,
            })
            .collect()),
        _ => Ok(Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_single_and_union_types() {
        let node: SchemaNode = serde_json::from_value(json!({
            "type": "object",
            "properties": {
                "tags": { "type": ["array", "null"], "items": { "type": "string" } },
                "count": { "type": "int64" }
            },
            "required": ["count"],
            "x-apifox-orders": ["count", "tags"]
        }))
        .unwrap();

        assert_eq!(node.types, vec![SchemaType::Object]);
        assert_eq!(node.required_names, vec!["count"]);
        assert_eq!(node.ordering_key, vec!["count", "tags"]);
        let tags = &node.properties["tags"];
        assert_eq!(tags.types, vec![SchemaType::Array, SchemaType::Null]);
        assert_eq!(tags.shape(), NodeShape::Array);
        assert!(tags.is_nullable());
        assert_eq!(node.properties["count"].types, vec![SchemaType::Integer]);
    }

    #[test]
    fn test_lenient_required_flag() {
        let node: SchemaNode =
            serde_json::from_value(json!({ "type": "string", "required": true })).unwrap();
        assert!(node.required_names.is_empty());
    }

    #[test]
    fn test_reference_and_composition() {
        let node: SchemaNode = serde_json::from_value(json!({
            "type": "object",
            "x-apifox-refs": {
                "01H": {
                    "$ref": "#/definitions/42",
                    "x-apifox-overrides": { "name": { "title": "Renamed" } }
                }
            },
            "properties": {
                "owner": { "$ref": "#/definitions/7" }
            }
        }))
        .unwrap();

        let composition = &node.composition_refs["01H"];
        assert_eq!(composition.reference_id(), Some("42"));
        assert!(composition.overrides.contains_key("name"));
        assert_eq!(node.properties["owner"].reference_id(), Some("7"));
        assert_eq!(node.properties["owner"].shape(), NodeShape::Reference);
    }

    #[test]
    fn test_shapes() {
        assert_eq!(SchemaNode::default().shape(), NodeShape::Unspecified);
        assert_eq!(SchemaNode::of_type("null").shape(), NodeShape::Null);
        assert_eq!(SchemaNode::of_type("boolean").shape(), NodeShape::Primitive);
        let implicit_object = SchemaNode {
            properties: BTreeMap::from([("a".to_string(), SchemaNode::of_type("string"))]),
            ..Default::default()
        };
        assert_eq!(implicit_object.shape(), NodeShape::Object);
    }

    #[test]
    fn test_reference_id_parsing() {
        assert_eq!(reference_id("#/definitions/123"), Some("123"));
        assert_eq!(reference_id("123"), Some("123"));
        assert_eq!(reference_id("#/definitions/"), None);
        assert_eq!(reference_id(""), None);
    }

    #[test]
    fn test_serialize_roundtrip_keeps_extension_keys() {
        let node = SchemaNode {
            types: vec![SchemaType::Object],
            ordering_key: vec!["a".into()],
            pending: true,
            ..Default::default()
        };
        let value = serde_json::to_value(&node).unwrap();
        assert_eq!(value["type"], json!(["object"]));
        assert_eq!(value["x-apifox-orders"], json!(["a"]));
        assert_eq!(value["x-tmp-pending-properties"], json!(true));
    }
}
