//! Primitive type resolution for parameters and schema leaves.

use crate::schema::{SchemaNode, SchemaType};

// External imports (alphabetized)
use serde_json::Value as JsonValue;

/// TypeScript union used for file uploads
pub const FILE_TYPE: &str = "File | Blob | ArrayBuffer | Uint8Array";

/// Outcome of primitive resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedType {
    /// A complete type expression
    Primitive(String),
    /// The node is an object (or untyped) and needs structural resolution
    Structural,
}

impl ResolvedType {
    /// The expression, with structural nodes degraded to `any`
    pub fn or_any(self) -> String {
        match self {
            Self::Primitive(expr) => expr,
            Self::Structural => "any".to_string(),
        }
    }
}

/// Maps a single parameter or property descriptor to a type expression
#[derive(Debug, Default, Clone, Copy)]
pub struct ParameterTypeResolver;

impl ParameterTypeResolver {
    /// Resolve a node's type expression.
    ///
    /// Union types resolve every alternative; the node is structural if any
    /// alternative is an object. Unknown type names degrade to `any`.
    pub fn resolve(node: &SchemaNode) -> ResolvedType {
        match node.types.as_slice() {
            [] => ResolvedType::Structural,
            [ty] => Self::resolve_type(ty, node),
            types => {
                let mut alternatives: Vec<String> = Vec::with_capacity(types.len());
                for ty in types {
                    match Self::resolve_type(ty, node) {
                        ResolvedType::Primitive(expr) => {
                            if !alternatives.contains(&expr) {
                                alternatives.push(expr);
                            }
                        }
                        ResolvedType::Structural => return ResolvedType::Structural,
                    }
                }
                ResolvedType::Primitive(alternatives.join(" | "))
            }
        }
    }

    /// Resolve one type alternative of `node`
    pub fn resolve_type(ty: &SchemaType, node: &SchemaNode) -> ResolvedType {
        let expr = match ty {
            SchemaType::String if !node.enum_values.is_empty() => enum_union(&node.enum_values),
            SchemaType::String => "string".to_string(),
            SchemaType::Date | SchemaType::DateTime => "Date".to_string(),
            SchemaType::Integer | SchemaType::Number => "number".to_string(),
            SchemaType::Boolean => "boolean".to_string(),
            SchemaType::File => FILE_TYPE.to_string(),
            SchemaType::Null => "null".to_string(),
            SchemaType::Array => match node.items.as_deref() {
                Some(items) => array_of(&Self::element_type(items)),
                None => "any[]".to_string(),
            },
            SchemaType::Object => return ResolvedType::Structural,
            SchemaType::Other(_) => "any".to_string(),
        };
        ResolvedType::Primitive(expr)
    }

    /// Element type of a primitive array. A known `format` takes precedence
    /// over the declared type; structural elements degrade to `any`.
    pub fn element_type(items: &SchemaNode) -> String {
        if let Some(format) = items.format.as_deref() {
            let from_format = SchemaType::from(format);
            if !matches!(from_format, SchemaType::Other(_) | SchemaType::String) {
                return Self::resolve_type(&from_format, items).or_any();
            }
        }
        if items.types.is_empty() {
            return if items.reference_id().is_some() || !items.properties.is_empty() {
                "any".to_string()
            } else {
                "string".to_string()
            };
        }
        Self::resolve(items).or_any()
    }
}

/// Append `[]`, parenthesising unions
pub fn array_of(element: &str) -> String {
    if element.contains(" | ") {
        format!("({element})[]")
    } else {
        format!("{element}[]")
    }
}

fn enum_union(values: &[JsonValue]) -> String {
    values
        .iter()
        .map(|value| match value {
            JsonValue::String(s) => format!("'{}'", s.replace('\'', "\\'")),
            other => format!("'{other}'"),
        })
        .collect::<Vec<_>>()
        .join(" | ")
}
