//! Shared schema components and composition flattening.

// Internal imports (std, crate)
use std::collections::{BTreeMap, HashMap};

use crate::schema::{CompositionRef, SchemaNode, SchemaType};

// External imports (alphabetized)
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Composition refs are expanded at most this many levels deep
pub const MAX_COMPOSITION_DEPTH: usize = 3;

/// `$ref` chains are followed at most this many hops when substituting
pub const MAX_REFERENCE_DEPTH: usize = 3;

/// A reusable schema component as supplied by the Apifox project
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaComponent {
    pub id: i64,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub display_name: Option<String>,

    #[serde(default)]
    pub json_schema: SchemaNode,
}

/// Read-only mapping from shared schema id to its schema
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, SchemaNode>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_components<I>(components: I) -> Self
    where
        I: IntoIterator<Item = SchemaComponent>,
    {
        let schemas = components
            .into_iter()
            .map(|c| (c.id.to_string(), c.json_schema))
            .collect();
        Self { schemas }
    }

    pub fn insert(&mut self, id: impl ToString, schema: SchemaNode) {
        self.schemas.insert(id.to_string(), schema);
    }

    pub fn get(&self, id: &str) -> Option<&SchemaNode> {
        self.schemas.get(id)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Replace a `$ref` node by the schema it points at, following chains of
    /// references up to [`MAX_REFERENCE_DEPTH`] hops. Unknown ids resolve to an
    /// empty schema; at the depth limit the last reference node is returned.
    pub fn substitute_references(&self, node: &SchemaNode) -> SchemaNode {
        let mut current = node.clone();
        for _ in 0..MAX_REFERENCE_DEPTH {
            let Some(id) = current.reference_id() else {
                return current;
            };
            current = match self.get(id) {
                Some(schema) => schema.clone(),
                None => {
                    warn!("Shared schema {id} not found, using an empty schema");
                    SchemaNode::default()
                }
            };
        }
        if current.reference_id().is_some() {
            warn!("Reference depth limit ({MAX_REFERENCE_DEPTH}) reached");
        }
        current
    }

    /// Flatten `x-apifox-refs` compositions into one effective schema.
    ///
    /// Each referenced schema is copied, its overrides applied, and its
    /// properties, required names and ordering merged into the node's own.
    /// The node's own properties win on key collisions.
    pub fn merge_compositions(&self, schema: &SchemaNode) -> SchemaNode {
        self.merge_at_depth(schema, 0)
    }

    fn merge_at_depth(&self, schema: &SchemaNode, depth: usize) -> SchemaNode {
        let mut effective = schema.clone();
        if schema.composition_refs.is_empty() {
            return effective;
        }
        effective.composition_refs.clear();

        for (slot, composition) in &schema.composition_refs {
            let Some(mut referenced) = self.expand_composition(composition, depth) else {
                continue;
            };
            apply_overrides(&mut referenced, &composition.overrides);

            for (key, property) in referenced.properties {
                effective.properties.entry(key).or_insert(property);
            }
            for name in referenced.required_names {
                if !effective.required_names.contains(&name) {
                    effective.required_names.push(name);
                }
            }
            splice_ordering(&mut effective.ordering_key, slot, referenced.ordering_key);
        }

        if effective.types.is_empty() {
            effective.types.push(SchemaType::Object);
        }
        effective
    }

    fn expand_composition(&self, composition: &CompositionRef, depth: usize) -> Option<SchemaNode> {
        let id = composition.reference_id()?;
        let Some(target) = self.get(id) else {
            warn!("Composition target {id} not found, skipping");
            return None;
        };
        if depth + 1 >= MAX_COMPOSITION_DEPTH {
            warn!("Composition depth limit ({MAX_COMPOSITION_DEPTH}) reached at schema {id}");
            return Some(target.clone());
        }
        let target = self.substitute_references(target);
        Some(self.merge_at_depth(&target, depth + 1))
    }
}

/// Replace the composition slot key in `ordering` by the referenced ordering,
/// or append the referenced keys when the slot is not listed
fn splice_ordering(ordering: &mut Vec<String>, slot: &str, referenced: Vec<String>) {
    let incoming: Vec<String> = referenced
        .into_iter()
        .filter(|key| !ordering.contains(key))
        .collect();
    match ordering.iter().position(|key| key == slot) {
        Some(pos) => {
            ordering.splice(pos..=pos, incoming);
        }
        None => ordering.extend(incoming),
    }
}

fn apply_overrides(schema: &mut SchemaNode, overrides: &BTreeMap<String, JsonValue>) {
    for (key, patch) in overrides {
        if patch.is_null() {
            schema.properties.remove(key);
            schema.required_names.retain(|name| name != key);
            schema.ordering_key.retain(|name| name != key);
            continue;
        }

        let mut merged = match schema.properties.get(key) {
            Some(existing) => match serde_json::to_value(existing) {
                Ok(value) => value,
                Err(e) => {
                    warn!("Could not apply override for '{key}': {e}");
                    continue;
                }
            },
            None => JsonValue::Object(Default::default()),
        };
        deep_merge(&mut merged, patch);

        match serde_json::from_value::<SchemaNode>(merged) {
            Ok(node) => {
                schema.properties.insert(key.clone(), node);
            }
            Err(e) => warn!("Ignoring malformed override for '{key}': {e}"),
        }
    }
}

fn deep_merge(target: &mut JsonValue, patch: &JsonValue) {
    match (target, patch) {
        (JsonValue::Object(target), JsonValue::Object(patch)) => {
            for (key, value) in patch {
                deep_merge(target.entry(key.clone()).or_insert(JsonValue::Null), value);
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}
