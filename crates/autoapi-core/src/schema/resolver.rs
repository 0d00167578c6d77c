//! Cycle-safe rendering of schema graphs into flat TypeScript declarations.
//!
//! Every structural level of a schema (nested objects, object array elements,
//! referenced shared schemas) becomes its own named declaration. Child names are
//! derived from the parent name and the property key, so the output stays flat
//! and every declaration is greppable.
//!
//! Resolution never fails. Missing references, exhausted depth or step budgets
//! and malformed nodes all degrade to `any` typed output.

// Internal imports (std, crate)
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};

use crate::naming::{pascal_segment, quote_if_non_identifier};
use crate::schema::params::array_of;
use crate::schema::{NodeShape, ParameterTypeResolver, SchemaNode, SchemaRegistry, SchemaType};

// External imports (alphabetized)
use log::{debug, warn};
use serde_json::Value as JsonValue;

/// Upper bound on resolution steps for one resolver
pub const DEFAULT_STEP_BUDGET: usize = 10_000;

/// Type used for objects without any known property
pub const OPEN_OBJECT: &str = "Record<string, any>";

/// Shared schema ids already assigned a declaration name in the current scope
#[derive(Debug, Clone, Default)]
pub struct VisitedRefSet {
    names: HashMap<String, String>,
}

impl VisitedRefSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    /// Remember the first name assigned to `id`. Later assignments are ignored.
    pub fn insert(&mut self, id: &str, name: &str) {
        self.names
            .entry(id.to_string())
            .or_insert_with(|| name.to_string());
    }

    pub fn contains(&self, id: &str) -> bool {
        self.names.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Result of rendering one named type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedType {
    /// Name callers use to refer to the rendered type
    pub type_name: String,
    /// The root declaration followed by every child declaration, parents first
    pub declarations: Vec<String>,
}

impl RenderedType {
    pub fn declarations_text(&self) -> String {
        self.declarations.join("\n\n")
    }
}

/// Walks a schema graph and collects named declarations.
///
/// One resolver represents one rendering scope: reference ids seen earlier in
/// the scope resolve to their first assigned name and are never declared twice.
pub struct SchemaGraphResolver<'a> {
    registry: &'a SchemaRegistry,
    index_signature: bool,
    visited: VisitedRefSet,
    declarations: Vec<Option<String>>,
    taken: HashSet<String>,
    steps: usize,
    budget: usize,
    exhausted: bool,
}

impl<'a> SchemaGraphResolver<'a> {
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self {
            registry,
            index_signature: false,
            visited: VisitedRefSet::new(),
            declarations: Vec::new(),
            taken: HashSet::new(),
            steps: 0,
            budget: DEFAULT_STEP_BUDGET,
            exhausted: false,
        }
    }

    /// Add an open `[key: string]: any` member to every rendered interface
    pub fn with_index_signature(mut self, enabled: bool) -> Self {
        self.index_signature = enabled;
        self
    }

    pub fn with_step_budget(mut self, budget: usize) -> Self {
        self.budget = budget;
        self
    }

    /// Number of resolution steps taken so far
    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn visited(&self) -> &VisitedRefSet {
        &self.visited
    }

    /// Render `schema` as a declaration called `name`, plus every child
    /// declaration it needs.
    ///
    /// The root declaration carries no doc comment of its own; callers attach
    /// operation level documentation.
    pub fn render_named_type(&mut self, schema: &SchemaNode, name: &str) -> RenderedType {
        self.taken.insert(name.to_string());
        let start = self.declarations.len();
        self.declare(schema, name, None);
        let declarations = self.declarations.drain(start..).flatten().collect();
        RenderedType {
            type_name: name.to_string(),
            declarations,
        }
    }

    fn tick(&mut self) -> bool {
        self.steps += 1;
        if self.steps <= self.budget {
            return true;
        }
        if !self.exhausted {
            warn!("Schema resolution step budget ({}) exhausted", self.budget);
            self.exhausted = true;
        }
        false
    }

    /// Reserve a declaration name, suffixing a counter on collision
    fn claim_name(&mut self, hint: &str) -> String {
        let mut candidate = hint.to_string();
        let mut counter = 2;
        while self.taken.contains(&candidate) {
            candidate = format!("{hint}{counter}");
            counter += 1;
        }
        self.taken.insert(candidate.clone());
        candidate
    }

    fn lookup(&self, id: &str) -> SchemaNode {
        match self.registry.get(id) {
            Some(schema) => schema.clone(),
            None => {
                warn!("Shared schema {id} not found, rendering an open object");
                SchemaNode::of_type(SchemaType::Object)
            }
        }
    }

    /// Push a declaration for `name`. Its slot is reserved before recursing so
    /// parents precede their children in the output.
    fn declare(&mut self, schema: &SchemaNode, name: &str, doc: Option<String>) {
        let slot = self.declarations.len();
        self.declarations.push(None);
        let body = self.declaration_body(schema, name);
        let text = match doc {
            Some(doc) => format!("/** {} */\n{body}", escape_comment(&doc)),
            None => body,
        };
        self.declarations[slot] = Some(text);
    }

    fn declaration_body(&mut self, schema: &SchemaNode, name: &str) -> String {
        let mut current = Cow::Borrowed(schema);
        let mut chain: Vec<String> = Vec::new();

        while let Some(id) = current.reference_id().map(str::to_string) {
            if chain.contains(&id) || !self.tick() {
                debug!("Reference chain through {id} does not terminate");
                return alias(name, "any");
            }
            match self.visited.get(&id) {
                Some(existing) if existing != name => return alias(name, existing),
                Some(_) => {}
                None => self.visited.insert(&id, name),
            }
            current = Cow::Owned(self.lookup(&id));
            chain.push(id);
        }

        let effective = self.registry.merge_compositions(&current);
        match effective.shape() {
            NodeShape::Object if effective.properties.is_empty() => alias(name, OPEN_OBJECT),
            NodeShape::Object => self.interface(&effective, name),
            NodeShape::Array => {
                let expr = self.array_expr(effective.items.as_deref(), name);
                alias(name, &expr)
            }
            NodeShape::Null => alias(name, "null"),
            NodeShape::Primitive => {
                let hint = format!("{name}Value");
                let expr = self.union_expr(&effective, &hint);
                alias(name, &expr)
            }
            NodeShape::Reference | NodeShape::Unspecified => alias(name, "any"),
        }
    }

    fn interface(&mut self, schema: &SchemaNode, name: &str) -> String {
        let mut members: Vec<String> = Vec::new();

        for key in rendering_order(schema) {
            let Some(property) = schema.properties.get(&key) else {
                continue;
            };
            if property.pending {
                continue;
            }
            let hint = format!("{name}{}", pascal_segment(&key));
            let expr = self.type_expr(property, &hint);
            let optional = if schema.required_names.contains(&key) {
                ""
            } else {
                "?"
            };
            if let Some(doc) = property_doc(property) {
                members.push(format!("  /** {} */", escape_comment(&doc)));
            }
            members.push(format!("  {}{optional}: {expr}", quote_if_non_identifier(&key)));
        }

        if self.index_signature {
            members.push("  [key: string]: any".to_string());
        }

        if members.is_empty() {
            return alias(name, OPEN_OBJECT);
        }
        format!("export interface {name} {{\n{}\n}}", members.join("\n"))
    }

    /// Type expression for a property or element, declaring children as needed
    fn type_expr(&mut self, schema: &SchemaNode, hint: &str) -> String {
        if !self.tick() {
            return "any".to_string();
        }

        if let Some(id) = schema.reference_id() {
            if let Some(existing) = self.visited.get(id) {
                return existing.to_string();
            }
            let name = self.claim_name(hint);
            let doc = self
                .registry
                .get(id)
                .and_then(SchemaNode::doc_text)
                .unwrap_or_else(|| name.clone());
            self.declare(schema, &name, Some(doc));
            return name;
        }

        let effective = self.registry.merge_compositions(schema);
        if effective.types.is_empty() {
            return match effective.shape() {
                NodeShape::Object => self.object_expr(&effective, hint),
                NodeShape::Array => self.array_expr(effective.items.as_deref(), hint),
                _ => "any".to_string(),
            };
        }
        self.union_expr(&effective, hint)
    }

    /// Resolve every declared type alternative and join them with ` | `
    fn union_expr(&mut self, schema: &SchemaNode, hint: &str) -> String {
        let mut alternatives: Vec<String> = Vec::new();
        for ty in &schema.types {
            let expr = match ty {
                SchemaType::Object => self.object_expr(schema, hint),
                SchemaType::Array => self.array_expr(schema.items.as_deref(), hint),
                other => ParameterTypeResolver::resolve_type(other, schema).or_any(),
            };
            if !alternatives.contains(&expr) {
                alternatives.push(expr);
            }
        }
        if alternatives.is_empty() {
            return "any".to_string();
        }
        alternatives.join(" | ")
    }

    fn object_expr(&mut self, schema: &SchemaNode, hint: &str) -> String {
        if schema.properties.is_empty() {
            return OPEN_OBJECT.to_string();
        }
        let name = self.claim_name(hint);
        let doc = schema.doc_text().unwrap_or_else(|| name.clone());
        self.declare(schema, &name, Some(doc));
        name
    }

    fn array_expr(&mut self, items: Option<&SchemaNode>, parent: &str) -> String {
        match items {
            None => "any[]".to_string(),
            Some(items) if items.is_structural() => {
                let element = self.type_expr(items, &format!("{parent}Item"));
                array_of(&element)
            }
            Some(items) => array_of(&ParameterTypeResolver::element_type(items)),
        }
    }
}

/// Keys in `x-apifox-orders` order first (deduplicated, existing keys only),
/// then the remaining keys lexicographically
pub fn rendering_order(schema: &SchemaNode) -> Vec<String> {
    let mut order: Vec<String> = Vec::with_capacity(schema.properties.len());
    for key in &schema.ordering_key {
        if schema.properties.contains_key(key) && !order.contains(key) {
            order.push(key.clone());
        }
    }
    for key in schema.properties.keys() {
        if !order.contains(key) {
            order.push(key.clone());
        }
    }
    order
}

/// Member doc: title and description, followed by the example when present
pub fn property_doc(node: &SchemaNode) -> Option<String> {
    let example = node.example_value.as_ref().and_then(|value| match value {
        JsonValue::Null => None,
        JsonValue::String(s) if s.is_empty() => None,
        JsonValue::String(s) => Some(s.replace('\n', " ")),
        other => Some(other.to_string()),
    });
    match (node.doc_text(), example) {
        (Some(doc), Some(example)) => Some(format!("{doc} example: {example}")),
        (Some(doc), None) => Some(doc),
        (None, Some(example)) => Some(format!("example: {example}")),
        (None, None) => None,
    }
}

fn alias(name: &str, expr: &str) -> String {
    format!("export type {name} = {expr}")
}

fn escape_comment(text: &str) -> String {
    text.replace("*/", "*\\/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SchemaComponent;
    use serde_json::json;

    fn node(value: JsonValue) -> SchemaNode {
        serde_json::from_value(value).unwrap()
    }

    fn registry(entries: Vec<(i64, JsonValue)>) -> SchemaRegistry {
        SchemaRegistry::from_components(entries.into_iter().map(|(id, schema)| SchemaComponent {
            id,
            json_schema: node(schema),
            ..Default::default()
        }))
    }

    fn count(haystack: &str, needle: &str) -> usize {
        haystack.matches(needle).count()
    }

    #[test]
    fn test_object_with_ordering_and_required() {
        let reg = SchemaRegistry::new();
        let schema = node(json!({
            "type": "object",
            "properties": {
                "total": { "type": "integer", "description": "Total rows" },
                "alpha": { "type": "string" },
                "list": { "type": "array", "items": { "type": "string" } },
                "user_id": { "type": "string", "example": "u-1" }
            },
            "required": ["total"],
            "x-apifox-orders": ["total", "total", "missing"]
        }));

        let rendered = SchemaGraphResolver::new(&reg).render_named_type(&schema, "ListRes");
        assert_eq!(rendered.type_name, "ListRes");
        assert_eq!(
            rendered.declarations_text(),
            "export interface ListRes {\n  /** Total rows */\n  total: number\n  alpha?: string\n  list?: string[]\n  /** example: u-1 */\n  \"user_id\"?: string\n}"
        );
    }

    #[test]
    fn test_nested_objects_become_flat_declarations() {
        let reg = SchemaRegistry::new();
        let schema = node(json!({
            "type": "object",
            "properties": {
                "data": {
                    "type": "object",
                    "title": "Payload",
                    "properties": {
                        "rows": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": { "id": { "type": "integer" } }
                            }
                        }
                    }
                }
            }
        }));

        let rendered = SchemaGraphResolver::new(&reg).render_named_type(&schema, "PageRes");
        assert_eq!(rendered.declarations.len(), 3);
        assert!(rendered.declarations[0].starts_with("export interface PageRes {"));
        assert!(rendered.declarations[0].contains("data?: PageResData"));
        assert!(rendered.declarations[1].starts_with("/** Payload */\nexport interface PageResData {"));
        assert!(rendered.declarations[1].contains("rows?: PageResDataRowsItem[]"));
        assert!(rendered.declarations[2].starts_with("/** PageResDataRowsItem */\nexport interface PageResDataRowsItem {"));
    }

    #[test]
    fn test_reference_cycle_terminates_with_one_declaration_each() {
        let reg = registry(vec![
            (
                1,
                json!({ "type": "object", "properties": { "b": { "$ref": "#/definitions/2" } } }),
            ),
            (
                2,
                json!({ "type": "object", "title": "Bee", "properties": { "a": { "$ref": "#/definitions/1" } } }),
            ),
        ]);

        let mut resolver = SchemaGraphResolver::new(&reg).with_step_budget(100);
        let rendered = resolver.render_named_type(&SchemaNode::reference_to(1), "A");
        let text = rendered.declarations_text();

        assert!(resolver.steps() < 100);
        assert_eq!(rendered.declarations.len(), 2);
        assert_eq!(count(&text, "export interface A "), 1);
        assert_eq!(count(&text, "export interface AB "), 1);
        assert!(text.contains("b?: AB"));
        assert!(text.contains("a?: A\n"));
        assert!(text.contains("/** Bee */"));
    }

    #[test]
    fn test_self_reference_uses_own_name() {
        let reg = registry(vec![(
            7,
            json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "children": { "type": "array", "items": { "$ref": "#/definitions/7" } }
                }
            }),
        )]);
        let rendered = SchemaGraphResolver::new(&reg).render_named_type(&SchemaNode::reference_to(7), "TreeNode");
        assert_eq!(rendered.declarations.len(), 1);
        assert!(rendered.declarations[0].contains("children?: TreeNode[]"));
    }

    #[test]
    fn test_sibling_references_reuse_first_name() {
        let reg = registry(vec![(
            3,
            json!({ "type": "object", "properties": { "city": { "type": "string" } } }),
        )]);
        let schema = node(json!({
            "type": "object",
            "properties": {
                "billing": { "$ref": "#/definitions/3" },
                "shipping": { "$ref": "#/definitions/3" }
            },
            "x-apifox-orders": ["billing", "shipping"]
        }));

        let rendered = SchemaGraphResolver::new(&reg).render_named_type(&schema, "Order");
        let text = rendered.declarations_text();
        assert_eq!(rendered.declarations.len(), 2);
        assert!(text.contains("billing?: OrderBilling\n"));
        assert!(text.contains("shipping?: OrderBilling\n"));
        assert_eq!(count(&text, "export interface OrderBilling "), 1);
    }

    #[test]
    fn test_composition_cycle_terminates() {
        let reg = registry(vec![
            (
                1,
                json!({
                    "type": "object",
                    "properties": { "fromA": { "type": "string" } },
                    "x-apifox-refs": { "b": { "$ref": "#/definitions/2" } }
                }),
            ),
            (
                2,
                json!({
                    "type": "object",
                    "properties": { "fromB": { "type": "boolean" } },
                    "x-apifox-refs": { "a": { "$ref": "#/definitions/1" } }
                }),
            ),
        ]);
        let mut resolver = SchemaGraphResolver::new(&reg).with_step_budget(1_000);
        let rendered = resolver.render_named_type(&SchemaNode::reference_to(1), "Merged");
        assert_eq!(rendered.declarations.len(), 1);
        assert!(rendered.declarations[0].contains("fromA?: string"));
        assert!(rendered.declarations[0].contains("fromB?: boolean"));
    }

    #[test]
    fn test_null_and_empty_object_aliases() {
        let reg = SchemaRegistry::new();
        let mut resolver = SchemaGraphResolver::new(&reg);
        let null = resolver.render_named_type(&SchemaNode::of_type("null"), "Nothing");
        assert_eq!(null.declarations, vec!["export type Nothing = null"]);

        let empty = resolver.render_named_type(&SchemaNode::of_type("object"), "Open");
        assert_eq!(empty.declarations, vec!["export type Open = Record<string, any>"]);

        let untyped = resolver.render_named_type(&SchemaNode::default(), "Loose");
        assert_eq!(untyped.declarations, vec!["export type Loose = any"]);
    }

    #[test]
    fn test_missing_reference_is_open_object() {
        let reg = SchemaRegistry::new();
        let rendered = SchemaGraphResolver::new(&reg).render_named_type(&SchemaNode::reference_to(404), "Gone");
        assert_eq!(rendered.declarations, vec!["export type Gone = Record<string, any>"]);
    }

    #[test]
    fn test_index_signature_is_opt_in() {
        let reg = SchemaRegistry::new();
        let schema = node(json!({ "type": "object", "properties": { "a": { "type": "string" } } }));

        let plain = SchemaGraphResolver::new(&reg).render_named_type(&schema, "Plain");
        assert!(!plain.declarations_text().contains("[key: string]: any"));

        let open = SchemaGraphResolver::new(&reg)
            .with_index_signature(true)
            .render_named_type(&schema, "Open");
        assert!(open.declarations_text().contains("  a?: string\n  [key: string]: any\n}"));
    }

    #[test]
    fn test_structural_items_union_with_primitive() {
        let reg = SchemaRegistry::new();
        let schema = node(json!({
            "type": "object",
            "properties": {
                "values": {
                    "type": "array",
                    "items": {
                        "type": ["object", "string"],
                        "properties": { "v": { "type": "number" } }
                    }
                },
                "maybe": {
                    "type": ["object", "null"],
                    "properties": { "x": { "type": "string" } }
                }
            },
            "required": ["values"]
        }));
        let rendered = SchemaGraphResolver::new(&reg).render_named_type(&schema, "Mixed");
        let text = rendered.declarations_text();
        assert!(text.contains("values: (MixedValuesItem | string)[]"));
        assert!(text.contains("maybe?: MixedMaybe | null"));
        assert!(text.contains("export interface MixedValuesItem {"));
    }

    #[test]
    fn test_child_name_collisions_are_suffixed() {
        let reg = SchemaRegistry::new();
        let schema = node(json!({
            "type": "object",
            "properties": {
                "user_info": { "type": "object", "properties": { "a": { "type": "string" } } },
                "userInfo": { "type": "object", "properties": { "b": { "type": "string" } } }
            },
            "x-apifox-orders": ["user_info", "userInfo"]
        }));
        let text = SchemaGraphResolver::new(&reg)
            .render_named_type(&schema, "Res")
            .declarations_text();
        assert!(text.contains("\"user_info\"?: ResUserInfo\n"));
        assert!(text.contains("userInfo?: ResUserInfo2\n"));
    }

    #[test]
    fn test_pending_properties_are_skipped() {
        let reg = SchemaRegistry::new();
        let schema = node(json!({
            "type": "object",
            "properties": {
                "kept": { "type": "string" },
                "draft": { "type": "object", "x-tmp-pending-properties": true }
            }
        }));
        let text = SchemaGraphResolver::new(&reg)
            .render_named_type(&schema, "Draft")
            .declarations_text();
        assert!(text.contains("kept?: string"));
        assert!(!text.contains("draft"));
    }

    #[test]
    fn test_step_budget_degrades_to_any() {
        let reg = SchemaRegistry::new();
        let schema = node(json!({
            "type": "object",
            "properties": {
                "a": { "type": "string" },
                "b": { "type": "string" },
                "c": { "type": "string" }
            }
        }));
        let text = SchemaGraphResolver::new(&reg)
            .with_step_budget(1)
            .render_named_type(&schema, "Tight")
            .declarations_text();
        assert!(text.contains("a?: string"));
        assert!(text.contains("c?: any"));
    }

    #[test]
    fn test_rendering_order_dedups_and_appends_sorted() {
        let schema = node(json!({
            "properties": { "b": {}, "a": {}, "c": {} },
            "x-apifox-orders": ["c", "c", "zzz"]
        }));
        assert_eq!(rendering_order(&schema), vec!["c", "a", "b"]);
    }
}
