//! Declaration emission for single API operations.
//!
//! For every operation the emitter produces its interface declarations (query,
//! path, body and response shapes) and one client function. The function text
//! comes from the configured [`EmissionStrategy`]; everything else is shared by
//! all strategies.
//!
//! # Examples
//!
//! ```
//! use autoapi_core::emit::{DeclarationEmitter, ApiModel};
//! use autoapi_core::schema::SchemaRegistry;
//! use autoapi_core::snapshot::ApiOperation;
//! use autoapi_core::Config;
//!
//! let registry = SchemaRegistry::new();
//! let config = Config::default();
//! let emitter = DeclarationEmitter::new(&registry, ApiModel::Axios.strategy(&config));
//! let op = ApiOperation {
//!     method: "get".into(),
//!     path: "/ping".into(),
//!     ..Default::default()
//! };
//! let set = emitter.emit(&op).unwrap();
//! assert_eq!(set.names.function, "getPing");
//! assert!(set.interface_text().contains("export type getPingRes = any"));
//! ```

pub mod custom;
pub mod header;
pub mod strategy;

// Internal imports (std, crate)
use std::collections::BTreeMap;

use crate::naming::{extra_function_name, function_name, identifier_safe, template_url};
use crate::schema::{ParameterTypeResolver, SchemaGraphResolver, SchemaNode, SchemaRegistry, SchemaType};
use crate::snapshot::{ApiOperation, ApiParameter};

pub use header::HeaderContext;
pub use strategy::{ApiModel, EmissionStrategy, FunctionContext};

// External imports (alphabetized)
use log::debug;

/// Methods that never carry a request body argument
pub const READ_ONLY_METHODS: [&str; 4] = ["get", "delete", "head", "options"];

pub fn is_read_only(method: &str) -> bool {
    READ_ONLY_METHODS.contains(&method.to_lowercase().as_str())
}

/// Declaration names derived from one operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationNames {
    pub function: String,
    pub extra_function: String,
    /// Present only when the operation has query parameters
    pub query: Option<String>,
    /// Present only with more than one path parameter
    pub path_query: Option<String>,
    /// Present only when a request body is declared
    pub body: Option<String>,
    pub response: String,
}

impl OperationNames {
    pub fn for_operation(op: &ApiOperation) -> Self {
        let function = function_name(&op.method, &op.path);
        Self {
            extra_function: extra_function_name(&function),
            query: (!op.parameters.query.is_empty()).then(|| format!("{function}Query")),
            path_query: (op.parameters.path.len() > 1).then(|| format!("{function}PathQuery")),
            body: op.has_body().then(|| format!("{function}Body")),
            response: format!("{function}Res"),
            function,
        }
    }

    /// Interface names in declaration order
    pub fn interfaces(&self) -> impl Iterator<Item = &str> {
        [
            self.query.as_deref(),
            self.path_query.as_deref(),
            self.body.as_deref(),
            Some(self.response.as_str()),
        ]
        .into_iter()
        .flatten()
    }
}

/// Everything emitted for one operation
#[derive(Debug, Clone)]
pub struct GeneratedDeclarationSet {
    /// `METHOD path` of the source operation
    pub operation: String,
    pub names: OperationNames,
    /// Interface blocks, each with its description comment
    pub interfaces: Vec<String>,
    /// Function text with description; empty for placeholder models
    pub function_text: String,
    pub uses_querystring: bool,
}

impl GeneratedDeclarationSet {
    pub fn interface_text(&self) -> String {
        self.interfaces.join("\n\n")
    }
}

/// Builds [`GeneratedDeclarationSet`]s with one emission strategy
pub struct DeclarationEmitter<'a> {
    registry: &'a SchemaRegistry,
    strategy: Box<dyn EmissionStrategy>,
    return_keys: Vec<String>,
    type_extension: bool,
}

impl<'a> DeclarationEmitter<'a> {
    pub fn new(registry: &'a SchemaRegistry, strategy: Box<dyn EmissionStrategy>) -> Self {
        Self {
            registry,
            strategy,
            return_keys: Vec::new(),
            type_extension: false,
        }
    }

    /// Comma separated response unwrap keys, e.g. `data`
    pub fn with_return_keys(mut self, keys: &str) -> Self {
        self.return_keys = keys
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect();
        self
    }

    pub fn with_type_extension(mut self, enabled: bool) -> Self {
        self.type_extension = enabled;
        self
    }

    pub fn strategy(&self) -> &dyn EmissionStrategy {
        self.strategy.as_ref()
    }

    pub fn emit(&self, op: &ApiOperation) -> crate::Result<GeneratedDeclarationSet> {
        debug!("Emitting declarations for {}", op.label());
        let names = OperationNames::for_operation(op);
        let interfaces = self.interfaces(op, &names);
        let ctx = self.function_context(op, &names);
        let function_text = self.strategy.function(&ctx)?;

        Ok(GeneratedDeclarationSet {
            operation: op.label(),
            uses_querystring: header::needs_querystring(&function_text),
            function_text,
            interfaces,
            names,
        })
    }

    fn resolver(&self) -> SchemaGraphResolver<'a> {
        SchemaGraphResolver::new(self.registry).with_index_signature(self.type_extension)
    }

    fn interfaces(&self, op: &ApiOperation, names: &OperationNames) -> Vec<String> {
        let mut blocks = Vec::new();

        if let Some(name) = &names.query {
            let schema = parameters_schema(&op.parameters.query);
            blocks.push(self.block(op, "query parameters", &schema, name));
        }
        if let Some(name) = &names.path_query {
            let schema = parameters_schema(&op.parameters.path);
            blocks.push(self.block(op, "path parameters", &schema, name));
        }
        if let Some(name) = &names.body {
            let schema = match op.body_schema() {
                Some(schema) => schema.clone(),
                None => parameters_schema(op.body_parameters()),
            };
            blocks.push(self.block(op, "request body", &schema, name));
        }

        let description = interface_description(op, "response");
        let response = match self.response_schema(op) {
            Some(schema) => self.resolver().render_named_type(&schema, &names.response).declarations_text(),
            None => format!("export type {} = any", names.response),
        };
        blocks.push(format!("{description}\n{response}"));
        blocks
    }

    fn block(&self, op: &ApiOperation, label: &str, schema: &SchemaNode, name: &str) -> String {
        let rendered = self.resolver().render_named_type(schema, name);
        format!(
            "{}\n{}",
            interface_description(op, label),
            rendered.declarations_text()
        )
    }

    /// Effective response schema: the 200 response, narrowed by the unwrap keys
    /// when every key is a property of the resolved response.
    pub fn response_schema(&self, op: &ApiOperation) -> Option<SchemaNode> {
        let schema = op.success_response()?.json_schema.clone()?;
        if self.return_keys.is_empty() {
            return Some(schema);
        }

        let resolved = self.registry.substitute_references(&schema);
        let mut effective = self.registry.merge_compositions(&resolved);
        if !self
            .return_keys
            .iter()
            .all(|key| effective.properties.contains_key(key))
        {
            return Some(schema);
        }

        if let [key] = self.return_keys.as_slice() {
            return effective.properties.remove(key);
        }

        effective.properties.retain(|key, _| self.return_keys.contains(key));
        effective.required_names.retain(|key| self.return_keys.contains(key));
        effective.ordering_key = self.return_keys.clone();
        Some(effective)
    }

    fn function_context<'o>(&self, op: &'o ApiOperation, names: &OperationNames) -> FunctionContext<'o> {
        let method = op.method.to_lowercase();
        let path_params = &op.parameters.path;
        let has_query = names.query.is_some();
        let has_body = !is_read_only(&method) && names.body.is_some();

        let mut args = Vec::new();
        match path_params.as_slice() {
            [] => {}
            [single] => args.push(format!(
                "{}: {}",
                identifier_safe(&single.name),
                path_param_type(single)
            )),
            _ => {
                if let Some(path_query) = &names.path_query {
                    args.push(format!("pathParams: {path_query}"));
                }
            }
        }
        if let Some(query) = &names.query {
            args.push(format!("params: {query}"));
        }
        if has_body {
            if let Some(body) = &names.body {
                args.push(format!("data: {body}"));
            }
        }

        let path_template = if path_params.is_empty() {
            op.path.clone()
        } else {
            template_url(&op.path, path_params.len())
        };

        FunctionContext {
            operation: op,
            function_name: names.function.clone(),
            extra_function_name: names.extra_function.clone(),
            method,
            path_template,
            args,
            path_params: path_params.iter().map(|p| p.name.clone()).collect(),
            query_params: op.parameters.query.iter().map(|p| p.name.clone()).collect(),
            has_query,
            has_body,
            query_type: names.query.clone(),
            path_query_type: names.path_query.clone(),
            body_type: names.body.clone(),
            response_type: names.response.clone(),
            description: function_description(op),
        }
    }
}

/// Object schema whose properties are the given parameters, in order
pub fn parameters_schema(params: &[ApiParameter]) -> SchemaNode {
    let mut properties = BTreeMap::new();
    let mut ordering_key = Vec::with_capacity(params.len());
    let mut required_names = Vec::new();
    for param in params.iter().filter(|p| !p.name.is_empty()) {
        properties.insert(param.name.clone(), param.as_schema());
        ordering_key.push(param.name.clone());
        if param.required {
            required_names.push(param.name.clone());
        }
    }
    SchemaNode {
        types: vec![SchemaType::Object],
        properties,
        required_names,
        ordering_key,
        ..Default::default()
    }
}

fn path_param_type(param: &ApiParameter) -> String {
    ParameterTypeResolver::resolve(&param.as_schema()).or_any()
}

fn summary(op: &ApiOperation) -> String {
    let summary = if op.tags.is_empty() {
        op.name.clone()
    } else {
        format!("{}/{}", op.tags.join("/"), op.name)
    };
    summary.trim().replace("\r\n", "; ").replace('\n', "; ")
}

/// JSDoc block above an interface declaration
pub fn interface_description(op: &ApiOperation, label: &str) -> String {
    format!(
        "/**\n * @description {} -- {label}\n * @url {} {}\n */",
        summary(op),
        op.method.to_uppercase(),
        op.path
    )
}

/// JSDoc block above a client function, linking back to the Apifox project
pub fn function_description(op: &ApiOperation) -> String {
    let project = op
        .project_id
        .map(|id| id.to_string())
        .unwrap_or_default();
    format!(
        "/**\n * @description {}\n * @url {} {}\n * @host https://app.apifox.com/link/project/{project}/apis/api-{}\n */",
        summary(op),
        op.method.to_uppercase(),
        op.path,
        op.id
    )
}
