//! API models and the emission strategies behind them.

// Internal imports (std, crate)
use std::fmt;
use std::str::FromStr;

use crate::config::Config;
use crate::emit::custom::CustomStrategy;
use crate::emit::header::{self, HeaderContext};
use crate::naming::client_alias;
use crate::snapshot::ApiOperation;

// External imports (alphabetized)
use serde::{Deserialize, Serialize};

/// Transport style of the generated client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ApiModel {
    /// Promise returning functions over an axios-like instance
    #[default]
    #[serde(rename = "axios")]
    Axios,
    /// Calls through a generated `http` helper for mini programs
    #[serde(rename = "miniprogram", alias = "wx")]
    Miniprogram,
    /// Function bodies rendered from user supplied templates
    #[serde(rename = "custom")]
    Custom,
    /// Reserved, emits no functions
    #[serde(rename = "vueUse")]
    VueUse,
    /// Reserved, emits no functions
    #[serde(rename = "VueHookPlus")]
    VueHookPlus,
}

impl FromStr for ApiModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "axios" => Ok(ApiModel::Axios),
            "miniprogram" | "wx" => Ok(ApiModel::Miniprogram),
            "custom" => Ok(ApiModel::Custom),
            "vueuse" => Ok(ApiModel::VueUse),
            "vuehookplus" => Ok(ApiModel::VueHookPlus),
            _ => Err(format!("Unknown API model: {}", s)),
        }
    }
}

impl ApiModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Axios => "axios",
            Self::Miniprogram => "miniprogram",
            Self::Custom => "custom",
            Self::VueUse => "vueUse",
            Self::VueHookPlus => "VueHookPlus",
        }
    }

    pub fn all() -> impl Iterator<Item = Self> {
        use ApiModel::*;
        [Axios, Miniprogram, Custom, VueUse, VueHookPlus].iter().copied()
    }

    /// Whether this model is reserved and intentionally emits nothing
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Self::VueUse | Self::VueHookPlus)
    }

    /// Strategy implementing this model with the given configuration
    pub fn strategy(self, config: &Config) -> Box<dyn EmissionStrategy> {
        match self {
            ApiModel::Axios => Box::new(AxiosStrategy::new(&config.axios_import)),
            ApiModel::Miniprogram => Box::new(MiniprogramStrategy),
            ApiModel::Custom => Box::new(CustomStrategy::from_config(config)),
            ApiModel::VueUse | ApiModel::VueHookPlus => Box::new(PlaceholderStrategy::new(self)),
        }
    }
}

impl fmt::Display for ApiModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Resolved inputs for emitting one operation's function
#[derive(Debug, Clone)]
pub struct FunctionContext<'a> {
    pub operation: &'a ApiOperation,
    pub function_name: String,
    pub extra_function_name: String,
    /// Lowercase HTTP method
    pub method: String,
    /// Operation path with path variables rewritten as template substitutions
    pub path_template: String,
    /// Leading arguments: path parameter(s), query parameters, body
    pub args: Vec<String>,
    pub path_params: Vec<String>,
    pub query_params: Vec<String>,
    pub has_query: bool,
    /// The function takes a `data` argument
    pub has_body: bool,
    pub query_type: Option<String>,
    pub path_query_type: Option<String>,
    pub body_type: Option<String>,
    pub response_type: String,
    /// JSDoc block placed above the function
    pub description: String,
}

impl FunctionContext<'_> {
    pub fn is_read_only(&self) -> bool {
        crate::emit::is_read_only(&self.method)
    }

    /// Whether the URL needs a template literal
    pub fn has_parameters(&self) -> bool {
        !self.path_params.is_empty() || self.has_query
    }

    pub fn signature_args(&self, config_arg: &str) -> String {
        self.args
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(config_arg))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// One way of turning operations into client functions
pub trait EmissionStrategy: Send + Sync {
    fn model(&self) -> ApiModel;

    /// Function text for one operation, description block included. An empty
    /// string means the strategy intentionally emits nothing.
    fn function(&self, ctx: &FunctionContext<'_>) -> crate::Result<String>;

    /// Header of the function file
    fn header(&self, ctx: &HeaderContext<'_>) -> String;

    /// Extra files this strategy needs next to the generated code
    fn needs_scaffold(&self) -> bool {
        false
    }
}

/// Default strategy: `async` functions returning the axios promise
#[derive(Debug, Clone)]
pub struct AxiosStrategy {
    import_statement: String,
    alias: String,
}

impl AxiosStrategy {
    pub fn new(import_statement: &str) -> Self {
        let alias = client_alias(import_statement)
            .filter(|alias| !alias.is_empty())
            .unwrap_or_else(|| "axios".to_string());
        Self {
            import_statement: import_statement.to_string(),
            alias,
        }
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// The function without its description block
    pub fn function_body(&self, ctx: &FunctionContext<'_>) -> String {
        let url = if ctx.has_parameters() {
            let query = if ctx.has_query {
                "?${qs.stringify(params)}"
            } else {
                ""
            };
            format!("`{}{query}`", ctx.path_template)
        } else {
            format!("'{}'", ctx.operation.path)
        };
        let data = match (ctx.is_read_only(), ctx.has_body) {
            (true, _) => "",
            (false, true) => "data, ",
            (false, false) => "{}, ",
        };
        format!(
            "export const {name} = async ({args}): Promise<{res}> => {{\n  return {alias}.{method}({url}, {data}axiosConfig)\n}}",
            name = ctx.function_name,
            args = ctx.signature_args("axiosConfig?: AxiosRequestConfig"),
            res = ctx.response_type,
            alias = self.alias,
            method = ctx.method,
        )
    }
}

impl EmissionStrategy for AxiosStrategy {
    fn model(&self) -> ApiModel {
        ApiModel::Axios
    }

    fn function(&self, ctx: &FunctionContext<'_>) -> crate::Result<String> {
        Ok(format!("{}\n{}", ctx.description, self.function_body(ctx)))
    }

    fn header(&self, ctx: &HeaderContext<'_>) -> String {
        header::axios_header(ctx, &self.import_statement)
    }
}

/// Functions calling the scaffolded mini program `http` helper
#[derive(Debug, Clone, Copy, Default)]
pub struct MiniprogramStrategy;

impl EmissionStrategy for MiniprogramStrategy {
    fn model(&self) -> ApiModel {
        ApiModel::Miniprogram
    }

    fn function(&self, ctx: &FunctionContext<'_>) -> crate::Result<String> {
        let passes_params = matches!(ctx.method.as_str(), "get" | "delete");
        let (url, payload) = if passes_params {
            let payload = if ctx.has_query { "params" } else { "{}" };
            (format!("`{}`", ctx.path_template), payload)
        } else {
            let query = if ctx.has_query {
                "?${qs.stringify(params)}"
            } else {
                ""
            };
            let payload = if ctx.has_body { "data" } else { "{}" };
            (format!("`{}{query}`", ctx.path_template), payload)
        };

        Ok(format!(
            "{description}\nexport const {name} = async ({args}) => {{\n  return http.{method}<{res}>({url}, {payload}, config)\n}}",
            description = ctx.description,
            name = ctx.function_name,
            args = ctx.signature_args("config?: OtherRequestConfig"),
            method = ctx.method,
            res = ctx.response_type,
        ))
    }

    fn header(&self, ctx: &HeaderContext<'_>) -> String {
        header::miniprogram_header(ctx)
    }

    fn needs_scaffold(&self) -> bool {
        true
    }
}

/// Reserved models. They produce no functions, which is not an error.
#[derive(Debug, Clone, Copy)]
pub struct PlaceholderStrategy {
    model: ApiModel,
}

impl PlaceholderStrategy {
    pub fn new(model: ApiModel) -> Self {
        Self { model }
    }
}

impl EmissionStrategy for PlaceholderStrategy {
    fn model(&self) -> ApiModel {
        self.model
    }

    fn function(&self, _ctx: &FunctionContext<'_>) -> crate::Result<String> {
        Ok(String::new())
    }

    fn header(&self, ctx: &HeaderContext<'_>) -> String {
        header::marker_header(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_as_str_and_display() {
        assert_eq!(ApiModel::Axios.as_str(), "axios");
        assert_eq!(ApiModel::Miniprogram.to_string(), "miniprogram");
        assert_eq!(ApiModel::VueHookPlus.to_string(), "VueHookPlus");
    }

    #[test]
    fn test_from_str() {
        assert_eq!("axios".parse::<ApiModel>().unwrap(), ApiModel::Axios);
        assert_eq!("WX".parse::<ApiModel>().unwrap(), ApiModel::Miniprogram);
        assert_eq!("vueUse".parse::<ApiModel>().unwrap(), ApiModel::VueUse);
        assert!("fetch".parse::<ApiModel>().is_err());
    }

    #[test]
    fn test_serde_alias() {
        let model: ApiModel = serde_json::from_str("\"wx\"").unwrap();
        assert_eq!(model, ApiModel::Miniprogram);
        assert_eq!(serde_json::to_string(&model).unwrap(), "\"miniprogram\"");
    }

    #[test]
    fn test_all_unique() {
        let all: HashSet<_> = ApiModel::all().collect();
        assert_eq!(all.len(), 5);
        assert_eq!(ApiModel::all().filter(ApiModel::is_placeholder).count(), 2);
    }

    #[test]
    fn test_strategy_lookup() {
        let config = Config::default();
        for model in ApiModel::all() {
            assert_eq!(model.strategy(&config).model(), model);
        }
        assert!(ApiModel::Miniprogram.strategy(&config).needs_scaffold());
        assert!(!ApiModel::Axios.strategy(&config).needs_scaffold());
    }

    #[test]
    fn test_axios_alias_from_import() {
        assert_eq!(AxiosStrategy::new("import request from '@/utils/request'").alias(), "request");
        assert_eq!(AxiosStrategy::new("").alias(), "axios");
    }
}
