//! User supplied function templates.
//!
//! The `custom` model renders each function, and an optional secondary `use*`
//! function, from Tera templates kept in the local configuration. Templates see
//! a read-only [`ScriptContext`] and cannot reach the file system or run code.
//! A template that fails to render fails only the operation it was rendered for.

use crate::config::Config;
use crate::emit::header::{self, HeaderContext};
use crate::emit::strategy::{ApiModel, AxiosStrategy, EmissionStrategy, FunctionContext};
use crate::Error;

// External imports (alphabetized)
use log::warn;
use serde::Serialize;
use tera::{Context, Tera};

/// Values exposed to custom templates
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptContext<'a> {
    pub api_function_name: &'a str,
    pub use_api_function_name: &'a str,
    /// Path with template substitutions, e.g. `/items/${id}`
    pub api_path: &'a str,
    pub raw_path: &'a str,
    pub api_method: &'a str,
    pub path_params: &'a [String],
    pub query_params: &'a [String],
    pub have_req_body: bool,
    pub have_query: bool,
    pub interface_query_name: Option<&'a str>,
    pub interface_path_query_name: Option<&'a str>,
    pub interface_body_name: Option<&'a str>,
    pub interface_res_name: &'a str,
    /// Leading signature arguments, comma separated
    pub args: String,
    pub description: &'a str,
    /// What the axios model would have emitted for this operation
    pub default_function: &'a str,
}

impl<'a> ScriptContext<'a> {
    pub fn new(ctx: &'a FunctionContext<'a>, default_function: &'a str) -> Self {
        Self {
            api_function_name: &ctx.function_name,
            use_api_function_name: &ctx.extra_function_name,
            api_path: &ctx.path_template,
            raw_path: &ctx.operation.path,
            api_method: &ctx.method,
            path_params: &ctx.path_params,
            query_params: &ctx.query_params,
            have_req_body: ctx.has_body,
            have_query: ctx.has_query,
            interface_query_name: ctx.query_type.as_deref(),
            interface_path_query_name: ctx.path_query_type.as_deref(),
            interface_body_name: ctx.body_type.as_deref(),
            interface_res_name: &ctx.response_type,
            args: ctx.args.join(", "),
            description: &ctx.description,
            default_function,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CustomStrategy {
    head: Option<String>,
    return_template: Option<String>,
    extra_template: Option<String>,
    fallback: AxiosStrategy,
}

impl CustomStrategy {
    pub fn new(
        head: Option<String>,
        return_template: Option<String>,
        extra_template: Option<String>,
        client_import: &str,
    ) -> Self {
        let non_blank = |s: Option<String>| s.filter(|s| !s.trim().is_empty());
        Self {
            head: non_blank(head),
            return_template: non_blank(return_template),
            extra_template: non_blank(extra_template),
            fallback: AxiosStrategy::new(client_import),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.head.clone(),
            config.custom_return.clone(),
            config.custom_extra_function.clone(),
            &config.axios_import,
        )
    }

    fn render(&self, template: &str, script: &ScriptContext<'_>, operation: &str) -> crate::Result<String> {
        let context = Context::from_serialize(script)
            .map_err(|e| Error::custom_strategy(operation, error_chain(&e)))?;
        Tera::one_off(template, &context, false)
            .map(|rendered| rendered.trim().to_string())
            .map_err(|e| Error::custom_strategy(operation, error_chain(&e)))
    }
}

impl EmissionStrategy for CustomStrategy {
    fn model(&self) -> ApiModel {
        ApiModel::Custom
    }

    fn function(&self, ctx: &FunctionContext<'_>) -> crate::Result<String> {
        let operation = ctx.operation.label();
        let default_function = self.fallback.function_body(ctx);
        let script = ScriptContext::new(ctx, &default_function);

        let main = match &self.return_template {
            Some(template) => {
                let rendered = self.render(template, &script, &operation)?;
                if rendered.is_empty() {
                    default_function.clone()
                } else {
                    rendered
                }
            }
            None => default_function.clone(),
        };

        let mut text = format!("{}\n{main}", ctx.description);
        if let Some(template) = &self.extra_template {
            let extra = self.render(template, &script, &operation)?;
            if extra.is_empty() {
                warn!("{operation}: custom extra function rendered nothing, skipping it");
            } else {
                text.push_str("\n\n");
                text.push_str(&extra_description(&ctx.description, &ctx.extra_function_name));
                text.push('\n');
                text.push_str(&extra);
            }
        }
        Ok(text)
    }

    fn header(&self, ctx: &HeaderContext<'_>) -> String {
        match &self.head {
            Some(head) => header::custom_header(ctx, head),
            None => self.fallback.header(ctx),
        }
    }
}

/// The function description with a line naming the extra function
fn extra_description(description: &str, extra_name: &str) -> String {
    let mut lines: Vec<String> = description.lines().map(str::to_string).collect();
    let at = lines.len().min(1);
    lines.insert(at, format!(" * custom function: {extra_name}"));
    lines.join("\n")
}

fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
