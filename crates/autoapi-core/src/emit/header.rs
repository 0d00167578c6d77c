//! Function file headers and import bookkeeping.

// Internal imports (std, crate)
use std::path::{Component, Path, PathBuf};

/// Lint and type-check suppression markers opening every function file
pub const HEADER_MARKERS: &str =
    "/* eslint-disable @typescript-eslint/no-unused-vars */\n// @ts-nocheck: generated code";

/// Import of the query string helper
pub const QS_IMPORT: &str = "import qs from 'qs'";

/// Marker searched for in function text to decide whether `qs` is needed
pub const QS_USAGE: &str = "${qs.stringify(";

/// Module that holds the generated interfaces, relative to the function file
pub const INTERFACE_MODULE: &str = "./interface";

/// Inputs for building a function file header
#[derive(Debug, Clone)]
pub struct HeaderContext<'a> {
    /// Interface names referenced by the function text, sorted
    pub interface_names: &'a [String],
    pub uses_querystring: bool,
    pub function_file: &'a Path,
    /// Directory the generated tree is rooted at (`{workspace_root}{path}`)
    pub output_root: &'a Path,
}

/// Whether generated function text serializes query parameters with `qs`
pub fn needs_querystring(function_text: &str) -> bool {
    function_text.contains(QS_USAGE)
}

/// Candidate interface names that actually occur in the function text,
/// deduplicated and sorted
pub fn referenced_interfaces<'a, I>(candidates: I, function_text: &str) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut names: Vec<String> = candidates
        .into_iter()
        .filter(|name| !name.is_empty() && function_text.contains(name))
        .map(str::to_string)
        .collect();
    names.sort();
    names.dedup();
    names
}

/// `import type { .. } from './interface'`, or nothing when no name is used
pub fn interface_import(names: &[String]) -> Option<String> {
    if names.is_empty() {
        return None;
    }
    Some(format!(
        "import type {{ {} }} from '{INTERFACE_MODULE}'",
        names.join(", ")
    ))
}

fn assemble(lines: Vec<Option<String>>) -> String {
    lines.into_iter().flatten().collect::<Vec<_>>().join("\n")
}

/// Markers plus the optional `qs` and interface imports
pub fn marker_header(ctx: &HeaderContext<'_>) -> String {
    assemble(vec![
        Some(HEADER_MARKERS.to_string()),
        ctx.uses_querystring.then(|| QS_IMPORT.to_string()),
        interface_import(ctx.interface_names),
    ])
}

pub fn axios_header(ctx: &HeaderContext<'_>, client_import: &str) -> String {
    assemble(vec![
        Some(HEADER_MARKERS.to_string()),
        ctx.uses_querystring.then(|| QS_IMPORT.to_string()),
        Some("import type { AxiosRequestConfig } from 'axios'".to_string()),
        interface_import(ctx.interface_names),
        Some(client_import.trim().to_string()).filter(|s| !s.is_empty()),
    ])
}

pub fn miniprogram_header(ctx: &HeaderContext<'_>) -> String {
    assemble(vec![
        Some(HEADER_MARKERS.to_string()),
        Some(format!(
            "import {{ http }} from \"{}\"",
            request_helper_import(ctx.output_root, ctx.function_file)
        )),
        ctx.uses_querystring.then(|| QS_IMPORT.to_string()),
        interface_import(ctx.interface_names),
    ])
}

/// Header for the custom model with a user supplied import block
pub fn custom_header(ctx: &HeaderContext<'_>, head: &str) -> String {
    let mut block = head.trim().to_string();
    if let Some(import) = interface_import(ctx.interface_names) {
        block.push('\n');
        block.push_str(&import);
    }
    if ctx.uses_querystring && !block.contains("import qs") {
        block.push('\n');
        block.push_str(QS_IMPORT);
    }
    format!("{HEADER_MARKERS}\n{}", sort_imports(&block))
}

/// Move `import` lines to the top in sorted order, keeping other lines in place
pub fn sort_imports(code: &str) -> String {
    let (mut imports, others): (Vec<&str>, Vec<&str>) =
        code.lines().partition(|line| line.starts_with("import"));
    imports.sort_unstable();
    let others: Vec<&str> = others.into_iter().filter(|line| !line.trim().is_empty()).collect();
    imports
        .into_iter()
        .chain(others)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Relative import of the scaffolded request helper from `function_file`
pub fn request_helper_import(output_root: &Path, function_file: &Path) -> String {
    let helper = output_root.join("request").join("index.ts");
    relative_import_path(function_file, &helper)
}

/// Import specifier for `to` as seen from the file `from`.
///
/// ```
/// use std::path::Path;
/// use autoapi_core::emit::header::relative_import_path;
///
/// let from = Path::new("/app/src/api/apifox/user/apifox.ts");
/// let to = Path::new("/app/src/api/request/index.ts");
/// assert_eq!(relative_import_path(from, to), "../../request/index");
/// ```
pub fn relative_import_path(from: &Path, to: &Path) -> String {
    let base_dir = from.parent().map(normalized).unwrap_or_default();
    let target_path = normalized(to);
    let base: Vec<Component<'_>> = base_dir.components().collect();
    let target: Vec<Component<'_>> = target_path.components().collect();

    let common = base
        .iter()
        .zip(target.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = Vec::new();
    for _ in common..base.len() {
        parts.push("..".to_string());
    }
    for component in &target[common..] {
        parts.push(component.as_os_str().to_string_lossy().into_owned());
    }

    let mut relative = parts.join("/");
    for ext in [".ts", ".js"] {
        if let Some(stripped) = relative.strip_suffix(ext) {
            relative = stripped.to_string();
            break;
        }
    }
    if !relative.starts_with('.') {
        relative = format!("./{relative}");
    }
    relative
}

/// Drop `.` components and resolve `..` lexically
fn normalized(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
