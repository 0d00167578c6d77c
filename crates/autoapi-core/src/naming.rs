//! Identifier synthesis for generated declarations.
//!
//! Turns URL paths, HTTP methods and free text (including CJK folder and
//! property names) into stable TypeScript identifier fragments. Every function
//! here is total and pure.

// External imports (alphabetized)
use once_cell::sync::Lazy;
use regex::Regex;

static SCHEME_AND_HOST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://[^/]+").expect("valid scheme pattern"));

static PATH_VARIABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\$?)\{([^{}/]+)\}").expect("valid path variable pattern"));

static JS_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*$").expect("valid identifier pattern"));

/// Patterns recognised when extracting the transport binding from an import statement
static CLIENT_IMPORT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r#"import\s+([a-zA-Z_$][\w$]*)\s+as\s+([a-zA-Z_$][\w$]*)\s+from\s+['"][^'"]+['"]"#,
        r#"import\s+([a-zA-Z_$][\w$]*)\s+from\s+['"][^'"]+['"]"#,
        r#"(?:const|let|var)\s+([a-zA-Z_$][\w$]*)\s*=\s*require\s*\(\s*['"][^'"]+['"]\s*\)"#,
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid import pattern"))
    .collect()
});

/// Number of trailing path segments kept when building identifiers
const MAX_PATH_SEGMENTS: usize = 3;

/// Uppercase the first character, leaving the rest untouched
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
    }
}

/// Convert a URL path into a PascalCase identifier fragment.
///
/// A leading scheme and host are stripped, and only the last three non-empty
/// segments are kept. Variable delimiters (`{`, `}`, `$`) are removed and
/// `-`/`_` separated parts are joined in camel case.
///
/// ```
/// use autoapi_core::naming::path_to_identifier;
///
/// assert_eq!(path_to_identifier("/user/{id}/orders"), "UserIdOrders");
/// assert_eq!(path_to_identifier("https://api.example.com/v1/shop/order-items"), "V1ShopOrderItems");
/// ```
pub fn path_to_identifier(url_path: &str) -> String {
    let path = SCHEME_AND_HOST.replace(url_path, "");
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let start = segments.len().saturating_sub(MAX_PATH_SEGMENTS);

    segments[start..]
        .iter()
        .map(|segment| {
            let cleaned: String = segment
                .chars()
                .filter(|c| !matches!(c, '{' | '}' | '$'))
                .collect();
            let joined: String = cleaned
                .split(['-', '_'])
                .enumerate()
                .map(|(i, part)| if i == 0 { part.to_string() } else { capitalize(part) })
                .collect();
            capitalize(&joined)
        })
        .collect()
}

/// Function name for an operation: lowercase method followed by the path identifier
pub fn function_name(method: &str, url_path: &str) -> String {
    format!("{}{}", method.to_lowercase(), path_to_identifier(url_path))
}

/// Name of the optional secondary function emitted by the custom strategy
pub fn extra_function_name(function_name: &str) -> String {
    format!("use{}", capitalize(function_name))
}

fn normalize_punctuation(text: &str) -> String {
    text.replace("……", "...").chars().fold(
        String::with_capacity(text.len()),
        |mut out, ch| {
            match ch {
                '，' => out.push(','),
                '。' => out.push('.'),
                '？' => out.push('?'),
                '！' => out.push('!'),
                '：' => out.push(':'),
                '；' => out.push(';'),
                '“' | '”' => out.push('"'),
                '（' => out.push('('),
                '）' => out.push(')'),
                '《' => out.push('<'),
                '》' => out.push('>'),
                other => out.push(other),
            }
            out
        },
    )
}

/// Transliterate free text into an identifier-safe Latin form.
///
/// Each non-Latin character becomes its phonetic syllable. Within a `/`
/// separated segment the first word keeps its case and every following word is
/// capitalized. Full-width punctuation maps to its ASCII equivalent and
/// whitespace is dropped.
///
/// ```
/// use autoapi_core::naming::transliterate;
///
/// assert_eq!(transliterate("用户管理"), "yongHuGuanLi");
/// assert_eq!(transliterate("订单/详情"), "dingDan/xiangQing");
/// ```
pub fn transliterate(text: &str) -> String {
    let normalized = normalize_punctuation(text);
    let mut out = String::with_capacity(normalized.len());
    let mut segment_start = true;
    let mut ascii_run = String::new();

    fn push_word(out: &mut String, word: &str, segment_start: &mut bool) {
        if word.is_empty() {
            return;
        }
        if *segment_start {
            out.push_str(word);
            *segment_start = false;
        } else {
            out.push_str(&capitalize(word));
        }
    }

    for ch in normalized.chars() {
        if ch == '/' {
            push_word(&mut out, &ascii_run, &mut segment_start);
            ascii_run.clear();
            out.push('/');
            segment_start = true;
        } else if ch.is_ascii() {
            ascii_run.push(ch);
        } else {
            push_word(&mut out, &ascii_run, &mut segment_start);
            ascii_run.clear();
            let syllable = any_ascii::any_ascii_char(ch).to_lowercase();
            push_word(&mut out, syllable.trim(), &mut segment_start);
        }
    }
    push_word(&mut out, &ascii_run, &mut segment_start);

    out.retain(|c| !c.is_whitespace());
    out
}

/// PascalCase fragment for a property key, used when naming child declarations
pub fn pascal_segment(key: &str) -> String {
    let base = if key.is_ascii() {
        key.to_string()
    } else {
        transliterate(key)
    };
    let pascal: String = base
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(capitalize)
        .collect();
    if pascal.is_empty() {
        "Field".to_string()
    } else {
        pascal
    }
}

/// Quote a property name unless it consists of ASCII letters only
pub fn quote_if_non_identifier(name: &str) -> String {
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphabetic()) {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\\\""))
    }
}

/// Whether `name` can be used as a bare JavaScript identifier
pub fn is_identifier(name: &str) -> bool {
    JS_IDENTIFIER.is_match(name)
}

/// Turn a parameter name into something usable as a function argument
pub fn identifier_safe(name: &str) -> String {
    if is_identifier(name) {
        return name.to_string();
    }
    let ident: String = name
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .enumerate()
        .map(|(i, part)| if i == 0 { part.to_string() } else { capitalize(part) })
        .collect();
    match ident.chars().next() {
        Some(c) if !c.is_ascii_digit() => ident,
        _ => format!("_{ident}"),
    }
}

/// Rewrite `{var}` path variables into template literal substitutions.
///
/// With more than one path parameter every variable is read from the
/// `pathParams` argument. Variables already written as `${var}` are left alone.
pub fn template_url(path: &str, path_param_count: usize) -> String {
    PATH_VARIABLE
        .replace_all(path, |caps: &regex::Captures| {
            let var = &caps[2];
            if !caps[1].is_empty() {
                return caps[0].to_string();
            }
            if path_param_count > 1 {
                if is_identifier(var) {
                    format!("${{pathParams.{var}}}")
                } else {
                    format!("${{pathParams['{var}']}}")
                }
            } else {
                format!("${{{}}}", identifier_safe(var))
            }
        })
        .into_owned()
}

/// Extract the local binding name from a transport import statement
pub fn client_alias(import_statement: &str) -> Option<String> {
    CLIENT_IMPORT_PATTERNS.iter().find_map(|pattern| {
        pattern.captures(import_statement).map(|caps| {
            caps.get(2)
                .or_else(|| caps.get(1))
                .map(|m| m.as_str().to_string())
                .unwrap_or_default()
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_to_identifier() {
        assert_eq!(path_to_identifier("/user/{id}/orders"), "UserIdOrders");
        assert_eq!(path_to_identifier("/items/{id}"), "ItemsId");
        assert_eq!(path_to_identifier("/a/b/c/d/e"), "CDE");
        assert_eq!(path_to_identifier("/api/user_info/get-list"), "ApiUserInfoGetList");
        assert_eq!(path_to_identifier("/files/${fileId}"), "FilesFileId");
        assert_eq!(path_to_identifier("http://localhost:8080/ping"), "Ping");
        assert_eq!(path_to_identifier("/"), "");
    }

    #[test]
    fn test_path_to_identifier_is_deterministic() {
        let p = "/shop/{shopId}/order-items/{item_id}";
        assert_eq!(path_to_identifier(p), path_to_identifier(p));
        assert_eq!(path_to_identifier(p), "ShopIdOrderItemsItemId");
    }

    #[test]
    fn test_function_names() {
        assert_eq!(function_name("GET", "/user/{id}/orders"), "getUserIdOrders");
        assert_eq!(function_name("post", "/items"), "postItems");
        assert_eq!(extra_function_name("getItemsId"), "useGetItemsId");
    }

    #[test]
    fn test_transliterate() {
        assert_eq!(transliterate("用户管理"), "yongHuGuanLi");
        assert_eq!(transliterate("订单/详情"), "dingDan/xiangQing");
        assert_eq!(transliterate("v2接口"), "v2JieKou");
        assert_eq!(transliterate("名称（新）"), "mingCheng(Xin)");
        assert_eq!(transliterate("plain"), "plain");
    }

    #[test]
    fn test_pascal_segment() {
        assert_eq!(pascal_segment("user_info"), "UserInfo");
        assert_eq!(pascal_segment("userName"), "UserName");
        assert_eq!(pascal_segment("items"), "Items");
        assert_eq!(pascal_segment("用户"), "YongHu");
        assert_eq!(pascal_segment("$$"), "Field");
    }

    #[test]
    fn test_quote_if_non_identifier() {
        assert_eq!(quote_if_non_identifier("total"), "total");
        assert_eq!(quote_if_non_identifier("user_id"), "\"user_id\"");
        assert_eq!(quote_if_non_identifier("a.b"), "\"a.b\"");
        assert_eq!(quote_if_non_identifier("list[]"), "\"list[]\"");
    }

    #[test]
    fn test_template_url() {
        assert_eq!(template_url("/items/{id}", 1), "/items/${id}");
        assert_eq!(
            template_url("/shop/{shopId}/items/{itemId}", 2),
            "/shop/${pathParams.shopId}/items/${pathParams.itemId}"
        );
        assert_eq!(template_url("/files/${id}", 1), "/files/${id}");
        assert_eq!(template_url("/users/{user-id}", 1), "/users/${userId}");
        assert_eq!(template_url("/plain", 0), "/plain");
    }

    #[test]
    fn test_client_alias() {
        assert_eq!(client_alias(r#"import axios from "axios""#).as_deref(), Some("axios"));
        assert_eq!(
            client_alias("import request from '@/utils/request'").as_deref(),
            Some("request")
        );
        assert_eq!(
            client_alias(r#"import axios as http from "axios""#).as_deref(),
            Some("http")
        );
        assert_eq!(
            client_alias(r#"const service = require("./service")"#).as_deref(),
            Some("service")
        );
        assert_eq!(client_alias("export {}"), None);
    }

    #[test]
    fn test_identifier_safe() {
        assert_eq!(identifier_safe("id"), "id");
        assert_eq!(identifier_safe("user-id"), "userId");
        assert_eq!(identifier_safe("1st"), "_1st");
    }
}
