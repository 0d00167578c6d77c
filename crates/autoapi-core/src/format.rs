//! Formatting generated TypeScript with an external formatter.
//!
//! Formatting is best effort. [`format_with_fallback`] retries without plugins
//! and finally returns the unformatted text, so a missing or broken formatter
//! never fails a generation run.

// Internal imports (std, crate)
use std::collections::BTreeMap;
use std::future::Future;
use std::process::Stdio;
use std::time::Duration;

use crate::config::{Config, FormatterConfig};
use crate::Error;

// External imports (alphabetized)
use log::{debug, warn};
use serde_json::Value as JsonValue;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;

/// Options passed to one formatter run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormatOptions {
    /// Prettier style options keyed by their camelCase name
    pub options: BTreeMap<String, JsonValue>,
    pub plugins: Vec<String>,
}

impl FormatOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            options: config.prettier_options(),
            plugins: config.formatter.plugins.clone(),
        }
    }

    pub fn without_plugins(&self) -> Self {
        Self {
            options: self.options.clone(),
            plugins: Vec::new(),
        }
    }

    /// Command line flags for these options.
    ///
    /// ```
    /// use autoapi_core::format::FormatOptions;
    /// use serde_json::json;
    ///
    /// let mut options = FormatOptions::default();
    /// options.options.insert("singleQuote".into(), json!(true));
    /// options.options.insert("semi".into(), json!(false));
    /// options.options.insert("printWidth".into(), json!(100));
    /// assert_eq!(options.to_flags(), vec!["--print-width=100", "--no-semi", "--single-quote"]);
    /// ```
    pub fn to_flags(&self) -> Vec<String> {
        let mut flags: Vec<String> = self
            .options
            .iter()
            .filter_map(|(key, value)| {
                let flag = kebab_case(key);
                match value {
                    JsonValue::Bool(true) => Some(format!("--{flag}")),
                    JsonValue::Bool(false) => Some(format!("--no-{flag}")),
                    JsonValue::Null => None,
                    JsonValue::String(s) => Some(format!("--{flag}={s}")),
                    other => Some(format!("--{flag}={other}")),
                }
            })
            .collect();
        flags.extend(self.plugins.iter().map(|plugin| format!("--plugin={plugin}")));
        flags
    }
}

fn kebab_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for ch in key.chars() {
        if ch.is_ascii_uppercase() {
            out.push('-');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Something that can reformat TypeScript source
pub trait CodeFormatter: Send + Sync {
    fn format(&self, source: &str, options: &FormatOptions) -> impl Future<Output = crate::Result<String>> + Send;
}

/// Returns its input unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopFormatter;

impl CodeFormatter for NoopFormatter {
    async fn format(&self, source: &str, _options: &FormatOptions) -> crate::Result<String> {
        Ok(source.to_string())
    }
}

/// Runs prettier (or a compatible program) over stdin
#[derive(Debug, Clone)]
pub struct PrettierFormatter {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl PrettierFormatter {
    pub fn new(program: impl Into<String>, args: Vec<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args,
            timeout,
        }
    }

    pub fn from_config(config: &FormatterConfig) -> Self {
        Self::new(
            config.program.clone(),
            config.args.clone(),
            Duration::from_secs(config.timeout_secs.max(1)),
        )
    }

    async fn run(&self, source: &str, flags: &[String]) -> crate::Result<String> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg("--stdin-filepath")
            .arg("generated.ts")
            .args(flags)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::format(format!("Failed to start {}: {}", self.program, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(source.as_bytes()).await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            return Err(Error::format(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        String::from_utf8(output.stdout)
            .map_err(|e| Error::format(format!("{} produced invalid UTF-8: {}", self.program, e)))
    }
}

impl CodeFormatter for PrettierFormatter {
    async fn format(&self, source: &str, options: &FormatOptions) -> crate::Result<String> {
        let flags = options.to_flags();
        debug!("Running {} with {:?}", self.program, flags);
        match timeout(self.timeout, self.run(source, &flags)).await {
            Ok(result) => result,
            Err(_) => Err(Error::format(format!(
                "{} timed out after {}s",
                self.program,
                self.timeout.as_secs()
            ))),
        }
    }
}

/// Format `source`, degrading to fewer options and then to the input itself
pub async fn format_with_fallback<C: CodeFormatter>(formatter: &C, source: &str, options: &FormatOptions) -> String {
    if source.trim().is_empty() {
        return source.to_string();
    }

    match formatter.format(source, options).await {
        Ok(formatted) => return formatted,
        Err(e) => warn!("Formatting failed: {}", e),
    }

    if !options.plugins.is_empty() {
        match formatter.format(source, &options.without_plugins()).await {
            Ok(formatted) => return formatted,
            Err(e) => warn!("Formatting without plugins failed: {}", e),
        }
    }

    warn!("Keeping unformatted output");
    source.to_string()
}

/// Formatter selected by configuration
#[derive(Debug, Clone)]
pub enum ConfiguredFormatter {
    Prettier(PrettierFormatter),
    Disabled(NoopFormatter),
}

impl ConfiguredFormatter {
    pub fn from_config(config: &FormatterConfig) -> Self {
        if config.enabled {
            Self::Prettier(PrettierFormatter::from_config(config))
        } else {
            Self::Disabled(NoopFormatter)
        }
    }
}

impl CodeFormatter for ConfiguredFormatter {
    async fn format(&self, source: &str, options: &FormatOptions) -> crate::Result<String> {
        match self {
            Self::Prettier(formatter) => formatter.format(source, options).await,
            Self::Disabled(formatter) => formatter.format(source, options).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Fails while plugins are present, or always
    #[derive(Default)]
    struct FlakyFormatter {
        always_fail: bool,
        calls: Mutex<Vec<usize>>,
    }

    impl CodeFormatter for FlakyFormatter {
        async fn format(&self, source: &str, options: &FormatOptions) -> crate::Result<String> {
            self.calls.lock().unwrap().push(options.plugins.len());
            if self.always_fail || !options.plugins.is_empty() {
                return Err(Error::format("plugin not found"));
            }
            Ok(source.to_uppercase())
        }
    }

    fn with_plugin() -> FormatOptions {
        FormatOptions {
            options: BTreeMap::new(),
            plugins: vec!["prettier-plugin-organize-imports".to_string()],
        }
    }

    #[test]
    fn test_flags() {
        let config = Config::default();
        let mut options = FormatOptions::from_config(&config);
        options.plugins.push("x".to_string());
        assert_eq!(
            options.to_flags(),
            vec!["--parser=typescript", "--no-semi", "--single-quote", "--plugin=x"]
        );
        assert!(options.without_plugins().plugins.is_empty());
    }

    #[tokio::test]
    async fn test_fallback_drops_plugins() {
        let formatter = FlakyFormatter::default();
        let out = format_with_fallback(&formatter, "export type a = any", &with_plugin()).await;
        assert_eq!(out, "EXPORT TYPE A = ANY");
        assert_eq!(*formatter.calls.lock().unwrap(), vec![1, 0]);
    }

    #[tokio::test]
    async fn test_fallback_returns_original() {
        let formatter = FlakyFormatter {
            always_fail: true,
            ..Default::default()
        };
        let out = format_with_fallback(&formatter, "export type a = any", &with_plugin()).await;
        assert_eq!(out, "export type a = any");
    }

    #[tokio::test]
    async fn test_missing_program_is_recovered() {
        let formatter = PrettierFormatter::new("autoapi-no-such-formatter", vec![], Duration::from_secs(5));
        let result = formatter.format("const a = 1", &FormatOptions::default()).await;
        assert!(matches!(result, Err(Error::Format(_))));

        let out = format_with_fallback(&formatter, "const a = 1", &FormatOptions::default()).await;
        assert_eq!(out, "const a = 1");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_runs_program_over_stdin() {
        // `sh -c cat` ignores the trailing flags and echoes stdin
        let formatter = PrettierFormatter::new(
            "sh",
            vec!["-c".to_string(), "cat".to_string(), "sh".to_string()],
            Duration::from_secs(10),
        );
        let out = formatter
            .format("export type a = any\n", &FormatOptions::default())
            .await
            .unwrap();
        assert_eq!(out, "export type a = any\n");
    }

    #[tokio::test]
    async fn test_disabled_formatter_is_identity() {
        let mut config = FormatterConfig::default();
        config.enabled = false;
        let formatter = ConfiguredFormatter::from_config(&config);
        let out = format_with_fallback(&formatter, "a  =  1", &FormatOptions::default()).await;
        assert_eq!(out, "a  =  1");
    }
}
