//! Configuration management for AutoApi code generation.
//!
//! This module defines the `Config` struct holding every persisted generation
//! setting: where output goes, which API model emits the functions, the custom
//! strategy snippets and the formatter options. Every field has a default, so a
//! partial file (or none at all) is a valid configuration.
//!
//! # Examples
//!
//! ```no_run
//! use autoapi_core::config::Config;
//! use autoapi_core::emit::ApiModel;
//!
//! # #[tokio::main]
//! # async fn main() -> autoapi_core::Result<()> {
//! // Create a config programmatically
//! let mut config = Config::new(".", "/src/api");
//! config.model = ApiModel::Miniprogram;
//!
//! // Or load it from a YAML, JSON or TOML file
//! let config = Config::from_file("autoapi.yaml").await?;
//! # Ok(())
//! # }
//! ```

// Internal imports (std, crate)
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::emit::ApiModel;
use crate::Error;

// External imports (alphabetized)
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio::fs;

/// Configuration for AutoApi client generation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the frontend workspace the client is generated into
    pub workspace_root: String,

    /// Output sub-directory below the workspace root, e.g. `/src/api`
    pub path: String,

    /// Function file stem and name of the tree root folder
    pub app_name: String,

    /// API model that emits the client functions
    pub model: ApiModel,

    /// Import statement binding the axios instance
    pub axios_import: String,

    /// Comma separated response unwrap keys, e.g. `data`
    pub return_key: String,

    /// Custom import block for the `custom` model
    pub head: Option<String>,

    /// Template for each function of the `custom` model
    pub custom_return: Option<String>,

    /// Template for the optional `use*` function of the `custom` model
    pub custom_extra_function: Option<String>,

    /// Add `[key: string]: any` to every generated interface
    pub type_extension: bool,

    /// Prettier options, merged over [`default_prettier_options`]
    pub prettier: BTreeMap<String, JsonValue>,

    pub formatter: FormatterConfig,

    pub miniprogram: MiniprogramConfig,
}

/// External code formatter settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatterConfig {
    pub enabled: bool,

    /// Program to run, e.g. `npx`
    pub program: String,

    /// Arguments placed before the generated option flags
    pub args: Vec<String>,

    /// Prettier plugins, dropped on the reduced retry
    pub plugins: Vec<String>,

    pub timeout_secs: u64,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            program: "npx".to_string(),
            args: vec!["prettier".to_string()],
            plugins: Vec::new(),
            timeout_secs: 20,
        }
    }
}

/// Server URLs written into the scaffolded mini program env config
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MiniprogramConfig {
    pub develop_url: String,
    pub trial_url: String,
    pub release_url: String,
}

impl Default for MiniprogramConfig {
    fn default() -> Self {
        Self {
            develop_url: "http://localhost:3000".to_string(),
            trial_url: String::new(),
            release_url: String::new(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace_root: ".".to_string(),
            path: "/src/api".to_string(),
            app_name: "apifox".to_string(),
            model: ApiModel::Axios,
            axios_import: "import axios from \"axios\"".to_string(),
            return_key: String::new(),
            head: None,
            custom_return: None,
            custom_extra_function: None,
            type_extension: false,
            prettier: BTreeMap::new(),
            formatter: FormatterConfig::default(),
            miniprogram: MiniprogramConfig::default(),
        }
    }
}

/// File format of a configuration file, chosen by extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

impl ConfigFormat {
    fn from_path(path: &Path) -> crate::Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);
        match ext.as_deref() {
            Some("yaml") | Some("yml") | None => Ok(Self::Yaml),
            Some("json") => Ok(Self::Json),
            Some("toml") => Ok(Self::Toml),
            Some(other) => Err(Error::config(format!(
                "Unsupported config file extension '{other}' for {}",
                path.display()
            ))),
        }
    }
}

impl Config {
    /// Create a new Config with default values
    pub fn new(workspace_root: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    /// Load configuration from a YAML, JSON or TOML file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let format = ConfigFormat::from_path(path)?;
        let content = fs::read_to_string(path).await?;
        let config = match format {
            ConfigFormat::Yaml => serde_yaml::from_str(&content)?,
            ConfigFormat::Json => serde_json::from_str(&content)?,
            ConfigFormat::Toml => toml::from_str(&content)?,
        };
        Ok(config)
    }

    /// Save configuration to a file, in the format its extension names
    pub async fn save<P: AsRef<Path>>(&self, path: P) -> crate::Result<()> {
        let path = path.as_ref();
        let content = match ConfigFormat::from_path(path)? {
            ConfigFormat::Yaml => serde_yaml::to_string(self)?,
            ConfigFormat::Json => serde_json::to_string_pretty(self)?,
            ConfigFormat::Toml => toml::to_string_pretty(self)?,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, content).await?;
        Ok(())
    }

    /// `{workspace_root}{path}`, the directory every generated file lives under
    pub fn output_root(&self) -> PathBuf {
        let relative = self.path.trim_start_matches(['/', '\\']);
        if relative.is_empty() {
            PathBuf::from(&self.workspace_root)
        } else {
            Path::new(&self.workspace_root).join(relative)
        }
    }

    /// Prettier options with the configured overrides applied
    pub fn prettier_options(&self) -> BTreeMap<String, JsonValue> {
        let mut options = default_prettier_options();
        options.extend(self.prettier.clone());
        options
    }
}

/// Options every formatter run starts from
pub fn default_prettier_options() -> BTreeMap<String, JsonValue> {
    BTreeMap::from([
        ("semi".to_string(), JsonValue::Bool(false)),
        ("singleQuote".to_string(), JsonValue::Bool(true)),
        ("parser".to_string(), JsonValue::String("typescript".to_string())),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_config_roundtrip_all_formats() -> crate::Result<()> {
        let dir = tempdir()?;

        let mut config = Config::new("/work/app", "/src/services");
        config.model = ApiModel::Custom;
        config.return_key = "data".to_string();
        config.custom_return = Some("export const {{ apiFunctionName }} = 1".to_string());
        config.prettier.insert("printWidth".to_string(), JsonValue::from(120));

        for file in ["autoapi.yaml", "autoapi.json", "autoapi.toml"] {
            let file_path = dir.path().join(file);
            config.save(&file_path).await?;
            let loaded = Config::from_file(&file_path).await?;

            assert_eq!(loaded.workspace_root, "/work/app");
            assert_eq!(loaded.path, "/src/services");
            assert_eq!(loaded.app_name, "apifox");
            assert_eq!(loaded.model, ApiModel::Custom);
            assert_eq!(loaded.return_key, "data");
            assert_eq!(loaded.custom_return, config.custom_return);
            assert_eq!(loaded.prettier.get("printWidth"), Some(&JsonValue::from(120)));
            assert_eq!(loaded.formatter, FormatterConfig::default());
        }

        Ok(())
    }

    #[tokio::test]
    async fn test_partial_file_uses_defaults() -> crate::Result<()> {
        let dir = tempdir()?;
        let file_path = dir.path().join("autoapi.yml");
        fs::write(&file_path, "model: wx\ntype_extension: true\n").await?;

        let config = Config::from_file(&file_path).await?;
        assert_eq!(config.model, ApiModel::Miniprogram);
        assert!(config.type_extension);
        assert_eq!(config.path, "/src/api");
        assert_eq!(config.axios_import, "import axios from \"axios\"");
        assert!(config.formatter.enabled);
        Ok(())
    }

    #[tokio::test]
    async fn test_unsupported_extension() {
        let result = Config::default().save("/tmp/autoapi.ini").await;
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_output_root() {
        let config = Config::new("/work/app", "/src/api");
        assert_eq!(config.output_root(), PathBuf::from("/work/app/src/api"));
        assert_eq!(Config::new("/work/app", "").output_root(), PathBuf::from("/work/app"));
    }

    #[test]
    fn test_prettier_overrides() {
        let mut config = Config::default();
        config.prettier.insert("semi".to_string(), JsonValue::Bool(true));
        let options = config.prettier_options();
        assert_eq!(options.get("semi"), Some(&JsonValue::Bool(true)));
        assert_eq!(options.get("singleQuote"), Some(&JsonValue::Bool(true)));
        assert_eq!(options.get("parser"), Some(&JsonValue::from("typescript")));
    }
}
