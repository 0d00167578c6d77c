//! Runtime helper files for the mini program model.
//!
//! Functions generated with the `miniprogram` model call an `http` helper that
//! lives next to the generated tree. The helper, its environment config and its
//! ambient typings are rendered from bundled templates once; files that already
//! exist belong to the user and are left alone.

// Internal imports (std, crate)
use std::path::{Path, PathBuf};

use crate::config::MiniprogramConfig;
use crate::merge::FileSystem;
use crate::Error;

// External imports (alphabetized)
use log::{debug, info};
use tera::{Context, Tera};

/// Bundled scaffold templates: output path relative to the output root,
/// template name and template source
const SCAFFOLD_FILES: [(&str, &str, &str); 3] = [
    (
        "request/index.ts",
        "index.ts.tera",
        include_str!("../templates/miniprogram/index.ts.tera"),
    ),
    (
        "request/env.config.ts",
        "env.config.ts.tera",
        include_str!("../templates/miniprogram/env.config.ts.tera"),
    ),
    (
        "request/typings.d.ts",
        "typings.d.ts.tera",
        include_str!("../templates/miniprogram/typings.d.ts.tera"),
    ),
];

pub struct MiniprogramScaffold {
    tera: Tera,
}

impl MiniprogramScaffold {
    pub fn new() -> crate::Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(SCAFFOLD_FILES.iter().map(|(_, name, source)| (*name, *source)))?;
        Ok(Self { tera })
    }

    /// Relative paths of every scaffolded file
    pub fn files() -> impl Iterator<Item = &'static str> {
        SCAFFOLD_FILES.iter().map(|(path, _, _)| *path)
    }

    pub fn render(&self, config: &MiniprogramConfig) -> crate::Result<Vec<(&'static str, String)>> {
        let context = Context::from_serialize(config)?;
        SCAFFOLD_FILES
            .iter()
            .map(|(path, name, _)| {
                let rendered = self.tera.render(name, &context).map_err(|e| {
                    Error::config(format!("Failed to render scaffold template '{}': {}", name, e))
                })?;
                Ok((*path, rendered))
            })
            .collect()
    }

    /// Write missing scaffold files under `output_root`, returning the created paths
    pub async fn ensure<F: FileSystem>(
        &self,
        fs: &F,
        output_root: &Path,
        config: &MiniprogramConfig,
    ) -> crate::Result<Vec<PathBuf>> {
        let mut created = Vec::new();
        for (relative, content) in self.render(config)? {
            let path = output_root.join(relative);
            if fs.exists(&path).await {
                debug!("Keeping existing {}", path.display());
                continue;
            }
            fs.write(&path, &content)
                .await
                .map_err(|e| Error::file_update(&path, e))?;
            info!("Scaffolded {}", path.display());
            created.push(path);
        }
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::TokioFileSystem;
    use tempfile::tempdir;

    fn config() -> MiniprogramConfig {
        MiniprogramConfig {
            develop_url: "https://dev.example.com".to_string(),
            trial_url: "https://test.example.com".to_string(),
            release_url: "https://api.example.com".to_string(),
        }
    }

    #[test]
    fn test_render_fills_env_urls() {
        let scaffold = MiniprogramScaffold::new().unwrap();
        let files = scaffold.render(&config()).unwrap();
        assert_eq!(files.len(), 3);

        let (_, env) = files.iter().find(|(path, _)| *path == "request/env.config.ts").unwrap();
        assert!(env.contains("SERVER_URL: 'https://dev.example.com'"));
        assert!(env.contains("SERVER_URL: 'https://api.example.com'"));

        let (_, helper) = files.iter().find(|(path, _)| *path == "request/index.ts").unwrap();
        assert!(helper.contains("export const http = new HttpRequest()"));
        assert!(helper.contains("`${env.SERVER_URL}${url}`"));
    }

    #[tokio::test]
    async fn test_ensure_never_overwrites() -> crate::Result<()> {
        let dir = tempdir()?;
        let root = dir.path().join("src/api");
        let scaffold = MiniprogramScaffold::new()?;

        let created = scaffold.ensure(&TokioFileSystem, &root, &config()).await?;
        assert_eq!(created.len(), 3);
        for file in MiniprogramScaffold::files() {
            assert!(root.join(file).exists());
        }

        let helper = root.join("request/index.ts");
        tokio::fs::write(&helper, "// customised").await?;
        let created = scaffold.ensure(&TokioFileSystem, &root, &config()).await?;
        assert!(created.is_empty());
        assert_eq!(tokio::fs::read_to_string(&helper).await?, "// customised");
        Ok(())
    }
}
