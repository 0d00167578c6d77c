//! autoapi CLI entrypoint
//! Parses command-line arguments and dispatches to the core generator.

// Internal imports (std, crate)
use std::path::{Path, PathBuf};

// External imports (alphabetized)
use anyhow::Context;
use autoapi_core::{ApiModel, Config, GenerationReport, ProjectSnapshot};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Config file picked up from the working directory when `--config` is absent
const DEFAULT_CONFIG: &str = "autoapi.yaml";

#[derive(Parser)]
#[command(name = "autoapi")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Write a configuration file with default values
    Init {
        /// Where to write the config (.yaml, .json or .toml)
        #[arg(long, default_value = DEFAULT_CONFIG)]
        config: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Generate TypeScript clients from an Apifox project snapshot
    Generate {
        /// Path or URL of the project snapshot (JSON or YAML)
        ///
        /// Example: --snapshot apifox-snapshot.json
        /// Example: --snapshot https://example.com/apifox-snapshot.json
        #[arg(long)]
        snapshot: String,
        /// Config file; defaults to ./autoapi.yaml when present
        #[arg(long)]
        config: Option<PathBuf>,
        /// Tree key of a folder or operation to generate; repeatable.
        /// Every folder is generated when omitted.
        #[arg(long = "key")]
        keys: Vec<String>,
        /// Workspace root, overriding the config
        #[arg(long)]
        workspace: Option<PathBuf>,
        /// API model (axios, miniprogram, custom, vueUse, VueHookPlus)
        #[arg(long)]
        model: Option<String>,
        /// Skip the external formatter
        #[arg(long)]
        no_format: bool,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging; `log` records from the core are forwarded as well
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match &cli.command {
        Commands::Init { config, force } => init(config, *force).await,
        Commands::Generate {
            snapshot,
            config,
            keys,
            workspace,
            model,
            no_format,
            json,
        } => {
            let mut settings = load_config(config.as_deref()).await?;
            if let Some(workspace) = workspace {
                settings.workspace_root = workspace.to_string_lossy().to_string();
            }
            if let Some(model) = model {
                settings.model = model
                    .parse::<ApiModel>()
                    .map_err(|e| anyhow::anyhow!("Invalid model '{model}': {e}"))?;
            }
            if *no_format {
                settings.formatter.enabled = false;
            }

            info!("Loading project snapshot from {}", snapshot);
            let project = ProjectSnapshot::from_file_or_url(snapshot)
                .await
                .with_context(|| format!("Failed to load project snapshot from {snapshot}"))?;

            let report = autoapi_core::generate(&settings, &project, keys)
                .await
                .context("Generation failed")?;

            if *json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }

            if report.is_complete_failure() {
                anyhow::bail!("No files were written, {} operations failed", report.failures.len());
            }
            Ok(())
        }
    }
}

async fn init(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists, pass --force to overwrite it", path.display());
    }
    Config::default()
        .save(path)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}

async fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => Config::from_file(path)
            .await
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None if Path::new(DEFAULT_CONFIG).exists() => {
            info!("Using {}", DEFAULT_CONFIG);
            Config::from_file(DEFAULT_CONFIG)
                .await
                .with_context(|| format!("Failed to load config from {DEFAULT_CONFIG}"))
        }
        None => {
            warn!("No config file found, using defaults");
            Ok(Config::default())
        }
    }
}

fn print_report(report: &GenerationReport) {
    for path in &report.written_files {
        println!("Wrote {}", path.display());
    }
    for failure in &report.failures {
        println!("Failed {}: {}", failure.operation, failure.message);
    }
    println!(
        "{} of {} operations generated",
        report.succeeded(),
        report.targets
    );
}
