//! Generation orchestration.
//!
//! The orchestrator walks the requested target groups one operation at a time,
//! emits declarations, formats them and hands the result to the merge engine.
//! A failing operation is recorded in the [`GenerationReport`] and the run moves
//! on; the batch always runs to completion.
//!
//! # Examples
//!
//! ```no_run
//! use autoapi_core::format::NoopFormatter;
//! use autoapi_core::generate::GenerationOrchestrator;
//! use autoapi_core::merge::TokioFileSystem;
//! use autoapi_core::snapshot::ProjectSnapshot;
//! use autoapi_core::Config;
//!
//! # #[tokio::main]
//! # async fn main() -> autoapi_core::Result<()> {
//! let config = Config::new(".", "/src/api");
//! let snapshot = ProjectSnapshot::from_file("apifox-snapshot.json").await?;
//! let orchestrator = GenerationOrchestrator::new(&config, &snapshot, TokioFileSystem, NoopFormatter);
//! let targets = orchestrator.targets(&[]);
//! let report = orchestrator
//!     .run(&targets, |p| println!("{}% {}", p.percent(), p.message))
//!     .await;
//! println!("{} files written", report.written_files.len());
//! # Ok(())
//! # }
//! ```

// Internal imports (std, crate)
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::emit::header::{referenced_interfaces, HeaderContext};
use crate::emit::{DeclarationEmitter, GeneratedDeclarationSet};
use crate::format::{format_with_fallback, CodeFormatter, ConfiguredFormatter, FormatOptions};
use crate::merge::{FileMergeEngine, FileSystem, FileUpdate, TokioFileSystem, WriteMode};
use crate::scaffold::MiniprogramScaffold;
use crate::schema::SchemaRegistry;
use crate::snapshot::ProjectSnapshot;
use crate::tree::{collect_targets, TargetGroup, UpdateScope};

// External imports (alphabetized)
use log::{debug, error, info, warn};
use serde::Serialize;

/// Progress notification sent after every operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    pub message: String,
}

impl Progress {
    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        ((self.completed * 100) / self.total).min(100) as u8
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OperationFailure {
    /// `METHOD path`, or the operation id when it is unknown
    pub operation: String,
    pub message: String,
}

/// Outcome of a generation run
#[derive(Debug, Clone, Default, Serialize)]
pub struct GenerationReport {
    pub written_files: Vec<PathBuf>,
    pub failures: Vec<OperationFailure>,
    /// Number of operations requested
    pub targets: usize,
}

impl GenerationReport {
    pub fn succeeded(&self) -> usize {
        self.targets.saturating_sub(self.failures.len())
    }

    pub fn is_complete_failure(&self) -> bool {
        self.written_files.is_empty() && !self.failures.is_empty()
    }

    fn record_written(&mut self, path: PathBuf) {
        if !self.written_files.contains(&path) {
            self.written_files.push(path);
        }
    }

    fn record_failure(&mut self, operation: impl Into<String>, message: impl Into<String>) {
        let failure = OperationFailure {
            operation: operation.into(),
            message: message.into(),
        };
        error!("{}: {}", failure.operation, failure.message);
        self.failures.push(failure);
    }
}

/// Declarations collected for one target group, ready to be written
#[derive(Debug, Clone)]
pub struct GenerationTarget {
    pub function_file: PathBuf,
    pub interface_file: PathBuf,
    pub mode: WriteMode,
    pub declarations: Vec<GeneratedDeclarationSet>,
}

impl GenerationTarget {
    fn function_text(&self) -> String {
        self.declarations
            .iter()
            .map(|set| set.function_text.as_str())
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn interface_text(&self) -> String {
        self.declarations
            .iter()
            .map(GeneratedDeclarationSet::interface_text)
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn uses_querystring(&self) -> bool {
        self.declarations.iter().any(|set| set.uses_querystring)
    }
}

/// Drives generation for one project snapshot
pub struct GenerationOrchestrator<'a, F, C> {
    config: &'a Config,
    snapshot: &'a ProjectSnapshot,
    registry: SchemaRegistry,
    engine: FileMergeEngine<F>,
    formatter: C,
    format_options: FormatOptions,
}

impl<'a, F: FileSystem, C: CodeFormatter> GenerationOrchestrator<'a, F, C> {
    pub fn new(config: &'a Config, snapshot: &'a ProjectSnapshot, fs: F, formatter: C) -> Self {
        Self {
            config,
            snapshot,
            registry: snapshot.registry(),
            engine: FileMergeEngine::new(fs),
            formatter,
            format_options: FormatOptions::from_config(config),
        }
    }

    pub fn file_system(&self) -> &F {
        self.engine.file_system()
    }

    pub fn into_file_system(self) -> F {
        self.engine.into_file_system()
    }

    /// Target groups for the given tree keys; every folder when `keys` is empty.
    ///
    /// A snapshot without a tree puts every operation into one group at the root.
    pub fn targets(&self, keys: &[String]) -> Vec<TargetGroup> {
        let root = self.config.app_name.as_str();
        if keys.is_empty() {
            if self.snapshot.api_tree.is_empty() {
                return vec![TargetGroup {
                    path: root.to_string(),
                    operations: self
                        .snapshot
                        .api_details
                        .iter()
                        .map(|op| crate::tree::ApiTreeLeaf {
                            id: op.id,
                            name: op.name.clone(),
                            method: op.method.clone(),
                            path: op.path.clone(),
                        })
                        .collect(),
                    scope: UpdateScope::FullReplace,
                }];
            }
            return TargetGroup::all(&self.snapshot.api_tree, root);
        }

        keys.iter()
            .flat_map(|key| {
                let groups = collect_targets(&self.snapshot.api_tree, key, root);
                if groups.is_empty() {
                    warn!("Tree key {} selects no operations", key);
                }
                groups
            })
            .collect()
    }

    fn function_file(&self, group: &TargetGroup) -> PathBuf {
        self.config
            .output_root()
            .join(&group.path)
            .join(format!("{}.ts", self.config.app_name))
    }

    fn interface_file(&self, group: &TargetGroup) -> PathBuf {
        self.config.output_root().join(&group.path).join("interface.ts")
    }

    fn emitter(&self) -> DeclarationEmitter<'_> {
        DeclarationEmitter::new(&self.registry, self.config.model.strategy(self.config))
            .with_return_keys(&self.config.return_key)
            .with_type_extension(self.config.type_extension)
    }

    /// Generate every operation of `groups`, strictly one after another
    pub async fn run<P>(&self, groups: &[TargetGroup], mut progress: P) -> GenerationReport
    where
        P: FnMut(Progress),
    {
        let total = groups.iter().map(|g| g.operations.len()).sum();
        let mut report = GenerationReport {
            targets: total,
            ..Default::default()
        };
        let emitter = self.emitter();
        info!(
            "Generating {} operations in {} groups with the {} model",
            total,
            groups.len(),
            self.config.model
        );

        if emitter.strategy().needs_scaffold() && !groups.is_empty() {
            self.scaffold(&mut report).await;
        }

        let mut completed = 0;
        for group in groups {
            let mut target = GenerationTarget {
                function_file: self.function_file(group),
                interface_file: self.interface_file(group),
                mode: match group.scope {
                    UpdateScope::FullReplace => WriteMode::Replace,
                    UpdateScope::Incremental => WriteMode::Merge,
                },
                declarations: Vec::new(),
            };
            debug!("Group {} ({})", group.path, group.scope);

            for leaf in &group.operations {
                let label = match self.snapshot.operation(leaf.id) {
                    Some(op) => match emitter.emit(op) {
                        Ok(set) => {
                            let label = set.operation.clone();
                            target.declarations.push(set);
                            label
                        }
                        Err(e) => {
                            report.record_failure(op.label(), e.to_string());
                            op.label()
                        }
                    },
                    None => {
                        let label = format!("operation {}", leaf.id);
                        report.record_failure(&label, "not found in the project snapshot");
                        label
                    }
                };
                completed += 1;
                progress(Progress {
                    completed,
                    total,
                    message: label,
                });
            }

            if target.declarations.is_empty() {
                debug!("Nothing to write for {}", group.path);
                continue;
            }
            self.write_target(&target, emitter.strategy(), &mut report).await;
        }

        info!(
            "Generated {} of {} operations, {} files written",
            report.succeeded(),
            report.targets,
            report.written_files.len()
        );
        report
    }

    async fn scaffold(&self, report: &mut GenerationReport) {
        let result = async {
            let scaffold = MiniprogramScaffold::new()?;
            scaffold
                .ensure(
                    self.engine.file_system(),
                    &self.config.output_root(),
                    &self.config.miniprogram,
                )
                .await
        }
        .await;

        match result {
            Ok(created) => created.into_iter().for_each(|path| report.record_written(path)),
            Err(e) => report.record_failure("miniprogram scaffold", e.to_string()),
        }
    }

    async fn write_target(
        &self,
        target: &GenerationTarget,
        strategy: &dyn crate::emit::EmissionStrategy,
        report: &mut GenerationReport,
    ) {
        let interface_text = self.format(&target.interface_text()).await;
        let interface_update = FileUpdate {
            full_text: format!("{}\n", interface_text.trim_end()),
            declarations: interface_text,
            ..Default::default()
        };
        self.write_file(&target.interface_file, &interface_update, target, report)
            .await;

        let function_text = target.function_text();
        if function_text.is_empty() {
            debug!("The {} model emits no functions", strategy.model());
            return;
        }

        let candidates: Vec<&str> = target
            .declarations
            .iter()
            .flat_map(|set| set.names.interfaces())
            .collect();
        let interface_names = referenced_interfaces(candidates, &function_text);
        let uses_querystring = target.uses_querystring();
        let header = strategy.header(&HeaderContext {
            interface_names: &interface_names,
            uses_querystring,
            function_file: &target.function_file,
            output_root: &self.config.output_root(),
        });

        let body = self.format(&function_text).await;
        let function_update = FileUpdate {
            full_text: format!("{header}\n\n{}\n", body.trim_end()),
            declarations: body,
            interface_imports: interface_names,
            uses_querystring,
            function_file: true,
        };
        self.write_file(&target.function_file, &function_update, target, report)
            .await;
    }

    async fn write_file(
        &self,
        path: &Path,
        update: &FileUpdate,
        target: &GenerationTarget,
        report: &mut GenerationReport,
    ) {
        match self.engine.write(path, update, target.mode).await {
            Ok(outcome) => {
                debug!("{}: {:?}", path.display(), outcome);
                report.record_written(path.to_path_buf());
            }
            Err(e) => {
                for set in &target.declarations {
                    report.record_failure(&set.operation, e.to_string());
                }
            }
        }
    }

    async fn format(&self, source: &str) -> String {
        format_with_fallback(&self.formatter, source, &self.format_options).await
    }
}

/// Generate the groups selected by `keys` (every folder when empty) into the
/// real file system, formatting with the configured formatter
pub async fn generate(config: &Config, snapshot: &ProjectSnapshot, keys: &[String]) -> crate::Result<GenerationReport> {
    if config.app_name.trim().is_empty() {
        return Err(crate::Error::config("app_name must not be empty"));
    }

    let formatter = ConfiguredFormatter::from_config(&config.formatter);
    let orchestrator = GenerationOrchestrator::new(config, snapshot, TokioFileSystem, formatter);
    let targets = orchestrator.targets(keys);
    if targets.is_empty() {
        warn!("No operations selected");
    }

    let report = orchestrator
        .run(&targets, |p| {
            info!("[{:>3}%] {}/{} {}", p.percent(), p.completed, p.total, p.message)
        })
        .await;
    Ok(report)
}
