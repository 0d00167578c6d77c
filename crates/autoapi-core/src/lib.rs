//! AutoApi Core Library
//!
//! This library provides the core functionality for generating typed
//! TypeScript API clients from Apifox project metadata.

pub mod config;
pub mod emit;
pub mod error;
pub mod format;
pub mod generate;
pub mod merge;
pub mod naming;
pub mod scaffold;
pub mod schema;
pub mod snapshot;
pub mod tree;

pub use crate::{
    config::Config,
    emit::{ApiModel, DeclarationEmitter, EmissionStrategy, GeneratedDeclarationSet},
    error::{Error, Result},
    generate::{generate, GenerationOrchestrator, GenerationReport, Progress},
    merge::{FileMergeEngine, FileSystem, TokioFileSystem, WriteMode},
    schema::{SchemaGraphResolver, SchemaNode, SchemaRegistry},
    snapshot::ProjectSnapshot,
};
