//! Core types for the fn CLI.
//!
//! Function and application manifests ([`FuncFile`], [`AppFile`]), image
//! references, version bumping, schema migration, the manifest walker, test
//! case loading, and the on-disk context store ([`ContextStore`]).

pub mod appfile;
pub mod bump;
pub mod cases;
pub mod config;
pub mod context;
pub mod env;
pub mod error;
pub mod funcfile;
pub mod image;
pub mod migrate;
pub mod paths;
pub mod schema;
pub mod walker;

pub use appfile::{load_app_file, AppFile};
pub use bump::{bump_manifest, restore_version, BumpOutcome, VersionType};
pub use config::{ContainerEngine, ContextFile, RootConfig};
pub use context::{ActiveContext, ContextInfo, ContextStore};
pub use env::{EnvSource, ProcessEnv};
pub use error::{Error, Result};
pub use funcfile::{
    find_func_file, load_func_file, load_manifest, store_func_file, FnTest, FuncFile, FuncFileV1,
    Manifest, Trigger,
};
pub use walker::{walk_func_files, WalkOptions};
