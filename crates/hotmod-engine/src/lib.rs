//! hotmod Engine
//!
//! Hot module replacement for long-running processes:
//! - [`HotImporter::hot_import`] returns a stable [`ModuleHandle`] per path
//! - file changes reload the module behind the handle
//! - failed reloads roll back to the last working version
//!
//! # Example
//!
//! ```rust,ignore
//! use hotmod_engine::HotImporter;
//! use hotmod_kernel::HotImportConfig;
//! use hotmod_rhai::RhaiModuleLoader;
//! use std::sync::Arc;
//!
//! let importer = HotImporter::new(
//!     HotImportConfig::default().with_base_dir("/srv/modules"),
//!     Arc::new(RhaiModuleLoader::default()),
//! );
//! let answer = importer.hot_import("answer.rhai").await?;
//! println!("{}", answer.invoke(vec![])?);
//! ```

pub mod coordinator;
pub mod handle;
pub mod importer;
pub mod projector;
pub mod registry;
pub mod resolver;
pub mod watcher;

pub use coordinator::ReloadCoordinator;
pub use handle::ModuleHandle;
pub use importer::HotImporter;
pub use projector::project;
pub use registry::ModuleRegistry;
pub use resolver::PathResolver;
pub use watcher::{ChangeVerdict, NotifyFsWatch, WatchHandle, classify_change};

pub use hotmod_kernel::{
    CacheSnapshot, HotImportConfig, HotImportError, HotImportResult, Instance, ModuleKind,
    ReloadEvent, ReloadOutcome, ReloadPhase,
};
