//! hotmod Kernel
//!
//! Shared vocabulary of the hot-reload engine:
//! - module capability traits (`Module`, `Invocable`, `Constructible`, `SharedBehavior`)
//! - collaborator contracts (`ModuleLoader`, `FsWatch`)
//! - error taxonomy, reload events and configuration

pub mod config;
pub mod error;
pub mod event;
pub mod loader;
pub mod module;
pub mod watch;

pub use config::{HotImportConfig, ScriptLimits};
pub use error::{HotImportError, HotImportResult};
pub use event::{ReloadEvent, ReloadOutcome, ReloadPhase};
pub use loader::{CacheSnapshot, ModuleLoader};
pub use module::{Constructible, Instance, Invocable, Module, ModuleKind, SharedBehavior};
pub use watch::{FsWatch, RawEvent, RawEventKind, RawEventSink, WatchGuard};
