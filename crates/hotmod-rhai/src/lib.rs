//! hotmod Rhai
//!
//! Rhai scripts as hot-reloadable modules: a [`RhaiModuleLoader`] implementing
//! the kernel's `ModuleLoader` contract, and the [`RhaiModule`] records it
//! produces.

pub mod engine;
pub mod error;
pub mod loader;
pub mod module;

pub use engine::{ScriptEngine, dynamic_to_json, json_to_dynamic};
pub use error::{ScriptError, ScriptResult};
pub use loader::RhaiModuleLoader;
pub use module::{CONSTRUCTOR_KEY, PROTOTYPE_KEY, RhaiModule, RhaiPrototype};
