//! Forwarding handles
//!
//! A [`ModuleHandle`] is the one object callers hold for a module path. Its
//! identity never changes across reloads: `invoke` and `construct` always
//! go through the record currently in the path's slot, while the projected
//! surface (members and shared behaviour) is refreshed by the projector on
//! every commit.

use hotmod_kernel::{
    HotImportError, HotImportResult, Instance, Module, ModuleKind, SharedBehavior,
};
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::registry::RecordSlot;

/// Members and shared behaviour copied onto the handle
#[derive(Default)]
pub(crate) struct Surface {
    pub(crate) members: Map<String, Value>,
    pub(crate) shared: Option<Arc<dyn SharedBehavior>>,
    pub(crate) version: u64,
}

/// Stable stand-in for a hot module
pub struct ModuleHandle {
    path: PathBuf,
    slot: Arc<RecordSlot>,
    pub(crate) surface: RwLock<Surface>,
}

impl ModuleHandle {
    pub(crate) fn new(path: PathBuf, slot: Arc<RecordSlot>) -> Self {
        Self {
            path,
            slot,
            surface: RwLock::new(Surface::default()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The record the handle currently forwards to
    pub fn current(&self) -> Arc<dyn Module> {
        self.slot.read().clone()
    }

    pub fn kind(&self) -> ModuleKind {
        self.current().kind()
    }

    /// Version of the current record
    pub fn version(&self) -> u64 {
        self.current().version()
    }

    /// JSON view of the current record's export
    pub fn value(&self) -> Value {
        self.current().value()
    }

    /// Call the current record as a function.
    pub fn invoke(&self, args: Vec<Value>) -> HotImportResult<Value> {
        // the slot lock is released before script code runs
        let record = self.current();
        let invocable = record
            .as_invocable()
            .ok_or_else(|| HotImportError::NotCallable(self.path.clone()))?;
        invocable.invoke(args)
    }

    /// Build an instance with the current record's constructor.
    pub fn construct(&self, args: Vec<Value>) -> HotImportResult<Instance> {
        let record = self.current();
        let constructible = record
            .as_constructible()
            .ok_or_else(|| HotImportError::NotConstructible(self.path.clone()))?;
        constructible.construct(args)
    }

    /// Projected member; may be a leftover from an earlier version.
    pub fn member(&self, name: &str) -> Option<Value> {
        self.surface.read().members.get(name).cloned()
    }

    pub fn members(&self) -> Map<String, Value> {
        self.surface.read().members.clone()
    }

    /// Projected shared behaviour
    pub fn shared(&self) -> Option<Arc<dyn SharedBehavior>> {
        self.surface.read().shared.clone()
    }

    /// Version of the record last projected onto the surface
    pub fn projected_version(&self) -> u64 {
        self.surface.read().version
    }
}

impl fmt::Debug for ModuleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let record = self.current();
        f.debug_struct("ModuleHandle")
            .field("path", &self.path)
            .field("kind", &record.kind())
            .field("version", &record.version())
            .field("members", &self.surface.read().members.len())
            .finish()
    }
}
