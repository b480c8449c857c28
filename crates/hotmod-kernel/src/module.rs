//! Module capability traits
//!
//! A loaded module exposes one value: a function, a class or plain data.
//! Callers never see the concrete type; they go through the capabilities
//! below, which the handle forwards to whatever record is current.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::error::{HotImportError, HotImportResult};

/// What a module exports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModuleKind {
    /// Callable with `invoke`
    Function,
    /// Constructible with `construct`
    Class,
    /// Neither callable nor constructible
    Data,
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleKind::Function => write!(f, "function"),
            ModuleKind::Class => write!(f, "class"),
            ModuleKind::Data => write!(f, "data"),
        }
    }
}

/// Plain invocation capability.
pub trait Invocable: Send + Sync {
    fn invoke(&self, args: Vec<Value>) -> HotImportResult<Value>;
}

/// Construction capability.
///
/// Implementations must hand the instance the shared behaviour of *their own*
/// version, so instances built before a reload keep their original methods.
pub trait Constructible: Send + Sync {
    fn construct(&self, args: Vec<Value>) -> HotImportResult<Instance>;
}

/// Behaviour shared by every instance built from one version of a class.
pub trait SharedBehavior: Send + Sync {
    /// Names of the shared methods.
    fn method_names(&self) -> Vec<String>;

    /// Call a shared method with `this` bound to the instance fields.
    fn call_method(
        &self,
        this: &mut Map<String, Value>,
        name: &str,
        args: Vec<Value>,
    ) -> HotImportResult<Value>;
}

/// A loaded module record.
pub trait Module: Send + Sync {
    /// Absolute path the record was loaded from
    fn path(&self) -> &Path;

    fn kind(&self) -> ModuleKind;

    /// Load generation, unique per loader
    fn version(&self) -> u64;

    /// Hex SHA-256 of the source the record was built from
    fn source_hash(&self) -> &str;

    /// JSON view of the exported value
    fn value(&self) -> Value;

    /// Enumerable members of the export.
    fn members(&self) -> Map<String, Value>;

    fn member(&self, name: &str) -> Option<Value> {
        self.members().get(name).cloned()
    }

    /// Add or overwrite an enumerable member on this record.
    fn set_member(&self, name: &str, value: Value);

    /// Object holding methods shared by instances (class records only).
    fn shared_behavior(&self) -> Option<Arc<dyn SharedBehavior>> {
        None
    }

    fn as_invocable(&self) -> Option<&dyn Invocable> {
        None
    }

    fn as_constructible(&self) -> Option<&dyn Constructible> {
        None
    }
}

/// An object built by a class module.
pub struct Instance {
    id: String,
    fields: Map<String, Value>,
    shared: Option<Arc<dyn SharedBehavior>>,
    version: u64,
}

impl Instance {
    pub fn new(
        fields: Map<String, Value>,
        shared: Option<Arc<dyn SharedBehavior>>,
        version: u64,
    ) -> Self {
        Self {
            id: uuid::Uuid::now_v7().to_string(),
            fields,
            shared,
            version,
        }
    }

    /// Instance ID for tracking
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.fields.insert(name.to_string(), value);
    }

    /// Version of the class module that built this instance
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn shared(&self) -> Option<&Arc<dyn SharedBehavior>> {
        self.shared.as_ref()
    }

    /// Call a shared method captured at construction time.
    pub fn call(&mut self, method: &str, args: Vec<Value>) -> HotImportResult<Value> {
        let shared = self
            .shared
            .clone()
            .ok_or_else(|| HotImportError::MethodNotFound(method.to_string()))?;
        shared.call_method(&mut self.fields, method, args)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("id", &self.id)
            .field("fields", &self.fields)
            .field(
                "methods",
                &self.shared.as_ref().map(|s| s.method_names()).unwrap_or_default(),
            )
            .field("version", &self.version)
            .finish()
    }
}
