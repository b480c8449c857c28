//! Rhai-backed module records
//!
//! The value of a script's final expression is its export:
//! - a function pointer or closure is a function module,
//! - an object map with a `constructor` function pointer is a class module
//!   (`prototype` holds the shared methods, other keys are static members),
//! - anything else is a data module.

use hotmod_kernel::{
    Constructible, HotImportError, HotImportResult, Instance, Invocable, Module, ModuleKind,
    SharedBehavior,
};
use parking_lot::RwLock;
use rhai::{AST, CallFnOptions, Dynamic, FnPtr, Map, Scope};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use crate::engine::{ScriptEngine, dynamic_to_json, json_to_dynamic, map_to_json};
use crate::error::{ScriptError, ScriptResult};

/// Key holding the constructor of a class export
pub const CONSTRUCTOR_KEY: &str = "constructor";
/// Key holding the shared methods of a class export
pub const PROTOTYPE_KEY: &str = "prototype";

/// Compiled script plus the engine able to run it
pub(crate) struct ScriptRuntime {
    engine: Arc<ScriptEngine>,
    ast: AST,
}

impl ScriptRuntime {
    fn call(&self, fn_ptr: &FnPtr, args: Vec<Value>) -> ScriptResult<Dynamic> {
        let args: Vec<Dynamic> = args.iter().map(json_to_dynamic).collect();
        fn_ptr
            .call::<Dynamic>(self.engine.engine(), &self.ast, args)
            .map_err(ScriptError::from)
    }

    fn call_with_this(
        &self,
        fn_ptr: &FnPtr,
        this: &mut Dynamic,
        args: Vec<Value>,
    ) -> ScriptResult<Dynamic> {
        let mut call_args: Vec<Dynamic> = fn_ptr.curry().to_vec();
        call_args.extend(args.iter().map(json_to_dynamic));

        let options = CallFnOptions::new().eval_ast(false).bind_this_ptr(this);
        let mut scope = Scope::new();
        self.engine
            .engine()
            .call_fn_with_options::<Dynamic>(
                options,
                &mut scope,
                &self.ast,
                fn_ptr.fn_name(),
                call_args,
            )
            .map_err(ScriptError::from)
    }
}

/// Methods of one class version
pub struct RhaiPrototype {
    methods: BTreeMap<String, FnPtr>,
    runtime: Arc<ScriptRuntime>,
}

impl SharedBehavior for RhaiPrototype {
    fn method_names(&self) -> Vec<String> {
        self.methods.keys().cloned().collect()
    }

    fn call_method(
        &self,
        this: &mut serde_json::Map<String, Value>,
        name: &str,
        args: Vec<Value>,
    ) -> HotImportResult<Value> {
        let fn_ptr = self
            .methods
            .get(name)
            .ok_or_else(|| HotImportError::MethodNotFound(name.to_string()))?;

        let mut this_dyn = json_to_dynamic(&Value::Object(this.clone()));
        let result = self.runtime.call_with_this(fn_ptr, &mut this_dyn, args)?;

        // methods may update `this`
        if let Some(updated) = this_dyn.try_cast::<Map>() {
            *this = map_to_json(&updated);
        }
        Ok(dynamic_to_json(&result))
    }
}

/// A module record produced by evaluating a Rhai script
pub struct RhaiModule {
    path: PathBuf,
    kind: ModuleKind,
    version: u64,
    source_hash: String,
    export: Dynamic,
    members: RwLock<serde_json::Map<String, Value>>,
    function: Option<FnPtr>,
    constructor: Option<FnPtr>,
    prototype: Option<Arc<RhaiPrototype>>,
    runtime: Arc<ScriptRuntime>,
}

impl RhaiModule {
    /// Classify an evaluated export and build the record.
    pub fn from_export(
        path: &Path,
        export: Dynamic,
        engine: Arc<ScriptEngine>,
        ast: AST,
        version: u64,
        source_hash: String,
    ) -> ScriptResult<Self> {
        let runtime = Arc::new(ScriptRuntime { engine, ast });

        let mut module = Self {
            path: path.to_path_buf(),
            kind: ModuleKind::Data,
            version,
            source_hash,
            export: export.clone(),
            members: RwLock::new(serde_json::Map::new()),
            function: None,
            constructor: None,
            prototype: None,
            runtime,
        };

        if let Some(fn_ptr) = export.clone().try_cast::<FnPtr>() {
            module.kind = ModuleKind::Function;
            module.function = Some(fn_ptr);
        } else if let Some(map) = export.try_cast::<Map>() {
            module.classify_map(map)?;
        }

        debug!(
            "Evaluated {:?} as {} module (version {})",
            module.path, module.kind, module.version
        );
        Ok(module)
    }

    fn classify_map(&mut self, mut map: Map) -> ScriptResult<()> {
        let constructor = map
            .get(CONSTRUCTOR_KEY)
            .and_then(|v| v.clone().try_cast::<FnPtr>());

        if let Some(constructor) = constructor {
            map.remove(CONSTRUCTOR_KEY);

            let mut methods = BTreeMap::new();
            if let Some(proto) = map.remove(PROTOTYPE_KEY) {
                let proto = proto.try_cast::<Map>().ok_or_else(|| {
                    ScriptError::InvalidExport(format!("{} must be an object map", PROTOTYPE_KEY))
                })?;
                for (name, value) in proto {
                    let fn_ptr = value.try_cast::<FnPtr>().ok_or_else(|| {
                        ScriptError::InvalidExport(format!(
                            "{}.{} is not a function",
                            PROTOTYPE_KEY, name
                        ))
                    })?;
                    methods.insert(name.to_string(), fn_ptr);
                }
            }

            self.kind = ModuleKind::Class;
            self.constructor = Some(constructor);
            self.prototype = Some(Arc::new(RhaiPrototype {
                methods,
                runtime: self.runtime.clone(),
            }));
        }

        *self.members.get_mut() = map_to_json(&map);
        Ok(())
    }
}

impl Module for RhaiModule {
    fn path(&self) -> &Path {
        &self.path
    }

    fn kind(&self) -> ModuleKind {
        self.kind
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn source_hash(&self) -> &str {
        &self.source_hash
    }

    fn value(&self) -> Value {
        if self.export.is_map() {
            Value::Object(self.members.read().clone())
        } else {
            dynamic_to_json(&self.export)
        }
    }

    fn members(&self) -> serde_json::Map<String, Value> {
        self.members.read().clone()
    }

    fn member(&self, name: &str) -> Option<Value> {
        self.members.read().get(name).cloned()
    }

    fn set_member(&self, name: &str, value: Value) {
        self.members.write().insert(name.to_string(), value);
    }

    fn shared_behavior(&self) -> Option<Arc<dyn SharedBehavior>> {
        self.prototype
            .clone()
            .map(|p| p as Arc<dyn SharedBehavior>)
    }

    fn as_invocable(&self) -> Option<&dyn Invocable> {
        self.function.as_ref().map(|_| self as &dyn Invocable)
    }

    fn as_constructible(&self) -> Option<&dyn Constructible> {
        self.constructor.as_ref().map(|_| self as &dyn Constructible)
    }
}

impl Invocable for RhaiModule {
    fn invoke(&self, args: Vec<Value>) -> HotImportResult<Value> {
        let fn_ptr = self
            .function
            .as_ref()
            .ok_or_else(|| HotImportError::NotCallable(self.path.clone()))?;
        let result = self.runtime.call(fn_ptr, args)?;
        Ok(dynamic_to_json(&result))
    }
}

impl Constructible for RhaiModule {
    fn construct(&self, args: Vec<Value>) -> HotImportResult<Instance> {
        let constructor = self
            .constructor
            .as_ref()
            .ok_or_else(|| HotImportError::NotConstructible(self.path.clone()))?;

        let fields = self
            .runtime
            .call(constructor, args)?
            .try_cast::<Map>()
            .ok_or_else(|| {
                HotImportError::Execution(format!(
                    "{} of {} must return an object map",
                    CONSTRUCTOR_KEY,
                    self.path.display()
                ))
            })?;

        Ok(Instance::new(
            map_to_json(&fields),
            self.shared_behavior(),
            self.version,
        ))
    }
}
