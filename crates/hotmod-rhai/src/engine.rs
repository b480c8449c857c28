//! Rhai script engine shared by every module of one loader
//!
//! Applies execution limits, routes `print`/`debug` to tracing and evaluates
//! module bodies with `MODULE_PATH` / `MODULE_DIR` constants in scope.

use hotmod_kernel::ScriptLimits;
use rhai::{AST, Dynamic, Engine, Map, Scope};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, info};

use crate::error::{ScriptError, ScriptResult};

/// Rhai engine configured for module scripts
pub struct ScriptEngine {
    engine: Engine,
    limits: ScriptLimits,
}

impl ScriptEngine {
    pub fn new(limits: ScriptLimits) -> Self {
        let mut engine = Engine::new();
        Self::apply_limits(&mut engine, &limits);
        Self::register_builtins(&mut engine);
        Self { engine, limits }
    }

    fn apply_limits(engine: &mut Engine, limits: &ScriptLimits) {
        engine.set_max_operations(limits.max_operations);
        engine.set_max_call_levels(limits.max_call_levels);
        engine.set_max_string_size(limits.max_string_size);
        engine.set_max_array_size(limits.max_array_size);
        engine.set_max_map_size(limits.max_map_size);
    }

    fn register_builtins(engine: &mut Engine) {
        engine.on_print(|text| info!(target: "hotmod::script", "{}", text));
        engine.on_debug(|text, source, pos| {
            debug!(target: "hotmod::script", source = source.unwrap_or(""), %pos, "{}", text)
        });
    }

    pub fn compile(&self, source: &str) -> ScriptResult<AST> {
        self.engine
            .compile(source)
            .map_err(|e| ScriptError::CompileError(e.to_string()))
    }

    /// Syntax check; returns diagnostics, empty when the source compiles.
    pub fn validate(&self, source: &str) -> Vec<String> {
        match self.engine.compile(source) {
            Ok(_) => Vec::new(),
            Err(e) => vec![e.to_string()],
        }
    }

    /// Run a module body and return the value of its final expression.
    pub fn evaluate(&self, path: &Path, ast: &AST) -> ScriptResult<Dynamic> {
        let mut scope = Scope::new();
        scope.push_constant("MODULE_PATH", path.display().to_string());
        if let Some(dir) = path.parent() {
            scope.push_constant("MODULE_DIR", dir.display().to_string());
        }

        self.engine
            .eval_ast_with_scope::<Dynamic>(&mut scope, ast)
            .map_err(|e| ScriptError::EvalError(e.to_string()))
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn limits(&self) -> &ScriptLimits {
        &self.limits
    }
}

impl Default for ScriptEngine {
    fn default() -> Self {
        Self::new(ScriptLimits::default())
    }
}

/// Convert JSON to a Rhai value
pub fn json_to_dynamic(value: &Value) -> Dynamic {
    match value {
        Value::Null => Dynamic::UNIT,
        Value::Bool(b) => Dynamic::from(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Dynamic::from(i)
            } else if let Some(f) = n.as_f64() {
                Dynamic::from(f)
            } else {
                Dynamic::UNIT
            }
        }
        Value::String(s) => Dynamic::from(s.clone()),
        Value::Array(arr) => Dynamic::from(arr.iter().map(json_to_dynamic).collect::<Vec<_>>()),
        Value::Object(obj) => {
            let mut map = Map::new();
            for (k, v) in obj {
                map.insert(k.as_str().into(), json_to_dynamic(v));
            }
            Dynamic::from(map)
        }
    }
}

/// Convert a Rhai value to JSON.
///
/// Function pointers and other opaque values become their display string.
pub fn dynamic_to_json(value: &Dynamic) -> Value {
    if value.is_unit() {
        return Value::Null;
    }
    if let Ok(b) = value.as_bool() {
        return Value::Bool(b);
    }
    if let Ok(i) = value.as_int() {
        return Value::from(i);
    }
    if let Ok(f) = value.as_float() {
        return serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null);
    }
    if let Ok(c) = value.as_char() {
        return Value::String(c.to_string());
    }
    if value.is_string() {
        return Value::String(value.clone().into_string().unwrap_or_default());
    }
    if value.is_array() {
        if let Ok(arr) = value.clone().into_array() {
            return Value::Array(arr.iter().map(dynamic_to_json).collect());
        }
    }
    if let Some(map) = value.clone().try_cast::<Map>() {
        return Value::Object(map_to_json(&map));
    }
    Value::String(value.to_string())
}

pub(crate) fn map_to_json(map: &Map) -> serde_json::Map<String, Value> {
    map.iter()
        .map(|(k, v)| (k.to_string(), dynamic_to_json(v)))
        .collect()
}
