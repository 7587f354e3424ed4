//! # Script Engine
//!
//! Capability interface for user-authored scripts (tasks, filters,
//! validators, scripted queries) and its rhai implementation.
//!
//! A script is compiled once into an opaque [`CompiledScript`] and invoked
//! any number of times against a [`ScriptHost`], which exposes the store
//! to the script. Every invocation runs under an [`ExecutionBudget`].

use crate::messages;
use crate::types::{ErrorMessage, InventoryError};
use parking_lot::Mutex;
use rhai::{Dynamic, Engine, EvalAltResult, Position, Scope};
use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

// =============================================================================
// VALUES & BINDINGS
// =============================================================================

/// Engine neutral value exchanged with scripts.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    Unit,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Array(Vec<ScriptValue>),
    Map(BTreeMap<String, ScriptValue>),
}

impl ScriptValue {
    pub fn as_map(&self) -> Option<&BTreeMap<String, ScriptValue>> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[ScriptValue]> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Render scalars as text. Composite values are not renderable.
    pub fn render(&self) -> Option<String> {
        match self {
            Self::Unit => Some(String::new()),
            Self::Bool(b) => Some(b.to_string()),
            Self::Int(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::Text(s) => Some(s.clone()),
            Self::Array(_) | Self::Map(_) => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unit => "unit",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Text(_) => "string",
            Self::Array(_) => "array",
            Self::Map(_) => "map",
        }
    }
}

impl From<&str> for ScriptValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for ScriptValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

/// Variables visible to a script, by name.
pub type Bindings = BTreeMap<String, ScriptValue>;

// =============================================================================
// COMPILED SCRIPTS & BUDGET
// =============================================================================

/// An executable artifact. Only the engine that produced it can run it.
#[derive(Clone)]
pub struct CompiledScript {
    context: String,
    artifact: Arc<dyn Any + Send + Sync>,
}

impl CompiledScript {
    pub fn new(context: impl Into<String>, artifact: Arc<dyn Any + Send + Sync>) -> Self {
        Self {
            context: context.into(),
            artifact,
        }
    }

    /// What the script belongs to, used in error messages.
    pub fn context(&self) -> &str {
        &self.context
    }

    pub fn artifact<T: Any>(&self) -> Option<&T> {
        self.artifact.downcast_ref::<T>()
    }
}

impl fmt::Debug for CompiledScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledScript")
            .field("context", &self.context)
            .finish_non_exhaustive()
    }
}

/// Cooperative cancellation flag shared with the caller.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Limits of one script invocation. `max_operations == 0` is unlimited.
#[derive(Debug, Clone)]
pub struct ExecutionBudget {
    pub max_operations: u64,
    pub timeout: Duration,
    pub cancellation: CancellationToken,
}

impl ExecutionBudget {
    pub fn new(max_operations: u64, timeout: Duration) -> Self {
        Self {
            max_operations,
            timeout,
            cancellation: CancellationToken::new(),
        }
    }
}

// =============================================================================
// HOST & ENGINE CONTRACTS
// =============================================================================

/// Store access offered to a running script.
///
/// Objects are handed over as maps with `class_name`, `uuid`, `name` and
/// an `attributes` map of rendered values.
pub trait ScriptHost: Send + Sync {
    fn get_object(&self, class_name: &str, uuid: &str) -> Result<ScriptValue, InventoryError>;

    fn get_children(&self, class_name: &str, uuid: &str) -> Result<ScriptValue, InventoryError>;

    fn get_objects_of_class(&self, class_name: &str) -> Result<ScriptValue, InventoryError>;

    fn is_subclass_of(&self, class_name: &str, super_class: &str) -> Result<bool, InventoryError>;

    /// Rendered attribute value, `Unit` when unset.
    fn get_attribute(
        &self,
        class_name: &str,
        uuid: &str,
        attribute: &str,
    ) -> Result<ScriptValue, InventoryError>;

    /// Fails for read-only hosts.
    fn set_attribute(
        &self,
        class_name: &str,
        uuid: &str,
        attribute: &str,
        value: &str,
    ) -> Result<(), InventoryError>;

    fn config_value(&self, name: &str) -> Result<ScriptValue, InventoryError>;

    /// Write a blob outside the graph transaction. Not rolled back.
    fn save_blob(&self, name: &str, content: &str) -> Result<(), InventoryError>;

    fn log(&self, message: &str);
}

/// Compiles and runs scripts.
pub trait ScriptEngine: Send + Sync {
    fn compile(&self, source: &str, context: &str) -> Result<CompiledScript, InventoryError>;

    fn invoke(
        &self,
        script: &CompiledScript,
        host: Arc<dyn ScriptHost>,
        bindings: Bindings,
        budget: &ExecutionBudget,
    ) -> Result<ScriptValue, InventoryError>;
}

// =============================================================================
// RHAI ENGINE
// =============================================================================

const TERMINATED_TIMEOUT: &str = "timeout";
const TERMINATED_CANCELLED: &str = "cancelled";

/// Progress is checked every this many operations.
const PROGRESS_STRIDE: u64 = 256;

/// rhai implementation of [`ScriptEngine`].
pub struct RhaiEngine {
    compiler: Engine,
}

impl fmt::Debug for RhaiEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RhaiEngine").finish_non_exhaustive()
    }
}

impl Default for RhaiEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl RhaiEngine {
    pub fn new() -> Self {
        Self {
            compiler: Engine::new(),
        }
    }
}

impl ScriptEngine for RhaiEngine {
    fn compile(&self, source: &str, context: &str) -> Result<CompiledScript, InventoryError> {
        let ast = self.compiler.compile(source).map_err(|e| {
            InventoryError::ScriptCompilationFailure(
                ErrorMessage::new(messages::SCRIPT_COMPILE)
                    .arg(context)
                    .arg(e),
            )
        })?;
        Ok(CompiledScript::new(context, Arc::new(ast)))
    }

    fn invoke(
        &self,
        script: &CompiledScript,
        host: Arc<dyn ScriptHost>,
        bindings: Bindings,
        budget: &ExecutionBudget,
    ) -> Result<ScriptValue, InventoryError> {
        let ast = script.artifact::<rhai::AST>().ok_or_else(|| {
            InventoryError::InvalidArgument(
                ErrorMessage::new(messages::SCRIPT_RUNTIME)
                    .arg(script.context())
                    .arg("artifact was not produced by this engine"),
            )
        })?;

        let host_error: Arc<Mutex<Option<InventoryError>>> = Arc::new(Mutex::new(None));
        let mut engine = Engine::new();
        engine.set_max_operations(budget.max_operations);
        {
            let deadline = Instant::now() + budget.timeout;
            let cancellation = budget.cancellation.clone();
            engine.on_progress(move |ops| {
                if ops % PROGRESS_STRIDE != 0 {
                    return None;
                }
                if cancellation.is_cancelled() {
                    Some(Dynamic::from(TERMINATED_CANCELLED.to_string()))
                } else if Instant::now() > deadline {
                    Some(Dynamic::from(TERMINATED_TIMEOUT.to_string()))
                } else {
                    None
                }
            });
        }
        {
            let host = Arc::clone(&host);
            engine.on_print(move |text| host.log(text));
        }
        register_host(&mut engine, &host, &host_error);

        let mut scope = Scope::new();
        for (name, value) in bindings {
            scope.push_dynamic(name, to_dynamic(value));
        }

        match engine.eval_ast_with_scope::<Dynamic>(&mut scope, ast) {
            Ok(value) => Ok(from_dynamic(value)),
            Err(err) => Err(convert_failure(script.context(), *err, &host_error)),
        }
    }
}

fn convert_failure(
    context: &str,
    err: EvalAltResult,
    host_error: &Mutex<Option<InventoryError>>,
) -> InventoryError {
    match err {
        EvalAltResult::ErrorTooManyOperations(_) => InventoryError::ScriptAborted(
            ErrorMessage::new(messages::SCRIPT_BUDGET).arg(context),
        ),
        EvalAltResult::ErrorTerminated(reason, _) => {
            let key = if reason.to_string() == TERMINATED_CANCELLED {
                messages::SCRIPT_CANCELLED
            } else {
                messages::SCRIPT_BUDGET
            };
            InventoryError::ScriptAborted(ErrorMessage::new(key).arg(context))
        }
        other => {
            // A store error the script caught must not be reported for a
            // later, unrelated failure.
            let raised = raised_text(&other);
            match host_error.lock().take() {
                Some(store_error) if raised == Some(store_error.to_string()) => store_error,
                _ => InventoryError::InvalidArgument(
                    ErrorMessage::new(messages::SCRIPT_RUNTIME)
                        .arg(context)
                        .arg(other),
                ),
            }
        }
    }
}

/// Value a failing script raised, looking through function call frames.
fn raised_text(err: &EvalAltResult) -> Option<String> {
    match err {
        EvalAltResult::ErrorRuntime(value, _) => Some(value.to_string()),
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _) => raised_text(inner),
        _ => None,
    }
}

type HostResult<T> = Result<T, Box<EvalAltResult>>;

/// Remember the store error and abort the script with its text.
fn host_failure(slot: &Mutex<Option<InventoryError>>, err: InventoryError) -> Box<EvalAltResult> {
    let text = err.to_string();
    *slot.lock() = Some(err);
    EvalAltResult::ErrorRuntime(text.into(), Position::NONE).into()
}

fn register_host(
    engine: &mut Engine,
    host: &Arc<dyn ScriptHost>,
    slot: &Arc<Mutex<Option<InventoryError>>>,
) {
    {
        let (host, slot) = (Arc::clone(host), Arc::clone(slot));
        engine.register_fn(
            "get_object",
            move |class_name: &str, uuid: &str| -> HostResult<Dynamic> {
                host.get_object(class_name, uuid)
                    .map(to_dynamic)
                    .map_err(|e| host_failure(&slot, e))
            },
        );
    }
    {
        let (host, slot) = (Arc::clone(host), Arc::clone(slot));
        engine.register_fn(
            "get_children",
            move |class_name: &str, uuid: &str| -> HostResult<Dynamic> {
                host.get_children(class_name, uuid)
                    .map(to_dynamic)
                    .map_err(|e| host_failure(&slot, e))
            },
        );
    }
    {
        let (host, slot) = (Arc::clone(host), Arc::clone(slot));
        engine.register_fn(
            "objects_of_class",
            move |class_name: &str| -> HostResult<Dynamic> {
                host.get_objects_of_class(class_name)
                    .map(to_dynamic)
                    .map_err(|e| host_failure(&slot, e))
            },
        );
    }
    {
        let (host, slot) = (Arc::clone(host), Arc::clone(slot));
        engine.register_fn(
            "is_subclass_of",
            move |class_name: &str, super_class: &str| -> HostResult<bool> {
                host.is_subclass_of(class_name, super_class)
                    .map_err(|e| host_failure(&slot, e))
            },
        );
    }
    {
        let (host, slot) = (Arc::clone(host), Arc::clone(slot));
        engine.register_fn(
            "get_attribute",
            move |class_name: &str, uuid: &str, attribute: &str| -> HostResult<Dynamic> {
                host.get_attribute(class_name, uuid, attribute)
                    .map(to_dynamic)
                    .map_err(|e| host_failure(&slot, e))
            },
        );
    }
    {
        let (host, slot) = (Arc::clone(host), Arc::clone(slot));
        engine.register_fn(
            "set_attribute",
            move |class_name: &str, uuid: &str, attribute: &str, value: &str| -> HostResult<()> {
                host.set_attribute(class_name, uuid, attribute, value)
                    .map_err(|e| host_failure(&slot, e))
            },
        );
    }
    {
        let (host, slot) = (Arc::clone(host), Arc::clone(slot));
        engine.register_fn("config_value", move |name: &str| -> HostResult<Dynamic> {
            host.config_value(name)
                .map(to_dynamic)
                .map_err(|e| host_failure(&slot, e))
        });
    }
    {
        let (host, slot) = (Arc::clone(host), Arc::clone(slot));
        engine.register_fn(
            "save_blob",
            move |name: &str, content: &str| -> HostResult<()> {
                host.save_blob(name, content)
                    .map_err(|e| host_failure(&slot, e))
            },
        );
    }
}

// =============================================================================
// CONVERSIONS
// =============================================================================

fn to_dynamic(value: ScriptValue) -> Dynamic {
    match value {
        ScriptValue::Unit => Dynamic::UNIT,
        ScriptValue::Bool(b) => Dynamic::from(b),
        ScriptValue::Int(i) => Dynamic::from(i),
        ScriptValue::Float(f) => Dynamic::from(f),
        ScriptValue::Text(s) => Dynamic::from(s),
        ScriptValue::Array(items) => {
            Dynamic::from_array(items.into_iter().map(to_dynamic).collect())
        }
        ScriptValue::Map(entries) => Dynamic::from_map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), to_dynamic(v)))
                .collect(),
        ),
    }
}

fn from_dynamic(value: Dynamic) -> ScriptValue {
    if value.is_unit() {
        return ScriptValue::Unit;
    }
    if let Ok(b) = value.as_bool() {
        return ScriptValue::Bool(b);
    }
    if let Ok(i) = value.as_int() {
        return ScriptValue::Int(i);
    }
    if let Ok(f) = value.as_float() {
        return ScriptValue::Float(f);
    }
    if value.is_array() {
        return match value.into_array() {
            Ok(items) => ScriptValue::Array(items.into_iter().map(from_dynamic).collect()),
            Err(kind) => ScriptValue::Text(kind.to_string()),
        };
    }
    if value.is_map() {
        return match value.try_cast::<rhai::Map>() {
            Some(map) => ScriptValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k.to_string(), from_dynamic(v)))
                    .collect(),
            ),
            None => ScriptValue::Unit,
        };
    }
    ScriptValue::Text(value.to_string())
}

// =============================================================================
// TESTS
// =============================================================================
