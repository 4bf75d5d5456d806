//! # Call context
//!
//! The state of one traced call, as captured by the tracer: positional and keyword arguments,
//! the return value, named configuration roots (for example `settings`), the local scope, and
//! the receiver of a traced method. Everything is passed explicitly; nothing is looked up in
//! ambient global state.
//!
//! Values are [`Binding`]s: plain JSON-like data, host objects implementing [`TracedObject`],
//! or sequences and mappings of further bindings.
//!
//! ```rust
//! use provdesc_engine::CallContext;
//! use serde_json::json;
//!
//! let context = CallContext::new()
//!     .with_kwarg("value", json!(1))
//!     .with_settings(json!({"datasets": {"geom": "cube"}}))
//!     .with_local("var1", json!(1));
//! assert!(context.kwargs.contains_key("value"));
//! ```

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use thiserror::Error;

use crate::reference::CallArguments;

/// Name of the configuration root registered by [`CallContext::with_settings`].
pub const SETTINGS_ROOT: &str = "settings";

/// A host object whose attributes and methods can be reached from value references.
///
/// Implementations expose only what descriptions need; anything not exposed resolves to
/// "unresolved" rather than failing the activity.
pub trait TracedObject: fmt::Debug + Send + Sync {
    /// Short type name used in diagnostics.
    fn type_name(&self) -> &str {
        std::any::type_name::<Self>().rsplit("::").next().unwrap_or("object")
    }

    /// Attribute lookup. `None` when the object has no such attribute.
    fn attribute(&self, name: &str) -> Option<Binding>;

    /// Method invocation with literal arguments.
    ///
    /// Returns `None` when the object has no such method, `Some(Err(..))` when the method exists
    /// but could not produce a value for these arguments.
    fn call(&self, method: &str, arguments: &CallArguments) -> Option<Result<Binding, String>> {
        let _ = (method, arguments);
        None
    }

    /// Indexing (`object[n]`).
    fn index(&self, index: usize) -> Option<Binding> {
        let _ = index;
        None
    }

    /// Elements when the object is used as a collection (`has_members.list`).
    fn elements(&self) -> Option<Vec<Binding>> {
        None
    }

    /// Representation recorded as the entity value.
    fn snapshot(&self) -> Value;
}

/// A value reachable from a call context.
#[derive(Clone)]
pub enum Binding {
    /// Plain data.
    Data(Value),
    /// Host object.
    Object(Arc<dyn TracedObject>),
    /// Sequence of bindings.
    List(Vec<Binding>),
    /// Mapping of bindings.
    Map(IndexMap<String, Binding>),
}

impl Binding {
    /// Wraps a host object.
    pub fn object(object: impl TracedObject + 'static) -> Self {
        Binding::Object(Arc::new(object))
    }

    /// JSON representation recorded in activity records.
    pub fn to_json(&self) -> Value {
        match self {
            Binding::Data(value) => value.clone(),
            Binding::Object(object) => object.snapshot(),
            Binding::List(items) => Value::Array(items.iter().map(Binding::to_json).collect()),
            Binding::Map(entries) => Value::Object(entries.iter().map(|(key, value)| (key.clone(), value.to_json())).collect()),
        }
    }

    /// Kind of value, for diagnostics.
    pub fn kind(&self) -> String {
        match self {
            Binding::Data(Value::Null) => "null".into(),
            Binding::Data(Value::Bool(_)) => "boolean".into(),
            Binding::Data(Value::Number(_)) => "number".into(),
            Binding::Data(Value::String(_)) => "string".into(),
            Binding::Data(Value::Array(_)) | Binding::List(_) => "sequence".into(),
            Binding::Data(Value::Object(_)) | Binding::Map(_) => "mapping".into(),
            Binding::Object(object) => object.type_name().to_string(),
        }
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Data(value) => f.debug_tuple("Data").field(value).finish(),
            Binding::Object(object) => f.debug_tuple("Object").field(object).finish(),
            Binding::List(items) => f.debug_tuple("List").field(items).finish(),
            Binding::Map(entries) => f.debug_tuple("Map").field(entries).finish(),
        }
    }
}

impl PartialEq for Binding {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Binding::Object(left), Binding::Object(right)) => Arc::ptr_eq(left, right),
            (Binding::Object(_), _) | (_, Binding::Object(_)) => false,
            _ => self.to_json() == other.to_json(),
        }
    }
}

impl From<Value> for Binding {
    fn from(value: Value) -> Self {
        Binding::Data(value)
    }
}

impl From<Arc<dyn TracedObject>> for Binding {
    fn from(object: Arc<dyn TracedObject>) -> Self {
        Binding::Object(object)
    }
}

impl From<Vec<Binding>> for Binding {
    fn from(items: Vec<Binding>) -> Self {
        Binding::List(items)
    }
}

/// State of one traced call.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    /// Positional arguments in call order.
    pub args: Vec<Binding>,
    /// Parameter names of the positional arguments, from the traced function's signature.
    pub arg_names: Vec<String>,
    /// Keyword arguments.
    pub kwargs: IndexMap<String, Binding>,
    /// Defaults of the traced signature's keyword parameters, in declaration order.
    pub kwarg_defaults: IndexMap<String, Binding>,
    /// Return value, available once the call has finished.
    pub result: Option<Binding>,
    /// Named configuration roots such as `settings`.
    pub roots: IndexMap<String, Binding>,
    /// Local scope captured by the tracer at call entry or exit.
    pub locals: IndexMap<String, Binding>,
    /// Receiver (`self`) of a traced method. Its attributes are visible as bare identifiers.
    pub receiver: Option<Binding>,
}

impl CallContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_arg(mut self, value: impl Into<Binding>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Adds a positional argument together with its parameter name.
    pub fn with_named_arg(mut self, name: impl Into<String>, value: impl Into<Binding>) -> Self {
        self.arg_names.resize(self.args.len(), String::new());
        self.arg_names.push(name.into());
        self.args.push(value.into());
        self
    }

    pub fn with_kwarg(mut self, name: impl Into<String>, value: impl Into<Binding>) -> Self {
        self.kwargs.insert(name.into(), value.into());
        self
    }

    /// Declares a keyword parameter's default, used when the call does not pass it.
    pub fn with_kwarg_default(mut self, name: impl Into<String>, value: impl Into<Binding>) -> Self {
        self.kwarg_defaults.insert(name.into(), value.into());
        self
    }

    pub fn with_result(mut self, value: impl Into<Binding>) -> Self {
        self.result = Some(value.into());
        self
    }

    pub fn with_root(mut self, name: impl Into<String>, value: impl Into<Binding>) -> Self {
        self.roots.insert(name.into(), value.into());
        self
    }

    /// Registers the `settings` configuration root.
    pub fn with_settings(self, value: impl Into<Binding>) -> Self {
        self.with_root(SETTINGS_ROOT, value)
    }

    pub fn with_local(mut self, name: impl Into<String>, value: impl Into<Binding>) -> Self {
        self.locals.insert(name.into(), value.into());
        self
    }

    pub fn with_receiver(mut self, value: impl Into<Binding>) -> Self {
        self.receiver = Some(value.into());
        self
    }

    /// Position of a named positional argument.
    pub fn arg_position(&self, name: &str) -> Option<usize> {
        self.arg_names.iter().position(|arg_name| arg_name == name)
    }

    /// Builds a context from its JSON form.
    ///
    /// ```json
    /// {"args": [..], "arg_names": [..], "kwargs": {..}, "kwarg_defaults": {..}, "result": .., "settings": {..},
    ///  "roots": {..}, "locals": {..}, "receiver": {..}}
    /// ```
    ///
    /// Every key is optional. `settings` is shorthand for a `settings` entry in `roots`.
    pub fn from_json(value: Value) -> Result<Self, ContextError> {
        let Value::Object(mut fields) = value else {
            return Err(ContextError::NotAnObject);
        };

        let mut context = CallContext::new();
        if let Some(args) = fields.remove("args") {
            let Value::Array(items) = args else {
                return Err(ContextError::InvalidField {
                    field: "args".into(),
                    expected: "an array",
                });
            };
            context.args = items.into_iter().map(Binding::Data).collect();
        }
        if let Some(names) = fields.remove("arg_names") {
            context.arg_names = serde_json::from_value(names).map_err(|_| ContextError::InvalidField {
                field: "arg_names".into(),
                expected: "an array of strings",
            })?;
        }
        context.kwargs = take_mapping(&mut fields, "kwargs")?;
        context.kwarg_defaults = take_mapping(&mut fields, "kwarg_defaults")?;
        context.locals = take_mapping(&mut fields, "locals")?;
        context.roots = take_mapping(&mut fields, "roots")?;
        if let Some(settings) = fields.remove(SETTINGS_ROOT) {
            context.roots.insert(SETTINGS_ROOT.to_string(), Binding::Data(settings));
        }
        context.result = fields.remove("result").map(Binding::Data);
        context.receiver = fields.remove("receiver").map(Binding::Data);

        if let Some(unknown) = fields.keys().next() {
            return Err(ContextError::UnknownField { field: unknown.clone() });
        }
        Ok(context)
    }
}

fn take_mapping(fields: &mut serde_json::Map<String, Value>, field: &str) -> Result<IndexMap<String, Binding>, ContextError> {
    match fields.remove(field) {
        None | Some(Value::Null) => Ok(IndexMap::new()),
        Some(Value::Object(entries)) => Ok(entries.into_iter().map(|(key, value)| (key, Binding::Data(value))).collect()),
        Some(_) => Err(ContextError::InvalidField {
            field: field.to_string(),
            expected: "an object",
        }),
    }
}

/// Errors raised when building a context from JSON.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("call context must be a JSON object")]
    NotAnObject,

    #[error("call context field '{field}' must be {expected}")]
    InvalidField { field: String, expected: &'static str },

    #[error("unknown call context field '{field}'")]
    UnknownField { field: String },
}
