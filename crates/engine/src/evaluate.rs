//! # Reference evaluation
//!
//! Walks a parsed [`ValueReference`] over a [`CallContext`], left to right. The first segment
//! selects a root; every following segment is one attribute access, index, or method call.
//!
//! ## Roots
//!
//! - `args`: positional arguments. `args.<name>` uses the traced signature's parameter names,
//!   `args[0]` and `args.0` index by position, bare `args` is the whole sequence.
//! - `kwargs`: keyword arguments. `kwargs.<name>` falls back to the signature default when the
//!   call did not pass it; bare `kwargs` is the mapping of passed arguments.
//! - `result`: the return value, once the call has finished.
//! - configuration roots registered on the context (for example `settings`).
//! - any other identifier: the captured local scope, then attributes of the receiver.
//!
//! A leading method call (`location(hdu_type="events")`) is invoked on the receiver.
//!
//! Inside collection specs each element is the implicit root; identifiers the element does not
//! provide fall back to the call scope.

use std::borrow::Cow;

use serde_json::Value;
use thiserror::Error;

use crate::context::{Binding, CallContext};
use crate::reference::{CallArguments, MethodCall, Segment, ValueReference};

/// Why a value reference could not be evaluated.
///
/// Never fatal: the resolver records the message in an `Unresolved` sentinel and moves on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionWarning {
    #[error("'{name}' is not bound in the call context")]
    UnknownRoot { name: String },

    #[error("{on} has no attribute '{attribute}'")]
    MissingAttribute { attribute: String, on: String },

    #[error("{on} has no method '{method}'")]
    MissingMethod { method: String, on: String },

    #[error("method '{method}' failed: {reason}")]
    MethodFailed { method: String, reason: String },

    #[error("index {index} is out of range for a sequence of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("{on} cannot be indexed")]
    NotIndexable { on: String },

    #[error("{on} is not a sequence")]
    NotASequence { on: String },
}

/// Where the first segment of a reference is looked up.
#[derive(Debug, Clone, Copy)]
pub enum Scope<'a> {
    /// The traced call itself.
    Call(&'a CallContext),
    /// One element of a collection, with the call as fallback.
    Member { element: &'a Binding, context: &'a CallContext },
}

/// Evaluates a reference in the given scope.
pub fn evaluate(reference: &ValueReference, scope: Scope<'_>) -> Result<Binding, ResolutionWarning> {
    match scope {
        Scope::Call(context) => evaluate_in_call(reference.segments(), context),
        Scope::Member { element, context } => {
            let Some((first, rest)) = reference.segments().split_first() else {
                return Ok(element.clone());
            };
            match step(element, first) {
                Ok(root) => walk(Cow::Owned(root), rest),
                Err(element_error) => match first {
                    Segment::Attribute(_) => evaluate_in_call(reference.segments(), context).map_err(|_| element_error),
                    _ => Err(element_error),
                },
            }
        }
    }
}

fn evaluate_in_call(segments: &[Segment], context: &CallContext) -> Result<Binding, ResolutionWarning> {
    let (root, consumed) = root(segments, context)?;
    walk(root, &segments[consumed..])
}

fn walk(mut current: Cow<'_, Binding>, segments: &[Segment]) -> Result<Binding, ResolutionWarning> {
    for segment in segments {
        current = Cow::Owned(step(&current, segment)?);
    }
    Ok(current.into_owned())
}

/// Resolves the root binding and reports how many segments it consumed.
fn root<'a>(segments: &[Segment], context: &'a CallContext) -> Result<(Cow<'a, Binding>, usize), ResolutionWarning> {
    let Some(first) = segments.first() else {
        return Err(ResolutionWarning::UnknownRoot { name: String::new() });
    };

    let name = match first {
        Segment::Attribute(name) => name.as_str(),
        Segment::Call(call) => {
            let receiver = context.receiver.as_ref().ok_or_else(|| ResolutionWarning::UnknownRoot {
                name: call.method.clone(),
            })?;
            return Ok((Cow::Owned(call_method(receiver, call)?), 1));
        }
        Segment::Index(index) => {
            return Err(ResolutionWarning::UnknownRoot { name: index.to_string() });
        }
    };

    match name {
        "args" => args_root(segments.get(1), context),
        "kwargs" => match segments.get(1) {
            Some(Segment::Attribute(key)) => {
                let value = context
                    .kwargs
                    .get(key)
                    .or_else(|| context.kwarg_defaults.get(key))
                    .ok_or_else(|| ResolutionWarning::MissingAttribute {
                        attribute: key.clone(),
                        on: "kwargs".into(),
                    })?;
                Ok((Cow::Borrowed(value), 2))
            }
            _ => Ok((Cow::Owned(Binding::Map(context.kwargs.clone())), 1)),
        },
        "result" => {
            let result = context
                .result
                .as_ref()
                .ok_or_else(|| ResolutionWarning::UnknownRoot { name: "result".into() })?;
            Ok((Cow::Borrowed(result), 1))
        }
        _ => {
            if let Some(binding) = context.roots.get(name).or_else(|| context.locals.get(name)) {
                return Ok((Cow::Borrowed(binding), 1));
            }
            if let Some(receiver) = &context.receiver
                && let Ok(binding) = step(receiver, first)
            {
                return Ok((Cow::Owned(binding), 1));
            }
            Err(ResolutionWarning::UnknownRoot { name: name.to_string() })
        }
    }
}

fn args_root<'a>(next: Option<&Segment>, context: &'a CallContext) -> Result<(Cow<'a, Binding>, usize), ResolutionWarning> {
    let position = match next {
        Some(Segment::Index(index)) => Some(*index),
        Some(Segment::Attribute(name)) => Some(context.arg_position(name).ok_or_else(|| ResolutionWarning::MissingAttribute {
            attribute: name.clone(),
            on: "args".into(),
        })?),
        _ => None,
    };

    match position {
        Some(index) => {
            let value = context.args.get(index).ok_or(ResolutionWarning::IndexOutOfRange {
                index,
                len: context.args.len(),
            })?;
            Ok((Cow::Borrowed(value), 2))
        }
        None => Ok((Cow::Owned(Binding::List(context.args.clone())), 1)),
    }
}

/// Applies one segment to a binding.
pub fn step(binding: &Binding, segment: &Segment) -> Result<Binding, ResolutionWarning> {
    match segment {
        Segment::Attribute(name) => attribute(binding, name),
        Segment::Index(index) => index_into(binding, *index),
        Segment::Call(call) => call_method(binding, call),
    }
}

fn attribute(binding: &Binding, name: &str) -> Result<Binding, ResolutionWarning> {
    let found = match binding {
        Binding::Data(Value::Object(map)) => map.get(name).cloned().map(Binding::Data),
        Binding::Map(entries) => entries.get(name).cloned(),
        Binding::Object(object) => object.attribute(name),
        _ => None,
    };
    found.ok_or_else(|| ResolutionWarning::MissingAttribute {
        attribute: name.to_string(),
        on: binding.kind(),
    })
}

fn index_into(binding: &Binding, index: usize) -> Result<Binding, ResolutionWarning> {
    let out_of_range = |len| ResolutionWarning::IndexOutOfRange { index, len };
    match binding {
        Binding::Data(Value::Array(items)) => items.get(index).cloned().map(Binding::Data).ok_or(out_of_range(items.len())),
        Binding::List(items) => items.get(index).cloned().ok_or(out_of_range(items.len())),
        Binding::Object(object) => match object.index(index) {
            Some(found) => Ok(found),
            None => match object.elements() {
                Some(elements) => Err(out_of_range(elements.len())),
                None => Err(ResolutionWarning::NotIndexable { on: binding.kind() }),
            },
        },
        _ => Err(ResolutionWarning::NotIndexable { on: binding.kind() }),
    }
}

fn call_method(binding: &Binding, call: &MethodCall) -> Result<Binding, ResolutionWarning> {
    if let Binding::Object(object) = binding {
        match object.call(&call.method, &call.arguments) {
            Some(Ok(found)) => return Ok(found),
            Some(Err(reason)) => {
                return Err(ResolutionWarning::MethodFailed {
                    method: call.method.clone(),
                    reason,
                });
            }
            None if call.method == "__str__" => return Ok(Binding::Data(Value::String(render(&object.snapshot())))),
            None => {
                return Err(ResolutionWarning::MissingMethod {
                    method: call.method.clone(),
                    on: binding.kind(),
                });
            }
        }
    }
    builtin(binding, &call.method, &call.arguments)
}

/// Methods available on plain data.
fn builtin(binding: &Binding, method: &str, arguments: &CallArguments) -> Result<Binding, ResolutionWarning> {
    let missing = || ResolutionWarning::MissingMethod {
        method: method.to_string(),
        on: binding.kind(),
    };

    match (method, binding) {
        ("__str__", _) => Ok(Binding::Data(Value::String(render(&binding.to_json())))),
        ("__len__", Binding::Data(Value::Array(items))) => Ok(Binding::Data(items.len().into())),
        ("__len__", Binding::Data(Value::Object(map))) => Ok(Binding::Data(map.len().into())),
        ("__len__", Binding::Data(Value::String(text))) => Ok(Binding::Data(text.chars().count().into())),
        ("__len__", Binding::List(items)) => Ok(Binding::Data(items.len().into())),
        ("__len__", Binding::Map(entries)) => Ok(Binding::Data(entries.len().into())),
        ("keys", Binding::Data(Value::Object(map))) => Ok(Binding::Data(map.keys().cloned().map(Value::String).collect())),
        ("keys", Binding::Map(entries)) => Ok(Binding::Data(entries.keys().cloned().map(Value::String).collect())),
        ("values", Binding::Data(Value::Object(map))) => Ok(Binding::Data(map.values().cloned().collect())),
        ("values", Binding::Map(entries)) => Ok(Binding::List(entries.values().cloned().collect())),
        ("get", Binding::Data(Value::Object(_)) | Binding::Map(_)) => {
            let key = match arguments.get("key", 0) {
                Some(Value::String(key)) => key,
                Some(other) => {
                    return Err(ResolutionWarning::MethodFailed {
                        method: method.to_string(),
                        reason: format!("key must be a string, got {other}"),
                    });
                }
                None => {
                    return Err(ResolutionWarning::MethodFailed {
                        method: method.to_string(),
                        reason: "missing key argument".into(),
                    });
                }
            };
            let default = || Binding::Data(arguments.get("default", 1).cloned().unwrap_or(Value::Null));
            Ok(attribute(binding, key).unwrap_or_else(|_| default()))
        }
        ("upper", Binding::Data(Value::String(text))) => Ok(Binding::Data(Value::String(text.to_uppercase()))),
        ("lower", Binding::Data(Value::String(text))) => Ok(Binding::Data(Value::String(text.to_lowercase()))),
        _ => Err(missing()),
    }
}

/// String rendering used by `__str__`: strings verbatim, everything else as compact JSON.
fn render(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Expands a binding into the elements of a collection.
pub fn elements(binding: &Binding) -> Result<Vec<Binding>, ResolutionWarning> {
    match binding {
        Binding::Data(Value::Array(items)) => Ok(items.iter().cloned().map(Binding::Data).collect()),
        Binding::List(items) => Ok(items.clone()),
        Binding::Object(object) => object.elements().ok_or_else(|| ResolutionWarning::NotASequence { on: binding.kind() }),
        _ => Err(ResolutionWarning::NotASequence { on: binding.kind() }),
    }
}
