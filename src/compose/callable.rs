// In: src/compose/callable.rs

//! The explicit calling convention between atoms and the functions they wrap.
//!
//! Every wrapped function has the same shape: it receives a `CallArgs` and returns a
//! `CallOutput`. Pure functions leave `CallOutput::states` empty; stateful functions
//! read their current state through `CallArgs::state` and hand back the new state
//! tagged with the same keyword name.

use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

use crate::compose::state::State;
use crate::error::{ComposeError, Result};
use crate::value::Value;

/// Ordered keyword arguments.
pub type Kwargs = IndexMap<String, Value>;

/// Builds a `Kwargs` map from `key => value` pairs.
#[macro_export]
macro_rules! kwargs {
    () => { $crate::compose::Kwargs::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::compose::Kwargs::new();
        $(
            map.insert(String::from($key), $crate::value::Value::from($value));
        )+
        map
    }};
}

//==================================================================================
// 1. Call arguments and results
//==================================================================================

/// Everything a wrapped function receives for one invocation.
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    pub args: Vec<Value>,
    pub kwargs: Kwargs,
    /// State values, keyed by the keyword under which the function expects them.
    pub states: IndexMap<String, State>,
}

impl CallArgs {
    pub fn new(args: Vec<Value>, kwargs: Kwargs) -> Self {
        Self {
            args,
            kwargs,
            states: IndexMap::new(),
        }
    }

    /// Positional argument `index`, or an error naming the missing slot.
    pub fn arg(&self, index: usize) -> Result<&Value> {
        self.args.get(index).ok_or_else(|| {
            ComposeError::Computation(format!(
                "Missing positional argument {} (got {})",
                index,
                self.args.len()
            ))
        })
    }

    /// Moves positional argument `index` out, leaving `Value::None` behind.
    pub fn take_arg(&mut self, index: usize) -> Result<Value> {
        let len = self.args.len();
        self.args
            .get_mut(index)
            .map(std::mem::take)
            .ok_or_else(|| {
                ComposeError::Computation(format!(
                    "Missing positional argument {} (got {})",
                    index, len
                ))
            })
    }

    pub fn kwarg(&self, key: &str) -> Option<&Value> {
        self.kwargs.get(key)
    }

    /// Looks a value up by keyword first, then by position.
    pub fn param(&self, key: &str, index: usize) -> Result<&Value> {
        match self.kwargs.get(key) {
            Some(v) => Ok(v),
            None => self.args.get(index).ok_or_else(|| {
                ComposeError::Computation(format!(
                    "Missing argument '{}' (keyword or position {})",
                    key, index
                ))
            }),
        }
    }

    /// Looks parameter `key` of a function with parameter list `signature` up by
    /// keyword first. Otherwise positional arguments fill, in order, the parameters
    /// that were not passed by keyword.
    pub fn resolve(&self, signature: &[&str], key: &str) -> Result<&Value> {
        if let Some(v) = self.kwargs.get(key) {
            return Ok(v);
        }
        let index = self.position_in(signature, key)?;
        self.args.get(index).ok_or_else(|| {
            ComposeError::Computation(format!(
                "Missing argument '{}' (keyword or position {})",
                key, index
            ))
        })
    }

    /// Like `resolve`, but moves the value out, leaving `Value::None` behind.
    pub fn take_resolved(&mut self, signature: &[&str], key: &str) -> Result<Value> {
        if let Some(v) = self.kwargs.get_mut(key) {
            return Ok(std::mem::take(v));
        }
        let index = self.position_in(signature, key)?;
        self.take_arg(index)
    }

    fn position_in(&self, signature: &[&str], key: &str) -> Result<usize> {
        let index = signature.iter().position(|&name| name == key).ok_or_else(|| {
            ComposeError::Computation(format!("'{}' is not one of {:?}", key, signature))
        })?;
        Ok(signature[..index]
            .iter()
            .filter(|name| !self.kwargs.contains_key(**name))
            .count())
    }

    /// The state passed under `name`, if the caller requested stateful execution.
    pub fn state(&self, name: &str) -> Option<&State> {
        self.states.get(name)
    }
}

/// What a wrapped function returns: its output plus any new state values.
#[derive(Debug, Clone, PartialEq)]
pub struct CallOutput {
    pub value: Value,
    pub states: Vec<(String, Value)>,
}

impl CallOutput {
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            states: Vec::new(),
        }
    }

    /// Adds a returned state under the keyword it was received with.
    pub fn with_state(mut self, name: impl Into<String>, state: impl Into<Value>) -> Self {
        self.states.push((name.into(), state.into()));
        self
    }

    pub fn into_value(self) -> Value {
        self.value
    }
}

impl From<Value> for CallOutput {
    fn from(value: Value) -> Self {
        CallOutput::new(value)
    }
}

//==================================================================================
// 2. Callable
//==================================================================================

type CallFn = dyn Fn(CallArgs) -> Result<CallOutput> + Send + Sync;

/// A named, shareable function reference. Cloning shares the underlying function.
#[derive(Clone)]
pub struct Callable {
    name: Arc<str>,
    func: Arc<CallFn>,
}

impl Callable {
    /// Wraps a function following the full stateful convention.
    pub fn new<F>(name: &str, func: F) -> Self
    where
        F: Fn(CallArgs) -> Result<CallOutput> + Send + Sync + 'static,
    {
        Self {
            name: Arc::from(name),
            func: Arc::new(func),
        }
    }

    /// Wraps a function that never carries state.
    pub fn pure<F>(name: &str, func: F) -> Self
    where
        F: Fn(CallArgs) -> Result<Value> + Send + Sync + 'static,
    {
        Self::new(name, move |args| func(args).map(CallOutput::new))
    }

    /// Wraps a one-argument function over values.
    pub fn unary<F>(name: &str, func: F) -> Self
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        Self::new(name, move |mut args: CallArgs| {
            let input = args.take_arg(0)?;
            func(input).map(CallOutput::new)
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, args: CallArgs) -> Result<CallOutput> {
        (self.func)(args)
    }

    /// Returns `true` if both handles share the same function.
    pub fn ptr_eq(&self, other: &Callable) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unary_callable_receives_first_argument() {
        let double = Callable::unary("double", |v| Ok(Value::Float(v.as_float()? * 2.0)));
        let out = double
            .call(CallArgs::new(vec![Value::Float(1.5)], Kwargs::new()))
            .unwrap();
        assert_eq!(out, CallOutput::new(3.0));
        assert_eq!(double.name(), "double");
    }

    #[test]
    fn test_param_prefers_keyword_over_position() {
        let args = CallArgs::new(
            vec![Value::Int(1), Value::Int(2)],
            kwargs! { "factor" => 5i64 },
        );
        assert_eq!(args.param("factor", 1).unwrap(), &Value::Int(5));
        assert_eq!(args.param("other", 1).unwrap(), &Value::Int(2));
        assert!(args.param("missing", 9).is_err());
    }

    #[test]
    fn test_positionals_fill_parameters_not_given_by_keyword() {
        let signature = ["b", "a", "x", "dim"];
        let mut args = CallArgs::new(
            vec![Value::Int(10), Value::Int(20)],
            kwargs! { "b" => 1i64, "dim" => "time" },
        );
        assert_eq!(args.resolve(&signature, "b").unwrap(), &Value::Int(1));
        assert_eq!(args.resolve(&signature, "a").unwrap(), &Value::Int(10));
        assert_eq!(args.resolve(&signature, "dim").unwrap(), &Value::from("time"));
        assert_eq!(args.take_resolved(&signature, "x").unwrap(), Value::Int(20));
        assert_eq!(args.args[1], Value::None);
        assert!(args.resolve(&signature, "zi").is_err());

        let short = CallArgs::new(vec![Value::Int(1)], Kwargs::new());
        assert!(short.resolve(&signature, "x").is_err());
    }

    #[test]
    fn test_take_arg_leaves_none() {
        let mut args = CallArgs::new(vec![Value::Int(1)], Kwargs::new());
        assert_eq!(args.take_arg(0).unwrap(), Value::Int(1));
        assert_eq!(args.arg(0).unwrap(), &Value::None);
        assert!(args.take_arg(3).is_err());
    }

    #[test]
    fn test_clones_share_function() {
        let f = Callable::pure("noop", |_| Ok(Value::None));
        let g = f.clone();
        assert!(f.ptr_eq(&g));
        assert!(!f.ptr_eq(&Callable::pure("noop", |_| Ok(Value::None))));
    }

    #[test]
    fn test_call_output_builder() {
        let out = CallOutput::new(1i64).with_state("zi", 2i64);
        assert_eq!(out.states, vec![("zi".to_string(), Value::Int(2))]);
        assert_eq!(out.into_value(), Value::Int(1));
    }
}
