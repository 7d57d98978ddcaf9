// In: src/compose/binding.rs

//! Describes where the per-call runtime input is spliced into a fixed argument list.

use crate::error::{ComposeError, Result};
use crate::value::Value;

/// One positional argument slot as given at construction time.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// The slot that receives the runtime input.
    Placeholder,
    Value(Value),
}

impl Arg {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Arg::Placeholder)
    }
}

macro_rules! impl_arg_from {
    ($($t:ty),+ $(,)?) => {
        $(
            impl From<$t> for Arg {
                fn from(v: $t) -> Self {
                    Arg::Value(v.into())
                }
            }
        )+
    };
}

impl_arg_from!(
    Value,
    bool,
    i32,
    i64,
    usize,
    f64,
    &str,
    String,
    Vec<f64>,
    Vec<Value>,
    ndarray::ArrayD<f64>,
    crate::value::NdArray,
    crate::data::DataArray,
);

/// Shorthand for `Arg::Placeholder`, reads like the `...` marker at call sites.
pub const INPUT: Arg = Arg::Placeholder;

/// Fixed positional arguments with exactly one placeholder slot.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceholderBinding {
    slot: usize,
    fixed: Vec<Value>,
}

impl PlaceholderBinding {
    /// Builds a binding from an explicit argument list.
    ///
    /// # Errors
    /// `ComposeError::Argument` if the list holds zero or more than one placeholder.
    pub fn from_args(args: Vec<Arg>) -> Result<Self> {
        let count = args.iter().filter(|a| a.is_placeholder()).count();
        match count {
            0 => Err(ComposeError::Argument(
                "Positional arguments must contain exactly one placeholder, found none".into(),
            )),
            1 => {
                let mut slot = 0;
                let mut fixed = Vec::with_capacity(args.len().saturating_sub(1));
                for (i, arg) in args.into_iter().enumerate() {
                    match arg {
                        Arg::Placeholder => slot = i,
                        Arg::Value(v) => fixed.push(v),
                    }
                }
                Ok(Self { slot, fixed })
            }
            n => Err(ComposeError::Argument(format!(
                "Positional arguments must contain exactly one placeholder, found {}",
                n
            ))),
        }
    }

    /// Like `from_args`, but binds the input to the first slot when the caller gave
    /// no placeholder at all.
    pub fn leading(mut args: Vec<Arg>) -> Result<Self> {
        if !args.iter().any(Arg::is_placeholder) {
            args.insert(0, Arg::Placeholder);
        }
        Self::from_args(args)
    }

    /// A binding for a one-argument callable.
    pub fn unary() -> Self {
        Self {
            slot: 0,
            fixed: Vec::new(),
        }
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Total number of positional arguments, placeholder included.
    pub fn arity(&self) -> usize {
        self.fixed.len() + 1
    }

    /// Produces the full positional list with `input` in the placeholder slot.
    pub fn bind(&self, input: Value) -> Vec<Value> {
        let mut args = Vec::with_capacity(self.arity());
        args.extend_from_slice(&self.fixed[..self.slot]);
        args.push(input);
        args.extend_from_slice(&self.fixed[self.slot..]);
        args
    }

    /// Iterates over the slots, yielding `None` for the placeholder.
    pub fn slots(&self) -> impl Iterator<Item = Option<&Value>> {
        let (before, after) = self.fixed.split_at(self.slot);
        before
            .iter()
            .map(Some)
            .chain(std::iter::once(None))
            .chain(after.iter().map(Some))
    }
}
