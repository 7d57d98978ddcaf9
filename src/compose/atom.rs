// In: src/compose/atom.rs

//! The elementary, stateless pipeline step.

use indexmap::IndexMap;
use std::fmt;

use crate::compose::binding::{Arg, PlaceholderBinding};
use crate::compose::callable::{CallArgs, CallOutput, Callable, Kwargs};
use crate::compose::state::State;
use crate::config::DisplayConfig;
use crate::error::{ComposeError, Result};
use crate::value::Value;

/// A callable with all arguments fixed except one placeholder slot.
#[derive(Debug, Clone)]
pub struct Atom {
    callable: Callable,
    binding: PlaceholderBinding,
    kwargs: Kwargs,
    name: Option<String>,
}

impl Atom {
    /// Binds `callable` to `args` and `kwargs`.
    ///
    /// # Errors
    /// `ComposeError::Argument` unless `args` holds exactly one placeholder.
    pub fn new(callable: Callable, args: Vec<Arg>, kwargs: Kwargs) -> Result<Self> {
        let binding = PlaceholderBinding::from_args(args)?;
        Ok(Self::from_binding(callable, binding, kwargs))
    }

    /// An atom feeding the runtime input as the only positional argument.
    pub fn unary(callable: Callable) -> Self {
        Self::from_binding(callable, PlaceholderBinding::unary(), Kwargs::new())
    }

    /// Like `new`, but binds the input to the first slot when `args` carries no
    /// placeholder.
    pub fn leading(callable: Callable, args: Vec<Arg>, kwargs: Kwargs) -> Result<Self> {
        let binding = PlaceholderBinding::leading(args)?;
        Ok(Self::from_binding(callable, binding, kwargs))
    }

    pub(crate) fn from_binding(
        callable: Callable,
        binding: PlaceholderBinding,
        kwargs: Kwargs,
    ) -> Self {
        Self {
            callable,
            binding,
            kwargs,
            name: None,
        }
    }

    /// Sets the name shown instead of the callable's name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// The display name, falling back to the callable's name.
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or_else(|| self.callable.name())
    }

    pub fn callable(&self) -> &Callable {
        &self.callable
    }

    pub fn binding(&self) -> &PlaceholderBinding {
        &self.binding
    }

    pub fn kwargs(&self) -> &Kwargs {
        &self.kwargs
    }

    /// Applies the wrapped callable with `input` in the placeholder slot.
    ///
    /// Errors raised by the callable are returned unchanged. A pure atom whose
    /// callable hands back state values fails with `StateShape`.
    pub fn apply(&self, input: Value) -> Result<Value> {
        let output = self.invoke(input, IndexMap::new())?;
        if !output.states.is_empty() {
            return Err(ComposeError::StateShape {
                atom: self.name().to_string(),
                expected: 0,
                found: output.states.len(),
            });
        }
        Ok(output.value)
    }

    /// Invokes the callable with explicit state keywords attached.
    pub(crate) fn invoke(
        &self,
        input: Value,
        states: IndexMap<String, State>,
    ) -> Result<CallOutput> {
        let args = CallArgs {
            args: self.binding.bind(input),
            kwargs: self.kwargs.clone(),
            states,
        };
        self.callable.call(args)
    }

    /// Renders `name(arg, ..., key=value)` with long arguments abbreviated to their
    /// type name and the placeholder shown as `...`.
    pub fn describe(&self, config: &DisplayConfig) -> String {
        let mut parts: Vec<String> = self
            .binding
            .slots()
            .map(|slot| match slot {
                None => "...".to_string(),
                Some(value) => redact(value, config.max_arg_width),
            })
            .collect();
        parts.extend(
            self.kwargs
                .iter()
                .map(|(k, v)| format!("{}={}", k, redact(v, config.max_arg_width))),
        );
        format!("{}({})", self.name(), parts.join(", "))
    }
}

pub(crate) fn redact(value: &Value, max_width: usize) -> String {
    let rendered = value.to_string();
    if rendered.chars().count() > max_width {
        format!("<{}>", value.type_name())
    } else {
        rendered
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe(&DisplayConfig::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::binding::INPUT;
    use crate::kwargs;

    fn subtract() -> Callable {
        Callable::pure("subtract", |args| {
            Ok(Value::Float(args.arg(0)?.as_float()? - args.arg(1)?.as_float()?))
        })
    }

    #[test]
    fn test_apply_splices_input_into_placeholder() {
        let left = Atom::new(subtract(), vec![INPUT, Arg::from(1.0)], Kwargs::new()).unwrap();
        let right = Atom::new(subtract(), vec![Arg::from(1.0), INPUT], Kwargs::new()).unwrap();
        assert_eq!(left.apply(Value::Float(5.0)).unwrap(), Value::Float(4.0));
        assert_eq!(right.apply(Value::Float(5.0)).unwrap(), Value::Float(-4.0));
    }

    #[test]
    fn test_placeholder_count_is_validated_at_construction() {
        assert!(matches!(
            Atom::new(subtract(), vec![Arg::from(1.0), Arg::from(2.0)], Kwargs::new()),
            Err(ComposeError::Argument(_))
        ));
        assert!(matches!(
            Atom::new(subtract(), vec![INPUT, INPUT], Kwargs::new()),
            Err(ComposeError::Argument(_))
        ));
        let implicit = Atom::leading(subtract(), vec![Arg::from(1.0)], Kwargs::new()).unwrap();
        assert_eq!(implicit.apply(Value::Float(3.0)).unwrap(), Value::Float(2.0));
    }

    #[test]
    fn test_kwargs_reach_the_callable() {
        let scale = Callable::pure("scale", |args| {
            let factor = args.kwarg("factor").map_or(Ok(1.0), Value::as_float)?;
            Ok(Value::Float(args.arg(0)?.as_float()? * factor))
        });
        let atom = Atom::new(scale, vec![INPUT], kwargs! { "factor" => 3.0 }).unwrap();
        assert_eq!(atom.apply(Value::Float(2.0)).unwrap(), Value::Float(6.0));
    }

    #[test]
    fn test_callable_errors_propagate_unchanged() {
        let failing = Callable::pure("fail", |_| Err(ComposeError::Computation("boom".into())));
        let atom = Atom::unary(failing);
        match atom.apply(Value::None) {
            Err(ComposeError::Computation(msg)) => assert_eq!(msg, "boom"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_pure_atom_rejects_returned_state() {
        let leaky = Callable::new("leaky", |_| Ok(CallOutput::new(1i64).with_state("zi", 0i64)));
        assert!(matches!(
            Atom::unary(leaky).apply(Value::None),
            Err(ComposeError::StateShape { expected: 0, found: 1, .. })
        ));
    }

    #[test]
    fn test_display_redacts_long_arguments() {
        let long = Value::from(vec![0.1, 0.2, 0.3, 0.4]);
        let atom = Atom::new(
            subtract(),
            vec![Arg::from(long), INPUT],
            kwargs! { "dim" => "time" },
        )
        .unwrap();
        assert_eq!(atom.to_string(), "subtract(<list>, ..., dim=time)");
        assert_eq!(atom.clone().with_name("diff").to_string(), "diff(<list>, ..., dim=time)");

        let wide = DisplayConfig { max_arg_width: 80 };
        assert_eq!(
            atom.describe(&wide),
            "subtract([0.1, 0.2, 0.3, 0.4], ..., dim=time)"
        );
    }
}
