// In: src/compose/atomized.rs

//! Lets one function serve both as an eager computation and as a pipeline node.
//!
//! How a call is dispatched depends only on two explicit facts: whether the
//! argument list contains a placeholder and whether a state specification was
//! passed.
//!
//! | placeholder | state    | result                |
//! |-------------|----------|-----------------------|
//! | no          | any      | `Invocation::Plain`   |
//! | yes         | `None`   | `Invocation::Atom`    |
//! | yes         | `Some`   | `Invocation::Stateful`|
//!
//! An eager call with a state specification hands the initial states to the
//! function, and whatever states it returns come back in the `CallOutput`.

use crate::compose::atom::Atom;
use crate::compose::binding::{Arg, PlaceholderBinding};
use crate::compose::callable::{CallArgs, CallOutput, Callable, Kwargs};
use crate::compose::sequence::Node;
use crate::compose::state::StateSpec;
use crate::compose::state_atom::StateAtom;
use crate::error::{ComposeError, Result};
use crate::value::Value;

/// The outcome of calling an `Atomized` function.
#[derive(Debug, Clone)]
pub enum Invocation {
    /// The function ran immediately.
    Plain(CallOutput),
    Atom(Atom),
    Stateful(StateAtom),
}

impl Invocation {
    /// The eager result. Fails if the call produced a deferred node.
    pub fn into_value(self) -> Result<Value> {
        match self {
            Invocation::Plain(output) => Ok(output.value),
            other => Err(ComposeError::Argument(format!(
                "Expected an eager result, the call produced a {} node",
                other.kind()
            ))),
        }
    }

    pub fn into_atom(self) -> Result<Atom> {
        match self {
            Invocation::Atom(atom) => Ok(atom),
            other => Err(ComposeError::Argument(format!(
                "Expected an atom, the call produced {}",
                other.kind()
            ))),
        }
    }

    pub fn into_state_atom(self) -> Result<StateAtom> {
        match self {
            Invocation::Stateful(atom) => Ok(atom),
            other => Err(ComposeError::Argument(format!(
                "Expected a stateful atom, the call produced {}",
                other.kind()
            ))),
        }
    }

    /// Converts a deferred call into a sequence member.
    pub fn into_node(self) -> Result<Node> {
        match self {
            Invocation::Atom(atom) => Ok(Node::Atom(atom)),
            Invocation::Stateful(atom) => Ok(Node::Stateful(atom)),
            Invocation::Plain(_) => Err(ComposeError::Argument(
                "An eager result cannot be used as a sequence member".into(),
            )),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Invocation::Plain(_) => "plain result",
            Invocation::Atom(_) => "atom",
            Invocation::Stateful(_) => "stateful atom",
        }
    }
}

/// A callable that decides at each call whether to run or to build a node.
#[derive(Debug, Clone)]
pub struct Atomized {
    callable: Callable,
}

impl Atomized {
    pub fn new(callable: Callable) -> Self {
        Self { callable }
    }

    pub fn callable(&self) -> &Callable {
        &self.callable
    }

    pub fn name(&self) -> &str {
        self.callable.name()
    }

    /// Dispatches one call; see the module table.
    ///
    /// # Errors
    /// Construction errors of `Atom` and `StateAtom` (more than one placeholder,
    /// malformed state specification) and, for eager calls, whatever the wrapped
    /// function returns.
    pub fn call(
        &self,
        args: Vec<Arg>,
        kwargs: Kwargs,
        state: Option<StateSpec>,
    ) -> Result<Invocation> {
        if !args.iter().any(Arg::is_placeholder) {
            let values = args
                .into_iter()
                .map(|arg| match arg {
                    Arg::Value(v) => v,
                    Arg::Placeholder => Value::None,
                })
                .collect();
            let mut call_args = CallArgs::new(values, kwargs);
            if let Some(spec) = state {
                call_args.states = spec.into_state_map()?.into_entries();
            }
            let output = self.callable.call(call_args)?;
            return Ok(Invocation::Plain(output));
        }

        let binding = PlaceholderBinding::from_args(args)?;
        match state {
            None => Ok(Invocation::Atom(Atom::from_binding(
                self.callable.clone(),
                binding,
                kwargs,
            ))),
            Some(spec) => Ok(Invocation::Stateful(StateAtom::from_parts(
                self.callable.clone(),
                binding,
                kwargs,
                spec,
            )?)),
        }
    }

    /// Eager call returning the plain value.
    pub fn eval(&self, args: Vec<Arg>, kwargs: Kwargs) -> Result<Value> {
        self.call(args, kwargs, None)?.into_value()
    }

    /// Deferred call returning a pure atom.
    pub fn atom(&self, args: Vec<Arg>, kwargs: Kwargs) -> Result<Atom> {
        self.call(args, kwargs, None)?.into_atom()
    }

    /// Deferred call returning a stateful atom.
    pub fn stateful(
        &self,
        args: Vec<Arg>,
        kwargs: Kwargs,
        state: impl Into<StateSpec>,
    ) -> Result<StateAtom> {
        self.call(args, kwargs, Some(state.into()))?.into_state_atom()
    }
}

impl From<Callable> for Atomized {
    fn from(callable: Callable) -> Self {
        Atomized::new(callable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::binding::INPUT;
    use crate::compose::state::State;
    use crate::kwargs;

    /// `x * factor`, optionally accumulating a running count of calls in `calls`.
    fn scaled() -> Atomized {
        Atomized::new(Callable::new("scaled", |args: CallArgs| {
            let x = args.arg(0)?.as_float()?;
            let factor = args.param("factor", 1)?.as_float()?;
            let mut output = CallOutput::new(x * factor);
            if let Some(state) = args.state("calls") {
                let calls = match state {
                    State::Value(v) => v.as_int()?,
                    State::Uninitialized => 0,
                };
                output = output.with_state("calls", calls + 1);
            }
            Ok(output)
        }))
    }

    #[test]
    fn test_no_placeholder_runs_eagerly() {
        let f = scaled();
        let out = f
            .call(vec![Arg::from(2.0), Arg::from(3.0)], Kwargs::new(), None)
            .unwrap();
        assert!(matches!(out, Invocation::Plain(_)));
        assert_eq!(out.into_value().unwrap(), Value::Float(6.0));
    }

    #[test]
    fn test_placeholder_without_state_builds_atom() {
        let atom = scaled()
            .call(vec![INPUT], kwargs! { "factor" => 4.0 }, None)
            .unwrap()
            .into_atom()
            .unwrap();
        assert_eq!(atom.apply(Value::Float(0.5)).unwrap(), Value::Float(2.0));
    }

    #[test]
    fn test_placeholder_with_state_builds_state_atom() {
        let mut atom = scaled()
            .stateful(vec![INPUT, Arg::from(2.0)], Kwargs::new(), "calls")
            .unwrap();
        atom.apply(Value::Float(1.0)).unwrap();
        atom.apply(Value::Float(1.0)).unwrap();
        assert_eq!(atom.state("calls"), Some(&State::Value(Value::Int(2))));
    }

    #[test]
    fn test_invalid_calls_are_rejected() {
        let f = scaled();
        assert!(matches!(
            f.call(vec![INPUT, INPUT], Kwargs::new(), None),
            Err(ComposeError::Argument(_))
        ));
        assert!(matches!(
            f.call(vec![INPUT], Kwargs::new(), Some(StateSpec::from("state"))),
            Err(ComposeError::Argument(_))
        ));
        // A plain result cannot become a pipeline member.
        let eager = f.call(vec![Arg::from(1.0), Arg::from(1.0)], Kwargs::new(), None).unwrap();
        assert!(eager.into_node().is_err());
    }

    #[test]
    fn test_eager_call_passes_initial_state_through() {
        let out = scaled()
            .call(
                vec![Arg::from(1.0), Arg::from(2.0)],
                Kwargs::new(),
                Some(StateSpec::from(vec![("calls", Value::Int(10))])),
            )
            .unwrap();
        match out {
            Invocation::Plain(output) => {
                assert_eq!(output.value, Value::Float(2.0));
                assert_eq!(output.states, vec![("calls".to_string(), Value::Int(11))]);
            }
            other => panic!("expected an eager result, got {:?}", other),
        }

        let fresh = scaled()
            .call(vec![Arg::from(1.0), Arg::from(2.0)], Kwargs::new(), Some("calls".into()))
            .unwrap();
        let Invocation::Plain(output) = fresh else { panic!("expected an eager result") };
        assert_eq!(output.states, vec![("calls".to_string(), Value::Int(1))]);

        assert!(matches!(
            scaled().call(vec![Arg::from(1.0)], Kwargs::new(), Some("state".into())),
            Err(ComposeError::Argument(_))
        ));
    }

    #[test]
    fn test_eager_errors_come_from_the_function() {
        let f = scaled();
        assert!(matches!(
            f.eval(vec![Arg::from(1.0)], Kwargs::new()),
            Err(ComposeError::Computation(_))
        ));
    }
}
