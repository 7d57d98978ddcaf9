// In: src/compose/state.rs

//! State values and the declared state-parameter map of a `StateAtom`.

use indexmap::IndexMap;

use crate::error::{ComposeError, Result};
use crate::value::Value;

/// The keyword that can never be used as a state-parameter name.
pub const RESERVED_STATE_NAME: &str = "state";

/// The string sentinel accepted as an initial value meaning "initialize me".
pub const INIT_SENTINEL: &str = "init";

//==================================================================================
// 1. State
//==================================================================================

/// The internal memory of one stateful computation.
///
/// A callable receiving `Uninitialized` must derive a fresh state from the input of
/// that call and return it alongside its output.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum State {
    #[default]
    Uninitialized,
    Value(Value),
}

impl State {
    /// Normalizes a caller-supplied initial value. The `"init"` sentinel maps to
    /// `Uninitialized`; anything else becomes a concrete payload.
    pub fn from_initial(value: Value) -> Self {
        match value {
            Value::Str(ref s) if s == INIT_SENTINEL => State::Uninitialized,
            other => State::Value(other),
        }
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self, State::Value(_))
    }

    pub fn payload(&self) -> Option<&Value> {
        match self {
            State::Uninitialized => None,
            State::Value(v) => Some(v),
        }
    }

    pub fn into_payload(self) -> Option<Value> {
        match self {
            State::Uninitialized => None,
            State::Value(v) => Some(v),
        }
    }
}

impl From<Value> for State {
    fn from(value: Value) -> Self {
        State::from_initial(value)
    }
}

//==================================================================================
// 2. StateSpec (what the caller asks for at construction time)
//==================================================================================

/// The `state` argument of `StateAtom` construction.
#[derive(Debug, Clone, PartialEq)]
pub enum StateSpec {
    /// A single state parameter, initially uninitialized.
    Name(String),
    /// Several state parameters, each initially uninitialized.
    Names(Vec<String>),
    /// Explicit initial values, in declaration order.
    Map(Vec<(String, State)>),
}

impl StateSpec {
    /// Validates the specification and produces the ordered state map.
    pub fn into_state_map(self) -> Result<StateMap> {
        let entries: Vec<(String, State)> = match self {
            StateSpec::Name(name) => vec![(name, State::Uninitialized)],
            StateSpec::Names(names) => names
                .into_iter()
                .map(|n| (n, State::Uninitialized))
                .collect(),
            StateSpec::Map(entries) => entries,
        };
        if entries.is_empty() {
            return Err(ComposeError::Argument(
                "A StateAtom must declare at least one state parameter".into(),
            ));
        }
        let mut map = IndexMap::with_capacity(entries.len());
        for (name, state) in entries {
            if name.is_empty() {
                return Err(ComposeError::Argument(
                    "State parameter names must not be empty".into(),
                ));
            }
            if name == RESERVED_STATE_NAME {
                return Err(ComposeError::Argument(format!(
                    "`{}` is a reserved word",
                    RESERVED_STATE_NAME
                )));
            }
            if map.insert(name.clone(), state).is_some() {
                return Err(ComposeError::Argument(format!(
                    "State parameter '{}' declared twice",
                    name
                )));
            }
        }
        Ok(StateMap(map))
    }
}

impl From<&str> for StateSpec {
    fn from(name: &str) -> Self {
        StateSpec::Name(name.to_string())
    }
}

impl From<String> for StateSpec {
    fn from(name: String) -> Self {
        StateSpec::Name(name)
    }
}

impl From<Vec<&str>> for StateSpec {
    fn from(names: Vec<&str>) -> Self {
        StateSpec::Names(names.into_iter().map(String::from).collect())
    }
}

impl<const N: usize> From<[&str; N]> for StateSpec {
    fn from(names: [&str; N]) -> Self {
        StateSpec::Names(names.iter().map(|n| n.to_string()).collect())
    }
}

impl From<Vec<(&str, State)>> for StateSpec {
    fn from(entries: Vec<(&str, State)>) -> Self {
        StateSpec::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        )
    }
}

impl From<Vec<(&str, Value)>> for StateSpec {
    fn from(entries: Vec<(&str, Value)>) -> Self {
        StateSpec::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), State::from_initial(v)))
                .collect(),
        )
    }
}

//==================================================================================
// 3. StateMap
//==================================================================================

/// Ordered mapping from state-parameter name to its current `State`.
///
/// The set of names is fixed once built; only the values change.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StateMap(IndexMap<String, State>);

impl StateMap {
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn get(&self, name: &str) -> Option<&State> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &State)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns `true` once every declared state holds a payload.
    pub fn is_initialized(&self) -> bool {
        self.0.values().all(State::is_initialized)
    }

    /// Returns `true` if both maps declare the same names in the same order.
    pub fn same_names(&self, other: &StateMap) -> bool {
        self.0.keys().eq(other.0.keys())
    }

    pub(crate) fn entries(&self) -> &IndexMap<String, State> {
        &self.0
    }

    pub(crate) fn into_entries(self) -> IndexMap<String, State> {
        self.0
    }

    pub(crate) fn from_entries(entries: IndexMap<String, State>) -> Self {
        StateMap(entries)
    }

    pub(crate) fn reset(&mut self) {
        for state in self.0.values_mut() {
            *state = State::Uninitialized;
        }
    }
}
