// In: src/compose/state_atom.rs

//! An atom that threads named state across successive invocations.
//!
//! The state map is the only mutable part of a `StateAtom`. It changes through
//! exactly three operations: `apply`, `reset` and `load_state`. Each of them either
//! commits a complete, validated replacement of the map or leaves it untouched.

use indexmap::IndexMap;
use log::{debug, trace, warn};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

use crate::checkpoint::codec;
use crate::compose::atom::Atom;
use crate::compose::binding::{Arg, PlaceholderBinding};
use crate::compose::callable::{Callable, Kwargs};
use crate::compose::state::{State, StateMap, StateSpec, RESERVED_STATE_NAME};
use crate::config::{CheckpointConfig, DisplayConfig};
use crate::error::{ComposeError, Result};
use crate::utils;
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct StateAtom {
    atom: Atom,
    states: StateMap,
}

impl StateAtom {
    //==============================================================================
    // 1. Construction
    //==============================================================================

    /// Binds `callable` like `Atom::new` and declares its state parameters.
    ///
    /// # Errors
    /// `ComposeError::Argument` if the placeholder count is not exactly one, if the
    /// state specification is empty, duplicated or uses the reserved name `state`,
    /// or if a state name is also passed as an ordinary keyword argument.
    pub fn new(
        callable: Callable,
        args: Vec<Arg>,
        kwargs: Kwargs,
        state: impl Into<StateSpec>,
    ) -> Result<Self> {
        let binding = PlaceholderBinding::from_args(args)?;
        Self::from_parts(callable, binding, kwargs, state.into())
    }

    /// A stateful atom feeding the runtime input as the only positional argument.
    pub fn unary(callable: Callable, state: impl Into<StateSpec>) -> Result<Self> {
        Self::from_parts(
            callable,
            PlaceholderBinding::unary(),
            Kwargs::new(),
            state.into(),
        )
    }

    /// Like `new`, but binds the input to the first slot when `args` carries no
    /// placeholder.
    pub fn leading(
        callable: Callable,
        args: Vec<Arg>,
        kwargs: Kwargs,
        state: impl Into<StateSpec>,
    ) -> Result<Self> {
        let binding = PlaceholderBinding::leading(args)?;
        Self::from_parts(callable, binding, kwargs, state.into())
    }

    pub(crate) fn from_parts(
        callable: Callable,
        binding: PlaceholderBinding,
        kwargs: Kwargs,
        spec: StateSpec,
    ) -> Result<Self> {
        if kwargs.contains_key(RESERVED_STATE_NAME) {
            return Err(ComposeError::Argument(format!(
                "`{}` is a reserved word",
                RESERVED_STATE_NAME
            )));
        }
        let states = spec.into_state_map()?;
        if let Some(clash) = states.names().find(|n| kwargs.contains_key(*n)) {
            return Err(ComposeError::Argument(format!(
                "State parameter '{}' is also given as a keyword argument",
                clash
            )));
        }
        Ok(Self {
            atom: Atom::from_binding(callable, binding, kwargs),
            states,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.atom = self.atom.with_name(name);
        self
    }

    //==============================================================================
    // 2. Accessors
    //==============================================================================

    pub fn name(&self) -> &str {
        self.atom.name()
    }

    /// The stateless part: callable, binding and keyword arguments.
    pub fn atom(&self) -> &Atom {
        &self.atom
    }

    pub fn states(&self) -> &StateMap {
        &self.states
    }

    pub fn state(&self, name: &str) -> Option<&State> {
        self.states.get(name)
    }

    //==============================================================================
    // 3. Execution
    //==============================================================================

    /// Applies the callable to `input` with the current states attached, then
    /// replaces every declared state with the value returned under its name.
    ///
    /// If the callable fails, or returns a state set that does not match the
    /// declaration, the error is returned and no state is modified.
    pub fn apply(&mut self, input: Value) -> Result<Value> {
        trace!(
            "Applying stateful atom '{}' (initialized: {})",
            self.name(),
            self.states.is_initialized()
        );
        let output = self.atom.invoke(input, self.states.entries().clone())?;
        let next = self.bind_returned(output.states)?;
        self.states = next;
        log_metric!("event" = "apply", "atom" = self.name(), "states" = self.states.len());
        Ok(output.value)
    }

    /// Matches returned states to declared names. The result keeps declaration
    /// order.
    fn bind_returned(&self, returned: Vec<(String, Value)>) -> Result<StateMap> {
        let declared = self.states.entries();
        if returned.len() != declared.len() {
            return Err(ComposeError::StateShape {
                atom: self.name().to_string(),
                expected: declared.len(),
                found: returned.len(),
            });
        }
        let mut slots: Vec<Option<Value>> = declared.keys().map(|_| None).collect();
        for (name, value) in returned {
            let slot = declared
                .get_index_of(&name)
                .map(|i| &mut slots[i])
                .filter(|slot| slot.is_none())
                .ok_or_else(|| ComposeError::StateName {
                    atom: self.name().to_string(),
                    name: name.clone(),
                })?;
            *slot = Some(value);
        }
        // Counts match and no name repeats, so every slot is filled.
        let next = declared
            .keys()
            .zip(slots)
            .map(|(name, slot)| {
                let value = slot.ok_or_else(|| ComposeError::StateName {
                    atom: self.name().to_string(),
                    name: name.clone(),
                })?;
                Ok((name.clone(), State::Value(value)))
            })
            .collect::<Result<IndexMap<String, State>>>()?;
        Ok(StateMap::from_entries(next))
    }

    /// Discards accumulated state; the next `apply` behaves like a first call.
    pub fn reset(&mut self) {
        debug!("Resetting state of '{}'", self.name());
        self.states.reset();
    }

    //==============================================================================
    // 4. Persistence
    //==============================================================================

    /// Serializes the state map with the given configuration.
    pub fn export_state(&self, config: &CheckpointConfig) -> Result<Vec<u8>> {
        let entries: Vec<(String, &State)> = self
            .states
            .iter()
            .map(|(name, state)| (name.to_string(), state))
            .collect();
        codec::encode_entries(&entries, Some(self.name()), config)
    }

    /// Replaces the state map with the one encoded in `bytes`.
    ///
    /// Nothing is modified unless the archive decodes cleanly and matches the
    /// declared state names.
    pub fn import_state(&mut self, bytes: &[u8], config: &CheckpointConfig) -> Result<()> {
        let loaded = codec::decode_entries(bytes)?;
        let next = self.prepare_load(loaded, config.verify_names)?;
        self.commit_loaded(next);
        Ok(())
    }

    /// Writes the state map to `destination` using the default configuration.
    pub fn save_state<W: Write>(&self, destination: W) -> Result<()> {
        self.save_state_with(destination, &CheckpointConfig::default())
    }

    pub fn save_state_with<W: Write>(
        &self,
        mut destination: W,
        config: &CheckpointConfig,
    ) -> Result<()> {
        let bytes = self.export_state(config)?;
        destination.write_all(&bytes)?;
        destination.flush()?;
        debug!("Saved {} state(s) of '{}' ({} bytes)", self.states.len(), self.name(), bytes.len());
        Ok(())
    }

    /// Restores the state map from `source` using the default configuration.
    pub fn load_state<R: Read>(&mut self, source: R) -> Result<()> {
        self.load_state_with(source, &CheckpointConfig::default())
    }

    pub fn load_state_with<R: Read>(&mut self, mut source: R, config: &CheckpointConfig) -> Result<()> {
        let mut bytes = Vec::new();
        source.read_to_end(&mut bytes)?;
        self.import_state(&bytes, config)?;
        debug!("Loaded {} state(s) into '{}'", self.states.len(), self.name());
        Ok(())
    }

    /// Writes a checkpoint file. An existing file at `path` is only replaced once
    /// the new checkpoint has been written in full.
    pub fn save_state_file<P: AsRef<Path>>(&self, path: P, config: &CheckpointConfig) -> Result<()> {
        let bytes = self.export_state(config)?;
        utils::replace_file(path.as_ref(), &bytes)?;
        debug!("Saved {} state(s) of '{}' to {}", self.states.len(), self.name(), path.as_ref().display());
        Ok(())
    }

    pub fn load_state_file<P: AsRef<Path>>(&mut self, path: P, config: &CheckpointConfig) -> Result<()> {
        let file = File::open(path)?;
        self.load_state_with(BufReader::new(file), config)
    }

    /// Validates a decoded archive against the declared names without mutating.
    ///
    /// With `verify_names`, the archive must hold exactly the declared names, in
    /// any order. Without it, entries are bound by position.
    pub(crate) fn prepare_load(
        &self,
        mut loaded: IndexMap<String, State>,
        verify_names: bool,
    ) -> Result<StateMap> {
        if loaded.len() != self.states.len() {
            warn!(
                "Rejected checkpoint for '{}': {} state(s) stored, {} declared",
                self.name(),
                loaded.len(),
                self.states.len()
            );
            return Err(ComposeError::Serialization(format!(
                "Checkpoint holds {} state(s), '{}' declares {}",
                loaded.len(),
                self.name(),
                self.states.len()
            )));
        }

        let mut next = self.states.entries().clone();
        if verify_names {
            for (name, slot) in next.iter_mut() {
                *slot = loaded.shift_remove(name).ok_or_else(|| {
                    warn!("Rejected checkpoint for '{}': missing state '{}'", self.name(), name);
                    ComposeError::Serialization(format!(
                        "Checkpoint for '{}' has no state named '{}'",
                        self.name(),
                        name
                    ))
                })?;
            }
        } else {
            for (slot, (_, state)) in next.values_mut().zip(loaded) {
                *slot = state;
            }
        }
        Ok(StateMap::from_entries(next))
    }

    pub(crate) fn commit_loaded(&mut self, states: StateMap) {
        self.states = states;
    }

    pub fn describe(&self, config: &DisplayConfig) -> String {
        format!("{}  [stateful]", self.atom.describe(config))
    }
}

impl fmt::Display for StateAtom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe(&DisplayConfig::default()))
    }
}

//==================================================================================
// Unit Tests
//==================================================================================
