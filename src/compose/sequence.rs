// In: src/compose/sequence.rs

//! Ordered composition of atoms, stateful atoms and nested sequences.
//!
//! A sequence folds its input through every member in order. It owns its members,
//! so nesting always forms a tree. Stateful members are addressed by their index
//! path (`"1.0"` is the first member of the sequence at index 1), which is also the
//! key prefix used when the whole tree is checkpointed into one archive.

use indexmap::IndexMap;
use log::{debug, trace, warn};
use std::fmt;
use std::io::{Read, Write};

use crate::checkpoint::codec;
use crate::compose::atom::Atom;
use crate::compose::callable::Callable;
use crate::compose::state::State;
use crate::compose::state_atom::StateAtom;
use crate::config::{CheckpointConfig, DisplayConfig};
use crate::error::{ComposeError, Result};
use crate::value::Value;

const DEFAULT_SEQUENCE_NAME: &str = "sequence";

//==================================================================================
// 1. Node
//==================================================================================

/// One member of a `Sequence`.
#[derive(Debug, Clone)]
pub enum Node {
    Atom(Atom),
    Stateful(StateAtom),
    Sequence(Sequence),
}

impl Node {
    pub fn apply(&mut self, input: Value) -> Result<Value> {
        match self {
            Node::Atom(atom) => atom.apply(input),
            Node::Stateful(atom) => atom.apply(input),
            Node::Sequence(seq) => seq.apply(input),
        }
    }

    pub fn reset(&mut self) {
        match self {
            Node::Atom(_) => {}
            Node::Stateful(atom) => atom.reset(),
            Node::Sequence(seq) => seq.reset(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Node::Atom(atom) => atom.name(),
            Node::Stateful(atom) => atom.name(),
            Node::Sequence(seq) => seq.name(),
        }
    }
}

impl From<Atom> for Node {
    fn from(atom: Atom) -> Self {
        Node::Atom(atom)
    }
}

impl From<StateAtom> for Node {
    fn from(atom: StateAtom) -> Self {
        Node::Stateful(atom)
    }
}

impl From<Sequence> for Node {
    fn from(seq: Sequence) -> Self {
        Node::Sequence(seq)
    }
}

/// A bare callable becomes a single-input atom.
impl From<Callable> for Node {
    fn from(callable: Callable) -> Self {
        Node::Atom(Atom::unary(callable))
    }
}

//==================================================================================
// 2. Sequence
//==================================================================================

#[derive(Debug, Clone, Default)]
pub struct Sequence {
    nodes: Vec<Node>,
    name: Option<String>,
}

impl Sequence {
    pub fn new<I, N>(nodes: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<Node>,
    {
        Self {
            nodes: nodes.into_iter().map(Into::into).collect(),
            name: None,
        }
    }

    pub fn named<I, N>(name: impl Into<String>, nodes: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<Node>,
    {
        Self {
            name: Some(name.into()),
            ..Self::new(nodes)
        }
    }

    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(DEFAULT_SEQUENCE_NAME)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Node> {
        self.nodes.iter()
    }

    pub fn get(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    /// Mutable access to a member, e.g. to checkpoint a single stateful atom.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Node> {
        self.nodes.get_mut(index)
    }

    /// Threads `input` through every member in order. The first failing member
    /// aborts the call; members before it keep whatever state they committed.
    pub fn apply(&mut self, input: Value) -> Result<Value> {
        let name = self.name.as_deref().unwrap_or(DEFAULT_SEQUENCE_NAME);
        let mut value = input;
        for (i, node) in self.nodes.iter_mut().enumerate() {
            trace!("{}[{}]: applying '{}'", name, i, node.name());
            value = node.apply(value)?;
        }
        Ok(value)
    }

    /// Resets every stateful atom in the tree.
    pub fn reset(&mut self) {
        debug!("Resetting sequence '{}'", self.name());
        for node in &mut self.nodes {
            node.reset();
        }
    }

    //==============================================================================
    // 3. Checkpointing
    //==============================================================================

    /// Every stateful atom in the tree with its index path, depth first.
    pub fn stateful_atoms(&self) -> Vec<(String, &StateAtom)> {
        let mut out = Vec::new();
        self.collect_stateful("", &mut out);
        out
    }

    fn collect_stateful<'a>(&'a self, prefix: &str, out: &mut Vec<(String, &'a StateAtom)>) {
        for (i, node) in self.nodes.iter().enumerate() {
            let path = if prefix.is_empty() {
                i.to_string()
            } else {
                format!("{}.{}", prefix, i)
            };
            match node {
                Node::Atom(_) => {}
                Node::Stateful(atom) => out.push((path, atom)),
                Node::Sequence(seq) => seq.collect_stateful(&path, out),
            }
        }
    }

    fn collect_stateful_mut<'a>(&'a mut self, out: &mut Vec<&'a mut StateAtom>) {
        for node in &mut self.nodes {
            match node {
                Node::Atom(_) => {}
                Node::Stateful(atom) => out.push(atom),
                Node::Sequence(seq) => seq.collect_stateful_mut(out),
            }
        }
    }

    pub fn export_state(&self, config: &CheckpointConfig) -> Result<Vec<u8>> {
        let mut entries: Vec<(String, &State)> = Vec::new();
        for (path, atom) in self.stateful_atoms() {
            for (name, state) in atom.states().iter() {
                entries.push((format!("{}/{}", path, name), state));
            }
        }
        codec::encode_entries(&entries, Some(self.name()), config)
    }

    /// Restores every stateful atom from one archive.
    ///
    /// All entries are matched and validated before any atom is touched, so a
    /// rejected archive leaves the whole tree as it was.
    pub fn import_state(&mut self, bytes: &[u8], config: &CheckpointConfig) -> Result<()> {
        let mut loaded = codec::decode_entries(bytes)?;

        let mut prepared = Vec::new();
        for (path, atom) in self.stateful_atoms() {
            let prefix = format!("{}/", path);
            let keys: Vec<String> = loaded
                .keys()
                .filter(|k| k.starts_with(&prefix))
                .cloned()
                .collect();
            let mut own = IndexMap::with_capacity(keys.len());
            for key in keys {
                if let Some(state) = loaded.shift_remove(&key) {
                    own.insert(key[prefix.len()..].to_string(), state);
                }
            }
            prepared.push(atom.prepare_load(own, config.verify_names)?);
        }
        if let Some(extra) = loaded.keys().next() {
            warn!("Rejected checkpoint for '{}': unexpected entry '{}'", self.name(), extra);
            return Err(ComposeError::Serialization(format!(
                "Checkpoint entry '{}' matches no stateful atom of '{}'",
                extra,
                self.name()
            )));
        }

        let mut atoms = Vec::new();
        self.collect_stateful_mut(&mut atoms);
        for (atom, states) in atoms.into_iter().zip(prepared) {
            atom.commit_loaded(states);
        }
        Ok(())
    }

    pub fn save_state<W: Write>(&self, destination: W) -> Result<()> {
        self.save_state_with(destination, &CheckpointConfig::default())
    }

    pub fn save_state_with<W: Write>(&self, mut destination: W, config: &CheckpointConfig) -> Result<()> {
        let bytes = self.export_state(config)?;
        destination.write_all(&bytes)?;
        destination.flush()?;
        debug!("Saved state of sequence '{}' ({} bytes)", self.name(), bytes.len());
        Ok(())
    }

    pub fn load_state<R: Read>(&mut self, source: R) -> Result<()> {
        self.load_state_with(source, &CheckpointConfig::default())
    }

    pub fn load_state_with<R: Read>(&mut self, mut source: R, config: &CheckpointConfig) -> Result<()> {
        let mut bytes = Vec::new();
        source.read_to_end(&mut bytes)?;
        self.import_state(&bytes, config)?;
        debug!("Loaded state of sequence '{}'", self.name());
        Ok(())
    }

    //==============================================================================
    // 4. Display
    //==============================================================================

    /// Renders one member per line, nested sequences indented below their index.
    pub fn describe(&self, config: &DisplayConfig) -> String {
        let width = self.nodes.len().to_string().len();
        let mut chars = self.name().chars();
        let title: String = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        };
        let mut out = format!("{}:\n", title);
        for (i, node) in self.nodes.iter().enumerate() {
            let label = format!("  {:>width$}: ", i, width = width);
            match node {
                Node::Atom(atom) => out.push_str(&format!("{}{}\n", label, atom.describe(config))),
                Node::Stateful(atom) => {
                    out.push_str(&format!("{}{}\n", label, atom.describe(config)))
                }
                Node::Sequence(seq) => {
                    out.push_str(label.trim_end());
                    out.push('\n');
                    for line in seq.describe(config).lines() {
                        out.push_str(&format!("    {}\n", line));
                    }
                }
            }
        }
        out
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe(&DisplayConfig::default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::callable::{CallArgs, CallOutput};

    fn add(k: f64) -> Callable {
        Callable::unary("add", move |v| Ok(Value::Float(v.as_float()? + k)))
    }

    fn double() -> Callable {
        Callable::unary("double", |v| Ok(Value::Float(v.as_float()? * 2.0)))
    }

    fn cumsum(name: &str) -> StateAtom {
        let callable = Callable::new("cumsum", |args: CallArgs| {
            let x = args.arg(0)?.as_float()?;
            let total = match args.state("total") {
                Some(State::Value(v)) => v.as_float()?,
                _ => 0.0,
            };
            Ok(CallOutput::new(total + x).with_state("total", total + x))
        });
        StateAtom::unary(callable, "total").unwrap().with_name(name)
    }

    fn nested() -> Sequence {
        Sequence::new(vec![
            Node::from(add(1.0)),
            Node::from(cumsum("outer")),
            Node::from(Sequence::named("inner", vec![Node::from(double()), Node::from(cumsum("inner"))])),
        ])
    }

    #[test]
    fn test_members_apply_left_to_right() {
        let mut seq = Sequence::new(vec![add(1.0), double()]);
        assert_eq!(seq.apply(Value::Float(3.0)).unwrap(), Value::Float(8.0));
        let mut reversed = Sequence::new(vec![double(), add(1.0)]);
        assert_eq!(reversed.apply(Value::Float(3.0)).unwrap(), Value::Float(7.0));
    }

    #[test]
    fn test_empty_sequence_is_identity() {
        let mut seq = Sequence::default();
        assert!(seq.is_empty());
        assert_eq!(seq.apply(Value::Int(5)).unwrap(), Value::Int(5));
    }

    #[test]
    fn test_stateful_members_are_addressed_by_path() {
        let seq = nested();
        let paths: Vec<String> = seq.stateful_atoms().into_iter().map(|(p, _)| p).collect();
        assert_eq!(paths, vec!["1".to_string(), "2.1".to_string()]);
    }

    #[test]
    fn test_reset_recurses_into_nested_sequences() {
        let mut seq = nested();
        let first = seq.apply(Value::Float(1.0)).unwrap();
        assert_ne!(seq.apply(Value::Float(1.0)).unwrap(), first);
        seq.reset();
        assert!(seq
            .stateful_atoms()
            .iter()
            .all(|(_, a)| !a.states().is_initialized()));
        assert_eq!(seq.apply(Value::Float(1.0)).unwrap(), first);
    }

    #[test]
    fn test_error_aborts_and_propagates() {
        let fail = Callable::unary("fail", |_| Err(ComposeError::Computation("bad chunk".into())));
        let mut seq = Sequence::new(vec![Node::from(cumsum("acc")), Node::from(fail)]);
        assert!(matches!(
            seq.apply(Value::Float(1.0)),
            Err(ComposeError::Computation(_))
        ));
    }

    #[test]
    fn test_tree_checkpoint_roundtrip() {
        let mut original = nested();
        original.apply(Value::Float(1.0)).unwrap();
        original.apply(Value::Float(2.0)).unwrap();
        let mut bytes = Vec::new();
        original.save_state(&mut bytes).unwrap();

        let mut resumed = nested();
        resumed.load_state(bytes.as_slice()).unwrap();
        assert_eq!(
            resumed.apply(Value::Float(3.0)).unwrap(),
            original.apply(Value::Float(3.0)).unwrap()
        );
    }

    #[test]
    fn test_tree_checkpoint_is_atomic() {
        let mut source = nested();
        source.apply(Value::Float(1.0)).unwrap();
        let bytes = source.export_state(&CheckpointConfig::default()).unwrap();

        // Same leading stateful atom, but the nested one is missing.
        let mut target = Sequence::new(vec![
            Node::from(add(1.0)),
            Node::from(cumsum("outer")),
        ]);
        assert!(target.import_state(&bytes, &CheckpointConfig::default()).is_err());
        assert!(!target.stateful_atoms()[0].1.states().is_initialized());
    }

    #[test]
    fn test_display_renders_nested_structure() {
        let seq = Sequence::named(
            "pipeline",
            vec![
                Node::from(double()),
                Node::from(Sequence::new(vec![add(1.0)])),
            ],
        );
        let expected = "Pipeline:\n  0: double(...)\n  1:\n    Sequence:\n      0: add(...)\n";
        assert_eq!(seq.to_string(), expected);
    }
}
