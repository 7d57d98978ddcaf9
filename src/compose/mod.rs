// In: src/compose/mod.rs

//! The composition core: atoms, stateful atoms, sequences and the adapter that
//! turns plain functions into pipeline nodes.

pub mod atom;
pub mod atomized;
pub mod binding;
pub mod callable;
pub mod sequence;
pub mod state;
pub mod state_atom;

pub use atom::Atom;
pub use atomized::{Atomized, Invocation};
pub use binding::{Arg, PlaceholderBinding, INPUT};
pub use callable::{CallArgs, CallOutput, Callable, Kwargs};
pub use sequence::{Node, Sequence};
pub use state::{State, StateMap, StateSpec, INIT_SENTINEL, RESERVED_STATE_NAME};
pub use state_atom::StateAtom;
