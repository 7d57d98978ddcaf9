//! This file is the root of the `atomflow` Rust crate.
//!
//! `atomflow` composes array-processing steps ("atoms") into pipelines that can run
//! over a whole dataset in one call or over successive chunks of it, with identical
//! results. Stateful atoms carry their internal state (filter delay lines,
//! decimation phase, ...) from one chunk to the next, and that state can be
//! checkpointed to bytes and restored in another process.
//!
//! Its responsibilities are strictly limited to:
//! 1.  Declaring all the top-level modules of the library so the compiler knows
//!     they exist.
//! 2.  Re-exporting the types most callers need.
//!
//! # Example
//! ```
//! use atomflow::compose::{Node, Sequence};
//! use atomflow::{signal, synthetics, DataArray, Value};
//!
//! let data = synthetics::generate(600, 4, 42).unwrap();
//! let mut pipeline = Sequence::new(vec![
//!     Node::from(signal::iir_filter(4, 10.0, "lowpass", 50.0, "time").unwrap()),
//!     Node::from(signal::down_sample(2, "time").unwrap()),
//! ]);
//!
//! let mut parts = Vec::new();
//! for chunk in data.chunk(6, "time").unwrap() {
//!     parts.push(pipeline.apply(Value::from(chunk)).unwrap().into_data().unwrap());
//! }
//! let chunked = DataArray::concatenate(&parts, "time").unwrap();
//!
//! pipeline.reset();
//! let monolithic = pipeline.apply(Value::from(data)).unwrap().into_data().unwrap();
//! assert_eq!(chunked, monolithic);
//! ```

//==================================================================================
// 0. Constants
//==================================================================================
/// The crate version, automatically set from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//==================================================================================
// 1. Module Declarations
//==================================================================================
#[doc(hidden)]
pub use log as __log;

#[macro_use]
pub mod observability; // Make macros available throughout the crate

pub mod checkpoint;
pub mod compose;
pub mod config;
pub mod data;
pub mod error;
pub mod kernels;
pub mod signal;
pub mod synthetics;
pub mod types;
pub mod value;

mod utils;

#[cfg(test)]
mod pipeline_tests;

//==================================================================================
// 2. Public API Re-exports
//==================================================================================
pub use compose::{
    Arg, Atom, Atomized, CallArgs, CallOutput, Callable, Invocation, Kwargs, Node, Sequence,
    State, StateAtom, StateSpec, INPUT,
};
pub use config::AtomflowConfig;
pub use data::DataArray;
pub use error::{ComposeError, Result};
pub use value::{NdArray, Value};
