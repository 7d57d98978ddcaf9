//! This module defines the core, strongly-typed data representations used
//! throughout the atomflow pipeline.
//!
//! It currently includes the canonical `DType` enum describing the element type
//! of numeric payloads, which the checkpoint codec relies on for exact round trips.

pub mod dtype;

// Re-export the main type(s) for easier access.
pub use dtype::DType;
