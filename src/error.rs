// In: src/error.rs

//! This module defines the single, unified error type for the entire atomflow library.
//! It uses the `thiserror` crate to provide ergonomic, context-aware error handling.
//!
//! The variants are grouped by the stage that raises them. Construction errors are
//! always raised before a pipeline runs; computation errors come from the wrapped
//! callables and are propagated untouched; persistence errors never mutate the
//! in-memory state of the atom that raised them.

use thiserror::Error;

/// Shorthand used across the crate.
pub type Result<T> = std::result::Result<T, ComposeError>;

#[derive(Error, Debug)]
pub enum ComposeError {
    // =========================================================================
    // === Construction Errors (raised when building Atoms and StateAtoms)
    // =========================================================================
    /// Malformed atom construction: wrong placeholder count, reserved or
    /// duplicated state names, empty state specification.
    #[error("Invalid argument: {0}")]
    Argument(String),

    // =========================================================================
    // === Computation Errors (raised by wrapped callables and kernels)
    // =========================================================================
    #[error("Computation failed: {0}")]
    Computation(String),

    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),

    // =========================================================================
    // === State Contract Errors (raised by StateAtom after the callable returns)
    // =========================================================================
    #[error("Stateful call to '{atom}' returned {found} state(s), expected {expected}")]
    StateShape {
        atom: String,
        expected: usize,
        found: usize,
    },

    #[error("Stateful call to '{atom}' returned undeclared or duplicate state '{name}'")]
    StateName { atom: String, name: String },

    // =========================================================================
    // === Persistence Errors
    // =========================================================================
    #[error("State serialization failed: {0}")]
    Serialization(String),

    /// An error originating from the underlying I/O subsystem.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An error from the Serde JSON library, used for archive headers and config.
    #[error("Serde JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    #[error("Zstd operation failed: {0}")]
    Zstd(String),

    /// An error from a safe byte-casting operation failing.
    #[error("Byte slice casting error: {0}")]
    PodCast(String), // bytemuck::PodCastError doesn't impl Error

    #[error("Buffer length mismatch: expected a multiple of {1}, got {0}")]
    BufferMismatch(usize, usize),

    // =========================================================================
    // === Configuration
    // =========================================================================
    #[error("Configuration error: {0}")]
    Config(String),
}

// =============================================================================
// === Manual `From` Implementations ===
// =============================================================================

impl From<bytemuck::PodCastError> for ComposeError {
    fn from(err: bytemuck::PodCastError) -> Self {
        ComposeError::PodCast(err.to_string())
    }
}

impl From<ndarray::ShapeError> for ComposeError {
    fn from(err: ndarray::ShapeError) -> Self {
        ComposeError::ShapeMismatch(err.to_string())
    }
}

impl ComposeError {
    /// Returns `true` for errors raised by the persistence layer.
    pub fn is_persistence(&self) -> bool {
        matches!(
            self,
            ComposeError::Serialization(_)
                | ComposeError::Io(_)
                | ComposeError::SerdeJson(_)
                | ComposeError::Zstd(_)
                | ComposeError::PodCast(_)
                | ComposeError::BufferMismatch(..)
        )
    }
}
