//! This module serves as the collection of pure numeric kernels that the signal
//! atoms wrap, plus the compression kernel used by the checkpoint codec.
//!
//! Kernels operate on plain `ndarray` arrays and an axis index. Stateful kernels
//! take their previous state as an explicit argument and return the next one; they
//! know nothing about atoms, names or labeled dimensions.

//==================================================================================
// 1. Module Declarations
//==================================================================================

/// Recursive filters
pub mod iir;
pub mod lfilter;

/// Sampling-rate changes
pub mod resample;

/// Elementwise maps and reductions
pub mod elementwise;

/// Checkpoint stream compression
pub mod zstd;
