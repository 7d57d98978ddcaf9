// In: src/checkpoint/mod.rs

//! Durable storage of state maps: the archive container, its on-disk format
//! description, and the codec between `StateMap` and archive bytes.

pub mod archive;
pub mod codec;
pub mod format;

pub use archive::{ArchiveInfo, StateArchive};
pub use codec::{decode, encode};
