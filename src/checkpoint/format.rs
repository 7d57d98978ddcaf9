// In: src/checkpoint/format.rs

//! Defines all on-disk structures and constants for the state checkpoint format.
//! This is the single source of truth for the archive header and the recursive
//! payload description that lets the codec rebuild every `Value` exactly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::StateCompression;
use crate::types::DType;

/// The magic number to identify a state archive.
pub const STATE_MAGIC: &[u8; 4] = b"AFST";
/// The current version of the state archive format.
pub const STATE_FORMAT_VERSION: u16 = 1;

/// Byte order of the raw numeric payloads.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Endianness {
    Little,
    Big,
}

impl Endianness {
    pub fn native() -> Self {
        if cfg!(target_endian = "little") {
            Endianness::Little
        } else {
            Endianness::Big
        }
    }
}

/// Discriminant of one node in a payload tree.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PayloadKind {
    /// A declared state that has not been initialized yet. Carries no bytes.
    Uninitialized,
    None,
    Bool,
    Int,
    Float,
    Str,
    List,
    Array,
    Data,
}

/// Describes one node of an encoded `Value`.
///
/// `byte_len` counts only this node's own bytes; `List` nodes own none and describe
/// their items through `children`, in order.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PayloadMeta {
    pub kind: PayloadKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dtype: Option<DType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shape: Vec<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dims: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub byte_len: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<PayloadMeta>,
}

impl PayloadMeta {
    pub fn leaf(kind: PayloadKind, byte_len: usize) -> Self {
        Self {
            kind,
            dtype: None,
            shape: Vec::new(),
            dims: Vec::new(),
            label: None,
            byte_len: byte_len as u64,
            children: Vec::new(),
        }
    }

    /// Total number of raw bytes of this node and all its descendants.
    pub fn total_bytes(&self) -> u64 {
        self.byte_len
            .saturating_add(self.children.iter().map(PayloadMeta::total_bytes).sum())
    }
}

/// One stored state: its key, its payload description and the size of its stream
/// in the archive body (after compression, if any).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct EntryHeader {
    pub key: String,
    pub payload: PayloadMeta,
    pub stream_len: u64,
}

/// The JSON header written after the fixed-size preamble.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ArchiveHeader {
    pub writer_version: String,
    pub created_at: DateTime<Utc>,
    pub endianness: Endianness,
    #[serde(default)]
    pub compression: StateCompression,
    /// Display name of the atom or sequence the archive was taken from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub entries: Vec<EntryHeader>,
}
