//! Defines the self-describing on-disk container for a state checkpoint.
//! This module is the single source of truth for serialization, deserialization,
//! and efficient metadata peeking of the archive.
//!
//! Layout:
//! ```text
//! magic "AFST" (4) | version u16 LE (2) | header_len u32 LE (4) | header JSON | streams...
//! ```
//! Streams follow the header in the same order as `ArchiveHeader::entries`.

use crate::checkpoint::format::{ArchiveHeader, STATE_FORMAT_VERSION, STATE_MAGIC};
use crate::error::{ComposeError, Result};

//==================================================================================
// Format Constants
//==================================================================================
/// The size of the fixed preamble: magic(4) + ver(2) + header_len(4).
const PREAMBLE_SIZE: usize = 10;
/// A reasonable limit to prevent OOM from malformed header lengths. (16MB)
const MAX_HEADER_LEN: usize = 16 * 1024 * 1024;

//==================================================================================
// Public Structs
//==================================================================================

/// The metadata extracted from an archive's header by `peek_info`, without
/// touching the payload streams.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveInfo {
    pub format_version: u16,
    pub header: ArchiveHeader,
    /// Size of the preamble plus the JSON header, in bytes.
    pub header_size: usize,
    /// Total size of all payload streams, in bytes.
    pub data_size: usize,
}

/// A fully materialized archive: the header plus one byte stream per entry.
#[derive(Debug, Clone, PartialEq)]
pub struct StateArchive {
    pub header: ArchiveHeader,
    pub streams: Vec<Vec<u8>>,
}

//==================================================================================
// Core Implementation
//==================================================================================

impl StateArchive {
    /// Serializes the archive into its canonical byte form.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        if self.streams.len() != self.header.entries.len() {
            return Err(ComposeError::Serialization(format!(
                "Archive has {} header entries but {} streams",
                self.header.entries.len(),
                self.streams.len()
            )));
        }
        for (entry, stream) in self.header.entries.iter().zip(&self.streams) {
            if entry.stream_len != stream.len() as u64 {
                return Err(ComposeError::Serialization(format!(
                    "Entry '{}' declares {} stream bytes but holds {}",
                    entry.key,
                    entry.stream_len,
                    stream.len()
                )));
            }
        }

        let header_json = serde_json::to_vec(&self.header)?;
        if header_json.len() > MAX_HEADER_LEN {
            return Err(ComposeError::Serialization(format!(
                "Header length ({}) exceeds maximum allowed size ({})",
                header_json.len(),
                MAX_HEADER_LEN
            )));
        }

        let data_size: usize = self.streams.iter().map(Vec::len).sum();
        let mut buf = Vec::with_capacity(PREAMBLE_SIZE + header_json.len() + data_size);
        buf.extend_from_slice(STATE_MAGIC);
        buf.extend_from_slice(&STATE_FORMAT_VERSION.to_le_bytes());
        buf.extend_from_slice(&(header_json.len() as u32).to_le_bytes());
        buf.extend_from_slice(&header_json);
        for stream in &self.streams {
            buf.extend_from_slice(stream);
        }
        Ok(buf)
    }

    /// Deserializes a full byte slice, including all payload streams.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let info = Self::peek_info(bytes)?;

        let mut offset = info.header_size;
        let mut streams = Vec::with_capacity(info.header.entries.len());
        for entry in &info.header.entries {
            let len = entry.stream_len as usize;
            streams.push(bytes[offset..offset + len].to_vec());
            offset += len;
        }

        Ok(Self {
            header: info.header,
            streams,
        })
    }

    /// Peeks into a serialized archive's header to extract metadata without
    /// copying the (potentially large) payload streams.
    pub fn peek_info(bytes: &[u8]) -> Result<ArchiveInfo> {
        if bytes.len() < PREAMBLE_SIZE {
            return Err(ComposeError::Serialization(format!(
                "Archive is too small to be valid. Minimum size: {}, got: {}",
                PREAMBLE_SIZE,
                bytes.len()
            )));
        }
        if &bytes[0..4] != STATE_MAGIC {
            return Err(ComposeError::Serialization(
                "Invalid state archive magic number".into(),
            ));
        }

        let version = u16::from_le_bytes([bytes[4], bytes[5]]);
        if version != STATE_FORMAT_VERSION {
            return Err(ComposeError::Serialization(format!(
                "Unsupported archive version: expected {}, got {}",
                STATE_FORMAT_VERSION, version
            )));
        }

        let header_len = u32::from_le_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]) as usize;
        if header_len > MAX_HEADER_LEN {
            return Err(ComposeError::Serialization(format!(
                "Header length ({}) exceeds maximum allowed size ({})",
                header_len, MAX_HEADER_LEN
            )));
        }
        let header_size = PREAMBLE_SIZE + header_len;
        if bytes.len() < header_size {
            return Err(ComposeError::Serialization(
                "Header length exceeds buffer size".into(),
            ));
        }

        let header: ArchiveHeader = serde_json::from_slice(&bytes[PREAMBLE_SIZE..header_size])?;

        let mut data_size: usize = 0;
        for entry in &header.entries {
            data_size = usize::try_from(entry.stream_len)
                .ok()
                .and_then(|len| data_size.checked_add(len))
                .ok_or_else(|| {
                    ComposeError::Serialization("Declared stream sizes overflow".into())
                })?;
        }

        // Final check that the sum of parts does not exceed the total buffer size.
        if header_size.saturating_add(data_size) > bytes.len() {
            return Err(ComposeError::Serialization(
                "Sum of declared header and data sizes exceeds buffer length.".into(),
            ));
        }

        Ok(ArchiveInfo {
            format_version: version,
            header,
            header_size,
            data_size,
        })
    }
}

//==================================================================================
// Unit Tests
//==================================================================================
