//! This module contains the pure, stateless kernels for Zstandard compression and
//! decompression of checkpoint payload streams.
//!
//! Each encoded stream carries its uncompressed length as an 8-byte little-endian
//! prefix. The decoder never produces more output than that prefix declares, so a
//! corrupted stream cannot expand past it. This module is a safe, panic-free
//! wrapper around the `zstd` crate.

use std::io::Read;

use crate::error::ComposeError;

const SIZE_PREFIX_LEN: usize = 8;

/// The public-facing encode function for this module.
pub fn encode(input_bytes: &[u8], level: i32) -> Result<Vec<u8>, ComposeError> {
    if input_bytes.is_empty() {
        return Ok(Vec::new());
    }

    let mut output_buf = Vec::with_capacity(input_bytes.len() / 2 + 8);
    let uncompressed_len: u64 = input_bytes.len() as u64;
    output_buf.extend_from_slice(&uncompressed_len.to_le_bytes());

    let mut encoder = zstd::stream::Encoder::new(&mut output_buf, level)
        .map_err(|e| ComposeError::Zstd(e.to_string()))?;
    std::io::Write::write_all(&mut encoder, input_bytes)
        .map_err(|e| ComposeError::Zstd(e.to_string()))?;
    // `finish` is essential to finalize the Zstd frame.
    encoder
        .finish()
        .map_err(|e| ComposeError::Zstd(e.to_string()))?;

    Ok(output_buf)
}

/// Reads the uncompressed length a stream declares, without decompressing it.
/// An empty stream declares zero bytes.
pub fn declared_len(input_bytes: &[u8]) -> Result<u64, ComposeError> {
    if input_bytes.is_empty() {
        return Ok(0);
    }
    let prefix = input_bytes.get(..SIZE_PREFIX_LEN).ok_or_else(|| {
        ComposeError::Zstd("Input stream too short to contain size header.".to_string())
    })?;
    let mut len_buf = [0u8; SIZE_PREFIX_LEN];
    len_buf.copy_from_slice(prefix);
    Ok(u64::from_le_bytes(len_buf))
}

/// The public-facing decode function for this module.
pub fn decode(input_bytes: &[u8]) -> Result<Vec<u8>, ComposeError> {
    if input_bytes.is_empty() {
        return Ok(Vec::new());
    }
    let declared = declared_len(input_bytes)?;
    let uncompressed_len = usize::try_from(declared).map_err(|_| {
        ComposeError::Zstd(format!("Declared size {} overflows usize.", declared))
    })?;
    let compressed_data = &input_bytes[SIZE_PREFIX_LEN..];

    let decoder = zstd::stream::Decoder::new(compressed_data)
        .map_err(|e| ComposeError::Zstd(e.to_string()))?;
    // Reading one byte past the declared size is enough to detect an overrun.
    let mut decompressed_data =
        Vec::with_capacity(uncompressed_len.min(compressed_data.len().saturating_mul(64)));
    decoder
        .take(declared.saturating_add(1))
        .read_to_end(&mut decompressed_data)
        .map_err(|e| ComposeError::Zstd(e.to_string()))?;

    if decompressed_data.len() > uncompressed_len {
        return Err(ComposeError::Zstd(format!(
            "Decompressed data exceeds the declared {} byte(s).",
            uncompressed_len
        )));
    }
    if decompressed_data.len() != uncompressed_len {
        return Err(ComposeError::Zstd(format!(
            "Decompressed size does not match header. Expected {}, got {}.",
            uncompressed_len,
            decompressed_data.len()
        )));
    }

    Ok(decompressed_data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zstd_roundtrip_highly_compressible_data() {
        let original_bytes = vec![42u8; 10_000];
        let compressed_bytes = encode(&original_bytes, 5).unwrap();
        assert!(compressed_bytes.len() < 50);
        let decompressed_bytes = decode(&compressed_bytes).unwrap();
        assert_eq!(original_bytes, decompressed_bytes);
    }

    #[test]
    fn test_empty_input_stays_empty() {
        assert!(encode(&[], 3).unwrap().is_empty());
        assert!(decode(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_zstd_decompress_invalid_data() {
        let result = decode(&[1, 2, 3, 4, 5]);
        assert!(matches!(result, Err(ComposeError::Zstd(_))));
    }

    #[test]
    fn test_size_header_mismatch_is_detected() {
        let mut compressed = encode(&[7u8; 64], 3).unwrap();
        compressed[0] = 65;
        assert!(decode(&compressed).is_err());
    }

    #[test]
    fn test_expansion_is_capped_at_declared_size() {
        let mut bomb = encode(&vec![0u8; 1 << 24], 3).unwrap();
        assert!(bomb.len() < 4096);
        bomb[..8].copy_from_slice(&8u64.to_le_bytes());
        assert_eq!(declared_len(&bomb).unwrap(), 8);
        match decode(&bomb) {
            Err(ComposeError::Zstd(msg)) => assert!(msg.contains("exceeds the declared 8")),
            other => panic!("expected a size error, got {:?}", other),
        }
    }
}
