//! This module provides a set of shared, low-level utility functions used
//! throughout the atomflow core.
//!
//! Its primary responsibility is providing safe, validated conversions between raw
//! byte buffers and typed element buffers for the checkpoint codec.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::ComposeError;

/// Copies a typed slice into a fresh byte vector in native byte order.
pub fn typed_slice_to_bytes<T: bytemuck::Pod>(data: &[T]) -> Vec<u8> {
    bytemuck::cast_slice(data).to_vec()
}

/// Copies a byte slice into a fresh, properly aligned typed vector.
///
/// # Errors
/// Returns `ComposeError::BufferMismatch` if the byte length is not a multiple of
/// the element size.
pub fn bytes_to_typed_vec<T: bytemuck::Pod>(bytes: &[u8]) -> Result<Vec<T>, ComposeError> {
    let size = std::mem::size_of::<T>();
    if bytes.len() % size != 0 {
        return Err(ComposeError::BufferMismatch(bytes.len(), size));
    }
    // The source slice may be unaligned, so copy into an owned, aligned buffer.
    let mut out = vec![<T as bytemuck::Zeroable>::zeroed(); bytes.len() / size];
    bytemuck::cast_slice_mut::<T, u8>(&mut out).copy_from_slice(bytes);
    Ok(out)
}

/// Splits `len` bytes off the front of `cursor`.
pub fn take_bytes<'a>(cursor: &mut &'a [u8], len: usize) -> Result<&'a [u8], ComposeError> {
    if cursor.len() < len {
        return Err(ComposeError::Serialization(format!(
            "Unexpected end of payload: need {} byte(s), {} left",
            len,
            cursor.len()
        )));
    }
    let (head, tail) = cursor.split_at(len);
    *cursor = tail;
    Ok(head)
}

/// Sibling path that `replace_file` stages writes in.
fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".partial");
    path.with_file_name(name)
}

/// Writes `bytes` to `path` so that readers see either the previous file or the
/// complete new one. The data is staged next to the target and renamed over it.
pub fn replace_file(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let staged = staging_path(path);
    let result = File::create(&staged)
        .and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        })
        .and_then(|()| fs::rename(&staged, path));
    if result.is_err() {
        let _ = fs::remove_file(&staged);
    }
    result
}
