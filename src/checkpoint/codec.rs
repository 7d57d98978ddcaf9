// In: src/checkpoint/codec.rs

//! Encodes an ordered name -> `State` mapping into a state archive and back.
//!
//! The codec is agnostic to which algorithm produced a payload. Every `Value` is
//! flattened depth-first into a `PayloadMeta` tree plus a raw byte stream; numeric
//! arrays are written as their element bytes, so dtype, shape and every bit of every
//! element survive the round trip.

use chrono::Utc;
use indexmap::IndexMap;
use ndarray::{ArrayD, IxDyn};

use crate::checkpoint::archive::StateArchive;
use crate::checkpoint::format::{
    ArchiveHeader, Endianness, EntryHeader, PayloadKind, PayloadMeta,
};
use crate::compose::state::{State, StateMap};
use crate::config::{CheckpointConfig, StateCompression};
use crate::data::DataArray;
use crate::error::{ComposeError, Result};
use crate::kernels;
use crate::types::DType;
use crate::utils::{bytes_to_typed_vec, take_bytes, typed_slice_to_bytes};
use crate::value::{NdArray, Value};
use crate::VERSION;

//==================================================================================
// 1. Public API
//==================================================================================

/// Encodes one atom's state map. Entry keys are the state-parameter names.
pub fn encode(states: &StateMap, config: &CheckpointConfig) -> Result<Vec<u8>> {
    let entries: Vec<(String, &State)> = states
        .iter()
        .map(|(name, state)| (name.to_string(), state))
        .collect();
    encode_entries(&entries, None, config)
}

/// Decodes an archive produced by `encode` back into an ordered state map.
pub fn decode(bytes: &[u8]) -> Result<StateMap> {
    Ok(StateMap::from_entries(decode_entries(bytes)?))
}

/// Encodes arbitrary keyed states, recording `source` in the header.
pub(crate) fn encode_entries(
    entries: &[(String, &State)],
    source: Option<&str>,
    config: &CheckpointConfig,
) -> Result<Vec<u8>> {
    let mut headers = Vec::with_capacity(entries.len());
    let mut streams = Vec::with_capacity(entries.len());

    for (key, state) in entries {
        let mut raw = Vec::new();
        let payload = encode_state(state, &mut raw)?;
        let stream = match config.compression {
            StateCompression::None => raw,
            StateCompression::Zstd { level } => kernels::zstd::encode(&raw, level)?,
        };
        headers.push(EntryHeader {
            key: key.clone(),
            payload,
            stream_len: stream.len() as u64,
        });
        streams.push(stream);
    }

    let archive = StateArchive {
        header: ArchiveHeader {
            writer_version: VERSION.to_string(),
            created_at: Utc::now(),
            endianness: Endianness::native(),
            compression: config.compression,
            source: source.map(str::to_string),
            entries: headers,
        },
        streams,
    };
    archive.to_bytes()
}

/// Decodes every entry of an archive, keeping header order.
pub(crate) fn decode_entries(bytes: &[u8]) -> Result<IndexMap<String, State>> {
    let archive = StateArchive::from_bytes(bytes)?;
    if archive.header.endianness != Endianness::native() {
        return Err(ComposeError::Serialization(format!(
            "Archive was written with {:?} byte order, this host is {:?}",
            archive.header.endianness,
            Endianness::native()
        )));
    }

    let mut states = IndexMap::with_capacity(archive.header.entries.len());
    for (entry, stream) in archive.header.entries.iter().zip(&archive.streams) {
        let raw = match archive.header.compression {
            StateCompression::None => stream.clone(),
            StateCompression::Zstd { .. } => {
                let declared = kernels::zstd::declared_len(stream)?;
                if declared != entry.payload.total_bytes() {
                    return Err(ComposeError::Serialization(format!(
                        "Entry '{}' stream declares {} payload bytes, header declares {}",
                        entry.key,
                        declared,
                        entry.payload.total_bytes()
                    )));
                }
                kernels::zstd::decode(stream)?
            }
        };
        if raw.len() as u64 != entry.payload.total_bytes() {
            return Err(ComposeError::Serialization(format!(
                "Entry '{}' holds {} payload bytes, header declares {}",
                entry.key,
                raw.len(),
                entry.payload.total_bytes()
            )));
        }
        let mut cursor: &[u8] = &raw;
        let state = decode_state(&entry.payload, &mut cursor)?;
        if states.insert(entry.key.clone(), state).is_some() {
            return Err(ComposeError::Serialization(format!(
                "Duplicate archive entry '{}'",
                entry.key
            )));
        }
    }
    Ok(states)
}

//==================================================================================
// 2. Encoding
//==================================================================================

fn encode_state(state: &State, out: &mut Vec<u8>) -> Result<PayloadMeta> {
    match state {
        State::Uninitialized => Ok(PayloadMeta::leaf(PayloadKind::Uninitialized, 0)),
        State::Value(value) => encode_value(value, out),
    }
}

fn encode_value(value: &Value, out: &mut Vec<u8>) -> Result<PayloadMeta> {
    let start = out.len();
    let meta = match value {
        Value::None => PayloadMeta::leaf(PayloadKind::None, 0),
        Value::Bool(b) => {
            out.push(u8::from(*b));
            PayloadMeta::leaf(PayloadKind::Bool, 1)
        }
        Value::Int(i) => {
            out.extend_from_slice(&typed_slice_to_bytes(&[*i]));
            PayloadMeta::leaf(PayloadKind::Int, 8)
        }
        Value::Float(f) => {
            out.extend_from_slice(&typed_slice_to_bytes(&[*f]));
            PayloadMeta::leaf(PayloadKind::Float, 8)
        }
        Value::Str(s) => {
            out.extend_from_slice(s.as_bytes());
            PayloadMeta::leaf(PayloadKind::Str, s.len())
        }
        Value::List(items) => {
            let mut meta = PayloadMeta::leaf(PayloadKind::List, 0);
            for item in items {
                meta.children.push(encode_value(item, out)?);
            }
            return Ok(meta);
        }
        Value::Array(array) => {
            let bytes = match array {
                NdArray::Int32(a) => array_to_bytes(a),
                NdArray::Int64(a) => array_to_bytes(a),
                NdArray::Float32(a) => array_to_bytes(a),
                NdArray::Float64(a) => array_to_bytes(a),
            };
            out.extend_from_slice(&bytes);
            let mut meta = PayloadMeta::leaf(PayloadKind::Array, bytes.len());
            meta.dtype = Some(array.dtype());
            meta.shape = array.shape().to_vec();
            meta
        }
        Value::Data(data) => {
            let bytes = array_to_bytes(data.values());
            out.extend_from_slice(&bytes);
            let mut meta = PayloadMeta::leaf(PayloadKind::Data, bytes.len());
            meta.dtype = Some(DType::Float64);
            meta.shape = data.shape().to_vec();
            meta.dims = data.dims().to_vec();
            meta.label = data.name().map(str::to_string);
            meta
        }
    };
    debug_assert_eq!((out.len() - start) as u64, meta.byte_len);
    Ok(meta)
}

/// Element bytes in logical (row-major) order, independent of memory layout.
fn array_to_bytes<T: bytemuck::Pod>(array: &ArrayD<T>) -> Vec<u8> {
    let flat: Vec<T> = array.iter().copied().collect();
    typed_slice_to_bytes(&flat)
}

//==================================================================================
// 3. Decoding
//==================================================================================

fn decode_state(meta: &PayloadMeta, cursor: &mut &[u8]) -> Result<State> {
    match meta.kind {
        PayloadKind::Uninitialized => Ok(State::Uninitialized),
        _ => Ok(State::Value(decode_value(meta, cursor)?)),
    }
}

fn decode_value(meta: &PayloadMeta, cursor: &mut &[u8]) -> Result<Value> {
    let len = usize::try_from(meta.byte_len)
        .map_err(|_| ComposeError::Serialization("Payload length overflows usize".into()))?;
    let own = take_bytes(cursor, len)?;

    let expect_len = |expected: usize| -> Result<()> {
        if len != expected {
            return Err(ComposeError::Serialization(format!(
                "{:?} payload must be {} byte(s), found {}",
                meta.kind, expected, len
            )));
        }
        Ok(())
    };

    match meta.kind {
        PayloadKind::Uninitialized => Err(ComposeError::Serialization(
            "Uninitialized marker nested inside a value".into(),
        )),
        PayloadKind::None => {
            expect_len(0)?;
            Ok(Value::None)
        }
        PayloadKind::Bool => {
            expect_len(1)?;
            match own[0] {
                0 => Ok(Value::Bool(false)),
                1 => Ok(Value::Bool(true)),
                b => Err(ComposeError::Serialization(format!(
                    "Invalid boolean byte {}",
                    b
                ))),
            }
        }
        PayloadKind::Int => {
            expect_len(8)?;
            Ok(Value::Int(bytes_to_typed_vec::<i64>(own)?[0]))
        }
        PayloadKind::Float => {
            expect_len(8)?;
            Ok(Value::Float(bytes_to_typed_vec::<f64>(own)?[0]))
        }
        PayloadKind::Str => String::from_utf8(own.to_vec())
            .map(Value::Str)
            .map_err(|e| ComposeError::Serialization(e.to_string())),
        PayloadKind::List => {
            expect_len(0)?;
            let items = meta
                .children
                .iter()
                .map(|child| decode_value(child, cursor))
                .collect::<Result<Vec<_>>>()?;
            Ok(Value::List(items))
        }
        PayloadKind::Array => {
            let dtype = meta.dtype.ok_or_else(|| {
                ComposeError::Serialization("Array payload without dtype".into())
            })?;
            expect_len(array_byte_len(&meta.shape, dtype)?)?;
            let array = match dtype {
                DType::Int32 => NdArray::Int32(array_from_bytes(&meta.shape, own)?),
                DType::Int64 => NdArray::Int64(array_from_bytes(&meta.shape, own)?),
                DType::Float32 => NdArray::Float32(array_from_bytes(&meta.shape, own)?),
                DType::Float64 => NdArray::Float64(array_from_bytes(&meta.shape, own)?),
            };
            Ok(Value::Array(array))
        }
        PayloadKind::Data => {
            if meta.dtype != Some(DType::Float64) {
                return Err(ComposeError::Serialization(format!(
                    "DataArray payload must be Float64, found {:?}",
                    meta.dtype
                )));
            }
            expect_len(array_byte_len(&meta.shape, DType::Float64)?)?;
            let values = array_from_bytes::<f64>(&meta.shape, own)?;
            let mut data = DataArray::new(values, meta.dims.clone())
                .map_err(|e| ComposeError::Serialization(e.to_string()))?;
            if let Some(label) = &meta.label {
                data = data.with_name(label.clone());
            }
            Ok(Value::Data(data))
        }
    }
}

fn array_byte_len(shape: &[usize], dtype: DType) -> Result<usize> {
    shape
        .iter()
        .try_fold(dtype.size_of(), |acc, &dim| acc.checked_mul(dim))
        .ok_or_else(|| ComposeError::Serialization(format!("Shape {:?} overflows", shape)))
}

fn array_from_bytes<T: bytemuck::Pod>(shape: &[usize], bytes: &[u8]) -> Result<ArrayD<T>> {
    let flat = bytes_to_typed_vec::<T>(bytes)?;
    ArrayD::from_shape_vec(IxDyn(shape), flat)
        .map_err(|e| ComposeError::Serialization(e.to_string()))
}

//==================================================================================
// 4. Unit Tests
//==================================================================================
