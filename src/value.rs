// In: src/value.rs

//! The dynamic value model shared by atom arguments, pipeline data and state payloads.
//!
//! Atoms bind heterogeneous fixed arguments (filter coefficients, factors, dimension
//! names) alongside the runtime input, so every argument slot holds a `Value`. State
//! payloads are `Value`s as well; their concrete shape is decided by the callable that
//! produced them, and the checkpoint codec round-trips every variant exactly.

use ndarray::ArrayD;
use std::fmt;

use crate::data::DataArray;
use crate::error::{ComposeError, Result};
use crate::types::DType;

//==================================================================================
// 1. Typed n-dimensional arrays
//==================================================================================

/// An `ndarray::ArrayD` tagged with its element type.
#[derive(Debug, Clone, PartialEq)]
pub enum NdArray {
    Int32(ArrayD<i32>),
    Int64(ArrayD<i64>),
    Float32(ArrayD<f32>),
    Float64(ArrayD<f64>),
}

impl NdArray {
    pub fn dtype(&self) -> DType {
        match self {
            NdArray::Int32(_) => DType::Int32,
            NdArray::Int64(_) => DType::Int64,
            NdArray::Float32(_) => DType::Float32,
            NdArray::Float64(_) => DType::Float64,
        }
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            NdArray::Int32(a) => a.shape(),
            NdArray::Int64(a) => a.shape(),
            NdArray::Float32(a) => a.shape(),
            NdArray::Float64(a) => a.shape(),
        }
    }

    /// Returns a `f64` copy of the array, converting element types as needed.
    pub fn to_f64(&self) -> ArrayD<f64> {
        use num_traits::AsPrimitive;
        match self {
            NdArray::Int32(a) => a.mapv(|v| v.as_()),
            NdArray::Int64(a) => a.mapv(|v| v.as_()),
            NdArray::Float32(a) => a.mapv(|v| v.as_()),
            NdArray::Float64(a) => a.clone(),
        }
    }
}

//==================================================================================
// 2. The Value enum
//==================================================================================

/// Any value that can occupy an argument slot, flow through a pipeline, or be held
/// as a state payload.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Array(NdArray),
    Data(DataArray),
}

impl Value {
    /// A short type name, used when an argument is too long to display inline.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "none",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Array(_) => "ndarray",
            Value::Data(_) => "DataArray",
        }
    }

    fn mismatch(&self, expected: &'static str) -> ComposeError {
        ComposeError::TypeMismatch {
            expected,
            found: self.type_name(),
        }
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(other.mismatch("bool")),
        }
    }

    pub fn as_int(&self) -> Result<i64> {
        match self {
            Value::Int(i) => Ok(*i),
            other => Err(other.mismatch("int")),
        }
    }

    /// Reads a float, accepting integers as well.
    pub fn as_float(&self) -> Result<f64> {
        match self {
            Value::Float(f) => Ok(*f),
            Value::Int(i) => Ok(*i as f64),
            other => Err(other.mismatch("float")),
        }
    }

    pub fn as_str(&self) -> Result<&str> {
        match self {
            Value::Str(s) => Ok(s),
            other => Err(other.mismatch("str")),
        }
    }

    pub fn as_list(&self) -> Result<&[Value]> {
        match self {
            Value::List(items) => Ok(items),
            other => Err(other.mismatch("list")),
        }
    }

    pub fn as_array(&self) -> Result<&NdArray> {
        match self {
            Value::Array(a) => Ok(a),
            other => Err(other.mismatch("ndarray")),
        }
    }

    /// Reads a numeric array or a list of numbers as `f64` values.
    pub fn to_f64_array(&self) -> Result<ArrayD<f64>> {
        match self {
            Value::Array(a) => Ok(a.to_f64()),
            Value::Data(d) => Ok(d.values().clone()),
            Value::List(items) => {
                let flat = items
                    .iter()
                    .map(Value::as_float)
                    .collect::<Result<Vec<f64>>>()?;
                Ok(ArrayD::from_shape_vec(ndarray::IxDyn(&[flat.len()]), flat)?)
            }
            other => Err(other.mismatch("ndarray")),
        }
    }

    pub fn as_data(&self) -> Result<&DataArray> {
        match self {
            Value::Data(d) => Ok(d),
            other => Err(other.mismatch("DataArray")),
        }
    }

    pub fn into_data(self) -> Result<DataArray> {
        match self {
            Value::Data(d) => Ok(d),
            other => Err(other.mismatch("DataArray")),
        }
    }
}

//==================================================================================
// 3. Conversions
//==================================================================================

macro_rules! impl_value_from {
    ($($t:ty => $variant:ident),+ $(,)?) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::$variant(v.into())
                }
            }
        )+
    };
}

impl_value_from!(
    bool => Bool,
    i64 => Int,
    i32 => Int,
    f64 => Float,
    String => Str,
    &str => Str,
    DataArray => Data,
    NdArray => Array,
);

impl From<usize> for Value {
    fn from(v: usize) -> Self {
        Value::Int(v as i64)
    }
}

impl From<ArrayD<f64>> for Value {
    fn from(a: ArrayD<f64>) -> Self {
        Value::Array(NdArray::Float64(a))
    }
}

impl From<ArrayD<f32>> for Value {
    fn from(a: ArrayD<f32>) -> Self {
        Value::Array(NdArray::Float32(a))
    }
}

impl From<ArrayD<i64>> for Value {
    fn from(a: ArrayD<i64>) -> Self {
        Value::Array(NdArray::Int64(a))
    }
}

impl From<ArrayD<i32>> for Value {
    fn from(a: ArrayD<i32>) -> Self {
        Value::Array(NdArray::Int32(a))
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Value::List(v.into_iter().map(Value::Float).collect())
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::List(v)
    }
}

//==================================================================================
// 4. Display (debugging aid only)
//==================================================================================

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{:?}", x),
            Value::Str(s) => write!(f, "{}", s),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Array(a) => write!(f, "ndarray<{}>{:?}", a.dtype(), a.shape()),
            Value::Data(d) => write!(f, "DataArray{:?}", d.dims()),
        }
    }
}
