// In: src/signal.rs

//! Signal-processing functions exposed as `Atomized` adapters, so each of them can be
//! called eagerly or turned into a pipeline node depending on the call.
//!
//! Every function accepts a `DataArray` (dimensions addressed by name) or a plain
//! numeric array (dimensions addressed by axis index) and returns the same kind.
//! Stateful functions read their state under a fixed keyword (`zi` for filters,
//! `offset` for decimation) and only return it when a state was passed in.
//!
//! Any parameter, the data included, may be passed by keyword. The positional
//! arguments then fill the remaining parameters in signature order.

use ndarray::ArrayD;

use crate::compose::{Arg, Atom, Atomized, CallArgs, CallOutput, Callable, Kwargs, State, StateAtom, INPUT};
use crate::data::DataArray;
use crate::error::{ComposeError, Result};
use crate::kernels::{elementwise, iir, lfilter as lfilter_kernel, resample};
use crate::value::Value;

/// State keyword of the filter functions.
pub const FILTER_STATE: &str = "zi";
/// State keyword of `downsample`.
pub const DOWNSAMPLE_STATE: &str = "offset";

const RESAMPLE_PARAMS: &[&str] = &["x", "factor", "dim"];
const REDUCE_PARAMS: &[&str] = &["x", "dim"];

//==================================================================================
// 1. Input handling
//==================================================================================

/// The data argument, either labeled or raw.
enum Signal {
    Labeled(DataArray),
    Raw(ArrayD<f64>),
}

impl Signal {
    fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Data(data) => Ok(Signal::Labeled(data)),
            other => Ok(Signal::Raw(other.to_f64_array()?)),
        }
    }

    fn values(&self) -> &ArrayD<f64> {
        match self {
            Signal::Labeled(data) => data.values(),
            Signal::Raw(values) => values,
        }
    }

    /// Resolves a dimension given by name (labeled input) or index.
    fn axis(&self, dim: &Value) -> Result<usize> {
        match (self, dim) {
            (Signal::Labeled(data), Value::Str(name)) => data.axis(name),
            (_, Value::Int(index)) => usize::try_from(*index).map_err(|_| {
                ComposeError::Argument(format!("Axis must be non-negative, got {}", index))
            }),
            (Signal::Raw(_), Value::Str(name)) => Err(ComposeError::Argument(format!(
                "Dimension '{}' given by name, but the input has no dimension labels",
                name
            ))),
            (_, other) => Err(ComposeError::TypeMismatch {
                expected: "str or int",
                found: other.type_name(),
            }),
        }
    }

    /// Wraps new values of the same rank in the kind of the input.
    fn rewrap(&self, values: ArrayD<f64>) -> Result<Value> {
        match self {
            Signal::Labeled(data) => Ok(Value::Data(data.with_values(values)?)),
            Signal::Raw(_) => Ok(Value::from(values)),
        }
    }

    /// Wraps values reduced along `axis`.
    fn rewrap_reduced(&self, axis: usize, values: ArrayD<f64>) -> Result<Value> {
        match self {
            Signal::Labeled(data) => Ok(Value::Data(data.reduce_dim(&data.dims()[axis], values)?)),
            Signal::Raw(_) => Ok(Value::from(values)),
        }
    }
}

/// Reads the incoming array state. `Ok(None)` means start from rest.
fn array_state(args: &CallArgs, name: &str) -> Result<Option<ArrayD<f64>>> {
    match args.state(name) {
        Some(State::Value(v)) => Ok(Some(v.to_f64_array()?)),
        _ => Ok(None),
    }
}

/// Attaches `next` under `name` if the caller asked for stateful execution.
fn with_optional_state(
    args: &CallArgs,
    name: &str,
    output: Value,
    next: impl Into<Value>,
) -> CallOutput {
    let out = CallOutput::new(output);
    if args.state(name).is_some() {
        out.with_state(name, next)
    } else {
        out
    }
}

//==================================================================================
// 2. Stateful functions
//==================================================================================

/// `sosfilt(sos, x, dim)`: cascaded biquad filtering. State: `zi`.
pub fn sosfilt() -> Atomized {
    const PARAMS: &[&str] = &["sos", "x", "dim"];
    Atomized::new(Callable::new("sosfilt", |mut args: CallArgs| {
        let sos = args
            .resolve(PARAMS, "sos")?
            .to_f64_array()?
            .into_dimensionality::<ndarray::Ix2>()?;
        let signal = Signal::from_value(args.take_resolved(PARAMS, "x")?)?;
        let axis = signal.axis(args.resolve(PARAMS, "dim")?)?;
        let zi = array_state(&args, FILTER_STATE)?;
        let (y, zf) = iir::sosfilt(&sos, signal.values(), axis, zi.as_ref())?;
        Ok(with_optional_state(&args, FILTER_STATE, signal.rewrap(y)?, zf))
    }))
}

/// `lfilter(b, a, x, dim)`: direct form II transposed filtering. State: `zi`.
pub fn lfilter() -> Atomized {
    const PARAMS: &[&str] = &["b", "a", "x", "dim"];
    Atomized::new(Callable::new("lfilter", |mut args: CallArgs| {
        let b = args.resolve(PARAMS, "b")?.to_f64_array()?;
        let a = args.resolve(PARAMS, "a")?.to_f64_array()?;
        let signal = Signal::from_value(args.take_resolved(PARAMS, "x")?)?;
        let axis = signal.axis(args.resolve(PARAMS, "dim")?)?;
        let zi = array_state(&args, FILTER_STATE)?;
        let b: Vec<f64> = b.iter().copied().collect();
        let a: Vec<f64> = a.iter().copied().collect();
        let (y, zf) = lfilter_kernel::lfilter(&b, &a, signal.values(), axis, zi.as_ref())?;
        Ok(with_optional_state(&args, FILTER_STATE, signal.rewrap(y)?, zf))
    }))
}

/// `downsample(x, factor, dim)`: keeps every `factor`-th sample. State: `offset`.
pub fn downsample() -> Atomized {
    Atomized::new(Callable::new("downsample", |mut args: CallArgs| {
        let signal = Signal::from_value(args.take_resolved(RESAMPLE_PARAMS, "x")?)?;
        let factor = positive(args.resolve(RESAMPLE_PARAMS, "factor")?, "factor")?;
        let axis = signal.axis(args.resolve(RESAMPLE_PARAMS, "dim")?)?;
        let offset = match args.state(DOWNSAMPLE_STATE) {
            Some(State::Value(v)) => usize::try_from(v.as_int()?).map_err(|_| {
                ComposeError::Computation("Downsampling offset must be non-negative".into())
            })?,
            _ => 0,
        };
        let (y, next) = resample::downsample(signal.values(), factor, axis, offset)?;
        Ok(with_optional_state(&args, DOWNSAMPLE_STATE, signal.rewrap(y)?, next))
    }))
}

fn positive(value: &Value, what: &str) -> Result<usize> {
    let n = value.as_int()?;
    usize::try_from(n)
        .ok()
        .filter(|&n| n > 0)
        .ok_or_else(|| ComposeError::Argument(format!("{} must be positive, got {}", what, n)))
}

//==================================================================================
// 3. Pure functions
//==================================================================================

/// `upsample(x, factor, dim)`: zero insertion.
pub fn upsample() -> Atomized {
    Atomized::new(Callable::pure("upsample", |mut args: CallArgs| {
        let signal = Signal::from_value(args.take_resolved(RESAMPLE_PARAMS, "x")?)?;
        let factor = positive(args.resolve(RESAMPLE_PARAMS, "factor")?, "factor")?;
        let axis = signal.axis(args.resolve(RESAMPLE_PARAMS, "dim")?)?;
        signal.rewrap(resample::upsample(signal.values(), factor, axis)?)
    }))
}

/// `scale(x, factor)`.
pub fn scale() -> Atomized {
    const PARAMS: &[&str] = &["x", "factor"];
    Atomized::new(Callable::pure("scale", |mut args: CallArgs| {
        let signal = Signal::from_value(args.take_resolved(PARAMS, "x")?)?;
        let factor = args.resolve(PARAMS, "factor")?.as_float()?;
        signal.rewrap(elementwise::scale(signal.values(), factor))
    }))
}

pub fn square() -> Atomized {
    Atomized::new(Callable::pure("square", |mut args: CallArgs| {
        let signal = Signal::from_value(args.take_resolved(&["x"], "x")?)?;
        signal.rewrap(elementwise::square(signal.values()))
    }))
}

pub fn abs() -> Atomized {
    Atomized::new(Callable::pure("abs", |mut args: CallArgs| {
        let signal = Signal::from_value(args.take_resolved(&["x"], "x")?)?;
        signal.rewrap(elementwise::abs(signal.values()))
    }))
}

/// `mean(x, dim)`: drops `dim`.
pub fn mean() -> Atomized {
    Atomized::new(Callable::pure("mean", |mut args: CallArgs| {
        let signal = Signal::from_value(args.take_resolved(REDUCE_PARAMS, "x")?)?;
        let axis = signal.axis(args.resolve(REDUCE_PARAMS, "dim")?)?;
        signal.rewrap_reduced(axis, elementwise::mean(signal.values(), axis)?)
    }))
}

/// `sum(x, dim)`: drops `dim`.
pub fn sum() -> Atomized {
    Atomized::new(Callable::pure("sum", |mut args: CallArgs| {
        let signal = Signal::from_value(args.take_resolved(REDUCE_PARAMS, "x")?)?;
        let axis = signal.axis(args.resolve(REDUCE_PARAMS, "dim")?)?;
        signal.rewrap_reduced(axis, elementwise::sum(signal.values(), axis)?)
    }))
}

//==================================================================================
// 4. Ready-made atoms
//==================================================================================

/// A causal Butterworth filter along `dim`, ready for chunked use.
///
/// # Errors
/// `ComposeError::Argument` for an unknown band type or invalid design parameters.
pub fn iir_filter(order: usize, cutoff: f64, btype: &str, fs: f64, dim: &str) -> Result<StateAtom> {
    let sos = iir::butter_sos(order, cutoff, btype.parse()?, fs)?;
    Ok(sosfilt()
        .stateful(
            vec![Arg::from(sos.into_dyn()), INPUT, Arg::from(dim)],
            Kwargs::new(),
            FILTER_STATE,
        )?
        .with_name("iirfilter"))
}

/// Decimation by `factor` along `dim` that keeps its phase across chunks.
pub fn down_sample(factor: usize, dim: &str) -> Result<StateAtom> {
    Ok(downsample()
        .stateful(
            vec![INPUT, Arg::from(factor), Arg::from(dim)],
            Kwargs::new(),
            DOWNSAMPLE_STATE,
        )?
        .with_name("downsample"))
}

/// Zero-insertion upsampling by `factor` along `dim`.
pub fn up_sample(factor: usize, dim: &str) -> Result<Atom> {
    Ok(upsample()
        .atom(vec![INPUT, Arg::from(factor), Arg::from(dim)], Kwargs::new())?
        .with_name("upsample"))
}
