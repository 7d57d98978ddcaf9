//! Pure elementwise and reduction kernels. None of them carries state; the
//! elementwise ones are trivially chunk-transparent.

use ndarray::{ArrayD, Axis};

use crate::error::{ComposeError, Result};
use crate::kernels::iir::check_axis;

pub fn scale(x: &ArrayD<f64>, factor: f64) -> ArrayD<f64> {
    x.mapv(|v| v * factor)
}

pub fn square(x: &ArrayD<f64>) -> ArrayD<f64> {
    x.mapv(|v| v * v)
}

pub fn abs(x: &ArrayD<f64>) -> ArrayD<f64> {
    x.mapv(f64::abs)
}

pub fn sum(x: &ArrayD<f64>, axis: usize) -> Result<ArrayD<f64>> {
    check_axis(x, axis)?;
    Ok(x.sum_axis(Axis(axis)))
}

/// Arithmetic mean along `axis`. An empty axis is an error rather than NaN.
pub fn mean(x: &ArrayD<f64>, axis: usize) -> Result<ArrayD<f64>> {
    check_axis(x, axis)?;
    x.mean_axis(Axis(axis)).ok_or_else(|| {
        ComposeError::Computation(format!("Cannot average over empty axis {}", axis))
    })
}
