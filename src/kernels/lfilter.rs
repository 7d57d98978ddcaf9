//! This module contains the general rational-transfer-function filter
//! (`b` over `a`), in direct form II transposed.
//!
//! The delay line has `max(len(a), len(b)) - 1` taps per lane and is returned so the
//! next chunk can continue exactly where this one stopped.

use ndarray::{Array2, ArrayD, ArrayViewMut1, Axis, Ix2};
use num_traits::Float;

use crate::error::{ComposeError, Result};
use crate::kernels::iir::{check_axis, lane_count};

//==================================================================================
// 1. Generic Core Logic
//==================================================================================

/// Filters one lane in place. `b` and `a` are normalized, zero-padded to the same
/// length `z.len() + 1`.
fn lfilter_inplace<T: Float>(lane: &mut ArrayViewMut1<T>, b: &[T], a: &[T], z: &mut [T]) {
    let n = z.len();
    for v in lane.iter_mut() {
        let x = *v;
        let y = b[0] * x + if n > 0 { z[0] } else { T::zero() };
        for i in 0..n.saturating_sub(1) {
            z[i] = b[i + 1] * x + z[i + 1] - a[i + 1] * y;
        }
        if n > 0 {
            z[n - 1] = b[n] * x - a[n] * y;
        }
        *v = y;
    }
}

//==================================================================================
// 2. Public API
//==================================================================================

/// Filters `x` along `axis` with numerator `b` and denominator `a`.
///
/// `zi` is shaped `[max(len(a), len(b)) - 1, lanes]`; `None` starts from rest.
/// Returns the filtered samples and the final delay line.
pub fn lfilter(
    b: &[f64],
    a: &[f64],
    x: &ArrayD<f64>,
    axis: usize,
    zi: Option<&ArrayD<f64>>,
) -> Result<(ArrayD<f64>, ArrayD<f64>)> {
    check_axis(x, axis)?;
    if b.is_empty() || a.is_empty() {
        return Err(ComposeError::Argument(
            "Filter coefficients must not be empty".into(),
        ));
    }
    let a0 = a[0];
    if a0 == 0.0 || !a0.is_finite() {
        return Err(ComposeError::Computation(format!(
            "Leading denominator coefficient must be finite and non-zero, got {}",
            a0
        )));
    }

    let taps = b.len().max(a.len());
    let mut bn = vec![0.0; taps];
    let mut an = vec![0.0; taps];
    for (dst, src) in bn.iter_mut().zip(b) {
        *dst = src / a0;
    }
    for (dst, src) in an.iter_mut().zip(a) {
        *dst = src / a0;
    }

    let order = taps - 1;
    let n_lanes = lane_count(x.shape(), axis);
    let mut zf: Array2<f64> = match zi {
        None => Array2::zeros((order, n_lanes)),
        Some(z) => {
            if z.shape() != [order, n_lanes] {
                return Err(ComposeError::ShapeMismatch(format!(
                    "Initial conditions shaped {:?}, expected {:?}",
                    z.shape(),
                    [order, n_lanes]
                )));
            }
            z.clone().into_dimensionality::<Ix2>()?
        }
    };

    let mut y = x.to_owned();
    let mut z = vec![0.0; order];
    for (lane_idx, mut lane) in y.lanes_mut(Axis(axis)).into_iter().enumerate() {
        for (k, tap) in z.iter_mut().enumerate() {
            *tap = zf[[k, lane_idx]];
        }
        lfilter_inplace(&mut lane, &bn, &an, &mut z);
        for (k, tap) in z.iter().enumerate() {
            zf[[k, lane_idx]] = *tap;
        }
    }
    Ok((y, zf.into_dyn()))
}
