//! This module contains the integer-factor resampling kernels.
//!
//! `downsample` keeps every `factor`-th sample and carries its phase across calls,
//! so decimating consecutive chunks selects the same global samples as decimating
//! the whole series. `upsample` inserts zeros and needs no state.

use ndarray::{ArrayD, Axis, Slice};

use crate::error::{ComposeError, Result};
use crate::kernels::iir::check_axis;

fn check_factor(factor: usize) -> Result<()> {
    if factor == 0 {
        return Err(ComposeError::Argument(
            "Resampling factor must be at least 1".into(),
        ));
    }
    Ok(())
}

/// Keeps samples `offset, offset + factor, ...` of `x` along `axis`.
///
/// Returns the decimated array and the offset at which the next chunk must start
/// to stay on the same sampling grid.
pub fn downsample(
    x: &ArrayD<f64>,
    factor: usize,
    axis: usize,
    offset: usize,
) -> Result<(ArrayD<f64>, usize)> {
    check_factor(factor)?;
    check_axis(x, axis)?;
    let n = x.len_of(Axis(axis));
    let indices: Vec<usize> = (offset..n).step_by(factor).collect();
    let y = x.select(Axis(axis), &indices);
    let next = if offset >= n {
        offset - n
    } else {
        (factor - (n - offset) % factor) % factor
    };
    Ok((y, next))
}

/// Inserts `factor - 1` zeros after every sample of `x` along `axis`.
pub fn upsample(x: &ArrayD<f64>, factor: usize, axis: usize) -> Result<ArrayD<f64>> {
    check_factor(factor)?;
    check_axis(x, axis)?;
    let mut shape = x.shape().to_vec();
    shape[axis] *= factor;
    let mut y = ArrayD::<f64>::zeros(shape);
    y.slice_axis_mut(Axis(axis), Slice::new(0, None, factor as isize))
        .assign(x);
    Ok(y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    fn ramp(n: usize) -> ArrayD<f64> {
        ArrayD::from_shape_fn(IxDyn(&[n, 2]), |idx| (idx[0] * 10 + idx[1]) as f64)
    }

    #[test]
    fn test_downsample_tracks_phase_across_chunks() {
        let x = ramp(20);
        let (full, _) = downsample(&x, 3, 0, 0).unwrap();

        let mut offset = 0;
        let mut parts = Vec::new();
        for (start, end) in [(0, 4), (4, 5), (5, 11), (11, 20)] {
            let chunk = x.slice_axis(Axis(0), Slice::from(start..end)).to_owned();
            let (y, next) = downsample(&chunk, 3, 0, offset).unwrap();
            parts.push(y);
            offset = next;
        }
        let views: Vec<_> = parts.iter().map(|p| p.view()).collect();
        assert_eq!(ndarray::concatenate(Axis(0), &views).unwrap(), full);
        assert_eq!(full.len_of(Axis(0)), 7);
    }

    #[test]
    fn test_downsample_chunk_shorter_than_offset() {
        let x = ramp(1);
        let (y, next) = downsample(&x, 4, 0, 3).unwrap();
        assert_eq!(y.len_of(Axis(0)), 0);
        assert_eq!(next, 2);
    }

    #[test]
    fn test_upsample_inserts_zeros() {
        let x = ArrayD::from_shape_vec(IxDyn(&[3]), vec![1.0, 2.0, 3.0]).unwrap();
        let y = upsample(&x, 2, 0).unwrap();
        assert_eq!(
            y.iter().copied().collect::<Vec<_>>(),
            vec![1.0, 0.0, 2.0, 0.0, 3.0, 0.0]
        );
    }

    #[test]
    fn test_zero_factor_is_rejected() {
        let x = ramp(3);
        assert!(downsample(&x, 0, 0, 0).is_err());
        assert!(upsample(&x, 0, 0).is_err());
        assert!(upsample(&x, 2, 5).is_err());
    }
}
