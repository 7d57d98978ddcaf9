//! This module contains the Butterworth filter design and the cascaded biquad
//! (second-order sections) filter used by the IIR atoms.
//!
//! Filtering is causal and carries its delay line explicitly: the returned final
//! conditions, fed back as the initial conditions of the next call, make filtering
//! consecutive chunks produce exactly the same samples as filtering their
//! concatenation.

use ndarray::{Array2, Array3, ArrayD, ArrayViewMut1, Axis, Ix3};
use num_traits::Float;
use std::f64::consts::PI;
use std::str::FromStr;

use crate::error::{ComposeError, Result};

/// Number of coefficients per section: `[b0, b1, b2, a0, a1, a2]`.
pub const SECTION_WIDTH: usize = 6;

/// The response type of a designed filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandType {
    Lowpass,
    Highpass,
}

impl FromStr for BandType {
    type Err = ComposeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "lowpass" | "low" => Ok(BandType::Lowpass),
            "highpass" | "high" => Ok(BandType::Highpass),
            other => Err(ComposeError::Argument(format!(
                "Unsupported band type '{}', expected 'lowpass' or 'highpass'",
                other
            ))),
        }
    }
}

//==================================================================================
// 1. Filter Design
//==================================================================================

/// Designs a digital Butterworth filter as second-order sections.
///
/// The analog prototype is mapped with the bilinear transform, pre-warped so that
/// the -3 dB point lands exactly on `cutoff`. An odd order adds one first-order
/// section (stored with `b2 = a2 = 0`) at the end.
pub fn butter_sos(order: usize, cutoff: f64, btype: BandType, fs: f64) -> Result<Array2<f64>> {
    if order == 0 {
        return Err(ComposeError::Argument("Filter order must be at least 1".into()));
    }
    if !(fs.is_finite() && fs > 0.0) {
        return Err(ComposeError::Argument(format!(
            "Sampling frequency must be positive, got {}",
            fs
        )));
    }
    let nyquist = fs / 2.0;
    if !(cutoff.is_finite() && cutoff > 0.0 && cutoff < nyquist) {
        return Err(ComposeError::Argument(format!(
            "Cutoff {} must lie strictly between 0 and the Nyquist frequency {}",
            cutoff, nyquist
        )));
    }

    let warped = (PI * cutoff / fs).tan();
    let w2 = warped * warped;
    let n_sections = order.div_ceil(2);
    let mut sos = Array2::<f64>::zeros((n_sections, SECTION_WIDTH));

    for k in 0..order / 2 {
        let damping = (PI * (2 * k + 1) as f64 / (2 * order) as f64).sin();
        let a0 = 1.0 + 2.0 * damping * warped + w2;
        let a1 = 2.0 * (w2 - 1.0) / a0;
        let a2 = (1.0 - 2.0 * damping * warped + w2) / a0;
        let (b0, b1, b2) = match btype {
            BandType::Lowpass => (w2 / a0, 2.0 * w2 / a0, w2 / a0),
            BandType::Highpass => (1.0 / a0, -2.0 / a0, 1.0 / a0),
        };
        sos.row_mut(k)
            .assign(&ndarray::arr1(&[b0, b1, b2, 1.0, a1, a2]));
    }

    if order % 2 == 1 {
        let a0 = 1.0 + warped;
        let a1 = (warped - 1.0) / a0;
        let (b0, b1) = match btype {
            BandType::Lowpass => (warped / a0, warped / a0),
            BandType::Highpass => (1.0 / a0, -1.0 / a0),
        };
        sos.row_mut(n_sections - 1)
            .assign(&ndarray::arr1(&[b0, b1, 0.0, 1.0, a1, 0.0]));
    }
    Ok(sos)
}

//==================================================================================
// 2. Generic Core Logic (in-place, one lane at a time)
//==================================================================================

/// Runs one biquad over `lane` in direct form II transposed, updating `z` in place.
fn biquad_inplace<T: Float>(lane: &mut ArrayViewMut1<T>, coeffs: [T; SECTION_WIDTH], z: &mut [T; 2]) {
    let [b0, b1, b2, _, a1, a2] = coeffs;
    let [mut z0, mut z1] = *z;
    for v in lane.iter_mut() {
        let x = *v;
        let y = b0 * x + z0;
        z0 = b1 * x - a1 * y + z1;
        z1 = b2 * x - a2 * y;
        *v = y;
    }
    *z = [z0, z1];
}

//==================================================================================
// 3. Public API
//==================================================================================

/// Number of 1-D lanes of `shape` along `axis`.
pub(crate) fn lane_count(shape: &[usize], axis: usize) -> usize {
    shape
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != axis)
        .map(|(_, &d)| d)
        .product()
}

pub(crate) fn check_axis(x: &ArrayD<f64>, axis: usize) -> Result<()> {
    if axis >= x.ndim() {
        return Err(ComposeError::ShapeMismatch(format!(
            "Axis {} out of range for an array of rank {}",
            axis,
            x.ndim()
        )));
    }
    Ok(())
}

/// Filters `x` along `axis` through the cascade `sos`.
///
/// `zi` holds the delay line of every section for every lane, shaped
/// `[sections, 2, lanes]` with lanes in row-major order of the remaining axes.
/// `None` starts from rest. Returns the filtered samples and the final delay line.
pub fn sosfilt(
    sos: &Array2<f64>,
    x: &ArrayD<f64>,
    axis: usize,
    zi: Option<&ArrayD<f64>>,
) -> Result<(ArrayD<f64>, ArrayD<f64>)> {
    check_axis(x, axis)?;
    if sos.ncols() != SECTION_WIDTH || sos.nrows() == 0 {
        return Err(ComposeError::ShapeMismatch(format!(
            "Second-order sections must be shaped [n, {}], got {:?}",
            SECTION_WIDTH,
            sos.shape()
        )));
    }
    if let Some(row) = sos.rows().into_iter().find(|r| r[3] != 1.0) {
        return Err(ComposeError::Computation(format!(
            "Section coefficients must be normalized (a0 == 1), got a0 = {}",
            row[3]
        )));
    }

    let n_sections = sos.nrows();
    let n_lanes = lane_count(x.shape(), axis);
    let mut zf: Array3<f64> = match zi {
        None => Array3::zeros((n_sections, 2, n_lanes)),
        Some(z) => {
            if z.shape() != [n_sections, 2, n_lanes] {
                return Err(ComposeError::ShapeMismatch(format!(
                    "Initial conditions shaped {:?}, expected {:?}",
                    z.shape(),
                    [n_sections, 2, n_lanes]
                )));
            }
            z.clone().into_dimensionality::<Ix3>()?
        }
    };

    let mut y = x.to_owned();
    for (lane_idx, mut lane) in y.lanes_mut(Axis(axis)).into_iter().enumerate() {
        for (s, row) in sos.rows().into_iter().enumerate() {
            let coeffs = [row[0], row[1], row[2], row[3], row[4], row[5]];
            let mut z = [zf[[s, 0, lane_idx]], zf[[s, 1, lane_idx]]];
            biquad_inplace(&mut lane, coeffs, &mut z);
            zf[[s, 0, lane_idx]] = z[0];
            zf[[s, 1, lane_idx]] = z[1];
        }
    }
    Ok((y, zf.into_dyn()))
}

//==================================================================================
// 4. Unit Tests
//==================================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{IxDyn, Slice};

    fn gain_at(sos: &Array2<f64>, omega: f64) -> f64 {
        // |H(e^{jw})| of the cascade, evaluated directly.
        let (c, s1) = (omega.cos(), omega.sin());
        let (c2, s2) = ((2.0 * omega).cos(), (2.0 * omega).sin());
        sos.rows().into_iter().fold(1.0, |acc, r| {
            let num_re = r[0] + r[1] * c + r[2] * c2;
            let num_im = -(r[1] * s1 + r[2] * s2);
            let den_re = r[3] + r[4] * c + r[5] * c2;
            let den_im = -(r[4] * s1 + r[5] * s2);
            acc * (num_re.hypot(num_im) / den_re.hypot(den_im))
        })
    }

    #[test]
    fn test_lowpass_design_response() {
        let sos = butter_sos(4, 10.0, BandType::Lowpass, 50.0).unwrap();
        assert_eq!(sos.shape(), &[2, 6]);
        assert!((gain_at(&sos, 0.0) - 1.0).abs() < 1e-12);
        let cutoff = 2.0 * PI * 10.0 / 50.0;
        assert!((gain_at(&sos, cutoff) - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-9);
        assert!(gain_at(&sos, PI - 1e-6) < 1e-6);
    }

    #[test]
    fn test_highpass_odd_order_design_response() {
        let sos = butter_sos(3, 5.0, BandType::Highpass, 50.0).unwrap();
        assert_eq!(sos.shape(), &[2, 6]);
        assert_eq!(sos[[1, 2]], 0.0);
        assert!(gain_at(&sos, 0.0) < 1e-12);
        assert!((gain_at(&sos, PI) - 1.0).abs() < 1e-12);
        let cutoff = 2.0 * PI * 5.0 / 50.0;
        assert!((gain_at(&sos, cutoff) - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_design_parameters() {
        assert!(butter_sos(0, 1.0, BandType::Lowpass, 10.0).is_err());
        assert!(butter_sos(2, 5.0, BandType::Lowpass, 10.0).is_err());
        assert!(butter_sos(2, 1.0, BandType::Lowpass, -1.0).is_err());
        assert!("bandpass".parse::<BandType>().is_err());
        assert_eq!("low".parse::<BandType>().unwrap(), BandType::Lowpass);
    }

    #[test]
    fn test_chunked_filtering_matches_single_pass() {
        let sos = butter_sos(4, 10.0, BandType::Lowpass, 50.0).unwrap();
        let x = ArrayD::from_shape_fn(IxDyn(&[60, 3]), |idx| {
            ((idx[0] * 7 + idx[1] * 3) % 11) as f64 - 5.0
        });
        let (full, _) = sosfilt(&sos, &x, 0, None).unwrap();

        let mut zi = None;
        let mut parts = Vec::new();
        for start in (0..60).step_by(17) {
            let end = (start + 17).min(60);
            let chunk = x.slice_axis(Axis(0), Slice::from(start..end)).to_owned();
            let (y, zf) = sosfilt(&sos, &chunk, 0, zi.as_ref()).unwrap();
            parts.push(y);
            zi = Some(zf);
        }
        let views: Vec<_> = parts.iter().map(|p| p.view()).collect();
        let chunked = ndarray::concatenate(Axis(0), &views).unwrap();
        assert_eq!(chunked, full);
    }

    #[test]
    fn test_filtering_along_last_axis() {
        let sos = butter_sos(2, 1.0, BandType::Lowpass, 10.0).unwrap();
        let x = ArrayD::from_elem(IxDyn(&[2, 5]), 1.0);
        let (y, zf) = sosfilt(&sos, &x, 1, None).unwrap();
        assert_eq!(zf.shape(), &[1, 2, 2]);
        assert_eq!(y.index_axis(Axis(0), 0), y.index_axis(Axis(0), 1));
        assert!((y[[0, 0]] - sos[[0, 0]]).abs() < 1e-15);
    }

    #[test]
    fn test_bad_initial_conditions_are_rejected() {
        let sos = butter_sos(2, 1.0, BandType::Lowpass, 10.0).unwrap();
        let x = ArrayD::zeros(IxDyn(&[4, 3]));
        let zi = ArrayD::zeros(IxDyn(&[1, 2, 2]));
        assert!(matches!(
            sosfilt(&sos, &x, 0, Some(&zi)),
            Err(ComposeError::ShapeMismatch(_))
        ));
        assert!(sosfilt(&sos, &x, 2, None).is_err());
    }
}
