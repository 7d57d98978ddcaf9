// In: src/synthetics.rs

//! Reproducible synthetic recordings for tests, benchmarks and examples.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::f64::consts::PI;

use crate::data::DataArray;
use crate::error::Result;

/// Sampling rate of the generated `time` axis, in Hz.
pub const SAMPLING_RATE: f64 = 50.0;

/// Generates a `(time, distance)` array: a few sinusoids whose phase drifts along
/// distance, plus uniform noise. The same `seed` always yields the same array.
pub fn generate(n_time: usize, n_distance: usize, seed: u64) -> Result<DataArray> {
    let mut rng = StdRng::seed_from_u64(seed);
    let tones: Vec<(f64, f64)> = (0..3)
        .map(|_| (rng.random_range(0.5..20.0), rng.random_range(0.2..1.0)))
        .collect();

    let mut values = Vec::with_capacity(n_time * n_distance);
    for t in 0..n_time {
        let time = t as f64 / SAMPLING_RATE;
        for d in 0..n_distance {
            let phase = d as f64 * 0.1;
            let signal: f64 = tones
                .iter()
                .map(|&(freq, amp)| amp * (2.0 * PI * freq * time + phase).sin())
                .sum();
            values.push(signal + rng.random_range(-0.1..0.1));
        }
    }
    Ok(DataArray::from_shape_vec(&[n_time, n_distance], values, vec!["time", "distance"])?
        .with_name("synthetic"))
}
