// In: src/data.rs

//! A minimal labeled array used as the data payload flowing through pipelines.
//!
//! The composition core treats data as opaque. This type only provides what the
//! chunked-execution contract needs from a data collection: named dimensions,
//! partitioning into ordered chunks along one dimension, concatenation back along
//! that dimension, and exact equality for testing. Coordinates, file I/O and lazy
//! storage are deliberately not modelled here.

use ndarray::{ArrayD, Axis, IxDyn, Slice};
use std::ops::Range;

use crate::error::{ComposeError, Result};

/// An n-dimensional `f64` array whose axes are identified by name.
#[derive(Debug, Clone, PartialEq)]
pub struct DataArray {
    values: ArrayD<f64>,
    dims: Vec<String>,
    name: Option<String>,
}

impl DataArray {
    /// Creates a labeled array. `dims` must name every axis exactly once.
    pub fn new<S: Into<String>>(values: ArrayD<f64>, dims: Vec<S>) -> Result<Self> {
        let dims: Vec<String> = dims.into_iter().map(Into::into).collect();
        if dims.len() != values.ndim() {
            return Err(ComposeError::ShapeMismatch(format!(
                "{} dimension name(s) given for an array of rank {}",
                dims.len(),
                values.ndim()
            )));
        }
        for (i, dim) in dims.iter().enumerate() {
            if dims[..i].contains(dim) {
                return Err(ComposeError::Argument(format!(
                    "Dimension '{}' appears more than once",
                    dim
                )));
            }
        }
        Ok(Self {
            values,
            dims,
            name: None,
        })
    }

    /// Builds a labeled array from a flat, row-major buffer.
    pub fn from_shape_vec<S: Into<String>>(
        shape: &[usize],
        data: Vec<f64>,
        dims: Vec<S>,
    ) -> Result<Self> {
        let values = ArrayD::from_shape_vec(IxDyn(shape), data)?;
        Self::new(values, dims)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn values(&self) -> &ArrayD<f64> {
        &self.values
    }

    pub fn into_values(self) -> ArrayD<f64> {
        self.values
    }

    pub fn dims(&self) -> &[String] {
        &self.dims
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn shape(&self) -> &[usize] {
        self.values.shape()
    }

    /// Resolves a dimension name to its axis index.
    pub fn axis(&self, dim: &str) -> Result<usize> {
        self.dims.iter().position(|d| d == dim).ok_or_else(|| {
            ComposeError::Computation(format!(
                "Dimension '{}' not found in {:?}",
                dim, self.dims
            ))
        })
    }

    pub fn len_of(&self, dim: &str) -> Result<usize> {
        Ok(self.values.len_of(Axis(self.axis(dim)?)))
    }

    /// Replaces the values while keeping labels. The rank must not change.
    pub fn with_values(&self, values: ArrayD<f64>) -> Result<Self> {
        if values.ndim() != self.dims.len() {
            return Err(ComposeError::ShapeMismatch(format!(
                "Replacement values have rank {}, expected {}",
                values.ndim(),
                self.dims.len()
            )));
        }
        Ok(Self {
            values,
            dims: self.dims.clone(),
            name: self.name.clone(),
        })
    }

    /// Applies `f` to every element, keeping labels.
    pub fn map_values<F: Fn(f64) -> f64>(&self, f: F) -> Self {
        Self {
            values: self.values.mapv(f),
            dims: self.dims.clone(),
            name: self.name.clone(),
        }
    }

    /// Wraps values whose `dim` axis has been reduced away.
    pub fn reduce_dim(&self, dim: &str, values: ArrayD<f64>) -> Result<Self> {
        let axis = self.axis(dim)?;
        let mut dims = self.dims.clone();
        dims.remove(axis);
        let mut reduced = Self::new(values, dims)?;
        reduced.name = self.name.clone();
        Ok(reduced)
    }

    /// Returns the sub-array covering `range` along `dim`.
    pub fn slice_along(&self, dim: &str, range: Range<usize>) -> Result<Self> {
        let axis = self.axis(dim)?;
        let len = self.values.len_of(Axis(axis));
        if range.start > range.end || range.end > len {
            return Err(ComposeError::ShapeMismatch(format!(
                "Slice {:?} out of bounds for '{}' of length {}",
                range, dim, len
            )));
        }
        let values = self
            .values
            .slice_axis(Axis(axis), Slice::from(range))
            .to_owned();
        self.with_values(values)
    }

    /// Splits the array into `n` ordered, non-overlapping chunks along `dim`.
    ///
    /// When the length is not divisible by `n`, the first `len % n` chunks each
    /// receive one extra element, so chunk sizes differ by at most one.
    pub fn chunk(&self, n: usize, dim: &str) -> Result<Vec<Self>> {
        if n == 0 {
            return Err(ComposeError::Argument(
                "Cannot split into zero chunks".into(),
            ));
        }
        let len = self.len_of(dim)?;
        let (base, extra) = (len / n, len % n);
        let mut chunks = Vec::with_capacity(n);
        let mut start = 0;
        for i in 0..n {
            let size = base + usize::from(i < extra);
            chunks.push(self.slice_along(dim, start..start + size)?);
            start += size;
        }
        Ok(chunks)
    }

    /// Joins chunks back together along `dim`. All parts must share labels.
    pub fn concatenate(parts: &[DataArray], dim: &str) -> Result<Self> {
        let first = parts.first().ok_or_else(|| {
            ComposeError::Argument("Cannot concatenate an empty list of arrays".into())
        })?;
        if let Some(odd) = parts.iter().find(|p| p.dims != first.dims) {
            return Err(ComposeError::ShapeMismatch(format!(
                "Cannot concatenate dims {:?} with {:?}",
                first.dims, odd.dims
            )));
        }
        let axis = first.axis(dim)?;
        let views: Vec<_> = parts.iter().map(|p| p.values.view()).collect();
        let values = ndarray::concatenate(Axis(axis), &views)?;
        first.with_values(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> DataArray {
        let data: Vec<f64> = (0..20).map(|v| v as f64).collect();
        DataArray::from_shape_vec(&[10, 2], data, vec!["time", "distance"]).unwrap()
    }

    #[test]
    fn test_new_rejects_wrong_rank_and_duplicate_dims() {
        let values = ArrayD::<f64>::zeros(IxDyn(&[3, 2]));
        assert!(matches!(
            DataArray::new(values.clone(), vec!["time"]),
            Err(ComposeError::ShapeMismatch(_))
        ));
        assert!(matches!(
            DataArray::new(values, vec!["time", "time"]),
            Err(ComposeError::Argument(_))
        ));
    }

    #[test]
    fn test_chunk_sizes_follow_array_split() {
        let chunks = sample().chunk(3, "time").unwrap();
        let sizes: Vec<usize> = chunks.iter().map(|c| c.len_of("time").unwrap()).collect();
        assert_eq!(sizes, vec![4, 3, 3]);
    }

    #[test]
    fn test_chunk_then_concatenate_restores_original() {
        let original = sample();
        for n in 1..=10 {
            let chunks = original.chunk(n, "time").unwrap();
            let joined = DataArray::concatenate(&chunks, "time").unwrap();
            assert_eq!(joined, original, "failed for {} chunks", n);
        }
    }

    #[test]
    fn test_chunk_along_second_dim() {
        let chunks = sample().chunk(2, "distance").unwrap();
        assert_eq!(chunks[0].shape(), &[10, 1]);
        assert_eq!(chunks[1].values()[[3, 0]], 7.0);
    }

    #[test]
    fn test_unknown_dim_and_zero_chunks_fail() {
        let da = sample();
        assert!(da.axis("depth").is_err());
        assert!(matches!(da.chunk(0, "time"), Err(ComposeError::Argument(_))));
        assert!(DataArray::concatenate(&[], "time").is_err());
    }

    #[test]
    fn test_reduce_dim_drops_label() {
        let da = sample().with_name("strain");
        let summed = da.values().sum_axis(Axis(0));
        let reduced = da.reduce_dim("time", summed).unwrap();
        assert_eq!(reduced.dims(), &["distance".to_string()]);
        assert_eq!(reduced.name(), Some("strain"));
    }
}
