//! Descriptive statistics over `Float64` channels.
//!
//! Thin wrappers over Polars aggregations that pin down the conventions used
//! across the crate: nulls are ignored, standard deviation is the sample
//! estimate (n − 1 denominator) and quantiles use linear interpolation.

use crate::error::Result;
use polars::prelude::*;

/// Number of non-null values.
#[inline]
pub fn non_null_count(values: &Float64Chunked) -> usize {
    values.len() - values.null_count()
}

/// Sample standard deviation. Zero for fewer than two values.
pub fn sample_std(values: &Float64Chunked) -> f64 {
    if non_null_count(values) <= 1 {
        return 0.0;
    }
    values.std(1).unwrap_or(0.0)
}

/// Linearly interpolated quantile, `q` in `[0, 1]`. `None` without values.
pub fn quantile(values: &Float64Chunked, q: f64) -> Result<Option<f64>> {
    Ok(values.quantile(q.clamp(0.0, 1.0), QuantileMethod::Linear)?)
}

/// Tukey fences `[Q1 − 1.5·IQR, Q3 + 1.5·IQR]`.
pub fn iqr_bounds(values: &Float64Chunked) -> Result<Option<(f64, f64)>> {
    let (Some(q1), Some(q3)) = (quantile(values, 0.25)?, quantile(values, 0.75)?) else {
        return Ok(None);
    };
    let iqr = q3 - q1;

    Ok(Some((q1 - 1.5 * iqr, q3 + 1.5 * iqr)))
}

/// Mean and sample standard deviation of one channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Moments {
    pub mean: f64,
    pub std: f64,
}

impl Moments {
    /// `None` when the channel has no non-null values.
    pub fn of(values: &Float64Chunked) -> Option<Self> {
        Some(Self {
            mean: values.mean()?,
            std: sample_std(values),
        })
    }

    /// Z-score of a value. `None` when the spread is zero.
    pub fn z(&self, value: f64) -> Option<f64> {
        if self.std == 0.0 {
            None
        } else {
            Some((value - self.mean) / self.std)
        }
    }
}
