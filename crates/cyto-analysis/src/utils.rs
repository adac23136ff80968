//! Shared helpers for reading channels out of an event table.
//!
//! Filters, clustering and statistics all work on plain `f64` buffers pulled
//! out of the `DataFrame`; these helpers keep that extraction (and the
//! mapping of a missing column onto [`CytometryError::MissingColumn`]) in one
//! place.

use crate::channels::CLUSTER;
use crate::error::{CytometryError, Result, ResultExt};
use polars::prelude::*;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Names of all numeric channels, in table order.
pub fn numeric_channels(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|col| is_numeric_dtype(col.dtype()))
        .map(|col| col.name().to_string())
        .collect()
}

/// Numeric channels that carry measurements, i.e. everything but a
/// `Cluster` label column.
pub fn measurement_channels(df: &DataFrame) -> Vec<String> {
    numeric_channels(df)
        .into_iter()
        .filter(|name| name != CLUSTER)
        .collect()
}

/// Fail with `MissingColumn` for the first channel absent from the table.
pub fn require_channels(df: &DataFrame, channels: &[&str]) -> Result<()> {
    for channel in channels {
        if df.column(channel).is_err() {
            return Err(CytometryError::MissingColumn(channel.to_string()));
        }
    }
    Ok(())
}

// =============================================================================
// Channel Extraction
// =============================================================================

/// Read a channel as a `Float64` chunked array, preserving nulls and the name.
pub fn channel_series(df: &DataFrame, name: &str) -> Result<Float64Chunked> {
    let column = df
        .column(name)
        .map_err(|_| CytometryError::MissingColumn(name.to_string()))?;
    let float_series = column
        .as_materialized_series()
        .cast(&DataType::Float64)
        .context(format!("Reading channel '{}'", name))?;
    Ok(float_series.f64()?.clone())
}

/// Read a channel as `f64`, preserving nulls.
pub fn channel_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>> {
    Ok(channel_series(df, name)?.into_iter().collect())
}

/// Row-major matrix of the given channels. Nulls become NaN.
pub fn channel_matrix(df: &DataFrame, channels: &[String]) -> Result<Vec<Vec<f64>>> {
    let n_rows = df.height();
    let mut matrix = vec![vec![f64::NAN; channels.len()]; n_rows];

    for (col_idx, name) in channels.iter().enumerate() {
        let values = channel_values(df, name)?;
        for (row, value) in matrix.iter_mut().zip(values) {
            if let Some(v) = value {
                row[col_idx] = v;
            }
        }
    }

    Ok(matrix)
}

// =============================================================================
// Row Selection
// =============================================================================

/// Keep the rows whose mask entry is `true`. Returns a new table.
pub fn filter_rows(df: &DataFrame, mask: &[bool]) -> Result<DataFrame> {
    let mask = BooleanChunked::from_slice("mask".into(), mask);
    Ok(df.filter(&mask)?)
}
