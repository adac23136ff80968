//! Event filter primitives.
//!
//! Each filter is a small parameter struct implementing [`EventFilter`]. A
//! filter takes an event table and returns a *new* table with the same
//! column schema and at most as many rows; the input is never modified.
//!
//! - [`DebrisRemoval`]: drops low-scatter particulate
//! - [`DeadCellRemoval`]: drops events below the viability threshold
//! - [`DoubletRemoval`]: drops events with anomalous height/area ratios
//! - [`Normalization`]: rescales every numeric channel (z-score or min-max)
//! - [`OutlierRemoval`]: drops events outside z-score or IQR bounds

mod debris;
mod doublets;
mod normalization;
mod outliers;
mod viability;

pub use debris::DebrisRemoval;
pub use doublets::{DOUBLET_RATIO_MAX, DOUBLET_RATIO_MIN, DoubletRemoval};
pub use normalization::{NormalizationMethod, Normalization};
pub use outliers::{OutlierMethod, OutlierRemoval};
pub use viability::DeadCellRemoval;

use crate::error::Result;
use polars::prelude::DataFrame;

/// A stateless transformation over an event table.
pub trait EventFilter {
    /// Short snake_case name used in logs and step records.
    fn name(&self) -> &'static str;

    /// Apply the filter, producing a new table.
    fn apply(&self, df: &DataFrame) -> Result<DataFrame>;
}
