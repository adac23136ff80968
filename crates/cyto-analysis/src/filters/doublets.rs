use super::EventFilter;
use crate::channels::{FSC_A, FSC_H, SSC_A, SSC_H};
use crate::error::Result;
use crate::utils::{channel_values, filter_rows, require_channels};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Lower bound for the height/area ratio of a singlet.
pub const DOUBLET_RATIO_MIN: f64 = 0.8;
/// Upper bound for the height/area ratio of a singlet.
pub const DOUBLET_RATIO_MAX: f64 = 1.2;

/// Removes doublets: keeps events whose forward- and side-scatter
/// height/area ratios both lie within
/// [`DOUBLET_RATIO_MIN`, `DOUBLET_RATIO_MAX`].
///
/// The ratios are computed per row and discarded; they never appear as
/// columns in the returned table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoubletRemoval;

fn singlet_ratio(height: Option<f64>, area: Option<f64>) -> bool {
    match (height, area) {
        (Some(h), Some(a)) => {
            let ratio = h / a;
            (DOUBLET_RATIO_MIN..=DOUBLET_RATIO_MAX).contains(&ratio)
        }
        _ => false,
    }
}

impl EventFilter for DoubletRemoval {
    fn name(&self) -> &'static str {
        "doublet_removal"
    }

    fn apply(&self, df: &DataFrame) -> Result<DataFrame> {
        require_channels(df, &[FSC_H, SSC_H, FSC_A, SSC_A])?;

        let fsc_h = channel_values(df, FSC_H)?;
        let fsc_a = channel_values(df, FSC_A)?;
        let ssc_h = channel_values(df, SSC_H)?;
        let ssc_a = channel_values(df, SSC_A)?;

        let mask: Vec<bool> = (0..df.height())
            .map(|i| singlet_ratio(fsc_h[i], fsc_a[i]) && singlet_ratio(ssc_h[i], ssc_a[i]))
            .collect();

        let filtered = filter_rows(df, &mask)?;
        debug!(
            "Doublet removal: {} -> {} events",
            df.height(),
            filtered.height()
        );
        Ok(filtered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CytometryError;

    #[test]
    fn test_remove_doublets_ratio_bounds() {
        let df = df![
            "FSC-A" => [1000.0, 1000.0, 1000.0, 1000.0, 1000.0],
            "FSC-H" => [1000.0, 800.0, 1200.0, 1500.0, 1000.0],
            "SSC-A" => [500.0, 500.0, 500.0, 500.0, 500.0],
            "SSC-H" => [500.0, 400.0, 600.0, 500.0, 300.0],
        ]
        .unwrap();

        let filtered = DoubletRemoval.apply(&df).unwrap();

        // Bounds are inclusive; rows 3 (FSC ratio 1.5) and 4 (SSC ratio 0.6) go
        assert_eq!(filtered.height(), 3);
    }

    #[test]
    fn test_remove_doublets_leaves_schema_unchanged() {
        let df = df![
            "FSC-A" => [1000.0, 1000.0],
            "FSC-H" => [1000.0, 2000.0],
            "SSC-A" => [500.0, 500.0],
            "SSC-H" => [500.0, 500.0],
            "CD3" => [1.0, 2.0],
        ]
        .unwrap();

        let filtered = DoubletRemoval.apply(&df).unwrap();
        let names: Vec<String> = filtered
            .get_column_names()
            .iter()
            .map(|s| s.to_string())
            .collect();

        assert_eq!(names, vec!["FSC-A", "FSC-H", "SSC-A", "SSC-H", "CD3"]);
        assert_eq!(filtered.height(), 1);
    }

    #[test]
    fn test_remove_doublets_missing_height() {
        let df = df![
            "FSC-A" => [1000.0],
            "SSC-A" => [500.0],
            "SSC-H" => [500.0],
        ]
        .unwrap();

        let err = DoubletRemoval.apply(&df).unwrap_err();
        assert!(matches!(err, CytometryError::MissingColumn(name) if name == "FSC-H"));
    }

    #[test]
    fn test_remove_doublets_zero_area_dropped() {
        let df = df![
            "FSC-A" => [0.0],
            "FSC-H" => [100.0],
            "SSC-A" => [100.0],
            "SSC-H" => [100.0],
        ]
        .unwrap();

        // Ratio is infinite, outside the singlet band
        assert_eq!(DoubletRemoval.apply(&df).unwrap().height(), 0);
    }
}
