use super::EventFilter;
use crate::channels::{FSC_A, SSC_A};
use crate::error::Result;
use crate::utils::{channel_values, filter_rows};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Removes debris: keeps events whose forward- and side-scatter areas are
/// both strictly above their thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebrisRemoval {
    pub fsc_threshold: f64,
    pub ssc_threshold: f64,
}

impl Default for DebrisRemoval {
    fn default() -> Self {
        Self {
            fsc_threshold: 500.0,
            ssc_threshold: 500.0,
        }
    }
}

impl DebrisRemoval {
    pub fn new(fsc_threshold: f64, ssc_threshold: f64) -> Self {
        Self {
            fsc_threshold,
            ssc_threshold,
        }
    }
}

impl EventFilter for DebrisRemoval {
    fn name(&self) -> &'static str {
        "debris_removal"
    }

    fn apply(&self, df: &DataFrame) -> Result<DataFrame> {
        let fsc = channel_values(df, FSC_A)?;
        let ssc = channel_values(df, SSC_A)?;

        let mask: Vec<bool> = fsc
            .iter()
            .zip(&ssc)
            .map(|(f, s)| match (f, s) {
                (Some(f), Some(s)) => *f > self.fsc_threshold && *s > self.ssc_threshold,
                _ => false,
            })
            .collect();

        let filtered = filter_rows(df, &mask)?;
        debug!(
            "Debris removal (FSC > {}, SSC > {}): {} -> {} events",
            self.fsc_threshold,
            self.ssc_threshold,
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

    fn scatter_table() -> DataFrame {
        df![
            "FSC-A" => [100.0, 600.0, 1500.0, 1501.0, 2000.0, 800.0],
            "SSC-A" => [900.0, 700.0, 1600.0, 1501.0, 1500.0, 100.0],
            "CD4" => [1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
        ]
        .unwrap()
    }

    #[test]
    fn test_debris_removal_strict_threshold() {
        let df = scatter_table();
        let filtered = DebrisRemoval::new(1500.0, 1500.0).apply(&df).unwrap();

        // Only the row with both channels strictly above 1500 survives
        assert_eq!(filtered.height(), 1);
        let fsc_min = filtered.column("FSC-A").unwrap().f64().unwrap().min().unwrap();
        let ssc_min = filtered.column("SSC-A").unwrap().f64().unwrap().min().unwrap();
        assert!(fsc_min > 1500.0);
        assert!(ssc_min > 1500.0);
    }

    #[test]
    fn test_debris_removal_defaults() {
        let df = scatter_table();
        let filtered = DebrisRemoval::default().apply(&df).unwrap();

        assert_eq!(filtered.height(), 4);
        assert_eq!(filtered.width(), 3);
    }

    #[test]
    fn test_debris_removal_can_empty_table() {
        let df = scatter_table();
        let filtered = DebrisRemoval::new(1e9, 1e9).apply(&df).unwrap();
        assert_eq!(filtered.height(), 0);
        assert_eq!(filtered.width(), 3);
    }

    #[test]
    fn test_debris_removal_does_not_touch_input() {
        let df = scatter_table();
        let _ = DebrisRemoval::new(1000.0, 1000.0).apply(&df).unwrap();
        assert_eq!(df.height(), 6);
    }

    #[test]
    fn test_debris_removal_missing_scatter() {
        let df = df!["FSC-A" => [1000.0]].unwrap();
        let err = DebrisRemoval::default().apply(&df).unwrap_err();
        assert!(matches!(err, CytometryError::MissingColumn(name) if name == "SSC-A"));
    }

    #[test]
    fn test_debris_removal_threshold_sweep() {
        let df = scatter_table();
        for t in [0.0, 99.0, 500.0, 700.0, 1499.0, 1500.0, 1501.0] {
            let filtered = DebrisRemoval::new(t, t).apply(&df).unwrap();
            if filtered.height() == 0 {
                continue;
            }
            let fsc_min = filtered.column("FSC-A").unwrap().f64().unwrap().min().unwrap();
            let ssc_min = filtered.column("SSC-A").unwrap().f64().unwrap().min().unwrap();
            assert!(fsc_min > t, "FSC min {} not above {}", fsc_min, t);
            assert!(ssc_min > t, "SSC min {} not above {}", ssc_min, t);
        }
    }
}
