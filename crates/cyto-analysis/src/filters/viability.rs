use super::EventFilter;
use crate::channels::VIABILITY;
use crate::error::Result;
use crate::utils::{channel_values, filter_rows};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Removes dead cells: keeps events whose viability signal is strictly above
/// the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeadCellRemoval {
    pub viability_threshold: f64,
}

impl Default for DeadCellRemoval {
    fn default() -> Self {
        Self {
            viability_threshold: 1500.0,
        }
    }
}

impl DeadCellRemoval {
    pub fn new(viability_threshold: f64) -> Self {
        Self {
            viability_threshold,
        }
    }
}

impl EventFilter for DeadCellRemoval {
    fn name(&self) -> &'static str {
        "dead_cell_removal"
    }

    fn apply(&self, df: &DataFrame) -> Result<DataFrame> {
        let viability = channel_values(df, VIABILITY)?;

        let mask: Vec<bool> = viability
            .iter()
            .map(|v| v.is_some_and(|v| v > self.viability_threshold))
            .collect();

        let filtered = filter_rows(df, &mask)?;
        debug!(
            "Dead cell removal (Viability > {}): {} -> {} events",
            self.viability_threshold,
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
    fn test_remove_dead_threshold() {
        let df = df![
            "FSC-A" => [1.0, 2.0, 3.0, 4.0],
            "Viability" => [1000.0, 2000.0, 2500.0, 3000.0],
        ]
        .unwrap();

        let filtered = DeadCellRemoval::new(2000.0).apply(&df).unwrap();
        assert_eq!(filtered.height(), 2);
        let min = filtered.column("Viability").unwrap().f64().unwrap().min().unwrap();
        assert!(min > 2000.0);
    }

    #[test]
    fn test_remove_dead_default_threshold() {
        let df = df!["Viability" => [1499.0, 1500.0, 1501.0]].unwrap();
        let filtered = DeadCellRemoval::default().apply(&df).unwrap();
        assert_eq!(filtered.height(), 1);
    }

    #[test]
    fn test_remove_dead_missing_column() {
        let df = df![
            "FSC-A" => [1.0, 2.0],
            "SSC-A" => [1.0, 2.0],
        ]
        .unwrap();

        let err = DeadCellRemoval::new(2000.0).apply(&df).unwrap_err();
        assert!(matches!(err, CytometryError::MissingColumn(name) if name == "Viability"));
    }

    #[test]
    fn test_remove_dead_drops_null_viability() {
        let df = df!["Viability" => [Some(3000.0), None]].unwrap();
        let filtered = DeadCellRemoval::default().apply(&df).unwrap();
        assert_eq!(filtered.height(), 1);
    }
}
