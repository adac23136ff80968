//! The closed set of steps a pipeline can run.

use crate::error::Result;
use crate::filters::{
    DeadCellRemoval, DebrisRemoval, DoubletRemoval, EventFilter, Normalization, OutlierRemoval,
};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

/// One configured filter in a pipeline.
///
/// Serialized with a `filter` tag next to the step's parameters, e.g.
/// `{"filter": "debris_removal", "fsc_threshold": 600.0}`. Omitted
/// parameters take their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "filter", rename_all = "snake_case")]
pub enum FilterStep {
    DebrisRemoval(DebrisRemoval),
    DeadCellRemoval(DeadCellRemoval),
    DoubletRemoval,
    Normalization(Normalization),
    OutlierRemoval(OutlierRemoval),
}

impl FilterStep {
    fn filter(&self) -> &dyn EventFilter {
        match self {
            Self::DebrisRemoval(f) => f,
            Self::DeadCellRemoval(f) => f,
            Self::DoubletRemoval => &DoubletRemoval,
            Self::Normalization(f) => f,
            Self::OutlierRemoval(f) => f,
        }
    }

    pub fn name(&self) -> &'static str {
        self.filter().name()
    }

    pub fn apply(&self, df: &DataFrame) -> Result<DataFrame> {
        self.filter().apply(df)
    }
}

impl From<DebrisRemoval> for FilterStep {
    fn from(f: DebrisRemoval) -> Self {
        Self::DebrisRemoval(f)
    }
}

impl From<DeadCellRemoval> for FilterStep {
    fn from(f: DeadCellRemoval) -> Self {
        Self::DeadCellRemoval(f)
    }
}

impl From<DoubletRemoval> for FilterStep {
    fn from(_: DoubletRemoval) -> Self {
        Self::DoubletRemoval
    }
}

impl From<Normalization> for FilterStep {
    fn from(f: Normalization) -> Self {
        Self::Normalization(f)
    }
}

impl From<OutlierRemoval> for FilterStep {
    fn from(f: OutlierRemoval) -> Self {
        Self::OutlierRemoval(f)
    }
}

/// The standard gating sequence: debris, dead cells, doublets, z-score
/// normalization, z-score outlier removal, all with default parameters.
pub fn default_steps() -> Vec<FilterStep> {
    vec![
        DebrisRemoval::default().into(),
        DeadCellRemoval::default().into(),
        FilterStep::DoubletRemoval,
        Normalization::default().into(),
        OutlierRemoval::default().into(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{NormalizationMethod, OutlierMethod};

    #[test]
    fn test_step_names() {
        let names: Vec<&str> = default_steps().iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec![
                "debris_removal",
                "dead_cell_removal",
                "doublet_removal",
                "normalization",
                "outlier_removal"
            ]
        );
    }

    #[test]
    fn test_step_from_json_with_defaults() {
        let json = r#"[
            {"filter": "debris_removal", "fsc_threshold": 600.0},
            {"filter": "dead_cell_removal"},
            {"filter": "doublet_removal"},
            {"filter": "normalization", "method": "minmax"},
            {"filter": "outlier_removal", "method": "iqr"}
        ]"#;

        let steps: Vec<FilterStep> = serde_json::from_str(json).unwrap();

        assert_eq!(
            steps[0],
            FilterStep::DebrisRemoval(DebrisRemoval::new(600.0, 500.0))
        );
        assert_eq!(steps[1], FilterStep::DeadCellRemoval(DeadCellRemoval::new(1500.0)));
        assert_eq!(steps[2], FilterStep::DoubletRemoval);
        assert_eq!(
            steps[3],
            FilterStep::Normalization(Normalization::new(NormalizationMethod::MinMax))
        );
        assert_eq!(
            steps[4],
            FilterStep::OutlierRemoval(OutlierRemoval::new(OutlierMethod::Iqr, 3.0))
        );
    }

    #[test]
    fn test_step_from_json_bogus_method() {
        let json = r#"{"filter": "normalization", "method": "bogus"}"#;
        let err = serde_json::from_str::<FilterStep>(json).unwrap_err();
        assert!(err.to_string().contains("bogus"));
    }

    #[test]
    fn test_step_serialization_tag() {
        let json = serde_json::to_string(&FilterStep::DoubletRemoval).unwrap();
        assert_eq!(json, r#"{"filter":"doublet_removal"}"#);
    }
}
