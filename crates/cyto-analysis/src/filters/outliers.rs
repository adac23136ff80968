use super::EventFilter;
use crate::error::{CytometryError, Result};
use crate::stats::descriptive::{Moments, iqr_bounds};
use crate::utils::{channel_series, filter_rows, measurement_channels};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Rule used to decide whether a value is an outlier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum OutlierMethod {
    /// `|z| < threshold` on every channel
    #[default]
    ZScore,
    /// Inside Tukey fences on every channel
    Iqr,
}

impl OutlierMethod {
    pub const SUPPORTED: &'static str = "zscore, iqr";

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ZScore => "zscore",
            Self::Iqr => "iqr",
        }
    }
}

impl fmt::Display for OutlierMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutlierMethod {
    type Err = CytometryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zscore" => Ok(Self::ZScore),
            "iqr" => Ok(Self::Iqr),
            _ => Err(CytometryError::UnsupportedMethod {
                kind: "outlier",
                method: s.to_string(),
                supported: Self::SUPPORTED,
            }),
        }
    }
}

impl TryFrom<String> for OutlierMethod {
    type Error = CytometryError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// Removes events that are outliers on any measurement channel.
///
/// A channel with zero spread flags nothing. A `Cluster` label column is
/// never tested.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutlierRemoval {
    pub method: OutlierMethod,
    /// Largest accepted `|z|`. Read by [`OutlierMethod::ZScore`] only; the
    /// IQR rule always uses 1.5 × IQR fences.
    pub threshold: f64,
}

impl Default for OutlierRemoval {
    fn default() -> Self {
        Self {
            method: OutlierMethod::ZScore,
            threshold: 3.0,
        }
    }
}

impl OutlierRemoval {
    pub fn new(method: OutlierMethod, threshold: f64) -> Self {
        Self { method, threshold }
    }

    pub fn zscore(threshold: f64) -> Self {
        Self::new(OutlierMethod::ZScore, threshold)
    }

    /// IQR rule. `threshold` keeps its default and is not consulted.
    pub fn iqr() -> Self {
        Self {
            method: OutlierMethod::Iqr,
            ..Self::default()
        }
    }

    /// Mark rows of one channel that fall inside the accepted range.
    fn mark_inliers(&self, values: &Float64Chunked, keep: &mut [bool]) -> Result<()> {
        match self.method {
            OutlierMethod::ZScore => {
                let Some(moments) = Moments::of(values) else {
                    return Ok(());
                };
                for (flag, value) in keep.iter_mut().zip(values.into_iter()) {
                    *flag &= match value {
                        Some(v) => moments.z(v).is_none_or(|z| z.abs() < self.threshold),
                        None => false,
                    };
                }
            }
            OutlierMethod::Iqr => {
                let Some((lower, upper)) = iqr_bounds(values)? else {
                    return Ok(());
                };
                for (flag, value) in keep.iter_mut().zip(values.into_iter()) {
                    *flag &= value.is_some_and(|v| v >= lower && v <= upper);
                }
            }
        }
        Ok(())
    }
}

impl EventFilter for OutlierRemoval {
    fn name(&self) -> &'static str {
        "outlier_removal"
    }

    fn apply(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut keep = vec![true; df.height()];

        for name in measurement_channels(df) {
            let values = channel_series(df, &name)?;
            self.mark_inliers(&values, &mut keep)?;
        }

        let filtered = filter_rows(df, &keep)?;
        match self.method {
            OutlierMethod::ZScore => debug!(
                "Outlier removal (zscore, threshold {}): {} -> {} events",
                self.threshold,
                df.height(),
                filtered.height()
            ),
            OutlierMethod::Iqr => debug!(
                "Outlier removal (iqr): {} -> {} events",
                df.height(),
                filtered.height()
            ),
        }
        Ok(filtered)
    }
}
