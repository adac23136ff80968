use super::EventFilter;
use crate::error::{CytometryError, Result};
use crate::stats::descriptive::Moments;
use crate::utils::{channel_series, measurement_channels};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// How to rescale each channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum NormalizationMethod {
    /// `(x − mean) / std`
    #[default]
    ZScore,
    /// `(x − min) / (max − min)`
    MinMax,
}

impl NormalizationMethod {
    pub const SUPPORTED: &'static str = "zscore, minmax";

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ZScore => "zscore",
            Self::MinMax => "minmax",
        }
    }
}

impl fmt::Display for NormalizationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NormalizationMethod {
    type Err = CytometryError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zscore" => Ok(Self::ZScore),
            "minmax" => Ok(Self::MinMax),
            _ => Err(CytometryError::UnsupportedMethod {
                kind: "normalization",
                method: s.to_string(),
                supported: Self::SUPPORTED,
            }),
        }
    }
}

impl TryFrom<String> for NormalizationMethod {
    type Error = CytometryError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// Rescales every measurement channel independently over the whole table.
///
/// A channel with zero spread (constant, or a single event) cannot be
/// rescaled and fails with [`CytometryError::DegenerateColumn`]. A channel
/// without any non-null value, as in a table emptied by an earlier gate, is
/// left as is. Nulls stay null. Non-numeric columns and a `Cluster` label
/// column are passed through unchanged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Normalization {
    pub method: NormalizationMethod,
}

impl Normalization {
    pub fn new(method: NormalizationMethod) -> Self {
        Self { method }
    }

    /// `None` when the channel has no values to rescale.
    fn rescale(&self, name: &str, values: &Float64Chunked) -> Result<Option<Float64Chunked>> {
        let degenerate = |measure| CytometryError::DegenerateColumn {
            column: name.to_string(),
            measure,
        };

        match self.method {
            NormalizationMethod::ZScore => {
                let Some(Moments { mean, std }) = Moments::of(values) else {
                    return Ok(None);
                };
                if std == 0.0 {
                    return Err(degenerate("variance"));
                }
                Ok(Some(values.apply_values(|x| (x - mean) / std)))
            }
            NormalizationMethod::MinMax => {
                let (Some(min), Some(max)) = (values.min(), values.max()) else {
                    return Ok(None);
                };
                let range = max - min;
                if range == 0.0 {
                    return Err(degenerate("range"));
                }
                Ok(Some(values.apply_values(|x| (x - min) / range)))
            }
        }
    }
}

impl EventFilter for Normalization {
    fn name(&self) -> &'static str {
        "normalization"
    }

    fn apply(&self, df: &DataFrame) -> Result<DataFrame> {
        let channels = measurement_channels(df);
        let mut normalized = df.clone();
        let mut rescaled = 0;

        for name in &channels {
            let values = channel_series(df, name)?;
            if let Some(scaled) = self.rescale(name, &values)? {
                normalized.replace(name, scaled.into_series())?;
                rescaled += 1;
            }
        }

        debug!(
            "Normalized {} of {} channels ({})",
            rescaled,
            channels.len(),
            self.method
        );
        Ok(normalized)
    }
}
