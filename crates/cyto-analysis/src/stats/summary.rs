use super::descriptive::{non_null_count, quantile, sample_std};
use crate::error::Result;
use crate::utils::{channel_series, measurement_channels};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Count, mean, std, min, quartiles and max of one channel.
///
/// Every field except `count` is `None` for a channel with no non-null values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSummary {
    pub channel: String,
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    #[serde(rename = "25%")]
    pub q25: Option<f64>,
    #[serde(rename = "50%")]
    pub median: Option<f64>,
    #[serde(rename = "75%")]
    pub q75: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub rows: usize,
    pub channels: Vec<ChannelSummary>,
}

impl DatasetSummary {
    pub fn channel(&self, name: &str) -> Option<&ChannelSummary> {
        self.channels.iter().find(|c| c.channel == name)
    }
}

/// Describe every numeric channel of the table except a `Cluster` column.
pub fn summarize(df: &DataFrame) -> Result<DatasetSummary> {
    let channels = measurement_channels(df)
        .into_iter()
        .map(|name| -> Result<ChannelSummary> {
            let values = channel_series(df, &name)?;
            let count = non_null_count(&values);
            Ok(ChannelSummary {
                count,
                mean: values.mean(),
                std: (count > 0).then(|| sample_std(&values)),
                min: values.min(),
                q25: quantile(&values, 0.25)?,
                median: quantile(&values, 0.5)?,
                q75: quantile(&values, 0.75)?,
                max: values.max(),
                channel: name,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(DatasetSummary {
        rows: df.height(),
        channels,
    })
}
