use super::descriptive::sample_std;
use crate::clustering::ClusterAssignment;
use crate::error::{CytometryError, Result};
use crate::utils::{channel_series, measurement_channels};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Mean, sample standard deviation and median of one channel within one cluster.
///
/// `mean` and `median` are `None` when every value of the channel is null
/// inside the cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelStats {
    pub channel: String,
    pub mean: Option<f64>,
    pub std: f64,
    pub median: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterStats {
    pub cluster: u32,
    pub count: usize,
    pub channels: Vec<ChannelStats>,
}

impl ClusterStats {
    pub fn channel(&self, name: &str) -> Option<&ChannelStats> {
        self.channels.iter().find(|c| c.channel == name)
    }
}

/// Per-cluster statistics, ordered by cluster id.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PopulationStatistics {
    pub clusters: Vec<ClusterStats>,
}

impl PopulationStatistics {
    pub fn cluster(&self, id: u32) -> Option<&ClusterStats> {
        self.clusters.iter().find(|c| c.cluster == id)
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }
}

/// Share of events in one cluster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterProportion {
    pub cluster: u32,
    pub count: usize,
    pub proportion: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterProportions {
    pub total: usize,
    pub clusters: Vec<ClusterProportion>,
}

impl ClusterProportions {
    pub fn get(&self, id: u32) -> Option<f64> {
        self.clusters
            .iter()
            .find(|c| c.cluster == id)
            .map(|c| c.proportion)
    }

    pub fn sum(&self) -> f64 {
        self.clusters.iter().map(|c| c.proportion).sum()
    }
}

/// Describe every present cluster on every numeric channel of `df`.
///
/// The table must be the one the assignment was fitted on (same rows, same
/// order). A `Cluster` column, if present, is not described.
pub fn population_statistics(
    df: &DataFrame,
    assignment: &ClusterAssignment,
) -> Result<PopulationStatistics> {
    if assignment.len() != df.height() {
        return Err(CytometryError::AssignmentMismatch {
            labels: assignment.len(),
            rows: df.height(),
        });
    }

    let channels = measurement_channels(df);
    let columns = channels
        .iter()
        .map(|name| channel_series(df, name))
        .collect::<Result<Vec<_>>>()?;

    let labels = assignment.labels();
    let clusters = assignment
        .counts()
        .into_iter()
        .map(|(cluster, count)| -> Result<ClusterStats> {
            let mask = BooleanChunked::from_iter_values(
                "mask".into(),
                labels.iter().map(|label| *label == cluster),
            );
            let channels = channels
                .iter()
                .zip(&columns)
                .map(|(name, values)| -> Result<ChannelStats> {
                    let members = values.filter(&mask)?;
                    Ok(ChannelStats {
                        channel: name.clone(),
                        mean: members.mean(),
                        std: sample_std(&members),
                        median: members.median(),
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(ClusterStats {
                cluster,
                count,
                channels,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    debug!(
        "Computed statistics for {} clusters over {} channels",
        clusters.len(),
        channels.len()
    );

    Ok(PopulationStatistics { clusters })
}

/// Fraction of events in each present cluster. Sums to 1.
pub fn cluster_proportions(assignment: &ClusterAssignment) -> Result<ClusterProportions> {
    let total = assignment.len();
    if total == 0 {
        return Err(CytometryError::EmptyInput);
    }

    let clusters = assignment
        .counts()
        .into_iter()
        .map(|(cluster, count)| ClusterProportion {
            cluster,
            count,
            proportion: count as f64 / total as f64,
        })
        .collect();

    Ok(ClusterProportions { total, clusters })
}
