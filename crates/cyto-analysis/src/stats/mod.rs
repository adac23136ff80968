//! Population statistics over filtered and clustered event tables.
//!
//! Everything here is read-only: inputs are borrowed and never modified.
//!
//! - [`population_statistics`] - per-cluster mean / std / median per channel
//! - [`cluster_proportions`] - share of events per cluster
//! - [`identify_outliers`] - events with an extreme z-score on any channel
//! - [`marker_correlation`] - Pearson matrix over selected markers
//! - [`summarize`] - count / mean / std / quartiles per channel

mod correlation;
pub mod descriptive;
mod outliers;
mod population;
mod summary;

pub use correlation::{CorrelationMatrix, marker_correlation};
pub use outliers::identify_outliers;
pub use population::{
    ChannelStats, ClusterProportion, ClusterProportions, ClusterStats, PopulationStatistics,
    cluster_proportions, population_statistics,
};
pub use summary::{ChannelSummary, DatasetSummary, summarize};
