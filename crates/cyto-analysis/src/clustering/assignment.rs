use crate::channels::CLUSTER;
use crate::error::Result;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Result of a k-means fit: one label per event plus the fitted centroids.
///
/// Labels are in `0..n_clusters` and line up with the rows of the table the
/// model was fitted on. Label numbering is arbitrary; with a fixed seed it is
/// stable between runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    labels: Vec<u32>,
    centroids: Vec<Vec<f64>>,
    channels: Vec<String>,
    inertia: f64,
    iterations: usize,
    converged: bool,
}

impl ClusterAssignment {
    pub(crate) fn new(
        labels: Vec<u32>,
        centroids: Vec<Vec<f64>>,
        channels: Vec<String>,
        inertia: f64,
        iterations: usize,
        converged: bool,
    ) -> Self {
        Self {
            labels,
            centroids,
            channels,
            inertia,
            iterations,
            converged,
        }
    }

    pub fn labels(&self) -> &[u32] {
        &self.labels
    }

    /// The requested k. Some clusters may end up without members.
    pub fn n_clusters(&self) -> usize {
        self.centroids.len()
    }

    /// One centroid per cluster, coordinates ordered like [`Self::channels`].
    pub fn centroids(&self) -> &[Vec<f64>] {
        &self.centroids
    }

    /// Channels the model was fitted on.
    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    /// Sum of squared distances from each event to its centroid.
    pub fn inertia(&self) -> f64 {
        self.inertia
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Whether the run stopped on tolerance rather than the iteration cap.
    pub fn converged(&self) -> bool {
        self.converged
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Events per cluster id, present clusters only, ordered by id.
    pub fn counts(&self) -> BTreeMap<u32, usize> {
        let mut counts = BTreeMap::new();
        for &label in &self.labels {
            *counts.entry(label).or_insert(0) += 1;
        }
        counts
    }

    /// Cluster ids that have at least one event, ascending.
    pub fn distinct_labels(&self) -> Vec<u32> {
        self.counts().into_keys().collect()
    }

    /// Labels as a `UInt32` series.
    pub fn to_series(&self, name: &str) -> Series {
        Series::new(name.into(), &self.labels)
    }

    /// Copy of `df` with a `Cluster` column holding the labels.
    ///
    /// An existing `Cluster` column is replaced.
    pub fn attach(&self, df: &DataFrame) -> Result<DataFrame> {
        let mut labelled = df.clone();
        labelled.with_column(self.to_series(CLUSTER))?;
        Ok(labelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CytometryError;

    fn assignment() -> ClusterAssignment {
        ClusterAssignment::new(
            vec![1, 0, 1, 1, 0],
            vec![vec![0.0, 0.0], vec![5.0, 5.0], vec![9.0, 9.0]],
            vec!["CD4".to_string(), "CD8".to_string()],
            12.5,
            4,
            true,
        )
    }

    #[test]
    fn test_counts_and_distinct_labels() {
        let a = assignment();
        let counts = a.counts();
        assert_eq!(counts.get(&0), Some(&2));
        assert_eq!(counts.get(&1), Some(&3));
        assert_eq!(counts.get(&2), None);
        assert_eq!(a.distinct_labels(), vec![0, 1]);
        assert_eq!(a.n_clusters(), 3);
        assert_eq!(a.len(), 5);
    }

    #[test]
    fn test_attach_adds_cluster_column() {
        let df = df!["CD4" => [1.0, 2.0, 3.0, 4.0, 5.0]].unwrap();
        let labelled = assignment().attach(&df).unwrap();

        assert_eq!(labelled.width(), 2);
        let cluster: Vec<Option<u32>> = labelled
            .column(CLUSTER)
            .unwrap()
            .u32()
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(cluster, vec![Some(1), Some(0), Some(1), Some(1), Some(0)]);
    }

    #[test]
    fn test_attach_replaces_existing_cluster_column() {
        let df = df![
            "CD4" => [1.0, 2.0, 3.0, 4.0, 5.0],
            "Cluster" => [9u32, 9, 9, 9, 9],
        ]
        .unwrap();
        let labelled = assignment().attach(&df).unwrap();
        assert_eq!(labelled.width(), 2);
        assert_eq!(labelled.column(CLUSTER).unwrap().u32().unwrap().get(0), Some(1));
    }

    #[test]
    fn test_attach_height_mismatch() {
        let df = df!["CD4" => [1.0, 2.0]].unwrap();
        let err = assignment().attach(&df).unwrap_err();
        assert!(matches!(err, CytometryError::Polars(_)));
    }
}
