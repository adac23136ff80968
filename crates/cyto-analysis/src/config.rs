//! Configuration types for the analysis pipeline.
//!
//! This module provides configuration options using the builder pattern.
//! Both [`AnalysisConfig`] and [`ClusteringConfig`] are serde-serializable so
//! a full analysis can be described in a JSON file.

use crate::error::{CytometryError, Result};
use crate::filters::OutlierMethod;
use crate::pipeline::{FilterStep, default_steps};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings for the k-means clustering engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    /// Number of clusters (k).
    /// Default: 3
    pub n_clusters: usize,

    /// Iteration cap for a single k-means run.
    /// Default: 300
    pub max_iterations: usize,

    /// A run converges once no centroid moves farther than this.
    /// Default: 1e-4
    pub tolerance: f64,

    /// Number of independently initialized runs; the lowest-inertia run wins.
    /// Default: 1
    pub n_init: usize,

    /// Seed for centroid initialization. `None` draws from OS entropy, so
    /// label numbering may differ between runs.
    /// Default: None
    pub seed: Option<u64>,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            n_clusters: 3,
            max_iterations: 300,
            tolerance: 1e-4,
            n_init: 1,
            seed: None,
        }
    }
}

impl ClusteringConfig {
    /// Create a new configuration builder.
    pub fn builder() -> ClusteringConfigBuilder {
        ClusteringConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> std::result::Result<(), ConfigValidationError> {
        if self.n_clusters == 0 {
            return Err(ConfigValidationError::InvalidClusterCount(self.n_clusters));
        }

        if self.max_iterations == 0 {
            return Err(ConfigValidationError::InvalidIterations(self.max_iterations));
        }

        if self.n_init == 0 {
            return Err(ConfigValidationError::InvalidRestarts(self.n_init));
        }

        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(ConfigValidationError::InvalidThreshold {
                field: "tolerance".to_string(),
                value: self.tolerance,
            });
        }

        Ok(())
    }
}

/// Builder for [`ClusteringConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct ClusteringConfigBuilder {
    n_clusters: Option<usize>,
    max_iterations: Option<usize>,
    tolerance: Option<f64>,
    n_init: Option<usize>,
    seed: Option<u64>,
}

impl ClusteringConfigBuilder {
    pub fn n_clusters(mut self, k: usize) -> Self {
        self.n_clusters = Some(k);
        self
    }

    pub fn max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = Some(max_iterations);
        self
    }

    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = Some(tolerance);
        self
    }

    pub fn n_init(mut self, n_init: usize) -> Self {
        self.n_init = Some(n_init);
        self
    }

    /// Fix the initialization seed for reproducible labels.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `ClusteringConfig` or an error if validation fails.
    pub fn build(self) -> std::result::Result<ClusteringConfig, ConfigValidationError> {
        let defaults = ClusteringConfig::default();
        let config = ClusteringConfig {
            n_clusters: self.n_clusters.unwrap_or(defaults.n_clusters),
            max_iterations: self.max_iterations.unwrap_or(defaults.max_iterations),
            tolerance: self.tolerance.unwrap_or(defaults.tolerance),
            n_init: self.n_init.unwrap_or(defaults.n_init),
            seed: self.seed,
        };

        config.validate()?;
        Ok(config)
    }
}

/// Configuration for a full analysis run: filters, clustering, statistics.
///
/// # Example
///
/// ```rust,ignore
/// use cyto_analysis::config::{AnalysisConfig, ClusteringConfig};
///
/// let config = AnalysisConfig::builder()
///     .clustering(ClusteringConfig::builder().n_clusters(4).seed(7).build()?)
///     .cluster_channels(["CD3", "CD4", "CD8"])
///     .outlier_threshold(3.5)
///     .build()?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Filter steps applied before clustering.
    /// Default: debris, dead cells, doublets, z-score normalization, z-score outliers
    pub steps: Vec<FilterStep>,

    /// K-means settings.
    pub clustering: ClusteringConfig,

    /// Channels used for clustering. If None, every numeric channel is used.
    /// Default: None
    pub cluster_channels: Option<Vec<String>>,

    /// Channels for the marker correlation matrix. If None, no matrix is computed.
    /// Default: None
    pub correlation_markers: Option<Vec<String>>,

    /// |z| above which an event is reported as an outlier in the summary.
    /// Default: 3.0
    pub outlier_threshold: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            steps: default_steps(),
            clustering: ClusteringConfig::default(),
            cluster_channels: None,
            correlation_markers: None,
            outlier_threshold: 3.0,
        }
    }
}

impl AnalysisConfig {
    /// Create a new configuration builder.
    pub fn builder() -> AnalysisConfigBuilder {
        AnalysisConfigBuilder::default()
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: AnalysisConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> std::result::Result<(), ConfigValidationError> {
        self.clustering.validate()?;

        for (index, step) in self.steps.iter().enumerate() {
            validate_step(index, step)?;
        }

        if !self.outlier_threshold.is_finite() || self.outlier_threshold <= 0.0 {
            return Err(ConfigValidationError::InvalidThreshold {
                field: "outlier_threshold".to_string(),
                value: self.outlier_threshold,
            });
        }

        if self.cluster_channels.as_ref().is_some_and(|c| c.is_empty()) {
            return Err(ConfigValidationError::EmptyChannelList(
                "cluster_channels".to_string(),
            ));
        }

        if self
            .correlation_markers
            .as_ref()
            .is_some_and(|c| c.is_empty())
        {
            return Err(ConfigValidationError::EmptyChannelList(
                "correlation_markers".to_string(),
            ));
        }

        Ok(())
    }
}

/// Gating thresholds must be finite; a z-score cutoff must also be positive.
fn validate_step(
    index: usize,
    step: &FilterStep,
) -> std::result::Result<(), ConfigValidationError> {
    let invalid = |name: &str, value: f64| ConfigValidationError::InvalidThreshold {
        field: format!("steps[{}].{}", index, name),
        value,
    };

    match step {
        FilterStep::DebrisRemoval(f) => {
            if !f.fsc_threshold.is_finite() {
                return Err(invalid("fsc_threshold", f.fsc_threshold));
            }
            if !f.ssc_threshold.is_finite() {
                return Err(invalid("ssc_threshold", f.ssc_threshold));
            }
        }
        FilterStep::DeadCellRemoval(f) => {
            if !f.viability_threshold.is_finite() {
                return Err(invalid("viability_threshold", f.viability_threshold));
            }
        }
        FilterStep::OutlierRemoval(f) if f.method == OutlierMethod::ZScore => {
            if !f.threshold.is_finite() || f.threshold <= 0.0 {
                return Err(invalid("threshold", f.threshold));
            }
        }
        FilterStep::OutlierRemoval(_)
        | FilterStep::DoubletRemoval
        | FilterStep::Normalization(_) => {}
    }

    Ok(())
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid value for '{field}': {value}")]
    InvalidThreshold { field: String, value: f64 },

    #[error("Invalid cluster count: {0} (must be at least 1)")]
    InvalidClusterCount(usize),

    #[error("Invalid iteration cap: {0} (must be at least 1)")]
    InvalidIterations(usize),

    #[error("Invalid number of k-means runs: {0} (must be at least 1)")]
    InvalidRestarts(usize),

    #[error("Channel list '{0}' must not be empty")]
    EmptyChannelList(String),
}

impl From<ConfigValidationError> for CytometryError {
    fn from(e: ConfigValidationError) -> Self {
        CytometryError::InvalidConfig(e.to_string())
    }
}

/// Builder for [`AnalysisConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct AnalysisConfigBuilder {
    steps: Option<Vec<FilterStep>>,
    clustering: Option<ClusteringConfig>,
    cluster_channels: Option<Vec<String>>,
    correlation_markers: Option<Vec<String>>,
    outlier_threshold: Option<f64>,
}

impl AnalysisConfigBuilder {
    /// Replace the default filter steps.
    pub fn steps(mut self, steps: Vec<FilterStep>) -> Self {
        self.steps = Some(steps);
        self
    }

    pub fn clustering(mut self, clustering: ClusteringConfig) -> Self {
        self.clustering = Some(clustering);
        self
    }

    /// Shortcut for setting only the cluster count.
    pub fn n_clusters(mut self, k: usize) -> Self {
        self.clustering.get_or_insert_with(ClusteringConfig::default).n_clusters = k;
        self
    }

    pub fn cluster_channels<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cluster_channels = Some(channels.into_iter().map(Into::into).collect());
        self
    }

    pub fn correlation_markers<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.correlation_markers = Some(markers.into_iter().map(Into::into).collect());
        self
    }

    pub fn outlier_threshold(mut self, threshold: f64) -> Self {
        self.outlier_threshold = Some(threshold);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> std::result::Result<AnalysisConfig, ConfigValidationError> {
        let config = AnalysisConfig {
            steps: self.steps.unwrap_or_else(default_steps),
            clustering: self.clustering.unwrap_or_default(),
            cluster_channels: self.cluster_channels,
            correlation_markers: self.correlation_markers,
            outlier_threshold: self.outlier_threshold.unwrap_or(3.0),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{DeadCellRemoval, DebrisRemoval, OutlierRemoval};

    #[test]
    fn test_default_config() {
        let config = AnalysisConfig::default();
        assert_eq!(config.steps.len(), 5);
        assert_eq!(config.clustering.n_clusters, 3);
        assert_eq!(config.clustering.max_iterations, 300);
        assert_eq!(config.outlier_threshold, 3.0);
        assert!(config.clustering.seed.is_none());
    }

    #[test]
    fn test_builder_custom_values() {
        let config = AnalysisConfig::builder()
            .steps(vec![DebrisRemoval::new(600.0, 600.0).into()])
            .clustering(
                ClusteringConfig::builder()
                    .n_clusters(5)
                    .seed(42)
                    .n_init(4)
                    .build()
                    .unwrap(),
            )
            .cluster_channels(["CD3", "CD4"])
            .outlier_threshold(2.5)
            .build()
            .unwrap();

        assert_eq!(config.steps.len(), 1);
        assert_eq!(config.clustering.n_clusters, 5);
        assert_eq!(config.clustering.seed, Some(42));
        assert_eq!(config.clustering.n_init, 4);
        assert_eq!(
            config.cluster_channels,
            Some(vec!["CD3".to_string(), "CD4".to_string()])
        );
        assert_eq!(config.outlier_threshold, 2.5);
    }

    #[test]
    fn test_validation_zero_clusters() {
        let result = ClusteringConfig::builder().n_clusters(0).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidClusterCount(0)
        ));
    }

    #[test]
    fn test_validation_negative_tolerance() {
        let result = ClusteringConfig::builder().tolerance(-1.0).build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidThreshold { .. }
        ));
    }

    #[test]
    fn test_validation_empty_channels() {
        let result = AnalysisConfig::builder()
            .cluster_channels(Vec::<String>::new())
            .build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::EmptyChannelList(_)
        ));
    }

    #[test]
    fn test_validation_step_thresholds() {
        let result = AnalysisConfig::builder()
            .steps(vec![
                DebrisRemoval::new(600.0, 600.0).into(),
                OutlierRemoval::zscore(f64::NAN).into(),
            ])
            .build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidThreshold { ref field, .. }
                if field == "steps[1].threshold"
        ));

        let result = AnalysisConfig::builder()
            .steps(vec![DeadCellRemoval::new(f64::INFINITY).into()])
            .build();
        assert!(matches!(
            result.unwrap_err(),
            ConfigValidationError::InvalidThreshold { ref field, .. }
                if field == "steps[0].viability_threshold"
        ));
    }

    #[test]
    fn test_validation_iqr_step_ignores_threshold() {
        let step = OutlierRemoval::new(OutlierMethod::Iqr, f64::NAN);
        let config = AnalysisConfig::builder().steps(vec![step.into()]).build();
        assert!(config.is_ok());
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "steps": [
                {"filter": "debris_removal", "fsc_threshold": 600, "ssc_threshold": 600},
                {"filter": "dead_cell_removal", "viability_threshold": 2000},
                {"filter": "normalization", "method": "zscore"}
            ],
            "clustering": {"n_clusters": 2, "seed": 7},
            "correlation_markers": ["CD4", "CD8"]
        }"#;

        let config = AnalysisConfig::from_json(json).expect("Should deserialize");

        assert_eq!(config.steps.len(), 3);
        assert_eq!(config.clustering.n_clusters, 2);
        assert_eq!(config.clustering.seed, Some(7));
        assert_eq!(config.clustering.max_iterations, 300);
        assert_eq!(config.outlier_threshold, 3.0);
        assert_eq!(
            config.correlation_markers,
            Some(vec!["CD4".to_string(), "CD8".to_string()])
        );
    }

    #[test]
    fn test_config_from_json_rejects_invalid() {
        let err = AnalysisConfig::from_json(r#"{"clustering": {"n_clusters": 0}}"#).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_CONFIG");

        let err =
            AnalysisConfig::from_json(r#"{"steps": [{"filter": "normalization", "method": "l2"}]}"#)
                .unwrap_err();
        assert_eq!(err.error_code(), "JSON_ERROR");
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = AnalysisConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: AnalysisConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, parsed);
    }
}
