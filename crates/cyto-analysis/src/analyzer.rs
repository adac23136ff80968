//! End-to-end analysis: filter, cluster, describe.

use crate::clustering::{ClusterAssignment, KMeans};
use crate::config::AnalysisConfig;
use crate::error::{CytometryError, Result};
use crate::pipeline::{
    AnalysisStage, ClosureProgressReporter, Pipeline, PipelineRun, ProgressReporter,
    ProgressUpdate,
};
use crate::reporting::{AnalysisReport, ClusteringSummary, FilteringSummary, OutlierSummary};
use crate::stats::{
    cluster_proportions, identify_outliers, marker_correlation, population_statistics, summarize,
};
use polars::prelude::*;
use std::sync::Arc;
use tracing::{error, info};

/// Report plus the filtered table with a `Cluster` column attached.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub report: AnalysisReport,
    pub data: DataFrame,
}

/// Runs the configured filter steps, k-means and population statistics.
///
/// # Example
///
/// ```rust,ignore
/// use cyto_analysis::{AnalysisConfig, FlowAnalyzer};
///
/// let outcome = FlowAnalyzer::builder()
///     .config(AnalysisConfig::builder().n_clusters(4).build()?)
///     .on_progress(|update| println!("[{:.0}%] {}", update.progress * 100.0, update.message))
///     .build()?
///     .analyze(&events)?;
///
/// println!("{} populations", outcome.report.proportions.clusters.len());
/// ```
pub struct FlowAnalyzer {
    config: AnalysisConfig,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

static_assertions::assert_impl_all!(FlowAnalyzer: Send, Sync);
static_assertions::assert_impl_all!(AnalysisOutcome: Send);

impl FlowAnalyzer {
    /// Create a new analyzer builder.
    pub fn builder() -> FlowAnalyzerBuilder {
        FlowAnalyzerBuilder::default()
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// The filter pipeline this analyzer runs, sharing its progress reporter.
    pub fn pipeline(&self) -> Pipeline {
        let builder = Pipeline::builder().steps(self.config.steps.iter().copied());
        match &self.progress_reporter {
            Some(reporter) => builder.progress_reporter(Arc::clone(reporter)).build(),
            None => builder.build(),
        }
    }

    /// Run the whole analysis on an event table.
    ///
    /// # Errors
    ///
    /// Filter failures surface as [`CytometryError::StepFailed`]. Clustering
    /// and statistics errors are returned unchanged, e.g. `EmptyInput` when
    /// the filters removed every event.
    pub fn analyze(&self, df: &DataFrame) -> Result<AnalysisOutcome> {
        self.report_progress(ProgressUpdate::new(
            AnalysisStage::Initializing,
            0.0,
            format!("Analyzing {} events x {} channels", df.height(), df.width()),
        ));

        let run = self.pipeline().run(df)?;
        let filtered = &run.data;

        self.report_progress(ProgressUpdate::new(
            AnalysisStage::Clustering,
            0.0,
            format!(
                "Clustering {} events into {} populations",
                filtered.height(),
                self.config.clustering.n_clusters
            ),
        ));
        let assignment = self.cluster(filtered).inspect_err(|e| self.report_failure(e))?;

        self.report_progress(ProgressUpdate::new(
            AnalysisStage::Statistics,
            0.0,
            "Computing population statistics",
        ));
        let report = self
            .build_report(&run, &assignment)
            .inspect_err(|e| self.report_failure(e))?;
        let data = assignment.attach(filtered)?;

        info!(
            "Analysis complete: {} -> {} events, {} populations",
            report.filtering.rows_before,
            report.filtering.rows_after,
            report.clustering.populated_clusters
        );
        self.report_progress(ProgressUpdate::complete(format!(
            "Found {} populations in {} events",
            report.clustering.populated_clusters,
            data.height()
        )));

        Ok(AnalysisOutcome { report, data })
    }

    fn cluster(&self, df: &DataFrame) -> Result<ClusterAssignment> {
        let kmeans = KMeans::new(self.config.clustering.clone());
        match &self.config.cluster_channels {
            Some(channels) => kmeans.fit_channels(df, channels),
            None => kmeans.fit(df),
        }
    }

    fn build_report(
        &self,
        run: &PipelineRun,
        assignment: &ClusterAssignment,
    ) -> Result<AnalysisReport> {
        let filtered = &run.data;

        let populations = population_statistics(filtered, assignment)?;
        let proportions = cluster_proportions(assignment)?;
        let outliers = identify_outliers(filtered, self.config.outlier_threshold)?;
        let correlation = self
            .config
            .correlation_markers
            .as_ref()
            .map(|markers| marker_correlation(filtered, markers))
            .transpose()?;
        let summary = summarize(filtered)?;

        Ok(AnalysisReport {
            generated_at: AnalysisReport::timestamp(),
            input_file: None,
            output_file: None,
            filtering: FilteringSummary::from_run(run),
            clustering: ClusteringSummary::from_assignment(
                assignment,
                self.config.clustering.seed,
            ),
            populations,
            proportions,
            outliers: OutlierSummary {
                threshold: self.config.outlier_threshold,
                count: outliers.height(),
            },
            correlation,
            summary,
        })
    }

    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }

    fn report_failure(&self, err: &CytometryError) {
        error!("Analysis failed: {}", err);
        self.report_progress(ProgressUpdate::failed(err.to_string()));
    }
}

/// Builder for creating a [`FlowAnalyzer`] instance.
#[derive(Default)]
pub struct FlowAnalyzerBuilder {
    config: Option<AnalysisConfig>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

impl FlowAnalyzerBuilder {
    /// Set the analysis configuration.
    pub fn config(mut self, config: AnalysisConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set a progress reporter for receiving updates during analysis.
    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Build the analyzer. Fails if the configuration is invalid.
    pub fn build(self) -> Result<FlowAnalyzer> {
        let config = self.config.unwrap_or_default();
        config.validate()?;

        Ok(FlowAnalyzer {
            config,
            progress_reporter: self.progress_reporter,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClusteringConfig;
    use crate::filters::{DebrisRemoval, Normalization, NormalizationMethod};
    use crate::pipeline::FilterStep;
    use std::sync::Mutex;

    fn events() -> DataFrame {
        df![
            "FSC-A" => [100.0, 800.0, 820.0, 810.0, 5000.0, 5100.0, 5050.0],
            "SSC-A" => [100.0, 900.0, 910.0, 905.0, 6000.0, 6100.0, 6050.0],
            "CD4" => [0.0, 10.0, 11.0, 12.0, 500.0, 510.0, 505.0],
        ]
        .unwrap()
    }

    fn config(k: usize) -> AnalysisConfig {
        AnalysisConfig::builder()
            .steps(vec![FilterStep::from(DebrisRemoval::new(500.0, 500.0))])
            .clustering(
                ClusteringConfig::builder()
                    .n_clusters(k)
                    .seed(3)
                    .build()
                    .unwrap(),
            )
            .cluster_channels(["CD4"])
            .correlation_markers(["FSC-A", "CD4"])
            .build()
            .unwrap()
    }

    #[test]
    fn test_analyze_end_to_end() {
        let outcome = FlowAnalyzer::builder()
            .config(config(2))
            .build()
            .unwrap()
            .analyze(&events())
            .unwrap();

        let report = &outcome.report;
        assert_eq!(report.filtering.rows_before, 7);
        assert_eq!(report.filtering.rows_after, 6);
        assert_eq!(report.clustering.populated_clusters, 2);
        assert_eq!(report.clustering.channels, vec!["CD4".to_string()]);
        assert_eq!(report.populations.len(), 2);
        assert!((report.proportions.sum() - 1.0).abs() < 1e-9);
        assert!(report.correlation.is_some());
        assert_eq!(report.summary.rows, 6);

        assert_eq!(outcome.data.height(), 6);
        assert!(outcome.data.column("Cluster").is_ok());
    }

    #[test]
    fn test_analyze_reports_stages_in_order() {
        let stages = Arc::new(Mutex::new(Vec::new()));
        let sink = stages.clone();

        FlowAnalyzer::builder()
            .config(config(2))
            .on_progress(move |update| sink.lock().unwrap().push(update.stage))
            .build()
            .unwrap()
            .analyze(&events())
            .unwrap();

        let seen = stages.lock().unwrap();
        assert_eq!(seen.first(), Some(&AnalysisStage::Initializing));
        assert!(seen.contains(&AnalysisStage::Filtering));
        assert!(seen.contains(&AnalysisStage::Clustering));
        assert!(seen.contains(&AnalysisStage::Statistics));
        assert_eq!(seen.last(), Some(&AnalysisStage::Complete));
    }

    #[test]
    fn test_analyze_propagates_step_failure() {
        let config = AnalysisConfig::builder()
            .steps(vec![Normalization::new(NormalizationMethod::ZScore).into()])
            .n_clusters(1)
            .build()
            .unwrap();
        let df = df!["flat" => [1.0, 1.0, 1.0]].unwrap();

        let err = FlowAnalyzer::builder()
            .config(config)
            .build()
            .unwrap()
            .analyze(&df)
            .unwrap_err();

        assert_eq!(err.failed_step(), Some((0, "normalization")));
        assert_eq!(err.error_code(), "DEGENERATE_COLUMN");
    }

    #[test]
    fn test_analyze_everything_filtered_out() {
        let df = df![
            "FSC-A" => [10.0, 20.0],
            "SSC-A" => [10.0, 20.0],
            "CD4" => [1.0, 2.0],
        ]
        .unwrap();

        let stages = Arc::new(Mutex::new(Vec::new()));
        let sink = stages.clone();
        let err = FlowAnalyzer::builder()
            .config(config(2))
            .on_progress(move |update| sink.lock().unwrap().push(update.stage))
            .build()
            .unwrap()
            .analyze(&df)
            .unwrap_err();

        assert!(matches!(err, CytometryError::EmptyInput));
        assert_eq!(stages.lock().unwrap().last(), Some(&AnalysisStage::Failed));
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let mut config = AnalysisConfig::default();
        config.outlier_threshold = -1.0;

        let result = FlowAnalyzer::builder().config(config).build();
        assert!(matches!(
            result.err(),
            Some(CytometryError::InvalidConfig(_))
        ));
    }
}
