use crate::clustering::ClusterAssignment;
use crate::error::Result;
use crate::pipeline::{PipelineRun, StepRecord};
use crate::stats::{ClusterProportions, CorrelationMatrix, DatasetSummary, PopulationStatistics};
use chrono::Local;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;

// ============================================================================
// Report Types
// ============================================================================

/// Everything an analysis run produced, apart from the tables themselves.
///
/// Use this for both JSON output (`--json`) and file writing (`--emit-report`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    // Metadata
    /// Timestamp when the report was generated
    pub generated_at: String,
    /// Path to the input file, when the table came from one
    pub input_file: Option<String>,
    /// Path to the labelled output table (if written)
    pub output_file: Option<String>,

    /// Row counts through the filter steps
    pub filtering: FilteringSummary,
    /// Fitted k-means model
    pub clustering: ClusteringSummary,
    /// Per-cluster channel statistics
    pub populations: PopulationStatistics,
    /// Share of events per cluster
    pub proportions: ClusterProportions,
    /// Extreme events remaining after filtering
    pub outliers: OutlierSummary,
    /// Marker correlation, when markers were requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation: Option<CorrelationMatrix>,
    /// Describe-style summary of the filtered table
    pub summary: DatasetSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilteringSummary {
    pub rows_before: usize,
    pub rows_after: usize,
    pub rows_removed: usize,
    /// Percentage of events removed by all steps together
    pub rows_removed_percent: f32,
    pub steps: Vec<StepRecord>,
}

impl FilteringSummary {
    pub fn from_run(run: &PipelineRun) -> Self {
        let rows_before = run.rows_before();
        let rows_after = run.rows_after();
        let rows_removed = rows_before.saturating_sub(rows_after);
        let rows_removed_percent = if rows_before > 0 {
            (rows_removed as f32 / rows_before as f32) * 100.0
        } else {
            0.0
        };

        Self {
            rows_before,
            rows_after,
            rows_removed,
            rows_removed_percent,
            steps: run.steps.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringSummary {
    pub n_clusters: usize,
    /// Clusters that ended up with at least one event
    pub populated_clusters: usize,
    pub channels: Vec<String>,
    pub centroids: Vec<Vec<f64>>,
    pub inertia: f64,
    pub iterations: usize,
    pub converged: bool,
    pub seed: Option<u64>,
}

impl ClusteringSummary {
    pub fn from_assignment(assignment: &ClusterAssignment, seed: Option<u64>) -> Self {
        Self {
            n_clusters: assignment.n_clusters(),
            populated_clusters: assignment.distinct_labels().len(),
            channels: assignment.channels().to_vec(),
            centroids: assignment.centroids().to_vec(),
            inertia: assignment.inertia(),
            iterations: assignment.iterations(),
            converged: assignment.converged(),
            seed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlierSummary {
    pub threshold: f64,
    pub count: usize,
}

impl AnalysisReport {
    /// Current local time in the report timestamp format.
    pub fn timestamp() -> String {
        Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
    }

    pub fn with_input_file(mut self, path: impl Into<String>) -> Self {
        self.input_file = Some(path.into());
        self
    }

    pub fn with_output_file(mut self, path: impl Into<String>) -> Self {
        self.output_file = Some(path.into());
        self
    }
}

// ============================================================================
// File Output
// ============================================================================

/// Writes reports and labelled tables to an output directory.
pub struct ReportGenerator {
    output_dir: PathBuf,
    output_name: Option<String>,
}

impl Default for ReportGenerator {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./outputs"),
            output_name: None,
        }
    }
}

impl ReportGenerator {
    /// Create a new ReportGenerator with custom output settings.
    pub fn new(output_dir: PathBuf, output_name: Option<String>) -> Self {
        Self {
            output_dir,
            output_name,
        }
    }

    /// Write a report as pretty JSON.
    ///
    /// If `report_base_name` is "sample_01", the file will be
    /// "sample_01_report.json".
    pub fn write_report_to_file(
        &self,
        report: &AnalysisReport,
        report_base_name: &str,
    ) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;

        let report_path = self
            .output_dir
            .join(format!("{}_report.json", report_base_name));
        let mut file = File::create(&report_path)?;
        file.write_all(serde_json::to_string_pretty(report)?.as_bytes())?;

        info!("Report saved: {}", report_path.display());

        Ok(report_path)
    }

    /// Write a labelled event table as CSV.
    ///
    /// The file name is the custom output name if one was given, otherwise
    /// `<base_name>_clustered.csv`.
    pub fn write_labelled_table(&self, df: &mut DataFrame, base_name: &str) -> Result<PathBuf> {
        let file_name = self
            .output_name
            .clone()
            .unwrap_or_else(|| format!("{}_clustered", base_name));

        fs::create_dir_all(&self.output_dir)?;
        let output_path = self.output_dir.join(format!("{}.csv", file_name));
        let mut file = File::create(&output_path)?;

        CsvWriter::new(&mut file)
            .include_header(true)
            .with_separator(b',')
            .finish(df)?;

        info!("Labelled events saved: {}", output_path.display());

        Ok(output_path)
    }
}
