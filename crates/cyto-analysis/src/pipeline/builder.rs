//! Pipeline composer.
//!
//! A [`Pipeline`] is an ordered list of [`FilterStep`]s. Running it threads
//! the output of each step into the next and stops at the first failure.

use crate::error::{CytometryError, Result};
use crate::filters::{
    DeadCellRemoval, DebrisRemoval, Normalization, NormalizationMethod, OutlierMethod,
    OutlierRemoval,
};
use crate::pipeline::progress::{
    AnalysisStage, ClosureProgressReporter, ProgressReporter, ProgressUpdate,
};
use crate::pipeline::step::{FilterStep, default_steps};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Row counts recorded for one executed step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub index: usize,
    pub name: String,
    pub rows_before: usize,
    pub rows_after: usize,
}

impl StepRecord {
    pub fn rows_removed(&self) -> usize {
        self.rows_before - self.rows_after
    }
}

/// Output of [`Pipeline::run`]: the final table plus per-step diagnostics.
#[derive(Debug, Clone)]
pub struct PipelineRun {
    pub data: DataFrame,
    pub steps: Vec<StepRecord>,
}

impl PipelineRun {
    pub fn rows_before(&self) -> usize {
        self.steps
            .first()
            .map(|s| s.rows_before)
            .unwrap_or(self.data.height())
    }

    pub fn rows_after(&self) -> usize {
        self.data.height()
    }
}

/// An ordered, reusable sequence of filter steps.
///
/// # Example
///
/// ```rust,ignore
/// use cyto_analysis::{NormalizationMethod, Pipeline};
///
/// let filtered = Pipeline::builder()
///     .remove_debris(600.0, 600.0)
///     .remove_dead(2000.0)
///     .normalize(NormalizationMethod::ZScore)
///     .build()
///     .apply(&events)?;
/// ```
#[derive(Clone)]
pub struct Pipeline {
    steps: Vec<FilterStep>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

static_assertions::assert_impl_all!(Pipeline: Send, Sync);

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(default_steps())
    }
}

impl Pipeline {
    /// Create a pipeline from explicit steps.
    pub fn new(steps: Vec<FilterStep>) -> Self {
        Self {
            steps,
            progress_reporter: None,
        }
    }

    /// Create a new pipeline builder.
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn steps(&self) -> &[FilterStep] {
        &self.steps
    }

    /// Run every step and return only the final table.
    pub fn apply(&self, df: &DataFrame) -> Result<DataFrame> {
        Ok(self.run(df)?.data)
    }

    /// Run every step in order, recording row counts.
    ///
    /// # Errors
    ///
    /// The first failing step aborts the run with
    /// [`CytometryError::StepFailed`], which carries the step index and name
    /// and wraps the step's own error unchanged.
    pub fn run(&self, df: &DataFrame) -> Result<PipelineRun> {
        let total = self.steps.len();
        info!("Running {} filter steps on {} events", total, df.height());

        let mut current = df.clone();
        let mut records = Vec::with_capacity(total);

        for (index, step) in self.steps.iter().enumerate() {
            let name = step.name();
            self.report_progress(ProgressUpdate::with_items(
                AnalysisStage::Filtering,
                format!("Step {}/{}: {}", index + 1, total, name),
                index,
                total,
                format!("Applying {}", name),
            ));

            let rows_before = current.height();
            current = step.apply(&current).map_err(|source| {
                error!("Step {} ({}) failed: {}", index, name, source);
                self.report_progress(ProgressUpdate::failed(source.to_string()));
                CytometryError::StepFailed {
                    index,
                    step: name.to_string(),
                    source: Box::new(source),
                }
            })?;

            debug!("{}: {} -> {} events", name, rows_before, current.height());
            records.push(StepRecord {
                index,
                name: name.to_string(),
                rows_before,
                rows_after: current.height(),
            });
        }

        self.report_progress(ProgressUpdate::with_items(
            AnalysisStage::Filtering,
            "Filtering complete",
            total,
            total,
            format!("{} of {} events retained", current.height(), df.height()),
        ));

        Ok(PipelineRun {
            data: current,
            steps: records,
        })
    }

    fn report_progress(&self, update: ProgressUpdate) {
        if let Some(reporter) = &self.progress_reporter {
            reporter.report(update);
        }
    }
}

/// Builder for creating a [`Pipeline`] instance.
#[derive(Default)]
pub struct PipelineBuilder {
    steps: Vec<FilterStep>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

impl PipelineBuilder {
    /// Append any step.
    pub fn step(mut self, step: impl Into<FilterStep>) -> Self {
        self.steps.push(step.into());
        self
    }

    /// Append several steps in order.
    pub fn steps(mut self, steps: impl IntoIterator<Item = FilterStep>) -> Self {
        self.steps.extend(steps);
        self
    }

    pub fn remove_debris(self, fsc_threshold: f64, ssc_threshold: f64) -> Self {
        self.step(DebrisRemoval::new(fsc_threshold, ssc_threshold))
    }

    pub fn remove_dead(self, viability_threshold: f64) -> Self {
        self.step(DeadCellRemoval::new(viability_threshold))
    }

    pub fn remove_doublets(self) -> Self {
        self.step(FilterStep::DoubletRemoval)
    }

    pub fn normalize(self, method: NormalizationMethod) -> Self {
        self.step(Normalization::new(method))
    }

    pub fn remove_outliers(self, method: OutlierMethod, threshold: f64) -> Self {
        self.step(OutlierRemoval::new(method, threshold))
    }

    /// Set a progress reporter for receiving updates during a run.
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

    pub fn build(self) -> Pipeline {
        Pipeline {
            steps: self.steps,
            progress_reporter: self.progress_reporter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn events() -> DataFrame {
        df![
            "FSC-A" => [400.0, 700.0, 900.0, 1200.0, 650.0],
            "SSC-A" => [800.0, 300.0, 900.0, 1000.0, 700.0],
            "Viability" => [3000.0, 3000.0, 2500.0, 1000.0, 2200.0],
        ]
        .unwrap()
    }

    #[test]
    fn test_empty_pipeline_is_identity() {
        let df = events();
        let run = Pipeline::builder().build().run(&df).unwrap();
        assert!(run.data.equals(&df));
        assert!(run.steps.is_empty());
    }

    #[test]
    fn test_run_records_each_step() {
        let run = Pipeline::builder()
            .remove_debris(500.0, 500.0)
            .remove_dead(2000.0)
            .build()
            .run(&events())
            .unwrap();

        assert_eq!(run.steps.len(), 2);
        assert_eq!(run.steps[0].rows_before, 5);
        assert_eq!(run.steps[0].rows_after, 3);
        assert_eq!(run.steps[1].rows_after, 2);
        assert_eq!(run.steps[1].rows_removed(), 1);
        assert_eq!(run.rows_before(), 5);
        assert_eq!(run.rows_after(), 2);
    }

    #[test]
    fn test_first_failure_aborts() {
        let df = events().drop("Viability").unwrap();

        let err = Pipeline::builder()
            .remove_debris(500.0, 500.0)
            .remove_dead(2000.0)
            .normalize(NormalizationMethod::ZScore)
            .build()
            .run(&df)
            .unwrap_err();

        assert_eq!(err.failed_step(), Some((1, "dead_cell_removal")));
        assert!(matches!(
            err.root_cause(),
            CytometryError::MissingColumn(name) if name == "Viability"
        ));
        assert_eq!(err.error_code(), "MISSING_COLUMN");
    }

    #[test]
    fn test_gate_removing_every_event_yields_empty_table() {
        let debris = df![
            "FSC-A" => [120.0, 300.0, 450.0],
            "SSC-A" => [90.0, 580.0, 210.0],
        ]
        .unwrap();

        let run = Pipeline::builder()
            .remove_debris(600.0, 600.0)
            .normalize(NormalizationMethod::ZScore)
            .build()
            .run(&debris)
            .unwrap();

        assert_eq!(run.rows_after(), 0);
        assert_eq!(run.steps[1].rows_before, 0);
        assert_eq!(run.data.width(), 2);
    }

    #[test]
    fn test_pipeline_is_reusable_and_deterministic() {
        let pipeline = Pipeline::builder()
            .remove_debris(500.0, 500.0)
            .normalize(NormalizationMethod::MinMax)
            .build();

        let first = pipeline.apply(&events()).unwrap();
        let second = pipeline.apply(&events()).unwrap();
        assert!(first.equals(&second));
    }

    #[test]
    fn test_progress_reported_per_step() {
        let stages = Arc::new(Mutex::new(Vec::new()));
        let sink = stages.clone();

        Pipeline::builder()
            .remove_debris(500.0, 500.0)
            .remove_dead(2000.0)
            .on_progress(move |update| sink.lock().unwrap().push(update.sub_stage))
            .build()
            .run(&events())
            .unwrap();

        let seen = stages.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0].as_deref(), Some("Step 1/2: debris_removal"));
        assert_eq!(seen[2].as_deref(), Some("Filtering complete"));
    }

    #[test]
    fn test_default_pipeline_steps() {
        assert_eq!(Pipeline::default().steps().len(), 5);
    }
}
