//! Flow Cytometry Analysis Library
//!
//! Gating-style preprocessing, unsupervised population discovery and
//! population statistics for flow cytometry event tables, built on Polars.
//!
//! # Overview
//!
//! An event table is a [`DataFrame`](polars::prelude::DataFrame) with one
//! row per cell and one numeric column per channel (`FSC-A`, `SSC-A`,
//! `FSC-H`, `SSC-H`, `Viability`, fluorescence markers...).
//!
//! - **Filters**: debris, dead-cell and doublet removal, normalization,
//!   outlier removal ([`filters`])
//! - **Pipeline**: an ordered, serializable list of filter steps ([`Pipeline`])
//! - **Clustering**: k-means with k-means++ initialization ([`KMeans`])
//! - **Statistics**: per-cluster descriptors, proportions, marker
//!   correlation and dataset summaries ([`stats`])
//! - **Progress Reporting**: stage-by-stage updates through a callback
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use cyto_analysis::{AnalysisConfig, ClusteringConfig, FlowAnalyzer};
//! use polars::prelude::*;
//!
//! let events = CsvReadOptions::default()
//!     .try_into_reader_with_file_path(Some("sample.csv".into()))?
//!     .finish()?;
//!
//! let config = AnalysisConfig::builder()
//!     .clustering(ClusteringConfig::builder().n_clusters(4).seed(42).build()?)
//!     .correlation_markers(["CD3", "CD4", "CD8"])
//!     .build()?;
//!
//! let outcome = FlowAnalyzer::builder()
//!     .config(config)
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .analyze(&events)?;
//!
//! for population in &outcome.report.proportions.clusters {
//!     println!("cluster {}: {:.1}%", population.cluster, population.proportion * 100.0);
//! }
//! ```
//!
//! # Using the building blocks directly
//!
//! ```rust,ignore
//! use cyto_analysis::{KMeans, NormalizationMethod, Pipeline};
//! use cyto_analysis::stats::{cluster_proportions, population_statistics};
//!
//! let filtered = Pipeline::builder()
//!     .remove_debris(600.0, 600.0)
//!     .remove_dead(2000.0)
//!     .normalize(NormalizationMethod::ZScore)
//!     .build()
//!     .apply(&events)?;
//!
//! let assignment = KMeans::with_clusters(3).fit(&filtered)?;
//! let stats = population_statistics(&filtered, &assignment)?;
//! let shares = cluster_proportions(&assignment)?;
//! ```

pub mod analyzer;
pub mod channels;
pub mod clustering;
pub mod config;
pub mod error;
pub mod filters;
pub mod pipeline;
pub mod reporting;
pub mod stats;
pub mod utils;

// Re-exports for convenient access
pub use analyzer::{AnalysisOutcome, FlowAnalyzer, FlowAnalyzerBuilder};
pub use clustering::{ClusterAssignment, KMeans};
pub use config::{
    AnalysisConfig, AnalysisConfigBuilder, ClusteringConfig, ClusteringConfigBuilder,
    ConfigValidationError,
};
pub use error::{CytometryError, Result as CytometryResult, ResultExt};
pub use filters::{
    DeadCellRemoval, DebrisRemoval, DoubletRemoval, EventFilter, Normalization,
    NormalizationMethod, OutlierMethod, OutlierRemoval,
};
pub use pipeline::{
    AnalysisStage, ClosureProgressReporter, FilterStep, Pipeline, PipelineBuilder, PipelineRun,
    ProgressReporter, ProgressUpdate, StepRecord,
};
pub use reporting::{AnalysisReport, ReportGenerator};
