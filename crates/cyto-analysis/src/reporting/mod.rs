//! Report generation module.
//!
//! [`AnalysisReport`] collects the outputs of one analysis run in a single
//! serializable structure suitable for:
//! - JSON output to stdout (`--json` CLI flag)
//! - JSON file output (`--emit-report` CLI flag)
//! - Programmatic access in library mode
//!
//! # Example
//!
//! ```rust,ignore
//! use cyto_analysis::reporting::ReportGenerator;
//!
//! let outcome = analyzer.analyze(&events)?;
//! println!("{}", serde_json::to_string_pretty(&outcome.report)?);
//!
//! let generator = ReportGenerator::new(PathBuf::from("output"), None);
//! generator.write_report_to_file(&outcome.report, "sample_01")?;
//! ```

mod generator;

pub use generator::{
    AnalysisReport, ClusteringSummary, FilteringSummary, OutlierSummary, ReportGenerator,
};
