//! CLI entry point for the flow cytometry analysis pipeline.

use anyhow::{Result, anyhow};
use clap::Parser;
use cyto_analysis::stats::{DatasetSummary, summarize};
use cyto_analysis::{
    AnalysisConfig, AnalysisReport, FilterStep, FlowAnalyzer, NormalizationMethod, OutlierMethod,
    ReportGenerator,
};
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info};

#[derive(Parser, Debug)]
#[command(
    version,
    about = "Flow cytometry preprocessing and clustering",
    long_about = "Filters debris, dead cells, doublets and outliers from a flow cytometry \
                  event table, clusters the remaining events with k-means and reports \
                  per-population statistics.\n\n\
                  EXAMPLES:\n  \
                  # Default gating and 3 populations\n  \
                  cyto-analysis -i sample.csv\n\n  \
                  # Reproducible 5-population run on selected markers\n  \
                  cyto-analysis -i sample.csv -k 5 --seed 42 --cluster-channels CD3,CD4,CD8\n\n  \
                  # Full configuration from a file, labelled events written to results/\n  \
                  cyto-analysis -i sample.csv --config analysis.json -o results/"
)]
struct Args {
    /// Path to the CSV export of the event table
    #[arg(short, long)]
    input: String,

    /// JSON analysis configuration (steps, clustering, markers)
    ///
    /// Command line options override values from the file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of clusters (k)
    #[arg(short = 'k', long)]
    clusters: Option<usize>,

    /// Seed for k-means initialization
    #[arg(long)]
    seed: Option<u64>,

    /// Number of k-means restarts; the run with the lowest inertia is kept
    #[arg(long)]
    n_init: Option<usize>,

    /// Channels to cluster on (comma separated). Defaults to all numeric channels
    #[arg(long, value_delimiter = ',')]
    cluster_channels: Vec<String>,

    /// Markers for the correlation matrix (comma separated)
    #[arg(long, value_delimiter = ',')]
    markers: Vec<String>,

    /// |z| above which an event is counted as an outlier in the report
    #[arg(long)]
    outlier_threshold: Option<f64>,

    /// Normalization method for every normalization step (zscore, minmax)
    #[arg(long)]
    normalize: Option<NormalizationMethod>,

    /// Outlier method for every outlier removal step (zscore, iqr)
    #[arg(long)]
    outlier_method: Option<OutlierMethod>,

    /// Only filter the events and print a per-channel summary
    #[arg(long)]
    summary_only: bool,

    /// Output directory for the labelled event table
    ///
    /// The table is written as <input_name>_clustered.csv
    #[arg(short, long)]
    output: Option<String>,

    /// Custom name for the labelled event table (without extension)
    #[arg(long)]
    output_name: Option<String>,

    /// Write a detailed JSON report to this directory
    ///
    /// The report will be saved as <input_name>_report.json
    #[arg(short = 'r', long)]
    emit_report: Option<String>,

    /// Output JSON to stdout instead of human-readable summary
    ///
    /// Disables all progress logs; only outputs the final JSON report.
    #[arg(long)]
    json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Suppress progress output (only show errors and final result)
    #[arg(short, long)]
    quiet: bool,
}

/// Initialize the tracing subscriber for logging.
///
/// When `json_output` is true, logging is completely disabled to ensure
/// only JSON is written to stdout.
fn init_logging(level: &str, quiet: bool, json_output: bool) {
    if json_output {
        return;
    }

    use tracing_subscriber::EnvFilter;

    let effective_level = if quiet { "warn" } else { level };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(effective_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level, args.quiet, args.json);

    if !Path::new(&args.input).exists() {
        return Err(anyhow!("Input file not found: {}", args.input));
    }

    let config = build_config(&args)?;

    info!("Loading events from: {}", args.input);
    let data = load_csv(&args.input)?;
    info!("Events loaded: {:?}", data.shape());

    if args.summary_only {
        return run_summary_only(&args, config, &data);
    }

    run_analysis(&args, config, &data)
}

/// Start from the config file (or defaults) and apply command line overrides.
fn build_config(args: &Args) -> Result<AnalysisConfig> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            AnalysisConfig::from_path(path)?
        }
        None => AnalysisConfig::default(),
    };

    if let Some(k) = args.clusters {
        config.clustering.n_clusters = k;
    }
    if let Some(seed) = args.seed {
        config.clustering.seed = Some(seed);
    }
    if let Some(n_init) = args.n_init {
        config.clustering.n_init = n_init;
    }
    if !args.cluster_channels.is_empty() {
        config.cluster_channels = Some(args.cluster_channels.clone());
    }
    if !args.markers.is_empty() {
        config.correlation_markers = Some(args.markers.clone());
    }
    if let Some(threshold) = args.outlier_threshold {
        config.outlier_threshold = threshold;
    }

    for step in &mut config.steps {
        match step {
            FilterStep::Normalization(normalization) => {
                if let Some(method) = args.normalize {
                    normalization.method = method;
                }
            }
            FilterStep::OutlierRemoval(outliers) => {
                if let Some(method) = args.outlier_method {
                    outliers.method = method;
                }
            }
            _ => {}
        }
    }

    config.validate()?;
    debug!("Effective configuration: {:?}", config);
    Ok(config)
}

/// Filter only, then print or emit the per-channel summary.
fn run_summary_only(args: &Args, config: AnalysisConfig, data: &DataFrame) -> Result<()> {
    let analyzer = FlowAnalyzer::builder().config(config).build()?;
    let filtered = analyzer.pipeline().apply(data)?;
    let summary = summarize(&filtered)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_channel_summary(&summary);
    }
    Ok(())
}

fn run_analysis(args: &Args, config: AnalysisConfig, data: &DataFrame) -> Result<()> {
    let mut builder = FlowAnalyzer::builder().config(config);
    if !args.quiet && !args.json {
        builder = builder.on_progress(|update| {
            info!(
                "[{:.0}%] {}: {}",
                update.progress * 100.0,
                update.stage.display_name(),
                update.message
            );
        });
    }
    let analyzer = builder.build()?;

    let outcome = match analyzer.analyze(data) {
        Ok(outcome) => outcome,
        Err(e) => {
            error!("Analysis failed: {}", e);
            return Err(anyhow!("Analysis failed: {}", e));
        }
    };

    let input_stem = extract_file_stem(&args.input);
    let mut report = outcome.report.with_input_file(&args.input);
    let mut labelled = outcome.data;

    if let Some(ref output_dir) = args.output {
        let generator = ReportGenerator::new(PathBuf::from(output_dir), args.output_name.clone());
        let path = generator.write_labelled_table(&mut labelled, &input_stem)?;
        report = report.with_output_file(path.to_string_lossy());
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if let Some(ref report_dir) = args.emit_report {
        let generator = ReportGenerator::new(PathBuf::from(report_dir), None);
        let report_path = generator.write_report_to_file(&report, &input_stem)?;
        info!("Report written to: {}", report_path.display());
    }

    print_human_readable_summary(&report);
    Ok(())
}

/// Extract the file stem (name without extension) from a path.
fn extract_file_stem(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("events")
        .to_string()
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.3}", v))
}

/// Truncate a string to max length with ellipsis
fn truncate_str(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

fn print_channel_summary(summary: &DatasetSummary) {
    println!();
    println!("CHANNEL SUMMARY ({} events)", summary.rows);
    println!("{}", "-".repeat(96));
    println!(
        "{:<16} {:>8} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10}",
        "Channel", "Count", "Mean", "Std", "Min", "Median", "Max", "IQR"
    );
    println!("{}", "-".repeat(96));
    for channel in &summary.channels {
        let iqr = channel.q75.zip(channel.q25).map(|(hi, lo)| hi - lo);
        println!(
            "{:<16} {:>8} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10}",
            truncate_str(&channel.channel, 15),
            channel.count,
            fmt_opt(channel.mean),
            fmt_opt(channel.std),
            fmt_opt(channel.min),
            fmt_opt(channel.median),
            fmt_opt(channel.max),
            fmt_opt(iqr),
        );
    }
    println!();
}

/// Print a human-readable summary of the analysis results.
///
/// This is the default output when `--json` is not specified.
fn print_human_readable_summary(report: &AnalysisReport) {
    let filtering = &report.filtering;
    let clustering = &report.clustering;

    println!();
    println!("{}", "=".repeat(80));
    println!("ANALYSIS COMPLETE");
    println!("{}", "=".repeat(80));
    println!();

    if let Some(ref input) = report.input_file {
        println!("Input:  {}", input);
    }
    if let Some(ref output) = report.output_file {
        println!("Output: {}", output);
    }
    println!();

    println!("Filtering:");
    for step in &filtering.steps {
        println!(
            "  {}. {:<20} {} -> {} ({} removed)",
            step.index + 1,
            step.name,
            step.rows_before,
            step.rows_after,
            step.rows_removed()
        );
    }
    println!(
        "  Events: {} -> {} ({:.1}% removed)",
        filtering.rows_before, filtering.rows_after, filtering.rows_removed_percent
    );
    println!();

    println!("Clustering:");
    println!(
        "  k = {} ({} populated) on {} channels",
        clustering.n_clusters,
        clustering.populated_clusters,
        clustering.channels.len()
    );
    println!(
        "  Inertia: {:.3} after {} iterations{}",
        clustering.inertia,
        clustering.iterations,
        if clustering.converged {
            ""
        } else {
            " (not converged)"
        }
    );
    println!();

    println!("Populations:");
    for population in &report.proportions.clusters {
        println!(
            "  Cluster {:<3} {:>8} events  {:>6.2}%",
            population.cluster,
            population.count,
            population.proportion * 100.0
        );
        if let Some(stats) = report.populations.cluster(population.cluster) {
            for channel in stats.channels.iter().take(6) {
                println!(
                    "      {:<16} mean {:>10}  median {:>10}  std {:>10}",
                    truncate_str(&channel.channel, 15),
                    fmt_opt(channel.mean),
                    fmt_opt(channel.median),
                    format!("{:.3}", channel.std)
                );
            }
            if stats.channels.len() > 6 {
                println!("      ... and {} more channels", stats.channels.len() - 6);
            }
        }
    }
    println!();

    println!(
        "Outliers: {} events with |z| > {}",
        report.outliers.count, report.outliers.threshold
    );

    if let Some(ref correlation) = report.correlation {
        println!();
        println!("Marker Correlation:");
        print!("  {:<12}", "");
        for marker in &correlation.markers {
            print!(" {:>10}", truncate_str(marker, 10));
        }
        println!();
        for (marker, row) in correlation.markers.iter().zip(&correlation.values) {
            print!("  {:<12}", truncate_str(marker, 12));
            for value in row {
                if value.is_nan() {
                    print!(" {:>10}", "-");
                } else {
                    print!(" {:>10.3}", value);
                }
            }
            println!();
        }
    }
    println!();

    println!("Use --json for machine-readable output");
    println!("Use --emit-report <dir> to save detailed JSON report");
    println!("{}", "=".repeat(80));
}

/// Load an event table CSV, falling back to a pre-cleaned copy when the
/// standard reader fails.
fn load_csv(path: &str) -> Result<DataFrame> {
    match CsvReadOptions::default()
        .with_infer_schema_length(Some(1000))
        .with_has_header(true)
        .with_parse_options(CsvParseOptions::default().with_quote_char(Some(b'"')))
        .try_into_reader_with_file_path(Some(PathBuf::from(path)))?
        .finish()
    {
        Ok(df) => return Ok(df),
        Err(e) => {
            debug!("Standard loading failed: {}", e);
        }
    }

    // Blank lines and stray quoting are common in instrument exports
    let content = std::fs::read_to_string(path)?;
    let cleaned = clean_csv_content(&content);

    CsvReadOptions::default()
        .with_infer_schema_length(Some(1000))
        .with_has_header(true)
        .into_reader_with_file_handle(std::io::Cursor::new(cleaned))
        .finish()
        .map_err(|e| anyhow!("Failed to read {}: {}", path, e))
}

fn clean_csv_content(content: &str) -> String {
    content
        .replace('"', "")
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
