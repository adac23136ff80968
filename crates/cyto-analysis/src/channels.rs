//! Well-known channel names produced by the ingestion layer.
//!
//! Marker (fluorescence) channels are arbitrary; only the scatter and
//! viability channels below carry meaning for the filters.

/// Forward-scatter pulse area.
pub const FSC_A: &str = "FSC-A";
/// Side-scatter pulse area.
pub const SSC_A: &str = "SSC-A";
/// Forward-scatter pulse height.
pub const FSC_H: &str = "FSC-H";
/// Side-scatter pulse height.
pub const SSC_H: &str = "SSC-H";
/// Viability dye intensity.
pub const VIABILITY: &str = "Viability";

/// Name of the label column added by [`ClusterAssignment::attach`](crate::clustering::ClusterAssignment::attach).
pub const CLUSTER: &str = "Cluster";
