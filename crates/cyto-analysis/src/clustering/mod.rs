//! Unsupervised population discovery.
//!
//! [`KMeans`] groups events by their channel values and returns a
//! [`ClusterAssignment`], which can be attached to the table as a `Cluster`
//! column or fed to the statistics layer.

mod assignment;
mod kmeans;

pub use assignment::ClusterAssignment;
pub use kmeans::KMeans;
