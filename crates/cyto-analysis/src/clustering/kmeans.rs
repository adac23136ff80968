use super::ClusterAssignment;
use crate::config::ClusteringConfig;
use crate::error::{CytometryError, Result};
use crate::utils::{channel_matrix, measurement_channels};
use polars::prelude::*;
use rand::prelude::*;
use tracing::{debug, info, warn};

/// K-means clustering with k-means++ initialization.
///
/// # Example
///
/// ```rust,ignore
/// use cyto_analysis::clustering::KMeans;
/// use cyto_analysis::config::ClusteringConfig;
///
/// let config = ClusteringConfig::builder().n_clusters(4).seed(42).build()?;
/// let assignment = KMeans::new(config).fit(&filtered)?;
/// let labelled = assignment.attach(&filtered)?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct KMeans {
    config: ClusteringConfig,
}

/// Outcome of a single initialization + Lloyd run.
struct Run {
    labels: Vec<u32>,
    centroids: Vec<Vec<f64>>,
    inertia: f64,
    iterations: usize,
    converged: bool,
}

impl KMeans {
    pub fn new(config: ClusteringConfig) -> Self {
        Self { config }
    }

    /// Default settings with `k` clusters.
    pub fn with_clusters(k: usize) -> Self {
        Self::new(ClusteringConfig {
            n_clusters: k,
            ..ClusteringConfig::default()
        })
    }

    pub fn config(&self) -> &ClusteringConfig {
        &self.config
    }

    /// Cluster on every numeric channel except an existing `Cluster` column.
    pub fn fit(&self, df: &DataFrame) -> Result<ClusterAssignment> {
        self.fit_channels(df, &measurement_channels(df))
    }

    /// Cluster on the named channels only.
    ///
    /// # Errors
    ///
    /// Checked in order: `EmptyInput` for a table without rows,
    /// `InvalidClusterCount` unless `1 <= k <= rows`, `NoNumericChannels`
    /// for an empty channel list, `MissingColumn` for an unknown channel.
    pub fn fit_channels(&self, df: &DataFrame, channels: &[String]) -> Result<ClusterAssignment> {
        let n_rows = df.height();
        if n_rows == 0 {
            return Err(CytometryError::EmptyInput);
        }

        let k = self.config.n_clusters;
        if k == 0 || k > n_rows {
            return Err(CytometryError::InvalidClusterCount {
                requested: k,
                rows: n_rows,
            });
        }

        if channels.is_empty() {
            return Err(CytometryError::NoNumericChannels);
        }

        let points = channel_matrix(df, channels)?;

        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut best: Option<Run> = None;
        for attempt in 0..self.config.n_init.max(1) {
            let run = self.run_once(&points, k, &mut rng);
            debug!(
                "k-means run {}: inertia {:.4} after {} iterations",
                attempt, run.inertia, run.iterations
            );
            if best.as_ref().is_none_or(|b| run.inertia < b.inertia) {
                best = Some(run);
            }
        }

        let Some(run) = best else {
            return Err(CytometryError::EmptyInput);
        };

        if !run.converged {
            warn!(
                "k-means did not converge within {} iterations",
                self.config.max_iterations
            );
        }
        info!(
            "Clustered {} events on {} channels into {} clusters (inertia {:.4})",
            n_rows,
            channels.len(),
            k,
            run.inertia
        );

        Ok(ClusterAssignment::new(
            run.labels,
            run.centroids,
            channels.to_vec(),
            run.inertia,
            run.iterations,
            run.converged,
        ))
    }

    fn run_once(&self, points: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Run {
        let mut centroids = init_centroids(points, k, rng);
        let mut labels = vec![0u32; points.len()];
        let mut iterations = 0;
        let mut converged = false;

        while iterations < self.config.max_iterations {
            iterations += 1;
            assign(points, &centroids, &mut labels);
            let updated = update_centroids(points, &labels, &centroids);

            let shift = centroids
                .iter()
                .zip(&updated)
                .map(|(old, new)| squared_distance(old, new).sqrt())
                .fold(0.0, f64::max);
            centroids = updated;

            if shift <= self.config.tolerance {
                converged = true;
                break;
            }
        }

        // Final labels must match the final centroids
        assign(points, &centroids, &mut labels);
        let inertia = points
            .iter()
            .zip(&labels)
            .map(|(p, &l)| squared_distance(p, &centroids[l as usize]))
            .sum();

        Run {
            labels,
            centroids,
            inertia,
            iterations,
            converged,
        }
    }
}

/// Squared Euclidean distance over the coordinates present in both points.
fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .filter(|(x, y)| !x.is_nan() && !y.is_nan())
        .map(|(x, y)| (x - y) * (x - y))
        .sum()
}

fn nearest(point: &[f64], centroids: &[Vec<f64>]) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (idx, centroid) in centroids.iter().enumerate() {
        let d = squared_distance(point, centroid);
        if d < best_distance {
            best = idx;
            best_distance = d;
        }
    }
    best
}

fn assign(points: &[Vec<f64>], centroids: &[Vec<f64>], labels: &mut [u32]) {
    for (label, point) in labels.iter_mut().zip(points) {
        *label = nearest(point, centroids) as u32;
    }
}

/// k-means++: each new centroid is drawn with probability proportional to its
/// squared distance from the nearest centroid chosen so far.
fn init_centroids(points: &[Vec<f64>], k: usize, rng: &mut StdRng) -> Vec<Vec<f64>> {
    let n = points.len();
    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[rng.gen_range(0..n)].clone());

    let mut distances: Vec<f64> = points
        .iter()
        .map(|p| squared_distance(p, &centroids[0]))
        .collect();

    while centroids.len() < k {
        let total: f64 = distances.iter().sum();
        let next = if total > 0.0 {
            let mut target = rng.r#gen::<f64>() * total;
            let mut chosen = None;
            for (idx, &d) in distances.iter().enumerate() {
                if d > 0.0 {
                    chosen = Some(idx);
                    if target < d {
                        break;
                    }
                    target -= d;
                }
            }
            chosen.unwrap_or(0)
        } else {
            // Every point coincides with a centroid
            rng.gen_range(0..n)
        };

        let centroid = points[next].clone();
        for (d, p) in distances.iter_mut().zip(points) {
            *d = d.min(squared_distance(p, &centroid));
        }
        centroids.push(centroid);
    }

    centroids
}

/// Mean of each cluster's members. A cluster left without members is moved
/// onto the event farthest from its assigned centroid.
fn update_centroids(points: &[Vec<f64>], labels: &[u32], current: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let k = current.len();
    let dims = current.first().map_or(0, Vec::len);

    let mut sums = vec![vec![0.0; dims]; k];
    let mut counts = vec![vec![0usize; dims]; k];
    let mut members = vec![0usize; k];

    for (point, &label) in points.iter().zip(labels) {
        let c = label as usize;
        members[c] += 1;
        for (d, &v) in point.iter().enumerate() {
            if !v.is_nan() {
                sums[c][d] += v;
                counts[c][d] += 1;
            }
        }
    }

    let mut updated: Vec<Vec<f64>> = (0..k)
        .map(|c| {
            (0..dims)
                .map(|d| {
                    if counts[c][d] > 0 {
                        sums[c][d] / counts[c][d] as f64
                    } else {
                        current[c][d]
                    }
                })
                .collect()
        })
        .collect();

    let empty: Vec<usize> = (0..k).filter(|&c| members[c] == 0).collect();
    if !empty.is_empty() {
        let mut distances: Vec<f64> = points
            .iter()
            .zip(labels)
            .map(|(p, &l)| squared_distance(p, &updated[l as usize]))
            .collect();

        for c in empty {
            let farthest = distances
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map(|(idx, _)| idx);
            if let Some(idx) = farthest {
                debug!("Reseeding empty cluster {} at event {}", c, idx);
                updated[c] = points[idx].clone();
                distances[idx] = f64::NEG_INFINITY;
            }
        }
    }

    updated
}
