use crate::error::Result;
use crate::utils::channel_values;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Symmetric Pearson correlation matrix over a set of markers.
///
/// `values[i][j]` is the correlation of `markers[i]` and `markers[j]`.
/// Entries involving a constant channel are NaN (serialized as `null`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationMatrix {
    pub markers: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.markers.iter().position(|m| m == a)?;
        let j = self.markers.iter().position(|m| m == b)?;
        Some(self.values[i][j])
    }
}

/// Pearson correlation between every pair of `markers`.
///
/// Each pair uses the rows where both channels are non-null.
pub fn marker_correlation(df: &DataFrame, markers: &[String]) -> Result<CorrelationMatrix> {
    let columns = markers
        .iter()
        .map(|name| channel_values(df, name))
        .collect::<Result<Vec<_>>>()?;

    let n = markers.len();
    let mut values = vec![vec![f64::NAN; n]; n];
    for i in 0..n {
        for j in i..n {
            let r = pearson(&columns[i], &columns[j]);
            values[i][j] = r;
            values[j][i] = r;
        }
    }

    Ok(CorrelationMatrix {
        markers: markers.to_vec(),
        values,
    })
}

fn pearson(x: &[Option<f64>], y: &[Option<f64>]) -> f64 {
    let pairs: Vec<(f64, f64)> = x
        .iter()
        .zip(y)
        .filter_map(|(a, b)| Some(((*a)?, (*b)?)))
        .collect();
    if pairs.len() < 2 {
        return f64::NAN;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(a, _)| a).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, b)| b).sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (a, b) in &pairs {
        let dx = a - mean_x;
        let dy = b - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return f64::NAN;
    }
    (cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0)
}
