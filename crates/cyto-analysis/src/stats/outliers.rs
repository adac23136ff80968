use super::descriptive::Moments;
use crate::error::Result;
use crate::utils::{channel_series, filter_rows, measurement_channels};
use polars::prelude::*;
use tracing::info;

/// Events that are extreme on at least one numeric channel.
///
/// A row is flagged when `|z| > threshold` on any channel. Nulls and
/// channels with zero spread never flag a row. Unlike
/// [`OutlierRemoval`](crate::filters::OutlierRemoval) this returns the
/// flagged events rather than dropping them.
pub fn identify_outliers(df: &DataFrame, threshold: f64) -> Result<DataFrame> {
    let mut flagged = vec![false; df.height()];

    for name in measurement_channels(df) {
        let values = channel_series(df, &name)?;
        let Some(moments) = Moments::of(&values) else {
            continue;
        };

        for (flag, value) in flagged.iter_mut().zip(values.into_iter()) {
            if let Some(z) = value.and_then(|v| moments.z(v))
                && z.abs() > threshold
            {
                *flag = true;
            }
        }
    }

    let outliers = filter_rows(df, &flagged)?;
    info!(
        "Identified {} outlier events (|z| > {}) out of {}",
        outliers.height(),
        threshold,
        df.height()
    );
    Ok(outliers)
}
