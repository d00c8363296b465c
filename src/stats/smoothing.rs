//! Trend smoothing for the report charts.

use crate::stats::metric::MetricError;

/// Trailing moving average over row order. The first `window - 1`
/// positions have no value.
pub fn moving_average(values: &[f64], window: usize) -> Result<Vec<Option<f64>>, MetricError> {
    if window == 0 {
        return Err(MetricError::InvalidWindow);
    }

    let mut out = Vec::with_capacity(values.len());
    let mut sum = 0.0;
    for (i, v) in values.iter().enumerate() {
        sum += v;
        if i >= window {
            sum -= values[i - window];
        }
        out.push((i + 1 >= window).then(|| sum / window as f64));
    }
    Ok(out)
}

/// LOESS: at each x, weighted linear least squares over the nearest
/// `fraction` of points with tricube weights. No robustness iterations.
pub fn loess(xs: &[f64], ys: &[f64], fraction: f64) -> Result<Vec<f64>, MetricError> {
    let n = xs.len().min(ys.len());
    if !(fraction > 0.0 && fraction <= 1.0) || n < 2 {
        return Err(MetricError::InvalidBandwidth(fraction));
    }
    let span = ((fraction * n as f64).ceil() as usize).clamp(2, n);

    let fitted = (0..n)
        .map(|i| {
            let x0 = xs[i];
            let mut distances: Vec<f64> = xs[..n].iter().map(|x| (x - x0).abs()).collect();
            distances.sort_by(|a, b| a.total_cmp(b));
            let radius = distances[span - 1];

            let (mut sw, mut swx, mut swy, mut swxx, mut swxy) = (0.0, 0.0, 0.0, 0.0, 0.0);
            for j in 0..n {
                let w = if radius > 0.0 {
                    let u = (xs[j] - x0).abs() / radius;
                    if u < 1.0 {
                        (1.0 - u.powi(3)).powi(3)
                    } else {
                        0.0
                    }
                } else if xs[j] == x0 {
                    1.0
                } else {
                    0.0
                };
                sw += w;
                swx += w * xs[j];
                swy += w * ys[j];
                swxx += w * xs[j] * xs[j];
                swxy += w * xs[j] * ys[j];
            }

            let mean_x = swx / sw;
            let mean_y = swy / sw;
            let var_x = swxx / sw - mean_x * mean_x;
            if var_x.abs() < f64::EPSILON {
                mean_y
            } else {
                let slope = (swxy / sw - mean_x * mean_y) / var_x;
                mean_y + slope * (x0 - mean_x)
            }
        })
        .collect();

    Ok(fitted)
}
