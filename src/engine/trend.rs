//! Historical stake-trend estimation.
//!
//! Turns an observed stake series into a daily growth rate, a volatility of
//! that growth, and an R-squared describing how linear the series has been.
//! Gaps in the record are handled by normalizing each consecutive delta by
//! its actual day span.

use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

use crate::engine::types::HistoricalDataPoint;

/// Linear summary of a stake history.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StakingTrend {
    /// Mean stake change in ETH per day.
    pub daily_growth_rate: f64,
    /// Sample std dev of the per-day changes, in ETH.
    pub volatility: f64,
    /// Fit quality of a least-squares line through the series, in `[0, 1]`.
    pub r_squared: f64,
}

/// Estimates the stake trend from history.
///
/// Fewer than two points carry no trend and return the all-zero default.
/// Input order does not matter; duplicate timestamps contribute no delta.
pub fn estimate_trend(history: &[HistoricalDataPoint]) -> StakingTrend {
    if history.len() < 2 {
        return StakingTrend::default();
    }

    let mut sorted: Vec<&HistoricalDataPoint> = history.iter().collect();
    sorted.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

    let mut deltas = Vec::with_capacity(sorted.len() - 1);
    for pair in sorted.windows(2) {
        let span_days = (pair[1].timestamp - pair[0].timestamp).num_seconds() as f64 / 86_400.0;
        if span_days <= 0.0 {
            continue;
        }
        deltas.push((pair[1].total_staked - pair[0].total_staked) / span_days);
    }

    let daily_growth_rate = if deltas.is_empty() {
        0.0
    } else {
        deltas.iter().mean()
    };
    let volatility = if deltas.len() < 2 {
        0.0
    } else {
        deltas.iter().std_dev()
    };

    StakingTrend {
        daily_growth_rate,
        volatility,
        r_squared: linear_fit_r_squared(&sorted),
    }
}

/// R-squared of an ordinary least-squares line through the series, computed
/// as the squared correlation between fitted and actual values. Degenerate
/// fits (flat line, flat series) read as zero.
fn linear_fit_r_squared(sorted: &[&HistoricalDataPoint]) -> f64 {
    let xs: Vec<f64> = (0..sorted.len()).map(|i| i as f64).collect();
    let ys: Vec<f64> = sorted.iter().map(|p| p.total_staked).collect();

    let x_mean = xs.iter().mean();
    let y_mean = ys.iter().mean();

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for (x, y) in xs.iter().zip(&ys) {
        sxx += (x - x_mean).powi(2);
        sxy += (x - x_mean) * (y - y_mean);
    }
    if sxx == 0.0 {
        return 0.0;
    }
    let slope = sxy / sxx;
    let intercept = y_mean - slope * x_mean;

    let fitted: Vec<f64> = xs.iter().map(|x| intercept + slope * x).collect();
    let f_mean = fitted.iter().mean();

    let mut covariance = 0.0;
    let mut fitted_var = 0.0;
    let mut actual_var = 0.0;
    for (f, y) in fitted.iter().zip(&ys) {
        covariance += (f - f_mean) * (y - y_mean);
        fitted_var += (f - f_mean).powi(2);
        actual_var += (y - y_mean).powi(2);
    }
    if fitted_var <= f64::EPSILON || actual_var <= f64::EPSILON {
        return 0.0;
    }
    (covariance / (fitted_var.sqrt() * actual_var.sqrt())).powi(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn history_point(day: i64, total_staked: f64) -> HistoricalDataPoint {
        HistoricalDataPoint {
            timestamp: Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap() + Duration::days(day),
            total_staked,
            active_validators: (total_staked / 32.0) as u64,
            entry_queue_length: 0,
            exit_queue_length: 0,
            observed_apr: None,
        }
    }

    #[test]
    fn too_short_history_has_no_trend() {
        assert_eq!(estimate_trend(&[]), StakingTrend::default());
        assert_eq!(
            estimate_trend(&[history_point(0, 34_000_000.0)]),
            StakingTrend::default()
        );
    }

    #[test]
    fn perfect_line_recovers_slope() {
        let history: Vec<_> = (0..10)
            .map(|d| history_point(d, 34_000_000.0 + d as f64 * 5_000.0))
            .collect();
        let trend = estimate_trend(&history);
        assert!((trend.daily_growth_rate - 5_000.0).abs() < 1e-9);
        assert!(trend.volatility.abs() < 1e-9);
        assert!((trend.r_squared - 1.0).abs() < 1e-9);
    }

    #[test]
    fn flat_series_is_trendless() {
        let history: Vec<_> = (0..10).map(|d| history_point(d, 34_500_000.0)).collect();
        let trend = estimate_trend(&history);
        assert_eq!(trend.daily_growth_rate, 0.0);
        assert_eq!(trend.volatility, 0.0);
        assert_eq!(trend.r_squared, 0.0);
    }

    #[test]
    fn volatility_is_sample_std_dev_of_deltas() {
        // Deltas are 100 then 200, so mean 150 and sample std dev
        // sqrt((50^2 + 50^2) / 1).
        let history = vec![
            history_point(0, 1_000.0),
            history_point(1, 1_100.0),
            history_point(2, 1_300.0),
        ];
        let trend = estimate_trend(&history);
        assert!((trend.daily_growth_rate - 150.0).abs() < 1e-9);
        assert!((trend.volatility - (5_000.0_f64).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn gaps_normalize_by_span() {
        // 2_000 ETH over a four-day gap is 500 ETH per day.
        let history = vec![history_point(0, 1_000_000.0), history_point(4, 1_002_000.0)];
        let trend = estimate_trend(&history);
        assert!((trend.daily_growth_rate - 500.0).abs() < 1e-9);
    }

    #[test]
    fn duplicate_timestamps_contribute_nothing() {
        let mut history = vec![
            history_point(0, 1_000_000.0),
            history_point(1, 1_000_100.0),
            history_point(2, 1_000_200.0),
        ];
        // Same timestamp, wildly different stake. Must not blow up the rate.
        history.push(history_point(2, 9_999_999.0));
        let trend = estimate_trend(&history);
        assert!(trend.daily_growth_rate.is_finite());
        assert!((trend.daily_growth_rate - 100.0).abs() < 1e-9);
    }

    #[test]
    fn unsorted_input_matches_sorted() {
        let sorted: Vec<_> = (0..8)
            .map(|d| history_point(d, 34_000_000.0 + (d * d) as f64 * 1_000.0))
            .collect();
        let mut shuffled = sorted.clone();
        shuffled.swap(0, 5);
        shuffled.swap(2, 7);
        assert_eq!(estimate_trend(&sorted), estimate_trend(&shuffled));
    }

    #[test]
    fn noisy_growth_keeps_r_squared_under_one() {
        let wobble = [0.0, 40_000.0, -25_000.0, 60_000.0, -10_000.0, 30_000.0];
        let history: Vec<_> = (0..6)
            .map(|d| history_point(d, 34_000_000.0 + d as f64 * 8_000.0 + wobble[d as usize]))
            .collect();
        let trend = estimate_trend(&history);
        assert!(trend.r_squared > 0.0 && trend.r_squared < 1.0);
        assert!(trend.volatility > 0.0);
    }
}
