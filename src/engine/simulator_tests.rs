//! Scenario-level tests for the day-stepped simulator.
//!
//! These drive the full `generate_forecast` path over crafted histories
//! where the expected trajectory can be reasoned out by hand.

use chrono::{Duration, TimeZone, Utc};

use crate::engine::regime::{FeeRegime, RegimeConfig};
use crate::engine::scenario::{ScenarioEngine, ScenarioParams};
use crate::engine::simulator::{total_simulation_days, ForecastSimulator};
use crate::engine::types::{ExecutionDataPoint, ForecastError, HistoricalDataPoint};

fn anchor() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 30, 0, 0, 0).unwrap()
}

/// `days` observations ending at the anchor, walking `per_day` ETH per day
/// up to `final_stake`.
fn stake_history(days: i64, final_stake: f64, per_day: f64) -> Vec<HistoricalDataPoint> {
    (0..days)
        .map(|age| {
            let total_staked = final_stake - age as f64 * per_day;
            HistoricalDataPoint {
                timestamp: anchor() - Duration::days(age),
                total_staked,
                active_validators: (total_staked / 32.0).floor() as u64,
                entry_queue_length: 2_500,
                exit_queue_length: 800,
                observed_apr: None,
            }
        })
        .collect()
}

fn flat_history() -> Vec<HistoricalDataPoint> {
    stake_history(10, 34_500_000.0, 0.0)
}

/// Execution days at a constant per-validator yield for 1_078_125 validators.
fn exec_history(days: i64, yield_per_validator: f64) -> Vec<ExecutionDataPoint> {
    let validators = 1_078_125.0;
    (0..days)
        .map(|age| ExecutionDataPoint {
            timestamp: anchor() - Duration::days(age),
            priority_fee_amount: yield_per_validator * validators * 0.4,
            mev_amount: yield_per_validator * validators * 0.6,
            avg_gas_price: 15.0,
            block_count: 7_200,
        })
        .collect()
}

#[test]
fn empty_history_is_an_error() {
    let simulator = ForecastSimulator::with_defaults();
    let err = simulator
        .generate_forecast(&[], &[], 6, &ScenarioParams::baseline())
        .unwrap_err();
    assert_eq!(err, ForecastError::EmptyHistory);
}

#[test]
fn zero_months_yield_no_points() {
    let simulator = ForecastSimulator::with_defaults();
    let points = simulator
        .generate_forecast(&flat_history(), &[], 0, &ScenarioParams::baseline())
        .unwrap();
    assert!(points.is_empty());
}

#[test]
fn absurd_horizons_saturate_instead_of_overflowing() {
    // The simulator accepts any u32 horizon; the day counter must clamp
    // rather than wrap once months_ahead * 30 exceeds u32::MAX.
    assert_eq!(total_simulation_days(12), 360);
    assert_eq!(total_simulation_days(u32::MAX / 30), u32::MAX - 15);
    assert_eq!(total_simulation_days(u32::MAX / 30 + 1), u32::MAX);
    assert_eq!(total_simulation_days(u32::MAX), u32::MAX);
}

#[test]
fn invalid_scenario_params_are_rejected() {
    let simulator = ForecastSimulator::with_defaults();
    let mut params = ScenarioParams::baseline();
    params.net_flow_bias = 2.0;
    let err = simulator
        .generate_forecast(&flat_history(), &[], 6, &params)
        .unwrap_err();
    assert!(matches!(err, ForecastError::InvalidScenario(_)));
}

#[test]
fn broken_regime_config_is_rejected_at_construction() {
    let mut config = RegimeConfig::default();
    config.transitions.calm.to_calm = 0.5;
    assert!(matches!(
        ForecastSimulator::new(config),
        Err(ForecastError::InvalidConfig(_))
    ));
    assert!(ScenarioEngine::new(config).is_err());
}

#[test]
fn flat_history_holds_steady_over_six_months() {
    let simulator = ForecastSimulator::with_defaults();
    let points = simulator
        .generate_forecast(&flat_history(), &[], 6, &ScenarioParams::baseline())
        .unwrap();

    assert_eq!(points.len(), 6);
    for (i, point) in points.iter().enumerate() {
        assert_eq!(point.date, anchor() + Duration::days(30 * (i as i64 + 1)));
        // No trend, no bias: the stake must not move at all.
        assert_eq!(point.total_staked, 34_500_000.0);
        assert!((point.stake_ratio - 28.75).abs() < 1e-12);
        // Consensus near 2.8% plus a calm execution layer keeps the total
        // APR inside the plausible staking band.
        assert!(
            point.forecast_apr > 2.0 && point.forecast_apr < 6.0,
            "month {} apr {}",
            i + 1,
            point.forecast_apr
        );
        // Zero volatility collapses the stake band onto the estimate.
        assert_eq!(point.confidence.lower, point.total_staked);
        assert_eq!(point.confidence.upper, point.total_staked);
    }
}

#[test]
fn horizon_controls_point_count() {
    let simulator = ForecastSimulator::with_defaults();
    let history = flat_history();
    for months in [1, 3, 12] {
        let points = simulator
            .generate_forecast(&history, &[], months, &ScenarioParams::baseline())
            .unwrap();
        assert_eq!(points.len(), months as usize);
    }
}

#[test]
fn attribution_shares_always_close() {
    let simulator = ForecastSimulator::with_defaults();
    let history = stake_history(30, 34_500_000.0, 8_000.0);
    let exec = exec_history(14, 0.002);

    for params in [
        ScenarioParams::baseline(),
        ScenarioParams::bullish(),
        ScenarioParams::bearish(),
    ] {
        let points = simulator
            .generate_forecast(&history, &exec, 12, &params)
            .unwrap();
        for point in &points {
            let d = &point.drivers;
            assert!((d.consensus_apr + d.execution_apr - d.total_apr).abs() < 1e-9);
            assert!((d.consensus_pct + d.execution_pct - 100.0).abs() < 1e-6);
            assert!((d.priority_fees_pct + d.mev_pct - d.execution_pct).abs() < 1e-6);
            assert_eq!(point.forecast_apr, d.total_apr);
        }
    }
}

#[test]
fn growth_never_exceeds_churn_capacity() {
    // An absurd 1M ETH/day trend must be capped by validator churn.
    let simulator = ForecastSimulator::with_defaults();
    let history = stake_history(10, 34_500_000.0, 1_000_000.0);
    let points = simulator
        .generate_forecast(&history, &[], 12, &ScenarioParams::baseline())
        .unwrap();

    for point in &points {
        assert!(
            point.components.trend_adjustment <= point.components.queue_constraint + 1e-9,
            "daily change {} above churn cap {}",
            point.components.trend_adjustment,
            point.components.queue_constraint
        );
    }
}

#[test]
fn collapsing_stake_floors_at_zero() {
    // A tiny network bleeding stake runs dry and stays dry.
    let simulator = ForecastSimulator::with_defaults();
    let history = stake_history(3, 1_000.0, -500.0);
    let points = simulator
        .generate_forecast(&history, &[], 6, &ScenarioParams::baseline())
        .unwrap();

    for point in &points {
        assert!(point.total_staked >= 0.0);
        assert!(point.confidence.lower >= 0.0);
    }
    let last = points.last().unwrap();
    assert_eq!(last.total_staked, 0.0);
    // With no stake there is no consensus reward left.
    assert_eq!(last.components.protocol_base, 0.0);
}

#[test]
fn presets_order_the_stake_trajectories() {
    // Elevated detection and a modest trend: the canonical ordering case.
    let history = stake_history(60, 34_500_000.0, 8_000.0);
    let exec = exec_history(14, 0.002);
    let engine = ScenarioEngine::with_defaults();
    let forecasts = engine.run(&history, &exec, 6).unwrap();

    assert_eq!(forecasts.baseline.len(), 6);
    assert_eq!(forecasts.bullish.len(), 6);
    assert_eq!(forecasts.bearish.len(), 6);

    for i in 0..6 {
        let bull = forecasts.bullish[i].total_staked;
        let base = forecasts.baseline[i].total_staked;
        let bear = forecasts.bearish[i].total_staked;
        assert!(bull > base, "month {}: bullish {} vs baseline {}", i + 1, bull, base);
        assert!(base > bear, "month {}: baseline {} vs bearish {}", i + 1, base, bear);
    }
}

#[test]
fn baseline_overtakes_bullish_under_a_hot_detection() {
    // Bullish pins the regime to elevated while baseline keeps the detected
    // hot regime and its higher reversion target. With strong inflows the
    // baseline APR feedback eventually outgrows the bullish flow bias, so
    // bullish leads the early months and baseline wins the long horizon.
    let history = stake_history(30, 34_500_000.0, 80_000.0);
    let exec = exec_history(14, 0.01);
    let engine = ScenarioEngine::with_defaults();
    let forecasts = engine.run(&history, &exec, 6).unwrap();

    let first_bull = forecasts.bullish[0].total_staked;
    let first_base = forecasts.baseline[0].total_staked;
    assert!(
        first_bull > first_base,
        "month 1: bullish {} should lead baseline {}",
        first_bull,
        first_base
    );

    let last_bull = forecasts.bullish[5].total_staked;
    let last_base = forecasts.baseline[5].total_staked;
    assert!(
        last_base > last_bull,
        "month 6: baseline {} should overtake bullish {}",
        last_base,
        last_bull
    );

    // Bearish stays last no matter which regime was detected.
    for i in 0..6 {
        let bear = forecasts.bearish[i].total_staked;
        assert!(bear < forecasts.baseline[i].total_staked);
        assert!(bear < forecasts.bullish[i].total_staked);
    }
}

#[test]
fn regime_bias_lifts_the_execution_layer() {
    let simulator = ForecastSimulator::with_defaults();
    let history = flat_history();
    let exec = exec_history(14, 0.0003);

    let calm = simulator
        .generate_forecast(&history, &exec, 1, &ScenarioParams::baseline())
        .unwrap();
    let mut hot_params = ScenarioParams::baseline();
    hot_params.regime_bias = Some(FeeRegime::Hot);
    let hot = simulator
        .generate_forecast(&history, &exec, 1, &hot_params)
        .unwrap();

    assert!(
        hot[0].forecast_apr > calm[0].forecast_apr,
        "hot bias {} should out-earn calm {}",
        hot[0].forecast_apr,
        calm[0].forecast_apr
    );
}

#[test]
fn queue_depth_does_not_feed_back_into_growth() {
    // Queues are carried state; the daily cap comes from churn, not from
    // queue depth. Scaling the queues must leave the trajectory alone.
    let simulator = ForecastSimulator::with_defaults();
    let history = stake_history(30, 34_500_000.0, 8_000.0);

    let mut light = ScenarioParams::baseline();
    light.queue_pressure = 0.1;
    let mut heavy = ScenarioParams::baseline();
    heavy.queue_pressure = 10.0;

    let a = simulator
        .generate_forecast(&history, &[], 6, &light)
        .unwrap();
    let b = simulator
        .generate_forecast(&history, &[], 6, &heavy)
        .unwrap();
    assert_eq!(a, b);
}

#[test]
fn stake_band_widens_with_horizon() {
    let wobble = [0.0, 12_000.0, -6_000.0, 15_000.0, -3_000.0, 9_000.0];
    let history: Vec<HistoricalDataPoint> = (0..30)
        .map(|age| {
            let total = 34_500_000.0 - age as f64 * 8_000.0 + wobble[(age % 6) as usize];
            HistoricalDataPoint {
                timestamp: anchor() - Duration::days(age),
                total_staked: total,
                active_validators: (total / 32.0).floor() as u64,
                entry_queue_length: 2_500,
                exit_queue_length: 800,
                observed_apr: None,
            }
        })
        .collect();

    let simulator = ForecastSimulator::with_defaults();
    let points = simulator
        .generate_forecast(&history, &[], 6, &ScenarioParams::baseline())
        .unwrap();

    let mut last_width = 0.0;
    for point in &points {
        let width = point.confidence.width();
        assert!(width > last_width, "band must widen with horizon");
        assert!(point.confidence.contains(point.total_staked));
        last_width = width;
    }
}

#[test]
fn identical_inputs_reproduce_identical_forecasts() {
    let history = stake_history(45, 34_500_000.0, 6_500.0);
    let exec = exec_history(10, 0.0015);
    let simulator = ForecastSimulator::with_defaults();

    let a = simulator
        .generate_forecast(&history, &exec, 12, &ScenarioParams::bullish())
        .unwrap();
    let b = simulator
        .generate_forecast(&history, &exec, 12, &ScenarioParams::bullish())
        .unwrap();
    assert_eq!(a, b);
}
