//! Day-stepped hybrid forecast simulation.
//!
//! Fuses the closed-form protocol model with the regime-driven execution
//! projection and the historical trend into one forward walk. Each simulated
//! day recomputes both APR layers from the running stake, applies an
//! APR-sensitive net flow clamped by validator churn, and decays the entry
//! and exit queues. Daily states are then downsampled to monthly snapshots.
//!
//! The walk is fully deterministic: same history, same config, same
//! scenario, same output.

use chrono::{DateTime, Duration, Utc};

use crate::engine::execution::ExecutionYieldForecaster;
use crate::engine::protocol::{self, EPOCHS_PER_DAY, MAX_EFFECTIVE_BALANCE};
use crate::engine::regime::{FeeRegime, RegimeConfig, RegimeDetector};
use crate::engine::scenario::ScenarioParams;
use crate::engine::trend::{estimate_trend, StakingTrend};
use crate::engine::types::{
    ConfidenceInterval, DriverAttribution, ExecutionDataPoint, ForecastComponents, ForecastError,
    ForecastPoint, HistoricalDataPoint,
};

/// Simulated days per output month.
pub const DAYS_PER_MONTH: u32 = 30;

/// Total APR at which net stake flow is assumed neutral, in percent.
const APR_EQUILIBRIUM: f64 = 4.0;

/// Flow scaling per percentage point of APR away from equilibrium.
const APR_FEEDBACK_GAIN: f64 = 0.1;

/// Two-sided 95% normal quantile for the stake confidence band.
const CONFIDENCE_Z: f64 = 1.96;

/// Fraction of the daily churn capacity a full scenario bias injects.
const NET_FLOW_BIAS_SCALE: f64 = 0.1;

/// Mutable quantities carried across simulated days.
struct RunningState {
    total_staked: f64,
    active_validators: u64,
    entry_queue: f64,
    exit_queue: f64,
}

/// Day-stepping forecast engine over one scenario.
#[derive(Debug, Clone)]
pub struct ForecastSimulator {
    config: RegimeConfig,
    detector: RegimeDetector,
    forecaster: ExecutionYieldForecaster,
}

impl ForecastSimulator {
    /// Builds a simulator after validating the regime tables.
    pub fn new(config: RegimeConfig) -> Result<Self, ForecastError> {
        config.validate()?;
        Ok(Self {
            detector: RegimeDetector::new(config),
            forecaster: ExecutionYieldForecaster::new(config),
            config,
        })
    }

    /// Builds a simulator on the built-in regime tables.
    pub fn with_defaults() -> Self {
        let config = RegimeConfig::default();
        Self {
            detector: RegimeDetector::new(config),
            forecaster: ExecutionYieldForecaster::new(config),
            config,
        }
    }

    pub fn config(&self) -> &RegimeConfig {
        &self.config
    }

    /// Runs one scenario `months_ahead` months forward and returns monthly
    /// snapshots (every 30th simulated day, plus the final day).
    ///
    /// `history` anchors the walk at its most recent point and supplies the
    /// trend; `execution_history` seeds the fee regime. An empty stake
    /// history is an error; an empty execution history falls back to calm.
    /// Zero months yields an empty forecast.
    pub fn generate_forecast(
        &self,
        history: &[HistoricalDataPoint],
        execution_history: &[ExecutionDataPoint],
        months_ahead: u32,
        params: &ScenarioParams,
    ) -> Result<Vec<ForecastPoint>, ForecastError> {
        params.validate()?;

        let mut sorted: Vec<HistoricalDataPoint> = history.to_vec();
        sorted.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        let Some(latest) = sorted.last().cloned() else {
            return Err(ForecastError::EmptyHistory);
        };

        let detection = self
            .detector
            .detect(execution_history, latest.active_validators);
        let current_yield = self
            .detector
            .current_yield(execution_history, latest.active_validators);
        let base_regime = params.regime_bias.unwrap_or(detection.current_regime);
        let trend = estimate_trend(&sorted);

        let total_days = total_simulation_days(months_ahead);
        tracing::info!(
            months_ahead,
            total_days,
            total_staked = latest.total_staked,
            regime = base_regime.as_str(),
            regime_confidence = detection.confidence,
            growth_per_day = trend.daily_growth_rate,
            net_flow_bias = params.net_flow_bias,
            mev_multiplier = params.mev_multiplier,
            "🔮 generating staking forecast"
        );

        let mut state = RunningState {
            total_staked: latest.total_staked,
            active_validators: latest.active_validators,
            entry_queue: latest.entry_queue_length as f64 * params.queue_pressure,
            exit_queue: latest.exit_queue_length as f64 * params.queue_pressure,
        };

        let mut points = Vec::with_capacity(months_ahead as usize);
        for day in 1..=total_days {
            let point = self.step_day(
                &mut state,
                day,
                latest.timestamp,
                current_yield,
                base_regime,
                &trend,
                params,
            );
            if day % DAYS_PER_MONTH == 0 || day == total_days {
                tracing::debug!(
                    day,
                    total_staked = point.total_staked,
                    apr = point.forecast_apr,
                    "retained monthly snapshot"
                );
                points.push(point);
            }
        }

        Ok(points)
    }

    /// Advances the running state by one day and reports the resulting
    /// snapshot. APR layers are computed on the stake as of the morning;
    /// the emitted point carries the stake after the day's flow.
    #[allow(clippy::too_many_arguments)]
    fn step_day(
        &self,
        state: &mut RunningState,
        day: u32,
        anchor: DateTime<Utc>,
        current_yield: f64,
        base_regime: FeeRegime,
        trend: &StakingTrend,
        params: &ScenarioParams,
    ) -> ForecastPoint {
        let consensus_apr = protocol::theoretical_apr(state.total_staked);
        let execution = self
            .forecaster
            .project(current_yield, base_regime, day, state.active_validators);
        let execution_apr = execution.total_apr * params.mev_multiplier;
        let priority_fee_apr = execution.priority_fee_apr * params.mev_multiplier;
        let mev_apr = execution.mev_apr * params.mev_multiplier;
        let total_apr = consensus_apr + execution_apr;

        let drivers = attribute_drivers(
            consensus_apr,
            execution_apr,
            priority_fee_apr,
            mev_apr,
            execution.expected_regime,
        );

        // Churn caps how much stake can actually move in a day.
        let churn = protocol::churn_limit(state.active_validators);
        let max_daily_change = churn as f64 * EPOCHS_PER_DAY * MAX_EFFECTIVE_BALANCE;

        let biased_rate = trend.daily_growth_rate
            + params.net_flow_bias * max_daily_change * NET_FLOW_BIAS_SCALE;
        let responsive_rate = apply_apr_feedback(biased_rate, total_apr);
        let growth = if responsive_rate >= 0.0 {
            responsive_rate.min(max_daily_change)
        } else {
            responsive_rate.max(-max_daily_change)
        };

        state.total_staked = (state.total_staked + growth).max(0.0);
        state.active_validators = (state.total_staked / MAX_EFFECTIVE_BALANCE).floor() as u64;
        let queue_drain = protocol::churn_limit(state.active_validators) as f64 * EPOCHS_PER_DAY;
        state.entry_queue = (state.entry_queue - queue_drain).max(0.0);
        state.exit_queue = (state.exit_queue - queue_drain).max(0.0);

        let uncertainty = (day as f64).sqrt() * trend.volatility * MAX_EFFECTIVE_BALANCE;
        let confidence = ConfidenceInterval {
            lower: (state.total_staked - CONFIDENCE_Z * uncertainty).max(0.0),
            upper: state.total_staked + CONFIDENCE_Z * uncertainty,
        };

        ForecastPoint {
            date: anchor + Duration::days(day as i64),
            total_staked: state.total_staked,
            stake_ratio: protocol::stake_ratio(state.total_staked),
            forecast_apr: total_apr,
            confidence,
            components: ForecastComponents {
                protocol_base: consensus_apr,
                trend_adjustment: growth,
                queue_constraint: max_daily_change,
            },
            drivers,
        }
    }
}

/// Total simulated days for a horizon. Saturates at `u32::MAX` so absurd
/// month counts cannot overflow the day counter.
pub fn total_simulation_days(months_ahead: u32) -> u32 {
    months_ahead.saturating_mul(DAYS_PER_MONTH)
}

/// Scales a net daily flow by how far the total APR sits from the assumed
/// equilibrium: above it stake arrives faster, below it flows reverse or
/// shrink.
pub fn apply_apr_feedback(rate: f64, total_apr: f64) -> f64 {
    rate * (1.0 + APR_FEEDBACK_GAIN * (total_apr - APR_EQUILIBRIUM))
}

/// Splits a total APR into consensus and execution shares, and the execution
/// share into its priority-fee and MEV slices, all in percent of total.
/// Zero denominators attribute zero shares.
fn attribute_drivers(
    consensus_apr: f64,
    execution_apr: f64,
    priority_fee_apr: f64,
    mev_apr: f64,
    fee_regime: FeeRegime,
) -> DriverAttribution {
    let total_apr = consensus_apr + execution_apr;
    if total_apr <= 0.0 {
        return DriverAttribution {
            consensus_apr,
            execution_apr,
            total_apr,
            consensus_pct: 0.0,
            execution_pct: 0.0,
            priority_fees_pct: 0.0,
            mev_pct: 0.0,
            fee_regime,
        };
    }
    let consensus_pct = consensus_apr / total_apr * 100.0;
    let execution_pct = execution_apr / total_apr * 100.0;
    let (priority_fees_pct, mev_pct) = if execution_apr <= 0.0 {
        (0.0, 0.0)
    } else {
        (
            priority_fee_apr / execution_apr * execution_pct,
            mev_apr / execution_apr * execution_pct,
        )
    };
    DriverAttribution {
        consensus_apr,
        execution_apr,
        total_apr,
        consensus_pct,
        execution_pct,
        priority_fees_pct,
        mev_pct,
        fee_regime,
    }
}
