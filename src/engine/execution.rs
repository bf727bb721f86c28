//! Execution-layer yield projection.
//!
//! Projects per-validator daily fee income `d` days ahead by blending two
//! views: the current yield mean-reverted toward its regime target with an
//! exponential half-life, and the target of whichever regime the Markov
//! chain most expects to occupy at that horizon. The blend is then
//! annualized against the 32 ETH stake basis and split into priority-fee
//! and MEV components.

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::engine::protocol::MAX_EFFECTIVE_BALANCE;
use crate::engine::regime::{FeeRegime, RegimeConfig};
use crate::engine::types::ConfidenceInterval;

/// Days used to annualize a daily yield.
const DAYS_PER_YEAR: f64 = 365.0;

/// Weight of the mean-reverted path in the final yield.
const REVERTED_WEIGHT: f64 = 0.7;

/// Weight of the expected-regime target in the final yield.
const EXPECTED_TARGET_WEIGHT: f64 = 0.3;

/// Share of execution income arriving as priority fees.
const PRIORITY_FEE_SHARE: f64 = 0.4;

/// Share of execution income arriving as MEV.
const MEV_SHARE: f64 = 0.6;

/// Multiplicative band growth per square-root day of horizon.
const UNCERTAINTY_PER_SQRT_DAY: f64 = 0.1;

/// Execution-layer APR projection at one horizon.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExecutionYieldForecast {
    /// Annualized execution APR, in percent.
    pub total_apr: f64,
    /// Priority-fee slice of `total_apr`.
    pub priority_fee_apr: f64,
    /// MEV slice of `total_apr`.
    pub mev_apr: f64,
    /// Most probable regime at the horizon.
    pub expected_regime: FeeRegime,
    /// Blended per-validator daily yield, in ETH.
    pub daily_yield: f64,
    /// Multiplicative band around `total_apr`.
    pub confidence: ConfidenceInterval,
}

/// Projects execution-layer yields under a regime transition model.
#[derive(Debug, Clone)]
pub struct ExecutionYieldForecaster {
    config: RegimeConfig,
    /// Column-stochastic transpose used for occupancy propagation.
    transition_t: Matrix3<f64>,
}

impl ExecutionYieldForecaster {
    pub fn new(config: RegimeConfig) -> Self {
        let transition_t = config.transitions.to_matrix().transpose();
        Self {
            config,
            transition_t,
        }
    }

    pub fn config(&self) -> &RegimeConfig {
        &self.config
    }

    /// Regime occupancy distribution after `days` daily transitions from a
    /// point mass on `start`.
    pub fn occupancy_after(&self, start: FeeRegime, days: u32) -> Vector3<f64> {
        let mut occupancy = Vector3::zeros();
        occupancy[start.index()] = 1.0;
        for _ in 0..days {
            occupancy = self.transition_t * occupancy;
        }
        occupancy
    }

    /// Most probable regime after `days` transitions. Exact ties resolve to
    /// the earliest entry of [`FeeRegime::ALL`].
    pub fn expected_regime_after(&self, start: FeeRegime, days: u32) -> FeeRegime {
        let occupancy = self.occupancy_after(start, days);
        let mut best = FeeRegime::Calm;
        let mut best_p = f64::NEG_INFINITY;
        for regime in FeeRegime::ALL {
            let p = occupancy[regime.index()];
            if p > best_p {
                best = regime;
                best_p = p;
            }
        }
        best
    }

    /// Projects the execution APR `days_ahead` days out.
    ///
    /// `current_yield` is today's per-validator daily income in ETH and
    /// `current_regime` the regime it was observed under. At `days_ahead ==
    /// 0` the reverted path equals the current yield exactly.
    pub fn project(
        &self,
        current_yield: f64,
        current_regime: FeeRegime,
        days_ahead: u32,
        active_validators: u64,
    ) -> ExecutionYieldForecast {
        let days = days_ahead as f64;
        let dynamics = self.config.dynamics.for_regime(current_regime);

        let decay = 0.5_f64.powf(days / dynamics.half_life_days);
        let reverted = current_yield * decay + dynamics.target * (1.0 - decay);

        let expected_regime = self.expected_regime_after(current_regime, days_ahead);
        let expected_target = self.config.dynamics.for_regime(expected_regime).target;
        let daily_yield = reverted * REVERTED_WEIGHT + expected_target * EXPECTED_TARGET_WEIGHT;

        let total_apr = annualize_daily_yield(daily_yield);
        let priority_fee_apr = annualize_daily_yield(daily_yield * PRIORITY_FEE_SHARE);
        let mev_apr = annualize_daily_yield(daily_yield * MEV_SHARE);

        let uncertainty = 1.0 + days.sqrt() * UNCERTAINTY_PER_SQRT_DAY;
        let confidence = ConfidenceInterval {
            lower: total_apr / uncertainty,
            upper: total_apr * uncertainty,
        };

        tracing::debug!(
            days_ahead,
            validators = active_validators,
            regime = current_regime.as_str(),
            expected = expected_regime.as_str(),
            daily_yield,
            apr = total_apr,
            "projected execution yield"
        );

        ExecutionYieldForecast {
            total_apr,
            priority_fee_apr,
            mev_apr,
            expected_regime,
            daily_yield,
            confidence,
        }
    }
}

/// Annualizes a per-validator daily yield into percent APR on 32 ETH.
pub fn annualize_daily_yield(daily_yield: f64) -> f64 {
    daily_yield * DAYS_PER_YEAR / MAX_EFFECTIVE_BALANCE * 100.0
}
