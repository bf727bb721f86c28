//! Scenario parameterization and fan-out.
//!
//! A scenario is a small set of knobs layered onto the simulator: a net-flow
//! bias, an MEV multiplier, a queue-pressure scale and an optional regime
//! override. The engine runs the three standard presets in parallel and
//! returns them side by side for comparison.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::engine::regime::{FeeRegime, RegimeConfig};
use crate::engine::simulator::ForecastSimulator;
use crate::engine::types::{ExecutionDataPoint, ForecastError, ForecastPoint, HistoricalDataPoint};

/// Knobs distinguishing one scenario from another.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScenarioParams {
    /// Net stake inflow bias in `[-1, 1]`, as a fraction of the scaled
    /// daily churn capacity. Zero leans entirely on the historical trend.
    pub net_flow_bias: f64,
    /// Multiplier on the projected execution-layer APR.
    pub mev_multiplier: f64,
    /// Scale applied to the starting entry and exit queues.
    pub queue_pressure: f64,
    /// Forces the starting fee regime instead of detecting it.
    #[serde(default)]
    pub regime_bias: Option<FeeRegime>,
}

impl ScenarioParams {
    /// Current conditions carried forward unchanged.
    pub fn baseline() -> Self {
        Self {
            net_flow_bias: 0.0,
            mev_multiplier: 1.0,
            queue_pressure: 1.0,
            regime_bias: None,
        }
    }

    /// Strong inflows, busier fee markets.
    pub fn bullish() -> Self {
        Self {
            net_flow_bias: 0.5,
            mev_multiplier: 1.3,
            queue_pressure: 1.5,
            regime_bias: Some(FeeRegime::Elevated),
        }
    }

    /// Net outflows, quiet fee markets.
    pub fn bearish() -> Self {
        Self {
            net_flow_bias: -0.5,
            mev_multiplier: 0.7,
            queue_pressure: 0.5,
            regime_bias: Some(FeeRegime::Calm),
        }
    }

    /// Range checks for hand-built scenarios. The presets always pass.
    pub fn validate(&self) -> Result<(), ForecastError> {
        if !self.net_flow_bias.is_finite() || !(-1.0..=1.0).contains(&self.net_flow_bias) {
            return Err(ForecastError::InvalidScenario(format!(
                "net_flow_bias {} must lie in [-1, 1]",
                self.net_flow_bias
            )));
        }
        if !self.mev_multiplier.is_finite() || self.mev_multiplier <= 0.0 {
            return Err(ForecastError::InvalidScenario(format!(
                "mev_multiplier {} must be positive",
                self.mev_multiplier
            )));
        }
        if !self.queue_pressure.is_finite() || self.queue_pressure <= 0.0 {
            return Err(ForecastError::InvalidScenario(format!(
                "queue_pressure {} must be positive",
                self.queue_pressure
            )));
        }
        Ok(())
    }
}

/// The three standard forecasts, one per preset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioForecasts {
    pub baseline: Vec<ForecastPoint>,
    pub bullish: Vec<ForecastPoint>,
    pub bearish: Vec<ForecastPoint>,
}

impl ScenarioForecasts {
    /// Scenarios paired with their names, in presentation order.
    pub fn named(&self) -> [(&'static str, &[ForecastPoint]); 3] {
        [
            ("baseline", self.baseline.as_slice()),
            ("bullish", self.bullish.as_slice()),
            ("bearish", self.bearish.as_slice()),
        ]
    }
}

/// Headline numbers for one scenario's forecast.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSummary {
    pub points: usize,
    pub final_total_staked: f64,
    pub final_stake_ratio: f64,
    pub final_apr: f64,
    pub min_apr: f64,
    pub max_apr: f64,
}

impl ScenarioSummary {
    /// Collapses a forecast into its headline numbers. Empty input reads as
    /// all zeros.
    pub fn from_points(points: &[ForecastPoint]) -> Self {
        let Some(last) = points.last() else {
            return Self {
                points: 0,
                final_total_staked: 0.0,
                final_stake_ratio: 0.0,
                final_apr: 0.0,
                min_apr: 0.0,
                max_apr: 0.0,
            };
        };
        let mut min_apr = f64::INFINITY;
        let mut max_apr = f64::NEG_INFINITY;
        for point in points {
            min_apr = min_apr.min(point.forecast_apr);
            max_apr = max_apr.max(point.forecast_apr);
        }
        Self {
            points: points.len(),
            final_total_staked: last.total_staked,
            final_stake_ratio: last.stake_ratio,
            final_apr: last.forecast_apr,
            min_apr,
            max_apr,
        }
    }
}

/// Runs the standard scenario presets against one simulator.
#[derive(Debug, Clone)]
pub struct ScenarioEngine {
    simulator: ForecastSimulator,
}

impl ScenarioEngine {
    /// Builds an engine after validating the regime tables.
    pub fn new(config: RegimeConfig) -> Result<Self, ForecastError> {
        Ok(Self {
            simulator: ForecastSimulator::new(config)?,
        })
    }

    /// Builds an engine on the built-in regime tables.
    pub fn with_defaults() -> Self {
        Self {
            simulator: ForecastSimulator::with_defaults(),
        }
    }

    pub fn simulator(&self) -> &ForecastSimulator {
        &self.simulator
    }

    /// Generates baseline, bullish and bearish forecasts over the same
    /// inputs. The three runs are independent and execute in parallel; the
    /// first failure wins.
    pub fn run(
        &self,
        history: &[HistoricalDataPoint],
        execution_history: &[ExecutionDataPoint],
        months_ahead: u32,
    ) -> Result<ScenarioForecasts, ForecastError> {
        let presets = [
            ScenarioParams::baseline(),
            ScenarioParams::bullish(),
            ScenarioParams::bearish(),
        ];
        let mut runs: Vec<Vec<ForecastPoint>> = presets
            .par_iter()
            .map(|params| {
                self.simulator
                    .generate_forecast(history, execution_history, months_ahead, params)
            })
            .collect::<Result<_, _>>()?;

        // Collected in preset order.
        let bearish = runs.pop().unwrap_or_default();
        let bullish = runs.pop().unwrap_or_default();
        let baseline = runs.pop().unwrap_or_default();

        tracing::info!(
            months_ahead,
            baseline_final = ScenarioSummary::from_points(&baseline).final_total_staked,
            bullish_final = ScenarioSummary::from_points(&bullish).final_total_staked,
            bearish_final = ScenarioSummary::from_points(&bearish).final_total_staked,
            "scenario fan-out complete"
        );

        Ok(ScenarioForecasts {
            baseline,
            bullish,
            bearish,
        })
    }
}
