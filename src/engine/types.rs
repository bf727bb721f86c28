//! Boundary records shared across the forecast engine.
//!
//! Inputs (`HistoricalDataPoint`, `ExecutionDataPoint`) arrive from whatever
//! recorded or synthesized them; outputs (`ForecastPoint` and its nested
//! parts) serialize straight to JSON for downstream consumers. Everything is
//! plain data with serde derives. Derived protocol metrics hang off
//! [`ProtocolState`] and delegate to [`crate::engine::protocol`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::engine::protocol::{self, RealisticAprParams};
use crate::engine::regime::FeeRegime;

// ============================================================================
// Input records
// ============================================================================

/// One observed day of consensus-layer stake data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalDataPoint {
    pub timestamp: DateTime<Utc>,
    /// Total active stake in ETH.
    pub total_staked: f64,
    pub active_validators: u64,
    /// Validators waiting to activate.
    pub entry_queue_length: u64,
    /// Validators waiting to exit.
    pub exit_queue_length: u64,
    /// Externally reported APR for that day, when one was recorded.
    #[serde(default)]
    pub observed_apr: Option<f64>,
}

/// One observed day of execution-layer fee flow, network-wide.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionDataPoint {
    pub timestamp: DateTime<Utc>,
    /// Priority fees paid to proposers that day, in ETH.
    pub priority_fee_amount: f64,
    /// Relay-reported MEV paid to proposers that day, in ETH.
    pub mev_amount: f64,
    /// Mean gas price over the day, in Gwei.
    pub avg_gas_price: f64,
    /// Blocks produced that day.
    pub block_count: u64,
}

// ============================================================================
// Protocol snapshot
// ============================================================================

/// Snapshot of the protocol variables the reward formulas care about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolState {
    pub total_staked: f64,
    pub active_validators: u64,
    pub entry_queue_length: u64,
    pub exit_queue_length: u64,
    /// Fraction of duties assumed performed when estimating realistic APR.
    pub network_participation: f64,
}

impl ProtocolState {
    /// Builds a snapshot from an observed history point.
    pub fn from_history_point(point: &HistoricalDataPoint, network_participation: f64) -> Self {
        Self {
            total_staked: point.total_staked,
            active_validators: point.active_validators,
            entry_queue_length: point.entry_queue_length,
            exit_queue_length: point.exit_queue_length,
            network_participation,
        }
    }

    /// Share of circulating supply staked, in percent.
    pub fn stake_ratio(&self) -> f64 {
        protocol::stake_ratio(self.total_staked)
    }

    /// Ideal APR at this stake level.
    pub fn theoretical_apr(&self) -> f64 {
        protocol::theoretical_apr(self.total_staked)
    }

    /// Participation-scaled APR including proposal income.
    pub fn realistic_apr(&self, params: RealisticAprParams) -> f64 {
        let params = RealisticAprParams {
            participation: self.network_participation,
            ..params
        };
        protocol::realistic_apr(self.total_staked, params)
    }

    /// Validators permitted to enter or exit per epoch.
    pub fn churn_limit(&self) -> u64 {
        protocol::churn_limit(self.active_validators)
    }

    /// Epochs a new deposit would wait behind the current entry queue.
    pub fn activation_wait_epochs(&self) -> u64 {
        protocol::activation_wait_epochs(self.entry_queue_length, self.active_validators)
    }

    /// Epochs a withdrawal would wait behind the current exit queue.
    pub fn exit_wait_epochs(&self) -> u64 {
        protocol::exit_wait_epochs(self.exit_queue_length, self.active_validators)
    }
}

// ============================================================================
// Output records
// ============================================================================

/// Symmetric-in-meaning lower/upper band around a forecast value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceInterval {
    pub lower: f64,
    pub upper: f64,
}

impl ConfidenceInterval {
    pub fn width(&self) -> f64 {
        self.upper - self.lower
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

/// How the day's stake change was assembled.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastComponents {
    /// Consensus-layer APR before execution rewards, in percent.
    pub protocol_base: f64,
    /// Net stake change applied that day, in ETH.
    pub trend_adjustment: f64,
    /// Churn-imposed ceiling on the day's stake change, in ETH.
    pub queue_constraint: f64,
}

/// Where the forecast APR comes from, as shares of the total.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DriverAttribution {
    pub consensus_apr: f64,
    pub execution_apr: f64,
    pub total_apr: f64,
    /// Consensus share of total, in percent of total APR.
    pub consensus_pct: f64,
    /// Execution share of total, in percent of total APR.
    pub execution_pct: f64,
    /// Priority-fee slice of the execution share, in percent of total APR.
    pub priority_fees_pct: f64,
    /// MEV slice of the execution share, in percent of total APR.
    pub mev_pct: f64,
    /// Fee regime the execution projection expects at this horizon.
    pub fee_regime: FeeRegime,
}

/// One monthly forecast snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: DateTime<Utc>,
    /// Projected total stake in ETH.
    pub total_staked: f64,
    /// Projected share of supply staked, in percent.
    pub stake_ratio: f64,
    /// Projected total APR (consensus + execution), in percent.
    pub forecast_apr: f64,
    /// Band around `total_staked`, widening with horizon.
    pub confidence: ConfidenceInterval,
    pub components: ForecastComponents,
    pub drivers: DriverAttribution,
}

// ============================================================================
// Errors
// ============================================================================

/// Failures the forecast engine reports instead of guessing.
#[derive(Debug, Clone, PartialEq)]
pub enum ForecastError {
    /// No historical stake data to anchor a forecast on.
    EmptyHistory,
    /// Regime tables failed validation.
    InvalidConfig(String),
    /// Scenario parameters are outside their allowed ranges.
    InvalidScenario(String),
}

impl fmt::Display for ForecastError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ForecastError::EmptyHistory => {
                write!(f, "historical data is empty, cannot anchor a forecast")
            }
            ForecastError::InvalidConfig(msg) => write!(f, "invalid regime config: {}", msg),
            ForecastError::InvalidScenario(msg) => write!(f, "invalid scenario: {}", msg),
        }
    }
}

impl std::error::Error for ForecastError {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn point() -> HistoricalDataPoint {
        HistoricalDataPoint {
            timestamp: Utc.with_ymd_and_hms(2025, 6, 30, 0, 0, 0).unwrap(),
            total_staked: 34_500_000.0,
            active_validators: 1_078_125,
            entry_queue_length: 2_500,
            exit_queue_length: 800,
            observed_apr: Some(3.1),
        }
    }

    #[test]
    fn snapshot_carries_observation_fields() {
        let state = ProtocolState::from_history_point(&point(), 0.995);
        assert_eq!(state.total_staked, 34_500_000.0);
        assert_eq!(state.active_validators, 1_078_125);
        assert_eq!(state.entry_queue_length, 2_500);
        assert_eq!(state.exit_queue_length, 800);
        assert_eq!(state.network_participation, 0.995);
    }

    #[test]
    fn snapshot_metrics_match_free_functions() {
        let state = ProtocolState::from_history_point(&point(), 0.995);
        assert_eq!(state.stake_ratio(), protocol::stake_ratio(34_500_000.0));
        assert_eq!(state.theoretical_apr(), protocol::theoretical_apr(34_500_000.0));
        assert_eq!(state.churn_limit(), 16);
        assert_eq!(state.activation_wait_epochs(), 157);
        assert_eq!(state.exit_wait_epochs(), 50);
    }

    #[test]
    fn snapshot_realistic_apr_uses_own_participation() {
        let state = ProtocolState::from_history_point(&point(), 0.5);
        let apr = state.realistic_apr(RealisticAprParams::default());
        let expected = protocol::realistic_apr(
            34_500_000.0,
            RealisticAprParams {
                participation: 0.5,
                ..RealisticAprParams::default()
            },
        );
        assert_eq!(apr, expected);
    }

    #[test]
    fn interval_helpers() {
        let ci = ConfidenceInterval {
            lower: 10.0,
            upper: 14.0,
        };
        assert_eq!(ci.width(), 4.0);
        assert!(ci.contains(10.0));
        assert!(ci.contains(12.0));
        assert!(!ci.contains(14.5));
    }

    #[test]
    fn error_messages_read_plainly() {
        assert_eq!(
            ForecastError::EmptyHistory.to_string(),
            "historical data is empty, cannot anchor a forecast"
        );
        assert_eq!(
            ForecastError::InvalidConfig("row 1 sums to 0.9".into()).to_string(),
            "invalid regime config: row 1 sums to 0.9"
        );
        assert_eq!(
            ForecastError::InvalidScenario("mev_multiplier must be positive".into()).to_string(),
            "invalid scenario: mev_multiplier must be positive"
        );
    }

    #[test]
    fn history_point_serde_defaults_observed_apr() {
        let json = r#"{
            "timestamp": "2025-06-30T00:00:00Z",
            "total_staked": 34500000.0,
            "active_validators": 1078125,
            "entry_queue_length": 2500,
            "exit_queue_length": 800
        }"#;
        let parsed: HistoricalDataPoint = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.observed_apr, None);
        assert_eq!(parsed.total_staked, 34_500_000.0);
    }
}
