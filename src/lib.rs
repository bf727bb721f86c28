//! Stakecast Library
//!
//! Hybrid staking forecast engine: protocol reward math, fee-regime
//! detection, trend estimation and the scenario simulator, plus a synthetic
//! data source for running without recorded history.

pub mod engine;
pub mod synthetic;

// Re-export the common surface at crate root so binaries and tests don't
// have to spell out the module split.
pub use engine::{
    ForecastError, ForecastPoint, ForecastSimulator, HistoricalDataPoint, ProtocolState,
    ScenarioEngine, ScenarioForecasts, ScenarioParams, ScenarioSummary,
};
pub use engine::{ExecutionDataPoint, FeeRegime, RegimeConfig, RegimeDetection, RegimeDetector};
