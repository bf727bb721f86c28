//! Hybrid staking forecast engine.
//!
//! Produces 1-12 month forecasts of total stake, stake ratio and validator
//! APR by fusing three models that are each too weak on their own:
//!
//! ```text
//!   stake history ──► trend ─────────────┐
//!                                        ▼
//!   protocol constants ──► reward math ──► day-stepped simulator ──► monthly
//!                                        ▲    (per scenario)        snapshots
//!   fee history ──► regime detector ─────┘
//!                   + Markov projection
//! ```
//!
//! The consensus layer is closed-form (rewards scale with `1/sqrt(stake)`),
//! the execution layer is regime-driven mean reversion, and net stake flow
//! follows the historical trend bent by scenario bias and APR feedback,
//! capped by validator churn.
//!
//! Determinism: the whole pipeline is pure arithmetic over its inputs. No
//! clocks, no RNG, no I/O. Identical inputs produce identical forecasts,
//! which is what makes scenario diffs meaningful.

pub mod execution;
pub mod protocol;
pub mod regime;
pub mod scenario;
pub mod simulator;
pub mod trend;
pub mod types;

#[cfg(test)]
mod simulator_tests;

// Primary entry points, re-exported for callers that don't care about the
// internal split.
pub use execution::{ExecutionYieldForecast, ExecutionYieldForecaster};
pub use regime::{FeeRegime, RegimeConfig, RegimeDetection, RegimeDetector, RegimeWindowStats};
pub use scenario::{ScenarioEngine, ScenarioForecasts, ScenarioParams, ScenarioSummary};
pub use simulator::{ForecastSimulator, DAYS_PER_MONTH};
pub use trend::{estimate_trend, StakingTrend};
pub use types::{
    ConfidenceInterval, DriverAttribution, ExecutionDataPoint, ForecastComponents, ForecastError,
    ForecastPoint, HistoricalDataPoint, ProtocolState,
};
