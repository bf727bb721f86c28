//! Fee-regime classification and transition dynamics.
//!
//! Execution-layer income is lumpy: long calm stretches punctuated by
//! elevated and occasionally frantic fee markets. Rather than smoothing that
//! away, the engine classifies the recent window into one of three regimes
//! and carries per-regime mean-reversion targets plus a daily Markov
//! transition matrix. All tables live in [`RegimeConfig`] and can be
//! overridden from TOML.

use anyhow::Context;
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::path::Path;

use crate::engine::types::{ExecutionDataPoint, ForecastError};

/// Trailing days of execution data the detector looks at.
pub const REGIME_WINDOW_DAYS: usize = 7;

/// Floor on classification confidence once any data exists.
pub const MIN_CONFIDENCE: f64 = 0.3;

/// Confidence reported when there is no execution history at all.
pub const EMPTY_HISTORY_CONFIDENCE: f64 = 0.5;

/// Volatility assumed when the window is too short for a sample std dev,
/// as a fraction of the window mean.
const FALLBACK_VOL_FRACTION: f64 = 0.3;

/// Row-sum slack tolerated when validating hand-edited transition tables.
const ROW_SUM_TOLERANCE: f64 = 1e-6;

// ============================================================================
// Regimes
// ============================================================================

/// Execution-layer fee regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeRegime {
    Calm,
    Elevated,
    Hot,
}

impl FeeRegime {
    /// All regimes in tie-break order: when expected occupancies tie, the
    /// earlier entry wins.
    pub const ALL: [FeeRegime; 3] = [FeeRegime::Calm, FeeRegime::Elevated, FeeRegime::Hot];

    /// Position in transition-matrix row/column order.
    pub fn index(self) -> usize {
        match self {
            FeeRegime::Calm => 0,
            FeeRegime::Elevated => 1,
            FeeRegime::Hot => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FeeRegime::Calm => "calm",
            FeeRegime::Elevated => "elevated",
            FeeRegime::Hot => "hot",
        }
    }
}

// ============================================================================
// Config tables
// ============================================================================

/// Per-validator daily yield floors separating the regimes, in ETH.
///
/// Yields below `elevated_floor` are calm, `[elevated_floor, hot_floor)` is
/// elevated, and `hot_floor` upward is hot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeThresholds {
    pub elevated_floor: f64,
    pub hot_floor: f64,
}

impl Default for RegimeThresholds {
    fn default() -> Self {
        Self {
            elevated_floor: 0.001,
            hot_floor: 0.003,
        }
    }
}

/// Mean-reversion behavior of one regime.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeDynamics {
    /// Long-run per-validator daily yield the regime reverts toward, in ETH.
    pub target: f64,
    /// Days for half of a deviation from `target` to decay.
    pub half_life_days: f64,
}

/// Outgoing daily transition distribution for one regime.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransitionRow {
    pub to_calm: f64,
    pub to_elevated: f64,
    pub to_hot: f64,
}

impl TransitionRow {
    pub fn sum(&self) -> f64 {
        self.to_calm + self.to_elevated + self.to_hot
    }

    fn as_array(&self) -> [f64; 3] {
        [self.to_calm, self.to_elevated, self.to_hot]
    }
}

/// Row-stochastic daily transition matrix, one row per from-regime.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransitionMatrix {
    pub calm: TransitionRow,
    pub elevated: TransitionRow,
    pub hot: TransitionRow,
}

impl TransitionMatrix {
    pub fn row(&self, regime: FeeRegime) -> TransitionRow {
        match regime {
            FeeRegime::Calm => self.calm,
            FeeRegime::Elevated => self.elevated,
            FeeRegime::Hot => self.hot,
        }
    }

    /// Dense form with rows in [`FeeRegime::ALL`] order.
    pub fn to_matrix(&self) -> Matrix3<f64> {
        Matrix3::new(
            self.calm.to_calm,
            self.calm.to_elevated,
            self.calm.to_hot,
            self.elevated.to_calm,
            self.elevated.to_elevated,
            self.elevated.to_hot,
            self.hot.to_calm,
            self.hot.to_elevated,
            self.hot.to_hot,
        )
    }
}

impl Default for TransitionMatrix {
    fn default() -> Self {
        Self {
            calm: TransitionRow {
                to_calm: 0.88,
                to_elevated: 0.10,
                to_hot: 0.02,
            },
            elevated: TransitionRow {
                to_calm: 0.30,
                to_elevated: 0.60,
                to_hot: 0.10,
            },
            hot: TransitionRow {
                to_calm: 0.25,
                to_elevated: 0.45,
                to_hot: 0.30,
            },
        }
    }
}

/// Mean-reversion table, one entry per regime.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DynamicsTable {
    pub calm: RegimeDynamics,
    pub elevated: RegimeDynamics,
    pub hot: RegimeDynamics,
}

impl DynamicsTable {
    pub fn for_regime(&self, regime: FeeRegime) -> RegimeDynamics {
        match regime {
            FeeRegime::Calm => self.calm,
            FeeRegime::Elevated => self.elevated,
            FeeRegime::Hot => self.hot,
        }
    }
}

impl Default for DynamicsTable {
    fn default() -> Self {
        Self {
            calm: RegimeDynamics {
                target: 0.0006,
                half_life_days: 12.0,
            },
            elevated: RegimeDynamics {
                target: 0.0018,
                half_life_days: 8.0,
            },
            hot: RegimeDynamics {
                target: 0.004,
                half_life_days: 4.0,
            },
        }
    }
}

/// Complete regime parameterization: thresholds, transitions and reversion
/// targets. Defaults are calibrated so calm annualizes to well under 1% of
/// execution APR and hot to several percent.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RegimeConfig {
    #[serde(default)]
    pub thresholds: RegimeThresholds,
    #[serde(default)]
    pub transitions: TransitionMatrix,
    #[serde(default)]
    pub dynamics: DynamicsTable,
}

impl RegimeConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading regime config from {}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .with_context(|| format!("parsing regime config from {}", path.display()))?;
        Ok(config)
    }

    /// Load from the path in `STAKECAST_REGIME_CONFIG`, falling back to the
    /// built-in defaults when the variable is unset or the file is bad.
    pub fn from_env() -> Self {
        if let Ok(path) = std::env::var("STAKECAST_REGIME_CONFIG") {
            match Self::load(Path::new(&path)) {
                Ok(config) => {
                    tracing::info!(path = %path, "loaded regime config");
                    return config;
                }
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "failed to load regime config, using defaults");
                }
            }
        }
        Self::default()
    }

    /// Write as TOML.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let raw = toml::to_string_pretty(self).context("serializing regime config")?;
        std::fs::write(path, raw)
            .with_context(|| format!("writing regime config to {}", path.display()))?;
        Ok(())
    }

    /// Checks thresholds are ordered, rows are stochastic and dynamics are
    /// usable. Run once before handing the config to an engine.
    pub fn validate(&self) -> Result<(), ForecastError> {
        let t = &self.thresholds;
        if !t.elevated_floor.is_finite() || !t.hot_floor.is_finite() || t.elevated_floor <= 0.0 {
            return Err(ForecastError::InvalidConfig(
                "thresholds must be finite and positive".into(),
            ));
        }
        if t.hot_floor <= t.elevated_floor {
            return Err(ForecastError::InvalidConfig(format!(
                "hot_floor {} must exceed elevated_floor {}",
                t.hot_floor, t.elevated_floor
            )));
        }

        for regime in FeeRegime::ALL {
            let row = self.transitions.row(regime);
            for p in row.as_array() {
                if !(0.0..=1.0).contains(&p) {
                    return Err(ForecastError::InvalidConfig(format!(
                        "{} row has probability {} outside [0, 1]",
                        regime.as_str(),
                        p
                    )));
                }
            }
            if (row.sum() - 1.0).abs() > ROW_SUM_TOLERANCE {
                return Err(ForecastError::InvalidConfig(format!(
                    "{} row sums to {}, expected 1",
                    regime.as_str(),
                    row.sum()
                )));
            }

            let dynamics = self.dynamics.for_regime(regime);
            if !dynamics.target.is_finite() || dynamics.target < 0.0 {
                return Err(ForecastError::InvalidConfig(format!(
                    "{} target must be finite and non-negative",
                    regime.as_str()
                )));
            }
            if !dynamics.half_life_days.is_finite() || dynamics.half_life_days <= 0.0 {
                return Err(ForecastError::InvalidConfig(format!(
                    "{} half life must be finite and positive",
                    regime.as_str()
                )));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Detection
// ============================================================================

/// Summary statistics over the trailing detection window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeWindowStats {
    /// Mean per-validator daily yield over the window, in ETH.
    pub mean_yield: f64,
    /// Sample std dev of the window yields.
    pub volatility: f64,
    /// Days actually present in the window.
    pub samples: usize,
}

/// Outcome of classifying the current execution-fee environment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeDetection {
    pub current_regime: FeeRegime,
    /// How firmly the window mean sits inside its tier, in `[0.3, 1.0]`.
    pub confidence: f64,
    /// Consecutive most-recent days classifying to `current_regime`.
    pub days_in_regime: u32,
    /// Outgoing transition distribution from `current_regime`.
    pub transition_probability: TransitionRow,
}

/// Classifies recent execution-fee history into a [`FeeRegime`].
#[derive(Debug, Clone)]
pub struct RegimeDetector {
    config: RegimeConfig,
}

impl RegimeDetector {
    pub fn new(config: RegimeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RegimeConfig {
        &self.config
    }

    /// Tier lookup for a single per-validator daily yield.
    pub fn classify(&self, yield_per_validator: f64) -> FeeRegime {
        let t = &self.config.thresholds;
        if yield_per_validator >= t.hot_floor {
            FeeRegime::Hot
        } else if yield_per_validator >= t.elevated_floor {
            FeeRegime::Elevated
        } else {
            FeeRegime::Calm
        }
    }

    /// Mean and spread of per-validator yields over the trailing window.
    ///
    /// Input may arrive in any order; the most recent
    /// [`REGIME_WINDOW_DAYS`] entries are used. With fewer than two samples
    /// the std dev is undefined, so volatility falls back to a fixed
    /// fraction of the mean.
    pub fn window_stats(
        &self,
        history: &[ExecutionDataPoint],
        active_validators: u64,
    ) -> RegimeWindowStats {
        let yields = self.window_yields(history, active_validators);
        if yields.is_empty() {
            return RegimeWindowStats {
                mean_yield: 0.0,
                volatility: 0.0,
                samples: 0,
            };
        }
        let mean = yields.iter().mean();
        let volatility = if yields.len() < 2 {
            mean * FALLBACK_VOL_FRACTION
        } else {
            yields.iter().std_dev()
        };
        RegimeWindowStats {
            mean_yield: mean,
            volatility,
            samples: yields.len(),
        }
    }

    /// Per-validator daily yield to seed projections from: the window mean,
    /// or the calm reversion target when no execution data exists.
    pub fn current_yield(&self, history: &[ExecutionDataPoint], active_validators: u64) -> f64 {
        let stats = self.window_stats(history, active_validators);
        if stats.samples == 0 {
            self.config.dynamics.calm.target
        } else {
            stats.mean_yield
        }
    }

    /// Full detection: regime, confidence, dwell count and transition row.
    ///
    /// Empty history reports calm at [`EMPTY_HISTORY_CONFIDENCE`] with a
    /// zero dwell count.
    pub fn detect(
        &self,
        history: &[ExecutionDataPoint],
        active_validators: u64,
    ) -> RegimeDetection {
        if history.is_empty() {
            return RegimeDetection {
                current_regime: FeeRegime::Calm,
                confidence: EMPTY_HISTORY_CONFIDENCE,
                days_in_regime: 0,
                transition_probability: self.config.transitions.row(FeeRegime::Calm),
            };
        }

        let stats = self.window_stats(history, active_validators);
        let current = self.classify(stats.mean_yield);
        let confidence = self.tier_confidence(current, stats.mean_yield);

        // Dwell count walks backward from the most recent day until the
        // daily classification first disagrees.
        let mut sorted: Vec<&ExecutionDataPoint> = history.iter().collect();
        sorted.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        let mut days_in_regime = 0u32;
        for point in &sorted {
            if self.classify(per_validator_yield(point, active_validators)) == current {
                days_in_regime += 1;
            } else {
                break;
            }
        }

        tracing::debug!(
            regime = current.as_str(),
            confidence,
            days_in_regime,
            mean_yield = stats.mean_yield,
            samples = stats.samples,
            "fee regime detected"
        );

        RegimeDetection {
            current_regime: current,
            confidence,
            days_in_regime,
            transition_probability: self.config.transitions.row(current),
        }
    }

    fn window_yields(&self, history: &[ExecutionDataPoint], active_validators: u64) -> Vec<f64> {
        let mut sorted: Vec<&ExecutionDataPoint> = history.iter().collect();
        sorted.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        sorted
            .iter()
            .take(REGIME_WINDOW_DAYS)
            .map(|p| per_validator_yield(p, active_validators))
            .collect()
    }

    /// Distance-based confidence in `[MIN_CONFIDENCE, 1]`: how far the
    /// window mean sits from the tier boundaries, relative to tier size.
    fn tier_confidence(&self, regime: FeeRegime, mean_yield: f64) -> f64 {
        let t = &self.config.thresholds;
        let raw = match regime {
            FeeRegime::Calm => (t.elevated_floor - mean_yield) / t.elevated_floor,
            FeeRegime::Hot => (mean_yield - t.hot_floor) / t.hot_floor,
            FeeRegime::Elevated => {
                let midpoint = (t.elevated_floor + t.hot_floor) / 2.0;
                let half_width = (t.hot_floor - t.elevated_floor) / 2.0;
                1.0 - (mean_yield - midpoint).abs() / half_width
            }
        };
        raw.clamp(MIN_CONFIDENCE, 1.0)
    }
}

/// Combined priority-fee and MEV income per validator for one day, in ETH.
/// A zero validator count reads as zero yield rather than dividing by it.
pub fn per_validator_yield(point: &ExecutionDataPoint, active_validators: u64) -> f64 {
    if active_validators == 0 {
        return 0.0;
    }
    (point.priority_fee_amount + point.mev_amount) / active_validators as f64
}
