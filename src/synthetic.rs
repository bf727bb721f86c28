//! Synthetic history generation.
//!
//! Stand-in data source for demos and tests when no recorded history is
//! available. Produces a gently growing stake series plus an execution-fee
//! series with one hot burst two-thirds of the way through, so regime
//! detection has something to find.
//!
//! RNG: seeded ChaCha8 only. A given seed always reproduces the same
//! series, byte for byte.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::engine::execution::annualize_daily_yield;
use crate::engine::protocol::{self, MAX_EFFECTIVE_BALANCE};
use crate::engine::types::{ExecutionDataPoint, HistoricalDataPoint};

/// Extra per-validator yield injected on burst days, in ETH.
const BURST_YIELD_BONUS: f64 = 0.0035;

/// Shape of a synthetic history.
#[derive(Debug, Clone)]
pub struct SyntheticHistoryParams {
    /// Days of history to produce.
    pub days: u32,
    /// Timestamp of the final (most recent) day.
    pub end: DateTime<Utc>,
    /// Stake on the first day, in ETH.
    pub initial_stake: f64,
    /// Mean stake growth in ETH per day.
    pub daily_growth: f64,
    /// Uniform jitter around `daily_growth`, in ETH.
    pub growth_jitter: f64,
    /// Baseline entry-queue depth, in validators.
    pub entry_queue: u64,
    /// Baseline exit-queue depth, in validators.
    pub exit_queue: u64,
    /// Mean per-validator daily fee income, in ETH.
    pub base_yield: f64,
    /// Uniform jitter around `base_yield`, in ETH.
    pub yield_jitter: f64,
    /// Length of the hot-fee burst, in days. Zero disables it.
    pub hot_burst_days: u32,
    pub seed: u64,
}

impl Default for SyntheticHistoryParams {
    fn default() -> Self {
        Self {
            days: 90,
            end: Utc
                .with_ymd_and_hms(2025, 6, 30, 0, 0, 0)
                .single()
                .unwrap_or(DateTime::UNIX_EPOCH),
            initial_stake: 33_800_000.0,
            daily_growth: 7_500.0,
            growth_jitter: 2_000.0,
            entry_queue: 2_500,
            exit_queue: 800,
            base_yield: 0.000_8,
            yield_jitter: 0.000_3,
            hot_burst_days: 5,
            seed: 42,
        }
    }
}

/// Generates paired stake and execution-fee histories.
///
/// Both series share timestamps, one point per day ending at `params.end`.
/// The fee burst starts two-thirds of the way through so the most recent
/// window stays representative of the base yield.
pub fn generate(
    params: &SyntheticHistoryParams,
) -> (Vec<HistoricalDataPoint>, Vec<ExecutionDataPoint>) {
    let mut rng = ChaCha8Rng::seed_from_u64(params.seed);
    let start = params.end - Duration::days(params.days as i64 - 1);
    let burst_start = params.days * 2 / 3;

    let mut history = Vec::with_capacity(params.days as usize);
    let mut execution = Vec::with_capacity(params.days as usize);
    let mut stake = params.initial_stake;

    for day in 0..params.days {
        let timestamp = start + Duration::days(day as i64);
        let validators = (stake / MAX_EFFECTIVE_BALANCE).floor() as u64;

        let in_burst = params.hot_burst_days > 0
            && day >= burst_start
            && day < burst_start + params.hot_burst_days;
        let jitter = rng.gen_range(-params.yield_jitter..=params.yield_jitter);
        let burst = if in_burst { BURST_YIELD_BONUS } else { 0.0 };
        let yield_per_validator = (params.base_yield + jitter + burst).max(0.0);
        let network_income = yield_per_validator * validators as f64;

        let avg_gas_price = if in_burst {
            rng.gen_range(40.0..=120.0)
        } else {
            rng.gen_range(8.0..=25.0)
        };

        execution.push(ExecutionDataPoint {
            timestamp,
            priority_fee_amount: network_income * 0.4,
            mev_amount: network_income * 0.6,
            avg_gas_price,
            block_count: (7_200 + rng.gen_range(-30i64..=30)) as u64,
        });

        history.push(HistoricalDataPoint {
            timestamp,
            total_staked: stake,
            active_validators: validators,
            entry_queue_length: jittered_queue(&mut rng, params.entry_queue),
            exit_queue_length: jittered_queue(&mut rng, params.exit_queue),
            observed_apr: Some(
                protocol::theoretical_apr(stake) + annualize_daily_yield(yield_per_validator),
            ),
        });

        stake += params.daily_growth
            + rng.gen_range(-params.growth_jitter..=params.growth_jitter);
    }

    (history, execution)
}

fn jittered_queue(rng: &mut ChaCha8Rng, baseline: u64) -> u64 {
    ((baseline as f64) * rng.gen_range(0.7..=1.3)) as u64
}
