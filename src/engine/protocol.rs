//! Protocol reward and queue mechanics.
//!
//! Closed-form consensus-layer formulas over a single stake value. Everything
//! here is a pure function of its arguments and the fixed constants below:
//! no state, no I/O, and bit-reproducible output for identical input. The
//! reward math mirrors the consensus `get_base_reward` semantics, including
//! the floor integer square root over Gwei-denominated balances.

use serde::{Deserialize, Serialize};

/// Gwei per ETH (minor-unit precision used by the reward formulas).
pub const GWEI_PER_ETH: f64 = 1_000_000_000.0;

/// Fixed per-validator stake size in ETH (the reward-calculation basis).
pub const MAX_EFFECTIVE_BALANCE: f64 = 32.0;

/// Consensus base-reward scale factor.
pub const BASE_REWARD_FACTOR: u64 = 64;

/// Reward components credited per epoch.
pub const BASE_REWARDS_PER_EPOCH: u64 = 4;

/// Divisor turning the active validator count into per-epoch churn.
pub const CHURN_LIMIT_QUOTIENT: u64 = 65_536;

/// Minimum validators that may enter or exit per epoch.
pub const MIN_PER_EPOCH_CHURN_LIMIT: u64 = 4;

/// Seconds per epoch (32 slots of 12 seconds).
pub const SECONDS_PER_EPOCH: u64 = 384;

/// Slots per epoch.
pub const SLOTS_PER_EPOCH: u64 = 32;

/// Epochs per day.
pub const EPOCHS_PER_DAY: f64 = 225.0;

/// Epochs per calendar year at 225 epochs per day.
pub const EPOCHS_PER_YEAR: f64 = 82_180.0;

/// Circulating ETH supply assumed by the stake-ratio math.
pub const TOTAL_ETH_SUPPLY: f64 = 120_000_000.0;

/// Floor integer square root.
///
/// Newton iteration seeded from `n / 2 + 1` so no intermediate sum can
/// overflow `u64`. Matches the consensus-layer `integer_squareroot` result
/// for every input.
pub fn integer_sqrt(n: u64) -> u64 {
    if n < 2 {
        return n;
    }
    let mut x = n;
    let mut y = n / 2 + 1;
    while y < x {
        x = y;
        y = (x + n / x) / 2;
    }
    x
}

/// Per-component base reward for one validator, in ETH per epoch.
///
/// `effective_balance * BASE_REWARD_FACTOR / isqrt(total) /
/// BASE_REWARDS_PER_EPOCH`, computed in Gwei and converted back. A validator
/// performing all duties collects `BASE_REWARDS_PER_EPOCH` of these each
/// epoch. Non-positive totals yield zero.
pub fn base_reward_per_epoch(effective_balance_eth: f64, total_effective_balance_eth: f64) -> f64 {
    if total_effective_balance_eth <= 0.0 {
        return 0.0;
    }
    let balance_gwei = effective_balance_eth * GWEI_PER_ETH;
    let total_gwei = (total_effective_balance_eth * GWEI_PER_ETH) as u64;
    let sqrt_total = integer_sqrt(total_gwei);
    if sqrt_total == 0 {
        return 0.0;
    }
    balance_gwei * BASE_REWARD_FACTOR as f64
        / sqrt_total as f64
        / BASE_REWARDS_PER_EPOCH as f64
        / GWEI_PER_ETH
}

/// Theoretical APR (percent) for a perfectly attesting validator when
/// `total_staked` ETH is active.
///
/// Annualizes the full per-epoch base reward of a 32 ETH validator. Because
/// the base reward scales with `1 / sqrt(total)`, this is strictly
/// decreasing in `total_staked`. Non-positive input yields zero.
pub fn theoretical_apr(total_staked: f64) -> f64 {
    if total_staked <= 0.0 {
        return 0.0;
    }
    let per_epoch = base_reward_per_epoch(MAX_EFFECTIVE_BALANCE, total_staked)
        * BASE_REWARDS_PER_EPOCH as f64;
    per_epoch * EPOCHS_PER_YEAR / MAX_EFFECTIVE_BALANCE * 100.0
}

/// Assumptions feeding [`realistic_apr`].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RealisticAprParams {
    /// Fraction of duties actually performed network-wide.
    pub participation: f64,
    /// Fraction of proposers running relay-boosted block building.
    pub boost_adoption: f64,
    /// Average ETH collected per proposed block.
    pub avg_reward_per_block: f64,
}

impl Default for RealisticAprParams {
    fn default() -> Self {
        Self {
            participation: 0.995,
            boost_adoption: 0.90,
            avg_reward_per_block: 0.05,
        }
    }
}

/// Participation-scaled APR plus the expected block-proposal income.
///
/// The proposal term spreads one year of blocks across the validator set:
/// each validator proposes `blocks_per_year / validator_count` blocks, each
/// worth `avg_reward_per_block` at the given boost-adoption rate. With no
/// validators the term is dropped.
pub fn realistic_apr(total_staked: f64, params: RealisticAprParams) -> f64 {
    let base = theoretical_apr(total_staked) * params.participation;
    let validators = (total_staked / MAX_EFFECTIVE_BALANCE).floor();
    if validators < 1.0 {
        return base;
    }
    let blocks_per_year = EPOCHS_PER_YEAR * SLOTS_PER_EPOCH as f64;
    let proposals_per_validator = blocks_per_year / validators;
    let annual_proposal_eth =
        proposals_per_validator * params.avg_reward_per_block * params.boost_adoption;
    base + annual_proposal_eth / MAX_EFFECTIVE_BALANCE * 100.0
}

/// Validators permitted to enter or exit per epoch.
pub fn churn_limit(active_validators: u64) -> u64 {
    (active_validators / CHURN_LIMIT_QUOTIENT).max(MIN_PER_EPOCH_CHURN_LIMIT)
}

/// Epochs a fresh deposit waits behind `queue_length` earlier entries.
pub fn activation_wait_epochs(queue_length: u64, active_validators: u64) -> u64 {
    queue_wait_epochs(queue_length, active_validators)
}

/// Epochs a withdrawal request waits behind `queue_length` earlier exits.
pub fn exit_wait_epochs(queue_length: u64, active_validators: u64) -> u64 {
    queue_wait_epochs(queue_length, active_validators)
}

fn queue_wait_epochs(queue_length: u64, active_validators: u64) -> u64 {
    queue_length.div_ceil(churn_limit(active_validators))
}

/// Days equivalent of an epoch count.
pub fn epochs_to_days(epochs: u64) -> f64 {
    epochs as f64 * SECONDS_PER_EPOCH as f64 / 86_400.0
}

/// Share of the circulating supply staked, in percent.
pub fn stake_ratio(total_staked: f64) -> f64 {
    total_staked / TOTAL_ETH_SUPPLY * 100.0
}

/// Total stake at which [`theoretical_apr`] equals `target_apr`.
///
/// From `apr = BASE_REWARD_FACTOR * EPOCHS_PER_YEAR * 100 / sqrt(S_gwei)`
/// it follows that `S_gwei = (BASE_REWARD_FACTOR * EPOCHS_PER_YEAR * 100 /
/// apr)^2`. Non-positive targets return the full-supply sentinel: no finite
/// stake level can push the APR that low.
pub fn equilibrium_stake_for_apr(target_apr: f64) -> f64 {
    if target_apr <= 0.0 {
        return TOTAL_ETH_SUPPLY;
    }
    let sqrt_gwei = BASE_REWARD_FACTOR as f64 * EPOCHS_PER_YEAR * 100.0 / target_apr;
    sqrt_gwei * sqrt_gwei / GWEI_PER_ETH
}
