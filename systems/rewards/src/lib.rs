#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure reward scaling for completed challenges.
//!
//! Every function here is a deterministic function of its inputs. Outputs
//! never decrease as the player level or the difficulty tier rises, provided
//! the tier tables in [`RewardTuning`] are non-decreasing. Reward multipliers
//! from modifiers and completion bonuses compose multiplicatively.

use gauntlet_core::{
    Adjustments, ChallengeDefinition, CompletionBonuses, CompletionFlags, CompletionOutcome,
    ConfigurationError, Difficulty, Rarity, RewardCurve, RewardPayout,
};
use serde::Deserialize;

const TIER_COUNT: usize = Difficulty::ALL.len();

/// Tier tables shared by every challenge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RewardTuning {
    /// Player levels required to gain one difficulty tier; zero disables level scaling.
    pub levels_per_tier: u32,
    /// Maximum number of tiers player level may add.
    pub max_level_tiers: u8,
    /// Experience percentage applied per difficulty tier.
    pub xp_percent: [u32; TIER_COUNT],
    /// Currency percentage applied per difficulty tier.
    pub currency_percent: [u32; TIER_COUNT],
    /// Extra guaranteed loot drops per difficulty tier.
    pub loot_bonus: [u32; TIER_COUNT],
    /// Natural rarity floor per difficulty tier.
    pub rarity_floor: [Rarity; TIER_COUNT],
}

impl Default for RewardTuning {
    fn default() -> Self {
        Self {
            levels_per_tier: 10,
            max_level_tiers: 2,
            xp_percent: [75, 100, 150, 200, 300],
            currency_percent: [80, 100, 140, 180, 250],
            loot_bonus: [0, 0, 1, 1, 2],
            rarity_floor: [
                Rarity::Common,
                Rarity::Common,
                Rarity::Uncommon,
                Rarity::Rare,
                Rarity::Epic,
            ],
        }
    }
}

impl RewardTuning {
    /// Reports whether every tier table is non-decreasing.
    #[must_use]
    pub fn is_monotonic(&self) -> bool {
        self.validate().is_ok()
    }

    /// Rejects tier tables that would let rewards shrink at higher tiers.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        fn ascending<T: Ord>(values: &[T]) -> bool {
            values.windows(2).all(|pair| pair[0] <= pair[1])
        }

        let tables = [
            ("xp_percent", ascending(&self.xp_percent)),
            ("currency_percent", ascending(&self.currency_percent)),
            ("loot_bonus", ascending(&self.loot_bonus)),
            ("rarity_floor", ascending(&self.rarity_floor)),
        ];
        match tables.into_iter().find(|(_, ordered)| !ordered) {
            Some((table, _)) => Err(ConfigurationError::NonMonotonicRewardTuning(table)),
            None => Ok(()),
        }
    }
}

/// Reward calculator bound to one challenge and its resolved modifiers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RewardScaling {
    tuning: RewardTuning,
    curve: RewardCurve,
    bonuses: CompletionBonuses,
    adjustments: Adjustments,
}

impl RewardScaling {
    /// Creates a calculator from explicit inputs.
    #[must_use]
    pub const fn new(
        tuning: RewardTuning,
        curve: RewardCurve,
        bonuses: CompletionBonuses,
        adjustments: Adjustments,
    ) -> Self {
        Self {
            tuning,
            curve,
            bonuses,
            adjustments,
        }
    }

    /// Creates a calculator for `challenge` under `adjustments`.
    #[must_use]
    pub fn for_challenge(
        tuning: RewardTuning,
        challenge: &ChallengeDefinition,
        adjustments: Adjustments,
    ) -> Self {
        Self::new(
            tuning,
            *challenge.rewards(),
            *challenge.completion(),
            adjustments,
        )
    }

    /// Maps player level onto a difficulty tier at or above `base`.
    #[must_use]
    pub fn scaled_difficulty(&self, base: Difficulty, player_level: u32) -> Difficulty {
        if self.tuning.levels_per_tier == 0 {
            return base;
        }
        let earned = player_level.saturating_sub(1) / self.tuning.levels_per_tier;
        let earned = u8::try_from(earned).unwrap_or(u8::MAX);
        base.raised_by(earned.min(self.tuning.max_level_tiers))
    }

    /// Level-scaled difficulty raised further by modifiers.
    #[must_use]
    pub fn effective_difficulty(&self, base: Difficulty, player_level: u32) -> Difficulty {
        self.scaled_difficulty(base, player_level)
            .raised_by(self.adjustments.difficulty_bonus_tiers)
    }

    /// Experience before modifiers and completion bonuses.
    #[must_use]
    pub fn scaled_xp(&self, player_level: u32, difficulty: Difficulty) -> u32 {
        let linear = u64::from(self.curve.base_xp)
            + u64::from(self.curve.xp_per_level) * u64::from(player_level);
        apply_percent(linear, self.tuning.xp_percent[tier_index(difficulty)])
    }

    /// Currency before modifiers.
    #[must_use]
    pub fn scaled_currency(&self, player_level: u32, difficulty: Difficulty) -> u32 {
        let linear = u64::from(self.curve.base_currency)
            + u64::from(self.curve.currency_per_level) * u64::from(player_level);
        apply_percent(linear, self.tuning.currency_percent[tier_index(difficulty)])
    }

    /// Experience after modifiers and earned completion bonuses.
    #[must_use]
    pub fn total_xp(
        &self,
        player_level: u32,
        difficulty: Difficulty,
        flags: CompletionFlags,
    ) -> u32 {
        let mut multiplier = f64::from(self.adjustments.xp_multiplier);
        if let (Some(bonus), true) = (self.bonuses.perfect_multiplier, flags.perfect) {
            multiplier *= f64::from(bonus);
        }
        if let (Some(bonus), true) = (self.bonuses.speed_multiplier, flags.speed) {
            multiplier *= f64::from(bonus);
        }
        if let (Some(bonus), true) = (self.bonuses.first_clear_multiplier, flags.first_clear) {
            multiplier *= f64::from(bonus);
        }
        scale(self.scaled_xp(player_level, difficulty), multiplier)
    }

    /// Currency after the currency modifier. Completion bonuses do not apply.
    #[must_use]
    pub fn total_currency(&self, player_level: u32, difficulty: Difficulty) -> u32 {
        scale(
            self.scaled_currency(player_level, difficulty),
            f64::from(self.adjustments.currency_multiplier),
        )
    }

    /// Higher of the guaranteed rarity and the tier's natural floor.
    #[must_use]
    pub fn total_loot_rarity(&self, difficulty: Difficulty) -> Rarity {
        self.tuning.rarity_floor[tier_index(difficulty)].max(self.adjustments.rarity_floor)
    }

    /// Guaranteed number of loot drops.
    #[must_use]
    pub fn total_loot_count(&self, difficulty: Difficulty) -> u32 {
        self.curve
            .base_loot_count
            .saturating_add(self.tuning.loot_bonus[tier_index(difficulty)])
    }

    /// Guaranteed drops plus the expected value of bonus drop chances.
    ///
    /// Intended for previews; the actual bonus roll belongs to the loot table.
    #[must_use]
    pub fn expected_loot_count(&self, difficulty: Difficulty) -> f32 {
        self.total_loot_count(difficulty) as f32 + self.adjustments.bonus_loot_chance
    }

    /// Derives the completion flags earned by `outcome`.
    #[must_use]
    pub fn completion_flags(&self, outcome: &CompletionOutcome) -> CompletionFlags {
        let reference = self.adjustments.time_limit_secs.or(self.bonuses.par_secs);
        let speed = match (outcome.elapsed_secs, reference) {
            (Some(elapsed), Some(reference)) => {
                speed_bonus_earned(elapsed, reference, self.bonuses.speed_threshold)
            }
            _ => false,
        };
        CompletionFlags {
            perfect: outcome.perfect,
            speed,
            first_clear: outcome.first_clear,
        }
    }

    /// Full payout for a completion at `base` difficulty.
    #[must_use]
    pub fn payout(&self, base: Difficulty, outcome: &CompletionOutcome) -> RewardPayout {
        let level = outcome.player_level;
        let difficulty = self.effective_difficulty(base, level);
        let flags = self.completion_flags(outcome);
        RewardPayout {
            difficulty,
            xp: self.total_xp(level, difficulty, flags),
            currency: self.total_currency(level, difficulty),
            rarity: self.total_loot_rarity(difficulty),
            loot_count: self.total_loot_count(difficulty),
            expected_loot: self.expected_loot_count(difficulty),
        }
    }
}

/// Reports whether `elapsed` beats `threshold` of the `reference` duration.
#[must_use]
pub fn speed_bonus_earned(elapsed: f32, reference: f32, threshold: f32) -> bool {
    if !elapsed.is_finite() || !reference.is_finite() || elapsed < 0.0 || reference <= 0.0 {
        return false;
    }
    elapsed <= reference * threshold
}

fn tier_index(difficulty: Difficulty) -> usize {
    usize::from(difficulty.tier()).min(TIER_COUNT - 1)
}

fn apply_percent(value: u64, percent: u32) -> u32 {
    let scaled = value.saturating_mul(u64::from(percent)) / 100;
    u32::try_from(scaled).unwrap_or(u32::MAX)
}

fn scale(value: u32, multiplier: f64) -> u32 {
    let scaled = (f64::from(value) * multiplier.max(0.0)).floor();
    if scaled >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        scaled as u32
    }
}
