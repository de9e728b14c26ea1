#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the gauntlet challenge engine.
//!
//! This crate defines the data model and message surface that connects the
//! zone lifecycle manager, the pure allocation/placement/reward systems and
//! the host engine. Schedulers submit [`Command`] values describing desired
//! zone transitions, the manager executes them through its `apply` entry
//! point and broadcasts [`Event`] values describing what happened. Agents are
//! created and destroyed exclusively through the [`AgentFactory`] seam, and
//! walkable-surface queries go through [`WalkableSurface`].

use std::fmt;

pub use glam::Vec3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Unique identifier assigned to a mission zone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ZoneId(u32);

impl ZoneId {
    /// Creates a new zone identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "zone#{}", self.0)
    }
}

/// Unique identifier assigned to a challenge definition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChallengeId(u32);

impl ChallengeId {
    /// Creates a new challenge identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ChallengeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "challenge#{}", self.0)
    }
}

/// Identifier of a single zone activation, unique for the lifetime of a manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActivationId(u64);

impl ActivationId {
    /// Creates a new activation identifier.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// Opaque handle returned by the agent factory for a spawned character.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AgentHandle(u64);

impl AgentHandle {
    /// Wraps the factory-provided numeric handle.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the handle.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// Reference to the character template the agent factory should instantiate.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentTemplate(String);

impl AgentTemplate {
    /// Creates a template reference from its authored name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Authored name of the template.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0
    }
}

/// Immutable world transform usable as a spawn point.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpawnAnchor {
    position: Vec3,
    #[serde(default = "default_forward")]
    forward: Vec3,
    #[serde(default)]
    group: Option<String>,
}

fn default_forward() -> Vec3 {
    Vec3::Z
}

impl SpawnAnchor {
    /// Creates an ungrouped anchor at `position` facing `forward`.
    #[must_use]
    pub fn new(position: Vec3, forward: Vec3) -> Self {
        Self {
            position,
            forward,
            group: None,
        }
    }

    /// Tags the anchor with the name of the spawn group that contains it.
    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// World-space position of the anchor.
    #[must_use]
    pub const fn position(&self) -> Vec3 {
        self.position
    }

    /// Facing direction agents spawned at the anchor should adopt.
    #[must_use]
    pub const fn forward(&self) -> Vec3 {
        self.forward
    }

    /// Name of the spawn group the anchor belongs to, if any.
    #[must_use]
    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }
}

/// Broad classification of what a spawn item produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpawnCategory {
    /// Regular hostile combatants.
    Enemy,
    /// Unique hostile combatant anchoring the encounter.
    Boss,
    /// Non-combatants that must be protected or rescued.
    Civilian,
    /// Lootable containers.
    LootBox,
    /// Interactive mission objectives.
    Objective,
    /// Destructible or static cover pieces.
    Cover,
}

/// Largest number of agents a single spawn item may request.
pub const MAX_SPAWN_COUNT: u32 = 1024;

/// Request for a number of agents of one kind, resolved against anchors.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpawnItem {
    name: String,
    category: SpawnCategory,
    template: AgentTemplate,
    min_count: u32,
    max_count: u32,
    #[serde(default)]
    anchors: Vec<SpawnAnchor>,
    #[serde(default)]
    spawn_radius: Option<f32>,
}

impl SpawnItem {
    /// Creates a spawn item requesting between `min_count` and `max_count` agents.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        category: SpawnCategory,
        template: AgentTemplate,
        min_count: u32,
        max_count: u32,
    ) -> Self {
        Self {
            name: name.into(),
            category,
            template,
            min_count,
            max_count,
            anchors: Vec::new(),
            spawn_radius: None,
        }
    }

    /// Pins the item to an explicit list of anchors.
    #[must_use]
    pub fn with_anchors(mut self, anchors: Vec<SpawnAnchor>) -> Self {
        self.anchors = anchors;
        self
    }

    /// Scatters the item within `radius` of the zone centre.
    ///
    /// Ignored whenever explicit anchors are present.
    #[must_use]
    pub fn with_spawn_radius(mut self, radius: f32) -> Self {
        self.spawn_radius = Some(radius);
        self
    }

    /// Authored name of the item.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Category of agents produced by the item.
    #[must_use]
    pub const fn category(&self) -> SpawnCategory {
        self.category
    }

    /// Template handed to the agent factory.
    #[must_use]
    pub const fn template(&self) -> &AgentTemplate {
        &self.template
    }

    /// Minimum number of agents requested.
    #[must_use]
    pub const fn min_count(&self) -> u32 {
        self.min_count
    }

    /// Maximum number of agents requested.
    #[must_use]
    pub const fn max_count(&self) -> u32 {
        self.max_count
    }

    /// Explicit anchors authored for the item.
    #[must_use]
    pub fn anchors(&self) -> &[SpawnAnchor] {
        &self.anchors
    }

    /// Scatter radius used when no explicit anchors exist.
    #[must_use]
    pub const fn spawn_radius(&self) -> Option<f32> {
        self.spawn_radius
    }
}

/// Where the anchors of a [`SpawnAllocation`] came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AllocationSource {
    /// Anchors authored directly on the spawn item.
    Explicit,
    /// Anchors synthesised within the item's spawn radius.
    Radius,
    /// Anchors taken from the zone group matching the item name.
    NamedGroup,
    /// Anchors drawn at random from the zone's unclaimed anchors.
    SharedPool,
}

/// Concrete anchors granted to one spawn item for a single activation.
#[derive(Clone, Debug, PartialEq)]
pub struct SpawnAllocation {
    /// Position of the item within the challenge's authoring order.
    pub item_index: usize,
    /// Name of the spawn item.
    pub item_name: String,
    /// Number of agents the item asked for after sampling its count range.
    pub requested: u32,
    /// Anchors granted in placement order.
    pub anchors: Vec<SpawnAnchor>,
    /// Source that supplied the anchors.
    pub source: AllocationSource,
}

impl SpawnAllocation {
    /// Number of anchors granted to the item.
    #[must_use]
    pub fn granted(&self) -> u32 {
        u32::try_from(self.anchors.len()).unwrap_or(u32::MAX)
    }

    /// Reports whether the pool ran dry before the request was satisfied.
    #[must_use]
    pub fn is_under_allocated(&self) -> bool {
        self.granted() < self.requested
    }
}

/// Aggregated counts describing how one activation spawned.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SpawnSummary {
    /// Number of spawn items processed.
    pub items: u32,
    /// Agents requested across all items.
    pub requested: u32,
    /// Anchors granted across all items.
    pub allocated: u32,
    /// Agents that were placed and spawned.
    pub placed: u32,
    /// Agents dropped because placement exhausted its attempts.
    pub dropped: u32,
    /// Items that received fewer anchors than requested.
    pub under_allocated_items: u32,
}

/// Attributes handed to the agent factory alongside the template.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpawnProfile {
    /// Category of the spawn item that produced the agent.
    pub category: SpawnCategory,
    /// Whether the agent should use its elite variant.
    pub elite: bool,
    /// Multiplier applied to the agent's maximum health.
    pub health_multiplier: f32,
    /// Multiplier applied to the damage the agent deals.
    pub damage_multiplier: f32,
}

/// Ordered difficulty tiers.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    /// Entry tier.
    Easy,
    /// Baseline tier.
    Normal,
    /// First demanding tier.
    Hard,
    /// Tier reserved for elite content.
    Elite,
    /// Highest tier.
    Nightmare,
}

impl Difficulty {
    /// Every tier in ascending order.
    pub const ALL: [Difficulty; 5] = [
        Self::Easy,
        Self::Normal,
        Self::Hard,
        Self::Elite,
        Self::Nightmare,
    ];

    /// Zero-based index of the tier.
    #[must_use]
    pub const fn tier(self) -> u8 {
        match self {
            Self::Easy => 0,
            Self::Normal => 1,
            Self::Hard => 2,
            Self::Elite => 3,
            Self::Nightmare => 4,
        }
    }

    /// Tier at `index`, saturating at the highest tier.
    #[must_use]
    pub const fn from_tier(index: u8) -> Self {
        match index {
            0 => Self::Easy,
            1 => Self::Normal,
            2 => Self::Hard,
            3 => Self::Elite,
            _ => Self::Nightmare,
        }
    }

    /// Tier `steps` above this one, saturating at the highest tier.
    #[must_use]
    pub const fn raised_by(self, steps: u8) -> Self {
        Self::from_tier(self.tier().saturating_add(steps))
    }
}

/// Ordered loot rarity tiers.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Rarity {
    /// Baseline rarity.
    #[default]
    Common,
    /// Slightly improved rarity.
    Uncommon,
    /// Rarity guaranteed by the rare-loot modifier.
    Rare,
    /// High rarity.
    Epic,
    /// Highest rarity.
    Legendary,
}

/// Kind of objective a challenge asks the player to fulfil.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeKind {
    /// Defeat every hostile agent.
    Elimination,
    /// Defeat a boss.
    BossFight,
    /// Stay alive until the timer expires.
    Survival,
    /// Protect an objective from waves of enemies.
    Defense,
    /// Accompany civilians to safety.
    Escort,
    /// Free captured civilians.
    Rescue,
    /// Capture and hold a control point.
    ControlPoint,
}

/// Optional rule adjusting difficulty, spawn composition or rewards.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChallengeModifier {
    /// The challenge must be completed within `seconds`.
    TimeTrial {
        /// Time limit in seconds.
        seconds: f32,
    },
    /// Doubles experience rewards.
    DoubleXp,
    /// Doubles currency rewards.
    DoubleCurrency,
    /// The player has a single life.
    IronMan,
    /// Disables health regeneration.
    NoHealthRegen,
    /// Scales the damage enemies deal.
    IncreasedEnemyDamage {
        /// Damage multiplier applied to enemies.
        multiplier: f32,
    },
    /// Scales enemy health.
    IncreasedEnemyHealth {
        /// Health multiplier applied to enemies.
        multiplier: f32,
    },
    /// Every enemy spawns as its elite variant.
    EliteEnemiesOnly,
    /// Loot is at least rare.
    GuaranteedRareLoot,
    /// Adds a chance of an extra loot drop.
    BonusLootDrop {
        /// Probability in `[0, 1]` of the extra drop.
        chance: f32,
    },
    /// Modifier kind unknown to this build; ignored when resolving stacks.
    #[serde(other)]
    Unrecognized,
}

/// Value-free discriminant of a [`ChallengeModifier`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ModifierKind {
    /// See [`ChallengeModifier::TimeTrial`].
    TimeTrial,
    /// See [`ChallengeModifier::DoubleXp`].
    DoubleXp,
    /// See [`ChallengeModifier::DoubleCurrency`].
    DoubleCurrency,
    /// See [`ChallengeModifier::IronMan`].
    IronMan,
    /// See [`ChallengeModifier::NoHealthRegen`].
    NoHealthRegen,
    /// See [`ChallengeModifier::IncreasedEnemyDamage`].
    IncreasedEnemyDamage,
    /// See [`ChallengeModifier::IncreasedEnemyHealth`].
    IncreasedEnemyHealth,
    /// See [`ChallengeModifier::EliteEnemiesOnly`].
    EliteEnemiesOnly,
    /// See [`ChallengeModifier::GuaranteedRareLoot`].
    GuaranteedRareLoot,
    /// See [`ChallengeModifier::BonusLootDrop`].
    BonusLootDrop,
}

impl ChallengeModifier {
    /// Discriminant of the modifier, or `None` when the kind is unrecognised.
    #[must_use]
    pub const fn kind(&self) -> Option<ModifierKind> {
        Some(match self {
            Self::TimeTrial { .. } => ModifierKind::TimeTrial,
            Self::DoubleXp => ModifierKind::DoubleXp,
            Self::DoubleCurrency => ModifierKind::DoubleCurrency,
            Self::IronMan => ModifierKind::IronMan,
            Self::NoHealthRegen => ModifierKind::NoHealthRegen,
            Self::IncreasedEnemyDamage { .. } => ModifierKind::IncreasedEnemyDamage,
            Self::IncreasedEnemyHealth { .. } => ModifierKind::IncreasedEnemyHealth,
            Self::EliteEnemiesOnly => ModifierKind::EliteEnemiesOnly,
            Self::GuaranteedRareLoot => ModifierKind::GuaranteedRareLoot,
            Self::BonusLootDrop { .. } => ModifierKind::BonusLootDrop,
            Self::Unrecognized => return None,
        })
    }

    /// Reports whether the modifier's scalar lies in its permitted range.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        match *self {
            Self::TimeTrial { seconds } => seconds.is_finite() && seconds > 0.0,
            Self::IncreasedEnemyDamage { multiplier }
            | Self::IncreasedEnemyHealth { multiplier } => {
                multiplier.is_finite() && multiplier > 0.0
            }
            Self::BonusLootDrop { chance } => (0.0..=1.0).contains(&chance),
            _ => true,
        }
    }

    /// Folds the modifier into the provided adjustments.
    #[must_use]
    pub fn apply(&self, adjustments: Adjustments) -> Adjustments {
        match *self {
            Self::TimeTrial { seconds } => Adjustments {
                time_limit_secs: Some(seconds),
                ..adjustments
            },
            Self::DoubleXp => Adjustments {
                xp_multiplier: adjustments.xp_multiplier * 2.0,
                ..adjustments
            },
            Self::DoubleCurrency => Adjustments {
                currency_multiplier: adjustments.currency_multiplier * 2.0,
                ..adjustments
            },
            Self::IronMan => Adjustments {
                life_limit: Some(1),
                ..adjustments
            },
            Self::NoHealthRegen => Adjustments {
                health_regen: false,
                ..adjustments
            },
            Self::IncreasedEnemyDamage { multiplier } => Adjustments {
                enemy_damage_multiplier: adjustments.enemy_damage_multiplier * multiplier,
                ..adjustments
            },
            Self::IncreasedEnemyHealth { multiplier } => Adjustments {
                enemy_health_multiplier: adjustments.enemy_health_multiplier * multiplier,
                ..adjustments
            },
            Self::EliteEnemiesOnly => Adjustments {
                elite_only: true,
                difficulty_bonus_tiers: adjustments.difficulty_bonus_tiers.saturating_add(1),
                ..adjustments
            },
            Self::GuaranteedRareLoot => Adjustments {
                rarity_floor: adjustments.rarity_floor.max(Rarity::Rare),
                ..adjustments
            },
            Self::BonusLootDrop { chance } => Adjustments {
                bonus_loot_chance: (adjustments.bonus_loot_chance + chance).min(1.0),
                ..adjustments
            },
            Self::Unrecognized => adjustments,
        }
    }
}

/// Modifier paired with its authored activation flag.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModifierEntry {
    /// Rule contributed by the entry.
    pub modifier: ChallengeModifier,
    /// Whether the rule currently participates in resolution.
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl ModifierEntry {
    /// Creates an active entry for `modifier`.
    #[must_use]
    pub const fn active(modifier: ChallengeModifier) -> Self {
        Self {
            modifier,
            active: true,
        }
    }

    /// Creates an inactive entry for `modifier`.
    #[must_use]
    pub const fn inactive(modifier: ChallengeModifier) -> Self {
        Self {
            modifier,
            active: false,
        }
    }
}

/// Combined effect of every active modifier on one challenge.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Adjustments {
    /// Multiplier applied to experience rewards.
    pub xp_multiplier: f32,
    /// Multiplier applied to currency rewards.
    pub currency_multiplier: f32,
    /// Multiplier applied to enemy health.
    pub enemy_health_multiplier: f32,
    /// Multiplier applied to enemy damage.
    pub enemy_damage_multiplier: f32,
    /// Whether enemies spawn as their elite variant.
    pub elite_only: bool,
    /// Tiers added to the scaled difficulty.
    pub difficulty_bonus_tiers: u8,
    /// Lowest loot rarity the challenge may award.
    pub rarity_floor: Rarity,
    /// Probability of an extra loot drop.
    pub bonus_loot_chance: f32,
    /// Time limit imposed on the challenge.
    pub time_limit_secs: Option<f32>,
    /// Number of lives the player is granted.
    pub life_limit: Option<u32>,
    /// Whether the player regenerates health.
    pub health_regen: bool,
}

impl Default for Adjustments {
    fn default() -> Self {
        Self {
            xp_multiplier: 1.0,
            currency_multiplier: 1.0,
            enemy_health_multiplier: 1.0,
            enemy_damage_multiplier: 1.0,
            elite_only: false,
            difficulty_bonus_tiers: 0,
            rarity_floor: Rarity::Common,
            bonus_loot_chance: 0.0,
            time_limit_secs: None,
            life_limit: None,
            health_regen: true,
        }
    }
}

impl Adjustments {
    /// Builds the profile handed to the agent factory for `category`.
    #[must_use]
    pub fn spawn_profile(&self, category: SpawnCategory) -> SpawnProfile {
        let hostile = matches!(category, SpawnCategory::Enemy | SpawnCategory::Boss);
        if !hostile {
            return SpawnProfile {
                category,
                elite: false,
                health_multiplier: 1.0,
                damage_multiplier: 1.0,
            };
        }

        SpawnProfile {
            category,
            elite: self.elite_only && category == SpawnCategory::Enemy,
            health_multiplier: self.enemy_health_multiplier,
            damage_multiplier: self.enemy_damage_multiplier,
        }
    }
}

/// Bonus multipliers granted for exceptional completions.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionBonuses {
    /// Multiplier for a run without taking damage or losing allies.
    pub perfect_multiplier: Option<f32>,
    /// Multiplier for finishing within `speed_threshold` of the reference time.
    pub speed_multiplier: Option<f32>,
    /// Fraction of the reference time a run must beat to earn the speed bonus.
    pub speed_threshold: f32,
    /// Reference duration used when no time trial is active.
    pub par_secs: Option<f32>,
    /// Multiplier for the first successful completion.
    pub first_clear_multiplier: Option<f32>,
}

impl Default for CompletionBonuses {
    fn default() -> Self {
        Self {
            perfect_multiplier: None,
            speed_multiplier: None,
            speed_threshold: 0.5,
            par_secs: None,
            first_clear_multiplier: None,
        }
    }
}

impl CompletionBonuses {
    fn is_well_formed(&self) -> bool {
        let multiplier_ok = |value: Option<f32>| value.map_or(true, |m| m.is_finite() && m >= 1.0);
        multiplier_ok(self.perfect_multiplier)
            && multiplier_ok(self.speed_multiplier)
            && multiplier_ok(self.first_clear_multiplier)
            && self.speed_threshold.is_finite()
            && self.speed_threshold > 0.0
            && self.speed_threshold <= 1.0
            && self.par_secs.map_or(true, |par| par.is_finite() && par > 0.0)
    }
}

/// Base reward curves of a challenge before difficulty and modifiers apply.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardCurve {
    /// Experience granted at level zero.
    pub base_xp: u32,
    /// Experience added per player level.
    pub xp_per_level: u32,
    /// Currency granted at level zero.
    pub base_currency: u32,
    /// Currency added per player level.
    pub currency_per_level: u32,
    /// Loot drops granted before difficulty bonuses.
    pub base_loot_count: u32,
}

impl Default for RewardCurve {
    fn default() -> Self {
        Self {
            base_xp: 100,
            xp_per_level: 25,
            base_currency: 50,
            currency_per_level: 10,
            base_loot_count: 1,
        }
    }
}

/// Authored description of a challenge that can be bound to a zone.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChallengeDefinition {
    id: ChallengeId,
    name: String,
    kind: ChallengeKind,
    base_difficulty: Difficulty,
    #[serde(default)]
    spawn_items: Vec<SpawnItem>,
    #[serde(default)]
    modifiers: Vec<ModifierEntry>,
    #[serde(default)]
    completion: CompletionBonuses,
    #[serde(default)]
    rewards: RewardCurve,
}

impl ChallengeDefinition {
    /// Creates a challenge without spawn items or modifiers.
    #[must_use]
    pub fn new(
        id: ChallengeId,
        name: impl Into<String>,
        kind: ChallengeKind,
        base_difficulty: Difficulty,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            base_difficulty,
            spawn_items: Vec::new(),
            modifiers: Vec::new(),
            completion: CompletionBonuses::default(),
            rewards: RewardCurve::default(),
        }
    }

    /// Appends a spawn item; authoring order is allocation priority.
    #[must_use]
    pub fn with_spawn_item(mut self, item: SpawnItem) -> Self {
        self.spawn_items.push(item);
        self
    }

    /// Appends a modifier entry.
    #[must_use]
    pub fn with_modifier(mut self, entry: ModifierEntry) -> Self {
        self.modifiers.push(entry);
        self
    }

    /// Replaces the completion bonuses.
    #[must_use]
    pub fn with_completion(mut self, completion: CompletionBonuses) -> Self {
        self.completion = completion;
        self
    }

    /// Replaces the reward curve.
    #[must_use]
    pub fn with_rewards(mut self, rewards: RewardCurve) -> Self {
        self.rewards = rewards;
        self
    }

    /// Identifier of the challenge.
    #[must_use]
    pub const fn id(&self) -> ChallengeId {
        self.id
    }

    /// Display name of the challenge.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Objective type of the challenge.
    #[must_use]
    pub const fn kind(&self) -> ChallengeKind {
        self.kind
    }

    /// Difficulty before player-level scaling.
    #[must_use]
    pub const fn base_difficulty(&self) -> Difficulty {
        self.base_difficulty
    }

    /// Spawn items in authoring order.
    #[must_use]
    pub fn spawn_items(&self) -> &[SpawnItem] {
        &self.spawn_items
    }

    /// Modifier entries in authoring order.
    #[must_use]
    pub fn modifiers(&self) -> &[ModifierEntry] {
        &self.modifiers
    }

    /// Completion bonus configuration.
    #[must_use]
    pub const fn completion(&self) -> &CompletionBonuses {
        &self.completion
    }

    /// Base reward curves.
    #[must_use]
    pub const fn rewards(&self) -> &RewardCurve {
        &self.rewards
    }

    /// Rejects malformed definitions before any allocation work begins.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.name.trim().is_empty() {
            return Err(ConfigurationError::EmptyChallengeName(self.id));
        }

        for item in &self.spawn_items {
            if item.name.trim().is_empty() {
                return Err(ConfigurationError::EmptyItemName(self.id));
            }
            if item.min_count > item.max_count {
                return Err(ConfigurationError::InvertedCount {
                    challenge: self.id,
                    item: item.name.clone(),
                    min: item.min_count,
                    max: item.max_count,
                });
            }
            if item.max_count > MAX_SPAWN_COUNT {
                return Err(ConfigurationError::ExcessiveCount {
                    challenge: self.id,
                    item: item.name.clone(),
                    max: item.max_count,
                });
            }
            if let Some(radius) = item.spawn_radius {
                if !radius.is_finite() || radius < 0.0 {
                    return Err(ConfigurationError::InvalidSpawnRadius {
                        challenge: self.id,
                        item: item.name.clone(),
                    });
                }
            }
        }

        for entry in &self.modifiers {
            if entry.modifier.is_well_formed() {
                continue;
            }
            if let Some(kind) = entry.modifier.kind() {
                return Err(ConfigurationError::InvalidModifier {
                    challenge: self.id,
                    kind,
                });
            }
        }

        if !self.completion.is_well_formed() {
            return Err(ConfigurationError::InvalidCompletionBonus(self.id));
        }

        Ok(())
    }
}

/// Capture metadata carried by control-point zones.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ControlPoint {
    /// Radius around the zone centre that counts as inside the point.
    pub capture_radius: f32,
    /// Seconds of uncontested presence required to capture the point.
    pub capture_secs: f32,
}

/// Activation state a zone was authored with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StartState {
    /// The zone waits for the scheduler.
    #[default]
    Inactive,
    /// Legacy always-on content; forced free at startup.
    Active,
    /// The zone activates `challenge` as soon as the manager starts.
    SelfStarting {
        /// Challenge bound at startup.
        challenge: ChallengeId,
    },
}

/// Authored description of a reusable mission zone.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ZoneDescriptor {
    id: ZoneId,
    name: String,
    #[serde(default)]
    center: Vec3,
    #[serde(default)]
    anchors: Vec<SpawnAnchor>,
    #[serde(default)]
    control_point: Option<ControlPoint>,
    #[serde(default)]
    start: StartState,
}

impl ZoneDescriptor {
    /// Creates an inactive zone centred on `center` without anchors.
    #[must_use]
    pub fn new(id: ZoneId, name: impl Into<String>, center: Vec3) -> Self {
        Self {
            id,
            name: name.into(),
            center,
            anchors: Vec::new(),
            control_point: None,
            start: StartState::Inactive,
        }
    }

    /// Replaces the anchors owned by the zone.
    #[must_use]
    pub fn with_anchors(mut self, anchors: Vec<SpawnAnchor>) -> Self {
        self.anchors = anchors;
        self
    }

    /// Marks the zone as a control point.
    #[must_use]
    pub fn with_control_point(mut self, control_point: ControlPoint) -> Self {
        self.control_point = Some(control_point);
        self
    }

    /// Sets the authored activation state.
    #[must_use]
    pub fn with_start(mut self, start: StartState) -> Self {
        self.start = start;
        self
    }

    /// Identifier of the zone.
    #[must_use]
    pub const fn id(&self) -> ZoneId {
        self.id
    }

    /// Display name of the zone.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Centre of the zone, used for radius scatter.
    #[must_use]
    pub const fn center(&self) -> Vec3 {
        self.center
    }

    /// Anchors owned by the zone.
    #[must_use]
    pub fn anchors(&self) -> &[SpawnAnchor] {
        &self.anchors
    }

    /// Control-point metadata, if the zone is a control point.
    #[must_use]
    pub const fn control_point(&self) -> Option<ControlPoint> {
        self.control_point
    }

    /// Authored activation state.
    #[must_use]
    pub const fn start(&self) -> StartState {
        self.start
    }

    /// Rejects malformed zone descriptors.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.name.trim().is_empty() {
            return Err(ConfigurationError::EmptyZoneName(self.id));
        }
        if let Some(point) = self.control_point {
            let valid = point.capture_radius.is_finite()
                && point.capture_radius > 0.0
                && point.capture_secs.is_finite()
                && point.capture_secs >= 0.0;
            if !valid {
                return Err(ConfigurationError::InvalidControlPoint(self.id));
            }
        }
        Ok(())
    }
}

/// Lifecycle state of a zone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ZoneState {
    /// No challenge is bound.
    Free,
    /// A challenge is bound and agents are being placed.
    Activating,
    /// Every agent has been processed and the challenge is running.
    Occupied,
    /// Agents are being despawned.
    Releasing,
}

impl fmt::Display for ZoneState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Free => "free",
            Self::Activating => "activating",
            Self::Occupied => "occupied",
            Self::Releasing => "releasing",
        };
        f.write_str(label)
    }
}

/// Why a zone left the occupied or activating state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReleaseReason {
    /// The player fulfilled the challenge.
    Completed,
    /// The player left or failed the challenge.
    Abandoned,
    /// The scheduler deactivated the zone.
    Deactivated,
    /// The activation was aborted before every agent was placed.
    Cancelled,
}

/// What the host reports when a challenge is completed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompletionOutcome {
    /// Level of the player receiving rewards.
    pub player_level: u32,
    /// Whether the run was flawless.
    pub perfect: bool,
    /// Whether this is the player's first clear of the challenge.
    pub first_clear: bool,
    /// Seconds the run took, used for the speed bonus.
    pub elapsed_secs: Option<f32>,
}

/// Completion bonuses earned by a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct CompletionFlags {
    /// Flawless run.
    pub perfect: bool,
    /// Run beat the speed threshold.
    pub speed: bool,
    /// First clear of the challenge.
    pub first_clear: bool,
}

/// Integer payout produced when a challenge completes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RewardPayout {
    /// Difficulty after level scaling and modifiers.
    pub difficulty: Difficulty,
    /// Experience granted.
    pub xp: u32,
    /// Currency granted.
    pub currency: u32,
    /// Minimum loot rarity.
    pub rarity: Rarity,
    /// Guaranteed loot drops.
    pub loot_count: u32,
    /// Expected loot drops including bonus chances, for previews.
    pub expected_loot: f32,
}

/// Reasons a single agent could not be placed.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq, Hash)]
pub enum PlacementFailure {
    /// No walkable point satisfying separation was found.
    #[error("no walkable surface found after {attempts} attempts")]
    NoWalkableSurface {
        /// Number of surface queries performed.
        attempts: u32,
    },
}

/// Malformed authored data, rejected before any allocation work.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    /// A challenge has a blank name.
    #[error("{0} has an empty name")]
    EmptyChallengeName(ChallengeId),
    /// A spawn item has a blank name.
    #[error("{0} contains a spawn item with an empty name")]
    EmptyItemName(ChallengeId),
    /// A spawn item's minimum exceeds its maximum.
    #[error("{challenge}: spawn item `{item}` requests min {min} > max {max}")]
    InvertedCount {
        /// Challenge containing the item.
        challenge: ChallengeId,
        /// Name of the item.
        item: String,
        /// Authored minimum.
        min: u32,
        /// Authored maximum.
        max: u32,
    },
    /// A spawn item requests more agents than any zone can host.
    #[error("{challenge}: spawn item `{item}` requests up to {max} agents")]
    ExcessiveCount {
        /// Challenge containing the item.
        challenge: ChallengeId,
        /// Name of the item.
        item: String,
        /// Authored maximum.
        max: u32,
    },
    /// A spawn radius is negative or not finite.
    #[error("{challenge}: spawn item `{item}` has an invalid spawn radius")]
    InvalidSpawnRadius {
        /// Challenge containing the item.
        challenge: ChallengeId,
        /// Name of the item.
        item: String,
    },
    /// A modifier value lies outside its permitted range.
    #[error("{challenge}: modifier {kind:?} has an out-of-range value")]
    InvalidModifier {
        /// Challenge containing the modifier.
        challenge: ChallengeId,
        /// Kind of the offending modifier.
        kind: ModifierKind,
    },
    /// Completion bonuses contain a multiplier below one or a bad threshold.
    #[error("{0} has malformed completion bonuses")]
    InvalidCompletionBonus(ChallengeId),
    /// A zone has a blank name.
    #[error("{0} has an empty name")]
    EmptyZoneName(ZoneId),
    /// Control-point metadata is not positive and finite.
    #[error("{0} has malformed control-point metadata")]
    InvalidControlPoint(ZoneId),
    /// A reward tier table decreases as difficulty rises.
    #[error("reward tuning table `{0}` decreases with difficulty")]
    NonMonotonicRewardTuning(&'static str),
    /// Placement tuning contains a negative or non-finite distance.
    #[error("placement tuning `{0}` must be finite and non-negative")]
    InvalidPlacementConfig(&'static str),
    /// Two challenges share an identifier.
    #[error("{0} is registered twice")]
    DuplicateChallenge(ChallengeId),
    /// Two zones share an identifier.
    #[error("{0} is registered twice")]
    DuplicateZone(ZoneId),
}

/// Rejected lifecycle requests. Callers must not retry these blindly.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    /// The zone is not registered with the manager.
    #[error("{0} is not registered")]
    UnknownZone(ZoneId),
    /// The challenge is not registered with the manager.
    #[error("{0} is not registered")]
    UnknownChallenge(ChallengeId),
    /// Activation requires a free zone.
    #[error("{zone} is {state} and cannot be activated")]
    ZoneNotFree {
        /// Zone targeted by the request.
        zone: ZoneId,
        /// State the zone was in.
        state: ZoneState,
    },
    /// Completion, abandonment and release require an occupied zone.
    #[error("{zone} is {state}, expected occupied")]
    ZoneNotOccupied {
        /// Zone targeted by the request.
        zone: ZoneId,
        /// State the zone was in.
        state: ZoneState,
    },
    /// Cancellation requires an activating zone.
    #[error("{zone} is {state}, expected activating")]
    ZoneNotActivating {
        /// Zone targeted by the request.
        zone: ZoneId,
        /// State the zone was in.
        state: ZoneState,
    },
    /// Authored data was rejected.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

/// Commands a scheduler may submit to the zone lifecycle manager.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    /// Binds `challenge` to the free `zone` and starts spawning.
    ActivateZone {
        /// Zone to activate.
        zone: ZoneId,
        /// Challenge to bind.
        challenge: ChallengeId,
    },
    /// Advances pending placements by one cooperative step.
    Step,
    /// Reports that the challenge bound to `zone` was completed.
    CompleteChallenge {
        /// Zone hosting the challenge.
        zone: ZoneId,
        /// How the run went.
        outcome: CompletionOutcome,
    },
    /// Reports that the player abandoned the challenge bound to `zone`.
    AbandonChallenge {
        /// Zone hosting the challenge.
        zone: ZoneId,
    },
    /// Deactivates the occupied `zone`.
    ReleaseZone {
        /// Zone to release.
        zone: ZoneId,
    },
    /// Aborts an activation that is still placing agents.
    CancelActivation {
        /// Zone to abort.
        zone: ZoneId,
    },
}

/// Events broadcast by the manager after processing requests.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// A zone authored as active was reset to free at startup.
    ZoneForcedFree {
        /// Zone that was reset.
        zone: ZoneId,
    },
    /// A challenge was bound to a zone.
    ZoneActivating {
        /// Zone being activated.
        zone: ZoneId,
        /// Challenge bound to the zone.
        challenge: ChallengeId,
        /// Identifier of this activation.
        activation: ActivationId,
    },
    /// Anchors were allocated to a spawn item.
    AnchorsAllocated {
        /// Zone owning the allocation.
        zone: ZoneId,
        /// Name of the spawn item.
        item: String,
        /// Agents requested by the item.
        requested: u32,
        /// Anchors granted to the item.
        granted: u32,
        /// Source that supplied the anchors.
        source: AllocationSource,
    },
    /// An agent was placed and spawned.
    AgentSpawned {
        /// Zone hosting the agent.
        zone: ZoneId,
        /// Name of the spawn item.
        item: String,
        /// Handle returned by the factory.
        agent: AgentHandle,
        /// Resolved position.
        position: Vec3,
    },
    /// An agent was dropped because placement failed.
    AgentDropped {
        /// Zone hosting the item.
        zone: ZoneId,
        /// Name of the spawn item.
        item: String,
        /// Anchor position that could not be resolved.
        anchor: Vec3,
        /// Reason the placement failed.
        failure: PlacementFailure,
    },
    /// Every agent of the activation has been processed.
    ZoneOccupied {
        /// Zone now occupied.
        zone: ZoneId,
        /// Spawn counts of the activation.
        summary: SpawnSummary,
    },
    /// The zone started releasing.
    ZoneReleasing {
        /// Zone being released.
        zone: ZoneId,
        /// Why the zone is being released.
        reason: ReleaseReason,
    },
    /// Rewards were computed for a completed challenge.
    RewardsGranted {
        /// Zone that hosted the challenge.
        zone: ZoneId,
        /// Challenge that was completed.
        challenge: ChallengeId,
        /// Computed payout.
        payout: RewardPayout,
    },
    /// The zone returned to the free state.
    ZoneReleased {
        /// Zone now free.
        zone: ZoneId,
        /// Agents despawned during release.
        despawned: u32,
    },
    /// A command was rejected.
    CommandRejected {
        /// Command that was rejected.
        command: Command,
        /// Reason for the rejection.
        reason: LifecycleError,
    },
}

/// Walkable-surface query capability provided by the host engine.
pub trait WalkableSurface {
    /// Returns the nearest walkable point within `max_distance` of `position`.
    fn sample_nearest(&self, position: Vec3, max_distance: f32) -> Option<Vec3>;
}

/// Character factory provided by the host engine.
pub trait AgentFactory {
    /// Instantiates `template` at `position` facing `forward`.
    fn spawn(
        &mut self,
        template: &AgentTemplate,
        position: Vec3,
        forward: Vec3,
        profile: &SpawnProfile,
    ) -> AgentHandle;

    /// Despawns a previously spawned agent or returns it to its pool.
    fn despawn(&mut self, agent: AgentHandle);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grunt(min: u32, max: u32) -> SpawnItem {
        SpawnItem::new(
            "Grunt",
            SpawnCategory::Enemy,
            AgentTemplate::new("grunt"),
            min,
            max,
        )
    }

    #[test]
    fn difficulty_tiers_saturate() {
        assert_eq!(Difficulty::Hard.raised_by(1), Difficulty::Elite);
        assert_eq!(Difficulty::Elite.raised_by(9), Difficulty::Nightmare);
        assert_eq!(Difficulty::from_tier(u8::MAX), Difficulty::Nightmare);
        for difficulty in Difficulty::ALL {
            assert_eq!(Difficulty::from_tier(difficulty.tier()), difficulty);
        }
    }

    #[test]
    fn validate_rejects_inverted_counts() {
        let challenge = ChallengeDefinition::new(
            ChallengeId::new(3),
            "Outpost",
            ChallengeKind::Elimination,
            Difficulty::Normal,
        )
        .with_spawn_item(grunt(4, 2));

        assert_eq!(
            challenge.validate(),
            Err(ConfigurationError::InvertedCount {
                challenge: ChallengeId::new(3),
                item: "Grunt".to_owned(),
                min: 4,
                max: 2,
            })
        );
    }

    #[test]
    fn validate_rejects_oversized_requests() {
        let challenge = ChallengeDefinition::new(
            ChallengeId::new(5),
            "Horde",
            ChallengeKind::Survival,
            Difficulty::Hard,
        )
        .with_spawn_item(grunt(1, u32::MAX - 1).with_spawn_radius(12.0));

        assert_eq!(
            challenge.validate(),
            Err(ConfigurationError::ExcessiveCount {
                challenge: ChallengeId::new(5),
                item: "Grunt".to_owned(),
                max: u32::MAX - 1,
            })
        );
        assert_eq!(
            ChallengeDefinition::new(
                ChallengeId::new(5),
                "Horde",
                ChallengeKind::Survival,
                Difficulty::Hard,
            )
            .with_spawn_item(grunt(MAX_SPAWN_COUNT, MAX_SPAWN_COUNT))
            .validate(),
            Ok(())
        );
    }

    #[test]
    fn validate_rejects_negative_radius_and_bad_modifiers() {
        let radius = ChallengeDefinition::new(
            ChallengeId::new(1),
            "Scatter",
            ChallengeKind::Survival,
            Difficulty::Easy,
        )
        .with_spawn_item(grunt(1, 2).with_spawn_radius(-4.0));
        assert!(matches!(
            radius.validate(),
            Err(ConfigurationError::InvalidSpawnRadius { .. })
        ));

        let modifier = ChallengeDefinition::new(
            ChallengeId::new(2),
            "Lucky",
            ChallengeKind::Survival,
            Difficulty::Easy,
        )
        .with_modifier(ModifierEntry::active(ChallengeModifier::BonusLootDrop {
            chance: 1.5,
        }));
        assert_eq!(
            modifier.validate(),
            Err(ConfigurationError::InvalidModifier {
                challenge: ChallengeId::new(2),
                kind: ModifierKind::BonusLootDrop,
            })
        );
    }

    #[test]
    fn unrecognized_modifiers_are_neutral() {
        let adjustments = ChallengeModifier::Unrecognized.apply(Adjustments::default());
        assert_eq!(adjustments, Adjustments::default());
        assert_eq!(ChallengeModifier::Unrecognized.kind(), None);
    }

    #[test]
    fn elite_profile_only_applies_to_regular_enemies() {
        let adjustments = ChallengeModifier::EliteEnemiesOnly.apply(Adjustments::default());
        assert!(adjustments.spawn_profile(SpawnCategory::Enemy).elite);
        assert!(!adjustments.spawn_profile(SpawnCategory::Boss).elite);
        assert!(!adjustments.spawn_profile(SpawnCategory::Civilian).elite);
        assert_eq!(adjustments.difficulty_bonus_tiers, 1);
    }

    #[test]
    fn allocation_reports_under_allocation() {
        let allocation = SpawnAllocation {
            item_index: 0,
            item_name: "Grunt".to_owned(),
            requested: 3,
            anchors: vec![SpawnAnchor::new(Vec3::ZERO, Vec3::Z)],
            source: AllocationSource::SharedPool,
        };
        assert_eq!(allocation.granted(), 1);
        assert!(allocation.is_under_allocated());
    }
}
