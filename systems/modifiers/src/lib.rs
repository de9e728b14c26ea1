#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Ordered stack of challenge modifiers.
//!
//! Entries are toggled independently. At most one entry per
//! [`ModifierKind`] is kept: pushing a kind that is already present replaces
//! the earlier entry and moves it to the end. Unrecognised modifiers are
//! discarded on insertion.

use gauntlet_core::{Adjustments, ChallengeModifier, ModifierEntry, ModifierKind};

/// Canned modifier combinations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Preset {
    /// Tight time limit with doubled currency.
    SpeedRun,
    /// One life, no regeneration, doubled experience.
    IronMan,
    /// Elite, tougher enemies with guaranteed rare loot.
    EliteGauntlet,
    /// Generous weekend rewards.
    WeekendEvent,
}

impl Preset {
    /// Modifiers contributed by the preset, in application order.
    #[must_use]
    pub fn modifiers(self) -> &'static [ChallengeModifier] {
        match self {
            Self::SpeedRun => &[
                ChallengeModifier::TimeTrial { seconds: 300.0 },
                ChallengeModifier::DoubleCurrency,
            ],
            Self::IronMan => &[
                ChallengeModifier::IronMan,
                ChallengeModifier::NoHealthRegen,
                ChallengeModifier::DoubleXp,
            ],
            Self::EliteGauntlet => &[
                ChallengeModifier::EliteEnemiesOnly,
                ChallengeModifier::IncreasedEnemyHealth { multiplier: 1.5 },
                ChallengeModifier::IncreasedEnemyDamage { multiplier: 1.25 },
                ChallengeModifier::GuaranteedRareLoot,
            ],
            Self::WeekendEvent => &[
                ChallengeModifier::DoubleXp,
                ChallengeModifier::DoubleCurrency,
                ChallengeModifier::BonusLootDrop { chance: 0.25 },
            ],
        }
    }
}

/// Ordered, deduplicated collection of modifier entries.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModifierStack {
    entries: Vec<ModifierEntry>,
}

impl ModifierStack {
    /// Creates an empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a stack by pushing `entries` in order.
    #[must_use]
    pub fn from_entries<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = &'a ModifierEntry>,
    {
        let mut stack = Self::new();
        for entry in entries {
            stack.push(*entry);
        }
        stack
    }

    /// Adds `entry`, replacing any earlier entry of the same kind.
    pub fn push(&mut self, entry: ModifierEntry) {
        let Some(kind) = entry.modifier.kind() else {
            tracing::debug!("ignoring unrecognised challenge modifier");
            return;
        };

        if let Some(position) = self.position(kind) {
            let replaced = self.entries.remove(position);
            tracing::debug!(?kind, ?replaced, "modifier replaced by a later entry");
        }
        self.entries.push(entry);
    }

    /// Toggles the entry of `kind`. Returns `false` when no such entry exists.
    pub fn set_active(&mut self, kind: ModifierKind, active: bool) -> bool {
        match self.position(kind) {
            Some(position) => {
                self.entries[position].active = active;
                true
            }
            None => false,
        }
    }

    /// Removes the entry of `kind`, returning it.
    pub fn remove(&mut self, kind: ModifierKind) -> Option<ModifierEntry> {
        self.position(kind)
            .map(|position| self.entries.remove(position))
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Replaces the whole stack with the modifiers of `preset`.
    pub fn apply_preset(&mut self, preset: Preset) {
        self.clear();
        for modifier in preset.modifiers() {
            self.push(ModifierEntry::active(*modifier));
        }
        tracing::debug!(?preset, entries = self.entries.len(), "modifier preset applied");
    }

    /// Reports whether an active entry of `kind` exists.
    #[must_use]
    pub fn is_active(&self, kind: ModifierKind) -> bool {
        self.get(kind).map_or(false, |entry| entry.active)
    }

    /// Entry of `kind`, if present.
    #[must_use]
    pub fn get(&self, kind: ModifierKind) -> Option<&ModifierEntry> {
        self.position(kind).map(|position| &self.entries[position])
    }

    /// Entries in stack order.
    pub fn iter(&self) -> impl Iterator<Item = &ModifierEntry> {
        self.entries.iter()
    }

    /// Number of entries, active or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Reports whether the stack holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Folds every active entry into a single set of adjustments.
    #[must_use]
    pub fn effective(&self) -> Adjustments {
        self.entries
            .iter()
            .filter(|entry| entry.active)
            .fold(Adjustments::default(), |adjustments, entry| {
                entry.modifier.apply(adjustments)
            })
    }

    fn position(&self, kind: ModifierKind) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.modifier.kind() == Some(kind))
    }
}
