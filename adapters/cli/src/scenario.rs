//! TOML scenario files describing zones, challenges and a scheduler script.

use std::{fs, num::NonZeroU32, path::Path};

use anyhow::{Context, Result};
use gauntlet_core::{ChallengeDefinition, ChallengeId, ZoneDescriptor, ZoneId};
use gauntlet_world::{LifecycleConfig, ZoneLifecycleManager};
use serde::Deserialize;

use crate::host::FlatGround;

/// Everything needed to drive a headless run.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct Scenario {
    /// Manager tuning.
    #[serde(default)]
    pub(crate) config: LifecycleConfig,
    /// Walkable surface agents are placed on.
    #[serde(default)]
    pub(crate) ground: FlatGround,
    /// Player level used by completions that do not name one.
    #[serde(default = "default_player_level")]
    pub(crate) player_level: u32,
    /// Challenge catalogue.
    #[serde(default)]
    pub(crate) challenges: Vec<ChallengeDefinition>,
    /// Zones available to the scheduler.
    #[serde(default)]
    pub(crate) zones: Vec<ZoneDescriptor>,
    /// Scheduler actions, executed in order.
    #[serde(default)]
    pub(crate) script: Vec<ScriptStep>,
}

fn default_player_level() -> u32 {
    1
}

fn default_step_count() -> u32 {
    1
}

/// One scripted scheduler action.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub(crate) enum ScriptStep {
    /// Binds a challenge to a zone.
    Activate {
        /// Zone to activate.
        zone: ZoneId,
        /// Challenge to bind.
        challenge: ChallengeId,
    },
    /// Advances placement by a fixed number of steps.
    Step {
        /// Number of steps to run.
        #[serde(default = "default_step_count")]
        count: u32,
    },
    /// Steps until no zone is activating.
    Settle,
    /// Reports a completed challenge.
    Complete {
        /// Zone hosting the challenge.
        zone: ZoneId,
        /// Player level; falls back to the scenario level.
        #[serde(default)]
        level: Option<u32>,
        /// Flawless run.
        #[serde(default)]
        perfect: bool,
        /// First clear.
        #[serde(default)]
        first_clear: bool,
        /// Run duration in seconds.
        #[serde(default)]
        elapsed_secs: Option<f32>,
    },
    /// Reports an abandoned challenge.
    Abandon {
        /// Zone hosting the challenge.
        zone: ZoneId,
    },
    /// Deactivates an occupied zone.
    Release {
        /// Zone to release.
        zone: ZoneId,
    },
    /// Aborts an activation in progress.
    Cancel {
        /// Zone to abort.
        zone: ZoneId,
    },
}

impl Scenario {
    /// Reads and parses the scenario at `path`.
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("failed to parse scenario {}", path.display()))
    }

    /// Parses a scenario from TOML text.
    pub(crate) fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Applies command-line overrides to the manager tuning.
    pub(crate) fn override_config(
        &mut self,
        seed: Option<u64>,
        attempts_per_step: Option<NonZeroU32>,
    ) {
        if let Some(seed) = seed {
            self.config.rng_seed = seed;
        }
        if let Some(attempts) = attempts_per_step {
            self.config.attempts_per_step = Some(attempts);
        }
    }

    /// Builds a manager with every challenge and zone registered.
    pub(crate) fn build_manager(&self) -> Result<ZoneLifecycleManager> {
        let mut manager =
            ZoneLifecycleManager::new(self.config).context("rejected scenario tuning")?;
        for challenge in &self.challenges {
            manager
                .register_challenge(challenge.clone())
                .with_context(|| format!("rejected challenge `{}`", challenge.name()))?;
        }
        for zone in &self.zones {
            manager
                .register_zone(zone.clone())
                .with_context(|| format!("rejected zone `{}`", zone.name()))?;
        }
        Ok(manager)
    }
}
