#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative zone lifecycle state for the gauntlet challenge engine.
//!
//! Each zone moves through `Free → Activating → Occupied → Releasing → Free`.
//! Activation allocates anchors and queues placements; [`ZoneLifecycleManager::step`]
//! resolves the queue cooperatively and spawns agents through the host's
//! [`AgentFactory`]. Leaving a zone always despawns every agent it spawned.

use std::{collections::BTreeMap, num::NonZeroU32};

use gauntlet_core::{
    ActivationId, Adjustments, AgentFactory, AgentHandle, ChallengeDefinition, ChallengeId,
    Command, CompletionOutcome, ConfigurationError, Event, LifecycleError, ReleaseReason,
    RewardPayout, SpawnAllocation, SpawnSummary, StartState, Vec3, WalkableSurface,
    ZoneDescriptor, ZoneId, ZoneState,
};
use gauntlet_system_modifiers::ModifierStack;
use gauntlet_system_placement::{PlacementConfig, PlacementQueue, PlacementResolver, Resolution};
use gauntlet_system_rewards::{RewardScaling, RewardTuning};
use gauntlet_system_spawn_pool::{summarize, SpawnPointPool};
use rand_chacha::{rand_core::SeedableRng, ChaCha8Rng};
use serde::Deserialize;
use sha2::{Digest, Sha256};

const DEFAULT_RNG_SEED: u64 = 0x6761_756e_746c_6574;

/// Tuning shared by every zone of one manager.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Placement tuning used when resolving anchors.
    pub placement: PlacementConfig,
    /// Surface queries each activating zone may spend per step.
    ///
    /// `None` resolves every pending agent within a single step.
    pub attempts_per_step: Option<NonZeroU32>,
    /// Global seed every activation derives its random stream from.
    pub rng_seed: u64,
    /// Reward tier tables.
    pub rewards: RewardTuning,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            placement: PlacementConfig::default(),
            attempts_per_step: None,
            rng_seed: DEFAULT_RNG_SEED,
            rewards: RewardTuning::default(),
        }
    }
}

impl LifecycleConfig {
    /// Rejects tuning that would break reward ordering or placement geometry.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        self.rewards.validate()?;

        let distances = [
            ("sample_distance", self.placement.sample_distance),
            ("min_separation", self.placement.min_separation),
            ("jitter_radius", self.placement.jitter_radius),
        ];
        for (field, value) in distances {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigurationError::InvalidPlacementConfig(field));
            }
        }
        Ok(())
    }
}

/// Agent spawned on behalf of an activation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpawnedAgent {
    /// Handle returned by the agent factory.
    pub handle: AgentHandle,
    /// Index of the spawn item that produced the agent.
    pub item_index: usize,
    /// Resolved world position.
    pub position: Vec3,
}

#[derive(Clone, Copy, Debug)]
struct AgentSlot {
    item_index: usize,
    forward: Vec3,
}

#[derive(Debug)]
struct Binding {
    challenge: ChallengeId,
    activation: ActivationId,
    adjustments: Adjustments,
    allocations: Vec<SpawnAllocation>,
    queue: PlacementQueue<AgentSlot>,
    rng: ChaCha8Rng,
    agents: Vec<SpawnedAgent>,
    summary: SpawnSummary,
}

#[derive(Debug)]
struct Zone {
    descriptor: ZoneDescriptor,
    state: ZoneState,
    binding: Option<Binding>,
}

/// Owns every registered zone and challenge and drives their lifecycle.
///
/// One instance is constructed by the host and handed to whoever schedules
/// challenges; nothing in the engine reaches for it globally.
#[derive(Debug)]
pub struct ZoneLifecycleManager {
    config: LifecycleConfig,
    pool: SpawnPointPool,
    zones: BTreeMap<ZoneId, Zone>,
    challenges: BTreeMap<ChallengeId, ChallengeDefinition>,
    next_activation: u64,
    started: bool,
    resolutions: Vec<Resolution<AgentSlot>>,
}

impl ZoneLifecycleManager {
    /// Creates a manager without zones or challenges, rejecting invalid tuning.
    pub fn new(config: LifecycleConfig) -> Result<Self, ConfigurationError> {
        config.validate()?;
        Ok(Self {
            config,
            pool: SpawnPointPool::new(),
            zones: BTreeMap::new(),
            challenges: BTreeMap::new(),
            next_activation: 0,
            started: false,
            resolutions: Vec::new(),
        })
    }

    /// Current tuning.
    #[must_use]
    pub const fn config(&self) -> &LifecycleConfig {
        &self.config
    }

    /// Replaces the tuning. Changes affect subsequent activations and steps.
    pub fn reconfigure(&mut self, config: LifecycleConfig) -> Result<(), ConfigurationError> {
        config.validate()?;
        tracing::debug!(?config, "zone lifecycle manager reconfigured");
        self.config = config;
        Ok(())
    }

    /// Validates and registers a challenge definition.
    pub fn register_challenge(
        &mut self,
        challenge: ChallengeDefinition,
    ) -> Result<(), ConfigurationError> {
        challenge.validate()?;
        let id = challenge.id();
        if self.challenges.contains_key(&id) {
            return Err(ConfigurationError::DuplicateChallenge(id));
        }
        tracing::debug!(challenge = %id, name = challenge.name(), "challenge registered");
        let _ = self.challenges.insert(id, challenge);
        Ok(())
    }

    /// Validates and registers a zone. Zones always register as free.
    pub fn register_zone(&mut self, descriptor: ZoneDescriptor) -> Result<(), ConfigurationError> {
        descriptor.validate()?;
        let id = descriptor.id();
        if self.zones.contains_key(&id) {
            return Err(ConfigurationError::DuplicateZone(id));
        }
        tracing::debug!(
            zone = %id,
            name = descriptor.name(),
            anchors = descriptor.anchors().len(),
            "zone registered"
        );
        let _ = self.zones.insert(
            id,
            Zone {
                descriptor,
                state: ZoneState::Free,
                binding: None,
            },
        );
        Ok(())
    }

    /// Applies authored start states. Only the first call has an effect.
    ///
    /// Zones authored as active are legacy content and are forced free.
    /// Self-starting zones activate their default challenge; failures are
    /// reported as rejected activation commands.
    pub fn start(&mut self, out_events: &mut Vec<Event>) {
        if self.started {
            tracing::debug!("zone lifecycle manager already started");
            return;
        }
        self.started = true;

        let mut self_starting = Vec::new();
        for (id, zone) in &self.zones {
            if zone.binding.is_some() {
                continue;
            }
            match zone.descriptor.start() {
                StartState::Inactive => {}
                StartState::Active => {
                    tracing::warn!(
                        zone = %id,
                        name = zone.descriptor.name(),
                        "zone authored as active; forcing it free"
                    );
                    out_events.push(Event::ZoneForcedFree { zone: *id });
                }
                StartState::SelfStarting { challenge } => self_starting.push((*id, challenge)),
            }
        }

        for (zone, challenge) in self_starting {
            if let Err(reason) = self.activate(zone, challenge, out_events) {
                tracing::warn!(%zone, %challenge, %reason, "self-starting zone failed to activate");
                out_events.push(Event::CommandRejected {
                    command: Command::ActivateZone { zone, challenge },
                    reason,
                });
            }
        }
    }

    /// Binds `challenge_id` to the free zone and queues its agents for placement.
    pub fn activate(
        &mut self,
        zone_id: ZoneId,
        challenge_id: ChallengeId,
        out_events: &mut Vec<Event>,
    ) -> Result<ActivationId, LifecycleError> {
        let zone = self
            .zones
            .get_mut(&zone_id)
            .ok_or(LifecycleError::UnknownZone(zone_id))?;
        let challenge = self
            .challenges
            .get(&challenge_id)
            .ok_or(LifecycleError::UnknownChallenge(challenge_id))?;
        if zone.state != ZoneState::Free {
            return Err(LifecycleError::ZoneNotFree {
                zone: zone_id,
                state: zone.state,
            });
        }

        let activation = ActivationId::new(self.next_activation);
        self.next_activation = self.next_activation.wrapping_add(1);

        let adjustments = ModifierStack::from_entries(challenge.modifiers()).effective();
        let seed = derive_activation_seed(self.config.rng_seed, zone_id, activation);
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let allocations = self.pool.allocate(
            challenge.spawn_items(),
            zone.descriptor.anchors(),
            zone.descriptor.center(),
            &mut rng,
        );

        out_events.push(Event::ZoneActivating {
            zone: zone_id,
            challenge: challenge_id,
            activation,
        });

        let mut queue = PlacementQueue::new();
        for allocation in &allocations {
            out_events.push(Event::AnchorsAllocated {
                zone: zone_id,
                item: allocation.item_name.clone(),
                requested: allocation.requested,
                granted: allocation.granted(),
                source: allocation.source,
            });
            for anchor in &allocation.anchors {
                queue.push(
                    anchor.position(),
                    AgentSlot {
                        item_index: allocation.item_index,
                        forward: anchor.forward(),
                    },
                );
            }
        }

        let summary = summarize(&allocations);
        tracing::info!(
            zone = %zone_id,
            challenge = %challenge_id,
            activation = activation.get(),
            requested = summary.requested,
            allocated = summary.allocated,
            "zone activating"
        );

        zone.state = ZoneState::Activating;
        zone.binding = Some(Binding {
            challenge: challenge_id,
            activation,
            adjustments,
            allocations,
            queue,
            rng,
            agents: Vec::new(),
            summary,
        });
        Ok(activation)
    }

    /// Scheduler-facing activation that reports success as a flag.
    pub fn try_activate(
        &mut self,
        zone: ZoneId,
        challenge: ChallengeId,
        out_events: &mut Vec<Event>,
    ) -> bool {
        match self.activate(zone, challenge, out_events) {
            Ok(_) => true,
            Err(reason) => {
                tracing::debug!(%zone, %challenge, %reason, "activation declined");
                false
            }
        }
    }

    /// Advances placement of every activating zone by one cooperative step.
    pub fn step<S, F>(&mut self, surface: &S, factory: &mut F, out_events: &mut Vec<Event>)
    where
        S: WalkableSurface + ?Sized,
        F: AgentFactory + ?Sized,
    {
        let resolver = PlacementResolver::new(self.config.placement);
        let budget = self.config.attempts_per_step;

        for (zone_id, zone) in &mut self.zones {
            if zone.state != ZoneState::Activating {
                continue;
            }
            let Some(binding) = zone.binding.as_mut() else {
                continue;
            };
            let Some(challenge) = self.challenges.get(&binding.challenge) else {
                continue;
            };

            self.resolutions.clear();
            let _ = binding.queue.step(
                &resolver,
                surface,
                budget,
                &mut binding.rng,
                &mut self.resolutions,
            );

            for resolution in self.resolutions.drain(..) {
                let item_index = resolution.tag.item_index;
                let Some(item) = challenge.spawn_items().get(item_index) else {
                    continue;
                };
                match resolution.outcome {
                    Ok(position) => {
                        let profile = binding.adjustments.spawn_profile(item.category());
                        let forward = resolution.tag.forward;
                        let handle = factory.spawn(item.template(), position, forward, &profile);
                        binding.agents.push(SpawnedAgent {
                            handle,
                            item_index,
                            position,
                        });
                        binding.summary.placed = binding.summary.placed.saturating_add(1);
                        tracing::debug!(
                            zone = %zone_id,
                            item = item.name(),
                            agent = handle.get(),
                            "agent spawned"
                        );
                        out_events.push(Event::AgentSpawned {
                            zone: *zone_id,
                            item: item.name().to_owned(),
                            agent: handle,
                            position,
                        });
                    }
                    Err(failure) => {
                        binding.summary.dropped = binding.summary.dropped.saturating_add(1);
                        tracing::warn!(
                            zone = %zone_id,
                            item = item.name(),
                            %failure,
                            "agent dropped"
                        );
                        out_events.push(Event::AgentDropped {
                            zone: *zone_id,
                            item: item.name().to_owned(),
                            anchor: resolution.anchor,
                            failure,
                        });
                    }
                }
            }

            if binding.queue.is_empty() {
                tracing::info!(
                    zone = %zone_id,
                    placed = binding.summary.placed,
                    dropped = binding.summary.dropped,
                    "zone occupied"
                );
                out_events.push(Event::ZoneOccupied {
                    zone: *zone_id,
                    summary: binding.summary,
                });
                zone.state = ZoneState::Occupied;
            }
        }
    }

    /// Computes the payout of the occupied zone's challenge and releases the zone.
    pub fn complete<F>(
        &mut self,
        zone_id: ZoneId,
        outcome: CompletionOutcome,
        factory: &mut F,
        out_events: &mut Vec<Event>,
    ) -> Result<RewardPayout, LifecycleError>
    where
        F: AgentFactory + ?Sized,
    {
        let binding = bound_in_state(&self.zones, zone_id, ZoneState::Occupied)?;
        let challenge_id = binding.challenge;
        let challenge = self
            .challenges
            .get(&challenge_id)
            .ok_or(LifecycleError::UnknownChallenge(challenge_id))?;
        let payout =
            RewardScaling::for_challenge(self.config.rewards, challenge, binding.adjustments)
                .payout(challenge.base_difficulty(), &outcome);

        self.begin_release(zone_id, ReleaseReason::Completed, out_events);
        tracing::info!(
            zone = %zone_id,
            challenge = %challenge_id,
            xp = payout.xp,
            currency = payout.currency,
            "rewards granted"
        );
        out_events.push(Event::RewardsGranted {
            zone: zone_id,
            challenge: challenge_id,
            payout,
        });
        self.finish_release(zone_id, factory, out_events);
        Ok(payout)
    }

    /// Releases the occupied zone without rewards after the player gave up.
    pub fn abandon<F>(
        &mut self,
        zone_id: ZoneId,
        factory: &mut F,
        out_events: &mut Vec<Event>,
    ) -> Result<(), LifecycleError>
    where
        F: AgentFactory + ?Sized,
    {
        let _ = bound_in_state(&self.zones, zone_id, ZoneState::Occupied)?;
        self.begin_release(zone_id, ReleaseReason::Abandoned, out_events);
        self.finish_release(zone_id, factory, out_events);
        Ok(())
    }

    /// Deactivates the occupied zone on behalf of the scheduler.
    pub fn release<F>(
        &mut self,
        zone_id: ZoneId,
        factory: &mut F,
        out_events: &mut Vec<Event>,
    ) -> Result<(), LifecycleError>
    where
        F: AgentFactory + ?Sized,
    {
        let _ = bound_in_state(&self.zones, zone_id, ZoneState::Occupied)?;
        self.begin_release(zone_id, ReleaseReason::Deactivated, out_events);
        self.finish_release(zone_id, factory, out_events);
        Ok(())
    }

    /// Aborts an activation that is still placing agents.
    ///
    /// Pending placements are discarded and agents spawned so far are
    /// despawned, so nothing outlives the activation.
    pub fn cancel_activation<F>(
        &mut self,
        zone_id: ZoneId,
        factory: &mut F,
        out_events: &mut Vec<Event>,
    ) -> Result<(), LifecycleError>
    where
        F: AgentFactory + ?Sized,
    {
        let _ = bound_in_state(&self.zones, zone_id, ZoneState::Activating)?;
        self.begin_release(zone_id, ReleaseReason::Cancelled, out_events);
        self.finish_release(zone_id, factory, out_events);
        Ok(())
    }

    fn begin_release(
        &mut self,
        zone_id: ZoneId,
        reason: ReleaseReason,
        out_events: &mut Vec<Event>,
    ) {
        let Some(zone) = self.zones.get_mut(&zone_id) else {
            return;
        };
        zone.state = ZoneState::Releasing;
        tracing::info!(zone = %zone_id, ?reason, "zone releasing");
        out_events.push(Event::ZoneReleasing {
            zone: zone_id,
            reason,
        });
    }

    fn finish_release<F>(&mut self, zone_id: ZoneId, factory: &mut F, out_events: &mut Vec<Event>)
    where
        F: AgentFactory + ?Sized,
    {
        let Some(zone) = self.zones.get_mut(&zone_id) else {
            return;
        };

        let mut despawned = 0u32;
        if let Some(mut binding) = zone.binding.take() {
            let abandoned = binding.queue.cancel();
            if !abandoned.is_empty() {
                tracing::debug!(
                    zone = %zone_id,
                    pending = abandoned.len(),
                    "pending placements discarded"
                );
            }
            for agent in binding.agents.drain(..) {
                factory.despawn(agent.handle);
                despawned = despawned.saturating_add(1);
            }
        }

        zone.state = ZoneState::Free;
        tracing::info!(zone = %zone_id, despawned, "zone released");
        out_events.push(Event::ZoneReleased {
            zone: zone_id,
            despawned,
        });
    }
}

fn bound_in_state(
    zones: &BTreeMap<ZoneId, Zone>,
    zone_id: ZoneId,
    expected: ZoneState,
) -> Result<&Binding, LifecycleError> {
    let zone = zones
        .get(&zone_id)
        .ok_or(LifecycleError::UnknownZone(zone_id))?;
    match (&zone.binding, zone.state == expected) {
        (Some(binding), true) => Ok(binding),
        _ if expected == ZoneState::Activating => Err(LifecycleError::ZoneNotActivating {
            zone: zone_id,
            state: zone.state,
        }),
        _ => Err(LifecycleError::ZoneNotOccupied {
            zone: zone_id,
            state: zone.state,
        }),
    }
}

fn derive_activation_seed(global_seed: u64, zone: ZoneId, activation: ActivationId) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(global_seed.to_le_bytes());
    hasher.update(zone.get().to_le_bytes());
    hasher.update(activation.get().to_le_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

/// Applies the provided command to the manager.
///
/// Rejected commands are reported through [`Event::CommandRejected`] instead
/// of being returned.
pub fn apply<S, F>(
    manager: &mut ZoneLifecycleManager,
    command: Command,
    surface: &S,
    factory: &mut F,
    out_events: &mut Vec<Event>,
) where
    S: WalkableSurface + ?Sized,
    F: AgentFactory + ?Sized,
{
    let result = match &command {
        Command::ActivateZone { zone, challenge } => manager
            .activate(*zone, *challenge, out_events)
            .map(|_| ()),
        Command::Step => {
            manager.step(surface, factory, out_events);
            Ok(())
        }
        Command::CompleteChallenge { zone, outcome } => manager
            .complete(*zone, *outcome, factory, out_events)
            .map(|_| ()),
        Command::AbandonChallenge { zone } => manager.abandon(*zone, factory, out_events),
        Command::ReleaseZone { zone } => manager.release(*zone, factory, out_events),
        Command::CancelActivation { zone } => {
            manager.cancel_activation(*zone, factory, out_events)
        }
    };

    if let Err(reason) = result {
        tracing::debug!(?command, %reason, "command rejected");
        out_events.push(Event::CommandRejected { command, reason });
    }
}

/// Query functions that provide read-only access to the manager state.
pub mod query {
    use gauntlet_core::{
        ActivationId, Adjustments, ChallengeDefinition, ChallengeId, SpawnAllocation,
        SpawnSummary, ZoneDescriptor, ZoneId, ZoneState,
    };
    use gauntlet_system_modifiers::ModifierStack;
    use gauntlet_system_rewards::RewardScaling;

    use super::{SpawnedAgent, ZoneLifecycleManager};

    /// Lifecycle state of `zone`, if registered.
    #[must_use]
    pub fn zone_state(manager: &ZoneLifecycleManager, zone: ZoneId) -> Option<ZoneState> {
        manager.zones.get(&zone).map(|zone| zone.state)
    }

    /// Challenge currently bound to `zone`.
    #[must_use]
    pub fn bound_challenge(manager: &ZoneLifecycleManager, zone: ZoneId) -> Option<ChallengeId> {
        binding(manager, zone).map(|binding| binding.challenge)
    }

    /// Identifier of the activation currently running in `zone`.
    #[must_use]
    pub fn activation(manager: &ZoneLifecycleManager, zone: ZoneId) -> Option<ActivationId> {
        binding(manager, zone).map(|binding| binding.activation)
    }

    /// Allocations of the running activation; empty when the zone is free.
    #[must_use]
    pub fn allocations(manager: &ZoneLifecycleManager, zone: ZoneId) -> &[SpawnAllocation] {
        binding(manager, zone)
            .map(|binding| binding.allocations.as_slice())
            .unwrap_or(&[])
    }

    /// Agents spawned by the running activation, in spawn order.
    #[must_use]
    pub fn agents(manager: &ZoneLifecycleManager, zone: ZoneId) -> &[SpawnedAgent] {
        binding(manager, zone)
            .map(|binding| binding.agents.as_slice())
            .unwrap_or(&[])
    }

    /// Spawn counts of the running activation.
    #[must_use]
    pub fn summary(manager: &ZoneLifecycleManager, zone: ZoneId) -> Option<SpawnSummary> {
        binding(manager, zone).map(|binding| binding.summary)
    }

    /// Agents still awaiting a placement outcome.
    #[must_use]
    pub fn pending_placements(manager: &ZoneLifecycleManager, zone: ZoneId) -> usize {
        binding(manager, zone).map_or(0, |binding| binding.queue.len())
    }

    /// Resolved modifier effects of the running activation.
    #[must_use]
    pub fn adjustments(manager: &ZoneLifecycleManager, zone: ZoneId) -> Option<Adjustments> {
        binding(manager, zone).map(|binding| binding.adjustments)
    }

    /// Free zones in identifier order.
    #[must_use]
    pub fn free_zones(manager: &ZoneLifecycleManager) -> Vec<ZoneId> {
        manager
            .zones
            .iter()
            .filter(|(_, zone)| zone.state == ZoneState::Free)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Registered zones in identifier order.
    pub fn zones(manager: &ZoneLifecycleManager) -> impl Iterator<Item = &ZoneDescriptor> {
        manager.zones.values().map(|zone| &zone.descriptor)
    }

    /// Registered challenge with the provided identifier.
    #[must_use]
    pub fn challenge(
        manager: &ZoneLifecycleManager,
        challenge: ChallengeId,
    ) -> Option<&ChallengeDefinition> {
        manager.challenges.get(&challenge)
    }

    /// Registered challenges in identifier order.
    pub fn challenges(
        manager: &ZoneLifecycleManager,
    ) -> impl Iterator<Item = &ChallengeDefinition> {
        manager.challenges.values()
    }

    /// Reward calculator for `challenge` under its authored modifiers.
    #[must_use]
    pub fn reward_scaling(
        manager: &ZoneLifecycleManager,
        challenge: ChallengeId,
    ) -> Option<RewardScaling> {
        let definition = manager.challenges.get(&challenge)?;
        let adjustments = ModifierStack::from_entries(definition.modifiers()).effective();
        Some(RewardScaling::for_challenge(
            manager.config.rewards,
            definition,
            adjustments,
        ))
    }

    fn binding(manager: &ZoneLifecycleManager, zone: ZoneId) -> Option<&super::Binding> {
        manager.zones.get(&zone)?.binding.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use gauntlet_core::{AgentTemplate, ChallengeKind, Difficulty, SpawnCategory, SpawnItem};

    use super::*;

    fn challenge(id: u32) -> ChallengeDefinition {
        ChallengeDefinition::new(
            ChallengeId::new(id),
            "Ambush",
            ChallengeKind::Elimination,
            Difficulty::Normal,
        )
        .with_spawn_item(SpawnItem::new(
            "Grunt",
            SpawnCategory::Enemy,
            AgentTemplate::new("grunt"),
            1,
            1,
        ))
    }

    fn manager() -> ZoneLifecycleManager {
        ZoneLifecycleManager::new(LifecycleConfig::default()).expect("default tuning is valid")
    }

    #[test]
    fn decreasing_reward_tables_are_rejected() {
        let mut config = LifecycleConfig::default();
        config.rewards.xp_percent = [1000, 100, 100, 100, 100];

        assert_eq!(
            ZoneLifecycleManager::new(config).err(),
            Some(ConfigurationError::NonMonotonicRewardTuning("xp_percent"))
        );

        let mut manager = manager();
        assert!(manager.reconfigure(config).is_err());
        assert_eq!(manager.config(), &LifecycleConfig::default());
    }

    #[test]
    fn non_finite_placement_tuning_is_rejected() {
        let mut config = LifecycleConfig::default();
        config.placement.min_separation = f32::NAN;

        assert_eq!(
            config.validate(),
            Err(ConfigurationError::InvalidPlacementConfig("min_separation"))
        );
    }

    #[test]
    fn zero_step_budget_does_not_parse() {
        assert!(toml::from_str::<LifecycleConfig>("attempts_per_step = 0").is_err());

        let config: LifecycleConfig =
            toml::from_str("attempts_per_step = 4").expect("positive budget parses");
        assert_eq!(config.attempts_per_step, NonZeroU32::new(4));
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn activation_seeds_differ_per_zone_and_activation() {
        let a = derive_activation_seed(7, ZoneId::new(1), ActivationId::new(0));
        let b = derive_activation_seed(7, ZoneId::new(1), ActivationId::new(1));
        let c = derive_activation_seed(7, ZoneId::new(2), ActivationId::new(0));
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert_eq!(a, derive_activation_seed(7, ZoneId::new(1), ActivationId::new(0)));
    }

    #[test]
    fn duplicate_registrations_are_rejected() {
        let mut manager = manager();
        manager
            .register_challenge(challenge(1))
            .expect("first registration");
        assert_eq!(
            manager.register_challenge(challenge(1)),
            Err(ConfigurationError::DuplicateChallenge(ChallengeId::new(1)))
        );

        let zone = ZoneDescriptor::new(ZoneId::new(4), "Quarry", Vec3::ZERO);
        manager.register_zone(zone.clone()).expect("first zone");
        assert_eq!(
            manager.register_zone(zone),
            Err(ConfigurationError::DuplicateZone(ZoneId::new(4)))
        );
    }

    #[test]
    fn activation_ids_are_unique() {
        let mut manager = manager();
        manager.register_challenge(challenge(1)).expect("challenge");
        for id in 0..3 {
            manager
                .register_zone(ZoneDescriptor::new(ZoneId::new(id), "Camp", Vec3::ZERO))
                .expect("zone");
        }

        let mut events = Vec::new();
        let ids: std::collections::BTreeSet<ActivationId> = (0..3)
            .map(|id| {
                manager
                    .activate(ZoneId::new(id), ChallengeId::new(1), &mut events)
                    .expect("free zone activates")
            })
            .collect();
        assert_eq!(ids.len(), 3);
    }
}
