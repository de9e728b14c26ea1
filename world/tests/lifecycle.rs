use std::{collections::BTreeSet, num::NonZeroU32};

use gauntlet_core::{
    AgentFactory, AgentHandle, AgentTemplate, ChallengeDefinition, ChallengeId, ChallengeKind,
    ChallengeModifier, Command, CompletionOutcome, Difficulty, Event, LifecycleError,
    ModifierEntry, ReleaseReason, SpawnAnchor, SpawnCategory, SpawnItem, SpawnProfile,
    StartState, Vec3, WalkableSurface, ZoneDescriptor, ZoneId, ZoneState,
};
use gauntlet_world::{apply, query, LifecycleConfig, ZoneLifecycleManager};

const ZONE: ZoneId = ZoneId::new(1);
const BOSS_FIGHT: ChallengeId = ChallengeId::new(1);

struct Ground;

impl WalkableSurface for Ground {
    fn sample_nearest(&self, position: Vec3, _max_distance: f32) -> Option<Vec3> {
        Some(Vec3::new(position.x, 0.0, position.z))
    }
}

/// Ground that ends at `x = 12`.
struct Cliff;

impl WalkableSurface for Cliff {
    fn sample_nearest(&self, position: Vec3, _max_distance: f32) -> Option<Vec3> {
        (position.x < 12.0).then(|| Vec3::new(position.x, 0.0, position.z))
    }
}

#[derive(Default)]
struct RecordingFactory {
    next: u64,
    live: BTreeSet<AgentHandle>,
    spawned: Vec<(String, SpawnProfile)>,
}

impl AgentFactory for RecordingFactory {
    fn spawn(
        &mut self,
        template: &AgentTemplate,
        _position: Vec3,
        _forward: Vec3,
        profile: &SpawnProfile,
    ) -> AgentHandle {
        let handle = AgentHandle::new(self.next);
        self.next += 1;
        let _ = self.live.insert(handle);
        self.spawned.push((template.name().to_owned(), *profile));
        handle
    }

    fn despawn(&mut self, agent: AgentHandle) {
        assert!(self.live.remove(&agent), "despawned unknown agent {agent:?}");
    }
}

fn anchors(count: usize) -> Vec<SpawnAnchor> {
    (0..count)
        .map(|index| SpawnAnchor::new(Vec3::new(index as f32 * 5.0, 0.0, 0.0), Vec3::Z))
        .collect()
}

fn boss_fight() -> ChallengeDefinition {
    ChallengeDefinition::new(
        BOSS_FIGHT,
        "Warlord's Den",
        ChallengeKind::BossFight,
        Difficulty::Hard,
    )
    .with_spawn_item(SpawnItem::new(
        "Boss",
        SpawnCategory::Boss,
        AgentTemplate::new("warlord"),
        1,
        1,
    ))
    .with_spawn_item(SpawnItem::new(
        "Grunt",
        SpawnCategory::Enemy,
        AgentTemplate::new("grunt"),
        10,
        15,
    ))
}

fn manager(config: LifecycleConfig, challenge: ChallengeDefinition) -> ZoneLifecycleManager {
    let mut manager = ZoneLifecycleManager::new(config).expect("valid tuning");
    manager
        .register_zone(ZoneDescriptor::new(ZONE, "Quarry", Vec3::ZERO).with_anchors(anchors(10)))
        .expect("zone registers");
    manager
        .register_challenge(challenge)
        .expect("challenge registers");
    manager
}

fn run_until_occupied<S: WalkableSurface>(
    manager: &mut ZoneLifecycleManager,
    surface: &S,
    factory: &mut RecordingFactory,
    events: &mut Vec<Event>,
) -> usize {
    let mut steps = 0;
    while query::zone_state(manager, ZONE) == Some(ZoneState::Activating) {
        manager.step(surface, factory, events);
        steps += 1;
        assert!(steps < 10_000, "activation never settled");
    }
    steps
}

#[test]
fn boss_is_served_before_grunts_when_anchors_run_short() {
    let mut manager = manager(LifecycleConfig::default(), boss_fight());
    let mut factory = RecordingFactory::default();
    let mut events = Vec::new();

    let _ = manager
        .activate(ZONE, BOSS_FIGHT, &mut events)
        .expect("free zone activates");

    let allocations = query::allocations(&manager, ZONE);
    assert_eq!(allocations.len(), 2);
    assert_eq!(allocations[0].granted(), 1);
    assert!(!allocations[0].is_under_allocated());
    assert_eq!(allocations[1].granted(), 9);
    assert!(allocations[1].requested >= 10);
    assert!(allocations[1].is_under_allocated());

    let unique: BTreeSet<u32> = allocations
        .iter()
        .flat_map(|allocation| allocation.anchors.iter())
        .map(|anchor| anchor.position().x.to_bits())
        .collect();
    assert_eq!(unique.len(), 10, "an anchor was handed out twice");

    let _ = run_until_occupied(&mut manager, &Ground, &mut factory, &mut events);

    let summary = query::summary(&manager, ZONE).expect("occupied zone has a summary");
    assert_eq!(summary.allocated, 10);
    assert_eq!(summary.placed, 10);
    assert_eq!(summary.dropped, 0);
    assert_eq!(summary.under_allocated_items, 1);
    assert_eq!(factory.live.len(), 10);
    assert_eq!(factory.spawned[0].0, "warlord", "boss spawns first");
}

#[test]
fn a_zone_hosts_one_challenge_at_a_time() {
    let mut manager = manager(LifecycleConfig::default(), boss_fight());
    let mut factory = RecordingFactory::default();
    let mut events = Vec::new();

    let _ = manager
        .activate(ZONE, BOSS_FIGHT, &mut events)
        .expect("free zone activates");
    assert_eq!(
        manager.activate(ZONE, BOSS_FIGHT, &mut events),
        Err(LifecycleError::ZoneNotFree {
            zone: ZONE,
            state: ZoneState::Activating,
        })
    );

    manager.step(&Ground, &mut factory, &mut events);
    assert_eq!(query::zone_state(&manager, ZONE), Some(ZoneState::Occupied));
    assert!(!manager.try_activate(ZONE, BOSS_FIGHT, &mut events));
    assert!(query::free_zones(&manager).is_empty());

    manager
        .release(ZONE, &mut factory, &mut events)
        .expect("occupied zone releases");
    assert_eq!(query::zone_state(&manager, ZONE), Some(ZoneState::Free));
    assert_eq!(query::bound_challenge(&manager, ZONE), None);
    assert!(factory.live.is_empty());

    assert!(manager.try_activate(ZONE, BOSS_FIGHT, &mut events));
    assert_eq!(query::bound_challenge(&manager, ZONE), Some(BOSS_FIGHT));
}

#[test]
fn cancelling_an_activation_leaves_no_orphans() {
    let config = LifecycleConfig {
        attempts_per_step: NonZeroU32::new(1),
        ..LifecycleConfig::default()
    };
    let mut manager = manager(config, boss_fight());
    let mut factory = RecordingFactory::default();
    let mut events = Vec::new();

    let _ = manager
        .activate(ZONE, BOSS_FIGHT, &mut events)
        .expect("free zone activates");
    manager.step(&Ground, &mut factory, &mut events);
    manager.step(&Ground, &mut factory, &mut events);

    assert_eq!(query::zone_state(&manager, ZONE), Some(ZoneState::Activating));
    assert_eq!(query::agents(&manager, ZONE).len(), 2);
    assert_eq!(query::pending_placements(&manager, ZONE), 8);

    events.clear();
    manager
        .cancel_activation(ZONE, &mut factory, &mut events)
        .expect("activating zone cancels");

    assert!(factory.live.is_empty());
    assert_eq!(
        events,
        vec![
            Event::ZoneReleasing {
                zone: ZONE,
                reason: ReleaseReason::Cancelled,
            },
            Event::ZoneReleased {
                zone: ZONE,
                despawned: 2,
            },
        ]
    );
    assert_eq!(query::zone_state(&manager, ZONE), Some(ZoneState::Free));
    assert!(query::allocations(&manager, ZONE).is_empty());

    manager.step(&Ground, &mut factory, &mut events);
    assert!(factory.live.is_empty(), "cancelled placements must not resume");
}

#[test]
fn lifecycle_transitions_require_the_right_state() {
    let mut manager = manager(LifecycleConfig::default(), boss_fight());
    let mut factory = RecordingFactory::default();
    let mut events = Vec::new();

    assert_eq!(
        manager.abandon(ZONE, &mut factory, &mut events),
        Err(LifecycleError::ZoneNotOccupied {
            zone: ZONE,
            state: ZoneState::Free,
        })
    );
    assert_eq!(
        manager.cancel_activation(ZONE, &mut factory, &mut events),
        Err(LifecycleError::ZoneNotActivating {
            zone: ZONE,
            state: ZoneState::Free,
        })
    );
    assert_eq!(
        manager.activate(ZoneId::new(9), BOSS_FIGHT, &mut events),
        Err(LifecycleError::UnknownZone(ZoneId::new(9)))
    );
    assert_eq!(
        manager.activate(ZONE, ChallengeId::new(9), &mut events),
        Err(LifecycleError::UnknownChallenge(ChallengeId::new(9)))
    );
    assert!(events.is_empty());
}

#[test]
fn startup_forces_active_zones_free_and_starts_self_starting_ones() {
    let mut manager =
        ZoneLifecycleManager::new(LifecycleConfig::default()).expect("default tuning is valid");
    manager
        .register_challenge(boss_fight())
        .expect("challenge registers");
    let zones = [
        (1, StartState::Active),
        (
            2,
            StartState::SelfStarting {
                challenge: BOSS_FIGHT,
            },
        ),
        (3, StartState::Inactive),
        (
            4,
            StartState::SelfStarting {
                challenge: ChallengeId::new(99),
            },
        ),
    ];
    for (id, start) in zones {
        manager
            .register_zone(
                ZoneDescriptor::new(ZoneId::new(id), "Outpost", Vec3::ZERO)
                    .with_anchors(anchors(4))
                    .with_start(start),
            )
            .expect("zone registers");
    }

    let mut events = Vec::new();
    manager.start(&mut events);

    assert!(events.contains(&Event::ZoneForcedFree {
        zone: ZoneId::new(1)
    }));
    assert!(events.contains(&Event::CommandRejected {
        command: Command::ActivateZone {
            zone: ZoneId::new(4),
            challenge: ChallengeId::new(99),
        },
        reason: LifecycleError::UnknownChallenge(ChallengeId::new(99)),
    }));
    assert_eq!(query::zone_state(&manager, ZoneId::new(1)), Some(ZoneState::Free));
    assert_eq!(
        query::zone_state(&manager, ZoneId::new(2)),
        Some(ZoneState::Activating)
    );
    assert_eq!(
        query::free_zones(&manager),
        vec![ZoneId::new(1), ZoneId::new(3), ZoneId::new(4)]
    );

    events.clear();
    manager.start(&mut events);
    assert!(events.is_empty(), "start only runs once");
}

#[test]
fn placement_failures_degrade_but_never_block_occupation() {
    let mut manager = manager(LifecycleConfig::default(), boss_fight());
    let mut factory = RecordingFactory::default();
    let mut events = Vec::new();

    let _ = manager
        .activate(ZONE, BOSS_FIGHT, &mut events)
        .expect("free zone activates");
    let _ = run_until_occupied(&mut manager, &Cliff, &mut factory, &mut events);

    let summary = query::summary(&manager, ZONE).expect("occupied zone has a summary");
    assert_eq!(summary.placed + summary.dropped, 10);
    assert_eq!(summary.placed, 3);
    let dropped_events = events
        .iter()
        .filter(|event| matches!(event, Event::AgentDropped { .. }))
        .count();
    assert_eq!(dropped_events, 7);
    assert!(query::agents(&manager, ZONE)
        .iter()
        .all(|agent| agent.position.x < 12.0));

    let payout = manager
        .complete(
            ZONE,
            CompletionOutcome {
                player_level: 4,
                perfect: false,
                first_clear: true,
                elapsed_secs: None,
            },
            &mut factory,
            &mut events,
        )
        .expect("degraded challenge still completes");
    assert!(payout.xp > 0);
    assert!(factory.live.is_empty());
}

#[test]
fn completion_grants_rewards_then_releases() {
    let mut manager = manager(LifecycleConfig::default(), boss_fight());
    let mut factory = RecordingFactory::default();
    let mut events = Vec::new();
    let _ = manager
        .activate(ZONE, BOSS_FIGHT, &mut events)
        .expect("free zone activates");
    let _ = run_until_occupied(&mut manager, &Ground, &mut factory, &mut events);

    let outcome = CompletionOutcome {
        player_level: 15,
        perfect: true,
        first_clear: false,
        elapsed_secs: Some(42.0),
    };
    let expected = query::reward_scaling(&manager, BOSS_FIGHT)
        .expect("registered challenge")
        .payout(Difficulty::Hard, &outcome);

    events.clear();
    let payout = manager
        .complete(ZONE, outcome, &mut factory, &mut events)
        .expect("occupied zone completes");

    assert_eq!(payout, expected);
    assert_eq!(payout.difficulty, Difficulty::Elite);
    assert_eq!(
        events,
        vec![
            Event::ZoneReleasing {
                zone: ZONE,
                reason: ReleaseReason::Completed,
            },
            Event::RewardsGranted {
                zone: ZONE,
                challenge: BOSS_FIGHT,
                payout,
            },
            Event::ZoneReleased {
                zone: ZONE,
                despawned: 10,
            },
        ]
    );
    assert!(factory.live.is_empty());
}

#[test]
fn modifiers_reach_the_agent_factory() {
    let challenge = boss_fight()
        .with_modifier(ModifierEntry::active(ChallengeModifier::EliteEnemiesOnly))
        .with_modifier(ModifierEntry::active(
            ChallengeModifier::IncreasedEnemyHealth { multiplier: 2.0 },
        ));
    let mut manager = manager(LifecycleConfig::default(), challenge);
    let mut factory = RecordingFactory::default();
    let mut events = Vec::new();

    let _ = manager
        .activate(ZONE, BOSS_FIGHT, &mut events)
        .expect("free zone activates");
    manager.step(&Ground, &mut factory, &mut events);

    for (template, profile) in &factory.spawned {
        assert_eq!(profile.health_multiplier, 2.0);
        assert_eq!(profile.elite, template == "grunt", "{template}");
    }
}

#[test]
fn apply_reports_rejected_commands() {
    let mut manager = manager(LifecycleConfig::default(), boss_fight());
    let mut factory = RecordingFactory::default();
    let mut events = Vec::new();

    apply(
        &mut manager,
        Command::ReleaseZone { zone: ZONE },
        &Ground,
        &mut factory,
        &mut events,
    );

    assert_eq!(
        events,
        vec![Event::CommandRejected {
            command: Command::ReleaseZone { zone: ZONE },
            reason: LifecycleError::ZoneNotOccupied {
                zone: ZONE,
                state: ZoneState::Free,
            },
        }]
    );

    events.clear();
    for command in [
        Command::ActivateZone {
            zone: ZONE,
            challenge: BOSS_FIGHT,
        },
        Command::Step,
        Command::AbandonChallenge { zone: ZONE },
    ] {
        apply(&mut manager, command, &Ground, &mut factory, &mut events);
    }
    assert!(!events
        .iter()
        .any(|event| matches!(event, Event::CommandRejected { .. })));
    assert!(events.contains(&Event::ZoneReleasing {
        zone: ZONE,
        reason: ReleaseReason::Abandoned,
    }));
    assert!(factory.live.is_empty());
}

#[test]
fn budgeted_steps_spawn_the_same_agents() {
    let run = |attempts_per_step| {
        let config = LifecycleConfig {
            attempts_per_step,
            ..LifecycleConfig::default()
        };
        let mut manager = manager(config, boss_fight());
        let mut factory = RecordingFactory::default();
        let mut events = Vec::new();
        let _ = manager
            .activate(ZONE, BOSS_FIGHT, &mut events)
            .expect("free zone activates");
        let steps = run_until_occupied(&mut manager, &Cliff, &mut factory, &mut events);
        (query::agents(&manager, ZONE).to_vec(), steps)
    };

    let (unbudgeted, single_step) = run(None);
    let (budgeted, many_steps) = run(NonZeroU32::new(5));

    assert_eq!(single_step, 1);
    assert!(many_steps > 1);
    assert_eq!(budgeted, unbudgeted);
}

#[test]
fn smallest_step_budget_still_occupies_the_zone() {
    let config = LifecycleConfig {
        attempts_per_step: NonZeroU32::new(1),
        ..LifecycleConfig::default()
    };
    let mut manager = manager(config, boss_fight());
    let mut factory = RecordingFactory::default();
    let mut events = Vec::new();
    let _ = manager
        .activate(ZONE, BOSS_FIGHT, &mut events)
        .expect("free zone activates");

    for _ in 0..1_000 {
        if query::zone_state(&manager, ZONE) != Some(ZoneState::Activating) {
            break;
        }
        manager.step(&Ground, &mut factory, &mut events);
    }

    assert_eq!(query::zone_state(&manager, ZONE), Some(ZoneState::Occupied));
    assert_eq!(query::pending_placements(&manager, ZONE), 0);
}

#[test]
fn accepted_tuning_keeps_rewards_ordered_by_level() {
    let mut config = LifecycleConfig::default();
    config.rewards.xp_percent = [1000, 100, 100, 100, 100];
    assert!(ZoneLifecycleManager::new(config).is_err());

    let manager = manager(LifecycleConfig::default(), boss_fight());
    let scaling = query::reward_scaling(&manager, BOSS_FIGHT).expect("registered challenge");
    let xp_at = |level| {
        let difficulty = scaling.effective_difficulty(Difficulty::Hard, level);
        scaling.total_xp(level, difficulty, Default::default())
    };
    assert!(xp_at(11) >= xp_at(1));
}
