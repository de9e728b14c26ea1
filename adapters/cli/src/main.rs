#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that runs gauntlet scenarios headlessly.

mod host;
mod scenario;

use std::{num::NonZeroU32, path::PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use gauntlet_core::{
    Command, CompletionFlags, CompletionOutcome, Event, WalkableSurface, ZoneState,
};
use gauntlet_world::{self as world, query, ZoneLifecycleManager};
use tracing_subscriber::EnvFilter;

use crate::{
    host::HeadlessFactory,
    scenario::{Scenario, ScriptStep},
};

const SETTLE_STEP_LIMIT: u32 = 100_000;

/// Headless runner for gauntlet challenge scenarios.
#[derive(Debug, Parser)]
#[command(name = "gauntlet", version, about)]
struct Cli {
    /// Scenario file to load.
    scenario: PathBuf,
    /// Overrides the scenario's global RNG seed.
    #[arg(long)]
    seed: Option<u64>,
    /// Overrides the player level of every completion.
    #[arg(long)]
    level: Option<u32>,
    /// Overrides the per-step surface query budget.
    #[arg(long)]
    attempts_per_step: Option<NonZeroU32>,
    #[command(subcommand)]
    mode: Option<Mode>,
}

#[derive(Clone, Copy, Debug, Subcommand)]
enum Mode {
    /// Executes the scenario script and prints every lifecycle event.
    Run,
    /// Prints reward tables for every challenge without spawning anything.
    Preview {
        /// Highest player level listed.
        #[arg(long, default_value_t = 50)]
        max_level: u32,
        /// Level increment between rows.
        #[arg(long, default_value_t = 10)]
        every: u32,
    },
}

/// Entry point for the gauntlet command-line interface.
fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let mut scenario = Scenario::load(&cli.scenario)?;
    scenario.override_config(cli.seed, cli.attempts_per_step);

    match cli.mode.unwrap_or(Mode::Run) {
        Mode::Run => run(&scenario, cli.level),
        Mode::Preview { max_level, every } => preview(&scenario, max_level, every),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn run(scenario: &Scenario, level_override: Option<u32>) -> Result<()> {
    let mut manager = scenario.build_manager()?;
    let mut factory = HeadlessFactory::default();
    let mut events = Vec::new();

    manager.start(&mut events);
    report(&mut events);

    for (index, step) in scenario.script.iter().enumerate() {
        let command = match *step {
            ScriptStep::Activate { zone, challenge } => Command::ActivateZone { zone, challenge },
            ScriptStep::Step { count } => {
                for _ in 0..count {
                    world::apply(
                        &mut manager,
                        Command::Step,
                        &scenario.ground,
                        &mut factory,
                        &mut events,
                    );
                }
                report(&mut events);
                continue;
            }
            ScriptStep::Settle => {
                let steps = settle(&mut manager, &scenario.ground, &mut factory, &mut events)
                    .with_context(|| format!("script step {index} did not settle"))?;
                tracing::debug!(steps, "zones settled");
                report(&mut events);
                continue;
            }
            ScriptStep::Complete {
                zone,
                level,
                perfect,
                first_clear,
                elapsed_secs,
            } => Command::CompleteChallenge {
                zone,
                outcome: CompletionOutcome {
                    player_level: level_override.or(level).unwrap_or(scenario.player_level),
                    perfect,
                    first_clear,
                    elapsed_secs,
                },
            },
            ScriptStep::Abandon { zone } => Command::AbandonChallenge { zone },
            ScriptStep::Release { zone } => Command::ReleaseZone { zone },
            ScriptStep::Cancel { zone } => Command::CancelActivation { zone },
        };

        world::apply(
            &mut manager,
            command,
            &scenario.ground,
            &mut factory,
            &mut events,
        );
        report(&mut events);
    }

    println!();
    for zone in query::zones(&manager) {
        let state = query::zone_state(&manager, zone.id()).unwrap_or(ZoneState::Free);
        let (id, name) = (zone.id(), zone.name());
        match query::bound_challenge(&manager, id) {
            Some(challenge) => println!("{id} `{name}`: {state} with {challenge}"),
            None => println!("{id} `{name}`: {state}"),
        }
    }
    println!("live agents: {}", factory.live());
    Ok(())
}

fn settle<S>(
    manager: &mut ZoneLifecycleManager,
    surface: &S,
    factory: &mut HeadlessFactory,
    events: &mut Vec<Event>,
) -> Result<u32>
where
    S: WalkableSurface,
{
    for steps in 0..SETTLE_STEP_LIMIT {
        let activating = query::zones(manager)
            .any(|zone| query::zone_state(manager, zone.id()) == Some(ZoneState::Activating));
        if !activating {
            return Ok(steps);
        }
        world::apply(manager, Command::Step, surface, factory, events);
    }
    bail!("zones still activating after {SETTLE_STEP_LIMIT} steps")
}

fn report(events: &mut Vec<Event>) {
    for event in events.drain(..) {
        println!("{}", describe(&event));
    }
}

fn describe(event: &Event) -> String {
    match event {
        Event::ZoneForcedFree { zone } => format!("{zone}: authored active, forced free"),
        Event::ZoneActivating {
            zone,
            challenge,
            activation,
        } => format!("{zone}: activating {challenge} (activation {})", activation.get()),
        Event::AnchorsAllocated {
            zone,
            item,
            requested,
            granted,
            source,
        } => format!("{zone}: `{item}` granted {granted}/{requested} anchors from {source:?}"),
        Event::AgentSpawned {
            zone,
            item,
            agent,
            position,
        } => format!(
            "{zone}: spawned `{item}` agent {} at ({:.1}, {:.1})",
            agent.get(),
            position.x,
            position.z
        ),
        Event::AgentDropped {
            zone,
            item,
            anchor,
            failure,
        } => format!(
            "{zone}: dropped `{item}` at ({:.1}, {:.1}): {failure}",
            anchor.x, anchor.z
        ),
        Event::ZoneOccupied { zone, summary } => format!(
            "{zone}: occupied, {} placed, {} dropped, {}/{} anchors allocated",
            summary.placed, summary.dropped, summary.allocated, summary.requested
        ),
        Event::ZoneReleasing { zone, reason } => format!("{zone}: releasing ({reason:?})"),
        Event::RewardsGranted {
            zone,
            challenge,
            payout,
        } => format!(
            "{zone}: {challenge} rewards at {:?}: {} xp, {} currency, {} x {:?} loot",
            payout.difficulty, payout.xp, payout.currency, payout.loot_count, payout.rarity
        ),
        Event::ZoneReleased { zone, despawned } => {
            format!("{zone}: released, {despawned} agents despawned")
        }
        Event::CommandRejected { command, reason } => format!("rejected {command:?}: {reason}"),
    }
}

fn preview(scenario: &Scenario, max_level: u32, every: u32) -> Result<()> {
    let manager = scenario.build_manager()?;
    let every = usize::try_from(every.max(1)).context("level increment too large")?;

    for challenge in query::challenges(&manager) {
        let Some(scaling) = query::reward_scaling(&manager, challenge.id()) else {
            continue;
        };
        println!(
            "{} `{}` ({:?}, base {:?})",
            challenge.id(),
            challenge.name(),
            challenge.kind(),
            challenge.base_difficulty()
        );
        println!(
            "{:>6} {:>10} {:>8} {:>9} {:>10} {:>5}",
            "level", "difficulty", "xp", "currency", "rarity", "loot"
        );
        for level in (1..=max_level.max(1)).step_by(every) {
            let difficulty = scaling.effective_difficulty(challenge.base_difficulty(), level);
            println!(
                "{:>6} {:>10} {:>8} {:>9} {:>10} {:>5.2}",
                level,
                format!("{difficulty:?}"),
                scaling.total_xp(level, difficulty, CompletionFlags::default()),
                scaling.total_currency(level, difficulty),
                format!("{:?}", scaling.total_loot_rarity(difficulty)),
                scaling.expected_loot_count(difficulty),
            );
        }
        println!();
    }
    Ok(())
}
