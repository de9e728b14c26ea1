#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Placement resolution that projects spawn anchors onto walkable ground.
//!
//! Every resolution performs at most [`PlacementConfig::max_attempts`]
//! surface queries. The first query probes the anchor itself; later queries
//! probe random offsets around it. A projected point is accepted only when it
//! keeps [`PlacementConfig::min_separation`] from every agent already placed.
//! Failing to resolve drops that one agent and nothing else.

use std::{collections::VecDeque, f32::consts::TAU, num::NonZeroU32};

use gauntlet_core::{PlacementFailure, Vec3, WalkableSurface};
use rand::Rng;
use serde::Deserialize;

/// Tuning knobs for placement resolution.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct PlacementConfig {
    /// Surface queries allowed per agent before it is dropped.
    pub max_attempts: u32,
    /// Maximum distance between a probe and the walkable point it snaps to.
    pub sample_distance: f32,
    /// Minimum distance kept between simultaneously placed agents.
    pub min_separation: f32,
    /// Radius of the random offset applied to probes after the first attempt.
    pub jitter_radius: f32,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            max_attempts: 50,
            sample_distance: 10.0,
            min_separation: 2.0,
            jitter_radius: 3.0,
        }
    }
}

impl PlacementConfig {
    /// Stricter tuning that favours placement fidelity over completion rate.
    #[must_use]
    pub fn legacy() -> Self {
        Self {
            max_attempts: 20,
            sample_distance: 5.0,
            min_separation: 3.0,
            ..Self::default()
        }
    }
}

/// Resolves anchors into validated positions.
#[derive(Clone, Debug, Default)]
pub struct PlacementResolver {
    config: PlacementConfig,
}

impl PlacementResolver {
    /// Creates a resolver using the provided tuning.
    #[must_use]
    pub const fn new(config: PlacementConfig) -> Self {
        Self { config }
    }

    /// Current tuning.
    #[must_use]
    pub const fn config(&self) -> &PlacementConfig {
        &self.config
    }

    /// Mutable access to the tuning so designers can adjust it between activations.
    pub fn config_mut(&mut self) -> &mut PlacementConfig {
        &mut self.config
    }

    /// Resolves `candidate` synchronously, spending up to `max_attempts` queries.
    pub fn resolve<S, R>(
        &self,
        surface: &S,
        candidate: Vec3,
        existing: &[Vec3],
        rng: &mut R,
    ) -> Result<Vec3, PlacementFailure>
    where
        S: WalkableSurface + ?Sized,
        R: Rng + ?Sized,
    {
        for attempt in 0..self.config.max_attempts {
            if let Some(position) = self.attempt(surface, candidate, attempt, existing, rng) {
                return Ok(position);
            }
        }

        Err(PlacementFailure::NoWalkableSurface {
            attempts: self.config.max_attempts,
        })
    }

    fn attempt<S, R>(
        &self,
        surface: &S,
        candidate: Vec3,
        attempt: u32,
        existing: &[Vec3],
        rng: &mut R,
    ) -> Option<Vec3>
    where
        S: WalkableSurface + ?Sized,
        R: Rng + ?Sized,
    {
        let probe = if attempt == 0 {
            candidate
        } else {
            candidate + jitter(self.config.jitter_radius, rng)
        };

        let projected = surface.sample_nearest(probe, self.config.sample_distance)?;
        if is_separated(projected, existing, self.config.min_separation) {
            Some(projected)
        } else {
            None
        }
    }
}

fn jitter<R>(radius: f32, rng: &mut R) -> Vec3
where
    R: Rng + ?Sized,
{
    if radius <= 0.0 {
        return Vec3::ZERO;
    }
    let angle = rng.gen_range(0.0..TAU);
    let distance = radius * rng.gen::<f32>().sqrt();
    Vec3::new(angle.cos() * distance, 0.0, angle.sin() * distance)
}

fn is_separated(position: Vec3, existing: &[Vec3], min_separation: f32) -> bool {
    if min_separation <= 0.0 {
        return true;
    }
    let limit = min_separation * min_separation;
    existing
        .iter()
        .all(|other| position.distance_squared(*other) >= limit)
}

/// Definitive outcome for one queued agent.
#[derive(Clone, Debug, PartialEq)]
pub struct Resolution<T> {
    /// Caller data attached when the agent was queued.
    pub tag: T,
    /// Anchor the agent was queued at.
    pub anchor: Vec3,
    /// Resolved position or the reason the agent was dropped.
    pub outcome: Result<Vec3, PlacementFailure>,
}

#[derive(Clone, Debug)]
struct Pending<T> {
    tag: T,
    anchor: Vec3,
    attempts: u32,
}

/// Queue of agents awaiting placement, resolved cooperatively across steps.
///
/// Agents are resolved strictly in queue order. Attempt counters survive
/// between steps, so budgeting never changes how many queries an agent may
/// spend.
#[derive(Clone, Debug)]
pub struct PlacementQueue<T> {
    pending: VecDeque<Pending<T>>,
    placed: Vec<Vec3>,
}

impl<T> Default for PlacementQueue<T> {
    fn default() -> Self {
        Self {
            pending: VecDeque::new(),
            placed: Vec::new(),
        }
    }
}

impl<T> PlacementQueue<T> {
    /// Creates an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an agent at `anchor`.
    pub fn push(&mut self, anchor: Vec3, tag: T) {
        self.pending.push_back(Pending {
            tag,
            anchor,
            attempts: 0,
        });
    }

    /// Number of agents still awaiting a definitive outcome.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Reports whether every queued agent has been resolved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Positions accepted so far, used for separation checks.
    #[must_use]
    pub fn placed(&self) -> &[Vec3] {
        &self.placed
    }

    /// Drops every pending agent, returning their tags in queue order.
    pub fn cancel(&mut self) -> Vec<T> {
        self.pending.drain(..).map(|pending| pending.tag).collect()
    }

    /// Spends up to `budget` surface queries resolving agents in order.
    ///
    /// `None` resolves every pending agent. A budget is never zero, so every
    /// call with pending agents makes progress. Definitive outcomes are
    /// appended to `out`; the number of surface queries performed is returned.
    pub fn step<S, R>(
        &mut self,
        resolver: &PlacementResolver,
        surface: &S,
        budget: Option<NonZeroU32>,
        rng: &mut R,
        out: &mut Vec<Resolution<T>>,
    ) -> u32
    where
        S: WalkableSurface + ?Sized,
        R: Rng + ?Sized,
    {
        let max_attempts = resolver.config().max_attempts;
        let mut remaining = budget.map_or(u32::MAX, NonZeroU32::get);
        let mut queries = 0;

        while let Some(front) = self.pending.front_mut() {
            if front.attempts >= max_attempts {
                let Some(exhausted) = self.pending.pop_front() else {
                    break;
                };
                tracing::debug!(
                    attempts = exhausted.attempts,
                    "placement exhausted its attempts"
                );
                out.push(Resolution {
                    tag: exhausted.tag,
                    anchor: exhausted.anchor,
                    outcome: Err(PlacementFailure::NoWalkableSurface {
                        attempts: exhausted.attempts,
                    }),
                });
                continue;
            }

            if remaining == 0 {
                break;
            }

            let attempt = front.attempts;
            front.attempts += 1;
            remaining -= 1;
            queries += 1;

            let anchor = front.anchor;
            let Some(position) = resolver.attempt(surface, anchor, attempt, &self.placed, rng)
            else {
                continue;
            };

            let Some(resolved) = self.pending.pop_front() else {
                break;
            };
            self.placed.push(position);
            out.push(Resolution {
                tag: resolved.tag,
                anchor: resolved.anchor,
                outcome: Ok(position),
            });
        }

        queries
    }
}
