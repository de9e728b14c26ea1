//! Headless stand-ins for the host engine's navigation and character services.

use std::collections::BTreeMap;

use gauntlet_core::{AgentFactory, AgentHandle, AgentTemplate, SpawnProfile, Vec3, WalkableSurface};
use serde::Deserialize;

/// Square walkable plane at `y = 0` with circular holes.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct FlatGround {
    /// Half the side length of the walkable square, centred on the origin.
    pub(crate) half_extent: f32,
    /// Areas agents cannot stand in.
    pub(crate) blocked: Vec<BlockedArea>,
}

impl Default for FlatGround {
    fn default() -> Self {
        Self {
            half_extent: 100.0,
            blocked: Vec::new(),
        }
    }
}

/// Circular hole in the walkable plane.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct BlockedArea {
    /// Centre of the hole; the vertical component is ignored.
    pub(crate) center: Vec3,
    /// Radius of the hole.
    pub(crate) radius: f32,
}

impl FlatGround {
    fn is_walkable(&self, point: Vec3) -> bool {
        point.x.abs() <= self.half_extent
            && point.z.abs() <= self.half_extent
            && self
                .blocked
                .iter()
                .all(|area| flatten(point).distance(flatten(area.center)) >= area.radius)
    }
}

impl WalkableSurface for FlatGround {
    fn sample_nearest(&self, position: Vec3, max_distance: f32) -> Option<Vec3> {
        let origin = flatten(position);
        let extent = self.half_extent.max(0.0);
        let mut point = Vec3::new(
            origin.x.clamp(-extent, extent),
            0.0,
            origin.z.clamp(-extent, extent),
        );

        for area in &self.blocked {
            let center = flatten(area.center);
            let offset = point - center;
            let distance = offset.length();
            if distance < area.radius {
                let direction = if distance > f32::EPSILON {
                    offset / distance
                } else {
                    Vec3::X
                };
                point = center + direction * area.radius;
            }
        }

        (self.is_walkable(point) && point.distance(origin) <= max_distance).then_some(point)
    }
}

fn flatten(point: Vec3) -> Vec3 {
    Vec3::new(point.x, 0.0, point.z)
}

/// Agent factory that only tracks which agents are alive.
#[derive(Debug, Default)]
pub(crate) struct HeadlessFactory {
    next: u64,
    live: BTreeMap<AgentHandle, String>,
}

impl HeadlessFactory {
    /// Number of agents spawned and not yet despawned.
    pub(crate) fn live(&self) -> usize {
        self.live.len()
    }
}

impl AgentFactory for HeadlessFactory {
    fn spawn(
        &mut self,
        template: &AgentTemplate,
        position: Vec3,
        _forward: Vec3,
        profile: &SpawnProfile,
    ) -> AgentHandle {
        self.next += 1;
        let handle = AgentHandle::new(self.next);
        tracing::debug!(
            agent = handle.get(),
            template = template.name(),
            elite = profile.elite,
            health = profile.health_multiplier,
            x = position.x,
            z = position.z,
            "spawn"
        );
        let _ = self.live.insert(handle, template.name().to_owned());
        handle
    }

    fn despawn(&mut self, agent: AgentHandle) {
        match self.live.remove(&agent) {
            Some(template) => tracing::debug!(agent = agent.get(), %template, "despawn"),
            None => tracing::warn!(agent = agent.get(), "despawn of unknown agent"),
        }
    }
}

#[cfg(test)]
mod tests {
    use gauntlet_core::SpawnCategory;

    use super::*;

    fn ground() -> FlatGround {
        FlatGround {
            half_extent: 20.0,
            blocked: vec![BlockedArea {
                center: Vec3::new(5.0, 3.0, 0.0),
                radius: 2.0,
            }],
        }
    }

    #[test]
    fn open_ground_snaps_to_the_plane() {
        let point = ground().sample_nearest(Vec3::new(-4.0, 7.0, 3.0), 1.0);
        assert_eq!(point, Some(Vec3::new(-4.0, 0.0, 3.0)));
    }

    #[test]
    fn holes_push_points_to_their_rim() {
        let point = ground()
            .sample_nearest(Vec3::new(6.0, 0.0, 0.0), 2.0)
            .expect("rim within reach");
        assert!((point.x - 7.0).abs() < 1e-4);
        assert_eq!(ground().sample_nearest(Vec3::new(6.0, 0.0, 0.0), 0.5), None);
    }

    #[test]
    fn far_outside_the_plane_is_unreachable() {
        assert_eq!(ground().sample_nearest(Vec3::new(40.0, 0.0, 0.0), 10.0), None);
        assert!(ground()
            .sample_nearest(Vec3::new(25.0, 0.0, 0.0), 10.0)
            .is_some());
    }

    #[test]
    fn factory_tracks_live_agents() {
        let mut factory = HeadlessFactory::default();
        let profile = SpawnProfile {
            category: SpawnCategory::Enemy,
            elite: false,
            health_multiplier: 1.0,
            damage_multiplier: 1.0,
        };
        let first = factory.spawn(&AgentTemplate::new("grunt"), Vec3::ZERO, Vec3::Z, &profile);
        let second = factory.spawn(&AgentTemplate::new("grunt"), Vec3::X, Vec3::Z, &profile);
        assert_ne!(first, second);
        factory.despawn(first);
        assert_eq!(factory.live(), 1);
    }
}
