#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Spawn point pool that distributes a zone's anchors across spawn items.
//!
//! Items are resolved strictly in authoring order so that earlier items win
//! when anchors are scarce. Each item draws from the first applicable source:
//! its own explicit anchors, a scatter disc around the zone centre, the zone
//! group whose name matches the item, or the zone's shared pool. Zone anchors
//! are claimed at most once per allocation pass.

use std::f32::consts::TAU;

use gauntlet_core::{
    AllocationSource, SpawnAllocation, SpawnAnchor, SpawnItem, SpawnSummary, Vec3, MAX_SPAWN_COUNT,
};
use rand::{seq::index, Rng};

/// Strength of a match between a spawn item name and an anchor group name.
///
/// Variants are ordered from strongest to weakest.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GroupMatch {
    /// Names are equal ignoring case.
    Exact,
    /// One name starts or ends with the other.
    Affix,
    /// One name contains the other.
    Substring,
}

/// Classifies how `item_name` relates to `group_name`, ignoring case.
#[must_use]
pub fn match_group(item_name: &str, group_name: &str) -> Option<GroupMatch> {
    let item = item_name.trim().to_lowercase();
    let group = group_name.trim().to_lowercase();
    if item.is_empty() || group.is_empty() {
        return None;
    }

    if item == group {
        return Some(GroupMatch::Exact);
    }

    let affix = item.starts_with(&group)
        || item.ends_with(&group)
        || group.starts_with(&item)
        || group.ends_with(&item);
    if affix {
        return Some(GroupMatch::Affix);
    }

    if item.contains(&group) || group.contains(&item) {
        return Some(GroupMatch::Substring);
    }

    None
}

/// Aggregates allocation counts. Placement counts are left at zero.
#[must_use]
pub fn summarize(allocations: &[SpawnAllocation]) -> SpawnSummary {
    let mut summary = SpawnSummary::default();
    for allocation in allocations {
        summary.items = summary.items.saturating_add(1);
        summary.requested = summary.requested.saturating_add(allocation.requested);
        summary.allocated = summary.allocated.saturating_add(allocation.granted());
        if allocation.is_under_allocated() {
            summary.under_allocated_items = summary.under_allocated_items.saturating_add(1);
        }
    }
    summary
}

#[derive(Clone, Debug)]
struct AnchorGroup {
    name: String,
    members: Vec<usize>,
}

/// Anchor allocator that reuses scratch buffers between activations.
#[derive(Debug, Default)]
pub struct SpawnPointPool {
    claimed: Vec<bool>,
    groups: Vec<AnchorGroup>,
    candidates: Vec<usize>,
}

impl SpawnPointPool {
    /// Creates a pool with empty scratch buffers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates `anchors` to `items` in authoring order.
    ///
    /// `center` is the origin of the scatter disc used by items that carry a
    /// spawn radius but no explicit anchors. Items whose request cannot be met
    /// receive whatever remains and are reported as under-allocated.
    pub fn allocate<R>(
        &mut self,
        items: &[SpawnItem],
        anchors: &[SpawnAnchor],
        center: Vec3,
        rng: &mut R,
    ) -> Vec<SpawnAllocation>
    where
        R: Rng + ?Sized,
    {
        self.prepare(anchors);

        let mut allocations = Vec::with_capacity(items.len());
        for (item_index, item) in items.iter().enumerate() {
            let requested = sample_count(item, rng);
            let (source, granted) = self.resolve_item(item, requested, anchors, center, rng);

            let allocation = SpawnAllocation {
                item_index,
                item_name: item.name().to_owned(),
                requested,
                anchors: granted,
                source,
            };

            if allocation.is_under_allocated() {
                tracing::warn!(
                    item = item.name(),
                    requested,
                    granted = allocation.granted(),
                    ?source,
                    "spawn pool exhausted, item under-allocated"
                );
            } else {
                tracing::debug!(
                    item = item.name(),
                    requested,
                    ?source,
                    "spawn item allocated"
                );
            }

            allocations.push(allocation);
        }

        allocations
    }

    fn prepare(&mut self, anchors: &[SpawnAnchor]) {
        self.claimed.clear();
        self.claimed.resize(anchors.len(), false);
        self.groups.clear();

        for (index, anchor) in anchors.iter().enumerate() {
            let Some(group) = anchor.group() else {
                continue;
            };
            let name = group.trim().to_lowercase();
            if name.is_empty() {
                continue;
            }

            match self.groups.iter_mut().find(|existing| existing.name == name) {
                Some(existing) => existing.members.push(index),
                None => self.groups.push(AnchorGroup {
                    name,
                    members: vec![index],
                }),
            }
        }
    }

    fn resolve_item<R>(
        &mut self,
        item: &SpawnItem,
        requested: u32,
        anchors: &[SpawnAnchor],
        center: Vec3,
        rng: &mut R,
    ) -> (AllocationSource, Vec<SpawnAnchor>)
    where
        R: Rng + ?Sized,
    {
        let wanted = usize::try_from(requested).unwrap_or(usize::MAX);

        if !item.anchors().is_empty() {
            let granted = item.anchors().iter().take(wanted).cloned().collect();
            return (AllocationSource::Explicit, granted);
        }

        if let Some(radius) = item.spawn_radius() {
            let granted = (0..wanted)
                .map(|_| scatter_anchor(center, radius, rng))
                .collect();
            return (AllocationSource::Radius, granted);
        }

        if let Some(group_index) = self.select_group(item.name()) {
            self.candidates.clear();
            for &member in &self.groups[group_index].members {
                if !self.claimed[member] {
                    self.candidates.push(member);
                }
            }
            self.candidates.truncate(wanted);
            let granted = self.claim_candidates(anchors);
            return (AllocationSource::NamedGroup, granted);
        }

        self.candidates.clear();
        let unclaimed: Vec<usize> = (0..anchors.len())
            .filter(|&anchor| !self.claimed[anchor])
            .collect();
        let amount = wanted.min(unclaimed.len());
        if amount > 0 {
            for picked in index::sample(rng, unclaimed.len(), amount) {
                self.candidates.push(unclaimed[picked]);
            }
            self.candidates.sort_unstable();
        }
        let granted = self.claim_candidates(anchors);
        (AllocationSource::SharedPool, granted)
    }

    fn select_group(&self, item_name: &str) -> Option<usize> {
        let mut best: Option<(GroupMatch, usize)> = None;
        for (index, group) in self.groups.iter().enumerate() {
            let Some(strength) = match_group(item_name, &group.name) else {
                continue;
            };
            let replace = match best {
                None => true,
                Some((current, _)) => strength < current,
            };
            if replace {
                best = Some((strength, index));
            }
        }
        best.map(|(_, index)| index)
    }

    fn claim_candidates(&mut self, anchors: &[SpawnAnchor]) -> Vec<SpawnAnchor> {
        let mut granted = Vec::with_capacity(self.candidates.len());
        for &candidate in &self.candidates {
            debug_assert!(!self.claimed[candidate], "anchor claimed twice");
            self.claimed[candidate] = true;
            granted.push(anchors[candidate].clone());
        }
        self.candidates.clear();
        granted
    }
}

fn sample_count<R>(item: &SpawnItem, rng: &mut R) -> u32
where
    R: Rng + ?Sized,
{
    let min = item.min_count().min(MAX_SPAWN_COUNT);
    let max = item.max_count().clamp(min, MAX_SPAWN_COUNT);
    if min == max {
        return min;
    }
    rng.gen_range(min..=max)
}

fn scatter_anchor<R>(center: Vec3, radius: f32, rng: &mut R) -> SpawnAnchor
where
    R: Rng + ?Sized,
{
    let angle = rng.gen_range(0.0..TAU);
    let distance = radius.max(0.0) * rng.gen::<f32>().sqrt();
    let position = center + Vec3::new(angle.cos() * distance, 0.0, angle.sin() * distance);
    let facing = (center - position).normalize_or_zero();
    let forward = if facing == Vec3::ZERO { Vec3::Z } else { facing };
    SpawnAnchor::new(position, forward)
}
