//! Action realization (spec §4.7): turn a settlement into a concrete
//! per-walker decision plus a bijective target-slot assignment.

use crate::decide::Settlement;
use crate::error::RegionTreeError;

/// What happens to walker `k` this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DecisionKind {
    Nothing,
    KeepMerge,
    Squash,
    Clone,
}

/// Per-walker realized decision, ready for the external applier.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct WalkerAction {
    pub walker_idx: usize,
    pub decision: DecisionKind,
    /// Slots in the next ensemble this walker fills. Empty for `Squash`.
    pub target_idxs: Vec<usize>,
}

/// Assign target slots in the next ensemble to every walker's decision
/// (spec §4.7). `target_idxs` forms a bijection onto `0..n_next` where
/// `n_next = n_walkers + delta_walkers`.
pub fn realize(settlement: &Settlement, n_walkers: usize) -> Result<Vec<WalkerAction>, RegionTreeError> {
    let squashed: std::collections::HashSet<usize> = settlement.merge_groups.iter().flatten().copied().collect();

    let mut free_slots: Vec<usize> =
        (0..n_walkers).filter(|idx| squashed.contains(idx)).collect();
    let mut next_slot = n_walkers;
    let mut take_slot = |free_slots: &mut Vec<usize>, next_slot: &mut usize| {
        if let Some(slot) = free_slots.pop() {
            slot
        } else {
            let slot = *next_slot;
            *next_slot += 1;
            slot
        }
    };

    let mut actions = Vec::with_capacity(n_walkers);
    let mut used_slots = std::collections::HashSet::new();

    for walker_idx in 0..n_walkers {
        if squashed.contains(&walker_idx) {
            actions.push(WalkerAction { walker_idx, decision: DecisionKind::Squash, target_idxs: Vec::new() });
            continue;
        }

        let n_clones = settlement.clones[walker_idx];
        let has_merge_group = !settlement.merge_groups[walker_idx].is_empty();

        if n_clones > 0 && has_merge_group {
            return Err(RegionTreeError::decision_conflict(format!(
                "walker {walker_idx} is both a merge keeper and a clone target"
            )));
        }

        let decision = if has_merge_group {
            DecisionKind::KeepMerge
        } else if n_clones > 0 {
            DecisionKind::Clone
        } else {
            DecisionKind::Nothing
        };

        let n_slots = 1 + n_clones;
        let mut target_idxs = Vec::with_capacity(n_slots);
        // Each walker keeps its own slot, then draws any extras from
        // slots vacated by squashed walkers, then from fresh slots.
        target_idxs.push(walker_idx);
        for _ in 0..n_clones {
            target_idxs.push(take_slot(&mut free_slots, &mut next_slot));
        }

        for &slot in &target_idxs {
            if !used_slots.insert(slot) {
                return Err(RegionTreeError::decision_conflict(format!("target slot {slot} assigned twice")));
            }
        }

        actions.push(WalkerAction { walker_idx, decision, target_idxs });
    }

    Ok(actions)
}
