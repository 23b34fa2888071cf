//! Top-level resampler orchestration (spec §4.8): wires assignment,
//! balance propagation, and decision generation into one resampling
//! cycle, and turns the realized actions into the next walker ensemble.

use log::debug;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::action::{self, DecisionKind};
use crate::balance;
use crate::decide;
use crate::distance::{DistanceMetric, Walker};
use crate::error::{ConfigError, RegionTreeError};
use crate::region_tree::{BranchRecord, NodeId, RegionTree, RegionTreeConfig};

/// One record per walker per resampling step (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResamplingRecord {
    pub decision_id: usize,
    pub target_idxs: Vec<usize>,
    pub step_idx: u64,
    pub walker_idx: usize,
    pub region_assignment: NodeId,
}

/// One record per new branch created this cycle (spec §6).
pub type ResamplerRecord<I> = BranchRecord<I>;

/// Adaptive WExplore resampler (spec §4.8): owns a region tree and a
/// seeded RNG across cycles so that keeper selection stays reproducible.
pub struct WExploreResampler<D: DistanceMetric> {
    tree: RegionTree<D::Image>,
    distance: D,
    rng: ChaCha8Rng,
    step_idx: u64,
}

impl<D: DistanceMetric> WExploreResampler<D> {
    /// Construct a resampler with a single-spine tree seeded from
    /// `init_state`'s image.
    pub fn new(config: RegionTreeConfig, distance: D, init_state: &D::State, seed: u64) -> Result<Self, ConfigError> {
        config.validate()?;
        let init_image = distance.image(init_state).map_err(|e| ConfigError::MissingOrInvalidParameter {
            message: format!("could not project init_state: {e}"),
        })?;
        let tree = RegionTree::new(config, init_image);
        Ok(Self { tree, distance, rng: ChaCha8Rng::seed_from_u64(seed), step_idx: 0 })
    }

    pub fn tree(&self) -> &RegionTree<D::Image> {
        &self.tree
    }

    /// Run one full resampling cycle: assign, branch, balance, decide,
    /// and apply (spec §4.8). On any error the cycle is abandoned and
    /// the tree's per-cycle bookkeeping is left for the next call's
    /// `place_walkers` to clear.
    pub fn resample(
        &mut self,
        walkers: &[Walker<D::State>],
        delta_walkers: i64,
    ) -> Result<(Vec<Walker<D::State>>, Vec<ResamplingRecord>, Vec<ResamplerRecord<D::Image>>), RegionTreeError>
    where
        D::State: Clone,
    {
        debug!("cycle {}: {} walkers in, delta_walkers={delta_walkers}", self.step_idx, walkers.len());

        let branches = self.tree.place_walkers(&self.distance, walkers)?;
        balance::balance_tree(&mut self.tree, delta_walkers)?;
        let settlement = decide::settle_balances(&self.tree, delta_walkers, &mut self.rng)?;
        let actions = action::realize(&settlement, walkers.len())?;

        let n_next = walkers.len() as i64 + delta_walkers;
        if n_next < 0 {
            return Err(RegionTreeError::invariant(format!("delta_walkers {delta_walkers} would empty the ensemble")));
        }
        let mut new_walkers: Vec<Option<Walker<D::State>>> = (0..n_next as usize).map(|_| None).collect();
        let mut resampling_records = Vec::with_capacity(actions.len());

        for (decision_id, act) in actions.iter().enumerate() {
            let walker_idx = act.walker_idx;
            let weight = match act.decision {
                DecisionKind::Nothing => walkers[walker_idx].weight,
                DecisionKind::KeepMerge => {
                    let group_sum: f64 =
                        settlement.merge_groups[walker_idx].iter().map(|&idx| walkers[idx].weight).sum();
                    walkers[walker_idx].weight + group_sum
                }
                DecisionKind::Squash => 0.0,
                DecisionKind::Clone => walkers[walker_idx].weight / act.target_idxs.len() as f64,
            };

            for &slot in &act.target_idxs {
                new_walkers[slot] = Some(Walker::new(walkers[walker_idx].state.clone(), weight));
            }

            resampling_records.push(ResamplingRecord {
                decision_id,
                target_idxs: act.target_idxs.clone(),
                step_idx: self.step_idx,
                walker_idx,
                region_assignment: self.tree.walker_assignments()[walker_idx].clone(),
            });
        }

        let new_walkers: Vec<Walker<D::State>> = new_walkers
            .into_iter()
            .enumerate()
            .map(|(slot, w)| {
                w.ok_or_else(|| RegionTreeError::invariant(format!("target slot {slot} was never filled")))
            })
            .collect::<Result<_, _>>()?;

        self.step_idx += 1;
        debug!("cycle {} done: {} new branches, {} walkers out", self.step_idx - 1, branches.len(), new_walkers.len());

        Ok((new_walkers, resampling_records, branches))
    }
}
