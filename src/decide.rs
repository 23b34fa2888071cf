//! Decision generation (spec §4.6): convert each leaf's signed balance
//! into merge groups and clone counts.

use std::collections::HashSet;

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use crate::error::RegionTreeError;
use crate::mergeable;
use crate::region_tree::RegionTree;

/// `merge_groups[k]` holds the indices squashed into walker `k`;
/// `clones[k]` is the number of *extra* clones to make of walker `k`.
pub struct Settlement {
    pub merge_groups: Vec<Vec<usize>>,
    pub clones: Vec<usize>,
}

/// Realize every leaf's balance into merge groups and clone counts
/// (spec §4.6). Negative-balance leaves are settled first so that
/// clone decisions can reuse the slots they free up.
pub fn settle_balances<I: Clone, R: Rng>(
    tree: &RegionTree<I>,
    delta_walkers: i64,
    rng: &mut R,
) -> Result<Settlement, RegionTreeError> {
    let n_walkers = tree.walker_weights().len();
    let mut merge_groups: Vec<Vec<usize>> = vec![Vec::new(); n_walkers];
    let mut clones: Vec<usize> = vec![0; n_walkers];

    let leaves = tree.leaf_nodes();

    for leaf in &leaves {
        let balance = tree.node(leaf).expect("leaf must exist").balance;
        if balance < 0 {
            decide_merge_leaf(tree, leaf, balance, &mut merge_groups, rng)?;
        }
    }

    for leaf in &leaves {
        let balance = tree.node(leaf).expect("leaf must exist").balance;
        if balance > 0 {
            decide_clone_leaf(tree, leaf, balance, &merge_groups, &mut clones)?;
        }
    }

    let total_clones: i64 = clones.iter().map(|&c| c as i64).sum();
    let total_squashed: i64 = merge_groups.iter().map(|g| g.len() as i64).sum();
    if total_clones - total_squashed != delta_walkers {
        return Err(RegionTreeError::invariant(format!(
            "clones ({total_clones}) minus squashed ({total_squashed}) != delta_walkers ({delta_walkers})"
        )));
    }

    Ok(Settlement { merge_groups, clones })
}

fn decide_merge_leaf<I: Clone, R: Rng>(
    tree: &RegionTree<I>,
    leaf: &crate::region_tree::NodeId,
    balance: i64,
    merge_groups: &mut [Vec<usize>],
    rng: &mut R,
) -> Result<(), RegionTreeError> {
    let pmax = tree.config().pmax;
    let leaf_state = tree.node(leaf).expect("leaf must exist");
    let need = (-balance) as usize;

    let mut by_weight: Vec<(usize, f64)> =
        leaf_state.walker_idxs.iter().map(|&idx| (idx, tree.walker_weights()[idx])).collect();
    by_weight.sort_by(|a, b| a.1.total_cmp(&b.1));

    let num_to_choose = need + 1;
    if by_weight.len() < num_to_choose {
        return Err(RegionTreeError::invariant(format!(
            "leaf has {} walkers, needs {} to satisfy a merge of size {}",
            by_weight.len(),
            num_to_choose,
            need
        )));
    }
    let chosen = &by_weight[..num_to_choose];
    let sum_weight: f64 = chosen.iter().map(|&(_, w)| w).sum();
    if sum_weight > pmax {
        return Err(RegionTreeError::invariant(format!(
            "merge group weight {sum_weight} exceeds pmax {pmax}"
        )));
    }

    let weights: Vec<f64> = chosen.iter().map(|&(_, w)| w).collect();
    let dist = WeightedIndex::new(&weights)
        .map_err(|e| RegionTreeError::invariant(format!("could not build weighted choice: {e}")))?;
    let keeper_pos = dist.sample(rng);
    let keeper_idx = chosen[keeper_pos].0;

    for (pos, &(idx, _)) in chosen.iter().enumerate() {
        if pos != keeper_pos {
            merge_groups[keeper_idx].push(idx);
        }
    }

    Ok(())
}

fn decide_clone_leaf<I: Clone>(
    tree: &RegionTree<I>,
    leaf: &crate::region_tree::NodeId,
    balance: i64,
    merge_groups: &[Vec<usize>],
    clones: &mut [usize],
) -> Result<(), RegionTreeError> {
    let pmin = tree.config().pmin;
    let max_num_walkers = tree.config().max_num_walkers;
    let need = balance as usize;

    let squashed: HashSet<usize> = merge_groups.iter().flatten().copied().collect();
    let is_taken = |idx: usize| squashed.contains(&idx) || !merge_groups[idx].is_empty();

    let leaf_state = tree.node(leaf).expect("leaf must exist");
    let weights = tree.walker_weights();

    let candidates: Vec<usize> = leaf_state
        .walker_idxs
        .iter()
        .copied()
        .filter(|&idx| weights[idx] / 2.0 >= pmin && !is_taken(idx))
        .collect();

    let max_clones: Vec<usize> =
        candidates.iter().map(|&idx| mergeable::max_n_clones_one(weights[idx], pmin, max_num_walkers)).collect();
    let total_capacity: usize = max_clones.iter().sum();
    if total_capacity < need {
        return Err(RegionTreeError::capacity(format!(
            "leaf can clone at most {total_capacity} walkers without violating pmin, needs {need}"
        )));
    }

    for _ in 0..need {
        let mut best_idx: Option<usize> = None;
        let mut best_weight = f64::NEG_INFINITY;
        for &idx in &candidates {
            let effective = weights[idx] / (clones[idx] as f64 + 2.0);
            let effective = if effective < pmin { f64::NEG_INFINITY } else { effective };
            if effective >= best_weight {
                best_weight = effective;
                best_idx = Some(idx);
            }
        }
        let Some(chosen) = best_idx.filter(|_| best_weight.is_finite()) else {
            return Err(RegionTreeError::capacity(
                "all cloneable candidates would fall below pmin for another clone".to_string(),
            ));
        };
        clones[chosen] += 1;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::Walker;
    use crate::region_tree::RegionTreeConfig;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    struct Toy;
    impl crate::distance::DistanceMetric for Toy {
        type State = f64;
        type Image = f64;
        type Error = std::convert::Infallible;
        fn image(&self, state: &f64) -> Result<f64, Self::Error> {
            Ok(*state)
        }
        fn image_distance(&self, a: &f64, b: &f64) -> Result<f64, Self::Error> {
            Ok((a - b).abs())
        }
    }

    fn one_leaf_tree(weights: &[f64], pmax: f64, pmin: f64) -> RegionTree<f64> {
        let config = RegionTreeConfig {
            max_n_regions: vec![1],
            max_region_sizes: vec![f64::INFINITY],
            pmin,
            pmax,
            max_num_walkers: 100,
            min_num_walkers: 1,
        };
        let mut tree = RegionTree::new(config, 0.0);
        let walkers: Vec<Walker<f64>> = weights.iter().map(|&w| Walker::new(0.0, w)).collect();
        tree.place_walkers(&Toy, &walkers).unwrap();
        tree
    }

    #[test]
    fn merge_four_equal_weights() {
        let mut tree = one_leaf_tree(&[0.1, 0.1, 0.1, 0.1], 0.5, 1e-12);
        crate::balance::balance_tree(&mut tree, -1).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        let settlement = settle_balances(&tree, -1, &mut rng).unwrap();
        let total_squashed: usize = settlement.merge_groups.iter().map(Vec::len).sum();
        assert_eq!(total_squashed, 1);
    }

    #[test]
    fn clone_two_equal_weights() {
        let mut tree = one_leaf_tree(&[0.4, 0.4], 0.5, 1e-12);
        crate::balance::balance_tree(&mut tree, 1).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let settlement = settle_balances(&tree, 1, &mut rng).unwrap();
        assert_eq!(settlement.clones.iter().sum::<usize>(), 1);
    }

    #[test]
    fn capacity_error_when_cannot_clone_without_violating_pmin() {
        // Single walker, single leaf: max_num_walkers=1 means it cannot
        // be split at all, so a leaf balance of +1 is unsatisfiable.
        let mut tree = one_leaf_tree(&[0.4], 0.9, 0.3);
        tree.node_mut(&crate::region_tree::NodeId::root().child(0)).unwrap().balance = 1;
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        let err = settle_balances(&tree, 1, &mut rng).unwrap_err();
        assert!(matches!(err, RegionTreeError::Capacity { .. }));
    }
}
