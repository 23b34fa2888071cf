//! Reproducible end-to-end scenarios (S1-S6).

use wexplore_resampler::{
    DistanceMetric, RegionTree, RegionTreeConfig, RegionTreeError, WExploreResampler, Walker,
};

struct AbsoluteValue;

impl DistanceMetric for AbsoluteValue {
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

fn one_leaf_config(pmin: f64, pmax: f64) -> RegionTreeConfig {
    RegionTreeConfig {
        max_n_regions: vec![1],
        max_region_sizes: vec![f64::INFINITY],
        pmin,
        pmax,
        max_num_walkers: 100,
        min_num_walkers: 1,
    }
}

fn total_weight(walkers: &[Walker<f64>]) -> f64 {
    walkers.iter().map(|w| w.weight).sum()
}

#[test]
fn s1_no_op() {
    let config = one_leaf_config(1e-12, 0.5);
    let mut resampler = WExploreResampler::new(config, AbsoluteValue, &0.0, 1).unwrap();
    let walkers = vec![Walker::new(0.0, 0.5), Walker::new(0.0, 0.5)];

    let (out, _records, branches) = resampler.resample(&walkers, 0).unwrap();

    assert!(branches.is_empty());
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].weight, 0.5);
    assert_eq!(out[1].weight, 0.5);
}

#[test]
fn s2_forced_merge() {
    let config = one_leaf_config(1e-12, 0.5);
    let mut resampler = WExploreResampler::new(config, AbsoluteValue, &0.0, 2).unwrap();
    let walkers = vec![Walker::new(0.0, 0.1), Walker::new(0.0, 0.1), Walker::new(0.0, 0.1), Walker::new(0.0, 0.1)];

    let (out, _records, _branches) = resampler.resample(&walkers, -1).unwrap();

    assert_eq!(out.len(), 3);
    let mut weights: Vec<f64> = out.iter().map(|w| w.weight).collect();
    weights.sort_by(f64::total_cmp);
    assert!((weights[0] - 0.1).abs() < 1e-12);
    assert!((weights[1] - 0.1).abs() < 1e-12);
    assert!((weights[2] - 0.2).abs() < 1e-12);
    assert!((total_weight(&out) - 0.4).abs() < 1e-12);
}

#[test]
fn s3_forced_clone() {
    let config = one_leaf_config(1e-12, 0.5);
    let mut resampler = WExploreResampler::new(config, AbsoluteValue, &0.0, 3).unwrap();
    let walkers = vec![Walker::new(0.0, 0.4), Walker::new(0.0, 0.4)];

    let (out, _records, _branches) = resampler.resample(&walkers, 1).unwrap();

    assert_eq!(out.len(), 3);
    let mut weights: Vec<f64> = out.iter().map(|w| w.weight).collect();
    weights.sort_by(f64::total_cmp);
    assert!((weights[0] - 0.2).abs() < 1e-12);
    assert!((weights[1] - 0.2).abs() < 1e-12);
    assert!((weights[2] - 0.4).abs() < 1e-12);
    assert!((total_weight(&out) - 0.8).abs() < 1e-12);
}

#[test]
fn s4_branching() {
    let config =
        RegionTreeConfig { max_n_regions: vec![2], max_region_sizes: vec![1.0], pmin: 1e-12, pmax: 0.5, max_num_walkers: 100, min_num_walkers: 1 };
    let mut tree = RegionTree::new(config, 0.0_f64);

    let walkers = vec![Walker::new(0.0, 0.5), Walker::new(10.0, 0.5)];
    let branches = tree.place_walkers(&AbsoluteValue, &walkers).unwrap();

    assert_eq!(branches.len(), 1);
    let leaves = tree.leaf_nodes();
    assert_eq!(leaves.len(), 2);
    for leaf in &leaves {
        assert_eq!(tree.node(leaf).unwrap().n_walkers, 1);
    }
}

#[test]
fn s5_inter_leaf_transfer() {
    let config =
        RegionTreeConfig { max_n_regions: vec![2], max_region_sizes: vec![0.5], pmin: 1e-4, pmax: 0.5, max_num_walkers: 50, min_num_walkers: 1 };
    let mut resampler = WExploreResampler::new(config, AbsoluteValue, &0.0, 5).unwrap();

    // First cycle: force a branch so a second leaf exists far away.
    let setup = vec![Walker::new(0.0, 0.5), Walker::new(10.0, 0.5)];
    let (_out, _records, branches) = resampler.resample(&setup, 0).unwrap();
    assert_eq!(branches.len(), 1);

    // Second cycle: leaf A (near 0.0) overloaded with eight light walkers,
    // leaf B (near 10.0) a single heavy walker.
    let mut walkers: Vec<Walker<f64>> = (0..8).map(|_| Walker::new(0.0, 0.05)).collect();
    walkers.push(Walker::new(10.0, 0.6));

    let (out, records, branches) = resampler.resample(&walkers, 0).unwrap();

    assert!(branches.is_empty());
    assert_eq!(out.len(), 9);
    assert!((total_weight(&out) - 1.0).abs() < 1e-9);

    // Squashed walkers get no target slots; leaf A should squash three of
    // its eight light walkers into a keeper, and leaf B's sole heavy
    // walker should clone into four slots.
    let empty_targets = records.iter().filter(|r| r.target_idxs.is_empty()).count();
    let four_slot_targets = records.iter().filter(|r| r.target_idxs.len() == 4).count();
    assert_eq!(empty_targets, 3, "leaf A should squash three walkers");
    assert_eq!(four_slot_targets, 1, "leaf B's walker should clone into four slots");
}

#[test]
fn s6_capacity_fault() {
    let config = one_leaf_config(0.5, 0.5 + 1e-9);
    let mut resampler = WExploreResampler::new(config, AbsoluteValue, &0.0, 6).unwrap();
    let walkers = vec![Walker::new(0.0, 0.5)];

    let err = resampler.resample(&walkers, 1).unwrap_err();
    assert!(matches!(err, RegionTreeError::Capacity { .. }));
}
