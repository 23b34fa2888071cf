//! Runs a handful of resampling cycles against a toy 1-D distance
//! metric, logging each cycle's branch and decision records.

use wexplore_resampler::{DistanceMetric, RegionTreeConfig, WExploreResampler, Walker};

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

fn main() {
    env_logger::init();

    let config = RegionTreeConfig {
        max_n_regions: vec![4],
        max_region_sizes: vec![0.3],
        pmin: 1e-4,
        pmax: 0.5,
        max_num_walkers: 48,
        min_num_walkers: 4,
    };

    let mut resampler = WExploreResampler::new(config, AbsoluteValue, &0.0, 2026)
        .expect("toy config is valid");

    let mut walkers = vec![
        Walker::new(0.0, 0.25),
        Walker::new(0.1, 0.25),
        Walker::new(0.9, 0.25),
        Walker::new(1.0, 0.25),
    ];

    for step in 0..5 {
        let (next, resampling_records, resampler_records) =
            resampler.resample(&walkers, 0).expect("toy cycle should not fail");

        log::info!(
            "step {step}: {} new branches, {} decisions",
            resampler_records.len(),
            resampling_records.len()
        );
        for branch in &resampler_records {
            log::info!("  branched at level {} (distance {:.3})", branch.branching_level, branch.distance);
        }

        walkers = next;
    }

    let total_weight: f64 = walkers.iter().map(|w| w.weight).sum();
    println!("final ensemble: {} walkers, total weight {total_weight:.6}", walkers.len());
}
