//! Adaptive WExplore resampler for weighted-ensemble simulation.
//!
//! Maintains an online Voronoi hierarchy (the *region tree*) over a
//! configuration space, assigns a dynamically-sized ensemble of
//! weighted replicas ("walkers") to its leaves, and clones/merges
//! walkers each cycle so sampling effort stays spread evenly across
//! discovered regions while total probability is conserved.
//!
//! The molecular dynamics propagator, the distance metric's internals,
//! boundary conditions, and reporting/serialization are external
//! collaborators; this crate performs no I/O and schedules no parallel
//! work.
//!
//! ### Reference
//!
//! WExplore: Westfall CS, Dey A, Becker T, Zwier MC, Lotz SD, Carlson HA,
//! Pratt AJ. JACS (2015), adapted here into a standalone, single-threaded
//! core with an injected distance metric and a seeded RNG.

mod action;
mod balance;
mod decide;
mod distance;
mod error;
mod mergeable;
mod region_tree;
mod resampler;

pub use action::{DecisionKind, WalkerAction};
pub use decide::Settlement;
pub use distance::{DistanceMetric, Walker};
pub use error::{ConfigError, RegionTreeError};
pub use region_tree::{BranchRecord, NodeId, NodeState, RegionTree, RegionTreeConfig};
pub use resampler::{ResamplerRecord, ResamplingRecord, WExploreResampler};
