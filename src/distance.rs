//! External collaborators: the distance metric and the walker record.
//!
//! Neither of these is implemented by this crate. The distance metric
//! is modeled as a trait so that it can be injected (spec §9
//! "Polymorphism": model as an interface/abstraction, not inheritance),
//! matching `wepy`'s `Distance` base class which `WExploreResampler` is
//! constructed with.

use std::error::Error as StdError;

/// Projects a walker's state to an "image" and measures distances
/// between images. Both operations are pure and side-effect free.
pub trait DistanceMetric {
    /// State representation of a walker. Opaque to this crate.
    type State;
    /// Projection of a state. Fixed shape/dtype after the first call,
    /// per spec §6.
    type Image: Clone;
    /// Error raised by either operation; propagated unchanged by the
    /// resampler as `RegionTreeError::Assignment`.
    type Error: StdError + Send + Sync + 'static;

    /// Project a state to its image.
    fn image(&self, state: &Self::State) -> Result<Self::Image, Self::Error>;

    /// Distance between two images. Must return a finite value `>= 0`.
    fn image_distance(&self, a: &Self::Image, b: &Self::Image) -> Result<f64, Self::Error>;
}

/// A weighted replica of the simulated system.
#[derive(Debug, Clone, PartialEq)]
pub struct Walker<S> {
    pub state: S,
    pub weight: f64,
}

impl<S> Walker<S> {
    pub fn new(state: S, weight: f64) -> Self {
        Self { state, weight }
    }
}
