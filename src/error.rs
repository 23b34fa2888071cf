//! Error taxonomy for the resampler core.
//!
//! `ConfigError` is raised at construction time; `RegionTreeError` is
//! raised by a single resampling cycle and is always fatal for that
//! cycle (see spec §4.9 / §7). The core never silently adjusts
//! `delta_walkers`, drops walkers, or normalizes weights outside
//! `[pmin, pmax]` -- every such situation becomes one of these variants
//! instead.

use std::error::Error as StdError;

/// Raised when a `RegionTreeConfig` or resampler is constructed with
/// missing or invalid parameters.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing or invalid parameter: {message}")]
    MissingOrInvalidParameter { message: String },
}

/// Fatal error raised during a single resampling cycle. All variants
/// abort the current cycle; none of them are recoverable locally.
#[derive(Debug, thiserror::Error)]
pub enum RegionTreeError {
    /// The distance metric raised an error, or its inputs were malformed.
    #[error("assignment failed: {0}")]
    Assignment(#[source] Box<dyn StdError + Send + Sync>),

    /// A parent could not dispense its debit or credit among its
    /// children given their mergeable/cloneable capacities.
    #[error("capacity error: {message}")]
    Capacity { message: String },

    /// A conservation invariant failed: leaf balances didn't sum to
    /// `delta_walkers`, a merge group exceeded `pmax`, or a clone would
    /// produce a sub-`pmin` walker.
    #[error("invariant violated: {message}")]
    Invariant { message: String },

    /// The same target slot was assigned twice, or a walker already in
    /// a merge group was also assigned clones.
    #[error("decision conflict: {message}")]
    DecisionConflict { message: String },
}

impl RegionTreeError {
    pub fn assignment<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        RegionTreeError::Assignment(Box::new(err))
    }

    pub fn capacity(message: impl Into<String>) -> Self {
        RegionTreeError::Capacity { message: message.into() }
    }

    pub fn invariant(message: impl Into<String>) -> Self {
        RegionTreeError::Invariant { message: message.into() }
    }

    pub fn decision_conflict(message: impl Into<String>) -> Self {
        RegionTreeError::DecisionConflict { message: message.into() }
    }
}
