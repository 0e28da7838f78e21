//! Continuous series construction.
//!
//! This crate handles:
//! - Splicing raw contract bars along a roll schedule
//! - Ratio and additive back-adjustment with an audit trail
//! - Per-product orchestration over the raw bar source and spec registry
//! - Parallel builds of independent products

pub mod adjust;
pub mod batch;
pub mod builder;
pub mod splice;

#[cfg(test)]
mod testutil;

pub use adjust::{AdjustedSeries, PriceAdjuster};
pub use batch::build_batch;
pub use builder::{BuildReport, BuildRequest, ContinuousContractBuilder, TenorOutcome};
pub use splice::{SeriesSplicer, SplicedSeries};
