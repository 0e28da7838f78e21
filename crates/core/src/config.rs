//! Configuration structures for continuous contract construction.
//!
//! Configuration is always passed explicitly; nothing here is global state.

use serde::{Deserialize, Serialize};

use crate::types::{AdjustmentDirection, AdjustmentMethod, PriceReference, Tenor};

/// Batch-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Products to build (e.g., ["ES", "CL"]).
    pub products: Vec<String>,
    /// Tenors to build for every product.
    pub tenors: Vec<Tenor>,
    /// Roll criterion configuration.
    pub roll: RollConfig,
    /// Adjustment configuration.
    pub adjustment: AdjustmentConfig,
    /// Concurrent product builds, sized to the raw bar source's I/O limit.
    pub workers: u32,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            products: vec!["ES".to_string()],
            tenors: vec![0],
            roll: RollConfig::default(),
            adjustment: AdjustmentConfig::default(),
            workers: 4,
        }
    }
}

/// Roll criterion configuration.
///
/// Exactly one of the three criteria must be set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollConfig {
    /// Calendar rule: business days before expiration.
    pub days_before_expiry: Option<u32>,
    /// Volume crossover trailing window (trading days).
    pub volume_window: Option<usize>,
    /// Open-interest crossover trailing window (trading days).
    pub open_interest_window: Option<usize>,
    /// Calendar safety net used by the crossover rules.
    pub fallback_days_before_expiry: u32,
}

impl Default for RollConfig {
    fn default() -> Self {
        Self {
            days_before_expiry: Some(5),
            volume_window: None,
            open_interest_window: None,
            fallback_days_before_expiry: 2,
        }
    }
}

/// Price adjustment configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjustmentConfig {
    pub method: AdjustmentMethod,
    pub direction: AdjustmentDirection,
    /// Incoming contract price used for roll events.
    pub reference: PriceReference,
}
