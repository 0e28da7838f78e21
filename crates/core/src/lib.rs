//! Core types and configuration for continuous futures construction.
//!
//! This crate provides shared types used across all other crates:
//! - Raw and continuous bar types, roll events and adjustment audits
//! - Contract specifications, month codes and expiration rules
//! - Business-day calendar helpers
//! - Configuration structures
//! - Common error types

pub mod calendar;
pub mod config;
pub mod contract;
pub mod error;
pub mod types;

pub use config::{AdjustmentConfig, BuildConfig, RollConfig};
pub use contract::{ContractSpec, ContractSymbol, ExpirationRule, ExplicitExpiry};
pub use error::{Error, Result};
pub use types::*;
