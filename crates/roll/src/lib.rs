//! Roll decisions for continuous futures construction.
//!
//! This crate handles:
//! - Roll strategies (calendar, volume crossover, open interest crossover)
//! - Trailing-window statistics backing the crossover rules
//! - Front-month scheduling and deeper-tenor schedule derivation

pub mod scheduler;
pub mod strategy;
pub mod trailing;

pub use scheduler::{RollPoint, RollSchedule, RollScheduler, RollState, ScheduleEntry, ScheduleHalt};
pub use strategy::RollStrategy;
pub use trailing::{RollMetric, TrailingWindow};
