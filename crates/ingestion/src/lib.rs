//! Raw data access and contract resolution for continuous futures construction.
//!
//! This crate handles:
//! - Capability traits for the external raw bar source and spec registry
//! - Contract symbol resolution and expiration calendars
//! - Grouping raw bars by trading date and flagging ordering violations

pub mod book;
pub mod resolver;
pub mod source;

pub use book::{ContractBook, ContractHistory, DailyStat};
pub use resolver::{ContractResolver, ResolvedContract};
pub use source::{InMemoryBarSource, RawBarSource, SpecRegistry, StaticSpecRegistry};
