//! Error types for continuous contract construction.

use chrono::NaiveDate;
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for continuous contract construction.
#[derive(Error, Debug)]
pub enum Error {
    /// Unknown product, month code or contract symbol.
    #[error("Unknown contract: {0}")]
    UnknownContract(String),

    /// The active contract has no usable bar on an expected trading date.
    #[error("Missing data for {symbol} on {date}")]
    MissingContractData { symbol: String, date: NaiveDate },

    /// A roll was required but no eligible next contract exists.
    #[error("No next contract to roll into from {symbol} on {date}")]
    NoNextContract { symbol: String, date: NaiveDate },

    /// Roll configuration mixes criteria without a tie-break.
    #[error("Ambiguous roll configuration: {0}")]
    AmbiguousRoll(String),

    /// Non-positive price fed into ratio adjustment.
    #[error("Invalid adjustment input: {symbol} priced {price} on {date}")]
    InvalidAdjustmentInput {
        symbol: String,
        date: NaiveDate,
        price: f64,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data error reported by an external collaborator.
    #[error("Data error: {0}")]
    Data(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an unknown contract error.
    pub fn unknown_contract(msg: impl Into<String>) -> Self {
        Error::UnknownContract(msg.into())
    }

    /// Create a missing contract data error.
    pub fn missing_data(symbol: impl Into<String>, date: NaiveDate) -> Self {
        Error::MissingContractData {
            symbol: symbol.into(),
            date,
        }
    }

    /// Create a no next contract error.
    pub fn no_next_contract(symbol: impl Into<String>, date: NaiveDate) -> Self {
        Error::NoNextContract {
            symbol: symbol.into(),
            date,
        }
    }

    /// Create an ambiguous roll error.
    pub fn ambiguous_roll(msg: impl Into<String>) -> Self {
        Error::AmbiguousRoll(msg.into())
    }

    /// Create an invalid adjustment input error.
    pub fn invalid_adjustment(symbol: impl Into<String>, date: NaiveDate, price: f64) -> Self {
        Error::InvalidAdjustmentInput {
            symbol: symbol.into(),
            date,
            price,
        }
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a data error.
    pub fn data(msg: impl Into<String>) -> Self {
        Error::Data(msg.into())
    }

    /// Date the error refers to, when it is tied to one.
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            Error::MissingContractData { date, .. }
            | Error::NoNextContract { date, .. }
            | Error::InvalidAdjustmentInput { date, .. } => Some(*date),
            _ => None,
        }
    }
}
