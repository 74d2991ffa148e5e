//! Error types for wifid.

use std::io;
use thiserror::Error;

use crate::config::transaction::Field;

/// Errors reported by the radio driver.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RadioError {
    #[error("Scan failed: {0}")]
    ScanFailed(String),

    #[error("Failed to apply settings: {0}")]
    Apply(String),
}

/// Per-field validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid number: {0:?}")]
    NotANumber(String),

    #[error("Operating mode {0} is not one of 1 (Client), 2 (AP only), 3 (Client+AP)")]
    BadOpMode(i64),

    #[error("Transmit power {0} out of allowed range 0-82")]
    TxPowerOutOfRange(i64),

    #[error("Channel {0} out of allowed range 1-14")]
    ChannelOutOfRange(i64),

    #[error("SSID is empty")]
    EmptySsid,

    #[error("Password length {0} must be 0 or between 8 and 62")]
    BadPasswordLength(usize),
}

/// Errors from the configuration persistence layer.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Reasons a configuration transaction does not commit.
#[derive(Debug, Error)]
pub enum CommitError {
    /// One or more fields failed validation, in processing order.
    #[error("Rejected fields: {}", join_fields(.0))]
    Rejected(Vec<Field>),

    #[error("Failed to persist configuration: {0}")]
    Persist(#[from] PersistError),
}

impl CommitError {
    /// The rejected field names, empty unless validation failed.
    pub fn rejected(&self) -> &[Field] {
        match self {
            CommitError::Rejected(fields) => fields,
            CommitError::Persist(_) => &[],
        }
    }
}

/// Comma-joined field names, as used in error redirects.
pub fn join_fields(fields: &[Field]) -> String {
    fields
        .iter()
        .map(|f| f.as_str())
        .collect::<Vec<_>>()
        .join(",")
}

/// Unknown field name passed to a configuration transaction.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown configuration field: {0}")]
pub struct UnknownField(pub String);
