// ⚠️ Error taxonomy
// Every fallible library operation returns SeedResult<T>

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SeedError {
    /// Invalid input parameters. Raised before any I/O happens.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A reference (wallet owner, transaction endpoint) does not resolve,
    /// or a uniqueness constraint was violated.
    #[error("referential integrity violation: {entity} '{id}' -> '{reference}'")]
    ReferentialIntegrity {
        entity: &'static str,
        id: String,
        reference: String,
    },

    /// A record breaks a data rule (positive amount, distinct endpoints,
    /// positive rate, non-negative balance).
    #[error("invalid {entity} '{id}': {rule}")]
    InvalidRecord {
        entity: &'static str,
        id: String,
        rule: String,
    },

    /// Store or endpoint unreachable.
    #[error("connection error: {0}")]
    Connection(String),

    /// Malformed interchange data on write or read-back.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Any other store failure.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),
}

pub type SeedResult<T> = Result<T, SeedError>;

impl SeedError {
    pub fn config(msg: impl Into<String>) -> Self {
        SeedError::Configuration(msg.into())
    }

    pub fn serialization(msg: impl Into<String>) -> Self {
        SeedError::Serialization(msg.into())
    }

    /// Short category name, used in log fields.
    pub fn category(&self) -> &'static str {
        match self {
            SeedError::Configuration(_) => "configuration",
            SeedError::ReferentialIntegrity { .. } => "referential_integrity",
            SeedError::InvalidRecord { .. } => "invalid_record",
            SeedError::Connection(_) => "connection",
            SeedError::Serialization(_) => "serialization",
            SeedError::Storage(_) => "storage",
        }
    }
}

impl From<serde_json::Error> for SeedError {
    fn from(e: serde_json::Error) -> Self {
        SeedError::Serialization(e.to_string())
    }
}

impl From<csv::Error> for SeedError {
    fn from(e: csv::Error) -> Self {
        SeedError::Serialization(e.to_string())
    }
}
