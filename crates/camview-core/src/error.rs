use thiserror::Error;

/// Canonical error type shared by the archive, ledger and notifier.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Entity was not found (object key, ledger record, partition).
    #[error("{entity} `{id}` was not found")]
    NotFound {
        /// Entity type name (e.g. `"object"`).
        entity: &'static str,
        /// Identifier of the missing entity.
        id: String,
    },

    /// Listing or transport failure talking to the object store.
    #[error("object store unavailable: {0}")]
    StoreUnavailable(String),

    /// The store refused a write (quota, permissions, empty key).
    #[error("write rejected for `{key}`: {message}")]
    WriteRejected {
        /// Key that was being written.
        key: String,
        /// Store-provided reason.
        message: String,
    },

    /// The ledger already holds a record for this key.
    #[error("key `{0}` is already recorded")]
    DuplicateKey(String),

    /// The outbound notification sink did not accept the message.
    #[error("notification send failed: {0}")]
    SendFailed(String),

    /// The ledger database could not be opened or queried.
    #[error("ledger unavailable: {0}")]
    LedgerUnavailable(String),

    /// Unexpected internal error occurred.
    #[error("internal error: {message}")]
    Internal {
        /// Human-readable details for debugging purposes.
        message: String,
    },

    /// I/O error occurred during file or network operations.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization error occurred.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Validation error for input data.
    #[error("validation error: {0}")]
    ValidationError(String),
}

impl CoreError {
    /// Creates a `NotFound` variant.
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Creates a `StoreUnavailable` variant.
    #[must_use]
    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::StoreUnavailable(message.into())
    }

    /// Creates a `WriteRejected` variant.
    #[must_use]
    pub fn write_rejected(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::WriteRejected {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates a `LedgerUnavailable` variant.
    #[must_use]
    pub fn ledger_unavailable(message: impl Into<String>) -> Self {
        Self::LedgerUnavailable(message.into())
    }

    /// Creates an `Internal` variant.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true for `NotFound`.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::SerializationError(err.to_string())
    }
}

/// Convenient result alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
