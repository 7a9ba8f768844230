use common::{BookingId, SagaId};
use thiserror::Error;

/// Errors that can occur when persisting saga state.
#[derive(Debug, Error)]
pub enum SagaStoreError {
    /// The saga instance was not found.
    #[error("Saga not found: {0}")]
    SagaNotFound(SagaId),

    /// No saga instance exists for this booking.
    #[error("No saga for booking: {0}")]
    NoSagaForBooking(BookingId),

    /// A saga instance already exists for this saga ID.
    #[error("Saga already exists: {0}")]
    DuplicateSaga(SagaId),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored state name could not be parsed.
    #[error("Corrupt state column: {0}")]
    CorruptState(#[from] crate::state::ParseSagaStateError),
}

/// Result type for saga store operations.
pub type Result<T> = std::result::Result<T, SagaStoreError>;
