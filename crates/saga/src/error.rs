//! Saga orchestrator error types.

use common::{BookingId, SagaId};
use domain::BookingError;
use saga_store::{SagaState, SagaStoreError};
use thiserror::Error;

/// Errors that can occur during saga orchestration.
#[derive(Debug, Error)]
pub enum SagaError {
    /// The saga is in an invalid state for the requested operation.
    #[error("Invalid saga state for {operation}: {actual}")]
    InvalidState {
        operation: &'static str,
        actual: SagaState,
    },

    /// No saga instance exists for the incoming event.
    #[error("Saga not found: {0}")]
    SagaNotFound(SagaId),

    /// The booking referenced by the saga was not found.
    #[error("Booking not found: {0}")]
    BookingNotFound(BookingId),

    /// Command publish failure.
    #[error("Command publish error: {0}")]
    CommandPublish(String),

    /// Notification publish failure.
    #[error("Notification publish error: {0}")]
    NotificationPublish(String),

    /// Saga state store error.
    #[error("Saga store error: {0}")]
    Store(#[from] SagaStoreError),

    /// Booking record store error.
    #[error("Booking store error: {0}")]
    Booking(#[from] BookingError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
