//! Booking domain error types.

use common::BookingId;
use thiserror::Error;

/// Errors from the booking record store boundary.
#[derive(Debug, Error)]
pub enum BookingError {
    /// Booking not found in the store.
    #[error("Booking not found: {0}")]
    NotFound(BookingId),

    /// A booking with this ID already exists.
    #[error("Booking already exists: {0}")]
    AlreadyExists(BookingId),

    /// Store backend failure.
    #[error("Booking store error: {0}")]
    Store(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for booking store operations.
pub type Result<T> = std::result::Result<T, BookingError>;
