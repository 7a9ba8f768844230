//! Booking record store boundary.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::BookingId;
use tokio::sync::RwLock;

use crate::booking::Booking;
use crate::error::{BookingError, Result};

/// Read/write access to booking records.
///
/// The booking aggregate is owned by an external service; the saga
/// orchestrator only loads a record, mutates the mirrored fields, and
/// stores it back. Implementations must be thread-safe.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Retrieves a booking by ID.
    async fn get(&self, booking_id: BookingId) -> Result<Option<Booking>>;

    /// Inserts a new booking.
    ///
    /// Fails with `AlreadyExists` if the ID is taken.
    async fn insert(&self, booking: Booking) -> Result<()>;

    /// Replaces the stored record for an existing booking.
    async fn update(&self, booking: Booking) -> Result<()>;
}

/// In-memory booking store for tests.
#[derive(Clone, Default)]
pub struct InMemoryBookingStore {
    bookings: Arc<RwLock<HashMap<BookingId, Booking>>>,
}

impl InMemoryBookingStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored bookings.
    pub async fn booking_count(&self) -> usize {
        self.bookings.read().await.len()
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn get(&self, booking_id: BookingId) -> Result<Option<Booking>> {
        Ok(self.bookings.read().await.get(&booking_id).cloned())
    }

    async fn insert(&self, booking: Booking) -> Result<()> {
        let mut bookings = self.bookings.write().await;
        if bookings.contains_key(&booking.id) {
            return Err(BookingError::AlreadyExists(booking.id));
        }
        bookings.insert(booking.id, booking);
        Ok(())
    }

    async fn update(&self, booking: Booking) -> Result<()> {
        let mut bookings = self.bookings.write().await;
        if !bookings.contains_key(&booking.id) {
            return Err(BookingError::NotFound(booking.id));
        }
        bookings.insert(booking.id, booking);
        Ok(())
    }
}
