//! The booking record mutated by the saga orchestrator.

use chrono::{DateTime, Utc};
use common::{BookingId, SagaId};
use serde::{Deserialize, Serialize};

use super::types::{BookingStatus, BookingType, Money, ProductPayload};

/// A booking record.
///
/// The booking aggregate is owned by an external service; this struct
/// carries the fields the orchestrator reads and mirrors: the business
/// status, a copy of the saga state for fast external reads, the
/// confirmation number (assigned exactly once), and the failure reasons.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    /// Unique booking identifier.
    pub id: BookingId,

    /// Saga instance coordinating this booking, 1:1.
    pub saga_id: SagaId,

    /// Customer identity as known to the booking service.
    pub customer_id: String,

    /// Product composition.
    pub booking_type: BookingType,

    /// Business-facing status, distinct from the saga state.
    pub status: BookingStatus,

    /// Mirror of the saga's current state for external reads.
    pub saga_state: Option<String>,

    /// Assigned exactly once, on successful completion.
    pub confirmation_number: Option<String>,

    /// Human-readable reason when the booking is cancelled.
    pub cancellation_reason: Option<String>,

    /// Reason recorded when compensation was triggered.
    pub compensation_reason: Option<String>,

    /// When the booking was cancelled, if it was.
    pub cancelled_at: Option<DateTime<Utc>>,

    /// Transient hold while reservations are in flight; released on
    /// completion or cancellation.
    pub reservation_locked: bool,

    /// Total amount to capture.
    pub total_amount: Money,

    /// Stored product payload (flight and/or hotel sections).
    pub products: ProductPayload,

    /// When the booking was created.
    pub created_at: DateTime<Utc>,

    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Creates a new pending booking with a fresh saga ID.
    pub fn new(
        id: BookingId,
        customer_id: impl Into<String>,
        booking_type: BookingType,
        total_amount: Money,
        products: ProductPayload,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            saga_id: SagaId::new(),
            customer_id: customer_id.into(),
            booking_type,
            status: BookingStatus::Pending,
            saga_state: None,
            confirmation_number: None,
            cancellation_reason: None,
            compensation_reason: None,
            cancelled_at: None,
            reservation_locked: false,
            total_amount,
            products,
            created_at: now,
            updated_at: now,
        }
    }

    /// Mirrors the saga state for external readers.
    pub fn set_saga_state(&mut self, state: impl Into<String>) {
        self.saga_state = Some(state.into());
        self.touch();
    }

    /// Assigns the confirmation number if none is set yet.
    ///
    /// Returns true if the number was assigned, false if one already existed.
    pub fn assign_confirmation_number(&mut self, number: impl Into<String>) -> bool {
        if self.confirmation_number.is_some() {
            return false;
        }
        self.confirmation_number = Some(number.into());
        self.touch();
        true
    }

    /// Marks the booking confirmed and releases the reservation lock.
    pub fn mark_confirmed(&mut self) {
        self.status = BookingStatus::Confirmed;
        self.reservation_locked = false;
        self.touch();
    }

    /// Marks the booking cancelled with the given terminal status and reason.
    pub fn mark_cancelled(&mut self, status: BookingStatus, reason: impl Into<String>) {
        self.status = status;
        self.cancellation_reason = Some(reason.into());
        self.cancelled_at = Some(Utc::now());
        self.reservation_locked = false;
        self.touch();
    }

    /// Records the reason compensation was triggered.
    pub fn set_compensation_reason(&mut self, reason: impl Into<String>) {
        self.compensation_reason = Some(reason.into());
        self.touch();
    }

    /// Takes the reservation lock while reservations are in flight.
    pub fn take_reservation_lock(&mut self) {
        self.reservation_locked = true;
        self.touch();
    }

    /// Releases the reservation lock.
    pub fn release_reservation_lock(&mut self) {
        self.reservation_locked = false;
        self.touch();
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
