//! The persisted saga instance.

use chrono::{DateTime, Utc};
use common::{BookingId, SagaId};
use serde::{Deserialize, Serialize};

use crate::state::SagaState;

/// One saga instance per booking.
///
/// Exactly one non-completed instance exists per active booking. State
/// only advances forward or into a compensation/cancelled branch; it never
/// reverts from a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaInstance {
    /// Globally unique saga identifier, assigned at booking creation.
    pub saga_id: SagaId,

    /// The booking this saga coordinates, 1:1.
    pub booking_id: BookingId,

    /// Current state of the saga.
    pub current_state: SagaState,

    /// True once the saga has entered a compensation branch.
    pub is_compensating: bool,

    /// Reason compensation was triggered, if it was.
    pub compensation_reason: Option<String>,

    /// Timestamp of the last applied transition.
    pub last_updated_at: DateTime<Utc>,

    /// Set when the saga reaches a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
}

impl SagaInstance {
    /// Creates a new saga instance in `BOOKING_INITIATED`.
    pub fn new(saga_id: SagaId, booking_id: BookingId) -> Self {
        Self {
            saga_id,
            booking_id,
            current_state: SagaState::BookingInitiated,
            is_compensating: false,
            compensation_reason: None,
            last_updated_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Advances the saga to a new state.
    ///
    /// Sets the compensating flag when entering a compensation state and
    /// stamps `completed_at` on reaching a terminal state. Callers must not
    /// invoke this on an already-terminal instance.
    pub fn advance_to(&mut self, state: SagaState) {
        debug_assert!(!self.current_state.is_terminal());
        if state.is_compensation() {
            self.is_compensating = true;
        }
        self.current_state = state;
        self.last_updated_at = Utc::now();
        if state.is_terminal() {
            self.completed_at = Some(self.last_updated_at);
        }
    }

    /// Records why compensation was triggered.
    pub fn set_compensation_reason(&mut self, reason: impl Into<String>) {
        self.compensation_reason = Some(reason.into());
    }

    /// Returns true if the saga is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.current_state.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_instance() -> SagaInstance {
        SagaInstance::new(SagaId::new(), BookingId::new())
    }

    #[test]
    fn new_instance_starts_initiated() {
        let saga = sample_instance();
        assert_eq!(saga.current_state, SagaState::BookingInitiated);
        assert!(!saga.is_compensating);
        assert!(saga.completed_at.is_none());
        assert!(!saga.is_terminal());
    }

    #[test]
    fn advancing_to_compensation_sets_flag() {
        let mut saga = sample_instance();
        saga.advance_to(SagaState::FlightReservationPending);
        assert!(!saga.is_compensating);

        saga.advance_to(SagaState::CompensationFlightCancel);
        assert!(saga.is_compensating);

        // Flag stays set after leaving the compensation state
        saga.advance_to(SagaState::BookingCancelled);
        assert!(saga.is_compensating);
    }

    #[test]
    fn terminal_state_stamps_completed_at() {
        let mut saga = sample_instance();
        saga.advance_to(SagaState::PaymentPending);
        assert!(saga.completed_at.is_none());

        saga.advance_to(SagaState::PaymentCompleted);
        saga.advance_to(SagaState::BookingCompleted);
        assert!(saga.completed_at.is_some());
        assert!(saga.is_terminal());
    }

    #[test]
    fn serialization_roundtrip() {
        let mut saga = sample_instance();
        saga.advance_to(SagaState::HotelReservationPending);
        saga.set_compensation_reason("hotel sold out");

        let json = serde_json::to_string(&saga).unwrap();
        let loaded: SagaInstance = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.saga_id, saga.saga_id);
        assert_eq!(loaded.current_state, SagaState::HotelReservationPending);
        assert_eq!(loaded.compensation_reason.as_deref(), Some("hotel sold out"));
    }
}
