//! Compensation planning.
//!
//! Given a downstream failure and the booking's product composition,
//! decides which already-acquired resources must be released and in
//! what order. Policy: reverse acquisition order, most recently
//! acquired resource first.

use domain::BookingType;
use saga_store::SagaState;

use crate::command::CommandAction;
use crate::event::FailureInfo;

/// Fallback reason when a failure event carries no usable message.
pub const DEFAULT_FAILURE_REASON: &str = "Booking could not be completed";

/// User-facing rewrite for inventory-unavailability failures.
pub const UNAVAILABLE_REASON: &str =
    "The selected option is no longer available. Please choose a different date or option.";

/// Phrases downstream services use to report sold-out inventory.
const UNAVAILABLE_MARKERS: &[&str] = &[
    "no longer available",
    "not available",
    "sold out",
    "no inventory",
];

/// The saga stage at which a downstream failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedStage {
    /// Flight reservation was rejected.
    FlightReservation,

    /// Hotel reservation was rejected.
    HotelReservation,

    /// Payment capture was declined.
    Payment,
}

/// One compensation step: the state the saga passes through and the
/// cancellation command to emit while in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompensationStep {
    /// Compensation state recorded in the saga instance and log.
    pub state: SagaState,

    /// Cancellation command sent to the owning service.
    pub action: CommandAction,
}

/// Extracts a human-readable failure reason from a failure payload.
///
/// Fields are checked in order: `errorMessage`, `message`, then the
/// nested `details.message`. Known inventory-unavailability phrasings
/// are rewritten to a user-facing message; anything else passes
/// through verbatim. Blank or absent reasons fall back to a default.
pub fn extract_reason(failure: &FailureInfo) -> String {
    let found = failure
        .error_message
        .as_deref()
        .or(failure.message.as_deref())
        .or_else(|| {
            failure
                .details
                .as_ref()
                .and_then(|d| d.message.as_deref())
        })
        .map(str::trim)
        .filter(|s| !s.is_empty());

    match found {
        Some(reason) => {
            let lowered = reason.to_lowercase();
            if UNAVAILABLE_MARKERS.iter().any(|m| lowered.contains(m)) {
                UNAVAILABLE_REASON.to_string()
            } else {
                reason.to_string()
            }
        }
        None => DEFAULT_FAILURE_REASON.to_string(),
    }
}

/// Plans the ordered compensation steps for a failure.
///
/// Cancels the most recently acquired resource first:
/// - flight failure: nothing was reserved, no steps;
/// - hotel failure: cancel the flight if the booking has one;
/// - payment failure: cancel the hotel, then the flight, as present.
pub fn plan(stage: FailedStage, booking_type: BookingType) -> Vec<CompensationStep> {
    let flight_cancel = CompensationStep {
        state: SagaState::CompensationFlightCancel,
        action: CommandAction::CancelFlightReservation,
    };
    let hotel_cancel = CompensationStep {
        state: SagaState::CompensationHotelCancel,
        action: CommandAction::CancelHotelReservation,
    };

    let mut steps = Vec::new();
    match stage {
        FailedStage::FlightReservation => {}
        FailedStage::HotelReservation => {
            if booking_type.has_flight() {
                steps.push(flight_cancel);
            }
        }
        FailedStage::Payment => {
            if booking_type.has_hotel() {
                steps.push(hotel_cancel);
            }
            if booking_type.has_flight() {
                steps.push(flight_cancel);
            }
        }
    }
    steps
}
