//! Saga state machine states.

use serde::{Deserialize, Serialize};

/// The state of a booking saga.
///
/// Forward path (conditioned by booking type):
/// ```text
/// BOOKING_INITIATED ──► FLIGHT_RESERVATION_PENDING ──► FLIGHT_RESERVED
///     ──► HOTEL_RESERVATION_PENDING ──► HOTEL_RESERVED
///     ──► PAYMENT_PENDING ──► PAYMENT_COMPLETED ──► BOOKING_COMPLETED
/// ```
/// Any failure branches through the COMPENSATION_* states into
/// BOOKING_CANCELLED. Terminal states never revert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SagaState {
    /// Saga created, no command issued yet.
    #[default]
    BookingInitiated,

    /// Waiting for the flight service to confirm or reject the reservation.
    FlightReservationPending,

    /// Flight reserved.
    FlightReserved,

    /// Waiting for the hotel service.
    HotelReservationPending,

    /// Hotel reserved.
    HotelReserved,

    /// Waiting for payment capture.
    PaymentPending,

    /// Payment captured.
    PaymentCompleted,

    /// Saga finished successfully (terminal).
    BookingCompleted,

    /// Cancelling a previously made flight reservation.
    CompensationFlightCancel,

    /// Cancelling a previously made hotel reservation.
    CompensationHotelCancel,

    /// Refunding a captured payment.
    CompensationPaymentRefund,

    /// Saga finished with the booking cancelled (terminal).
    BookingCancelled,
}

impl SagaState {
    /// Returns true if no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SagaState::BookingCompleted | SagaState::BookingCancelled)
    }

    /// Returns true if the saga is waiting on a downstream service.
    ///
    /// These are the states the deadline sweep watches.
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            SagaState::FlightReservationPending
                | SagaState::HotelReservationPending
                | SagaState::PaymentPending
        )
    }

    /// Returns true if this is a compensation state.
    pub fn is_compensation(&self) -> bool {
        matches!(
            self,
            SagaState::CompensationFlightCancel
                | SagaState::CompensationHotelCancel
                | SagaState::CompensationPaymentRefund
        )
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaState::BookingInitiated => "BOOKING_INITIATED",
            SagaState::FlightReservationPending => "FLIGHT_RESERVATION_PENDING",
            SagaState::FlightReserved => "FLIGHT_RESERVED",
            SagaState::HotelReservationPending => "HOTEL_RESERVATION_PENDING",
            SagaState::HotelReserved => "HOTEL_RESERVED",
            SagaState::PaymentPending => "PAYMENT_PENDING",
            SagaState::PaymentCompleted => "PAYMENT_COMPLETED",
            SagaState::BookingCompleted => "BOOKING_COMPLETED",
            SagaState::CompensationFlightCancel => "COMPENSATION_FLIGHT_CANCEL",
            SagaState::CompensationHotelCancel => "COMPENSATION_HOTEL_CANCEL",
            SagaState::CompensationPaymentRefund => "COMPENSATION_PAYMENT_REFUND",
            SagaState::BookingCancelled => "BOOKING_CANCELLED",
        }
    }
}

impl std::fmt::Display for SagaState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an unknown state name.
#[derive(Debug, Clone)]
pub struct ParseSagaStateError(pub String);

impl std::fmt::Display for ParseSagaStateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Unknown saga state: {}", self.0)
    }
}

impl std::error::Error for ParseSagaStateError {}

impl std::str::FromStr for SagaState {
    type Err = ParseSagaStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BOOKING_INITIATED" => Ok(SagaState::BookingInitiated),
            "FLIGHT_RESERVATION_PENDING" => Ok(SagaState::FlightReservationPending),
            "FLIGHT_RESERVED" => Ok(SagaState::FlightReserved),
            "HOTEL_RESERVATION_PENDING" => Ok(SagaState::HotelReservationPending),
            "HOTEL_RESERVED" => Ok(SagaState::HotelReserved),
            "PAYMENT_PENDING" => Ok(SagaState::PaymentPending),
            "PAYMENT_COMPLETED" => Ok(SagaState::PaymentCompleted),
            "BOOKING_COMPLETED" => Ok(SagaState::BookingCompleted),
            "COMPENSATION_FLIGHT_CANCEL" => Ok(SagaState::CompensationFlightCancel),
            "COMPENSATION_HOTEL_CANCEL" => Ok(SagaState::CompensationHotelCancel),
            "COMPENSATION_PAYMENT_REFUND" => Ok(SagaState::CompensationPaymentRefund),
            "BOOKING_CANCELLED" => Ok(SagaState::BookingCancelled),
            other => Err(ParseSagaStateError(other.to_string())),
        }
    }
}
