//! Canonical saga events.
//!
//! These are the only events the state machine reacts to. They are
//! produced exclusively by the normalizer (`crate::normalizer`), which
//! maps loosely-typed broker messages into this closed enum so every
//! `match` over events is exhaustive and compiler-checked.

use common::{BookingId, SagaId};
use serde::{Deserialize, Serialize};

/// A normalized event together with the flattened raw payload.
///
/// The raw payload is carried for audit logging only; business logic
/// reads the typed event.
#[derive(Debug, Clone)]
pub struct NormalizedEvent {
    /// The typed event.
    pub event: SagaEvent,

    /// Flattened payload as received, for the state log.
    pub raw: serde_json::Value,
}

/// Result events consumed from the downstream services.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "eventType", content = "data")]
pub enum SagaEvent {
    /// Flight service confirmed the reservation.
    FlightReserved(ReservationConfirmedData),

    /// Flight service rejected the reservation.
    FlightReservationFailed(FailureData),

    /// Flight service acknowledged a cancellation command.
    FlightReservationCancelled(AcknowledgementData),

    /// Hotel service confirmed the reservation.
    HotelReserved(ReservationConfirmedData),

    /// Hotel service rejected the reservation.
    HotelReservationFailed(FailureData),

    /// Hotel service acknowledged a cancellation command.
    HotelReservationCancelled(AcknowledgementData),

    /// Payment service captured the payment.
    PaymentProcessed(PaymentProcessedData),

    /// Payment service declined the payment.
    PaymentFailed(FailureData),

    /// Payment service refunded a captured payment.
    PaymentRefunded(PaymentRefundedData),

    /// Payment service acknowledged a cancellation.
    PaymentCancelled(AcknowledgementData),
}

impl SagaEvent {
    /// Returns the canonical event type name.
    pub fn event_type(&self) -> &'static str {
        match self {
            SagaEvent::FlightReserved(_) => "FlightReserved",
            SagaEvent::FlightReservationFailed(_) => "FlightReservationFailed",
            SagaEvent::FlightReservationCancelled(_) => "FlightReservationCancelled",
            SagaEvent::HotelReserved(_) => "HotelReserved",
            SagaEvent::HotelReservationFailed(_) => "HotelReservationFailed",
            SagaEvent::HotelReservationCancelled(_) => "HotelReservationCancelled",
            SagaEvent::PaymentProcessed(_) => "PaymentProcessed",
            SagaEvent::PaymentFailed(_) => "PaymentFailed",
            SagaEvent::PaymentRefunded(_) => "PaymentRefunded",
            SagaEvent::PaymentCancelled(_) => "PaymentCancelled",
        }
    }

    /// Returns the saga this event belongs to.
    pub fn saga_id(&self) -> SagaId {
        match self {
            SagaEvent::FlightReserved(d) | SagaEvent::HotelReserved(d) => d.saga_id,
            SagaEvent::FlightReservationFailed(d)
            | SagaEvent::HotelReservationFailed(d)
            | SagaEvent::PaymentFailed(d) => d.saga_id,
            SagaEvent::FlightReservationCancelled(d)
            | SagaEvent::HotelReservationCancelled(d)
            | SagaEvent::PaymentCancelled(d) => d.saga_id,
            SagaEvent::PaymentProcessed(d) => d.saga_id,
            SagaEvent::PaymentRefunded(d) => d.saga_id,
        }
    }

    /// Returns the booking this event belongs to.
    pub fn booking_id(&self) -> BookingId {
        match self {
            SagaEvent::FlightReserved(d) | SagaEvent::HotelReserved(d) => d.booking_id,
            SagaEvent::FlightReservationFailed(d)
            | SagaEvent::HotelReservationFailed(d)
            | SagaEvent::PaymentFailed(d) => d.booking_id,
            SagaEvent::FlightReservationCancelled(d)
            | SagaEvent::HotelReservationCancelled(d)
            | SagaEvent::PaymentCancelled(d) => d.booking_id,
            SagaEvent::PaymentProcessed(d) => d.booking_id,
            SagaEvent::PaymentRefunded(d) => d.booking_id,
        }
    }

    /// Returns true for events that report a downstream failure.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            SagaEvent::FlightReservationFailed(_)
                | SagaEvent::HotelReservationFailed(_)
                | SagaEvent::PaymentFailed(_)
        )
    }
}

/// Data for successful reservation events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservationConfirmedData {
    /// The booking the reservation belongs to.
    pub booking_id: BookingId,

    /// The saga coordinating the booking.
    pub saga_id: SagaId,

    /// Reference assigned by the downstream service.
    #[serde(default)]
    pub reservation_id: Option<String>,
}

/// Failure detail fields as downstream services report them.
///
/// Services disagree on where the human-readable reason lives; the
/// compensation planner checks these fields in order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureInfo {
    /// Primary failure description.
    #[serde(default)]
    pub error_message: Option<String>,

    /// Alternate failure description.
    #[serde(default)]
    pub message: Option<String>,

    /// Nested detail block used by some services.
    #[serde(default)]
    pub details: Option<FailureDetails>,
}

/// Nested failure detail block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureDetails {
    /// Failure description inside the detail block.
    #[serde(default)]
    pub message: Option<String>,
}

/// Data for reservation/payment failure events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureData {
    /// The booking the failure belongs to.
    pub booking_id: BookingId,

    /// The saga coordinating the booking.
    pub saga_id: SagaId,

    /// Failure detail fields.
    #[serde(flatten)]
    pub failure: FailureInfo,
}

/// Data for the PaymentProcessed event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentProcessedData {
    /// The booking the payment belongs to.
    pub booking_id: BookingId,

    /// The saga coordinating the booking.
    pub saga_id: SagaId,

    /// Payment reference from the payment service.
    #[serde(default)]
    pub payment_id: Option<String>,

    /// Gateway transaction reference, when reported separately.
    #[serde(default)]
    pub transaction_id: Option<String>,
}

/// Data for the PaymentRefunded event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRefundedData {
    /// The booking the refund belongs to.
    pub booking_id: BookingId,

    /// The saga coordinating the booking.
    pub saga_id: SagaId,

    /// Refund reference from the payment service.
    #[serde(default)]
    pub refund_id: Option<String>,

    /// Refund reason fields, when present.
    #[serde(flatten)]
    pub failure: FailureInfo,
}

/// Data for cancellation acknowledgements.
///
/// These confirm a compensation the saga already recorded; they are
/// logged but never change state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcknowledgementData {
    /// The booking the acknowledgement belongs to.
    pub booking_id: BookingId,

    /// The saga coordinating the booking.
    pub saga_id: SagaId,

    /// Cancelled reservation or payment reference.
    #[serde(default)]
    pub reference_id: Option<String>,
}
