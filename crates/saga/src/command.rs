//! Outbound saga commands and the publisher boundary.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{BookingId, SagaId};
use domain::{Booking, BookingType, FlightDetails, HotelDetails, Money};
use serde::{Deserialize, Serialize};

use crate::error::SagaError;

/// Metadata key marking a command as a compensating operation.
pub const META_IS_COMPENSATION: &str = "isCompensation";

/// Metadata key carrying the human-readable compensation reason.
pub const META_REASON: &str = "reason";

/// The operation a downstream service is asked to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandAction {
    /// Reserve the flight leg.
    ReserveFlight,

    /// Reserve the hotel stay.
    ReserveHotel,

    /// Cancel a previously made flight reservation (compensation).
    CancelFlightReservation,

    /// Cancel a previously made hotel reservation (compensation).
    CancelHotelReservation,
}

impl CommandAction {
    /// Returns true if this action targets the flight service.
    pub fn targets_flight(&self) -> bool {
        matches!(
            self,
            CommandAction::ReserveFlight | CommandAction::CancelFlightReservation
        )
    }

    /// Returns the action name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandAction::ReserveFlight => "RESERVE_FLIGHT",
            CommandAction::ReserveHotel => "RESERVE_HOTEL",
            CommandAction::CancelFlightReservation => "CANCEL_FLIGHT_RESERVATION",
            CommandAction::CancelHotelReservation => "CANCEL_HOTEL_RESERVATION",
        }
    }
}

impl std::fmt::Display for CommandAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An outbound instruction to a downstream service.
///
/// Constructed and sent immediately upon a state transition that requires
/// it; never persisted as a standalone entity (the state log is the
/// durable record of intent). Published keyed by `saga_id` so one
/// partition handles a saga's commands in order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SagaCommand {
    /// The saga issuing the command; also the message key.
    pub saga_id: SagaId,

    /// The booking being coordinated.
    pub booking_id: BookingId,

    /// Customer identity, passed through to the downstream service.
    pub customer_id: String,

    /// Product composition of the booking.
    pub booking_type: BookingType,

    /// Total amount of the booking.
    pub total_amount: Money,

    /// The requested operation.
    pub action: CommandAction,

    /// Flight payload for flight-targeted actions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flight_details: Option<FlightDetails>,

    /// Hotel payload for hotel-targeted actions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hotel_details: Option<HotelDetails>,

    /// Free-form metadata; compensation commands carry
    /// `isCompensation=true` and the failure reason.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl SagaCommand {
    /// Builds a command for a booking, attaching the product payload the
    /// action targets.
    pub fn for_booking(booking: &Booking, action: CommandAction) -> Self {
        let (flight_details, hotel_details) = if action.targets_flight() {
            (booking.products.flight.clone(), None)
        } else {
            (None, booking.products.hotel.clone())
        };

        Self {
            saga_id: booking.saga_id,
            booking_id: booking.id,
            customer_id: booking.customer_id.clone(),
            booking_type: booking.booking_type,
            total_amount: booking.total_amount.clone(),
            action,
            flight_details,
            hotel_details,
            metadata: HashMap::new(),
        }
    }

    /// Marks the command as a compensating operation with a reason.
    pub fn compensating(mut self, reason: impl Into<String>) -> Self {
        self.metadata
            .insert(META_IS_COMPENSATION.to_string(), "true".to_string());
        self.metadata.insert(META_REASON.to_string(), reason.into());
        self
    }

    /// Returns true if this is a compensating command.
    pub fn is_compensation(&self) -> bool {
        self.metadata
            .get(META_IS_COMPENSATION)
            .is_some_and(|v| v == "true")
    }
}

/// Trait for publishing commands to the downstream command topics.
///
/// Implementations must key the outbound message by `command.saga_id`
/// for partition-level ordering per saga.
#[async_trait]
pub trait CommandPublisher: Send + Sync {
    /// Publishes a command.
    async fn publish(&self, command: &SagaCommand) -> Result<(), SagaError>;
}

#[derive(Debug, Default)]
struct InMemoryCommandState {
    sent: Vec<SagaCommand>,
    fail_on_publish: bool,
}

/// In-memory command publisher for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCommandPublisher {
    state: Arc<RwLock<InMemoryCommandState>>,
}

impl InMemoryCommandPublisher {
    /// Creates a new in-memory command publisher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the publisher to fail on subsequent publish calls.
    pub fn set_fail_on_publish(&self, fail: bool) {
        self.state.write().unwrap().fail_on_publish = fail;
    }

    /// Returns all published commands in publish order.
    pub fn sent(&self) -> Vec<SagaCommand> {
        self.state.read().unwrap().sent.clone()
    }

    /// Returns the commands published for one saga, in order.
    pub fn sent_for(&self, saga_id: SagaId) -> Vec<SagaCommand> {
        self.state
            .read()
            .unwrap()
            .sent
            .iter()
            .filter(|c| c.saga_id == saga_id)
            .cloned()
            .collect()
    }

    /// Returns the number of published commands.
    pub fn command_count(&self) -> usize {
        self.state.read().unwrap().sent.len()
    }
}

#[async_trait]
impl CommandPublisher for InMemoryCommandPublisher {
    async fn publish(&self, command: &SagaCommand) -> Result<(), SagaError> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_publish {
            return Err(SagaError::CommandPublish("broker unavailable".to_string()));
        }
        state.sent.push(command.clone());
        Ok(())
    }
}
