//! The saga state machine.
//!
//! Pure decision logic: given the current state and an incoming event,
//! compute the next state(s), the commands to emit, and how the booking
//! record must be patched. Nothing here touches storage or the broker;
//! the orchestrator applies decisions and owns persistence, locking and
//! duplicate suppression.
//!
//! Events are dispatched to one handler per event family (flight,
//! hotel, payment); the machine composes the three.

use domain::{BookingStatus, BookingType};
use saga_store::SagaState;

use crate::command::CommandAction;
use crate::compensation::{self, FailedStage};
use crate::error::SagaError;
use crate::event::SagaEvent;

/// Reason attached when a pending state exceeds its deadline.
pub const DEADLINE_REASON: &str = "No response from the downstream service within the allowed time";

/// The slice of saga/booking state a decision depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SagaContext {
    /// Current persisted saga state.
    pub state: SagaState,

    /// Product composition of the booking.
    pub booking_type: BookingType,
}

impl SagaContext {
    /// Creates a context.
    pub fn new(state: SagaState, booking_type: BookingType) -> Self {
        Self {
            state,
            booking_type,
        }
    }
}

/// One recorded state change inside a transition.
///
/// Each change becomes one state-log entry; the last change's state is
/// what the saga instance ends up in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
    /// The state entered.
    pub to: SagaState,

    /// Failure text recorded alongside the change, if any.
    pub error: Option<String>,
}

impl StateChange {
    fn to_state(to: SagaState) -> Self {
        Self { to, error: None }
    }

    fn with_error(to: SagaState, error: impl Into<String>) -> Self {
        Self {
            to,
            error: Some(error.into()),
        }
    }
}

/// A command the orchestrator must publish as part of a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandIntent {
    /// The requested downstream operation.
    pub action: CommandAction,

    /// Set for compensating commands; carried in command metadata.
    pub compensation_reason: Option<String>,
}

impl CommandIntent {
    fn forward(action: CommandAction) -> Self {
        Self {
            action,
            compensation_reason: None,
        }
    }

    fn compensating(action: CommandAction, reason: &str) -> Self {
        Self {
            action,
            compensation_reason: Some(reason.to_string()),
        }
    }
}

/// How the booking record must be patched when a transition is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingPatch {
    /// Take the reservation lock for the tentative-reservation window.
    Lock,

    /// Confirm the booking: assign a confirmation number (once) and
    /// release the reservation lock.
    Confirm,

    /// Cancel the booking with a business-facing status and reason.
    Cancel {
        status: BookingStatus,
        reason: String,
    },
}

/// Notifications the orchestrator must emit after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationIntent {
    /// Payment was captured.
    PaymentSucceeded,

    /// The booking reached `BOOKING_COMPLETED`.
    BookingConfirmed,
}

/// The full effect of applying one event to one saga.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Transition {
    /// Ordered state changes, each logged separately.
    pub changes: Vec<StateChange>,

    /// Commands to publish, in order, after the changes are persisted.
    pub commands: Vec<CommandIntent>,

    /// Patch applied to the booking record, if any.
    pub booking: Option<BookingPatch>,

    /// Notifications to emit after the transition is persisted.
    pub notifications: Vec<NotificationIntent>,

    /// Failure reason recorded on the saga instance when compensating.
    pub compensation_reason: Option<String>,
}

impl Transition {
    /// The state the saga ends in, if this transition changes state.
    pub fn final_state(&self) -> Option<SagaState> {
        self.changes.last().map(|c| c.to)
    }
}

/// The machine's verdict on an incoming event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Apply the transition atomically.
    Apply(Transition),

    /// Log the event against the saga; no state change. Used for
    /// cancellation acknowledgements confirming a compensation the
    /// saga already recorded.
    Acknowledge,

    /// Drop the event without logging. Duplicate or late delivery.
    Ignore { reason: &'static str },
}

/// Decision logic for one event family.
pub trait FamilyHandler: Send + Sync {
    /// Returns true if this handler owns the event's family.
    fn handles(&self, event: &SagaEvent) -> bool;

    /// Decides the effect of the event given the current context.
    ///
    /// Only called for non-terminal sagas with an event this handler
    /// owns.
    fn decide(&self, ctx: SagaContext, event: &SagaEvent) -> Decision;
}

/// Builds the compensation tail of a transition: the planned
/// cancellation steps, then `BOOKING_CANCELLED`.
fn compensate(
    stage: FailedStage,
    booking_type: BookingType,
    status: BookingStatus,
    reason: String,
) -> Transition {
    let mut changes = Vec::new();
    let mut commands = Vec::new();
    for step in compensation::plan(stage, booking_type) {
        changes.push(StateChange::with_error(step.state, reason.as_str()));
        commands.push(CommandIntent::compensating(step.action, &reason));
    }
    changes.push(StateChange::with_error(SagaState::BookingCancelled, reason.as_str()));

    Transition {
        changes,
        commands,
        booking: Some(BookingPatch::Cancel {
            status,
            reason: reason.clone(),
        }),
        notifications: Vec::new(),
        compensation_reason: Some(reason),
    }
}

/// After a reservation step succeeds, where does the saga go next.
fn after_reservation(booking_type: BookingType, reserved: SagaState) -> (SagaState, Option<CommandIntent>) {
    if reserved == SagaState::FlightReserved && booking_type.has_hotel() {
        (
            SagaState::HotelReservationPending,
            Some(CommandIntent::forward(CommandAction::ReserveHotel)),
        )
    } else {
        (SagaState::PaymentPending, None)
    }
}

/// Handles flight reservation results.
#[derive(Debug, Default)]
pub struct FlightHandler;

impl FamilyHandler for FlightHandler {
    fn handles(&self, event: &SagaEvent) -> bool {
        matches!(
            event,
            SagaEvent::FlightReserved(_)
                | SagaEvent::FlightReservationFailed(_)
                | SagaEvent::FlightReservationCancelled(_)
        )
    }

    fn decide(&self, ctx: SagaContext, event: &SagaEvent) -> Decision {
        match event {
            SagaEvent::FlightReserved(_) => {
                if ctx.state != SagaState::FlightReservationPending {
                    return Decision::Ignore {
                        reason: "flight result for a saga past flight reservation",
                    };
                }
                let mut changes = vec![StateChange::to_state(SagaState::FlightReserved)];
                let (next, command) = after_reservation(ctx.booking_type, SagaState::FlightReserved);
                changes.push(StateChange::to_state(next));
                Decision::Apply(Transition {
                    changes,
                    commands: command.into_iter().collect(),
                    ..Default::default()
                })
            }
            SagaEvent::FlightReservationFailed(data) => {
                if ctx.state != SagaState::FlightReservationPending {
                    return Decision::Ignore {
                        reason: "flight failure for a saga past flight reservation",
                    };
                }
                let reason = compensation::extract_reason(&data.failure);
                Decision::Apply(compensate(
                    FailedStage::FlightReservation,
                    ctx.booking_type,
                    BookingStatus::ValidationFailed,
                    reason,
                ))
            }
            SagaEvent::FlightReservationCancelled(_) => Decision::Acknowledge,
            _ => Decision::Ignore {
                reason: "event not owned by the flight handler",
            },
        }
    }
}

/// Handles hotel reservation results.
#[derive(Debug, Default)]
pub struct HotelHandler;

impl FamilyHandler for HotelHandler {
    fn handles(&self, event: &SagaEvent) -> bool {
        matches!(
            event,
            SagaEvent::HotelReserved(_)
                | SagaEvent::HotelReservationFailed(_)
                | SagaEvent::HotelReservationCancelled(_)
        )
    }

    fn decide(&self, ctx: SagaContext, event: &SagaEvent) -> Decision {
        match event {
            SagaEvent::HotelReserved(_) => {
                if ctx.state != SagaState::HotelReservationPending {
                    return Decision::Ignore {
                        reason: "hotel result for a saga past hotel reservation",
                    };
                }
                Decision::Apply(Transition {
                    changes: vec![
                        StateChange::to_state(SagaState::HotelReserved),
                        StateChange::to_state(SagaState::PaymentPending),
                    ],
                    ..Default::default()
                })
            }
            SagaEvent::HotelReservationFailed(data) => {
                if ctx.state != SagaState::HotelReservationPending {
                    return Decision::Ignore {
                        reason: "hotel failure for a saga past hotel reservation",
                    };
                }
                let reason = compensation::extract_reason(&data.failure);
                Decision::Apply(compensate(
                    FailedStage::HotelReservation,
                    ctx.booking_type,
                    BookingStatus::ValidationFailed,
                    reason,
                ))
            }
            SagaEvent::HotelReservationCancelled(_) => Decision::Acknowledge,
            _ => Decision::Ignore {
                reason: "event not owned by the hotel handler",
            },
        }
    }
}

/// Handles payment results.
#[derive(Debug, Default)]
pub struct PaymentHandler;

impl FamilyHandler for PaymentHandler {
    fn handles(&self, event: &SagaEvent) -> bool {
        matches!(
            event,
            SagaEvent::PaymentProcessed(_)
                | SagaEvent::PaymentFailed(_)
                | SagaEvent::PaymentRefunded(_)
                | SagaEvent::PaymentCancelled(_)
        )
    }

    fn decide(&self, ctx: SagaContext, event: &SagaEvent) -> Decision {
        match event {
            SagaEvent::PaymentProcessed(_) => {
                if ctx.state != SagaState::PaymentPending {
                    return Decision::Ignore {
                        reason: "payment result for a saga not awaiting payment",
                    };
                }
                Decision::Apply(Transition {
                    changes: vec![
                        StateChange::to_state(SagaState::PaymentCompleted),
                        StateChange::to_state(SagaState::BookingCompleted),
                    ],
                    booking: Some(BookingPatch::Confirm),
                    notifications: vec![
                        NotificationIntent::PaymentSucceeded,
                        NotificationIntent::BookingConfirmed,
                    ],
                    ..Default::default()
                })
            }
            SagaEvent::PaymentFailed(data) => {
                if ctx.state != SagaState::PaymentPending {
                    return Decision::Ignore {
                        reason: "payment failure for a saga not awaiting payment",
                    };
                }
                let reason = compensation::extract_reason(&data.failure);
                Decision::Apply(compensate(
                    FailedStage::Payment,
                    ctx.booking_type,
                    BookingStatus::PaymentFailed,
                    reason,
                ))
            }
            SagaEvent::PaymentRefunded(data) => {
                // A refund can land after completion was recorded or
                // mid-flight; any non-terminal saga accepts it.
                let reason = compensation::extract_reason(&data.failure);
                Decision::Apply(Transition {
                    changes: vec![
                        StateChange::with_error(SagaState::CompensationPaymentRefund, reason.as_str()),
                        StateChange::with_error(SagaState::BookingCancelled, reason.as_str()),
                    ],
                    booking: Some(BookingPatch::Cancel {
                        status: BookingStatus::Cancelled,
                        reason: reason.clone(),
                    }),
                    compensation_reason: Some(reason),
                    ..Default::default()
                })
            }
            SagaEvent::PaymentCancelled(_) => Decision::Acknowledge,
            _ => Decision::Ignore {
                reason: "event not owned by the payment handler",
            },
        }
    }
}

/// Composes the per-family handlers into one decision surface.
pub struct SagaMachine {
    handlers: Vec<Box<dyn FamilyHandler>>,
}

impl Default for SagaMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl SagaMachine {
    /// Creates a machine with the standard flight/hotel/payment handlers.
    pub fn new() -> Self {
        Self {
            handlers: vec![
                Box::new(FlightHandler),
                Box::new(HotelHandler),
                Box::new(PaymentHandler),
            ],
        }
    }

    /// Decides the effect of an incoming event.
    ///
    /// Terminal sagas ignore everything; this is what makes duplicate
    /// and late deliveries safe under at-least-once consumption.
    pub fn decide(&self, ctx: SagaContext, event: &SagaEvent) -> Decision {
        if ctx.state.is_terminal() {
            return Decision::Ignore {
                reason: "saga already terminal",
            };
        }
        for handler in &self.handlers {
            if handler.handles(event) {
                return handler.decide(ctx, event);
            }
        }
        Decision::Ignore {
            reason: "no handler for event",
        }
    }

    /// The opening transition for a new saga.
    ///
    /// Takes the reservation lock and emits the first reservation
    /// command, or goes straight to payment when nothing needs
    /// reserving.
    pub fn start(&self, booking_type: BookingType) -> Transition {
        let (next, command) = if booking_type.has_flight() {
            (
                SagaState::FlightReservationPending,
                Some(CommandIntent::forward(CommandAction::ReserveFlight)),
            )
        } else if booking_type.has_hotel() {
            (
                SagaState::HotelReservationPending,
                Some(CommandIntent::forward(CommandAction::ReserveHotel)),
            )
        } else {
            (SagaState::PaymentPending, None)
        };

        Transition {
            changes: vec![StateChange::to_state(next)],
            commands: command.into_iter().collect(),
            booking: (next != SagaState::PaymentPending).then_some(BookingPatch::Lock),
            ..Default::default()
        }
    }

    /// The manual payment-initiation entry point.
    ///
    /// Allowed only once both reservations are in hand (or payment is
    /// already pending, in which case it is a no-op). Any other state
    /// is an invalid-state error surfaced to the caller.
    pub fn payment_initiated(&self, ctx: SagaContext) -> Result<Option<Transition>, SagaError> {
        match ctx.state {
            SagaState::FlightReserved | SagaState::HotelReserved => Ok(Some(Transition {
                changes: vec![StateChange::to_state(SagaState::PaymentPending)],
                ..Default::default()
            })),
            SagaState::PaymentPending => Ok(None),
            actual => Err(SagaError::InvalidState {
                operation: "mark_payment_initiated",
                actual,
            }),
        }
    }

    /// Forced compensation for a saga stuck in a pending state past its
    /// deadline. Returns `None` when the state carries no deadline.
    pub fn expire(&self, ctx: SagaContext) -> Option<Transition> {
        let stage = match ctx.state {
            SagaState::FlightReservationPending => FailedStage::FlightReservation,
            SagaState::HotelReservationPending => FailedStage::HotelReservation,
            SagaState::PaymentPending => FailedStage::Payment,
            _ => return None,
        };
        Some(compensate(
            stage,
            ctx.booking_type,
            BookingStatus::Cancelled,
            DEADLINE_REASON.to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{AcknowledgementData, FailureData, FailureInfo, PaymentProcessedData, PaymentRefundedData, ReservationConfirmedData};
    use common::{BookingId, SagaId};

    fn machine() -> SagaMachine {
        SagaMachine::new()
    }

    fn confirmed() -> ReservationConfirmedData {
        ReservationConfirmedData {
            booking_id: BookingId::new(),
            saga_id: SagaId::new(),
            reservation_id: Some("R-1".into()),
        }
    }

    fn failed(message: &str) -> FailureData {
        FailureData {
            booking_id: BookingId::new(),
            saga_id: SagaId::new(),
            failure: FailureInfo {
                error_message: Some(message.into()),
                ..Default::default()
            },
        }
    }

    fn ack() -> AcknowledgementData {
        AcknowledgementData {
            booking_id: BookingId::new(),
            saga_id: SagaId::new(),
            reference_id: None,
        }
    }

    fn apply(decision: Decision) -> Transition {
        match decision {
            Decision::Apply(transition) => transition,
            other => panic!("expected Apply, got {other:?}"),
        }
    }

    #[test]
    fn start_flight_booking_reserves_flight() {
        let transition = machine().start(BookingType::Flight);
        assert_eq!(transition.final_state(), Some(SagaState::FlightReservationPending));
        assert_eq!(transition.commands, vec![CommandIntent::forward(CommandAction::ReserveFlight)]);
        assert_eq!(transition.booking, Some(BookingPatch::Lock));
    }

    #[test]
    fn start_hotel_booking_reserves_hotel() {
        let transition = machine().start(BookingType::Hotel);
        assert_eq!(transition.final_state(), Some(SagaState::HotelReservationPending));
        assert_eq!(transition.commands, vec![CommandIntent::forward(CommandAction::ReserveHotel)]);
    }

    #[test]
    fn combo_starts_with_flight() {
        let transition = machine().start(BookingType::Combo);
        assert_eq!(transition.final_state(), Some(SagaState::FlightReservationPending));
        assert_eq!(transition.commands.len(), 1);
        assert_eq!(transition.commands[0].action, CommandAction::ReserveFlight);
    }

    #[test]
    fn flight_reserved_combo_continues_to_hotel() {
        let ctx = SagaContext::new(SagaState::FlightReservationPending, BookingType::Combo);
        let transition = apply(machine().decide(ctx, &SagaEvent::FlightReserved(confirmed())));

        assert_eq!(
            transition.changes.iter().map(|c| c.to).collect::<Vec<_>>(),
            vec![SagaState::FlightReserved, SagaState::HotelReservationPending]
        );
        assert_eq!(transition.commands, vec![CommandIntent::forward(CommandAction::ReserveHotel)]);
    }

    #[test]
    fn flight_reserved_flight_only_goes_to_payment() {
        let ctx = SagaContext::new(SagaState::FlightReservationPending, BookingType::Flight);
        let transition = apply(machine().decide(ctx, &SagaEvent::FlightReserved(confirmed())));

        assert_eq!(transition.final_state(), Some(SagaState::PaymentPending));
        assert!(transition.commands.is_empty());
    }

    #[test]
    fn hotel_reserved_goes_to_payment() {
        let ctx = SagaContext::new(SagaState::HotelReservationPending, BookingType::Combo);
        let transition = apply(machine().decide(ctx, &SagaEvent::HotelReserved(confirmed())));

        assert_eq!(
            transition.changes.iter().map(|c| c.to).collect::<Vec<_>>(),
            vec![SagaState::HotelReserved, SagaState::PaymentPending]
        );
        assert!(transition.commands.is_empty());
    }

    #[test]
    fn flight_failure_cancels_without_compensation() {
        let ctx = SagaContext::new(SagaState::FlightReservationPending, BookingType::Combo);
        let transition = apply(machine().decide(
            ctx,
            &SagaEvent::FlightReservationFailed(failed("overbooked")),
        ));

        assert_eq!(
            transition.changes.iter().map(|c| c.to).collect::<Vec<_>>(),
            vec![SagaState::BookingCancelled]
        );
        assert!(transition.commands.is_empty());
        assert_eq!(
            transition.booking,
            Some(BookingPatch::Cancel {
                status: BookingStatus::ValidationFailed,
                reason: "overbooked".into(),
            })
        );
    }

    #[test]
    fn hotel_failure_on_combo_cancels_flight_first() {
        let ctx = SagaContext::new(SagaState::HotelReservationPending, BookingType::Combo);
        let transition = apply(machine().decide(
            ctx,
            &SagaEvent::HotelReservationFailed(failed("no rooms left")),
        ));

        assert_eq!(
            transition.changes.iter().map(|c| c.to).collect::<Vec<_>>(),
            vec![SagaState::CompensationFlightCancel, SagaState::BookingCancelled]
        );
        assert_eq!(transition.commands.len(), 1);
        assert_eq!(transition.commands[0].action, CommandAction::CancelFlightReservation);
        assert!(transition.commands[0].compensation_reason.is_some());
        assert_eq!(transition.compensation_reason.as_deref(), Some("no rooms left"));
    }

    #[test]
    fn hotel_failure_on_hotel_only_has_nothing_to_unwind() {
        let ctx = SagaContext::new(SagaState::HotelReservationPending, BookingType::Hotel);
        let transition = apply(machine().decide(
            ctx,
            &SagaEvent::HotelReservationFailed(failed("no rooms left")),
        ));

        assert_eq!(
            transition.changes.iter().map(|c| c.to).collect::<Vec<_>>(),
            vec![SagaState::BookingCancelled]
        );
        assert!(transition.commands.is_empty());
    }

    #[test]
    fn payment_processed_completes_booking() {
        let ctx = SagaContext::new(SagaState::PaymentPending, BookingType::Combo);
        let data = PaymentProcessedData {
            booking_id: BookingId::new(),
            saga_id: SagaId::new(),
            payment_id: Some("PAY-1".into()),
            transaction_id: None,
        };
        let transition = apply(machine().decide(ctx, &SagaEvent::PaymentProcessed(data)));

        assert_eq!(
            transition.changes.iter().map(|c| c.to).collect::<Vec<_>>(),
            vec![SagaState::PaymentCompleted, SagaState::BookingCompleted]
        );
        assert_eq!(transition.booking, Some(BookingPatch::Confirm));
        assert_eq!(
            transition.notifications,
            vec![NotificationIntent::PaymentSucceeded, NotificationIntent::BookingConfirmed]
        );
    }

    #[test]
    fn payment_failure_unwinds_hotel_then_flight() {
        let ctx = SagaContext::new(SagaState::PaymentPending, BookingType::Combo);
        let transition = apply(machine().decide(
            ctx,
            &SagaEvent::PaymentFailed(failed("card declined")),
        ));

        assert_eq!(
            transition.changes.iter().map(|c| c.to).collect::<Vec<_>>(),
            vec![
                SagaState::CompensationHotelCancel,
                SagaState::CompensationFlightCancel,
                SagaState::BookingCancelled,
            ]
        );
        assert_eq!(
            transition.commands.iter().map(|c| c.action).collect::<Vec<_>>(),
            vec![
                CommandAction::CancelHotelReservation,
                CommandAction::CancelFlightReservation,
            ]
        );
        assert_eq!(
            transition.booking,
            Some(BookingPatch::Cancel {
                status: BookingStatus::PaymentFailed,
                reason: "card declined".into(),
            })
        );
    }

    #[test]
    fn payment_refund_cancels_from_any_live_state() {
        let data = PaymentRefundedData {
            booking_id: BookingId::new(),
            saga_id: SagaId::new(),
            refund_id: Some("RF-1".into()),
            failure: FailureInfo {
                message: Some("customer requested refund".into()),
                ..Default::default()
            },
        };
        let ctx = SagaContext::new(SagaState::PaymentCompleted, BookingType::Flight);
        let transition = apply(machine().decide(ctx, &SagaEvent::PaymentRefunded(data)));

        assert_eq!(
            transition.changes.iter().map(|c| c.to).collect::<Vec<_>>(),
            vec![SagaState::CompensationPaymentRefund, SagaState::BookingCancelled]
        );
        assert_eq!(
            transition.booking,
            Some(BookingPatch::Cancel {
                status: BookingStatus::Cancelled,
                reason: "customer requested refund".into(),
            })
        );
    }

    #[test]
    fn acknowledgements_log_without_state_change() {
        let ctx = SagaContext::new(SagaState::CompensationFlightCancel, BookingType::Combo);
        assert_eq!(
            machine().decide(ctx, &SagaEvent::FlightReservationCancelled(ack())),
            Decision::Acknowledge
        );
        assert_eq!(
            machine().decide(ctx, &SagaEvent::PaymentCancelled(ack())),
            Decision::Acknowledge
        );
    }

    #[test]
    fn terminal_saga_ignores_everything() {
        for state in [SagaState::BookingCompleted, SagaState::BookingCancelled] {
            let ctx = SagaContext::new(state, BookingType::Combo);
            let decision = machine().decide(ctx, &SagaEvent::FlightReserved(confirmed()));
            assert!(matches!(decision, Decision::Ignore { .. }), "{state}");
        }
    }

    #[test]
    fn out_of_order_result_is_ignored() {
        let ctx = SagaContext::new(SagaState::PaymentPending, BookingType::Combo);
        let decision = machine().decide(ctx, &SagaEvent::FlightReserved(confirmed()));
        assert!(matches!(decision, Decision::Ignore { .. }));
    }

    #[test]
    fn payment_initiated_from_reserved_states() {
        for state in [SagaState::FlightReserved, SagaState::HotelReserved] {
            let ctx = SagaContext::new(state, BookingType::Combo);
            let transition = machine().payment_initiated(ctx).unwrap().unwrap();
            assert_eq!(transition.final_state(), Some(SagaState::PaymentPending));
        }
    }

    #[test]
    fn payment_initiated_is_a_noop_when_already_pending() {
        let ctx = SagaContext::new(SagaState::PaymentPending, BookingType::Flight);
        assert!(machine().payment_initiated(ctx).unwrap().is_none());
    }

    #[test]
    fn payment_initiated_rejects_other_states() {
        for state in [
            SagaState::BookingInitiated,
            SagaState::FlightReservationPending,
            SagaState::BookingCompleted,
            SagaState::BookingCancelled,
        ] {
            let ctx = SagaContext::new(state, BookingType::Combo);
            let err = machine().payment_initiated(ctx).unwrap_err();
            assert!(matches!(err, SagaError::InvalidState { .. }), "{state}");
        }
    }

    #[test]
    fn expired_flight_pending_cancels_without_compensation() {
        let ctx = SagaContext::new(SagaState::FlightReservationPending, BookingType::Combo);
        let transition = machine().expire(ctx).unwrap();

        assert_eq!(transition.final_state(), Some(SagaState::BookingCancelled));
        assert!(transition.commands.is_empty());
        assert_eq!(transition.compensation_reason.as_deref(), Some(DEADLINE_REASON));
    }

    #[test]
    fn expired_payment_pending_unwinds_reservations() {
        let ctx = SagaContext::new(SagaState::PaymentPending, BookingType::Combo);
        let transition = machine().expire(ctx).unwrap();

        assert_eq!(
            transition.commands.iter().map(|c| c.action).collect::<Vec<_>>(),
            vec![
                CommandAction::CancelHotelReservation,
                CommandAction::CancelFlightReservation,
            ]
        );
        assert_eq!(transition.final_state(), Some(SagaState::BookingCancelled));
    }

    #[test]
    fn non_pending_states_have_no_deadline() {
        for state in [
            SagaState::FlightReserved,
            SagaState::BookingCompleted,
            SagaState::CompensationHotelCancel,
        ] {
            let ctx = SagaContext::new(state, BookingType::Combo);
            assert!(machine().expire(ctx).is_none(), "{state}");
        }
    }
}
