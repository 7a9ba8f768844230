//! Append-only state transition log.

use chrono::{DateTime, Utc};
use common::{BookingId, SagaId};
use serde::{Deserialize, Serialize};

use crate::state::SagaState;

/// One entry per applied transition.
///
/// The log is immutable and ordered by creation; it is the audit trail
/// and reconstructs the full transition history for any saga. The raw
/// event payload is kept for auditing only, never read back for business
/// logic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateLogEntry {
    /// The saga this entry belongs to.
    pub saga_id: SagaId,

    /// The booking the saga coordinates.
    pub booking_id: BookingId,

    /// State before the transition; None for the first entry.
    pub from_state: Option<SagaState>,

    /// State after the transition.
    pub to_state: SagaState,

    /// Canonical type of the event that caused the transition.
    pub event_type: String,

    /// Raw event payload, kept for auditing.
    pub event_payload: Option<serde_json::Value>,

    /// Failure detail when the transition was caused by an error.
    pub error_message: Option<String>,

    /// When the transition was recorded.
    pub timestamp: DateTime<Utc>,
}

impl StateLogEntry {
    /// Creates a log entry for a transition.
    pub fn new(
        saga_id: SagaId,
        booking_id: BookingId,
        from_state: Option<SagaState>,
        to_state: SagaState,
        event_type: impl Into<String>,
    ) -> Self {
        Self {
            saga_id,
            booking_id,
            from_state,
            to_state,
            event_type: event_type.into(),
            event_payload: None,
            error_message: None,
            timestamp: Utc::now(),
        }
    }

    /// Attaches the raw event payload.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.event_payload = Some(payload);
        self
    }

    /// Attaches a failure detail.
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error_message = Some(error.into());
        self
    }
}
