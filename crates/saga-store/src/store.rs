use async_trait::async_trait;
use common::{BookingId, SagaId};

use crate::{Result, SagaInstance, StateLogEntry};

/// Persistence boundary for saga instances and their transition log.
///
/// `record_transition` is the atomic unit from the orchestrator's point of
/// view: the updated instance and its log entries are persisted together,
/// all or nothing. All implementations must be thread-safe.
#[async_trait]
pub trait SagaStateStore: Send + Sync {
    /// Inserts a new saga instance with its first log entry.
    ///
    /// Fails with `DuplicateSaga` if an instance with this saga ID exists.
    async fn insert(&self, instance: &SagaInstance, first_entry: StateLogEntry) -> Result<()>;

    /// Retrieves a saga instance by ID.
    async fn get(&self, saga_id: SagaId) -> Result<Option<SagaInstance>>;

    /// Retrieves the saga instance coordinating a booking.
    async fn find_by_booking(&self, booking_id: BookingId) -> Result<Option<SagaInstance>>;

    /// Persists an updated instance and appends its log entries atomically.
    async fn record_transition(
        &self,
        instance: &SagaInstance,
        entries: Vec<StateLogEntry>,
    ) -> Result<()>;

    /// Returns the full transition history for a saga, oldest first.
    async fn history(&self, saga_id: SagaId) -> Result<Vec<StateLogEntry>>;

    /// Returns all non-terminal saga instances.
    ///
    /// Used by the deadline sweep to find sagas stuck in a pending state.
    async fn list_active(&self) -> Result<Vec<SagaInstance>>;
}
