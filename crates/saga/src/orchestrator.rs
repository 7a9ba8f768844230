//! The saga orchestrator driver.
//!
//! Wires the normalizer, state machine, stores and publishers together.
//! The machine decides; the driver owns persistence, per-saga locking,
//! duplicate suppression and side-effect publishing. Inbound message
//! handling never propagates internal errors to the broker: a failure
//! is logged with full context and the message counts as handled.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use metrics::{counter, histogram};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use common::{BookingId, SagaId};
use domain::{Booking, BookingStore};
use saga_store::{SagaInstance, SagaStateStore, SagaStoreError, StateLogEntry};
use uuid::Uuid;

use crate::command::{CommandPublisher, SagaCommand};
use crate::config::Config;
use crate::error::{Result, SagaError};
use crate::event::SagaEvent;
use crate::machine::{BookingPatch, Decision, NotificationIntent, SagaContext, SagaMachine, Transition};
use crate::normalizer::{self, RawMessage};
use crate::notification::{NotificationEmitter, NotificationPublisher};

/// Event type recorded for the saga's opening transitions.
const START_EVENT: &str = "SagaStarted";

/// Event type recorded for the manual payment trigger.
const PAYMENT_INITIATED_EVENT: &str = "PaymentInitiated";

/// Event type recorded when the deadline sweep forces compensation.
const DEADLINE_EVENT: &str = "SagaDeadlineExpired";

/// Coordinates booking sagas across the downstream services.
pub struct SagaOrchestrator<S, B, C, N>
where
    S: SagaStateStore,
    B: BookingStore,
    C: CommandPublisher,
    N: NotificationPublisher,
{
    saga_store: Arc<S>,
    booking_store: Arc<B>,
    commands: Arc<C>,
    notifications: Arc<N>,
    machine: SagaMachine,
    emitter: NotificationEmitter,
    config: Config,
    // Per-saga serialization for brokers that cannot guarantee
    // partition-level ordering. Deliveries for different sagas run in
    // parallel; deliveries for the same saga queue behind this lock.
    // Entries are evicted after use so arbitrary inbound saga IDs
    // cannot grow the registry without bound.
    locks: Mutex<HashMap<SagaId, Arc<Mutex<()>>>>,
}

impl<S, B, C, N> SagaOrchestrator<S, B, C, N>
where
    S: SagaStateStore,
    B: BookingStore,
    C: CommandPublisher,
    N: NotificationPublisher,
{
    /// Creates an orchestrator over the given stores and publishers.
    pub fn new(
        saga_store: Arc<S>,
        booking_store: Arc<B>,
        commands: Arc<C>,
        notifications: Arc<N>,
        config: Config,
    ) -> Self {
        Self {
            saga_store,
            booking_store,
            commands,
            notifications,
            machine: SagaMachine::new(),
            emitter: NotificationEmitter,
            config,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Starts the saga for a booking.
    ///
    /// Idempotent: if a saga already exists for the booking it is
    /// returned as-is rather than recreated.
    #[tracing::instrument(skip(self), fields(booking_id = %booking_id))]
    pub async fn start_saga(&self, booking_id: BookingId) -> Result<SagaInstance> {
        let booking = self
            .booking_store
            .get(booking_id)
            .await?
            .ok_or(SagaError::BookingNotFound(booking_id))?;

        if let Some(existing) = self.saga_store.find_by_booking(booking_id).await? {
            debug!(saga_id = %existing.saga_id, "saga already exists, reusing");
            return Ok(existing);
        }

        let saga_id = booking.saga_id;
        let lock = self.saga_lock(saga_id).await;
        let guard = lock.lock().await;
        let result = self.start_saga_locked(booking).await;
        drop(guard);
        drop(lock);
        self.evict_saga_lock(saga_id).await;
        result
    }

    async fn start_saga_locked(&self, mut booking: Booking) -> Result<SagaInstance> {
        let mut instance = SagaInstance::new(booking.saga_id, booking.id);
        let first_entry = StateLogEntry::new(
            instance.saga_id,
            booking.id,
            None,
            instance.current_state,
            START_EVENT,
        );
        match self.saga_store.insert(&instance, first_entry).await {
            Ok(()) => {}
            // Lost the race to a concurrent start; reuse the winner.
            Err(SagaStoreError::DuplicateSaga(saga_id)) => {
                return self
                    .saga_store
                    .get(saga_id)
                    .await?
                    .ok_or(SagaError::SagaNotFound(saga_id));
            }
            Err(err) => return Err(err.into()),
        }

        let transition = self.machine.start(booking.booking_type);
        self.apply_transition(&mut instance, &mut booking, transition, START_EVENT, None, None)
            .await?;

        counter!("saga_started_total").increment(1);
        info!(saga_id = %instance.saga_id, state = %instance.current_state, "saga started");
        Ok(instance)
    }

    /// Handles one raw inbound message.
    ///
    /// Unroutable messages and internal failures are logged and dropped;
    /// the broker never sees an error from this path.
    #[tracing::instrument(skip_all)]
    pub async fn handle_incoming_event(&self, message: &RawMessage) {
        let started = std::time::Instant::now();

        let normalized = match normalizer::normalize(message) {
            Ok(normalized) => normalized,
            Err(err) => {
                warn!(error = %err, "dropping unroutable message");
                counter!("saga_events_dropped_total").increment(1);
                return;
            }
        };

        let event = normalized.event;
        let saga_id = event.saga_id();
        if let Err(err) = self.process_event(&event, normalized.raw).await {
            error!(
                saga_id = %saga_id,
                event_type = event.event_type(),
                error = %err,
                "event handling failed; message considered handled"
            );
            counter!("saga_event_failures_total").increment(1);
            // A cancellation that failed midway must not leave the
            // booking's reservation lock stuck.
            self.release_lock_best_effort(event.booking_id()).await;
        }

        histogram!("saga_event_handle_duration_seconds").record(started.elapsed().as_secs_f64());
    }

    /// Manual payment trigger.
    ///
    /// Allowed only from `FLIGHT_RESERVED`, `HOTEL_RESERVED` or
    /// `PAYMENT_PENDING`; any other state is an invalid-state error
    /// surfaced to the caller.
    #[tracing::instrument(skip(self), fields(booking_id = %booking_id))]
    pub async fn mark_payment_initiated(&self, booking_id: BookingId) -> Result<()> {
        let instance = self
            .saga_store
            .find_by_booking(booking_id)
            .await?
            .ok_or(SagaError::Store(SagaStoreError::NoSagaForBooking(booking_id)))?;

        let saga_id = instance.saga_id;
        let lock = self.saga_lock(saga_id).await;
        let guard = lock.lock().await;
        let result = self.payment_initiated_locked(saga_id, booking_id).await;
        drop(guard);
        drop(lock);
        self.evict_saga_lock(saga_id).await;
        result
    }

    async fn payment_initiated_locked(&self, saga_id: SagaId, booking_id: BookingId) -> Result<()> {
        // Re-read under the lock; a concurrent event may have advanced it.
        let mut instance = self
            .saga_store
            .get(saga_id)
            .await?
            .ok_or(SagaError::SagaNotFound(saga_id))?;
        let mut booking = self
            .booking_store
            .get(booking_id)
            .await?
            .ok_or(SagaError::BookingNotFound(booking_id))?;

        let ctx = SagaContext::new(instance.current_state, booking.booking_type);
        let Some(transition) = self.machine.payment_initiated(ctx)? else {
            debug!(saga_id = %instance.saga_id, "payment already pending");
            return Ok(());
        };

        self.apply_transition(
            &mut instance,
            &mut booking,
            transition,
            PAYMENT_INITIATED_EVENT,
            None,
            None,
        )
        .await
    }

    /// Forces compensation for sagas stuck in a pending state longer
    /// than the configured timeout. Returns how many sagas were expired.
    ///
    /// Intended to run periodically; per-saga failures are logged and
    /// the sweep continues.
    #[tracing::instrument(skip(self))]
    pub async fn sweep_deadlines(&self) -> Result<usize> {
        let cutoff = Utc::now() - self.config.pending_timeout;
        let mut expired = 0;

        for candidate in self.saga_store.list_active().await? {
            if !candidate.current_state.is_pending() || candidate.last_updated_at > cutoff {
                continue;
            }
            match self.expire_saga(candidate.saga_id).await {
                Ok(true) => expired += 1,
                Ok(false) => {}
                Err(err) => {
                    error!(saga_id = %candidate.saga_id, error = %err, "deadline expiry failed");
                }
            }
        }

        if expired > 0 {
            info!(expired, "deadline sweep forced compensation");
            counter!("saga_deadlines_expired_total").increment(expired as u64);
        }
        Ok(expired)
    }

    /// Returns the full transition history for a saga, oldest first.
    pub async fn history(&self, saga_id: SagaId) -> Result<Vec<StateLogEntry>> {
        Ok(self.saga_store.history(saga_id).await?)
    }

    /// Returns the saga instance coordinating a booking, if one exists.
    pub async fn find_saga(&self, booking_id: BookingId) -> Result<Option<SagaInstance>> {
        Ok(self.saga_store.find_by_booking(booking_id).await?)
    }

    async fn process_event(&self, event: &SagaEvent, raw: serde_json::Value) -> Result<()> {
        let saga_id = event.saga_id();
        let lock = self.saga_lock(saga_id).await;
        let guard = lock.lock().await;
        let result = self.process_event_locked(saga_id, event, raw).await;
        drop(guard);
        drop(lock);
        self.evict_saga_lock(saga_id).await;
        result
    }

    async fn process_event_locked(
        &self,
        saga_id: SagaId,
        event: &SagaEvent,
        raw: serde_json::Value,
    ) -> Result<()> {
        let Some(mut instance) = self.saga_store.get(saga_id).await? else {
            warn!(saga_id = %saga_id, event_type = event.event_type(), "no saga for event, dropping");
            counter!("saga_events_dropped_total").increment(1);
            return Ok(());
        };
        let mut booking = self
            .booking_store
            .get(instance.booking_id)
            .await?
            .ok_or(SagaError::BookingNotFound(instance.booking_id))?;

        let ctx = SagaContext::new(instance.current_state, booking.booking_type);
        match self.machine.decide(ctx, event) {
            Decision::Ignore { reason } => {
                debug!(saga_id = %saga_id, event_type = event.event_type(), reason, "event ignored");
                counter!("saga_events_ignored_total").increment(1);
                Ok(())
            }
            Decision::Acknowledge => {
                let entry = StateLogEntry::new(
                    saga_id,
                    instance.booking_id,
                    Some(instance.current_state),
                    instance.current_state,
                    event.event_type(),
                )
                .with_payload(raw);
                self.saga_store.record_transition(&instance, vec![entry]).await?;
                debug!(saga_id = %saga_id, event_type = event.event_type(), "acknowledgement logged");
                Ok(())
            }
            Decision::Apply(transition) => {
                let payment_ref = match event {
                    SagaEvent::PaymentProcessed(data) => {
                        data.payment_id.clone().or_else(|| data.transaction_id.clone())
                    }
                    _ => None,
                };
                self.apply_transition(
                    &mut instance,
                    &mut booking,
                    transition,
                    event.event_type(),
                    Some(raw),
                    payment_ref.as_deref(),
                )
                .await
            }
        }
    }

    async fn expire_saga(&self, saga_id: SagaId) -> Result<bool> {
        let lock = self.saga_lock(saga_id).await;
        let guard = lock.lock().await;
        let result = self.expire_saga_locked(saga_id).await;
        drop(guard);
        drop(lock);
        self.evict_saga_lock(saga_id).await;
        result
    }

    async fn expire_saga_locked(&self, saga_id: SagaId) -> Result<bool> {
        // Re-read under the lock; the saga may have moved on since the
        // sweep listed it.
        let Some(mut instance) = self.saga_store.get(saga_id).await? else {
            return Ok(false);
        };
        let cutoff = Utc::now() - self.config.pending_timeout;
        if !instance.current_state.is_pending() || instance.last_updated_at > cutoff {
            return Ok(false);
        }
        let mut booking = self
            .booking_store
            .get(instance.booking_id)
            .await?
            .ok_or(SagaError::BookingNotFound(instance.booking_id))?;

        let ctx = SagaContext::new(instance.current_state, booking.booking_type);
        let Some(transition) = self.machine.expire(ctx) else {
            return Ok(false);
        };
        warn!(saga_id = %saga_id, state = %ctx.state, "pending deadline exceeded, compensating");
        self.apply_transition(&mut instance, &mut booking, transition, DEADLINE_EVENT, None, None)
            .await?;
        Ok(true)
    }

    /// Applies one transition as a unit: advance the instance, patch
    /// the booking mirror, persist both, then publish side effects.
    async fn apply_transition(
        &self,
        instance: &mut SagaInstance,
        booking: &mut Booking,
        transition: Transition,
        event_type: &str,
        payload: Option<serde_json::Value>,
        payment_ref: Option<&str>,
    ) -> Result<()> {
        if transition.changes.is_empty() {
            return Ok(());
        }

        let mut entries = Vec::with_capacity(transition.changes.len());
        for (i, change) in transition.changes.iter().enumerate() {
            let mut entry = StateLogEntry::new(
                instance.saga_id,
                instance.booking_id,
                Some(instance.current_state),
                change.to,
                event_type,
            );
            // The raw payload is audited once, on the entry that
            // recorded the triggering event.
            if i == 0 {
                if let Some(payload) = &payload {
                    entry = entry.with_payload(payload.clone());
                }
            }
            if let Some(error) = &change.error {
                entry = entry.with_error(error.clone());
            }
            instance.advance_to(change.to);
            entries.push(entry);
        }

        if let Some(reason) = &transition.compensation_reason {
            instance.set_compensation_reason(reason.clone());
            booking.set_compensation_reason(reason.clone());
        }
        match &transition.booking {
            Some(BookingPatch::Lock) => booking.take_reservation_lock(),
            Some(BookingPatch::Confirm) => {
                if booking.confirmation_number.is_none() {
                    let number = self.generate_confirmation_number();
                    booking.assign_confirmation_number(number);
                }
                booking.mark_confirmed();
            }
            Some(BookingPatch::Cancel { status, reason }) => {
                booking.mark_cancelled(*status, reason.clone());
            }
            None => {}
        }
        booking.set_saga_state(instance.current_state.as_str());

        self.saga_store.record_transition(instance, entries).await?;
        self.booking_store.update(booking.clone()).await?;

        for change in &transition.changes {
            counter!("saga_transitions_total", "to_state" => change.to.as_str()).increment(1);
        }

        for intent in &transition.commands {
            let mut command = SagaCommand::for_booking(booking, intent.action);
            let is_compensation = intent.compensation_reason.is_some();
            if let Some(reason) = &intent.compensation_reason {
                command = command.compensating(reason.clone());
            }
            match self.commands.publish(&command).await {
                Ok(()) => {
                    counter!("saga_commands_published_total", "action" => intent.action.as_str())
                        .increment(1);
                }
                // Compensation publishes are best-effort: the saga is
                // already recorded as cancelled, so log and move on.
                Err(err) if is_compensation => {
                    error!(
                        saga_id = %instance.saga_id,
                        action = %intent.action,
                        error = %err,
                        "compensation command publish failed"
                    );
                    counter!("saga_compensation_publish_failures_total").increment(1);
                }
                Err(err) => return Err(err),
            }
        }

        for intent in &transition.notifications {
            let event = match intent {
                NotificationIntent::PaymentSucceeded => {
                    self.emitter.payment_succeeded(booking, payment_ref)
                }
                NotificationIntent::BookingConfirmed => self.emitter.booking_confirmed(booking),
            };
            if let Err(err) = self.notifications.publish(&event).await {
                error!(
                    saga_id = %instance.saga_id,
                    event_type = %event.event_type,
                    error = %err,
                    "notification publish failed"
                );
                counter!("saga_notification_publish_failures_total").increment(1);
            }
        }

        info!(
            saga_id = %instance.saga_id,
            event_type,
            state = %instance.current_state,
            "transition applied"
        );
        Ok(())
    }

    fn generate_confirmation_number(&self) -> String {
        let suffix = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
        format!("{}-{}", self.config.confirmation_prefix, suffix)
    }

    async fn saga_lock(&self, saga_id: SagaId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(saga_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drops a saga's lock entry once no task holds a clone of it.
    ///
    /// Callers must release their guard and clone first. An entry with
    /// waiters has a strong count above one and stays in the registry,
    /// so the registry size is bounded by in-flight sagas rather than
    /// by every saga ID ever seen on the wire.
    async fn evict_saga_lock(&self, saga_id: SagaId) {
        let mut locks = self.locks.lock().await;
        if let Some(entry) = locks.get(&saga_id)
            && Arc::strong_count(entry) == 1
        {
            locks.remove(&saga_id);
        }
    }

    /// Makes sure a failed cancellation path cannot leave the booking's
    /// reservation lock held. The release itself is not retried.
    async fn release_lock_best_effort(&self, booking_id: BookingId) {
        let booking = match self.booking_store.get(booking_id).await {
            Ok(Some(booking)) if booking.reservation_locked => booking,
            Ok(_) => return,
            Err(err) => {
                warn!(booking_id = %booking_id, error = %err, "lock-release load failed");
                return;
            }
        };
        let mut booking = booking;
        booking.release_reservation_lock();
        if let Err(err) = self.booking_store.update(booking).await {
            warn!(booking_id = %booking_id, error = %err, "reservation lock release failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::InMemoryCommandPublisher;
    use crate::notification::InMemoryNotificationPublisher;
    use chrono::NaiveDate;
    use domain::{
        Booking, BookingType, FlightDetails, InMemoryBookingStore, Money, ProductPayload, Traveler,
    };
    use saga_store::InMemorySagaStore;
    use serde_json::json;

    type TestOrchestrator = SagaOrchestrator<
        InMemorySagaStore,
        InMemoryBookingStore,
        InMemoryCommandPublisher,
        InMemoryNotificationPublisher,
    >;

    fn orchestrator() -> TestOrchestrator {
        SagaOrchestrator::new(
            Arc::new(InMemorySagaStore::new()),
            Arc::new(InMemoryBookingStore::new()),
            Arc::new(InMemoryCommandPublisher::new()),
            Arc::new(InMemoryNotificationPublisher::new()),
            Config::default(),
        )
    }

    fn event(event_type: &str, saga_id: SagaId, booking_id: BookingId) -> RawMessage {
        let body = json!({"bookingId": booking_id, "sagaId": saga_id}).to_string();
        RawMessage::with_event_type(event_type, body)
    }

    async fn flight_booking(orchestrator: &TestOrchestrator) -> (BookingId, SagaId) {
        let flight = FlightDetails {
            flight_number: "DL 8".to_string(),
            origin: "ATL".to_string(),
            destination: "AMS".to_string(),
            departure_date: NaiveDate::from_ymd_opt(2026, 9, 3).unwrap(),
            return_date: None,
            passengers: vec![Traveler::new("Omar", "Reyes", Some("omar@example.com".into()))],
        };
        let booking = Booking::new(
            BookingId::new(),
            "CUST-55",
            BookingType::Flight,
            Money::usd(62000),
            ProductPayload::flight_only(flight),
        );
        let (booking_id, saga_id) = (booking.id, booking.saga_id);
        orchestrator.booking_store.insert(booking).await.unwrap();
        (booking_id, saga_id)
    }

    async fn lock_count(orchestrator: &TestOrchestrator) -> usize {
        orchestrator.locks.lock().await.len()
    }

    #[tokio::test]
    async fn lock_registry_does_not_retain_unknown_sagas() {
        let orchestrator = orchestrator();

        // At-least-once brokers can replay events for sagas this
        // instance has never seen; none of them may pin an entry.
        for _ in 0..100 {
            let message = event("FlightReserved", SagaId::new(), BookingId::new());
            orchestrator.handle_incoming_event(&message).await;
        }

        assert_eq!(lock_count(&orchestrator).await, 0);
    }

    #[tokio::test]
    async fn lock_registry_is_empty_after_saga_completes() {
        let orchestrator = orchestrator();
        let (booking_id, saga_id) = flight_booking(&orchestrator).await;

        orchestrator.start_saga(booking_id).await.unwrap();
        assert_eq!(lock_count(&orchestrator).await, 0);

        orchestrator
            .handle_incoming_event(&event("FlightReserved", saga_id, booking_id))
            .await;
        orchestrator
            .handle_incoming_event(&event("PaymentProcessed", saga_id, booking_id))
            .await;
        // Late replay on the terminal saga must not re-pin an entry.
        orchestrator
            .handle_incoming_event(&event("PaymentProcessed", saga_id, booking_id))
            .await;

        let instance = orchestrator.find_saga(booking_id).await.unwrap().unwrap();
        assert_eq!(instance.current_state, saga_store::SagaState::BookingCompleted);
        assert_eq!(lock_count(&orchestrator).await, 0);
    }
}
