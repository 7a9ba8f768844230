use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{BookingId, SagaId};
use tokio::sync::RwLock;

use crate::{
    Result, SagaInstance, SagaStoreError, StateLogEntry, store::SagaStateStore,
};

#[derive(Default)]
struct Inner {
    instances: HashMap<SagaId, SagaInstance>,
    log: Vec<StateLogEntry>,
}

/// In-memory saga store for testing.
///
/// Stores instances and the state log in memory and provides the same
/// interface as the PostgreSQL implementation. Instance update and log
/// append happen under one write lock, matching the transactional
/// behavior of the database-backed store.
#[derive(Clone, Default)]
pub struct InMemorySagaStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemorySagaStore {
    /// Creates a new empty in-memory saga store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of log entries across all sagas.
    pub async fn log_len(&self) -> usize {
        self.inner.read().await.log.len()
    }
}

#[async_trait]
impl SagaStateStore for InMemorySagaStore {
    async fn insert(&self, instance: &SagaInstance, first_entry: StateLogEntry) -> Result<()> {
        let mut inner = self.inner.write().await;
        if inner.instances.contains_key(&instance.saga_id) {
            return Err(SagaStoreError::DuplicateSaga(instance.saga_id));
        }
        inner.instances.insert(instance.saga_id, instance.clone());
        inner.log.push(first_entry);
        Ok(())
    }

    async fn get(&self, saga_id: SagaId) -> Result<Option<SagaInstance>> {
        Ok(self.inner.read().await.instances.get(&saga_id).cloned())
    }

    async fn find_by_booking(&self, booking_id: BookingId) -> Result<Option<SagaInstance>> {
        Ok(self
            .inner
            .read()
            .await
            .instances
            .values()
            .find(|i| i.booking_id == booking_id)
            .cloned())
    }

    async fn record_transition(
        &self,
        instance: &SagaInstance,
        entries: Vec<StateLogEntry>,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        if !inner.instances.contains_key(&instance.saga_id) {
            return Err(SagaStoreError::SagaNotFound(instance.saga_id));
        }
        inner.instances.insert(instance.saga_id, instance.clone());
        inner.log.extend(entries);
        Ok(())
    }

    async fn history(&self, saga_id: SagaId) -> Result<Vec<StateLogEntry>> {
        Ok(self
            .inner
            .read()
            .await
            .log
            .iter()
            .filter(|e| e.saga_id == saga_id)
            .cloned()
            .collect())
    }

    async fn list_active(&self) -> Result<Vec<SagaInstance>> {
        Ok(self
            .inner
            .read()
            .await
            .instances
            .values()
            .filter(|i| !i.is_terminal())
            .cloned()
            .collect())
    }
}
