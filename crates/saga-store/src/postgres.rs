use async_trait::async_trait;
use common::{BookingId, SagaId};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Result, SagaInstance, SagaState, SagaStoreError, StateLogEntry, store::SagaStateStore,
};

/// PostgreSQL-backed saga store implementation.
#[derive(Clone)]
pub struct PostgresSagaStore {
    pool: PgPool,
}

impl PostgresSagaStore {
    /// Creates a new PostgreSQL saga store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        tracing::info!("running saga store migrations");
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_instance(row: PgRow) -> Result<SagaInstance> {
        let state: String = row.try_get("current_state")?;
        Ok(SagaInstance {
            saga_id: SagaId::from_uuid(row.try_get::<Uuid, _>("saga_id")?),
            booking_id: BookingId::from_uuid(row.try_get::<Uuid, _>("booking_id")?),
            current_state: state.parse()?,
            is_compensating: row.try_get("is_compensating")?,
            compensation_reason: row.try_get("compensation_reason")?,
            last_updated_at: row.try_get("last_updated_at")?,
            completed_at: row.try_get("completed_at")?,
        })
    }

    fn row_to_log_entry(row: PgRow) -> Result<StateLogEntry> {
        let from_state: Option<String> = row.try_get("from_state")?;
        let to_state: String = row.try_get("to_state")?;
        Ok(StateLogEntry {
            saga_id: SagaId::from_uuid(row.try_get::<Uuid, _>("saga_id")?),
            booking_id: BookingId::from_uuid(row.try_get::<Uuid, _>("booking_id")?),
            from_state: from_state.map(|s| s.parse()).transpose()?,
            to_state: to_state.parse()?,
            event_type: row.try_get("event_type")?,
            event_payload: row.try_get("event_payload")?,
            error_message: row.try_get("error_message")?,
            timestamp: row.try_get("recorded_at")?,
        })
    }

    async fn append_log_entry<'e, E>(executor: E, entry: &StateLogEntry) -> Result<()>
    where
        E: sqlx::PgExecutor<'e>,
    {
        sqlx::query(
            r#"
            INSERT INTO saga_state_log
                (saga_id, booking_id, from_state, to_state, event_type, event_payload, error_message, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(entry.saga_id.as_uuid())
        .bind(entry.booking_id.as_uuid())
        .bind(entry.from_state.map(|s| s.as_str()))
        .bind(entry.to_state.as_str())
        .bind(&entry.event_type)
        .bind(&entry.event_payload)
        .bind(&entry.error_message)
        .bind(entry.timestamp)
        .execute(executor)
        .await?;
        Ok(())
    }

    async fn upsert_instance<'e, E>(executor: E, instance: &SagaInstance) -> Result<()>
    where
        E: sqlx::PgExecutor<'e>,
    {
        sqlx::query(
            r#"
            UPDATE saga_instances
            SET current_state = $2,
                is_compensating = $3,
                compensation_reason = $4,
                last_updated_at = $5,
                completed_at = $6
            WHERE saga_id = $1
            "#,
        )
        .bind(instance.saga_id.as_uuid())
        .bind(instance.current_state.as_str())
        .bind(instance.is_compensating)
        .bind(&instance.compensation_reason)
        .bind(instance.last_updated_at)
        .bind(instance.completed_at)
        .execute(executor)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl SagaStateStore for PostgresSagaStore {
    async fn insert(&self, instance: &SagaInstance, first_entry: StateLogEntry) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO saga_instances
                (saga_id, booking_id, current_state, is_compensating, compensation_reason, last_updated_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(instance.saga_id.as_uuid())
        .bind(instance.booking_id.as_uuid())
        .bind(instance.current_state.as_str())
        .bind(instance.is_compensating)
        .bind(&instance.compensation_reason)
        .bind(instance.last_updated_at)
        .bind(instance.completed_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return SagaStoreError::DuplicateSaga(instance.saga_id);
            }
            SagaStoreError::Database(e)
        })?;

        Self::append_log_entry(&mut *tx, &first_entry).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, saga_id: SagaId) -> Result<Option<SagaInstance>> {
        let row = sqlx::query(
            r#"
            SELECT saga_id, booking_id, current_state, is_compensating, compensation_reason, last_updated_at, completed_at
            FROM saga_instances
            WHERE saga_id = $1
            "#,
        )
        .bind(saga_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_instance).transpose()
    }

    async fn find_by_booking(&self, booking_id: BookingId) -> Result<Option<SagaInstance>> {
        let row = sqlx::query(
            r#"
            SELECT saga_id, booking_id, current_state, is_compensating, compensation_reason, last_updated_at, completed_at
            FROM saga_instances
            WHERE booking_id = $1
            "#,
        )
        .bind(booking_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_instance).transpose()
    }

    async fn record_transition(
        &self,
        instance: &SagaInstance,
        entries: Vec<StateLogEntry>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<i64> =
            sqlx::query_scalar("SELECT 1 FROM saga_instances WHERE saga_id = $1 FOR UPDATE")
                .bind(instance.saga_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?;
        if exists.is_none() {
            return Err(SagaStoreError::SagaNotFound(instance.saga_id));
        }

        Self::upsert_instance(&mut *tx, instance).await?;
        for entry in &entries {
            Self::append_log_entry(&mut *tx, entry).await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn history(&self, saga_id: SagaId) -> Result<Vec<StateLogEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT saga_id, booking_id, from_state, to_state, event_type, event_payload, error_message, recorded_at
            FROM saga_state_log
            WHERE saga_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(saga_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_log_entry).collect()
    }

    async fn list_active(&self) -> Result<Vec<SagaInstance>> {
        let rows = sqlx::query(
            r#"
            SELECT saga_id, booking_id, current_state, is_compensating, compensation_reason, last_updated_at, completed_at
            FROM saga_instances
            WHERE current_state NOT IN ('BOOKING_COMPLETED', 'BOOKING_CANCELLED')
            ORDER BY last_updated_at ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_instance).collect()
    }
}
