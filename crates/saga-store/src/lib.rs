//! Persistence for booking saga instances and their transition log.
//!
//! A saga is stored as one mutable [`SagaInstance`] row plus an
//! append-only sequence of [`StateLogEntry`] rows. The
//! [`SagaStateStore`] trait is the boundary the orchestrator works
//! against; [`InMemorySagaStore`] backs tests and [`PostgresSagaStore`]
//! backs production.

pub mod error;
pub mod instance;
pub mod log;
pub mod memory;
pub mod postgres;
pub mod state;
pub mod store;

pub use error::{Result, SagaStoreError};
pub use instance::SagaInstance;
pub use log::StateLogEntry;
pub use memory::InMemorySagaStore;
pub use postgres::PostgresSagaStore;
pub use state::SagaState;
pub use store::SagaStateStore;
