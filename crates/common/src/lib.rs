//! Shared types used across the booking saga workspace.

pub mod types;

pub use types::{BookingId, SagaId};
