//! Booking saga orchestration.
//!
//! This crate coordinates a multi-step booking (flight reservation,
//! hotel reservation, payment capture) as one logical transaction
//! across independent services, with compensating cancellations on
//! failure.
//!
//! A combo booking follows these steps:
//! 1. Reserve the flight
//! 2. Reserve the hotel
//! 3. Capture the payment
//!
//! If a step fails, previously acquired resources are released in
//! reverse order before the booking is cancelled. Duplicate and late
//! event deliveries are ignored, so at-least-once consumption is safe.

pub mod command;
pub mod compensation;
pub mod config;
pub mod error;
pub mod event;
pub mod machine;
pub mod normalizer;
pub mod notification;
pub mod orchestrator;

pub use command::{CommandAction, CommandPublisher, InMemoryCommandPublisher, SagaCommand};
pub use config::Config;
pub use error::{Result, SagaError};
pub use event::{NormalizedEvent, SagaEvent};
pub use machine::{Decision, FamilyHandler, SagaContext, SagaMachine, Transition};
pub use normalizer::{normalize, NormalizeError, RawMessage};
pub use notification::{
    DomainEventEnvelope, InMemoryNotificationPublisher, NotificationEmitter, NotificationPublisher,
};
pub use orchestrator::SagaOrchestrator;
