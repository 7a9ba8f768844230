//! Booking domain layer.
//!
//! This crate owns the booking record as seen by the saga orchestrator:
//! the product composition (flight, hotel, or both), the business-facing
//! status, and the handful of fields the orchestrator mirrors on every
//! saga transition. The full CRUD surface of bookings lives elsewhere;
//! only the [`BookingStore`] boundary is modeled here.

pub mod booking;
pub mod error;
pub mod store;

pub use booking::{
    Booking, BookingStatus, BookingType, FlightDetails, HotelDetails, Money, ProductPayload,
    Traveler,
};
pub use error::BookingError;
pub use store::{BookingStore, InMemoryBookingStore};
