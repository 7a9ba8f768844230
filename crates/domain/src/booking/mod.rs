//! Booking record and product payload types.

mod record;
mod types;

pub use record::Booking;
pub use types::{BookingStatus, BookingType, FlightDetails, HotelDetails, Money, ProductPayload, Traveler};
