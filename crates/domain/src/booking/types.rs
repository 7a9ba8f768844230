//! Product composition and status types for bookings.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Product composition of a booking.
///
/// The composition conditions the saga path: a combo booking reserves
/// flight then hotel before payment, single-product bookings skip the
/// missing leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingType {
    /// Flight-only booking.
    Flight,

    /// Hotel-only booking.
    Hotel,

    /// Flight plus hotel, both reservations required before payment.
    Combo,
}

impl BookingType {
    /// Returns true if the booking includes a flight component.
    pub fn has_flight(&self) -> bool {
        matches!(self, BookingType::Flight | BookingType::Combo)
    }

    /// Returns true if the booking includes a hotel component.
    pub fn has_hotel(&self) -> bool {
        matches!(self, BookingType::Hotel | BookingType::Combo)
    }

    /// Returns the type name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingType::Flight => "FLIGHT",
            BookingType::Hotel => "HOTEL",
            BookingType::Combo => "COMBO",
        }
    }
}

impl std::fmt::Display for BookingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Business-facing status of a booking.
///
/// Distinct from the saga state: this is what external readers observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    /// Booking created, saga in flight.
    #[default]
    Pending,

    /// Saga completed successfully, confirmation number assigned.
    Confirmed,

    /// A reservation could not be made (flight or hotel unavailable).
    ValidationFailed,

    /// Payment was declined after reservations were made.
    PaymentFailed,

    /// Booking cancelled (payment refunded or manual cancellation).
    Cancelled,
}

impl BookingStatus {
    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::ValidationFailed => "VALIDATION_FAILED",
            BookingStatus::PaymentFailed => "PAYMENT_FAILED",
            BookingStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A monetary amount in minor units with its currency code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    cents: i64,
    currency: String,
}

impl Money {
    /// Creates a money value from minor units and a currency code.
    pub fn new(cents: i64, currency: impl Into<String>) -> Self {
        Self {
            cents,
            currency: currency.into(),
        }
    }

    /// Creates a USD money value from cents.
    pub fn usd(cents: i64) -> Self {
        Self::new(cents, "USD")
    }

    /// Returns the amount in minor units.
    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns the currency code.
    pub fn currency(&self) -> &str {
        &self.currency
    }

    /// Returns the amount in major units for display payloads.
    pub fn as_major_units(&self) -> f64 {
        self.cents as f64 / 100.0
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::usd(0)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2} {}", self.as_major_units(), self.currency)
    }
}

/// A passenger or hotel guest on a booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Traveler {
    /// Given name.
    pub first_name: String,

    /// Family name.
    pub last_name: String,

    /// Contact email; may be absent or blank for secondary travelers.
    pub email: Option<String>,
}

impl Traveler {
    /// Creates a traveler with an email address.
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: Option<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            email,
        }
    }

    /// Returns true if the traveler has a non-blank email address.
    pub fn has_email(&self) -> bool {
        self.email
            .as_deref()
            .is_some_and(|e| !e.trim().is_empty())
    }

    /// Returns the traveler's full name.
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Flight reservation details stored on a booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightDetails {
    /// Marketing flight number, e.g. "LH 402".
    pub flight_number: String,

    /// IATA code of the origin airport.
    pub origin: String,

    /// IATA code of the destination airport.
    pub destination: String,

    /// Outbound departure date.
    pub departure_date: NaiveDate,

    /// Return date for round trips.
    pub return_date: Option<NaiveDate>,

    /// Passengers on the reservation, lead passenger first.
    pub passengers: Vec<Traveler>,
}

/// Hotel reservation details stored on a booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotelDetails {
    /// Hotel name.
    pub hotel_name: String,

    /// City of the property.
    pub city: String,

    /// Check-in date.
    pub check_in: NaiveDate,

    /// Check-out date.
    pub check_out: NaiveDate,

    /// Room category, e.g. "DOUBLE".
    pub room_type: String,

    /// Guests on the reservation, lead guest first.
    pub guests: Vec<Traveler>,
}

/// The product payload stored on a booking.
///
/// At least one of the two sections is present; a combo booking has both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPayload {
    /// Flight section, present when the booking type has a flight component.
    pub flight: Option<FlightDetails>,

    /// Hotel section, present when the booking type has a hotel component.
    pub hotel: Option<HotelDetails>,
}

impl ProductPayload {
    /// Creates a flight-only payload.
    pub fn flight_only(flight: FlightDetails) -> Self {
        Self {
            flight: Some(flight),
            hotel: None,
        }
    }

    /// Creates a hotel-only payload.
    pub fn hotel_only(hotel: HotelDetails) -> Self {
        Self {
            flight: None,
            hotel: Some(hotel),
        }
    }

    /// Creates a combo payload with both sections.
    pub fn combo(flight: FlightDetails, hotel: HotelDetails) -> Self {
        Self {
            flight: Some(flight),
            hotel: Some(hotel),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booking_type_components() {
        assert!(BookingType::Flight.has_flight());
        assert!(!BookingType::Flight.has_hotel());
        assert!(!BookingType::Hotel.has_flight());
        assert!(BookingType::Hotel.has_hotel());
        assert!(BookingType::Combo.has_flight());
        assert!(BookingType::Combo.has_hotel());
    }

    #[test]
    fn booking_status_display() {
        assert_eq!(BookingStatus::ValidationFailed.to_string(), "VALIDATION_FAILED");
        assert_eq!(BookingStatus::PaymentFailed.to_string(), "PAYMENT_FAILED");
        assert_eq!(BookingStatus::Confirmed.to_string(), "CONFIRMED");
    }

    #[test]
    fn money_display_uses_major_units() {
        let m = Money::new(123456, "EUR");
        assert_eq!(m.to_string(), "1234.56 EUR");
        assert_eq!(m.cents(), 123456);
    }

    #[test]
    fn traveler_blank_email_does_not_count() {
        let t = Traveler::new("Ana", "Sousa", Some("  ".to_string()));
        assert!(!t.has_email());

        let t = Traveler::new("Ana", "Sousa", None);
        assert!(!t.has_email());

        let t = Traveler::new("Ana", "Sousa", Some("ana@example.com".to_string()));
        assert!(t.has_email());
    }

    #[test]
    fn booking_type_serialization() {
        let json = serde_json::to_string(&BookingType::Combo).unwrap();
        assert_eq!(json, "\"COMBO\"");
        let parsed: BookingType = serde_json::from_str("\"FLIGHT\"").unwrap();
        assert_eq!(parsed, BookingType::Flight);
    }
}
