//! Outbound domain-event notifications.
//!
//! On payment capture and booking completion the orchestrator publishes
//! enriched domain events for the notification service. Payloads carry
//! everything the consumer needs (contact, product details, template
//! hint) so it stays free of booking-domain knowledge.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::BookingId;
use domain::{Booking, FlightDetails, HotelDetails, Traveler};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::SagaError;

/// Generic domain-event envelope published on the notification channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainEventEnvelope {
    /// Event type name, e.g. `BookingConfirmed`.
    pub event_type: String,

    /// Always `Booking` for events emitted here.
    pub aggregate_type: String,

    /// The booking the event concerns.
    pub aggregate_id: BookingId,

    /// Enriched event payload.
    pub payload: Value,

    /// When the event was assembled.
    pub occurred_at: DateTime<Utc>,
}

impl DomainEventEnvelope {
    fn booking_event(event_type: &str, booking_id: BookingId, payload: Value) -> Self {
        Self {
            event_type: event_type.to_string(),
            aggregate_type: "Booking".to_string(),
            aggregate_id: booking_id,
            payload,
            occurred_at: Utc::now(),
        }
    }
}

/// Trait for publishing domain events to the notification channel.
#[async_trait]
pub trait NotificationPublisher: Send + Sync {
    /// Publishes an event.
    async fn publish(&self, event: &DomainEventEnvelope) -> Result<(), SagaError>;
}

#[derive(Debug, Default)]
struct InMemoryNotificationState {
    published: Vec<DomainEventEnvelope>,
    fail_on_publish: bool,
}

/// In-memory notification publisher for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotificationPublisher {
    state: Arc<RwLock<InMemoryNotificationState>>,
}

impl InMemoryNotificationPublisher {
    /// Creates a new in-memory notification publisher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the publisher to fail on subsequent publish calls.
    pub fn set_fail_on_publish(&self, fail: bool) {
        self.state.write().unwrap().fail_on_publish = fail;
    }

    /// Returns all published events in publish order.
    pub fn published(&self) -> Vec<DomainEventEnvelope> {
        self.state.read().unwrap().published.clone()
    }

    /// Returns the published events of one type, in order.
    pub fn published_of_type(&self, event_type: &str) -> Vec<DomainEventEnvelope> {
        self.state
            .read()
            .unwrap()
            .published
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }

    /// Returns the number of published events.
    pub fn event_count(&self) -> usize {
        self.state.read().unwrap().published.len()
    }
}

#[async_trait]
impl NotificationPublisher for InMemoryNotificationPublisher {
    async fn publish(&self, event: &DomainEventEnvelope) -> Result<(), SagaError> {
        let mut state = self.state.write().unwrap();
        if state.fail_on_publish {
            return Err(SagaError::NotificationPublish(
                "notification channel unavailable".to_string(),
            ));
        }
        state.published.push(event.clone());
        Ok(())
    }
}

/// Assembles notification payloads from the booking record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotificationEmitter;

impl NotificationEmitter {
    /// Builds the `BookingConfirmed` event emitted on completion.
    pub fn booking_confirmed(&self, booking: &Booking) -> DomainEventEnvelope {
        let mut payload = self.base_payload(booking);
        payload["emailTemplate"] = json!("booking-confirmation");
        if let Some(number) = &booking.confirmation_number {
            payload["confirmationNumber"] = json!(number);
        }
        DomainEventEnvelope::booking_event("BookingConfirmed", booking.id, payload)
    }

    /// Builds the `PaymentSucceeded` event emitted on payment capture.
    pub fn payment_succeeded(&self, booking: &Booking, payment_id: Option<&str>) -> DomainEventEnvelope {
        let mut payload = self.base_payload(booking);
        payload["emailTemplate"] = json!("payment-receipt");
        if let Some(payment_id) = payment_id {
            payload["paymentId"] = json!(payment_id);
        }
        DomainEventEnvelope::booking_event("PaymentSucceeded", booking.id, payload)
    }

    fn base_payload(&self, booking: &Booking) -> Value {
        let mut payload = json!({
            "bookingId": booking.id,
            "sagaId": booking.saga_id,
            "customerId": booking.customer_id,
            "bookingType": booking.booking_type,
            "status": booking.status,
            "amount": booking.total_amount.as_major_units(),
            "currency": booking.total_amount.currency(),
            "productDetails": product_details(booking),
        });
        if let Some(state) = &booking.saga_state {
            payload["sagaState"] = json!(state);
        }
        if let Some(contact) = primary_contact(booking) {
            payload["primaryContact"] = contact;
        }
        payload
    }
}

/// Picks the traveler to address notifications to.
///
/// Flight passengers are preferred over hotel guests for combo
/// bookings; within the pool, the first traveler with a non-blank
/// email wins, falling back to the first entry when none has one.
fn primary_contact(booking: &Booking) -> Option<Value> {
    let mut pool: Vec<&Traveler> = Vec::new();
    if let Some(flight) = &booking.products.flight {
        pool.extend(flight.passengers.iter());
    }
    if let Some(hotel) = &booking.products.hotel {
        pool.extend(hotel.guests.iter());
    }

    let chosen = pool
        .iter()
        .find(|t| t.has_email())
        .or_else(|| pool.first())?;

    Some(json!({
        "name": chosen.full_name(),
        "email": chosen.email,
    }))
}

fn product_details(booking: &Booking) -> Value {
    let mut details = json!({});
    if let Some(flight) = &booking.products.flight {
        details["flight"] = flight_block(flight);
    }
    if let Some(hotel) = &booking.products.hotel {
        details["hotel"] = hotel_block(hotel);
    }
    details
}

fn flight_block(flight: &FlightDetails) -> Value {
    json!({
        "flightNumber": flight.flight_number,
        "origin": flight.origin,
        "destination": flight.destination,
        "departureDate": flight.departure_date,
        "returnDate": flight.return_date,
        "passengerCount": flight.passengers.len(),
    })
}

fn hotel_block(hotel: &HotelDetails) -> Value {
    json!({
        "hotelName": hotel.hotel_name,
        "city": hotel.city,
        "checkIn": hotel.check_in,
        "checkOut": hotel.check_out,
        "roomType": hotel.room_type,
        "guestCount": hotel.guests.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use domain::{BookingType, Money, ProductPayload};

    fn combo_booking() -> Booking {
        let flight = FlightDetails {
            flight_number: "BA 117".to_string(),
            origin: "LHR".to_string(),
            destination: "JFK".to_string(),
            departure_date: NaiveDate::from_ymd_opt(2026, 11, 2).unwrap(),
            return_date: Some(NaiveDate::from_ymd_opt(2026, 11, 9).unwrap()),
            passengers: vec![
                Traveler::new("Mia", "Lund", None),
                Traveler::new("Jon", "Lund", Some("jon@example.com".into())),
            ],
        };
        let hotel = HotelDetails {
            hotel_name: "Harbor Inn".to_string(),
            city: "New York".to_string(),
            check_in: NaiveDate::from_ymd_opt(2026, 11, 2).unwrap(),
            check_out: NaiveDate::from_ymd_opt(2026, 11, 9).unwrap(),
            room_type: "Double".to_string(),
            guests: vec![Traveler::new("Mia", "Lund", Some("mia@example.com".into()))],
        };
        Booking::new(
            BookingId::new(),
            "CUST-11",
            BookingType::Combo,
            Money::usd(210000),
            ProductPayload::combo(flight, hotel),
        )
    }

    #[test]
    fn booking_confirmed_carries_template_and_confirmation() {
        let mut booking = combo_booking();
        booking.assign_confirmation_number("BK-1A2B3C4D");
        let event = NotificationEmitter.booking_confirmed(&booking);

        assert_eq!(event.event_type, "BookingConfirmed");
        assert_eq!(event.aggregate_type, "Booking");
        assert_eq!(event.aggregate_id, booking.id);
        assert_eq!(event.payload["emailTemplate"], "booking-confirmation");
        assert_eq!(event.payload["confirmationNumber"], "BK-1A2B3C4D");
        assert_eq!(event.payload["productDetails"]["flight"]["flightNumber"], "BA 117");
        assert_eq!(event.payload["productDetails"]["hotel"]["guestCount"], 1);
    }

    #[test]
    fn primary_contact_prefers_flight_passenger_with_email() {
        let booking = combo_booking();
        let event = NotificationEmitter.payment_succeeded(&booking, Some("PAY-9"));

        // Mia (flight, no email) is skipped; Jon (flight) wins over
        // Mia's hotel-guest entry with an email.
        assert_eq!(event.payload["primaryContact"]["name"], "Jon Lund");
        assert_eq!(event.payload["primaryContact"]["email"], "jon@example.com");
        assert_eq!(event.payload["paymentId"], "PAY-9");
        assert_eq!(event.payload["emailTemplate"], "payment-receipt");
    }

    #[test]
    fn primary_contact_falls_back_to_first_traveler() {
        let flight = FlightDetails {
            flight_number: "AF 22".to_string(),
            origin: "CDG".to_string(),
            destination: "BOS".to_string(),
            departure_date: NaiveDate::from_ymd_opt(2026, 12, 1).unwrap(),
            return_date: None,
            passengers: vec![Traveler::new("Eva", "Brandt", None)],
        };
        let booking = Booking::new(
            BookingId::new(),
            "CUST-12",
            BookingType::Flight,
            Money::usd(38000),
            ProductPayload::flight_only(flight),
        );
        let event = NotificationEmitter.booking_confirmed(&booking);

        assert_eq!(event.payload["primaryContact"]["name"], "Eva Brandt");
        assert!(event.payload["primaryContact"]["email"].is_null());
    }

    #[tokio::test]
    async fn in_memory_publisher_filters_by_type() {
        let publisher = InMemoryNotificationPublisher::new();
        let booking = combo_booking();

        publisher
            .publish(&NotificationEmitter.payment_succeeded(&booking, None))
            .await
            .unwrap();
        publisher
            .publish(&NotificationEmitter.booking_confirmed(&booking))
            .await
            .unwrap();

        assert_eq!(publisher.event_count(), 2);
        assert_eq!(publisher.published_of_type("BookingConfirmed").len(), 1);
    }

    #[tokio::test]
    async fn fail_on_publish() {
        let publisher = InMemoryNotificationPublisher::new();
        publisher.set_fail_on_publish(true);
        let booking = combo_booking();

        let result = publisher
            .publish(&NotificationEmitter.booking_confirmed(&booking))
            .await;
        assert!(matches!(result, Err(SagaError::NotificationPublish(_))));
        assert_eq!(publisher.event_count(), 0);
    }
}
