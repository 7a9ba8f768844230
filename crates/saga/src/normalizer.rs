//! Inbound message normalization.
//!
//! Downstream services publish result events with inconsistent envelopes:
//! the body may be double-encoded JSON, the event type may live in a
//! header or any of several body fields, and the interesting fields may
//! be nested under `payload`/`data` wrappers. The normalizer turns all of
//! that into a single flat map, resolves the canonical event type, and
//! produces a typed [`SagaEvent`]. It is the only producer of saga events.

use std::collections::HashMap;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::event::{NormalizedEvent, SagaEvent};

/// Header key carrying the authoritative event type.
pub const EVENT_TYPE_HEADER: &str = "eventType";

/// Body fields probed for the event type, in priority order.
const TYPE_FIELDS: [&str; 3] = ["eventType", "event_type", "type"];

/// Wrapper keys whose object contents are merged into the parent map.
const WRAPPER_KEYS: [&str; 2] = ["payload", "data"];

/// A raw inbound broker message: header map plus body text.
#[derive(Debug, Clone, Default)]
pub struct RawMessage {
    /// Broker headers.
    pub headers: HashMap<String, String>,

    /// Message body, expected to be JSON (possibly double-encoded).
    pub body: String,
}

impl RawMessage {
    /// Creates a message with no headers.
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    /// Creates a message with an `eventType` header.
    pub fn with_event_type(event_type: impl Into<String>, body: impl Into<String>) -> Self {
        let mut headers = HashMap::new();
        headers.insert(EVENT_TYPE_HEADER.to_string(), event_type.into());
        Self {
            headers,
            body: body.into(),
        }
    }
}

/// Reasons a message cannot be normalized.
///
/// All of these cause the message to be dropped (logged, not retried).
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// The body is not JSON, even after unwrapping double encoding.
    #[error("Message body is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The body is JSON but not an object.
    #[error("Message body is not a JSON object")]
    NotAnObject,

    /// No event type could be resolved from header, body, or heuristics.
    #[error("No event type could be resolved")]
    NoEventType,

    /// The resolved event type is not one the saga consumes.
    #[error("Unsupported event type: {0}")]
    UnsupportedType(String),

    /// The payload is missing required identifiers for the event type.
    #[error("Malformed {event_type} payload: {source}")]
    MalformedPayload {
        event_type: String,
        source: serde_json::Error,
    },
}

/// Normalizes a raw message into a typed saga event.
pub fn normalize(message: &RawMessage) -> Result<NormalizedEvent, NormalizeError> {
    let body = parse_body(&message.body)?;
    let Value::Object(envelope) = body else {
        return Err(NormalizeError::NotAnObject);
    };

    let flat = flatten(envelope);

    let event_type = resolve_event_type(message, &flat).ok_or(NormalizeError::NoEventType)?;

    let raw = Value::Object(flat);
    let event = to_typed_event(&event_type, raw.clone())?;

    Ok(NormalizedEvent { event, raw })
}

/// Parses the body, unwrapping one level of double encoding.
fn parse_body(body: &str) -> Result<Value, serde_json::Error> {
    let value: Value = serde_json::from_str(body)?;
    if let Value::String(inner) = &value {
        // Double-encoded: the body was a JSON string containing JSON.
        return serde_json::from_str(inner);
    }
    Ok(value)
}

/// Resolves the canonical event type.
///
/// Priority: message header, then type fields on the envelope (the
/// flattened map retains outer-envelope values on key conflicts), then
/// heuristic probes on the payload shape.
fn resolve_event_type(message: &RawMessage, flat: &Map<String, Value>) -> Option<String> {
    if let Some(header) = message.headers.get(EVENT_TYPE_HEADER)
        && !header.trim().is_empty()
    {
        return Some(header.trim().to_string());
    }

    for field in TYPE_FIELDS {
        if let Some(Value::String(s)) = flat.get(field)
            && !s.trim().is_empty()
        {
            return Some(s.trim().to_string());
        }
    }

    // Heuristic probes: infer the type from the payload shape.
    if flat.contains_key("flightData") || flat.contains_key("flightDetails") {
        return Some("FlightReserved".to_string());
    }
    if flat.contains_key("hotelData") || flat.contains_key("hotelDetails") {
        return Some("HotelReserved".to_string());
    }
    if flat.contains_key("paymentId") || flat.contains_key("transactionId") {
        return Some("PaymentProcessed".to_string());
    }

    None
}

/// Recursively flattens `payload`/`data` wrappers into a single map.
///
/// String values that look like JSON are parsed; wrapper contents never
/// overwrite keys already present on the outer envelope.
fn flatten(map: Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    flatten_into(&mut out, map);
    out
}

fn flatten_into(out: &mut Map<String, Value>, map: Map<String, Value>) {
    let mut wrappers = Vec::new();

    for (key, value) in map {
        let value = parse_embedded_json(value);

        if WRAPPER_KEYS.contains(&key.as_str())
            && let Value::Object(inner) = value
        {
            // Merge wrappers after the direct keys so the envelope wins.
            wrappers.push(inner);
            continue;
        }

        out.entry(key).or_insert(value);
    }

    for inner in wrappers {
        flatten_into(out, inner);
    }
}

/// Parses a string value that looks like embedded JSON.
fn parse_embedded_json(value: Value) -> Value {
    if let Value::String(s) = &value {
        let trimmed = s.trim();
        if (trimmed.starts_with('{') && trimmed.ends_with('}'))
            || (trimmed.starts_with('[') && trimmed.ends_with(']'))
        {
            if let Ok(parsed) = serde_json::from_str::<Value>(trimmed) {
                return parsed;
            }
        }
    }
    value
}

/// Builds the typed event from the flattened payload.
fn to_typed_event(event_type: &str, raw: Value) -> Result<SagaEvent, NormalizeError> {
    fn data<T: serde::de::DeserializeOwned>(
        event_type: &str,
        raw: Value,
    ) -> Result<T, NormalizeError> {
        serde_json::from_value(raw).map_err(|source| NormalizeError::MalformedPayload {
            event_type: event_type.to_string(),
            source,
        })
    }

    match event_type {
        "FlightReserved" => Ok(SagaEvent::FlightReserved(data(event_type, raw)?)),
        "FlightReservationFailed" => Ok(SagaEvent::FlightReservationFailed(data(event_type, raw)?)),
        "FlightReservationCancelled" => {
            Ok(SagaEvent::FlightReservationCancelled(data(event_type, raw)?))
        }
        "HotelReserved" => Ok(SagaEvent::HotelReserved(data(event_type, raw)?)),
        "HotelReservationFailed" => Ok(SagaEvent::HotelReservationFailed(data(event_type, raw)?)),
        "HotelReservationCancelled" => {
            Ok(SagaEvent::HotelReservationCancelled(data(event_type, raw)?))
        }
        "PaymentProcessed" => Ok(SagaEvent::PaymentProcessed(data(event_type, raw)?)),
        "PaymentFailed" => Ok(SagaEvent::PaymentFailed(data(event_type, raw)?)),
        "PaymentRefunded" => Ok(SagaEvent::PaymentRefunded(data(event_type, raw)?)),
        "PaymentCancelled" => Ok(SagaEvent::PaymentCancelled(data(event_type, raw)?)),
        other => Err(NormalizeError::UnsupportedType(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{BookingId, SagaId};

    fn ids_json() -> (BookingId, SagaId, String) {
        let booking_id = BookingId::new();
        let saga_id = SagaId::new();
        let fragment = format!("\"bookingId\":\"{booking_id}\",\"sagaId\":\"{saga_id}\"");
        (booking_id, saga_id, fragment)
    }

    #[test]
    fn header_takes_priority_over_body_type() {
        let (_, saga_id, ids) = ids_json();
        let body = format!("{{{ids},\"eventType\":\"HotelReserved\"}}");
        let message = RawMessage::with_event_type("FlightReserved", body);

        let normalized = normalize(&message).unwrap();
        assert_eq!(normalized.event.event_type(), "FlightReserved");
        assert_eq!(normalized.event.saga_id(), saga_id);
    }

    #[test]
    fn body_event_type_field_is_used_without_header() {
        let (_, _, ids) = ids_json();
        let body = format!("{{{ids},\"event_type\":\"HotelReserved\"}}");
        let normalized = normalize(&RawMessage::new(body)).unwrap();
        assert_eq!(normalized.event.event_type(), "HotelReserved");
    }

    #[test]
    fn double_encoded_body_is_unwrapped() {
        let (_, _, ids) = ids_json();
        let inner = format!("{{{ids},\"eventType\":\"PaymentProcessed\",\"paymentId\":\"P-1\"}}");
        let body = serde_json::to_string(&inner).unwrap();

        let normalized = normalize(&RawMessage::new(body)).unwrap();
        assert_eq!(normalized.event.event_type(), "PaymentProcessed");
        if let SagaEvent::PaymentProcessed(data) = normalized.event {
            assert_eq!(data.payment_id.as_deref(), Some("P-1"));
        } else {
            panic!("expected PaymentProcessed");
        }
    }

    #[test]
    fn nested_payload_wrapper_is_flattened() {
        let (booking_id, saga_id, _) = ids_json();
        let body = serde_json::json!({
            "eventType": "FlightReserved",
            "payload": {
                "bookingId": booking_id,
                "sagaId": saga_id,
                "reservationId": "FL-9"
            }
        })
        .to_string();

        let normalized = normalize(&RawMessage::new(body)).unwrap();
        if let SagaEvent::FlightReserved(data) = normalized.event {
            assert_eq!(data.reservation_id.as_deref(), Some("FL-9"));
            assert_eq!(data.booking_id, booking_id);
        } else {
            panic!("expected FlightReserved");
        }
    }

    #[test]
    fn inner_payload_event_type_is_resolved() {
        let (_, _, ids) = ids_json();
        let body = format!(
            "{{\"payload\":{{{ids},\"eventType\":\"HotelReservationFailed\",\"errorMessage\":\"sold out\"}}}}"
        );
        let normalized = normalize(&RawMessage::new(body)).unwrap();
        assert_eq!(normalized.event.event_type(), "HotelReservationFailed");
    }

    #[test]
    fn stringified_payload_value_is_parsed_and_flattened() {
        let (booking_id, saga_id, _) = ids_json();
        let inner = serde_json::json!({
            "bookingId": booking_id,
            "sagaId": saga_id,
            "reservationId": "HT-4"
        })
        .to_string();
        let body = serde_json::json!({
            "eventType": "HotelReserved",
            "payload": inner
        })
        .to_string();

        let normalized = normalize(&RawMessage::new(body)).unwrap();
        if let SagaEvent::HotelReserved(data) = normalized.event {
            assert_eq!(data.reservation_id.as_deref(), Some("HT-4"));
            assert_eq!(data.saga_id, saga_id);
        } else {
            panic!("expected HotelReserved");
        }
    }

    #[test]
    fn heuristic_probe_infers_flight_reserved() {
        let (_, _, ids) = ids_json();
        let body = format!("{{{ids},\"flightData\":{{\"flightNumber\":\"LH 402\"}}}}");
        let normalized = normalize(&RawMessage::new(body)).unwrap();
        assert_eq!(normalized.event.event_type(), "FlightReserved");
    }

    #[test]
    fn heuristic_probe_infers_payment_processed() {
        let (_, _, ids) = ids_json();
        let body = format!("{{{ids},\"transactionId\":\"T-77\"}}");
        let normalized = normalize(&RawMessage::new(body)).unwrap();
        assert_eq!(normalized.event.event_type(), "PaymentProcessed");
    }

    #[test]
    fn unresolvable_type_is_an_error() {
        let (_, _, ids) = ids_json();
        let body = format!("{{{ids},\"something\":\"else\"}}");
        let result = normalize(&RawMessage::new(body));
        assert!(matches!(result, Err(NormalizeError::NoEventType)));
    }

    #[test]
    fn unsupported_type_is_an_error() {
        let (_, _, ids) = ids_json();
        let body = format!("{{{ids},\"eventType\":\"BookingViewed\"}}");
        let result = normalize(&RawMessage::new(body));
        assert!(matches!(result, Err(NormalizeError::UnsupportedType(t)) if t == "BookingViewed"));
    }

    #[test]
    fn invalid_json_is_an_error() {
        let result = normalize(&RawMessage::new("not json"));
        assert!(matches!(result, Err(NormalizeError::InvalidJson(_))));
    }

    #[test]
    fn missing_ids_is_malformed() {
        let body = r#"{"eventType":"FlightReserved","reservationId":"FL-1"}"#;
        let result = normalize(&RawMessage::new(body));
        assert!(matches!(result, Err(NormalizeError::MalformedPayload { .. })));
    }

    #[test]
    fn envelope_keys_win_over_wrapper_keys() {
        let (booking_id, saga_id, _) = ids_json();
        let other_saga = SagaId::new();
        let body = serde_json::json!({
            "eventType": "FlightReserved",
            "bookingId": booking_id,
            "sagaId": saga_id,
            "payload": {
                "sagaId": other_saga,
                "reservationId": "FL-2"
            }
        })
        .to_string();

        let normalized = normalize(&RawMessage::new(body)).unwrap();
        assert_eq!(normalized.event.saga_id(), saga_id);
    }
}
