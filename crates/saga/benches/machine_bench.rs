use common::{BookingId, SagaId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::BookingType;
use saga::event::{FailureData, FailureInfo, ReservationConfirmedData};
use saga::{RawMessage, SagaContext, SagaEvent, SagaMachine, normalize};
use saga_store::SagaState;

fn bench_decide_happy_path(c: &mut Criterion) {
    let machine = SagaMachine::new();
    let event = SagaEvent::FlightReserved(ReservationConfirmedData {
        booking_id: BookingId::new(),
        saga_id: SagaId::new(),
        reservation_id: Some("FL-1".into()),
    });
    let ctx = SagaContext::new(SagaState::FlightReservationPending, BookingType::Combo);

    c.bench_function("machine/decide_flight_reserved", |b| {
        b.iter(|| machine.decide(ctx, &event));
    });
}

fn bench_decide_compensation(c: &mut Criterion) {
    let machine = SagaMachine::new();
    let event = SagaEvent::PaymentFailed(FailureData {
        booking_id: BookingId::new(),
        saga_id: SagaId::new(),
        failure: FailureInfo {
            error_message: Some("card declined".into()),
            ..Default::default()
        },
    });
    let ctx = SagaContext::new(SagaState::PaymentPending, BookingType::Combo);

    c.bench_function("machine/decide_payment_failed", |b| {
        b.iter(|| machine.decide(ctx, &event));
    });
}

fn bench_normalize_double_encoded(c: &mut Criterion) {
    let booking_id = BookingId::new();
    let saga_id = SagaId::new();
    let inner = serde_json::json!({
        "eventType": "PaymentProcessed",
        "payload": {
            "bookingId": booking_id,
            "sagaId": saga_id,
            "paymentId": "PAY-1",
        }
    });
    let body = serde_json::to_string(&serde_json::json!(inner.to_string())).unwrap();
    let message = RawMessage::new(body);

    c.bench_function("normalizer/double_encoded_payment", |b| {
        b.iter(|| normalize(&message).unwrap());
    });
}

criterion_group!(
    benches,
    bench_decide_happy_path,
    bench_decide_compensation,
    bench_normalize_double_encoded
);
criterion_main!(benches);
