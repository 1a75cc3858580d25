use assert_matches::assert_matches;
use chrono::NaiveDate;
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::models::{AppointmentError, BookAppointmentRequest};
use appointment_cell::services::AppointmentBookingService;
use shared_database::postgrest::APPLY_MUTATIONS_RPC;
use shared_models::auth::Actor;
use shared_utils::test_utils::supabase_state;

fn with_audit(mut row: serde_json::Value) -> serde_json::Value {
    let audit = json!({
        "created_by": Uuid::nil(),
        "created_at": "2025-06-01T08:00:00Z",
        "updated_by": null,
        "updated_at": null,
        "version": 0
    });
    if let (Some(fields), Some(audit)) = (row.as_object_mut(), audit.as_object()) {
        fields.extend(audit.clone());
    }
    row
}

#[tokio::test]
async fn concurrent_booking_of_the_same_slot_is_reported_as_taken() {
    let server = MockServer::start().await;
    let doctor_id = Uuid::new_v4();
    let patient_id = Uuid::new_v4();

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([with_audit(json!({
            "id": doctor_id,
            "specialization": "Cardiology",
            "experience_years": 8,
            "slot_template": ["09:00:00"],
            "available_dates": ["2025-06-11"],
            "online": true,
            "review_count": 0,
            "average_rating": 0.0,
            "active": true
        }))])))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/patients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([with_audit(json!({
            "id": patient_id,
            "blood_type": null,
            "medical_history": null,
            "emergency_contact": null,
            "active": true
        }))])))
        .mount(&server)
        .await;

    // The slot looks free when read.
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    // Another booking landed first and holds the partial unique index.
    Mock::given(method("POST"))
        .and(path(format!("/rest/v1/rpc/{}", APPLY_MUTATIONS_RPC)))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint \"appointments_active_slot_key\""
        })))
        .expect(1)
        .mount(&server)
        .await;

    let state = supabase_state(&server.uri());
    let result = AppointmentBookingService::new(&state)
        .book_appointment(
            BookAppointmentRequest {
                doctor_id,
                patient_id: None,
                appointment_date: NaiveDate::from_ymd_opt(2025, 6, 11).unwrap(),
                appointment_time: "09:00 AM".to_string(),
            },
            Actor::Patient(patient_id),
        )
        .await;

    assert_matches!(result, Err(AppointmentError::SlotTaken));
}
