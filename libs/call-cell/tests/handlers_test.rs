use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
};
use serde_json::{json, Value};
use tower::ServiceExt;

use call_cell::router::call_routes;
use shared_database::Mutation;
use shared_models::chat::{new_session_id, ChatSessionRecord};
use shared_models::Audit;
use shared_utils::test_utils::{TestClinic, TestUser};

async fn send(
    clinic: &TestClinic,
    user: &TestUser,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", clinic.token_for(user)));
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = call_routes(clinic.state.clone())
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn call_lifecycle_over_http() {
    let clinic = TestClinic::new();
    let session = ChatSessionRecord {
        session_id: new_session_id(),
        doctor_id: clinic.doctor.id,
        patient_id: clinic.patient.id,
        active: true,
        archived: false,
        started_at: TestClinic::start_instant(),
        ended_at: None,
        audit: Audit::created(clinic.doctor.id, TestClinic::start_instant()),
    };
    let session_id = session.session_id.clone();
    clinic.apply(vec![Mutation::InsertChatSession(session)]).await;

    let (status, body) = send(
        &clinic,
        &clinic.patient,
        Method::POST,
        "/",
        Some(json!({ "session_id": session_id, "callee_id": clinic.doctor.id, "call_type": "audio" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["call"]["status"], json!("calling"));
    assert_eq!(body["call"]["call_type"], json!("audio"));
    let call_id = body["call"]["call_id"].as_str().unwrap().to_string();

    let (status, _) = send(
        &clinic,
        &clinic.doctor,
        Method::PATCH,
        &format!("/{}/status", call_id),
        Some(json!({ "status": "on-hold" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &clinic,
        &clinic.doctor,
        Method::PATCH,
        &format!("/{}/status", call_id),
        Some(json!({ "status": "active" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("active"));

    let (status, body) = send(
        &clinic,
        &clinic.doctor,
        Method::POST,
        &format!("/{}/signal", call_id),
        Some(json!({ "kind": "ice_candidate", "payload": { "candidate": "a=1" } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["delivered"], json!(0));

    let (status, _) = send(&clinic, &clinic.other_patient, Method::GET, &format!("/{}", call_id), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&clinic, &clinic.patient, Method::GET, "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], json!(1));

    let (_, body) = send(&clinic, &clinic.patient, Method::GET, "/?type=video", None).await;
    assert_eq!(body["total"], json!(0));
    let (_, body) = send(&clinic, &clinic.patient, Method::GET, "/?type=audio&status=active", None).await;
    assert_eq!(body["total"], json!(1));
    let (status, _) = send(&clinic, &clinic.patient, Method::GET, "/?status=on-hold", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &clinic,
        &clinic.doctor,
        Method::PATCH,
        "/CALL_missing/status",
        Some(json!({ "status": "ended" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn participant_can_delete_a_call_once() {
    let clinic = TestClinic::new();
    let session = ChatSessionRecord {
        session_id: new_session_id(),
        doctor_id: clinic.doctor.id,
        patient_id: clinic.patient.id,
        active: true,
        archived: false,
        started_at: TestClinic::start_instant(),
        ended_at: None,
        audit: Audit::created(clinic.doctor.id, TestClinic::start_instant()),
    };
    let session_id = session.session_id.clone();
    clinic.apply(vec![Mutation::InsertChatSession(session)]).await;

    let (_, body) = send(
        &clinic,
        &clinic.doctor,
        Method::POST,
        "/",
        Some(json!({ "session_id": session_id, "callee_id": clinic.patient.id })),
    )
    .await;
    let call_uri = format!("/{}", body["call"]["call_id"].as_str().unwrap());

    let (status, _) = send(&clinic, &clinic.other_patient, Method::DELETE, &call_uri, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&clinic, &clinic.doctor, Method::DELETE, &call_uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));

    let (status, _) = send(&clinic, &clinic.doctor, Method::DELETE, &call_uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
