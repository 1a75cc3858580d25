use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
};
use serde_json::{json, Value};
use tower::ServiceExt;

use chat_cell::router::chat_routes;
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

    let response = chat_routes(clinic.state.clone())
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn start_answers_created_then_ok() {
    let clinic = TestClinic::new();
    let pair = json!({ "doctor_id": clinic.doctor.id, "patient_id": clinic.patient.id });

    let (status, body) = send(&clinic, &clinic.patient, Method::POST, "/sessions", Some(pair.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["is_new"], json!(true));
    let session_id = body["session"]["session_id"].as_str().unwrap().to_string();

    let (status, body) = send(&clinic, &clinic.doctor, Method::POST, "/sessions", Some(pair)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_new"], json!(false));
    assert_eq!(body["session"]["session_id"], json!(session_id));
}

#[tokio::test]
async fn conversation_over_http() {
    let clinic = TestClinic::new();
    let pair = json!({ "doctor_id": clinic.doctor.id, "patient_id": clinic.patient.id });
    let (_, body) = send(&clinic, &clinic.patient, Method::POST, "/sessions", Some(pair)).await;
    let session_id = body["session"]["session_id"].as_str().unwrap().to_string();
    let messages_uri = format!("/sessions/{}/messages", session_id);

    let (status, body) = send(
        &clinic,
        &clinic.patient,
        Method::POST,
        &messages_uri,
        Some(json!({ "body": "Good morning" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let message_id = body["message"]["message_id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &clinic,
        &clinic.other_patient,
        Method::POST,
        &messages_uri,
        Some(json!({ "body": "Intruder" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].is_string());

    let (status, _) = send(
        &clinic,
        &clinic.patient,
        Method::PUT,
        &format!("/messages/{}", message_id),
        Some(json!({ "body": "Good morning, doctor" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&clinic, &clinic.doctor, Method::GET, &format!("{}?limit=10", messages_uri), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], json!(1));
    assert_eq!(body["messages"][0]["body"], json!("Good morning, doctor"));

    let (status, body) = send(&clinic, &clinic.doctor, Method::POST, &format!("/sessions/{}/end", session_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ended"], json!(true));

    let (status, _) = send(
        &clinic,
        &clinic.patient,
        Method::POST,
        &messages_uri,
        Some(json!({ "body": "Hello?" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&clinic, &clinic.patient, Method::DELETE, &format!("/messages/{}", message_id), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_delete_hides_session_from_filtered_listing() {
    let clinic = TestClinic::new();
    let pair = json!({ "doctor_id": clinic.doctor.id, "patient_id": clinic.patient.id });
    let (_, body) = send(&clinic, &clinic.patient, Method::POST, "/sessions", Some(pair)).await;
    let session_id = body["session"]["session_id"].as_str().unwrap().to_string();

    let (status, body) = send(&clinic, &clinic.patient, Method::GET, "/sessions?active=true", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], json!(1));

    let (status, _) = send(&clinic, &clinic.patient, Method::DELETE, &format!("/sessions/{}", session_id), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&clinic, &clinic.admin, Method::DELETE, &format!("/sessions/{}", session_id), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&clinic, &clinic.admin, Method::DELETE, &format!("/sessions/{}", session_id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = send(&clinic, &clinic.patient, Method::GET, "/sessions?active=false", None).await;
    assert_eq!(body["total"], json!(0));
}
