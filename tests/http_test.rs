mod common;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use dispatchdesk::interfaces::http::{
    extractors::{PRINCIPAL_ID_HEADER, PRINCIPAL_ROLE_HEADER},
    router,
};
use serde_json::{Value, json};
use tower::ServiceExt;

fn app() -> Router {
    router(common::desk())
}

fn call(method: Method, uri: &str, who: Option<(&str, &str)>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some((id, role)) = who {
        builder = builder
            .header(PRINCIPAL_ID_HEADER, id)
            .header(PRINCIPAL_ROLE_HEADER, role);
    }
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

const CUSTOMER: Option<(&str, &str)> = Some(("u1", "customer"));
const ADMIN: Option<(&str, &str)> = Some(("admin-1", "admin"));

#[tokio::test]
async fn test_health() {
    let (status, body) = send(&app(), call(Method::GET, "/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_booking_routes() {
    let app = app();

    let (status, created) = send(
        &app,
        call(
            Method::POST,
            "/api/v1/bookings",
            CUSTOMER,
            Some(json!({"serviceType": "Battery", "urgency": "urgent"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "pending");
    let id = created["id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, call(Method::GET, "/api/v1/bookings", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHENTICATED");

    let approve = format!("/api/v1/admin/bookings/{id}/approve");
    let (status, body) = send(&app, call(Method::PUT, &approve, CUSTOMER, None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let complete = format!("/api/v1/admin/bookings/{id}/complete");
    let (status, body) = send(&app, call(Method::PUT, &complete, ADMIN, None)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INVALID_STATE_TRANSITION");

    let (status, body) = send(
        &app,
        call(
            Method::PUT,
            &approve,
            ADMIN,
            Some(json!({"assignedTruck": "KDA 123X"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "approved");

    let (status, body) = send(
        &app,
        call(Method::GET, &format!("/api/v1/bookings/{id}"), Some(("u2", "customer")), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, body) = send(
        &app,
        call(Method::GET, "/api/v1/admin/bookings?status=approved", ADMIN, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);
}

#[tokio::test]
async fn test_invalid_json_is_validation_error() {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/v1/bookings")
        .header(PRINCIPAL_ID_HEADER, "u1")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(&app(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_payment_validation_codes() {
    let app = app();

    let (status, body) = send(
        &app,
        call(
            Method::POST,
            "/api/v1/payments",
            CUSTOMER,
            Some(json!({"amount": 0, "paymentMethod": "mock"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "INVALID_AMOUNT");

    let (status, body) = send(
        &app,
        call(
            Method::POST,
            "/api/v1/payments",
            CUSTOMER,
            Some(json!({"amount": 250, "paymentMethod": "mpesa", "phoneNumber": "0712345678"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["payment"]["status"], "pending");
    assert_eq!(body["payment"]["details"]["requestedMethod"], "mobile_money");
}

#[tokio::test]
async fn test_mobile_money_callback_always_acknowledges() {
    let app = app();
    for payload in ["garbage", "{}", r#"{"Body":{"stkCallback":{"CheckoutRequestID":"nope","ResultCode":1}}}"#] {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/v1/payments/mobile-money/callback")
            .header("content-type", "application/json")
            .body(Body::from(payload))
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ResultCode"], 0);
    }
}

#[tokio::test]
async fn test_bank_account_admin_routes() {
    let app = app();
    let (status, body) = send(
        &app,
        call(Method::GET, "/api/v1/bank-accounts/default", CUSTOMER, None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, created) = send(
        &app,
        call(
            Method::POST,
            "/api/v1/admin/bank-accounts",
            ADMIN,
            Some(json!({
                "accountName": "AutoCare Ltd",
                "accountNumber": "0011223344",
                "bankName": "KCB",
                "bankCode": "01",
                "accountType": "business",
                "isDefault": true
            })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &app,
        call(Method::GET, "/api/v1/bank-accounts/default", CUSTOMER, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], created["id"]);

    let id = created["id"].as_str().unwrap();
    let (status, _) = send(
        &app,
        call(Method::DELETE, &format!("/api/v1/admin/bank-accounts/{id}"), CUSTOMER, None),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_malformed_review_body_is_refused() {
    let app = app();
    let (_, created) = send(
        &app,
        call(
            Method::POST,
            "/api/v1/bookings",
            CUSTOMER,
            Some(json!({"serviceType": "oil_change"})),
        ),
    )
    .await;
    let id = created["id"].as_str().unwrap().to_string();
    let approve = format!("/api/v1/admin/bookings/{id}/approve");

    let (status, body) = send(
        &app,
        call(Method::PUT, &approve, ADMIN, Some(json!({"assignedTruck": 5}))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (_, current) = send(
        &app,
        call(Method::GET, &format!("/api/v1/bookings/{id}"), ADMIN, None),
    )
    .await;
    assert_eq!(current["status"], "pending");

    let (status, body) = send(&app, call(Method::PUT, &approve, ADMIN, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "approved");
}

#[tokio::test]
async fn test_requester_edits_pending_booking() {
    let app = app();
    let (_, created) = send(
        &app,
        call(
            Method::POST,
            "/api/v1/bookings",
            CUSTOMER,
            Some(json!({"serviceType": "oil_change", "location": "CBD"})),
        ),
    )
    .await;
    let id = created["id"].as_str().unwrap().to_string();
    let uri = format!("/api/v1/bookings/{id}");

    let (status, edited) = send(
        &app,
        call(
            Method::PUT,
            &uri,
            CUSTOMER,
            Some(json!({"serviceType": "engine_repair", "urgency": "emergency"})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(created["amount"], "2500");
    assert_eq!(edited["amount"], "15000");
    assert_eq!(edited["location"], "CBD");
    assert_eq!(edited["urgency"], "emergency");

    send(
        &app,
        call(
            Method::PUT,
            &format!("/api/v1/admin/bookings/{id}/reject"),
            ADMIN,
            None,
        ),
    )
    .await;
    let (status, body) = send(
        &app,
        call(Method::PUT, &uri, CUSTOMER, Some(json!({"serviceType": "oil_change"}))),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INVALID_STATE_TRANSITION");
}

#[tokio::test]
async fn test_huge_page_number_returns_empty_page() {
    let app = app();
    send(
        &app,
        call(
            Method::POST,
            "/api/v1/bookings",
            CUSTOMER,
            Some(json!({"serviceType": "oil_change"})),
        ),
    )
    .await;

    let uri = format!("/api/v1/admin/bookings?page={}&limit=20", usize::MAX);
    let (status, body) = send(&app, call(Method::GET, &uri, ADMIN, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"], json!([]));
    assert_eq!(body["total"], 1);
}
