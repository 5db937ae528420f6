use super::error::ApiResult;
use super::extractors::{Body, Caller};
use crate::application::Desk;
use crate::application::payments::{PaymentHandle, PaymentRequest};
use crate::domain::bank_account::BankAccount;
use crate::domain::payment::Payment;
use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;
use serde_json::{Value, json};
use uuid::Uuid;

pub async fn initiate(
    State(desk): State<Desk>,
    Caller(principal): Caller,
    Body(request): Body<PaymentRequest>,
) -> ApiResult<(StatusCode, Json<PaymentHandle>)> {
    let handle = desk.payments.initiate(&principal, request).await?;
    Ok((StatusCode::CREATED, Json(handle)))
}

pub async fn list_mine(
    State(desk): State<Desk>,
    Caller(principal): Caller,
) -> ApiResult<Json<Vec<Payment>>> {
    Ok(Json(
        desk.payments.list_for_owner(&principal, &principal.id).await?,
    ))
}

pub async fn get(
    State(desk): State<Desk>,
    Caller(principal): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Payment>> {
    Ok(Json(desk.payments.get(&principal, id).await?))
}

pub async fn status(
    State(desk): State<Desk>,
    Caller(principal): Caller,
    Path(transaction_id): Path<String>,
) -> ApiResult<Json<Payment>> {
    Ok(Json(
        desk.payments
            .status_by_token(&principal, &transaction_id)
            .await?,
    ))
}

pub async fn cancel(
    State(desk): State<Desk>,
    Caller(principal): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Payment>> {
    Ok(Json(desk.payments.cancel(&principal, id).await?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofBody {
    payment_proof: String,
}

pub async fn submit_proof(
    State(desk): State<Desk>,
    Caller(principal): Caller,
    Path(id): Path<Uuid>,
    Body(body): Body<ProofBody>,
) -> ApiResult<Json<Payment>> {
    Ok(Json(
        desk.payments
            .submit_proof(&principal, id, &body.payment_proof)
            .await?,
    ))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureBody {
    order_id: String,
}

pub async fn capture(
    State(desk): State<Desk>,
    Caller(principal): Caller,
    Body(body): Body<CaptureBody>,
) -> ApiResult<Json<Payment>> {
    Ok(Json(desk.payments.capture(&principal, &body.order_id).await?))
}

pub async fn default_bank_account(
    State(desk): State<Desk>,
    Caller(_principal): Caller,
) -> ApiResult<Json<BankAccount>> {
    Ok(Json(desk.admin.default_bank_account().await?))
}

/// STK callback receiver. Always acknowledges; failures are only logged.
pub async fn mobile_money_callback(State(desk): State<Desk>, body: Bytes) -> Json<Value> {
    desk.reconciler.handle_mobile_money_callback(&body).await;
    Json(json!({ "ResultCode": 0, "ResultDesc": "Accepted" }))
}
