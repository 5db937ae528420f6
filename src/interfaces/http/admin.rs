use super::error::ApiResult;
use super::extractors::{Body, Caller, OptionalBody};
use crate::application::Desk;
use crate::application::admin::{BulkOutcome, Review};
use crate::application::bookings::{Page, StatusCounts};
use crate::domain::bank_account::{BankAccount, BankAccountUpdate, NewBankAccount};
use crate::domain::booking::{Booking, BookingStatus};
use crate::domain::payment::Payment;
use crate::error::DeskError;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

pub const DEFAULT_PAGE_SIZE: usize = 20;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    status: Option<String>,
    page: Option<usize>,
    limit: Option<usize>,
}

pub async fn list_bookings(
    State(desk): State<Desk>,
    Caller(principal): Caller,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Page<Booking>>> {
    let status = match query.status.as_deref() {
        None | Some("") | Some("all") => None,
        Some(s) => Some(s.parse::<BookingStatus>()?),
    };
    let page = desk
        .bookings
        .list_for_admin(
            &principal,
            status,
            query.page.unwrap_or(1),
            query.limit.unwrap_or(DEFAULT_PAGE_SIZE),
        )
        .await?;
    Ok(Json(page))
}

pub async fn pending_bookings(
    State(desk): State<Desk>,
    Caller(principal): Caller,
) -> ApiResult<Json<Vec<Booking>>> {
    Ok(Json(desk.bookings.pending_queue(&principal).await?))
}

pub async fn booking_stats(
    State(desk): State<Desk>,
    Caller(principal): Caller,
) -> ApiResult<Json<StatusCounts>> {
    Ok(Json(desk.bookings.status_counts(&principal).await?))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproveBody {
    admin_notes: Option<String>,
    estimated_completion: Option<DateTime<Utc>>,
    assigned_truck: Option<String>,
}

pub async fn approve_booking(
    State(desk): State<Desk>,
    Caller(principal): Caller,
    Path(id): Path<Uuid>,
    OptionalBody(body): OptionalBody<ApproveBody>,
) -> ApiResult<Json<Booking>> {
    let booking = desk
        .bookings
        .approve(
            &principal,
            id,
            body.admin_notes,
            body.estimated_completion,
            body.assigned_truck,
        )
        .await?;
    Ok(Json(booking))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectBody {
    admin_notes: Option<String>,
    rejection_reason: Option<String>,
}

pub async fn reject_booking(
    State(desk): State<Desk>,
    Caller(principal): Caller,
    Path(id): Path<Uuid>,
    OptionalBody(body): OptionalBody<RejectBody>,
) -> ApiResult<Json<Booking>> {
    let booking = desk
        .bookings
        .reject(&principal, id, body.admin_notes, body.rejection_reason)
        .await?;
    Ok(Json(booking))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteBody {
    admin_notes: Option<String>,
    completion_notes: Option<String>,
}

pub async fn complete_booking(
    State(desk): State<Desk>,
    Caller(principal): Caller,
    Path(id): Path<Uuid>,
    OptionalBody(body): OptionalBody<CompleteBody>,
) -> ApiResult<Json<Booking>> {
    let booking = desk
        .bookings
        .complete(&principal, id, body.admin_notes, body.completion_notes)
        .await?;
    Ok(Json(booking))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkApproveBody {
    booking_ids: Vec<Uuid>,
    admin_notes: Option<String>,
}

pub async fn bulk_approve(
    State(desk): State<Desk>,
    Caller(principal): Caller,
    Body(body): Body<BulkApproveBody>,
) -> ApiResult<Json<BulkOutcome>> {
    if body.booking_ids.is_empty() {
        return Err(DeskError::ValidationError("bookingIds must not be empty".to_string()).into());
    }
    let outcome = desk
        .admin
        .bulk_approve(&principal, &body.booking_ids, body.admin_notes)
        .await?;
    Ok(Json(outcome))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewBody {
    admin_notes: Option<String>,
}

pub async fn approve_payment(
    State(desk): State<Desk>,
    Caller(principal): Caller,
    Path(id): Path<Uuid>,
    OptionalBody(body): OptionalBody<ReviewBody>,
) -> ApiResult<Json<Payment>> {
    let notes = body.admin_notes;
    Ok(Json(
        desk.admin
            .review_bank_transfer(&principal, id, Review::Approve, notes)
            .await?,
    ))
}

pub async fn reject_payment(
    State(desk): State<Desk>,
    Caller(principal): Caller,
    Path(id): Path<Uuid>,
    OptionalBody(body): OptionalBody<ReviewBody>,
) -> ApiResult<Json<Payment>> {
    let notes = body.admin_notes;
    Ok(Json(
        desk.admin
            .review_bank_transfer(&principal, id, Review::Reject, notes)
            .await?,
    ))
}

pub async fn list_bank_accounts(
    State(desk): State<Desk>,
    Caller(principal): Caller,
) -> ApiResult<Json<Vec<BankAccount>>> {
    Ok(Json(desk.admin.list_bank_accounts(&principal).await?))
}

pub async fn create_bank_account(
    State(desk): State<Desk>,
    Caller(principal): Caller,
    Body(input): Body<NewBankAccount>,
) -> ApiResult<(StatusCode, Json<BankAccount>)> {
    let account = desk.admin.create_bank_account(&principal, input).await?;
    Ok((StatusCode::CREATED, Json(account)))
}

pub async fn update_bank_account(
    State(desk): State<Desk>,
    Caller(principal): Caller,
    Path(id): Path<Uuid>,
    Body(update): Body<BankAccountUpdate>,
) -> ApiResult<Json<BankAccount>> {
    Ok(Json(
        desk.admin
            .update_bank_account(&principal, id, update)
            .await?,
    ))
}

pub async fn set_default_bank_account(
    State(desk): State<Desk>,
    Caller(principal): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<BankAccount>> {
    Ok(Json(
        desk.admin.set_default_bank_account(&principal, id).await?,
    ))
}

pub async fn delete_bank_account(
    State(desk): State<Desk>,
    Caller(principal): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    desk.admin.delete_bank_account(&principal, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
