use super::error::ApiResult;
use super::extractors::{Body, Caller};
use crate::application::Desk;
use crate::domain::booking::{Booking, BookingDetails};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

pub async fn create(
    State(desk): State<Desk>,
    Caller(principal): Caller,
    Body(details): Body<BookingDetails>,
) -> ApiResult<(StatusCode, Json<Booking>)> {
    let booking = desk.bookings.create(&principal, details).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

pub async fn list_mine(
    State(desk): State<Desk>,
    Caller(principal): Caller,
) -> ApiResult<Json<Vec<Booking>>> {
    let bookings = desk
        .bookings
        .list_for_requester(&principal, &principal.id)
        .await?;
    Ok(Json(bookings))
}

pub async fn list_for_user(
    State(desk): State<Desk>,
    Caller(principal): Caller,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Vec<Booking>>> {
    Ok(Json(
        desk.bookings.list_for_requester(&principal, &user_id).await?,
    ))
}

pub async fn get(
    State(desk): State<Desk>,
    Caller(principal): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Booking>> {
    Ok(Json(desk.bookings.get(&principal, id).await?))
}

pub async fn update(
    State(desk): State<Desk>,
    Caller(principal): Caller,
    Path(id): Path<Uuid>,
    Body(details): Body<BookingDetails>,
) -> ApiResult<Json<Booking>> {
    Ok(Json(
        desk.bookings.update_details(&principal, id, details).await?,
    ))
}

pub async fn cancel(
    State(desk): State<Desk>,
    Caller(principal): Caller,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Booking>> {
    Ok(Json(desk.bookings.cancel(&principal, id).await?))
}
