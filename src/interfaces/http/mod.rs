//! HTTP/JSON API and websocket rooms over a [`Desk`].
//!
//! Every route except `/health` and the mobile-money callback expects the
//! identity headers set by the fronting auth gateway.

pub mod admin;
pub mod bookings;
pub mod error;
pub mod extractors;
pub mod payments;
pub mod ws;

use crate::application::Desk;
use axum::{
    Json, Router,
    routing::{get, post, put},
};
use serde_json::{Value, json};

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub fn router(desk: Desk) -> Router {
    let api = Router::new()
        .route("/bookings", post(bookings::create).get(bookings::list_mine))
        .route("/bookings/:id", get(bookings::get).put(bookings::update))
        .route("/bookings/:id/cancel", post(bookings::cancel))
        .route("/users/:user_id/bookings", get(bookings::list_for_user))
        .route("/payments", post(payments::initiate).get(payments::list_mine))
        .route("/payments/:id", get(payments::get))
        .route("/payments/:id/cancel", post(payments::cancel))
        .route("/payments/:id/proof", post(payments::submit_proof))
        .route("/payments/status/:transaction_id", get(payments::status))
        .route("/payments/paypal/capture", post(payments::capture))
        .route(
            "/payments/mobile-money/callback",
            post(payments::mobile_money_callback),
        )
        .route("/bank-accounts/default", get(payments::default_bank_account))
        .route("/admin/bookings", get(admin::list_bookings))
        .route("/admin/bookings/pending", get(admin::pending_bookings))
        .route("/admin/bookings/stats", get(admin::booking_stats))
        .route("/admin/bookings/bulk-approve", post(admin::bulk_approve))
        .route("/admin/bookings/:id/approve", put(admin::approve_booking))
        .route("/admin/bookings/:id/reject", put(admin::reject_booking))
        .route("/admin/bookings/:id/complete", put(admin::complete_booking))
        .route("/admin/payments/:id/approve", put(admin::approve_payment))
        .route("/admin/payments/:id/reject", put(admin::reject_payment))
        .route(
            "/admin/bank-accounts",
            get(admin::list_bank_accounts).post(admin::create_bank_account),
        )
        .route(
            "/admin/bank-accounts/:id",
            put(admin::update_bank_account).delete(admin::delete_bank_account),
        )
        .route(
            "/admin/bank-accounts/:id/default",
            put(admin::set_default_bank_account),
        );

    Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws::handle))
        .nest("/api/v1", api)
        .with_state(desk)
}
