//! Outbound payment gateway clients.
//!
//! Every client shares the same error normalization: transport failures and
//! timeouts become `ProviderUnavailable`, explicit refusals become
//! `ProviderRejected`, and raw response bodies go to the log only.

pub mod daraja;
pub mod paypal;

use crate::error::{DeskError, Result};
use std::time::Duration;
use tracing::warn;

pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(timeout.min(Duration::from_secs(5)))
        .timeout(timeout)
        .build()
        .map_err(|e| DeskError::InternalError(Box::new(e)))
}

pub(crate) fn transport_error(provider: &'static str, err: reqwest::Error) -> DeskError {
    let reason = if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        "connection failed".to_string()
    } else if err.is_decode() {
        "unreadable response".to_string()
    } else {
        "transport error".to_string()
    };
    warn!(provider, error = %err, %reason, "Payment provider call failed");
    DeskError::ProviderUnavailable { provider, reason }
}

/// Reads a non-success response body for the log and classifies the status.
pub(crate) async fn status_error(
    provider: &'static str,
    operation: &'static str,
    response: reqwest::Response,
) -> DeskError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    warn!(provider, operation, %status, body = %body, "Payment provider returned an error");
    if status.is_server_error()
        || status == reqwest::StatusCode::UNAUTHORIZED
        || status == reqwest::StatusCode::TOO_MANY_REQUESTS
    {
        DeskError::ProviderUnavailable {
            provider,
            reason: format!("{operation} failed with status {}", status.as_u16()),
        }
    } else {
        DeskError::ProviderRejected {
            provider,
            reason: format!("{operation} refused with status {}", status.as_u16()),
        }
    }
}
