use super::{http_client, status_error, transport_error};
use crate::config::PayPalConfig;
use crate::domain::ports::{CaptureResult, CheckoutGateway, CheckoutOrder};
use crate::error::{DeskError, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{info, warn};

const PROVIDER: &str = "paypal";

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct Link {
    href: String,
    rel: String,
}

#[derive(Deserialize)]
struct OrderResponse {
    id: String,
    #[serde(default)]
    links: Vec<Link>,
}

/// PayPal orders API: create an order, send the payer to approve it, capture.
pub struct PayPalClient {
    http: reqwest::Client,
    config: PayPalConfig,
}

impl PayPalClient {
    pub fn new(config: PayPalConfig, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            config,
        })
    }

    async fn access_token(&self) -> Result<String> {
        let response = self
            .http
            .post(format!("{}/v1/oauth2/token", self.config.base_url))
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, e))?;

        if !response.status().is_success() {
            return Err(match status_error(PROVIDER, "oauth", response).await {
                DeskError::ProviderRejected { reason, .. } => DeskError::ProviderUnavailable {
                    provider: PROVIDER,
                    reason,
                },
                other => other,
            });
        }
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| transport_error(PROVIDER, e))?;
        Ok(token.access_token)
    }
}

/// Pulls the first capture id out of a capture response.
fn capture_id(body: &Value) -> Option<String> {
    body.pointer("/purchase_units/0/payments/captures/0/id")
        .and_then(Value::as_str)
        .map(String::from)
}

/// The `issue` code of the first error detail, e.g. `ORDER_NOT_APPROVED`.
fn issue(body: &Value) -> Option<&str> {
    body.pointer("/details/0/issue").and_then(Value::as_str)
}

#[async_trait]
impl CheckoutGateway for PayPalClient {
    fn currency(&self) -> &str {
        &self.config.currency
    }

    async fn create_order(&self, amount: Decimal, description: &str) -> Result<CheckoutOrder> {
        let token = self.access_token().await?;
        let body = json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "amount": {
                    "currency_code": self.config.currency,
                    "value": amount.round_dp(2).to_string(),
                },
                "description": description,
            }],
            "application_context": {
                "return_url": self.config.return_url,
                "cancel_url": self.config.cancel_url,
            },
        });

        let response = self
            .http
            .post(format!("{}/v2/checkout/orders", self.config.base_url))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, e))?;

        if !response.status().is_success() {
            return Err(status_error(PROVIDER, "create order", response).await);
        }
        let order: OrderResponse = response
            .json()
            .await
            .map_err(|e| transport_error(PROVIDER, e))?;
        let approval_url = order
            .links
            .into_iter()
            .find(|link| link.rel == "approve")
            .map(|link| link.href)
            .ok_or_else(|| DeskError::ProviderRejected {
                provider: PROVIDER,
                reason: "order has no approval link".to_string(),
            })?;

        info!(order_id = %order.id, "PayPal order created");
        Ok(CheckoutOrder {
            order_id: order.id,
            approval_url,
        })
    }

    async fn capture_order(&self, order_id: &str) -> Result<CaptureResult> {
        let token = self.access_token().await?;
        let response = self
            .http
            .post(format!(
                "{}/v2/checkout/orders/{order_id}/capture",
                self.config.base_url
            ))
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body("{}")
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, e))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNPROCESSABLE_ENTITY {
            let body: Value = response.json().await.unwrap_or(Value::Null);
            warn!(order_id, body = %body, "PayPal refused capture");
            return match issue(&body) {
                // The payer has not approved yet; nothing is settled either way.
                Some("ORDER_NOT_APPROVED") | None => Err(DeskError::ProviderRejected {
                    provider: PROVIDER,
                    reason: "order not approved by payer".to_string(),
                }),
                Some(other) => Ok(CaptureResult::Declined {
                    reason: other.to_string(),
                }),
            };
        }
        if !status.is_success() {
            return Err(status_error(PROVIDER, "capture", response).await);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| transport_error(PROVIDER, e))?;
        let order_status = body.get("status").and_then(Value::as_str).unwrap_or("");
        match (order_status, capture_id(&body)) {
            ("COMPLETED", Some(capture_id)) => {
                info!(order_id, %capture_id, "PayPal order captured");
                Ok(CaptureResult::Completed { capture_id })
            }
            (other, _) => Ok(CaptureResult::Declined {
                reason: format!("capture finished with status {other}"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::providers::testing::serve;
    use axum::extract::Path;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use rust_decimal_macros::dec;

    fn config(base_url: String) -> PayPalConfig {
        PayPalConfig {
            client_id: "id".to_string(),
            client_secret: "secret".to_string(),
            base_url,
            return_url: "http://localhost/success".to_string(),
            cancel_url: "http://localhost/cancel".to_string(),
            currency: "USD".to_string(),
        }
    }

    fn token_route() -> Router {
        Router::new().route(
            "/v1/oauth2/token",
            post(|| async { Json(json!({"access_token": "A21", "token_type": "Bearer"})) }),
        )
    }

    async fn client_for(app: Router) -> PayPalClient {
        let base = serve(token_route().merge(app)).await;
        PayPalClient::new(config(base), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_create_order_returns_approval_link() {
        let client = client_for(Router::new().route(
            "/v2/checkout/orders",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["intent"], "CAPTURE");
                assert_eq!(body["purchase_units"][0]["amount"]["value"], "25.50");
                Json(json!({
                    "id": "5O190127TN364715T",
                    "status": "CREATED",
                    "links": [
                        {"href": "https://api/self", "rel": "self", "method": "GET"},
                        {"href": "https://paypal/checkoutnow?token=5O1", "rel": "approve", "method": "GET"}
                    ]
                }))
            }),
        ))
        .await;

        let order = client.create_order(dec!(25.5), "Oil change").await.unwrap();
        assert_eq!(order.order_id, "5O190127TN364715T");
        assert_eq!(order.approval_url, "https://paypal/checkoutnow?token=5O1");
    }

    #[tokio::test]
    async fn test_capture_completed() {
        let client = client_for(Router::new().route(
            "/v2/checkout/orders/:id/capture",
            post(|Path(id): Path<String>| async move {
                Json(json!({
                    "id": id,
                    "status": "COMPLETED",
                    "purchase_units": [{"payments": {"captures": [{"id": "3C679366HH908993F", "status": "COMPLETED"}]}}]
                }))
            }),
        ))
        .await;

        let result = client.capture_order("ORDER-1").await.unwrap();
        assert_eq!(
            result,
            CaptureResult::Completed {
                capture_id: "3C679366HH908993F".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_capture_before_approval_is_rejected() {
        let client = client_for(Router::new().route(
            "/v2/checkout/orders/:id/capture",
            post(|| async {
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(json!({"name": "UNPROCESSABLE_ENTITY", "details": [{"issue": "ORDER_NOT_APPROVED"}]})),
                )
            }),
        ))
        .await;

        let err = client.capture_order("ORDER-1").await.unwrap_err();
        assert!(matches!(err, DeskError::ProviderRejected { .. }));
    }

    #[tokio::test]
    async fn test_capture_declined_instrument() {
        let client = client_for(Router::new().route(
            "/v2/checkout/orders/:id/capture",
            post(|| async {
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    Json(json!({"details": [{"issue": "INSTRUMENT_DECLINED"}]})),
                )
            }),
        ))
        .await;

        let result = client.capture_order("ORDER-1").await.unwrap();
        assert_eq!(
            result,
            CaptureResult::Declined {
                reason: "INSTRUMENT_DECLINED".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_unreachable_provider() {
        let client = PayPalClient::new(
            config("http://127.0.0.1:1".to_string()),
            Duration::from_secs(2),
        )
        .unwrap();
        let err = client.create_order(dec!(10), "x").await.unwrap_err();
        assert!(matches!(err, DeskError::ProviderUnavailable { .. }));
    }
}
