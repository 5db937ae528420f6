use super::{http_client, status_error, transport_error};
use crate::config::DarajaConfig;
use crate::domain::payment::SettlementOutcome;
use crate::domain::ports::{MobileMoneyGateway, PushAccepted, PushRequest};
use crate::error::{DeskError, Result};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use rust_decimal::RoundingStrategy;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::info;

const PROVIDER: &str = "daraja";

/// Normalizes a Kenyan phone number to the `2547XXXXXXXX` form Daraja expects.
pub fn format_phone(phone: &str) -> Result<String> {
    let digits: String = phone
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '+' && *c != '-')
        .collect();
    let formatted = if let Some(rest) = digits.strip_prefix('0') {
        format!("254{rest}")
    } else if digits.starts_with("254") {
        digits
    } else {
        format!("254{digits}")
    };

    if formatted.len() == 12 && formatted.chars().all(|c| c.is_ascii_digit()) {
        Ok(formatted)
    } else {
        Err(DeskError::ValidationError(format!(
            "Invalid mobile money phone number: {phone}"
        )))
    }
}

/// STK password: base64 of shortcode, passkey and timestamp concatenated.
pub fn stk_password(shortcode: &str, passkey: &str, timestamp: &str) -> String {
    STANDARD.encode(format!("{shortcode}{passkey}{timestamp}"))
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct StkPushBody<'a> {
    business_short_code: &'a str,
    password: String,
    timestamp: &'a str,
    transaction_type: &'static str,
    amount: i64,
    party_a: &'a str,
    party_b: &'a str,
    phone_number: &'a str,
    #[serde(rename = "CallBackURL")]
    callback_url: &'a str,
    account_reference: &'a str,
    transaction_desc: &'a str,
}

#[derive(Deserialize)]
struct StkPushResponse {
    #[serde(rename = "MerchantRequestID", default)]
    merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID", default)]
    checkout_request_id: String,
    #[serde(rename = "ResponseCode", default)]
    response_code: String,
    #[serde(rename = "ResponseDescription", default)]
    response_description: String,
}

/// M-Pesa STK push over the Daraja API.
pub struct DarajaClient {
    http: reqwest::Client,
    config: DarajaConfig,
}

impl DarajaClient {
    pub fn new(config: DarajaConfig, timeout: Duration) -> Result<Self> {
        Ok(Self {
            http: http_client(timeout)?,
            config,
        })
    }

    async fn access_token(&self) -> Result<String> {
        let response = self
            .http
            .get(format!(
                "{}/oauth/v1/generate?grant_type=client_credentials",
                self.config.base_url
            ))
            .basic_auth(&self.config.consumer_key, Some(&self.config.consumer_secret))
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, e))?;

        if !response.status().is_success() {
            // A refused token request means our credentials are wrong; the
            // payer can do nothing about it.
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

#[async_trait]
impl MobileMoneyGateway for DarajaClient {
    async fn push_prompt(&self, request: PushRequest) -> Result<PushAccepted> {
        let phone = format_phone(&request.phone_number)?;
        let amount = request
            .amount
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .filter(|a| *a >= 1)
            .ok_or(DeskError::InvalidAmount)?;
        let token = self.access_token().await?;
        let timestamp = Utc::now().format("%Y%m%d%H%M%S").to_string();

        let body = StkPushBody {
            business_short_code: &self.config.shortcode,
            password: stk_password(&self.config.shortcode, &self.config.passkey, &timestamp),
            timestamp: &timestamp,
            transaction_type: "CustomerPayBillOnline",
            amount,
            party_a: &phone,
            party_b: &self.config.shortcode,
            phone_number: &phone,
            callback_url: &self.config.callback_url,
            account_reference: &request.account_reference,
            transaction_desc: &request.description,
        };

        let response = self
            .http
            .post(format!(
                "{}/mpesa/stkpush/v1/processrequest",
                self.config.base_url
            ))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(PROVIDER, e))?;

        if !response.status().is_success() {
            return Err(status_error(PROVIDER, "stk push", response).await);
        }
        let accepted: StkPushResponse = response
            .json()
            .await
            .map_err(|e| transport_error(PROVIDER, e))?;

        if accepted.response_code != "0" || accepted.checkout_request_id.is_empty() {
            return Err(DeskError::ProviderRejected {
                provider: PROVIDER,
                reason: accepted.response_description,
            });
        }

        info!(
            checkout_request_id = %accepted.checkout_request_id,
            amount,
            "STK push accepted"
        );
        Ok(PushAccepted {
            checkout_request_id: accepted.checkout_request_id,
            merchant_request_id: accepted.merchant_request_id,
        })
    }
}

/// A decoded STK callback: the correlation token and what happened.
#[derive(Debug, Clone, PartialEq)]
pub struct StkCallback {
    pub checkout_request_id: String,
    pub outcome: SettlementOutcome,
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Decodes the `Body.stkCallback` envelope. Returns `None` for anything that
/// does not carry a checkout request id and a result code.
pub fn parse_callback(payload: &Value) -> Option<StkCallback> {
    let callback = payload.get("Body")?.get("stkCallback")?;
    let checkout_request_id = callback
        .get("CheckoutRequestID")
        .and_then(as_text)
        .filter(|id| !id.is_empty())?;
    let result_code = callback.get("ResultCode").and_then(as_text)?;

    let item = |name: &str| {
        callback
            .get("CallbackMetadata")
            .and_then(|m| m.get("Item"))
            .and_then(Value::as_array)
            .and_then(|items| {
                items
                    .iter()
                    .find(|i| i.get("Name").and_then(Value::as_str) == Some(name))
            })
            .and_then(|i| i.get("Value"))
            .and_then(as_text)
    };

    let outcome = if result_code == "0" {
        SettlementOutcome::Completed {
            receipt: item("MpesaReceiptNumber"),
            settled_at: item("TransactionDate"),
        }
    } else {
        SettlementOutcome::Failed {
            reason: callback
                .get("ResultDesc")
                .and_then(as_text)
                .unwrap_or_else(|| format!("result code {result_code}")),
        }
    };

    Some(StkCallback {
        checkout_request_id,
        outcome,
    })
}
