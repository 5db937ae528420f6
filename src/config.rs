//! Configuration management for the desk.
//!
//! Loads configuration from environment variables with sensible defaults. A
//! provider block is only enabled when every credential it needs is present.

use crate::domain::booking::CancellationPolicy;
use crate::error::{DeskError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    /// RocksDB path; `None` keeps everything in memory.
    pub db_path: Option<PathBuf>,
    pub payments: PaymentsConfig,
    pub policy: PolicyConfig,
    pub daraja: Option<DarajaConfig>,
    pub paypal: Option<PayPalConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentsConfig {
    /// Currency for mock, mobile-money and bank-transfer payments.
    pub currency: String,
    /// Delay before a mock payment settles.
    pub mock_settlement_ms: u64,
    /// Upper bound on any outbound provider call.
    pub provider_timeout_secs: u64,
}

impl PaymentsConfig {
    pub fn mock_settlement_delay(&self) -> Duration {
        Duration::from_millis(self.mock_settlement_ms)
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleSource {
    /// Trust the role claim delivered with the principal.
    Claim,
    /// Admin only for ids listed in `admin_ids`.
    Table,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub cancellation: CancellationPolicy,
    pub role_source: RoleSource,
    pub admin_ids: Vec<String>,
}

/// Daraja (M-Pesa STK push) credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DarajaConfig {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub passkey: String,
    pub shortcode: String,
    pub base_url: String,
    pub callback_url: String,
}

/// PayPal orders API credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayPalConfig {
    pub client_id: String,
    pub client_secret: String,
    pub base_url: String,
    pub return_url: String,
    pub cancel_url: String,
    pub currency: String,
}

impl Config {
    /// Loads configuration from the process environment, after reading an
    /// optional `.env` file.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. Unknown policy
    /// values are refused rather than replaced by a default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());
        let parsed = |key: &str, default: u64| {
            get(key)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        };

        let daraja = match (
            get("DARAJA_CONSUMER_KEY"),
            get("DARAJA_CONSUMER_SECRET"),
            get("DARAJA_PASSKEY"),
            get("DARAJA_SHORTCODE"),
        ) {
            (Some(consumer_key), Some(consumer_secret), Some(passkey), Some(shortcode)) => {
                Some(DarajaConfig {
                    consumer_key,
                    consumer_secret,
                    passkey,
                    shortcode,
                    base_url: or("DARAJA_BASE_URL", "https://sandbox.safaricom.co.ke"),
                    callback_url: or(
                        "DARAJA_CALLBACK_URL",
                        "http://localhost:8080/api/v1/payments/mobile-money/callback",
                    ),
                })
            }
            _ => None,
        };

        let paypal = match (get("PAYPAL_CLIENT_ID"), get("PAYPAL_CLIENT_SECRET")) {
            (Some(client_id), Some(client_secret)) => Some(PayPalConfig {
                client_id,
                client_secret,
                base_url: or("PAYPAL_BASE_URL", "https://api-m.sandbox.paypal.com"),
                return_url: or("PAYPAL_RETURN_URL", "http://localhost:5173/payment/success"),
                cancel_url: or("PAYPAL_CANCEL_URL", "http://localhost:5173/payment/cancel"),
                currency: or("PAYPAL_CURRENCY", "USD"),
            }),
            _ => None,
        };

        let cancellation = match get("DESK_CANCELLATION_POLICY").as_deref().map(str::trim) {
            None | Some("pending_only") => CancellationPolicy::PendingOnly,
            Some("until_completed") => CancellationPolicy::UntilCompleted,
            Some(other) => return Err(unknown_value("DESK_CANCELLATION_POLICY", other)),
        };
        let role_source = match get("DESK_ROLE_SOURCE").as_deref().map(str::trim) {
            None | Some("claim") => RoleSource::Claim,
            Some("table") => RoleSource::Table,
            Some(other) => return Err(unknown_value("DESK_ROLE_SOURCE", other)),
        };
        let admin_ids = get("DESK_ADMIN_IDS")
            .map(|ids| {
                ids.split(',')
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            server: ServerConfig {
                host: or("DESK_HOST", "0.0.0.0"),
                port: get("DESK_PORT")
                    .and_then(|v| v.trim().parse().ok())
                    .unwrap_or(8080),
                log_level: or("DESK_LOG_LEVEL", "info"),
            },
            db_path: get("DESK_DB_PATH").map(PathBuf::from),
            payments: PaymentsConfig {
                currency: or("DESK_CURRENCY", "KES"),
                mock_settlement_ms: parsed("DESK_MOCK_SETTLEMENT_MS", 3000),
                provider_timeout_secs: parsed("DESK_PROVIDER_TIMEOUT_SECS", 15),
            },
            policy: PolicyConfig {
                cancellation,
                role_source,
                admin_ids,
            },
            daraja,
            paypal,
        })
    }
}

fn unknown_value(key: &str, value: &str) -> DeskError {
    DeskError::ValidationError(format!("Unrecognized value for {key}: {value}"))
}
