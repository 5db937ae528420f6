use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Name of the shared channel every admin session can join.
pub const ADMIN_CHANNEL: &str = "admin";

/// A fan-out channel: one per user id, plus the shared admin channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum Channel {
    User(String),
    Admin,
}

impl Channel {
    pub fn user(id: impl Into<String>) -> Self {
        Self::User(id.into())
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{id}"),
            Self::Admin => f.write_str(ADMIN_CHANNEL),
        }
    }
}

/// An ephemeral state-change event. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub channel: Channel,
    pub event_name: String,
    pub payload: serde_json::Value,
    pub emitted_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(channel: Channel, event_name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            channel,
            event_name: event_name.into(),
            payload,
            emitted_at: Utc::now(),
        }
    }
}
