//! Websocket rooms.
//!
//! A session joins rooms after connecting; every room maps to one
//! notification channel. Events published before the join are not replayed.
//!
//! **Client → Server:**
//! ```json
//! { "type": "join_user_room", "userId": "u1" }
//! { "type": "join_admin_room" }
//! { "type": "ping" }
//! ```
//!
//! **Server → Client:**
//! ```json
//! { "type": "joined", "room": "user:u1" }
//! { "type": "event", "room": "user:u1", "event": "booking-updated", "payload": {}, "emittedAt": "..." }
//! { "type": "error", "code": "FORBIDDEN", "message": "..." }
//! ```

use super::extractors::Caller;
use crate::application::Desk;
use crate::domain::notification::{Channel, Notification};
use crate::domain::principal::{Authorizer, Principal};
use crate::error::{DeskError, Result};
use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use chrono::{DateTime, Utc};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const OUTBOX_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    JoinUserRoom {
        #[serde(rename = "userId")]
        user_id: String,
    },
    JoinAdminRoom,
    Ping,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Joined {
        room: String,
    },
    Event {
        room: String,
        event: String,
        payload: Value,
        #[serde(rename = "emittedAt")]
        emitted_at: DateTime<Utc>,
    },
    Error {
        code: &'static str,
        message: String,
    },
    Pong,
}

impl From<Notification> for ServerMessage {
    fn from(n: Notification) -> Self {
        Self::Event {
            room: n.channel.to_string(),
            event: n.event_name,
            payload: n.payload,
            emitted_at: n.emitted_at,
        }
    }
}

impl From<&DeskError> for ServerMessage {
    fn from(err: &DeskError) -> Self {
        Self::Error {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

/// Resolves the channel a join request targets, if the caller may read it.
pub fn room_for(
    authorizer: &Authorizer,
    principal: &Principal,
    request: &ClientMessage,
) -> Result<Option<Channel>> {
    match request {
        ClientMessage::JoinUserRoom { user_id } => {
            authorizer.require_self_or_admin(principal, user_id)?;
            Ok(Some(Channel::user(user_id.clone())))
        }
        ClientMessage::JoinAdminRoom => {
            authorizer.require_admin(principal)?;
            Ok(Some(Channel::Admin))
        }
        ClientMessage::Ping => Ok(None),
    }
}

pub async fn handle(
    ws: WebSocketUpgrade,
    State(desk): State<Desk>,
    Caller(principal): Caller,
) -> Response {
    info!(principal = %principal.id, "WebSocket connection requested");
    ws.on_upgrade(move |socket| handle_socket(socket, desk, principal))
}

async fn handle_socket(socket: WebSocket, desk: Desk, principal: Principal) {
    let (mut sink, mut stream) = socket.split();
    let (outbox, mut pending) = mpsc::channel::<ServerMessage>(OUTBOX_CAPACITY);

    let mut send_task = tokio::spawn(async move {
        while let Some(message) = pending.recv().await {
            let Ok(text) = serde_json::to_string(&message) else {
                continue;
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let session = principal.id.clone();
    let bus = desk.bus.clone();
    let mut recv_task = tokio::spawn(async move {
        let mut rooms: HashMap<Channel, JoinHandle<()>> = HashMap::new();

        while let Some(Ok(message)) = stream.next().await {
            let text = match message {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };

            let reply = match serde_json::from_str::<ClientMessage>(&text) {
                Ok(request) => match room_for(&desk.authorizer, &principal, &request) {
                    Ok(Some(channel)) => {
                        let room = channel.to_string();
                        if !rooms.contains_key(&channel) {
                            let events = desk.bus.subscribe(channel.clone()).await;
                            rooms.insert(channel, forward(events, outbox.clone()));
                            debug!(principal = %principal.id, %room, "Joined room");
                        }
                        ServerMessage::Joined { room }
                    }
                    Ok(None) => ServerMessage::Pong,
                    Err(e) => {
                        warn!(principal = %principal.id, error = %e, "Room join refused");
                        ServerMessage::from(&e)
                    }
                },
                Err(e) => ServerMessage::Error {
                    code: "VALIDATION_ERROR",
                    message: e.to_string(),
                },
            };
            if outbox.send(reply).await.is_err() {
                break;
            }
        }

        for task in rooms.into_values() {
            task.abort();
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }
    bus.prune().await;
    info!(principal = %session, "WebSocket connection closed");
}

fn forward(
    mut events: broadcast::Receiver<Notification>,
    outbox: mpsc::Sender<ServerMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(notification) => {
                    if outbox.send(notification.into()).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Session lagging, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_join_requests() {
        let user: ClientMessage =
            serde_json::from_value(json!({"type": "join_user_room", "userId": "u1"})).unwrap();
        assert_eq!(
            user,
            ClientMessage::JoinUserRoom {
                user_id: "u1".to_string()
            }
        );
        let admin: ClientMessage =
            serde_json::from_value(json!({"type": "join_admin_room"})).unwrap();
        assert_eq!(admin, ClientMessage::JoinAdminRoom);
    }

    #[test]
    fn test_room_authorization() {
        let authorizer = Authorizer::default();
        let customer = Principal::customer("u1");

        let own = room_for(
            &authorizer,
            &customer,
            &ClientMessage::JoinUserRoom {
                user_id: "u1".to_string(),
            },
        )
        .unwrap();
        assert_eq!(own, Some(Channel::user("u1")));

        let other = room_for(
            &authorizer,
            &customer,
            &ClientMessage::JoinUserRoom {
                user_id: "u2".to_string(),
            },
        );
        assert!(matches!(other, Err(DeskError::Forbidden(_))));
        assert!(room_for(&authorizer, &customer, &ClientMessage::JoinAdminRoom).is_err());
        assert_eq!(
            room_for(&authorizer, &Principal::admin("a1"), &ClientMessage::JoinAdminRoom).unwrap(),
            Some(Channel::Admin)
        );
    }

    #[test]
    fn test_event_frame_shape() {
        let frame = ServerMessage::from(Notification::new(
            Channel::user("u1"),
            "booking-updated",
            json!({"action": "approved"}),
        ));
        let value = serde_json::to_value(&frame).unwrap();
        assert_eq!(value["type"], "event");
        assert_eq!(value["room"], "user:u1");
        assert_eq!(value["event"], "booking-updated");
        assert_eq!(value["payload"]["action"], "approved");
    }
}
