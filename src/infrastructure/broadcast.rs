use crate::domain::notification::{Channel, Notification};
use crate::domain::ports::NotificationBus;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};
use tracing::debug;

/// Per-subscriber buffer. A subscriber that falls further behind than this
/// loses the oldest events and is expected to re-fetch.
const CHANNEL_CAPACITY: usize = 256;

/// In-process fan-out with one broadcast channel per [`Channel`].
///
/// Subscribers only see events published after they subscribed; there is no
/// backlog or replay. A channel whose last receiver is gone is forgotten on
/// the next publish to it or on [`ChannelBus::prune`].
#[derive(Clone, Default)]
pub struct ChannelBus {
    channels: Arc<RwLock<HashMap<Channel, broadcast::Sender<Notification>>>>,
}

impl ChannelBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(&self, channel: Channel) -> broadcast::Receiver<Notification> {
        let mut channels = self.channels.write().await;
        channels
            .entry(channel)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Number of channels with at least one live subscriber.
    pub async fn active_channels(&self) -> usize {
        let channels = self.channels.read().await;
        channels
            .values()
            .filter(|sender| sender.receiver_count() > 0)
            .count()
    }

    /// Number of channels currently held, live or not.
    pub async fn registered_channels(&self) -> usize {
        self.channels.read().await.len()
    }

    /// Drops every channel without receivers. Returns how many were removed.
    pub async fn prune(&self) -> usize {
        let mut channels = self.channels.write().await;
        let before = channels.len();
        channels.retain(|_, sender| sender.receiver_count() > 0);
        let removed = before - channels.len();
        if removed > 0 {
            debug!(removed, "Idle channels pruned");
        }
        removed
    }

    async fn forget_if_idle(&self, channel: &Channel) {
        let mut channels = self.channels.write().await;
        if channels
            .get(channel)
            .is_some_and(|sender| sender.receiver_count() == 0)
        {
            channels.remove(channel);
        }
    }
}

#[async_trait]
impl NotificationBus for ChannelBus {
    async fn publish(&self, notification: Notification) {
        let channel = notification.channel.clone();
        let delivered = {
            let channels = self.channels.read().await;
            let Some(sender) = channels.get(&channel) else {
                debug!(%channel, event = %notification.event_name, "No subscribers, event dropped");
                return;
            };
            sender.send(notification)
        };
        match delivered {
            Ok(receivers) => debug!(%channel, receivers, "Event delivered"),
            Err(_) => {
                debug!(%channel, "Subscribers gone, event dropped");
                self.forget_if_idle(&channel).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_delivers_only_to_matching_channel() {
        let bus = ChannelBus::new();
        let mut alice = bus.subscribe(Channel::user("alice")).await;
        let mut admin = bus.subscribe(Channel::Admin).await;

        bus.publish(Notification::new(
            Channel::user("alice"),
            "booking-updated",
            json!({"action": "approved"}),
        ))
        .await;

        let received = alice.recv().await.unwrap();
        assert_eq!(received.event_name, "booking-updated");
        assert!(admin.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_no_replay_for_late_subscribers() {
        let bus = ChannelBus::new();
        bus.publish(Notification::new(Channel::Admin, "booking-created", json!({})))
            .await;

        let mut late = bus.subscribe(Channel::Admin).await;
        assert!(late.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_fan_out_to_every_session() {
        let bus = ChannelBus::new();
        let mut first = bus.subscribe(Channel::Admin).await;
        let mut second = bus.subscribe(Channel::Admin).await;
        assert_eq!(bus.active_channels().await, 1);

        bus.publish(Notification::new(Channel::Admin, "booking-created", json!({})))
            .await;

        assert_eq!(first.recv().await.unwrap().event_name, "booking-created");
        assert_eq!(second.recv().await.unwrap().event_name, "booking-created");
    }

    #[tokio::test]
    async fn test_idle_channels_are_forgotten() {
        let bus = ChannelBus::new();
        let gone = bus.subscribe(Channel::user("u1")).await;
        let _admin = bus.subscribe(Channel::Admin).await;
        let idle = bus.subscribe(Channel::user("u2")).await;
        assert_eq!(bus.registered_channels().await, 3);

        drop(gone);
        bus.publish(Notification::new(Channel::user("u1"), "booking-updated", json!({})))
            .await;
        assert_eq!(bus.registered_channels().await, 2);

        drop(idle);
        assert_eq!(bus.prune().await, 1);
        assert_eq!(bus.registered_channels().await, 1);
        assert_eq!(bus.active_channels().await, 1);
    }
}
