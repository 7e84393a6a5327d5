use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::{BroadcastError, Broadcaster};

/// Writes every publish to the log and nothing else.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogBroadcaster;

#[async_trait]
impl Broadcaster for LogBroadcaster {
    async fn publish(&self, channel: &str, event: &str, payload: &Value) -> Result<(), BroadcastError> {
        info!(channel, event, %payload, "Broadcast");
        Ok(())
    }
}

/// One message on the in-process bus.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BroadcastMessage {
    pub channel: String,
    pub event: String,
    pub payload: Value,
}

/// In-process bus on `tokio::sync::broadcast`.
///
/// Suits a single-node deployment where websocket or SSE handlers live in the
/// same process. Receivers that fall behind get `Lagged` and miss messages;
/// polling covers the gap.
#[derive(Debug, Clone)]
pub struct ChannelBroadcaster {
    tx: broadcast::Sender<BroadcastMessage>,
}

impl ChannelBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastMessage> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[async_trait]
impl Broadcaster for ChannelBroadcaster {
    async fn publish(&self, channel: &str, event: &str, payload: &Value) -> Result<(), BroadcastError> {
        let message = BroadcastMessage {
            channel: channel.to_string(),
            event: event.to_string(),
            payload: payload.clone(),
        };

        // The bus accepted it; nobody listening is not a failure.
        if self.tx.send(message).is_err() {
            debug!(channel, event, "No in-process subscribers");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn channel_broadcaster_delivers_to_subscribers() {
        let bus = ChannelBroadcaster::new(8);
        let mut rx = bus.subscribe();

        bus.publish("admin.presence", "user.online", &json!({"total_active_users": 1}))
            .await
            .unwrap();

        let message = rx.recv().await.unwrap();
        assert_eq!(message.channel, "admin.presence");
        assert_eq!(message.event, "user.online");
        assert_eq!(message.payload["total_active_users"], 1);
    }

    #[tokio::test]
    async fn channel_broadcaster_without_subscribers_is_ok() {
        let bus = ChannelBroadcaster::new(8);
        assert!(bus.publish("admin.presence", "user.online", &json!({})).await.is_ok());
    }
}
