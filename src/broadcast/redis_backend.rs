use std::fmt;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use serde_json::{json, Value};

use super::{BroadcastError, Broadcaster};

/// Publishes over Redis `PUBLISH`, wrapping each payload in an
/// `{event, data, socket}` envelope for websocket relays.
#[derive(Clone)]
pub struct RedisBroadcaster {
    conn: MultiplexedConnection,
    prefix: String,
}

impl fmt::Debug for RedisBroadcaster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisBroadcaster")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl RedisBroadcaster {
    pub async fn connect(url: &str) -> Result<Self, BroadcastError> {
        let client = redis::Client::open(url).map_err(|e| BroadcastError::Transport(e.to_string()))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| BroadcastError::Transport(e.to_string()))?;

        Ok(Self {
            conn,
            prefix: String::new(),
        })
    }

    /// Prepends `prefix` to every channel name, e.g. an app-specific namespace.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }
}

#[async_trait]
impl Broadcaster for RedisBroadcaster {
    async fn publish(&self, channel: &str, event: &str, payload: &Value) -> Result<(), BroadcastError> {
        let envelope = json!({ "event": event, "data": payload, "socket": null });
        let message = serde_json::to_string(&envelope)?;

        let mut conn = self.conn.clone();
        let _receivers: i64 = conn
            .publish(format!("{}{}", self.prefix, channel), message)
            .await
            .map_err(|e| BroadcastError::Transport(e.to_string()))?;

        Ok(())
    }
}
