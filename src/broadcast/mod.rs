//! Event fan-out.
//!
//! [`FanOut`] turns a [`BroadcastEvent`] into one publish per channel on a
//! [`Broadcaster`]. Publishing is at-least-once towards the broker: each
//! channel is retried with a per-attempt timeout, and whatever still fails is
//! logged and reported in the [`DeliveryReport`]. Nothing here returns an
//! error to the caller, so store writes never depend on broadcast success.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::config::BroadcastConfig;

mod backends;
mod event;
#[cfg(feature = "redis")]
mod redis_backend;

pub use backends::{BroadcastMessage, ChannelBroadcaster, LogBroadcaster};
pub use event::{
    channels, ActivityBody, ActivityPayload, BroadcastEvent, NotificationPayload,
    PresencePayload, SessionPayload,
};
#[cfg(feature = "redis")]
pub use redis_backend::RedisBroadcaster;

#[derive(Debug, thiserror::Error)]
pub enum BroadcastError {
    #[error("publish timed out after {0:?}")]
    Timeout(Duration),

    #[error("broker error: {0}")]
    Transport(String),

    #[error("payload serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A pub/sub backend.
#[async_trait]
pub trait Broadcaster: Debug + Send + Sync {
    /// Hands one payload to the broker for `channel` under `event`.
    async fn publish(&self, channel: &str, event: &str, payload: &Value)
        -> Result<(), BroadcastError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedDelivery {
    pub channel: &'static str,
    pub error: String,
}

/// Outcome of publishing one event on all of its channels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub event: &'static str,
    pub delivered: Vec<&'static str>,
    pub failed: Vec<FailedDelivery>,
}

impl DeliveryReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Routes events to channels and publishes them with retries.
#[derive(Debug, Clone)]
pub struct FanOut {
    broadcaster: Arc<dyn Broadcaster>,
    config: BroadcastConfig,
}

impl FanOut {
    pub fn new(broadcaster: Arc<dyn Broadcaster>) -> Self {
        Self {
            broadcaster,
            config: BroadcastConfig::default(),
        }
    }

    pub fn with_config(mut self, config: BroadcastConfig) -> Self {
        self.config = config;
        self
    }

    /// A fan-out that only logs. Handy when no broker is configured.
    pub fn logging() -> Self {
        Self::new(Arc::new(LogBroadcaster))
    }

    /// Publishes on every channel of `event` and waits for the outcome.
    pub async fn publish(&self, event: &BroadcastEvent) -> DeliveryReport {
        let name = event.name();
        let channels = event.channels();
        let mut report = DeliveryReport {
            event: name,
            ..Default::default()
        };

        let payload = match event.payload() {
            Ok(payload) => payload,
            Err(err) => {
                error!(event = name, error = %err, "Broadcast payload could not be serialized");
                report.failed = channels
                    .into_iter()
                    .map(|channel| FailedDelivery {
                        channel,
                        error: err.to_string(),
                    })
                    .collect();
                return report;
            }
        };

        for channel in channels {
            match self.publish_with_retry(channel, name, &payload).await {
                Ok(attempts) => {
                    debug!(event = name, channel, attempts, "Broadcast delivered");
                    report.delivered.push(channel);
                }
                Err(err) => {
                    error!(
                        event = name,
                        channel,
                        attempts = self.config.max_attempts,
                        error = %err,
                        "Broadcast dropped after retries"
                    );
                    report.failed.push(FailedDelivery {
                        channel,
                        error: err.to_string(),
                    });
                }
            }
        }

        report
    }

    /// Publishes on a background task so the caller's latency does not depend
    /// on the broker. Returns `None` outside a tokio runtime, after logging.
    pub fn dispatch(&self, event: BroadcastEvent) -> Option<JoinHandle<DeliveryReport>> {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let fan_out = self.clone();
                Some(handle.spawn(async move { fan_out.publish(&event).await }))
            }
            Err(_) => {
                error!(event = event.name(), "No async runtime; broadcast dropped");
                None
            }
        }
    }

    async fn publish_with_retry(
        &self,
        channel: &'static str,
        event: &'static str,
        payload: &Value,
    ) -> Result<u32, BroadcastError> {
        let timeout = self.config.publish_timeout();
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let outcome = tokio::time::timeout(
                timeout,
                self.broadcaster.publish(channel, event, payload),
            )
            .await
            .unwrap_or_else(|_| Err(BroadcastError::Timeout(timeout)));

            match outcome {
                Ok(()) => return Ok(attempt),
                Err(err) if attempt < max_attempts => {
                    warn!(event, channel, attempt, error = %err, "Broadcast attempt failed; retrying");
                    tokio::time::sleep(self.config.retry_backoff() * attempt).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
