//! Runtime configuration for the presence subsystem.
//!
//! [`PresenceConfig`] can be built in code with the `with_*` methods,
//! deserialized from an application's own config file, or read from
//! `PRESENCE_*` environment variables with [`PresenceConfig::from_env`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default age after which the sweeper deletes a session row.
pub const DEFAULT_CLEANUP_CUTOFF_MINUTES: u32 = 30;

/// Default page size for batched evictions.
pub const DEFAULT_SWEEP_BATCH_SIZE: u64 = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    /// Minutes of inactivity before a session row is eligible for deletion.
    ///
    /// This is not the presence window; see [`crate::presence::ACTIVE_WINDOW`].
    pub cleanup_cutoff_minutes: u32,
    pub sweep_batch_size: u64,
    /// Emit a `user.offline` payload for each evicted session.
    pub emit_offline_events: bool,
    pub broadcast: BroadcastConfig,
    /// Upper bound on a geo-IP lookup during `touch`.
    pub geo_timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BroadcastConfig {
    /// Per-attempt publish timeout.
    pub publish_timeout_ms: u64,
    /// Attempts per channel before the failure is logged and dropped.
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            cleanup_cutoff_minutes: DEFAULT_CLEANUP_CUTOFF_MINUTES,
            sweep_batch_size: DEFAULT_SWEEP_BATCH_SIZE,
            emit_offline_events: true,
            broadcast: BroadcastConfig::default(),
            geo_timeout_ms: 500,
        }
    }
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            publish_timeout_ms: 2_000,
            max_attempts: 3,
            retry_backoff_ms: 100,
        }
    }
}

impl BroadcastConfig {
    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl PresenceConfig {
    /// Reads overrides from `PRESENCE_*` environment variables, falling back
    /// to defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Some(v) = env_parse("PRESENCE_CLEANUP_CUTOFF_MINUTES")? {
            config.cleanup_cutoff_minutes = v;
        }
        if let Some(v) = env_parse("PRESENCE_SWEEP_BATCH_SIZE")? {
            config.sweep_batch_size = v;
        }
        if let Some(v) = env_parse("PRESENCE_EMIT_OFFLINE_EVENTS")? {
            config.emit_offline_events = v;
        }
        if let Some(v) = env_parse("PRESENCE_GEO_TIMEOUT_MS")? {
            config.geo_timeout_ms = v;
        }
        if let Some(v) = env_parse("PRESENCE_PUBLISH_TIMEOUT_MS")? {
            config.broadcast.publish_timeout_ms = v;
        }
        if let Some(v) = env_parse("PRESENCE_PUBLISH_MAX_ATTEMPTS")? {
            config.broadcast.max_attempts = v;
        }
        if let Some(v) = env_parse("PRESENCE_PUBLISH_RETRY_BACKOFF_MS")? {
            config.broadcast.retry_backoff_ms = v;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cleanup_cutoff_minutes == 0 {
            return Err(Error::invalid("cleanup cutoff must be at least one minute"));
        }
        if self.sweep_batch_size == 0 {
            return Err(Error::invalid("sweep batch size must be positive"));
        }
        if self.broadcast.max_attempts == 0 {
            return Err(Error::invalid("broadcast max_attempts must be positive"));
        }
        Ok(())
    }

    pub fn with_cleanup_cutoff_minutes(mut self, minutes: u32) -> Self {
        self.cleanup_cutoff_minutes = minutes;
        self
    }

    pub fn with_sweep_batch_size(mut self, size: u64) -> Self {
        self.sweep_batch_size = size;
        self
    }

    pub fn with_offline_events(mut self, emit: bool) -> Self {
        self.emit_offline_events = emit;
        self
    }

    pub fn with_broadcast(mut self, broadcast: BroadcastConfig) -> Self {
        self.broadcast = broadcast;
        self
    }

    pub fn cleanup_cutoff(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.cleanup_cutoff_minutes))
    }

    pub fn geo_timeout(&self) -> Duration {
        Duration::from_millis(self.geo_timeout_ms)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::invalid(format!("{key} has an unparseable value: {raw}"))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_keep_cutoff_wider_than_presence_window() {
        let config = PresenceConfig::default();
        assert_eq!(config.cleanup_cutoff(), chrono::Duration::minutes(30));
        assert!(config.cleanup_cutoff() > crate::presence::ACTIVE_WINDOW);
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: PresenceConfig =
            serde_json::from_str(r#"{"cleanup_cutoff_minutes": 45, "broadcast": {"max_attempts": 5}}"#)
                .unwrap();

        assert_eq!(config.cleanup_cutoff_minutes, 45);
        assert_eq!(config.broadcast.max_attempts, 5);
        assert_eq!(config.broadcast.publish_timeout_ms, 2_000);
        assert_eq!(config.sweep_batch_size, DEFAULT_SWEEP_BATCH_SIZE);
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let err = PresenceConfig::default()
            .with_sweep_batch_size(0)
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
