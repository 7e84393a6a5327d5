//! # Common Test Utilities
//!
//! In-memory SQLite with migrations applied, a shared manual clock and a few
//! broadcaster doubles.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use presence_seaorm_store::broadcast::BroadcastError;
use presence_seaorm_store::migration::{Migrator, MigratorTrait};
use presence_seaorm_store::{
    ActiveSessionStore, ActivityRecorder, BroadcastConfig, Broadcaster, Clock, FanOut, ManualClock,
    NotificationStore, SessionTouch, SharedClock,
};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use serde_json::Value;

/// Initialize test logging (run once per test session)
static INIT: Once = Once::new();

pub fn init_test_env() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .try_init();
    });
}

/// Noon on a fixed day, whole seconds so stored timestamps compare exactly.
pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

pub struct TestDb {
    pub conn: DatabaseConnection,
    pub clock: ManualClock,
}

impl TestDb {
    pub async fn new() -> Self {
        init_test_env();

        // One connection, or every checkout would see its own empty database.
        let mut options = ConnectOptions::new("sqlite::memory:");
        options
            .max_connections(1)
            .min_connections(1)
            .sqlx_logging(false);

        let conn = Database::connect(options)
            .await
            .expect("Failed to open in-memory SQLite");
        Migrator::up(&conn, None)
            .await
            .expect("Failed to run migrations");

        Self {
            conn,
            clock: ManualClock::new(start()),
        }
    }

    pub fn shared_clock(&self) -> SharedClock {
        Arc::new(self.clock.clone())
    }

    pub fn sessions(&self) -> ActiveSessionStore {
        ActiveSessionStore::new(self.conn.clone()).with_clock(self.shared_clock())
    }

    pub fn activities(&self) -> ActivityRecorder {
        ActivityRecorder::new(self.conn.clone()).with_clock(self.shared_clock())
    }

    pub fn notifications(&self) -> NotificationStore {
        NotificationStore::new(self.conn.clone()).with_clock(self.shared_clock())
    }

    /// Inserts a guest session last seen `idle` before the current clock.
    pub async fn seed_session(&self, session_id: &str, idle: Duration) {
        let now = self.clock.now();
        self.clock.set(now - idle);
        self.sessions()
            .touch(&guest(session_id))
            .await
            .expect("Failed to seed session");
        self.clock.set(now);
    }
}

pub fn guest(session_id: &str) -> SessionTouch {
    SessionTouch {
        session_id: session_id.to_string(),
        ip_address: "1.2.3.4".to_string(),
        ..Default::default()
    }
}

/// Fast retries so failure paths do not slow the suite down.
pub fn quick_retries() -> BroadcastConfig {
    BroadcastConfig {
        publish_timeout_ms: 200,
        max_attempts: 2,
        retry_backoff_ms: 1,
    }
}

/// Rejects every publish and counts the attempts.
#[derive(Debug, Default)]
pub struct FailingBroadcaster {
    pub attempts: AtomicUsize,
}

impl FailingBroadcaster {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Broadcaster for FailingBroadcaster {
    async fn publish(&self, _channel: &str, _event: &str, _payload: &Value) -> Result<(), BroadcastError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(BroadcastError::Transport("broker unavailable".into()))
    }
}

pub fn failing_fan_out() -> (FanOut, Arc<FailingBroadcaster>) {
    let broadcaster = Arc::new(FailingBroadcaster::default());
    let fan_out = FanOut::new(broadcaster.clone()).with_config(quick_retries());
    (fan_out, broadcaster)
}
