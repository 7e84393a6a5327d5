//! Presence policy and aggregation.
//!
//! A session is *active* while less than [`ACTIVE_WINDOW`] has passed since
//! its last touch. That window is fixed. The cleanup cutoff that decides when
//! a row may be deleted is a separate, larger, configurable threshold
//! ([`crate::PresenceConfig::cleanup_cutoff_minutes`]), so a session can be
//! inactive for a while before it becomes eligible for eviction.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::active_session;
use crate::error::Result;
use crate::session_store::ActiveSessionStore;

/// Presence window: 15 minutes.
pub const ACTIVE_WINDOW: Duration = Duration::minutes(15);

pub fn is_active(session: &active_session::Model, now: DateTime<Utc>) -> bool {
    now - session.last_activity < ACTIVE_WINDOW
}

/// Derived presence counts. Never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceSnapshot {
    pub active_count: u64,
    pub authenticated_count: u64,
    pub guest_count: u64,
    pub sessions_today: u64,
}

/// Read-only view over an [`ActiveSessionStore`].
#[derive(Debug, Clone)]
pub struct PresenceEvaluator {
    store: ActiveSessionStore,
}

impl PresenceEvaluator {
    pub fn new(store: ActiveSessionStore) -> Self {
        Self { store }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.store.clock().now()
    }

    pub fn is_active(&self, session: &active_session::Model) -> bool {
        is_active(session, self.now())
    }

    pub async fn aggregate(&self) -> Result<PresenceSnapshot> {
        let counts = self.store.count_active(ACTIVE_WINDOW).await?;
        let sessions_today = self.store.sessions_today().await?;

        Ok(PresenceSnapshot {
            active_count: counts.active,
            authenticated_count: counts.authenticated,
            guest_count: counts.guest,
            sessions_today,
        })
    }

    pub async fn active_sessions(&self) -> Result<Vec<active_session::Model>> {
        self.store.active_sessions(ACTIVE_WINDOW).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn session_seen_at(last_activity: DateTime<Utc>) -> active_session::Model {
        active_session::Model {
            id: 1,
            session_id: "sess-A".into(),
            user_id: None,
            ip_address: "1.2.3.4".into(),
            user_agent: None,
            location: None,
            page_url: None,
            last_activity,
            created_at: last_activity,
        }
    }

    #[test]
    fn window_boundary_is_exclusive() {
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

        let fresh = session_seen_at(now - Duration::minutes(14) - Duration::seconds(59));
        let stale = session_seen_at(now - Duration::minutes(15) - Duration::seconds(1));
        let exact = session_seen_at(now - ACTIVE_WINDOW);

        assert!(is_active(&fresh, now));
        assert!(!is_active(&stale, now));
        assert!(!is_active(&exact, now));
    }
}
