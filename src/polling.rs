//! Pull-based reads for clients without a push connection.
//!
//! Every method returns the same payload structs the fan-out publishes, so a
//! dashboard can switch between polling and subscribing without a second
//! decoder. Feeds page forward from a `last_id` cursor: only rows with a
//! strictly greater id come back, oldest first.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::activity::{ActivityQuery, ActivityRecorder};
use crate::broadcast::{ActivityPayload, NotificationPayload, PresencePayload};
use crate::error::Result;
use crate::notification::{NotificationQuery, NotificationStore};
use crate::presence::{PresenceEvaluator, PresenceSnapshot};

/// Page size when the caller passes none.
pub const DEFAULT_PAGE_SIZE: u64 = 50;
const MAX_PAGE_SIZE: u64 = 500;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresenceView {
    #[serde(flatten)]
    pub snapshot: PresenceSnapshot,
    /// One `user.online`-shaped payload per active session.
    pub users: Vec<PresencePayload>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityPage {
    pub activities: Vec<ActivityPayload>,
    /// Cursor for the next call; echoes the input when nothing is new.
    pub last_id: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationPage {
    pub notifications: Vec<NotificationPayload>,
    pub last_id: Option<i32>,
    pub unread_count: u64,
}

#[derive(Debug, Clone)]
pub struct PollingFeed {
    presence: PresenceEvaluator,
    activities: ActivityRecorder,
    notifications: NotificationStore,
}

impl PollingFeed {
    pub fn new(
        presence: PresenceEvaluator,
        activities: ActivityRecorder,
        notifications: NotificationStore,
    ) -> Self {
        Self {
            presence,
            activities,
            notifications,
        }
    }

    /// Current counts plus every active session, most recently seen first.
    pub async fn presence(&self) -> Result<PresenceView> {
        let snapshot = self.presence.aggregate().await?;
        let now = self.presence.now();
        let users = self
            .presence
            .active_sessions()
            .await?
            .iter()
            .map(|session| PresencePayload::new(session, None, snapshot.active_count, now))
            .collect();

        Ok(PresenceView {
            snapshot,
            users,
            timestamp: now,
        })
    }

    pub async fn activities_since(&self, last_id: Option<i32>, limit: Option<u64>) -> Result<ActivityPage> {
        let mut query = ActivityQuery::new().oldest_first().limit(page_size(limit));
        if let Some(id) = last_id {
            query = query.after_id(id);
        }

        let activities: Vec<ActivityPayload> = self
            .activities
            .query(&query)
            .await?
            .iter()
            .map(|entry| ActivityPayload::new(entry, None, entry.created_at))
            .collect();

        Ok(ActivityPage {
            last_id: activities.last().map(|a| a.activity.id).or(last_id),
            activities,
        })
    }

    pub async fn notifications_since(
        &self,
        last_id: Option<i32>,
        limit: Option<u64>,
    ) -> Result<NotificationPage> {
        let mut query = NotificationQuery::new().oldest_first().limit(page_size(limit));
        if let Some(id) = last_id {
            query = query.after_id(id);
        }

        let notifications: Vec<NotificationPayload> = self
            .notifications
            .query(&query)
            .await?
            .iter()
            .map(|n| NotificationPayload::new(n, None))
            .collect();

        Ok(NotificationPage {
            last_id: notifications.last().map(|n| n.id).or(last_id),
            unread_count: self.notifications.unread_count().await?,
            notifications,
        })
    }
}

fn page_size(limit: Option<u64>) -> u64 {
    limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_is_clamped() {
        assert_eq!(page_size(None), DEFAULT_PAGE_SIZE);
        assert_eq!(page_size(Some(0)), 1);
        assert_eq!(page_size(Some(10_000)), MAX_PAGE_SIZE);
    }
}
