//! Outbound payloads and their channel routing.
//!
//! Every payload is a flat copy of primitive fields, safe to serialize and
//! hand to any subscriber. [`BroadcastEvent`] is the closed set of things the
//! subsystem publishes; adding a kind means adding a variant and its arms.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::activity::ActivityCategory;
use crate::context::Actor;
use crate::entity::active_session::{self, Location};
use crate::entity::activity_log;
use crate::entity::admin_notification::{self, NotificationKind, NotificationPriority};

/// Static channel names.
pub mod channels {
    /// Online/offline and heartbeat payloads.
    pub const PRESENCE: &str = "admin.presence";
    /// Catch-all for admin dashboards.
    pub const MONITORING: &str = "admin.monitoring";
    pub const NOTIFICATIONS: &str = "admin.notifications";
    pub const ORDERS: &str = "admin.orders";
    pub const PAYMENTS: &str = "admin.payments";
    pub const INVENTORY: &str = "admin.inventory";
    pub const USERS: &str = "admin.users";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionPayload {
    pub id: i32,
    pub session_id: String,
    pub ip_address: String,
    pub location: Option<Location>,
    pub page_url: Option<String>,
    pub last_activity: DateTime<Utc>,
}

impl From<&active_session::Model> for SessionPayload {
    fn from(session: &active_session::Model) -> Self {
        Self {
            id: session.id,
            session_id: session.session_id.clone(),
            ip_address: session.ip_address.clone(),
            location: session.location(),
            page_url: session.page_url.clone(),
            last_activity: session.last_activity,
        }
    }
}

/// Body of `user.online`, `user.active` and `user.offline`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresencePayload {
    pub user: Option<Actor>,
    pub session: SessionPayload,
    pub total_active_users: u64,
    pub timestamp: DateTime<Utc>,
    /// Seconds between first and last touch; offline payloads only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_duration: Option<i64>,
}

impl PresencePayload {
    /// `actor` supplies display details when the caller has them; otherwise a
    /// bare id is derived from the session row.
    pub fn new(
        session: &active_session::Model,
        actor: Option<Actor>,
        total_active_users: u64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            user: actor.or_else(|| session.user_id.map(Actor::new)),
            session: SessionPayload::from(session),
            total_active_users,
            timestamp,
            session_duration: None,
        }
    }

    pub fn offline(
        session: &active_session::Model,
        total_active_users: u64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            session_duration: Some(session.duration().num_seconds()),
            ..Self::new(session, None, total_active_users, timestamp)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityBody {
    pub id: i32,
    pub action: activity_log::ActivityAction,
    pub description: String,
    pub user: Option<Actor>,
    pub metadata: Value,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub icon: String,
    pub color: String,
    pub priority: NotificationPriority,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityPayload {
    pub activity: ActivityBody,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl ActivityPayload {
    pub fn new(entry: &activity_log::Model, actor: Option<Actor>, timestamp: DateTime<Utc>) -> Self {
        let description = entry.action_description();

        Self {
            message: format!("New activity: {description}"),
            activity: ActivityBody {
                id: entry.id,
                action: entry.action,
                description,
                user: actor.or_else(|| entry.user_id.map(Actor::new)),
                metadata: entry.metadata.clone(),
                ip_address: entry.ip_address.clone(),
                created_at: entry.created_at,
                icon: entry.action.icon().to_string(),
                color: entry.action.color().to_string(),
                priority: entry.priority(),
            },
            timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub id: i32,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub priority: NotificationPriority,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub icon: String,
    pub color: String,
    pub user: Option<Actor>,
}

impl NotificationPayload {
    pub fn new(notification: &admin_notification::Model, actor: Option<Actor>) -> Self {
        Self {
            id: notification.id,
            title: notification.title.clone(),
            message: notification.message.clone(),
            kind: notification.kind,
            priority: notification.priority,
            is_read: notification.is_read,
            created_at: notification.created_at,
            icon: notification.kind.icon().to_string(),
            color: notification.priority.color().to_string(),
            user: actor.or_else(|| notification.user_id.map(Actor::new)),
        }
    }
}

/// Everything the subsystem publishes.
#[derive(Debug, Clone, PartialEq)]
pub enum BroadcastEvent {
    /// First touch of a new session.
    UserOnline(PresencePayload),
    /// Subsequent touch of a known session.
    UserActive(PresencePayload),
    /// Session evicted by the sweeper.
    UserOffline(PresencePayload),
    ActivityRecorded(ActivityPayload),
    NotificationCreated(NotificationPayload),
}

impl BroadcastEvent {
    /// Event name subscribers bind to.
    pub fn name(&self) -> &'static str {
        match self {
            BroadcastEvent::UserOnline(_) => "user.online",
            BroadcastEvent::UserActive(_) => "user.active",
            BroadcastEvent::UserOffline(_) => "user.offline",
            BroadcastEvent::ActivityRecorded(_) => "activity.recorded",
            BroadcastEvent::NotificationCreated(_) => "notification.created",
        }
    }

    pub fn channels(&self) -> Vec<&'static str> {
        match self {
            BroadcastEvent::UserOnline(_)
            | BroadcastEvent::UserActive(_)
            | BroadcastEvent::UserOffline(_) => vec![channels::PRESENCE, channels::MONITORING],
            BroadcastEvent::ActivityRecorded(payload) => {
                let domain = match payload.activity.action.category() {
                    ActivityCategory::Order => Some(channels::ORDERS),
                    ActivityCategory::Payment => Some(channels::PAYMENTS),
                    ActivityCategory::Auth => Some(channels::USERS),
                    _ => None,
                };
                std::iter::once(channels::MONITORING).chain(domain).collect()
            }
            BroadcastEvent::NotificationCreated(payload) => {
                let domain = match payload.kind {
                    NotificationKind::Order => channels::ORDERS,
                    NotificationKind::Payment => channels::PAYMENTS,
                    NotificationKind::Inventory => channels::INVENTORY,
                    NotificationKind::User => channels::USERS,
                    NotificationKind::System => channels::MONITORING,
                };
                vec![channels::NOTIFICATIONS, domain]
            }
        }
    }

    pub fn payload(&self) -> Result<Value, serde_json::Error> {
        match self {
            BroadcastEvent::UserOnline(p)
            | BroadcastEvent::UserActive(p)
            | BroadcastEvent::UserOffline(p) => serde_json::to_value(p),
            BroadcastEvent::ActivityRecorded(p) => serde_json::to_value(p),
            BroadcastEvent::NotificationCreated(p) => serde_json::to_value(p),
        }
    }
}
