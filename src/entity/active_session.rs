//! Active session entity model for Sea-ORM database interaction.
//!
//! One row per browser session seen by the tracker. Rows are upserted on every
//! tracked request and removed by the cleanup sweeper.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Sea-ORM entity model representing one tracked session.
///
/// # Database Schema
///
/// | Column        | Type                 | Description                              |
/// |---------------|----------------------|------------------------------------------|
/// | id            | INTEGER (Primary Key)| Surrogate key, used by payloads          |
/// | session_id    | TEXT (Unique)        | Opaque session identifier                |
/// | user_id       | BIGINT NULL          | Authenticated user, null for guests      |
/// | ip_address    | TEXT                 | Client address of the last touch         |
/// | user_agent    | TEXT NULL            | Client user agent of the last touch      |
/// | location      | JSON NULL            | Geo lookup result, see [`Location`]      |
/// | page_url      | TEXT NULL            | Last page visited                        |
/// | last_activity | TIMESTAMPTZ          | Time of the last touch                   |
/// | created_at    | TIMESTAMPTZ          | Time of the first touch                  |
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "active_sessions")]
pub struct Model {
    /// Surrogate key.
    ///
    /// Payloads expose it as `session.id`; nothing else refers to it.
    #[sea_orm(primary_key)]
    pub id: i32,

    /// The opaque session identifier supplied by the caller.
    ///
    /// Unique across the table. Every touch upserts on this column, so two
    /// requests for the same session always land on the same row.
    #[sea_orm(unique, column_type = "Text")]
    pub session_id: String,

    /// The authenticated user, or `None` for a guest.
    ///
    /// A guest session that logs in keeps its row; the next touch fills this in.
    pub user_id: Option<i64>,

    /// Client address of the most recent touch, `0.0.0.0` when unknown.
    pub ip_address: String,

    /// User agent of the most recent touch.
    #[sea_orm(column_type = "Text", nullable)]
    pub user_agent: Option<String>,

    /// Serialized [`Location`], kept as JSON so partial lookups survive.
    ///
    /// A touch without a location leaves the stored value in place.
    pub location: Option<Json>,

    /// Last page visited. A touch without a page keeps the previous one.
    #[sea_orm(column_type = "Text", nullable)]
    pub page_url: Option<String>,

    /// Time of the most recent touch.
    ///
    /// Presence counting and cleanup both compare against this column:
    /// 1. A session is active while it is less than 15 minutes old
    /// 2. The sweeper deletes it once it is older than the cleanup cutoff
    pub last_activity: DateTimeUtc,

    /// Time of the first touch. Never updated after insert.
    pub created_at: DateTimeUtc,
}

/// Required enum for Sea-ORM entity relations.
///
/// Sessions reference users by id only, so this enum is empty.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

/// Default behavior implementation for active session models.
impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_guest(&self) -> bool {
        self.user_id.is_none()
    }

    /// Decodes the stored location, ignoring rows written with another shape.
    pub fn location(&self) -> Option<Location> {
        self.location
            .as_ref()
            .and_then(|raw| serde_json::from_value(raw.clone()).ok())
    }

    /// Time between the first and the last touch.
    pub fn duration(&self) -> chrono::Duration {
        self.last_activity - self.created_at
    }
}

/// Result of a geo-IP lookup.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl Location {
    pub fn to_json(&self) -> Json {
        serde_json::to_value(self).unwrap_or(Json::Null)
    }
}
