//! Admin notification entity model.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// # Database Schema
///
/// | Column     | Type                 | Description                          |
/// |------------|----------------------|--------------------------------------|
/// | id         | INTEGER (Primary Key)| Doubles as polling cursor            |
/// | type       | VARCHAR(16)          | [`NotificationKind`]                 |
/// | priority   | VARCHAR(16)          | [`NotificationPriority`]             |
/// | title      | TEXT                 |                                      |
/// | message    | TEXT                 |                                      |
/// | data       | JSON NULL            | Structured context                   |
/// | action_url | TEXT NULL            | Deep link into the admin UI          |
/// | is_read    | BOOLEAN              | Read state                           |
/// | user_id    | BIGINT NULL          | Subject user, if any                 |
/// | created_at | TIMESTAMPTZ          |                                      |
/// | updated_at | TIMESTAMPTZ          | Last read-state change               |
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "admin_notifications")]
pub struct Model {
    /// Auto-incremented key, also the cursor for polling clients.
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Domain area, stored in the `type` column and serialized as `type`.
    #[sea_orm(column_name = "type")]
    #[serde(rename = "type")]
    pub kind: NotificationKind,

    /// Urgency, fixed when the notification is created.
    pub priority: NotificationPriority,

    /// Short headline shown in the admin bell menu. Never empty.
    #[sea_orm(column_type = "Text")]
    pub title: String,

    /// Body text.
    #[sea_orm(column_type = "Text")]
    pub message: String,

    /// Structured context such as the order or product id.
    pub data: Option<Json>,

    /// Deep link into the admin UI.
    #[sea_orm(column_type = "Text", nullable)]
    pub action_url: Option<String>,

    /// Read state.
    ///
    /// Moves `false -> true` on `mark_read` and back only on `mark_unread`.
    /// Both transitions are idempotent.
    pub is_read: bool,

    /// The user the notification is about, if any.
    pub user_id: Option<i64>,

    pub created_at: DateTimeUtc,

    /// Time of the last read-state change; equals `created_at` until then.
    pub updated_at: DateTimeUtc,
}

/// Required enum for Sea-ORM entity relations.
///
/// Notifications stand alone, so this enum is empty.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

/// Default behavior implementation for notification models.
impl ActiveModelBehavior for ActiveModel {}

/// Domain area a notification belongs to.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    #[sea_orm(string_value = "order")]
    Order,
    #[sea_orm(string_value = "payment")]
    Payment,
    #[sea_orm(string_value = "inventory")]
    Inventory,
    #[sea_orm(string_value = "user")]
    User,
    #[sea_orm(string_value = "system")]
    System,
}

/// Fixed at creation; never recomputed.
///
/// Variants are declared in ascending order so `Ord` follows urgency.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    #[sea_orm(string_value = "low")]
    Low,
    #[sea_orm(string_value = "medium")]
    Medium,
    #[sea_orm(string_value = "high")]
    High,
    #[sea_orm(string_value = "critical")]
    Critical,
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_value())
    }
}

impl std::fmt::Display for NotificationPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_value())
    }
}
