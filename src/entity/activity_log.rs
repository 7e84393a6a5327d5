//! Activity log entity model.
//!
//! Append-only: rows are inserted by [`crate::ActivityRecorder`] and never
//! updated or deleted by this crate.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// # Database Schema
///
/// | Column      | Type                 | Description                               |
/// |-------------|----------------------|-------------------------------------------|
/// | id          | INTEGER (Primary Key)| Monotonic id, doubles as polling cursor   |
/// | user_id     | BIGINT NULL          | Acting user                               |
/// | action      | VARCHAR(32)          | [`ActivityAction`] string value           |
/// | model_type  | VARCHAR(32) NULL     | Subject kind, see [`crate::Subject`]      |
/// | model_id    | BIGINT NULL          | Subject id                                |
/// | description | TEXT NULL            | Overrides the action's default label      |
/// | ip_address  | TEXT NULL            |                                           |
/// | user_agent  | TEXT NULL            |                                           |
/// | metadata    | JSON                 | Free-form object, e.g. `priority`         |
/// | created_at  | TIMESTAMPTZ          |                                           |
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "activity_logs")]
pub struct Model {
    /// Auto-increment id, also the polling cursor.
    #[sea_orm(primary_key)]
    pub id: i32,

    /// Acting user, `None` for guests and system jobs.
    pub user_id: Option<i64>,

    /// What happened, stored as its dotted string form.
    pub action: ActivityAction,

    /// Kind of record the action touched, e.g. `order`.
    pub model_type: Option<String>,

    /// Id of that record.
    pub model_id: Option<i64>,

    /// Optional human-readable override for the action's label.
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    /// Client address, when the action came from a request.
    #[sea_orm(column_type = "Text", nullable)]
    pub ip_address: Option<String>,

    /// Client user agent, when the action came from a request.
    #[sea_orm(column_type = "Text", nullable)]
    pub user_agent: Option<String>,

    /// Always a JSON object. `priority` overrides the action's default.
    pub metadata: Json,

    /// Insert time. Entries are never updated.
    pub created_at: DateTimeUtc,
}

/// Required enum for Sea-ORM entity relations. The log has none.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

/// Default behavior implementation for activity log models.
impl ActiveModelBehavior for ActiveModel {}

/// Actions the activity log knows about.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum ActivityAction {
    #[sea_orm(string_value = "login")]
    Login,
    #[sea_orm(string_value = "logout")]
    Logout,
    #[sea_orm(string_value = "registration")]
    Registration,
    #[sea_orm(string_value = "order_created")]
    OrderCreated,
    #[sea_orm(string_value = "order_updated")]
    OrderUpdated,
    #[sea_orm(string_value = "order_cancelled")]
    OrderCancelled,
    #[sea_orm(string_value = "payment_initiated")]
    PaymentInitiated,
    #[sea_orm(string_value = "payment_completed")]
    PaymentCompleted,
    #[sea_orm(string_value = "payment_failed")]
    PaymentFailed,
    #[sea_orm(string_value = "product_viewed")]
    ProductViewed,
    #[sea_orm(string_value = "cart_updated")]
    CartUpdated,
    #[sea_orm(string_value = "profile_updated")]
    ProfileUpdated,
    #[sea_orm(string_value = "password_changed")]
    PasswordChanged,
    #[sea_orm(string_value = "system_error")]
    SystemError,
    #[sea_orm(string_value = "admin_action")]
    AdminAction,
}

impl std::fmt::Display for ActivityAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_value())
    }
}
