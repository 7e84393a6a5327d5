//! Append-only activity log.
//!
//! [`ActivityRecorder::record`] inserts one immutable row per action.
//! [`ActivityQuery`] covers the read-side conveniences: category, user,
//! today, last 24 hours, and an id cursor for polling clients.

use std::sync::Arc;

use chrono::Duration;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Select, Set,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::clock::{SharedClock, SystemClock};
use crate::context::RequestMeta;
use crate::entity::activity_log::{self, ActivityAction, Column, Entity as ActivityEntity};
use crate::entity::admin_notification::NotificationPriority;
use crate::error::Result;

/// The entity an activity is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id")]
pub enum Subject {
    Order(i64),
    Payment(i64),
    Product(i64),
    User(i64),
}

impl Subject {
    pub fn model_type(&self) -> &'static str {
        match self {
            Subject::Order(_) => "Order",
            Subject::Payment(_) => "Payment",
            Subject::Product(_) => "Product",
            Subject::User(_) => "User",
        }
    }

    pub fn model_id(&self) -> i64 {
        match *self {
            Subject::Order(id) | Subject::Payment(id) | Subject::Product(id) | Subject::User(id) => {
                id
            }
        }
    }

    /// Rebuilds a subject from its stored columns. Unknown kinds and half-set
    /// pairs read back as no subject.
    pub fn from_parts(model_type: Option<&str>, model_id: Option<i64>) -> Option<Self> {
        let id = model_id?;
        match model_type? {
            "Order" => Some(Subject::Order(id)),
            "Payment" => Some(Subject::Payment(id)),
            "Product" => Some(Subject::Product(id)),
            "User" => Some(Subject::User(id)),
            _ => None,
        }
    }
}

/// Read-side grouping of actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityCategory {
    Auth,
    Order,
    Payment,
    Shopping,
    Profile,
    System,
}

impl ActivityCategory {
    pub fn actions(&self) -> &'static [ActivityAction] {
        use ActivityAction::*;
        match self {
            ActivityCategory::Auth => &[Login, Logout, Registration],
            ActivityCategory::Order => &[OrderCreated, OrderUpdated, OrderCancelled],
            ActivityCategory::Payment => &[PaymentInitiated, PaymentCompleted, PaymentFailed],
            ActivityCategory::Shopping => &[ProductViewed, CartUpdated],
            ActivityCategory::Profile => &[ProfileUpdated, PasswordChanged],
            ActivityCategory::System => &[SystemError, AdminAction],
        }
    }
}

impl ActivityAction {
    pub fn category(&self) -> ActivityCategory {
        use ActivityAction::*;
        match self {
            Login | Logout | Registration => ActivityCategory::Auth,
            OrderCreated | OrderUpdated | OrderCancelled => ActivityCategory::Order,
            PaymentInitiated | PaymentCompleted | PaymentFailed => ActivityCategory::Payment,
            ProductViewed | CartUpdated => ActivityCategory::Shopping,
            ProfileUpdated | PasswordChanged => ActivityCategory::Profile,
            SystemError | AdminAction => ActivityCategory::System,
        }
    }

    /// Human-readable label.
    pub fn description(&self) -> &'static str {
        use ActivityAction::*;
        match self {
            Login => "User logged in",
            Logout => "User logged out",
            Registration => "New user registered",
            OrderCreated => "New order placed",
            OrderUpdated => "Order updated",
            OrderCancelled => "Order cancelled",
            PaymentInitiated => "Payment initiated",
            PaymentCompleted => "Payment completed",
            PaymentFailed => "Payment failed",
            ProductViewed => "Product viewed",
            CartUpdated => "Cart updated",
            ProfileUpdated => "Profile updated",
            PasswordChanged => "Password changed",
            SystemError => "System error",
            AdminAction => "Admin action",
        }
    }

    pub fn icon(&self) -> &'static str {
        use ActivityAction::*;
        match self {
            Login => "log-in",
            Logout => "log-out",
            Registration => "user-plus",
            OrderCreated | OrderUpdated => "shopping-bag",
            OrderCancelled => "x-circle",
            PaymentInitiated | PaymentCompleted => "credit-card",
            PaymentFailed => "alert-triangle",
            ProductViewed => "eye",
            CartUpdated => "shopping-cart",
            ProfileUpdated => "user",
            PasswordChanged => "lock",
            SystemError => "alert-octagon",
            AdminAction => "shield",
        }
    }

    pub fn color(&self) -> &'static str {
        use ActivityAction::*;
        match self {
            Login | Registration | OrderCreated | PaymentCompleted => "green",
            Logout | ProductViewed | CartUpdated => "gray",
            OrderUpdated | PaymentInitiated | ProfileUpdated => "blue",
            PasswordChanged | AdminAction => "purple",
            OrderCancelled => "orange",
            PaymentFailed | SystemError => "red",
        }
    }

    pub fn default_priority(&self) -> NotificationPriority {
        use ActivityAction::*;
        match self {
            SystemError => NotificationPriority::Critical,
            PaymentFailed => NotificationPriority::High,
            OrderCreated | OrderCancelled | PaymentCompleted | Registration | PasswordChanged
            | AdminAction => NotificationPriority::Medium,
            _ => NotificationPriority::Low,
        }
    }
}

impl activity_log::Model {
    pub fn subject(&self) -> Option<Subject> {
        Subject::from_parts(self.model_type.as_deref(), self.model_id)
    }

    /// The stored description, or the action's label when none was given.
    pub fn action_description(&self) -> String {
        self.description
            .clone()
            .unwrap_or_else(|| self.action.description().to_string())
    }

    /// `metadata.priority` when present and valid, else the action default.
    pub fn priority(&self) -> NotificationPriority {
        self.metadata
            .get("priority")
            .and_then(|p| serde_json::from_value(p.clone()).ok())
            .unwrap_or_else(|| self.action.default_priority())
    }
}

/// An activity about to be recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct NewActivity {
    pub action: ActivityAction,
    pub user_id: Option<i64>,
    pub subject: Option<Subject>,
    pub description: Option<String>,
    pub metadata: Map<String, Value>,
    pub request: RequestMeta,
}

impl NewActivity {
    pub fn new(action: ActivityAction) -> Self {
        Self {
            action,
            user_id: None,
            subject: None,
            description: None,
            metadata: Map::new(),
            request: RequestMeta::default(),
        }
    }

    pub fn by(mut self, user_id: Option<i64>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn on(mut self, subject: Subject) -> Self {
        self.subject = Some(subject);
        self
    }

    pub fn described(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_priority(self, priority: NotificationPriority) -> Self {
        self.with_metadata("priority", priority.to_string())
    }

    pub fn from_request(mut self, request: RequestMeta) -> Self {
        self.request = request;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Period {
    Today,
    Recent,
}

/// Filters for reading the activity log. Results are newest first unless
/// [`oldest_first`](Self::oldest_first) is set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActivityQuery {
    category: Option<ActivityCategory>,
    action: Option<ActivityAction>,
    user_id: Option<i64>,
    subject: Option<Subject>,
    period: Option<Period>,
    after_id: Option<i32>,
    limit: Option<u64>,
    oldest_first: bool,
}

impl ActivityQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn category(mut self, category: ActivityCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn action(mut self, action: ActivityAction) -> Self {
        self.action = Some(action);
        self
    }

    pub fn user(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn subject(mut self, subject: Subject) -> Self {
        self.subject = Some(subject);
        self
    }

    /// Since midnight UTC.
    pub fn today(mut self) -> Self {
        self.period = Some(Period::Today);
        self
    }

    /// Last 24 hours.
    pub fn recent(mut self) -> Self {
        self.period = Some(Period::Recent);
        self
    }

    /// Only entries with an id greater than `last_id`.
    pub fn after_id(mut self, last_id: i32) -> Self {
        self.after_id = Some(last_id);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Ascending id order, for clients paging forward from a cursor.
    pub fn oldest_first(mut self) -> Self {
        self.oldest_first = true;
        self
    }
}

/// Writes and reads the activity log.
#[derive(Debug, Clone)]
pub struct ActivityRecorder {
    conn: DatabaseConnection,
    clock: SharedClock,
}

impl ActivityRecorder {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self {
            conn,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Appends one entry. Fails only when the database does.
    pub async fn record(&self, activity: NewActivity) -> Result<activity_log::Model> {
        let entry = activity_log::ActiveModel {
            user_id: Set(activity.user_id),
            action: Set(activity.action),
            model_type: Set(activity.subject.map(|s| s.model_type().to_string())),
            model_id: Set(activity.subject.map(|s| s.model_id())),
            description: Set(activity.description),
            ip_address: Set(activity.request.ip_address),
            user_agent: Set(activity.request.user_agent),
            metadata: Set(Value::Object(activity.metadata)),
            created_at: Set(self.clock.now()),
            ..Default::default()
        }
        .insert(&self.conn)
        .await?;

        debug!(
            activity_id = entry.id,
            action = %entry.action,
            user_id = ?entry.user_id,
            "Activity recorded"
        );

        Ok(entry)
    }

    pub async fn find(&self, id: i32) -> Result<Option<activity_log::Model>> {
        Ok(ActivityEntity::find_by_id(id).one(&self.conn).await?)
    }

    pub async fn query(&self, query: &ActivityQuery) -> Result<Vec<activity_log::Model>> {
        let select = self.select(query);
        let select = if query.oldest_first {
            select.order_by_asc(Column::Id)
        } else {
            select.order_by_desc(Column::Id)
        };

        Ok(select.all(&self.conn).await?)
    }

    fn select(&self, query: &ActivityQuery) -> Select<ActivityEntity> {
        let mut select = ActivityEntity::find();

        if let Some(category) = query.category {
            select = select.filter(Column::Action.is_in(category.actions().iter().copied()));
        }
        if let Some(action) = query.action {
            select = select.filter(Column::Action.eq(action));
        }
        if let Some(user_id) = query.user_id {
            select = select.filter(Column::UserId.eq(user_id));
        }
        if let Some(subject) = query.subject {
            select = select
                .filter(Column::ModelType.eq(subject.model_type()))
                .filter(Column::ModelId.eq(subject.model_id()));
        }
        match query.period {
            Some(Period::Today) => {
                select = select.filter(Column::CreatedAt.gte(self.clock.start_of_day()));
            }
            Some(Period::Recent) => {
                select = select.filter(Column::CreatedAt.gte(self.clock.now() - Duration::hours(24)));
            }
            None => {}
        }
        if let Some(after_id) = query.after_id {
            select = select.filter(Column::Id.gt(after_id));
        }
        if let Some(limit) = query.limit {
            select = select.limit(limit);
        }

        select
    }
}
