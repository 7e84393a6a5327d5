//! Admin notifications.
//!
//! Read state is a two-state machine: `unread -> read` on normal flow and
//! `read -> unread` only by explicit admin action. Transitions are idempotent.
//! Deletion removes the row.

use std::sync::Arc;

use chrono::Duration;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Select, Set,
};
use serde_json::Value;
use tracing::{debug, info};

use crate::clock::{SharedClock, SystemClock};
use crate::entity::admin_notification::{
    self, Column, Entity as NotificationEntity, NotificationKind, NotificationPriority,
};
use crate::error::{Error, Result};

const ENTITY: &str = "notification";

impl NotificationKind {
    pub fn icon(&self) -> &'static str {
        match self {
            NotificationKind::Order => "shopping-bag",
            NotificationKind::Payment => "credit-card",
            NotificationKind::Inventory => "package",
            NotificationKind::User => "user",
            NotificationKind::System => "settings",
        }
    }
}

impl NotificationPriority {
    pub fn color(&self) -> &'static str {
        match self {
            NotificationPriority::Low => "gray",
            NotificationPriority::Medium => "blue",
            NotificationPriority::High => "orange",
            NotificationPriority::Critical => "red",
        }
    }
}

/// A notification about to be created.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub kind: NotificationKind,
    pub priority: NotificationPriority,
    pub title: String,
    pub message: String,
    pub data: Option<Value>,
    pub action_url: Option<String>,
    pub user_id: Option<i64>,
}

impl NewNotification {
    pub fn new(
        kind: NotificationKind,
        priority: NotificationPriority,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            priority,
            title: title.into(),
            message: message.into(),
            data: None,
            action_url: None,
            user_id: None,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_action_url(mut self, url: impl Into<String>) -> Self {
        self.action_url = Some(url.into());
        self
    }

    pub fn about_user(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Period {
    Today,
    Recent,
}

/// Filters for listing notifications. Results are newest first unless
/// [`oldest_first`](Self::oldest_first) is set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationQuery {
    unread_only: bool,
    kind: Option<NotificationKind>,
    min_priority: Option<NotificationPriority>,
    period: Option<Period>,
    after_id: Option<i32>,
    limit: Option<u64>,
    oldest_first: bool,
}

impl NotificationQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unread(mut self) -> Self {
        self.unread_only = true;
        self
    }

    pub fn kind(mut self, kind: NotificationKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// High and critical only.
    pub fn high_priority(self) -> Self {
        self.min_priority(NotificationPriority::High)
    }

    pub fn min_priority(mut self, priority: NotificationPriority) -> Self {
        self.min_priority = Some(priority);
        self
    }

    pub fn today(mut self) -> Self {
        self.period = Some(Period::Today);
        self
    }

    /// Last 24 hours.
    pub fn recent(mut self) -> Self {
        self.period = Some(Period::Recent);
        self
    }

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

/// Sea-ORM backed store of admin notifications.
#[derive(Debug, Clone)]
pub struct NotificationStore {
    conn: DatabaseConnection,
    clock: SharedClock,
}

impl NotificationStore {
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

    pub async fn create(&self, new: NewNotification) -> Result<admin_notification::Model> {
        if new.title.trim().is_empty() {
            return Err(Error::invalid("notification title must not be empty"));
        }

        let now = self.clock.now();
        let notification = admin_notification::ActiveModel {
            kind: Set(new.kind),
            priority: Set(new.priority),
            title: Set(new.title),
            message: Set(new.message),
            data: Set(new.data),
            action_url: Set(new.action_url),
            is_read: Set(false),
            user_id: Set(new.user_id),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(&self.conn)
        .await?;

        info!(
            notification_id = notification.id,
            kind = %notification.kind,
            priority = %notification.priority,
            "Admin notification created"
        );

        Ok(notification)
    }

    pub async fn find(&self, id: i32) -> Result<Option<admin_notification::Model>> {
        Ok(NotificationEntity::find_by_id(id).one(&self.conn).await?)
    }

    /// Marks one notification read. Already-read rows are returned untouched.
    pub async fn mark_read(&self, id: i32) -> Result<admin_notification::Model> {
        self.set_read(id, true).await
    }

    /// Puts a notification back to unread. Already-unread rows are returned
    /// untouched.
    pub async fn mark_unread(&self, id: i32) -> Result<admin_notification::Model> {
        self.set_read(id, false).await
    }

    async fn set_read(&self, id: i32, read: bool) -> Result<admin_notification::Model> {
        let existing = self
            .find(id)
            .await?
            .ok_or(Error::NotFound { entity: ENTITY, id })?;

        if existing.is_read == read {
            return Ok(existing);
        }

        let mut active = existing.into_active_model();
        active.is_read = Set(read);
        active.updated_at = Set(self.clock.now());
        let updated = active.update(&self.conn).await?;

        debug!(notification_id = id, is_read = read, "Notification read state changed");

        Ok(updated)
    }

    /// Marks every unread notification read and returns how many changed.
    /// A second call in a row changes nothing and returns zero.
    pub async fn mark_all_read(&self) -> Result<u64> {
        let result = NotificationEntity::update_many()
            .col_expr(Column::IsRead, Expr::value(true))
            .col_expr(Column::UpdatedAt, Expr::value(self.clock.now()))
            .filter(Column::IsRead.eq(false))
            .exec(&self.conn)
            .await?;

        info!(updated = result.rows_affected, "Marked all notifications read");

        Ok(result.rows_affected)
    }

    pub async fn delete(&self, id: i32) -> Result<()> {
        let result = NotificationEntity::delete_by_id(id).exec(&self.conn).await?;

        if result.rows_affected == 0 {
            return Err(Error::NotFound { entity: ENTITY, id });
        }
        Ok(())
    }

    /// Deletes the given ids, ignoring ones that do not exist.
    pub async fn bulk_delete(&self, ids: &[i32]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = NotificationEntity::delete_many()
            .filter(Column::Id.is_in(ids.iter().copied()))
            .exec(&self.conn)
            .await?;

        info!(
            requested = ids.len(),
            deleted = result.rows_affected,
            "Bulk deleted notifications"
        );

        Ok(result.rows_affected)
    }

    pub async fn unread_count(&self) -> Result<u64> {
        Ok(NotificationEntity::find()
            .filter(Column::IsRead.eq(false))
            .count(&self.conn)
            .await?)
    }

    pub async fn query(&self, query: &NotificationQuery) -> Result<Vec<admin_notification::Model>> {
        let select = self.select(query);
        let select = if query.oldest_first {
            select.order_by_asc(Column::Id)
        } else {
            select.order_by_desc(Column::Id)
        };

        Ok(select.all(&self.conn).await?)
    }

    fn select(&self, query: &NotificationQuery) -> Select<NotificationEntity> {
        let mut select = NotificationEntity::find();

        if query.unread_only {
            select = select.filter(Column::IsRead.eq(false));
        }
        if let Some(kind) = query.kind {
            select = select.filter(Column::Kind.eq(kind));
        }
        if let Some(min) = query.min_priority {
            let levels = [
                NotificationPriority::Low,
                NotificationPriority::Medium,
                NotificationPriority::High,
                NotificationPriority::Critical,
            ];
            select = select.filter(Column::Priority.is_in(levels.into_iter().filter(|p| *p >= min)));
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
