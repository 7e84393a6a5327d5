//! Business event monitoring.
//!
//! Order, payment, inventory and account modules report what happened as a
//! [`BusinessEvent`]. The monitor turns each into an activity entry, an admin
//! notification when the event needs an admin's attention, and the matching
//! fan-out payloads.

use serde_json::json;
use tracing::info;

use crate::activity::{ActivityRecorder, NewActivity, Subject};
use crate::broadcast::{ActivityPayload, BroadcastEvent, FanOut, NotificationPayload};
use crate::context::{Actor, RequestMeta};
use crate::entity::activity_log::{self, ActivityAction};
use crate::entity::admin_notification::{self, NotificationKind, NotificationPriority};
use crate::error::Result;
use crate::notification::{NewNotification, NotificationStore};

/// Something a business module wants admins to know about.
#[derive(Debug, Clone, PartialEq)]
pub enum BusinessEvent {
    OrderPlaced {
        order_id: i64,
        order_number: String,
        /// Display string, currency included.
        total: String,
    },
    OrderStatusChanged {
        order_id: i64,
        order_number: String,
        from: String,
        to: String,
    },
    PaymentCompleted {
        payment_id: i64,
        order_id: Option<i64>,
        amount: String,
        method: String,
    },
    PaymentFailed {
        payment_id: i64,
        order_id: Option<i64>,
        amount: String,
        reason: String,
    },
    /// A product's stock moved; only levels at or under `threshold` notify.
    StockLevelChanged {
        product_id: i64,
        product_name: String,
        remaining: i64,
        threshold: i64,
    },
    UserRegistered,
    UserLoggedIn,
    UserLoggedOut,
}

impl BusinessEvent {
    pub fn name(&self) -> &'static str {
        match self {
            BusinessEvent::OrderPlaced { .. } => "order_placed",
            BusinessEvent::OrderStatusChanged { .. } => "order_status_changed",
            BusinessEvent::PaymentCompleted { .. } => "payment_completed",
            BusinessEvent::PaymentFailed { .. } => "payment_failed",
            BusinessEvent::StockLevelChanged { .. } => "stock_level_changed",
            BusinessEvent::UserRegistered => "user_registered",
            BusinessEvent::UserLoggedIn => "user_logged_in",
            BusinessEvent::UserLoggedOut => "user_logged_out",
        }
    }
}

/// Rows written for one event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonitorOutcome {
    pub activity: Option<activity_log::Model>,
    pub notification: Option<admin_notification::Model>,
}

#[derive(Debug, Clone)]
pub struct BusinessMonitor {
    activities: ActivityRecorder,
    notifications: NotificationStore,
    fan_out: FanOut,
}

impl BusinessMonitor {
    pub fn new(activities: ActivityRecorder, notifications: NotificationStore, fan_out: FanOut) -> Self {
        Self {
            activities,
            notifications,
            fan_out,
        }
    }

    /// Writes the activity and notification for `event`, then dispatches
    /// their payloads. Write failures are returned; broadcast failures only
    /// logged.
    pub async fn handle(
        &self,
        event: BusinessEvent,
        actor: Option<Actor>,
        request: RequestMeta,
    ) -> Result<MonitorOutcome> {
        let user_id = actor.as_ref().map(|a| a.id);
        let who = actor
            .as_ref()
            .and_then(|a| a.name.clone())
            .unwrap_or_else(|| "a guest".to_string());

        let (activity, notification) = match &event {
            BusinessEvent::OrderPlaced {
                order_id,
                order_number,
                total,
            } => (
                Some(
                    NewActivity::new(ActivityAction::OrderCreated)
                        .on(Subject::Order(*order_id))
                        .with_metadata("order_number", order_number.as_str())
                        .with_metadata("total", total.as_str()),
                ),
                Some(
                    NewNotification::new(
                        NotificationKind::Order,
                        NotificationPriority::Medium,
                        "New order received",
                        format!("Order #{order_number} for {total} was placed by {who}"),
                    )
                    .with_data(json!({ "order_id": order_id, "order_number": order_number }))
                    .with_action_url(format!("/admin/orders/{order_id}")),
                ),
            ),
            BusinessEvent::OrderStatusChanged {
                order_id,
                order_number,
                from,
                to,
            } => {
                let cancelled = to == "cancelled";
                let action = if cancelled {
                    ActivityAction::OrderCancelled
                } else {
                    ActivityAction::OrderUpdated
                };
                let notification = cancelled.then(|| {
                    NewNotification::new(
                        NotificationKind::Order,
                        NotificationPriority::Medium,
                        "Order cancelled",
                        format!("Order #{order_number} was cancelled (was {from})"),
                    )
                    .with_data(json!({ "order_id": order_id, "from": from, "to": to }))
                    .with_action_url(format!("/admin/orders/{order_id}"))
                });
                (
                    Some(
                        NewActivity::new(action)
                            .on(Subject::Order(*order_id))
                            .described(format!("Order #{order_number} changed from {from} to {to}"))
                            .with_metadata("from", from.as_str())
                            .with_metadata("to", to.as_str()),
                    ),
                    notification,
                )
            }
            BusinessEvent::PaymentCompleted {
                payment_id,
                order_id,
                amount,
                method,
            } => (
                Some(
                    NewActivity::new(ActivityAction::PaymentCompleted)
                        .on(Subject::Payment(*payment_id))
                        .with_metadata("order_id", *order_id)
                        .with_metadata("amount", amount.as_str())
                        .with_metadata("method", method.as_str()),
                ),
                Some(
                    NewNotification::new(
                        NotificationKind::Payment,
                        NotificationPriority::Medium,
                        "Payment received",
                        format!("{amount} received via {method}"),
                    )
                    .with_data(json!({ "payment_id": payment_id, "order_id": order_id }))
                    .with_action_url(format!("/admin/payments/{payment_id}")),
                ),
            ),
            BusinessEvent::PaymentFailed {
                payment_id,
                order_id,
                amount,
                reason,
            } => (
                Some(
                    NewActivity::new(ActivityAction::PaymentFailed)
                        .on(Subject::Payment(*payment_id))
                        .with_metadata("order_id", *order_id)
                        .with_metadata("amount", amount.as_str())
                        .with_metadata("reason", reason.as_str()),
                ),
                Some(
                    NewNotification::new(
                        NotificationKind::Payment,
                        NotificationPriority::High,
                        "Payment failed",
                        format!("Payment of {amount} failed: {reason}"),
                    )
                    .with_data(json!({ "payment_id": payment_id, "order_id": order_id }))
                    .with_action_url(format!("/admin/payments/{payment_id}")),
                ),
            ),
            BusinessEvent::StockLevelChanged {
                product_id,
                product_name,
                remaining,
                threshold,
            } => {
                let notification = stock_alert(*remaining, *threshold).map(|(priority, title)| {
                    NewNotification::new(
                        NotificationKind::Inventory,
                        priority,
                        title,
                        format!("{product_name} has {remaining} units left (threshold {threshold})"),
                    )
                    .with_data(json!({
                        "product_id": product_id,
                        "remaining": remaining,
                        "threshold": threshold,
                    }))
                    .with_action_url(format!("/admin/products/{product_id}"))
                });
                (None, notification)
            }
            BusinessEvent::UserRegistered => {
                let activity = NewActivity::new(ActivityAction::Registration);
                let activity = match user_id {
                    Some(id) => activity.on(Subject::User(id)),
                    None => activity,
                };
                let mut notification = NewNotification::new(
                    NotificationKind::User,
                    NotificationPriority::Low,
                    "New customer registered",
                    format!("{who} created an account"),
                );
                if let Some(id) = user_id {
                    notification = notification
                        .about_user(id)
                        .with_action_url(format!("/admin/users/{id}"));
                }
                (Some(activity), Some(notification))
            }
            BusinessEvent::UserLoggedIn => (Some(NewActivity::new(ActivityAction::Login)), None),
            BusinessEvent::UserLoggedOut => (Some(NewActivity::new(ActivityAction::Logout)), None),
        };

        let mut outcome = MonitorOutcome::default();

        if let Some(activity) = activity {
            let entry = self
                .activities
                .record(activity.by(user_id).from_request(request))
                .await?;
            let payload = ActivityPayload::new(&entry, actor.clone(), entry.created_at);
            self.fan_out.dispatch(BroadcastEvent::ActivityRecorded(payload));
            outcome.activity = Some(entry);
        }

        if let Some(notification) = notification {
            let created = self.notifications.create(notification).await?;
            let payload = NotificationPayload::new(&created, actor.clone());
            self.fan_out.dispatch(BroadcastEvent::NotificationCreated(payload));
            outcome.notification = Some(created);
        }

        info!(
            event = event.name(),
            activity_id = outcome.activity.as_ref().map(|a| a.id),
            notification_id = outcome.notification.as_ref().map(|n| n.id),
            "Business event handled"
        );

        Ok(outcome)
    }
}

/// Priority and title for a stock level, or `None` when it is above threshold.
fn stock_alert(remaining: i64, threshold: i64) -> Option<(NotificationPriority, &'static str)> {
    if remaining <= 0 {
        Some((NotificationPriority::Critical, "Product out of stock"))
    } else if remaining <= threshold {
        Some((NotificationPriority::High, "Low stock alert"))
    } else {
        None
    }
}
