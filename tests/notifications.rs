mod common;

use chrono::Duration;
use common::TestDb;
use presence_seaorm_store::entity::admin_notification::{NotificationKind, NotificationPriority};
use presence_seaorm_store::{Error, NewNotification, NotificationQuery};

fn low_stock(title: &str) -> NewNotification {
    NewNotification::new(
        NotificationKind::Inventory,
        NotificationPriority::High,
        title,
        "Widget has 2 units left",
    )
}

#[tokio::test]
async fn read_state_transitions_are_idempotent() {
    let db = TestDb::new().await;
    let store = db.notifications();
    let created = store.create(low_stock("Low stock alert")).await.unwrap();
    assert!(!created.is_read);

    db.clock.advance(Duration::minutes(1));
    let read = store.mark_read(created.id).await.unwrap();
    db.clock.advance(Duration::minutes(1));
    let read_again = store.mark_read(created.id).await.unwrap();

    assert!(read.is_read);
    assert_eq!(read, read_again);
    assert_eq!(store.unread_count().await.unwrap(), 0);

    let unread = store.mark_unread(created.id).await.unwrap();
    assert!(!unread.is_read);
    assert_eq!(store.unread_count().await.unwrap(), 1);
}

#[tokio::test]
async fn mark_all_read_twice_changes_nothing_the_second_time() {
    let db = TestDb::new().await;
    let store = db.notifications();
    for title in ["one", "two", "three"] {
        store.create(low_stock(title)).await.unwrap();
    }

    assert_eq!(store.mark_all_read().await.unwrap(), 3);
    assert_eq!(store.mark_all_read().await.unwrap(), 0);
    assert_eq!(store.unread_count().await.unwrap(), 0);
}

#[tokio::test]
async fn missing_notification_is_reported_not_found() {
    let db = TestDb::new().await;
    let store = db.notifications();

    let err = store.mark_read(404).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { entity: "notification", id: 404 }));
    assert!(store.delete(404).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn empty_title_is_rejected() {
    let db = TestDb::new().await;

    let err = db.notifications().create(low_stock(" ")).await.unwrap_err();

    assert!(matches!(err, Error::InvalidInput(_)));
}

#[tokio::test]
async fn delete_and_bulk_delete_remove_rows() {
    let db = TestDb::new().await;
    let store = db.notifications();
    let a = store.create(low_stock("a")).await.unwrap();
    let b = store.create(low_stock("b")).await.unwrap();
    let c = store.create(low_stock("c")).await.unwrap();

    store.delete(a.id).await.unwrap();
    let removed = store.bulk_delete(&[b.id, c.id, 999]).await.unwrap();

    assert_eq!(removed, 2);
    assert!(store.find(b.id).await.unwrap().is_none());
    assert_eq!(store.bulk_delete(&[]).await.unwrap(), 0);
}

#[tokio::test]
async fn query_filters_by_kind_priority_and_read_state() {
    let db = TestDb::new().await;
    let store = db.notifications();
    store.create(low_stock("stock")).await.unwrap();
    let signup = store
        .create(NewNotification::new(
            NotificationKind::User,
            NotificationPriority::Low,
            "New customer registered",
            "Jane created an account",
        ))
        .await
        .unwrap();
    store.mark_read(signup.id).await.unwrap();

    let high = store
        .query(&NotificationQuery::new().high_priority())
        .await
        .unwrap();
    assert_eq!(high.len(), 1);
    assert_eq!(high[0].kind, NotificationKind::Inventory);

    let users = store
        .query(&NotificationQuery::new().kind(NotificationKind::User))
        .await
        .unwrap();
    assert_eq!(users.len(), 1);

    let unread = store.query(&NotificationQuery::new().unread()).await.unwrap();
    assert_eq!(unread.len(), 1);
    assert_eq!(unread[0].title, "stock");

    let today = store.query(&NotificationQuery::new().today()).await.unwrap();
    assert_eq!(today.len(), 2);
    assert!(today[0].id > today[1].id);
}
