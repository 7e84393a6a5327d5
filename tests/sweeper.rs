mod common;

use std::sync::Arc;

use chrono::Duration;
use common::TestDb;
use presence_seaorm_store::broadcast::channels;
use presence_seaorm_store::entity::active_session::Location;
use presence_seaorm_store::{
    Actor, ChannelBroadcaster, CleanupSweeper, FanOut, PresenceEvaluator, PresenceTracker,
    RequestMeta, SweepOptions, TouchRequest,
};

#[tokio::test]
async fn dry_run_reports_without_side_effects() {
    let db = TestDb::new().await;
    db.seed_session("old", Duration::minutes(45)).await;
    db.seed_session("new", Duration::minutes(5)).await;

    let bus = ChannelBroadcaster::new(16);
    let mut rx = bus.subscribe();
    let sweeper = CleanupSweeper::new(db.sessions(), FanOut::new(Arc::new(bus)));

    let report = sweeper
        .run(&SweepOptions::default().dry_run(true))
        .await
        .unwrap();

    assert!(report.dry_run);
    assert_eq!(report.considered, 1);
    assert_eq!(report.deleted, 0);
    assert_eq!(report.guests, 1);
    assert_eq!(report.sessions[0].session_id, "old");
    assert_eq!(report.sessions[0].idle_minutes, 45);
    assert!(report.after.is_none());

    assert!(db.sessions().find("old").await.unwrap().is_some());
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn run_evicts_and_announces_offline() {
    let db = TestDb::new().await;
    db.seed_session("old", Duration::minutes(45)).await;
    db.seed_session("new", Duration::minutes(5)).await;

    let bus = ChannelBroadcaster::new(16);
    let mut rx = bus.subscribe();
    let sweeper = CleanupSweeper::new(db.sessions(), FanOut::new(Arc::new(bus)));

    let report = sweeper.run(&SweepOptions::default()).await.unwrap();

    assert_eq!(report.deleted, 1);
    assert_eq!(report.offline_events, 1);
    let after = report.after.unwrap();
    assert_eq!(after.active_count, 1);

    let first = rx.recv().await.unwrap();
    let second = rx.recv().await.unwrap();
    assert_eq!(first.event, "user.offline");
    assert_eq!(
        [first.channel.as_str(), second.channel.as_str()],
        [channels::PRESENCE, channels::MONITORING]
    );
    assert_eq!(first.payload["session"]["session_id"], "old");
    assert_eq!(first.payload["total_active_users"], 1);
}

#[tokio::test]
async fn offline_events_can_be_disabled() {
    let db = TestDb::new().await;
    db.seed_session("old", Duration::minutes(45)).await;

    let bus = ChannelBroadcaster::new(16);
    let mut rx = bus.subscribe();
    let sweeper = CleanupSweeper::new(db.sessions(), FanOut::new(Arc::new(bus)));

    let report = sweeper
        .run(&SweepOptions::default().emit_offline(false))
        .await
        .unwrap();

    assert_eq!(report.deleted, 1);
    assert_eq!(report.offline_events, 0);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn report_breaks_down_users_and_countries() {
    let db = TestDb::new().await;
    let tracker = PresenceTracker::new(db.sessions(), FanOut::logging());
    let kenya = Location {
        country: Some("Kenya".into()),
        ..Default::default()
    };

    for (id, actor) in [("a", Some(7)), ("b", None), ("c", Some(8))] {
        let mut request = TouchRequest::new(id, RequestMeta::new("1.2.3.4")).at(kenya.clone());
        request.actor = actor.map(Actor::new);
        tracker.touch(request).await.unwrap();
    }
    db.clock.advance(Duration::minutes(31));

    let sweeper = CleanupSweeper::new(db.sessions(), FanOut::logging());
    let report = sweeper
        .run(&SweepOptions::default().dry_run(true))
        .await
        .unwrap();

    assert_eq!(report.considered, 3);
    assert_eq!(report.authenticated, 2);
    assert_eq!(report.guests, 1);
    assert_eq!(report.top_countries, vec![("Kenya".to_string(), 3)]);
}

#[tokio::test]
async fn guest_session_lifecycle() {
    let db = TestDb::new().await;
    let bus = ChannelBroadcaster::new(32);
    let mut rx = bus.subscribe();
    let fan_out = FanOut::new(Arc::new(bus));
    let tracker = PresenceTracker::new(db.sessions(), fan_out.clone());
    let presence = PresenceEvaluator::new(db.sessions());

    let receipt = tracker
        .touch(TouchRequest::new("sess-A", RequestMeta::new("1.2.3.4")).on_page("/"))
        .await
        .unwrap();
    let report = receipt.broadcast.unwrap().await.unwrap();
    assert!(report.is_complete());
    assert_eq!(rx.recv().await.unwrap().event, "user.online");

    db.clock.advance(Duration::minutes(14));
    assert_eq!(presence.aggregate().await.unwrap().active_count, 1);

    db.clock.advance(Duration::minutes(2));
    assert_eq!(presence.aggregate().await.unwrap().active_count, 0);
    assert!(db.sessions().find("sess-A").await.unwrap().is_some());

    db.clock.advance(Duration::minutes(15));
    let sweeper = CleanupSweeper::new(db.sessions(), fan_out);
    let report = sweeper.run(&SweepOptions::default()).await.unwrap();

    assert_eq!(report.deleted, 1);
    assert!(db.sessions().find("sess-A").await.unwrap().is_none());

    // Skip the second channel of user.online.
    assert_eq!(rx.recv().await.unwrap().channel, channels::MONITORING);
    let offline = rx.recv().await.unwrap();
    assert_eq!(offline.event, "user.offline");
    assert_eq!(offline.payload["session"]["session_id"], "sess-A");
    assert_eq!(offline.payload["session_duration"], 0);
}

#[tokio::test]
async fn non_positive_cutoff_is_rejected() {
    let db = TestDb::new().await;
    let sweeper = CleanupSweeper::new(db.sessions(), FanOut::logging());

    let options = SweepOptions {
        cutoff: Duration::zero(),
        ..Default::default()
    };

    assert!(sweeper.run(&options).await.is_err());
}

#[tokio::test]
async fn zero_batch_size_fails_before_any_broadcast() {
    let db = TestDb::new().await;
    db.seed_session("old", Duration::minutes(45)).await;

    let bus = ChannelBroadcaster::new(16);
    let mut rx = bus.subscribe();
    let sweeper = CleanupSweeper::new(db.sessions(), FanOut::new(Arc::new(bus)));

    let options = SweepOptions {
        batch_size: 0,
        ..Default::default()
    };

    assert!(sweeper.run(&options).await.is_err());
    tokio::task::yield_now().await;
    assert!(rx.try_recv().is_err());
    assert!(db.sessions().find("old").await.unwrap().is_some());
}
