mod common;

use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use common::TestDb;
use presence_seaorm_store::entity::active_session::Location;
use presence_seaorm_store::{
    Actor, ChannelBroadcaster, FanOut, GeoLocator, PresenceTracker, RequestMeta, TouchRequest,
};

#[derive(Debug, Default)]
struct CountingLocator {
    lookups: AtomicUsize,
}

#[async_trait]
impl GeoLocator for CountingLocator {
    async fn locate(&self, _ip: IpAddr) -> Option<Location> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Some(Location {
            country: Some("Kenya".into()),
            city: Some("Nairobi".into()),
            ..Default::default()
        })
    }
}

#[derive(Debug)]
struct StalledLocator;

#[async_trait]
impl GeoLocator for StalledLocator {
    async fn locate(&self, _ip: IpAddr) -> Option<Location> {
        std::future::pending().await
    }
}

#[tokio::test]
async fn first_touch_is_online_then_active() {
    let db = TestDb::new().await;
    let bus = ChannelBroadcaster::new(16);
    let mut rx = bus.subscribe();
    let tracker = PresenceTracker::new(db.sessions(), FanOut::new(Arc::new(bus)));
    let request = TouchRequest::new("sess-A", RequestMeta::new("1.2.3.4"))
        .by(Actor::new(7).with_name("Jane"));

    let first = tracker.touch(request.clone()).await.unwrap();
    first.broadcast.unwrap().await.unwrap();
    let second = tracker.touch(request).await.unwrap();
    second.broadcast.unwrap().await.unwrap();

    assert!(first.created);
    assert!(!second.created);
    assert_eq!(second.counts.authenticated, 1);

    let online = rx.recv().await.unwrap();
    assert_eq!(online.event, "user.online");
    assert_eq!(online.payload["user"]["name"], "Jane");
    assert_eq!(online.payload["total_active_users"], 1);
    rx.recv().await.unwrap();
    assert_eq!(rx.recv().await.unwrap().event, "user.active");
}

#[tokio::test]
async fn missing_address_is_stored_as_unknown() {
    let db = TestDb::new().await;
    let tracker = PresenceTracker::new(db.sessions(), FanOut::logging());

    let receipt = tracker
        .touch(TouchRequest::new("sess-A", RequestMeta::default()))
        .await
        .unwrap();

    assert_eq!(receipt.session.ip_address, presence_seaorm_store::tracker::UNKNOWN_IP);
}

#[tokio::test]
async fn geo_lookup_runs_once_per_address() {
    let db = TestDb::new().await;
    let locator = Arc::new(CountingLocator::default());
    let tracker =
        PresenceTracker::new(db.sessions(), FanOut::logging()).with_geo_locator(locator.clone());

    let receipt = tracker
        .touch(TouchRequest::new("sess-A", RequestMeta::new("41.90.1.1")))
        .await
        .unwrap();
    tracker
        .touch(TouchRequest::new("sess-A", RequestMeta::new("41.90.1.1")))
        .await
        .unwrap();
    tracker
        .touch(TouchRequest::new("sess-B", RequestMeta::new("127.0.0.1")))
        .await
        .unwrap();

    assert_eq!(locator.lookups.load(Ordering::SeqCst), 1);
    assert_eq!(
        receipt.session.location().and_then(|l| l.city).as_deref(),
        Some("Nairobi")
    );
}

#[tokio::test]
async fn stalled_geo_lookup_does_not_block_tracking() {
    let db = TestDb::new().await;
    let config = presence_seaorm_store::PresenceConfig {
        geo_timeout_ms: 20,
        ..Default::default()
    };
    let tracker = PresenceTracker::new(db.sessions(), FanOut::logging())
        .with_config(&config)
        .with_geo_locator(Arc::new(StalledLocator));

    let receipt = tracker
        .touch(TouchRequest::new("sess-A", RequestMeta::new("41.90.1.1")))
        .await
        .unwrap();

    assert!(receipt.created);
    assert!(receipt.session.location.is_none());
}

#[tokio::test]
async fn end_session_removes_and_announces() {
    let db = TestDb::new().await;
    let bus = ChannelBroadcaster::new(16);
    let mut rx = bus.subscribe();
    let tracker = PresenceTracker::new(db.sessions(), FanOut::new(Arc::new(bus)));
    tracker
        .touch(TouchRequest::new("sess-A", RequestMeta::new("1.2.3.4")))
        .await
        .unwrap()
        .broadcast
        .unwrap()
        .await
        .unwrap();

    assert!(tracker.end_session("sess-A").await.unwrap());
    assert!(!tracker.end_session("sess-A").await.unwrap());
    assert!(db.sessions().find("sess-A").await.unwrap().is_none());

    rx.recv().await.unwrap();
    rx.recv().await.unwrap();
    let offline = rx.recv().await.unwrap();
    assert_eq!(offline.event, "user.offline");
    assert_eq!(offline.payload["total_active_users"], 0);
}
