//! Per-request presence tracking.
//!
//! [`PresenceTracker::touch`] is what a request handler or middleware calls on
//! every page view or heartbeat: it validates the request, resolves a location
//! if it can do so quickly, upserts the session, recounts presence and hands
//! the presence payload to the fan-out on a background task.

use std::fmt::Debug;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::broadcast::{BroadcastEvent, DeliveryReport, FanOut, PresencePayload};
use crate::config::PresenceConfig;
use crate::context::{Actor, RequestMeta};
use crate::entity::active_session::{self, Location};
use crate::error::{Error, Result};
use crate::presence::ACTIVE_WINDOW;
use crate::session_store::{ActiveCounts, ActiveSessionStore, SessionTouch};

/// Stored when the request carries no address.
pub const UNKNOWN_IP: &str = "0.0.0.0";

/// Resolves a client address to a location.
///
/// Lookups are bounded by [`PresenceConfig::geo_timeout_ms`]; a slow or failed
/// lookup just leaves the location empty.
#[async_trait]
pub trait GeoLocator: Debug + Send + Sync {
    async fn locate(&self, ip: IpAddr) -> Option<Location>;
}

/// One tracked request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TouchRequest {
    pub session_id: String,
    pub actor: Option<Actor>,
    pub request: RequestMeta,
    pub page_url: Option<String>,
    /// A location the caller already knows; skips the geo lookup.
    pub location: Option<Location>,
}

impl TouchRequest {
    pub fn new(session_id: impl Into<String>, request: RequestMeta) -> Self {
        Self {
            session_id: session_id.into(),
            request,
            ..Default::default()
        }
    }

    pub fn by(mut self, actor: Actor) -> Self {
        self.actor = Some(actor);
        self
    }

    pub fn on_page(mut self, url: impl Into<String>) -> Self {
        self.page_url = Some(url.into());
        self
    }

    pub fn at(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }
}

/// What a touch did.
#[derive(Debug)]
pub struct TouchReceipt {
    pub session: active_session::Model,
    pub created: bool,
    pub counts: ActiveCounts,
    /// The background publish, if a runtime was available to run it.
    pub broadcast: Option<JoinHandle<DeliveryReport>>,
}

#[derive(Debug, Clone)]
pub struct PresenceTracker {
    sessions: ActiveSessionStore,
    fan_out: FanOut,
    geo: Option<Arc<dyn GeoLocator>>,
    geo_timeout: Duration,
}

impl PresenceTracker {
    pub fn new(sessions: ActiveSessionStore, fan_out: FanOut) -> Self {
        Self {
            sessions,
            fan_out,
            geo: None,
            geo_timeout: PresenceConfig::default().geo_timeout(),
        }
    }

    pub fn with_config(mut self, config: &PresenceConfig) -> Self {
        self.geo_timeout = config.geo_timeout();
        self.fan_out = self.fan_out.with_config(config.broadcast.clone());
        self
    }

    pub fn with_geo_locator(mut self, geo: Arc<dyn GeoLocator>) -> Self {
        self.geo = Some(geo);
        self
    }

    pub fn sessions(&self) -> &ActiveSessionStore {
        &self.sessions
    }

    /// Records one request.
    ///
    /// Store failures are returned. Broadcast failures never are: the row is
    /// written before the payload is handed off, and the hand-off runs on its
    /// own task.
    pub async fn touch(&self, request: TouchRequest) -> Result<TouchReceipt> {
        let session_id = request.session_id.trim();
        if session_id.is_empty() {
            return Err(Error::invalid("session_id is required"));
        }

        let ip_address = request
            .request
            .ip_address
            .clone()
            .unwrap_or_else(|| UNKNOWN_IP.to_string());

        let location = match request.location {
            Some(location) => Some(location),
            None => self.lookup_location(session_id, &ip_address).await?,
        };

        let outcome = self
            .sessions
            .touch(&SessionTouch {
                session_id: session_id.to_string(),
                user_id: request.actor.as_ref().map(|a| a.id),
                ip_address,
                user_agent: request.request.user_agent.clone(),
                location,
                page_url: request.page_url.clone(),
            })
            .await?;

        let counts = self.sessions.count_active(ACTIVE_WINDOW).await?;

        let payload = PresencePayload::new(
            &outcome.session,
            request.actor,
            counts.active,
            self.sessions.clock().now(),
        );
        let event = if outcome.created {
            BroadcastEvent::UserOnline(payload)
        } else {
            BroadcastEvent::UserActive(payload)
        };
        let broadcast = self.fan_out.dispatch(event);

        Ok(TouchReceipt {
            session: outcome.session,
            created: outcome.created,
            counts,
            broadcast,
        })
    }

    /// Drops a session right away, e.g. on logout, and announces it offline.
    /// Returns `false` when there was no such session.
    pub async fn end_session(&self, session_id: &str) -> Result<bool> {
        let Some(session) = self.sessions.find(session_id).await? else {
            return Ok(false);
        };

        if !self.sessions.remove(session_id).await? {
            return Ok(false);
        }

        let counts = self.sessions.count_active(ACTIVE_WINDOW).await?;
        let payload = PresencePayload::offline(&session, counts.active, self.sessions.clock().now());
        self.fan_out.dispatch(BroadcastEvent::UserOffline(payload));

        Ok(true)
    }

    /// Looks up a location only for sessions that do not have one for this
    /// address yet, and only for routable addresses.
    async fn lookup_location(&self, session_id: &str, ip_address: &str) -> Result<Option<Location>> {
        let Some(geo) = &self.geo else {
            return Ok(None);
        };
        let Some(ip) = ip_address.parse::<IpAddr>().ok().filter(is_routable) else {
            return Ok(None);
        };

        if let Some(existing) = self.sessions.find(session_id).await? {
            if existing.ip_address == ip_address && existing.location.is_some() {
                return Ok(None);
            }
        }

        match tokio::time::timeout(self.geo_timeout, geo.locate(ip)).await {
            Ok(location) => {
                debug!(%ip, found = location.is_some(), "Geo lookup finished");
                Ok(location)
            }
            Err(_) => {
                warn!(%ip, timeout = ?self.geo_timeout, "Geo lookup timed out");
                Ok(None)
            }
        }
    }
}

fn is_routable(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            !(v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast())
        }
        IpAddr::V6(v6) => !(v6.is_loopback() || v6.is_unspecified()),
    }
}
