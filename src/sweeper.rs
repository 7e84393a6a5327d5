//! Periodic eviction of stale sessions.
//!
//! A run snapshots the rows older than the cutoff, optionally announces each
//! as offline, then deletes in cutoff-filtered batches. Dry runs stop after
//! the snapshot.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::broadcast::{BroadcastEvent, FanOut, PresencePayload};
use crate::config::PresenceConfig;
use crate::entity::active_session;
use crate::error::{Error, Result};
use crate::presence::{is_active, PresenceEvaluator, PresenceSnapshot, ACTIVE_WINDOW};
use crate::session_store::ActiveSessionStore;

/// How many countries the report breaks out.
const TOP_COUNTRIES: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepOptions {
    pub cutoff: Duration,
    pub dry_run: bool,
    pub emit_offline: bool,
    pub batch_size: u64,
}

impl SweepOptions {
    pub fn from_config(config: &PresenceConfig) -> Self {
        Self {
            cutoff: config.cleanup_cutoff(),
            dry_run: false,
            emit_offline: config.emit_offline_events,
            batch_size: config.sweep_batch_size,
        }
    }

    pub fn minutes(mut self, minutes: u32) -> Self {
        self.cutoff = Duration::minutes(i64::from(minutes));
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn emit_offline(mut self, emit: bool) -> Self {
        self.emit_offline = emit;
        self
    }
}

impl Default for SweepOptions {
    fn default() -> Self {
        Self::from_config(&PresenceConfig::default())
    }
}

/// One eviction candidate, as shown to an operator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StaleSession {
    pub session_id: String,
    pub user_id: Option<i64>,
    pub ip_address: String,
    pub country: Option<String>,
    pub page_url: Option<String>,
    pub last_activity: DateTime<Utc>,
    pub idle_minutes: i64,
}

impl StaleSession {
    fn new(session: &active_session::Model, now: DateTime<Utc>) -> Self {
        Self {
            session_id: session.session_id.clone(),
            user_id: session.user_id,
            ip_address: session.ip_address.clone(),
            country: session.location().and_then(|l| l.country),
            page_url: session.page_url.clone(),
            last_activity: session.last_activity,
            idle_minutes: (now - session.last_activity).num_minutes(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepReport {
    pub dry_run: bool,
    pub cutoff_minutes: i64,
    pub considered: usize,
    pub deleted: u64,
    pub authenticated: usize,
    pub guests: usize,
    /// Most common countries among the candidates, busiest first.
    pub top_countries: Vec<(String, usize)>,
    pub sessions: Vec<StaleSession>,
    pub offline_events: usize,
    /// Presence after the run; `None` for dry runs.
    pub after: Option<PresenceSnapshot>,
}

#[derive(Debug, Clone)]
pub struct CleanupSweeper {
    sessions: ActiveSessionStore,
    presence: PresenceEvaluator,
    fan_out: FanOut,
}

impl CleanupSweeper {
    pub fn new(sessions: ActiveSessionStore, fan_out: FanOut) -> Self {
        Self {
            presence: PresenceEvaluator::new(sessions.clone()),
            sessions,
            fan_out,
        }
    }

    pub async fn run(&self, options: &SweepOptions) -> Result<SweepReport> {
        if options.cutoff <= Duration::zero() {
            return Err(Error::invalid("cleanup cutoff must be positive"));
        }
        if options.batch_size == 0 {
            return Err(Error::invalid("sweep batch size must be positive"));
        }
        if options.cutoff < ACTIVE_WINDOW {
            warn!(
                cutoff_minutes = options.cutoff.num_minutes(),
                "Cleanup cutoff is shorter than the presence window; active sessions may be evicted"
            );
        }

        // One threshold for both the snapshot and the delete.
        let now = self.sessions.clock().now();
        let threshold = now - options.cutoff;
        let candidates = self.sessions.stale_sessions_before(threshold).await?;

        let authenticated = candidates.iter().filter(|s| !s.is_guest()).count();
        let mut report = SweepReport {
            dry_run: options.dry_run,
            cutoff_minutes: options.cutoff.num_minutes(),
            considered: candidates.len(),
            deleted: 0,
            authenticated,
            guests: candidates.len() - authenticated,
            top_countries: top_countries(&candidates),
            sessions: candidates.iter().map(|s| StaleSession::new(s, now)).collect(),
            offline_events: 0,
            after: None,
        };

        if options.dry_run {
            info!(
                considered = report.considered,
                cutoff_minutes = report.cutoff_minutes,
                "Dry run; no sessions deleted"
            );
            return Ok(report);
        }

        let mut pending = Vec::new();
        if options.emit_offline && !candidates.is_empty() {
            // Active count as it will be once the candidates are gone.
            let active = self.sessions.count_active(ACTIVE_WINDOW).await?.active;
            let evicted_active = candidates.iter().filter(|s| is_active(s, now)).count() as u64;
            let remaining = active.saturating_sub(evicted_active);
            for session in &candidates {
                let payload = PresencePayload::offline(session, remaining, now);
                if let Some(handle) = self.fan_out.dispatch(BroadcastEvent::UserOffline(payload)) {
                    pending.push(handle);
                }
            }
            report.offline_events = candidates.len();
        }

        report.deleted = self
            .sessions
            .evict_before_batched(threshold, options.batch_size)
            .await?;

        // Let the offline payloads finish before a one-shot caller exits.
        for handle in pending {
            if let Err(err) = handle.await {
                warn!(error = %err, "Offline broadcast task failed");
            }
        }

        report.after = Some(self.presence.aggregate().await?);

        info!(
            considered = report.considered,
            deleted = report.deleted,
            authenticated = report.authenticated,
            guests = report.guests,
            "Session cleanup finished"
        );

        Ok(report)
    }
}

fn top_countries(sessions: &[active_session::Model]) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for country in sessions
        .iter()
        .filter_map(|s| s.location().and_then(|l| l.country))
    {
        *counts.entry(country).or_default() += 1;
    }

    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(TOP_COUNTRIES);
    ranked
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn session(id: i32, country: Option<&str>) -> active_session::Model {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        active_session::Model {
            id,
            session_id: format!("sess-{id}"),
            user_id: None,
            ip_address: "1.2.3.4".into(),
            user_agent: None,
            location: country.map(|c| json!({ "country": c })),
            page_url: None,
            last_activity: at,
            created_at: at,
        }
    }

    #[test]
    fn top_countries_ranks_by_count_then_name() {
        let sessions = vec![
            session(1, Some("Kenya")),
            session(2, Some("Uganda")),
            session(3, Some("Kenya")),
            session(4, None),
            session(5, Some("Tanzania")),
        ];

        assert_eq!(
            top_countries(&sessions),
            vec![
                ("Kenya".to_string(), 2),
                ("Tanzania".to_string(), 1),
                ("Uganda".to_string(), 1),
            ]
        );
    }
}
