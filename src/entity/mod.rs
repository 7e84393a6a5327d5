//! Database entity models for presence-seaorm-store.
//!
//! These Sea-ORM entities define the three tables the subsystem owns. They are
//! used internally by the stores; most callers only see their `Model` types.

/// Tracked browser sessions, keyed by an opaque session identifier.
pub mod active_session;

/// Append-only activity log.
pub mod activity_log;

/// Admin-facing alerts with read state and priority.
pub mod admin_notification;
