//! Session Registry
//!
//! Owning map from session id to transport. Storage is private; callers get
//! `get/set/delete/has/list_session_ids/clear` and nothing else.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

use super::SessionTransport;

/// Registry of live session transports.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<SessionTransport>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new registry wrapped in Arc for sharing.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Look up a transport. No side effects.
    pub fn get(&self, session_id: &str) -> Option<Arc<SessionTransport>> {
        self.sessions.get(session_id).map(|entry| Arc::clone(entry.value()))
    }

    /// Install or replace the transport for a session id.
    pub fn set(&self, session_id: impl Into<String>, transport: Arc<SessionTransport>) {
        let session_id = session_id.into();
        if self.sessions.insert(session_id.clone(), transport).is_some() {
            tracing::debug!(session_id = %session_id, "Replaced session transport");
        } else {
            tracing::debug!(session_id = %session_id, total = self.sessions.len(), "Registered session");
        }
    }

    /// Remove an entry. Returns whether one existed.
    pub fn delete(&self, session_id: &str) -> bool {
        self.sessions.remove(session_id).is_some()
    }

    pub fn has(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    /// Snapshot of the current session ids.
    pub fn list_session_ids(&self) -> Vec<String> {
        self.sessions.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Drop every entry without closing the transports. Shutdown only.
    pub fn clear(&self) {
        self.sessions.clear();
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Close and remove sessions idle for longer than `max_idle`.
    ///
    /// A session with an open standalone stream is never idle; its client is
    /// still connected.
    ///
    /// Transports are collected first and closed after the map iteration
    /// ends; close hooks re-enter the registry.
    pub fn reap_idle(&self, max_idle: Duration) -> usize {
        let stale: Vec<Arc<SessionTransport>> = self
            .sessions
            .iter()
            .filter(|entry| {
                let transport = entry.value();
                !transport.has_stream() && transport.idle_duration() > max_idle
            })
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        for transport in &stale {
            transport.close("idle");
            self.delete(transport.session_id());
        }

        if !stale.is_empty() {
            tracing::info!(
                removed = stale.len(),
                remaining = self.sessions.len(),
                "Idle session sweep completed"
            );
        }

        stale.len()
    }
}

/// Spawn a background task that periodically reaps idle sessions.
pub fn spawn_reaper(
    registry: Arc<SessionRegistry>,
    interval: Duration,
    max_idle: Duration,
    cancel: tokio_util::sync::CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Session reaper shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    registry.reap_idle(max_idle);
                }
            }
        }
    })
}
