//! Session table: lazy creation, lookup, and idle expiry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use rand::rngs::OsRng;
use rand::TryRngCore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{LiveUiError, Result};
use crate::protocol::SESSION_EXPIRED_CODE;
use crate::session::{Session, UpdateSink};

/// Generate a fresh session id: 16 OS-random bytes, hex encoded.
pub fn generate_session_id() -> Result<String> {
    let mut bytes = [0u8; 16];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| LiveUiError::Entropy(e.to_string()))?;
    Ok(hex::encode(bytes))
}

struct Sweeper {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns every live session.
pub struct SessionManager {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    sink: Option<Weak<dyn UpdateSink>>,
    session_timeout: Duration,
    sweep_interval: Duration,
    created: AtomicU64,
    expired: AtomicU64,
    sweeper: Mutex<Option<Sweeper>>,
}

impl SessionManager {
    /// A zero `sweep_interval` is raised to one millisecond.
    pub fn new(
        sweep_interval: Duration,
        session_timeout: Duration,
        sink: Option<Weak<dyn UpdateSink>>,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            sink,
            session_timeout,
            sweep_interval: sweep_interval.max(Duration::from_millis(1)),
            created: AtomicU64::new(0),
            expired: AtomicU64::new(0),
            sweeper: Mutex::new(None),
        }
    }

    pub fn from_config(config: &Config, sink: Option<Weak<dyn UpdateSink>>) -> Self {
        Self::new(config.sweep_interval(), config.session_timeout(), sink)
    }

    /// Return the session for `id`, creating and wiring it on first access.
    pub fn get_or_create(&self, id: &str) -> Arc<Session> {
        if let Some(session) = self.sessions.read().get(id) {
            return Arc::clone(session);
        }

        let mut sessions = self.sessions.write();
        // A concurrent caller may have created it between the two locks
        if let Some(session) = sessions.get(id) {
            return Arc::clone(session);
        }

        let session = Arc::new(Session::new(id, self.sink.clone()));
        sessions.insert(id.to_string(), Arc::clone(&session));
        self.created.fetch_add(1, Ordering::SeqCst);
        debug!(session_id = %id, total = sessions.len(), "Session created");
        session
    }

    /// Lookup without creating.
    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().get(id).cloned()
    }

    /// Remove a session immediately regardless of activity.
    pub fn delete(&self, id: &str) {
        if self.sessions.write().remove(id).is_some() {
            debug!(session_id = %id, "Session deleted");
        }
    }

    /// Remove every session idle longer than the timeout. Returns how many were removed.
    ///
    /// Sessions whose access clock is busy are skipped until the next pass.
    /// Expired sessions get a `session_expired` error pushed after removal.
    pub fn sweep(&self) -> usize {
        let expired: Vec<Arc<Session>> = {
            let mut sessions = self.sessions.write();
            let ids: Vec<String> = sessions
                .iter()
                .filter(|(_, s)| {
                    s.try_idle_for()
                        .is_some_and(|idle| idle > self.session_timeout)
                })
                .map(|(id, _)| id.clone())
                .collect();
            ids.iter().filter_map(|id| sessions.remove(id)).collect()
        };

        self.expired.fetch_add(expired.len() as u64, Ordering::SeqCst);
        for session in &expired {
            info!(session_id = %session.id(), "Session expired");
            session.notify_error("Session expired", SESSION_EXPIRED_CODE);
        }
        expired.len()
    }

    /// Start the periodic sweep task. Calling it twice is a no-op.
    pub fn start(self: &Arc<Self>) {
        let mut sweeper = self.sweeper.lock();
        if sweeper.is_some() {
            warn!("Session sweeper already running");
            return;
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let manager = Arc::downgrade(self);
        let period = self.sweep_interval;

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        let Some(manager) = manager.upgrade() else { break };
                        let removed = manager.sweep();
                        if removed > 0 {
                            debug!(removed, remaining = manager.session_count(), "Session sweep");
                        }
                    }
                }
            }
            debug!("Session sweeper stopped");
        });

        info!(interval = ?period, timeout = ?self.session_timeout, "Session sweeper started");
        *sweeper = Some(Sweeper { cancel, handle });
    }

    /// Stop the sweep task and wait until it has exited.
    pub async fn stop(&self) {
        let sweeper = self.sweeper.lock().take();
        if let Some(Sweeper { cancel, handle }) = sweeper {
            cancel.cancel();
            if let Err(e) = handle.await {
                warn!(%e, "Session sweeper task failed");
            }
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn session_ids(&self) -> Vec<String> {
        self.sessions.read().keys().cloned().collect()
    }

    /// Total sessions ever created by this manager.
    pub fn sessions_created(&self) -> u64 {
        self.created.load(Ordering::SeqCst)
    }

    /// Total sessions removed by the sweep.
    pub fn sessions_expired(&self) -> u64 {
        self.expired.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::testing::{RecordingSink, StaticWidget};

    fn manager(interval_ms: u64, timeout_ms: u64) -> Arc<SessionManager> {
        Arc::new(SessionManager::new(
            Duration::from_millis(interval_ms),
            Duration::from_millis(timeout_ms),
            None,
        ))
    }

    #[test]
    fn test_generate_session_id() {
        let a = generate_session_id().unwrap();
        let b = generate_session_id().unwrap();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_get_or_create_returns_same_session() {
        let m = manager(1000, 2000);
        let a = m.get_or_create("s1");
        let b = m.get_or_create("s1");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(m.session_count(), 1);
        assert!(m.get("s2").is_none());
    }

    #[test]
    fn test_concurrent_first_access_creates_once() {
        let m = Arc::new(SessionManager::new(
            Duration::from_secs(60),
            Duration::from_secs(60),
            None,
        ));
        let barrier = std::sync::Barrier::new(16);

        let sessions: Vec<Arc<Session>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..16)
                .map(|_| {
                    scope.spawn(|| {
                        barrier.wait();
                        m.get_or_create("shared")
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(m.sessions_created(), 1);
        assert!(sessions.iter().all(|s| Arc::ptr_eq(s, &sessions[0])));
    }

    #[test]
    fn test_sessions_are_isolated() {
        let m = SessionManager::new(Duration::from_secs(60), Duration::from_secs(60), None);
        let a = m.get_or_create("a");
        let b = m.get_or_create("b");

        a.add_widget(StaticWidget::new("only-a", "<p>a</p>"));
        a.set("user", "alice");

        assert!(b.widgets().is_empty());
        assert!(b.find_widget("only-a").is_none());
        assert!(!b.has("user"));
    }

    #[test]
    fn test_delete_removes_immediately() {
        let m = SessionManager::new(Duration::from_secs(60), Duration::from_secs(60), None);
        m.get_or_create("s1");
        m.delete("s1");
        m.delete("never-existed");
        assert_eq!(m.session_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_removes_only_idle_sessions() {
        let m = manager(1000, 2000);
        let idle = m.get_or_create("idle");
        let active = m.get_or_create("active");

        tokio::time::advance(Duration::from_millis(1500)).await;
        active.set("seen", true);
        tokio::time::advance(Duration::from_millis(1000)).await;

        assert_eq!(m.sweep(), 1);
        assert_eq!(m.sessions_expired(), 1);
        assert!(m.get(idle.id()).is_none());
        assert!(m.get(active.id()).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_sweep_expires_untouched_session() {
        let m = manager(1000, 2000);
        m.start();
        m.get_or_create("s1");

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(m.session_count(), 0);

        m.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_sweep_interval_still_expires_sessions() {
        let m = Arc::new(SessionManager::new(
            Duration::ZERO,
            Duration::from_millis(10),
            None,
        ));
        m.start();
        m.get_or_create("s1");

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(m.session_count(), 0);
        assert_eq!(m.sessions_expired(), 1);

        m.stop().await;
    }

    #[tokio::test]
    async fn test_stop_waits_for_sweeper_and_is_idempotent() {
        let m = manager(10, 60_000);
        m.start();
        m.start();
        m.stop().await;
        m.stop().await;
        assert!(m.sweeper.lock().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_session_is_notified() {
        let sink = Arc::new(RecordingSink::default());
        let weak = Arc::downgrade(&sink) as Weak<dyn UpdateSink>;
        let m = SessionManager::new(Duration::from_secs(1), Duration::from_secs(2), Some(weak));
        m.get_or_create("s1");

        tokio::time::advance(Duration::from_secs(3)).await;
        assert_eq!(m.sweep(), 1);

        let pushes = sink.pushes();
        assert_eq!(pushes.len(), 1);
        assert_eq!(pushes[0].0, "error");
        assert_eq!(pushes[0].1, "s1");
        assert_eq!(pushes[0].3, SESSION_EXPIRED_CODE);
    }
}
