//! Self-echo suppression.
//!
//! When the client performs an action locally (e.g. marks a notification
//! read) it applies the side effect immediately. The server then broadcasts the
//! same change back to every session, this one included. The suppressor lets
//! the push handler tell that echo apart from a change made elsewhere.
//!
//! Markers expire after a fixed window so that genuine remote changes (another
//! device, another user) still take effect afterwards. Expiry is evaluated
//! against `tokio::time::Instant`, so paused-clock tests can advance it.

use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// Empirical window during which a server echo is expected.
pub const DEFAULT_ECHO_WINDOW: Duration = Duration::from_secs(5);

/// A pending marker for one locally-initiated change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelfEchoMarker {
    pub id: String,
    pub expires_at: Instant,
}

/// Short-lived marker set keyed by entity id.
#[derive(Debug, Clone)]
pub struct SelfEchoSuppressor {
    window: Duration,
    markers: HashMap<String, Instant>,
}

impl SelfEchoSuppressor {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            markers: HashMap::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Marks `id` as locally changed for one window from now.
    ///
    /// Re-marking an id restarts its window.
    pub fn mark(&mut self, id: impl Into<String>) -> SelfEchoMarker {
        self.purge_expired();
        let id = id.into();
        let expires_at = Instant::now() + self.window;
        self.markers.insert(id.clone(), expires_at);
        SelfEchoMarker { id, expires_at }
    }

    /// Returns `true` while `id` carries an unexpired marker.
    ///
    /// Checking does not consume the marker; only the timeout removes it.
    pub fn is_marked(&self, id: &str) -> bool {
        self.markers
            .get(id)
            .is_some_and(|expires_at| Instant::now() < *expires_at)
    }

    /// Drops the marker for `id` early, e.g. after the local action was rolled back.
    pub fn unmark(&mut self, id: &str) -> bool {
        self.markers.remove(id).is_some()
    }

    /// Removes every expired marker and returns how many were dropped.
    pub fn purge_expired(&mut self) -> usize {
        let now = Instant::now();
        let before = self.markers.len();
        self.markers.retain(|_, expires_at| now < *expires_at);
        before - self.markers.len()
    }

    /// Live markers, expired ones excluded.
    pub fn markers(&self) -> Vec<SelfEchoMarker> {
        let now = Instant::now();
        self.markers
            .iter()
            .filter(|(_, expires_at)| now < **expires_at)
            .map(|(id, expires_at)| SelfEchoMarker {
                id: id.clone(),
                expires_at: *expires_at,
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.markers.clear();
    }
}

impl Default for SelfEchoSuppressor {
    fn default() -> Self {
        Self::new(DEFAULT_ECHO_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_marker_expires_after_window() {
        let mut suppressor = SelfEchoSuppressor::default();
        suppressor.mark("n1");
        assert!(suppressor.is_marked("n1"));

        tokio::time::advance(Duration::from_millis(4_900)).await;
        assert!(suppressor.is_marked("n1"));

        tokio::time::advance(Duration::from_millis(200)).await;
        assert!(!suppressor.is_marked("n1"));
        assert_eq!(suppressor.purge_expired(), 1);
        assert!(suppressor.markers().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_checking_does_not_consume() {
        let mut suppressor = SelfEchoSuppressor::new(Duration::from_secs(1));
        suppressor.mark("n1");
        assert!(suppressor.is_marked("n1"));
        assert!(suppressor.is_marked("n1"));
        assert!(!suppressor.is_marked("n2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remark_restarts_window() {
        let mut suppressor = SelfEchoSuppressor::new(Duration::from_secs(5));
        suppressor.mark("n1");
        tokio::time::advance(Duration::from_secs(4)).await;
        suppressor.mark("n1");
        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(suppressor.is_marked("n1"));
    }

    #[test]
    fn test_unmark() {
        let mut suppressor = SelfEchoSuppressor::default();
        suppressor.mark("n1");
        assert!(suppressor.unmark("n1"));
        assert!(!suppressor.is_marked("n1"));
        assert!(!suppressor.unmark("n1"));
    }
}
