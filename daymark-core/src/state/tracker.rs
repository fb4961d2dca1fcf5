//! Records why the document last changed.
//!
//! A local mutation makes the document "dirty" until a push succeeds or a
//! remote document replaces it. Applying a remote document opens a short
//! suppression window during which nothing may be pushed, so the state that
//! just arrived is never echoed straight back.

use std::time::Duration;
use tokio::time::Instant;

/// Default length of the post-apply suppression window.
pub const DEFAULT_SUPPRESSION_WINDOW: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct ChangeTracker {
    local_dirty_since: Option<Instant>,
    remote_applied_at: Option<Instant>,
    suppression_window: Duration,
}

impl ChangeTracker {
    pub fn new(suppression_window: Duration) -> Self {
        Self {
            local_dirty_since: None,
            remote_applied_at: None,
            suppression_window,
        }
    }

    pub fn mark_local_dirty(&mut self, now: Instant) {
        self.local_dirty_since = Some(now);
    }

    /// Local state now matches what was received.
    pub fn mark_remote_applied(&mut self, now: Instant) {
        self.remote_applied_at = Some(now);
        self.local_dirty_since = None;
    }

    pub fn clear_dirty(&mut self) {
        self.local_dirty_since = None;
    }

    pub fn local_dirty_since(&self) -> Option<Instant> {
        self.local_dirty_since
    }

    pub fn is_dirty(&self) -> bool {
        self.local_dirty_since.is_some()
    }

    /// How long ago the latest unpushed mutation happened.
    pub fn dirty_for(&self, now: Instant) -> Option<Duration> {
        self.local_dirty_since
            .map(|since| now.saturating_duration_since(since))
    }

    pub fn is_remote_applying(&self, now: Instant) -> bool {
        self.remote_applied_at
            .map(|at| now.saturating_duration_since(at) < self.suppression_window)
            .unwrap_or(false)
    }

    /// The push-on-change watcher may fire.
    pub fn should_push(&self, now: Instant) -> bool {
        self.is_dirty() && !self.is_remote_applying(now)
    }
}

impl Default for ChangeTracker {
    fn default() -> Self {
        Self::new(DEFAULT_SUPPRESSION_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_clean() {
        let tracker = ChangeTracker::default();
        let now = Instant::now();
        assert!(!tracker.is_dirty());
        assert!(!tracker.is_remote_applying(now));
        assert!(!tracker.should_push(now));
    }

    #[test]
    fn test_local_mutation_requests_push() {
        let mut tracker = ChangeTracker::default();
        let now = Instant::now();
        tracker.mark_local_dirty(now);

        assert!(tracker.should_push(now));
        assert_eq!(
            tracker.dirty_for(now + Duration::from_millis(250)),
            Some(Duration::from_millis(250))
        );
    }

    #[test]
    fn test_remote_apply_clears_dirty_and_suppresses() {
        let mut tracker = ChangeTracker::default();
        let now = Instant::now();
        tracker.mark_local_dirty(now);
        tracker.mark_remote_applied(now);

        assert!(!tracker.is_dirty());
        assert!(tracker.is_remote_applying(now + Duration::from_millis(50)));
        assert!(!tracker.is_remote_applying(now + Duration::from_millis(100)));
    }

    #[test]
    fn test_mutation_inside_window_waits() {
        let mut tracker = ChangeTracker::default();
        let now = Instant::now();
        tracker.mark_remote_applied(now);
        tracker.mark_local_dirty(now + Duration::from_millis(10));

        assert!(!tracker.should_push(now + Duration::from_millis(20)));
        assert!(tracker.should_push(now + Duration::from_millis(150)));
    }
}
