use std::time::Duration;

use crate::state::DEFAULT_SUPPRESSION_WINDOW;

/// Timing knobs for a sync session and the local persister.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    /// Quiet period after the last local mutation before pushing.
    pub push_debounce: Duration,
    /// Interval between remote polls.
    pub poll_interval: Duration,
    /// How long a freshly applied remote document blocks pushes.
    pub suppression_window: Duration,
    /// Quiet period before writing the document to the local store.
    pub persist_debounce: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            push_debounce: Duration::from_millis(800),
            poll_interval: Duration::from_secs(3),
            suppression_window: DEFAULT_SUPPRESSION_WINDOW,
            persist_debounce: Duration::from_millis(300),
        }
    }
}
