use chrono::{DateTime, Utc};
use std::fmt;

/// Session state shown to the user. Every trigger re-enters `Syncing`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SyncStatus {
    #[default]
    Idle,
    Syncing,
    Synced {
        at: DateTime<Utc>,
    },
    Error(String),
}

impl SyncStatus {
    pub fn synced_now() -> Self {
        SyncStatus::Synced { at: Utc::now() }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, SyncStatus::Error(_))
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStatus::Idle => write!(f, "idle"),
            SyncStatus::Syncing => write!(f, "syncing"),
            SyncStatus::Synced { at } => write!(f, "synced at {}", at.format("%Y-%m-%d %H:%M:%S UTC")),
            SyncStatus::Error(message) => write!(f, "error: {}", message),
        }
    }
}

/// Why a trigger did not talk to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Offline,
    NotDirty,
    RemoteApplying,
    PushPending,
    Superseded,
}

/// What a single trigger ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A newer remote document replaced local state.
    Applied { updated_at: i64 },
    /// The local document was stored remotely.
    Pushed { updated_at: i64 },
    /// Both sides carry the same clock, or the remote is older and this
    /// trigger does not push.
    UpToDate,
    /// The remote copy was newer but lacked the minimum expected shape.
    Rejected,
    /// The backend reported itself unusable; local state was kept.
    Unavailable,
    Skipped(SkipReason),
    Failed(String),
}
