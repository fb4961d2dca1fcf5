//! Daymark Core Library
//!
//! Document model, local persistence and the offline-first sync engine shared
//! by the Daymark CLI and server.

pub mod models;
pub mod state;
pub mod storage;
pub mod sync;
pub mod transport;
pub mod workspace;

pub use models::{Document, Habit, MoodEntry, MoodLog, Mutation, RemoteDocument, ValidationError};
pub use state::{DocumentHandle, DocumentModel};
pub use storage::{LocalStore, StoreError};
pub use sync::{
    Connectivity, SkipReason, SyncCode, SyncCredentials, SyncEngine, SyncOutcome, SyncSession,
    SyncSettings, SyncStatus,
};
pub use transport::{build_transport, RemoteTransport, TransportError, TransportSettings};
pub use workspace::{Workspace, WorkspaceError};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
