//! Offline-first synchronization of the document with a remote backend.
//!
//! A session is keyed by a [`SyncCode`]. Devices sharing a code converge on
//! whichever copy of the document carries the highest `updatedAt`:
//!
//! 1. When a code is set, fetch the remote copy and adopt it if newer, or
//!    push the local one if it is newer or nothing is stored yet.
//! 2. Local mutations are pushed after a short quiet period.
//! 3. The remote is polled on a fixed interval.
//! 4. Pending changes are pushed when the device comes back online.

mod code;
mod connectivity;
mod engine;
mod settings;
mod status;

pub use code::{normalize, SyncCode, SyncCodeError, SyncCredentials, MAX_CODE_LEN};
pub use connectivity::Connectivity;
pub use engine::{SyncEngine, SyncSession};
pub use settings::SyncSettings;
pub use status::{SkipReason, SyncOutcome, SyncStatus};
