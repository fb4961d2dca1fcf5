//! In-memory document state: the document model, its change tracker and the
//! shared handle the sync engine and persister work through.

mod handle;
mod model;
mod tracker;

pub(crate) use handle::settle;
pub use handle::DocumentHandle;
pub use model::{next_clock, DocumentModel};
pub use tracker::{ChangeTracker, DEFAULT_SUPPRESSION_WINDOW};
