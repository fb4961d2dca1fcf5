use std::time::Duration;
use tokio::task::JoinHandle;

use super::LocalStore;
use crate::state::{settle, DocumentHandle};

/// Writes the document to the local store once changes have settled for
/// `debounce`. Write failures are logged and never reach the sync engine.
pub fn spawn_persister(
    document: DocumentHandle,
    store: LocalStore,
    debounce: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            document.persist_requests().notified().await;
            settle(document.persist_requests(), debounce).await;

            let snapshot = document.snapshot();
            match store.save_document(&snapshot) {
                Ok(()) => tracing::debug!(updated_at = snapshot.updated_at, "Document saved"),
                Err(e) => tracing::warn!("Failed to save document locally: {}", e),
            }
        }
    })
}
