use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

use super::model::DocumentModel;
use crate::models::{Document, Mutation, ValidationError};

/// Shared, cloneable access to the document model.
///
/// The lock is never held across an `.await`. Two notifications fan out of
/// every local mutation: one for the push-on-change watcher and one for the
/// local persister.
#[derive(Clone)]
pub struct DocumentHandle {
    inner: Arc<Inner>,
}

struct Inner {
    model: Mutex<DocumentModel>,
    local_changes: Notify,
    persist_requests: Notify,
    session_epoch: AtomicU64,
}

impl DocumentHandle {
    pub fn new(model: DocumentModel) -> Self {
        Self {
            inner: Arc::new(Inner {
                model: Mutex::new(model),
                local_changes: Notify::new(),
                persist_requests: Notify::new(),
                session_epoch: AtomicU64::new(0),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, DocumentModel> {
        self.inner
            .model
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Runs `f` with exclusive access to the model.
    pub fn with_model<R>(&self, f: impl FnOnce(&mut DocumentModel) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn mutate(&self, mutation: Mutation) -> Result<i64, ValidationError> {
        let clock = self
            .lock()
            .apply_local_mutation(mutation, Instant::now())?;
        tracing::debug!(updated_at = clock, "Local mutation applied");
        self.inner.local_changes.notify_one();
        self.inner.persist_requests.notify_one();
        Ok(clock)
    }

    pub fn snapshot(&self) -> Document {
        self.lock().document().clone()
    }

    pub fn updated_at(&self) -> i64 {
        self.lock().updated_at()
    }

    pub fn device_id(&self) -> String {
        self.lock().device_id().to_string()
    }

    pub fn is_dirty(&self) -> bool {
        self.lock().tracker().is_dirty()
    }

    pub fn request_persist(&self) {
        self.inner.persist_requests.notify_one();
    }

    pub(crate) fn local_changes(&self) -> &Notify {
        &self.inner.local_changes
    }

    pub(crate) fn persist_requests(&self) -> &Notify {
        &self.inner.persist_requests
    }

    /// Starts a new sync session epoch, invalidating results still in flight
    /// for the previous one.
    pub fn begin_session(&self) -> u64 {
        self.inner.session_epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_current_session(&self, epoch: u64) -> bool {
        self.inner.session_epoch.load(Ordering::SeqCst) == epoch
    }
}

/// Resolves once `notify` has stayed quiet for `quiet`.
pub(crate) async fn settle(notify: &Notify, quiet: Duration) {
    loop {
        tokio::select! {
            _ = notify.notified() => continue,
            _ = tokio::time::sleep(quiet) => return,
        }
    }
}
