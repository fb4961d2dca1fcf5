use futures::future::{self, BoxFuture};
use futures::FutureExt;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::{RemoteTransport, TransportError};
use crate::models::{Document, RemoteDocument};
use crate::sync::{SyncCode, SyncCredentials};

/// A backend held in process memory. Clones share the same rows, so several
/// workspaces built on clones behave like devices sharing one remote.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    shared: Arc<Shared>,
}

#[derive(Debug, Default)]
struct Shared {
    rows: Mutex<HashMap<SyncCode, Value>>,
    unreachable: AtomicBool,
    fetches: AtomicUsize,
    pushes: AtomicUsize,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn rows(&self) -> std::sync::MutexGuard<'_, HashMap<SyncCode, Value>> {
        self.shared
            .rows
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Stores a raw payload, bypassing the document type. Useful for
    /// simulating partial or corrupt remote state.
    pub fn insert_raw(&self, code: &SyncCode, payload: Value) {
        self.rows().insert(code.clone(), payload);
    }

    pub fn stored(&self, code: &SyncCode) -> Option<Value> {
        self.rows().get(code).cloned()
    }

    /// Makes every request fail as if the network were down.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.shared.unreachable.store(unreachable, Ordering::SeqCst);
    }

    pub fn fetch_count(&self) -> usize {
        self.shared.fetches.load(Ordering::SeqCst)
    }

    pub fn push_count(&self) -> usize {
        self.shared.pushes.load(Ordering::SeqCst)
    }

    fn check_reachable(&self) -> Result<(), TransportError> {
        if self.shared.unreachable.load(Ordering::SeqCst) {
            return Err(TransportError::Http("network unreachable".into()));
        }
        Ok(())
    }

    fn fetch_now(&self, code: &SyncCode) -> Result<Option<RemoteDocument>, TransportError> {
        self.shared.fetches.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        Ok(Some(match self.stored(code) {
            Some(payload) => RemoteDocument::from_value(payload),
            None => RemoteDocument::empty(),
        }))
    }

    fn push_now(&self, code: &SyncCode, document: &Document) -> Result<RemoteDocument, TransportError> {
        self.shared.pushes.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        let payload =
            serde_json::to_value(document).map_err(|e| TransportError::Malformed(e.to_string()))?;
        self.rows().insert(code.clone(), payload.clone());
        Ok(RemoteDocument::from_value(payload))
    }
}

impl RemoteTransport for MemoryTransport {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn fetch<'a>(
        &'a self,
        credentials: &'a SyncCredentials,
    ) -> BoxFuture<'a, Result<Option<RemoteDocument>, TransportError>> {
        future::ready(self.fetch_now(&credentials.code)).boxed()
    }

    fn push<'a>(
        &'a self,
        credentials: &'a SyncCredentials,
        document: &'a Document,
    ) -> BoxFuture<'a, Result<RemoteDocument, TransportError>> {
        future::ready(self.push_now(&credentials.code, document)).boxed()
    }
}
