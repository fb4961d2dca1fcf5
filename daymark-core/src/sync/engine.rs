//! The sync engine.
//!
//! One [`SyncSession`] exists per active sync code. It runs three tasks on
//! the tokio runtime:
//!
//! - initial reconciliation followed by a periodic poll,
//! - a debounced push-on-change watcher,
//! - a connectivity watcher that pushes pending changes when the device
//!   comes back online.
//!
//! A network failure marks the device offline. While offline, poll ticks
//! only probe the backend, and the first successful probe brings the device
//! back online.
//!
//! Conflicts are resolved last-writer-wins on the document's logical clock.
//! The whole document is replaced or pushed; nothing is merged per field.
//! Errors never escape: they become [`SyncStatus::Error`] and the next
//! trigger tries again.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use super::connectivity::Connectivity;
use super::settings::SyncSettings;
use super::status::{SkipReason, SyncOutcome, SyncStatus};
use super::SyncCredentials;
use crate::models::RemoteDocument;
use crate::state::{settle, DocumentHandle};
use crate::transport::{RemoteTransport, TransportError};

/// Result of comparing a fetched document with local state.
#[derive(Debug)]
enum Decision {
    Applied(i64),
    Push,
    UpToDate,
    Rejected,
    Superseded,
}

/// Resets the in-flight flag however the push ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct SyncEngine {
    credentials: SyncCredentials,
    transport: Arc<dyn RemoteTransport>,
    document: DocumentHandle,
    connectivity: Connectivity,
    settings: SyncSettings,
    epoch: u64,
    push_in_flight: AtomicBool,
    status: watch::Sender<SyncStatus>,
}

impl SyncEngine {
    /// Creates an engine for `credentials`. Any engine previously created on
    /// the same document stops being current: its in-flight results are
    /// discarded.
    pub fn new(
        credentials: SyncCredentials,
        transport: Arc<dyn RemoteTransport>,
        document: DocumentHandle,
        connectivity: Connectivity,
        settings: SyncSettings,
    ) -> Self {
        let epoch = document.begin_session();
        let (status, _) = watch::channel(SyncStatus::Idle);
        Self {
            credentials,
            transport,
            document,
            connectivity,
            settings,
            epoch,
            push_in_flight: AtomicBool::new(false),
            status,
        }
    }

    pub fn credentials(&self) -> &SyncCredentials {
        &self.credentials
    }

    pub fn status(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    pub fn is_current(&self) -> bool {
        self.document.is_current_session(self.epoch)
    }

    fn set_status(&self, status: SyncStatus) {
        self.status.send_replace(status);
    }

    fn fail(&self, action: &str, error: TransportError) -> SyncOutcome {
        tracing::warn!(code = %self.credentials.code, "{} failed: {}", action, error);
        if error.is_network() {
            self.connectivity.set_online(false);
        }
        let message = error.to_string();
        self.set_status(SyncStatus::Error(message.clone()));
        SyncOutcome::Failed(message)
    }

    fn unavailable(&self) -> SyncOutcome {
        tracing::warn!(
            backend = self.transport.name(),
            "Remote backend unavailable, keeping local state"
        );
        self.set_status(SyncStatus::Error(format!(
            "{} backend is unavailable; working locally",
            self.transport.name()
        )));
        SyncOutcome::Unavailable
    }

    /// Whether local edits exist, and whether the tracker allows pushing
    /// them right now.
    fn push_flags(&self) -> (bool, bool) {
        let now = Instant::now();
        self.document.with_model(|model| {
            let tracker = model.tracker();
            (tracker.is_dirty(), tracker.should_push(now))
        })
    }

    /// Reads the flags the poll tick is guarded by.
    fn local_flags(&self) -> (Option<std::time::Duration>, bool) {
        let now = Instant::now();
        self.document.with_model(|model| {
            (
                model.tracker().dirty_for(now),
                model.tracker().is_remote_applying(now),
            )
        })
    }

    /// Compares against the latest local state, not a snapshot taken when
    /// the request was issued.
    fn reconcile(&self, remote: RemoteDocument, push_when_ahead: bool) -> Decision {
        let now = Instant::now();
        self.document.with_model(|model| {
            if !self.is_current() {
                return Decision::Superseded;
            }

            let local = model.updated_at();
            if remote.updated_at > local {
                if !remote.is_structurally_valid() {
                    return Decision::Rejected;
                }
                let clock = remote.updated_at;
                model.apply_remote_document(remote, now);
                Decision::Applied(clock)
            } else if push_when_ahead && (local > remote.updated_at || remote.missing) {
                Decision::Push
            } else {
                Decision::UpToDate
            }
        })
    }

    async fn conclude(&self, decision: Decision) -> SyncOutcome {
        match decision {
            Decision::Applied(updated_at) => {
                tracing::info!(
                    code = %self.credentials.code,
                    updated_at,
                    "Applied newer remote document"
                );
                self.document.request_persist();
                self.set_status(SyncStatus::synced_now());
                SyncOutcome::Applied { updated_at }
            }
            Decision::Push => self.push_now().await,
            Decision::UpToDate => {
                self.set_status(SyncStatus::synced_now());
                SyncOutcome::UpToDate
            }
            Decision::Rejected => {
                tracing::warn!(
                    code = %self.credentials.code,
                    "Ignoring remote document without habits or mood log"
                );
                self.set_status(SyncStatus::Error(
                    "remote document is malformed; keeping local state".into(),
                ));
                SyncOutcome::Rejected
            }
            Decision::Superseded => SyncOutcome::Skipped(SkipReason::Superseded),
        }
    }

    /// Runs when a sync code is set: adopt a newer remote copy, or push the
    /// local one if it is ahead or the remote has never been written.
    pub async fn initialize(&self) -> SyncOutcome {
        if !self.is_current() {
            return SyncOutcome::Skipped(SkipReason::Superseded);
        }
        if !self.connectivity.is_online() {
            return SyncOutcome::Skipped(SkipReason::Offline);
        }

        self.set_status(SyncStatus::Syncing);
        let remote = match self.transport.fetch(&self.credentials).await {
            Ok(Some(remote)) => remote,
            Ok(None) => return self.unavailable(),
            Err(e) => return self.fail("Initial fetch", e),
        };

        let decision = self.reconcile(remote, true);
        tracing::debug!(?decision, code = %self.credentials.code, "Initial reconciliation");
        self.conclude(decision).await
    }

    /// Debounced push-on-change. Pushes only if local edits are pending and
    /// no remote document is being absorbed.
    pub async fn push_if_dirty(&self) -> SyncOutcome {
        let (dirty, should_push) = self.push_flags();
        if !dirty {
            return SyncOutcome::Skipped(SkipReason::NotDirty);
        }
        if !should_push {
            return SyncOutcome::Skipped(SkipReason::RemoteApplying);
        }
        if !self.connectivity.is_online() {
            return SyncOutcome::Skipped(SkipReason::Offline);
        }
        self.push_now().await
    }

    /// One poll tick. Stays out of the way of pending pushes and remote
    /// applies. Changes still dirty after the debounce window belong to a
    /// push that failed, so the tick retries that push instead of fetching.
    /// While offline the tick only probes the backend.
    pub async fn poll(&self) -> SyncOutcome {
        if !self.connectivity.is_online() {
            return self.probe().await;
        }
        if self.push_in_flight.load(Ordering::SeqCst) {
            return SyncOutcome::Skipped(SkipReason::PushPending);
        }

        let (dirty_for, remote_applying) = self.local_flags();
        if remote_applying {
            return SyncOutcome::Skipped(SkipReason::RemoteApplying);
        }
        if let Some(age) = dirty_for {
            if age < self.settings.push_debounce {
                return SyncOutcome::Skipped(SkipReason::PushPending);
            }
            tracing::debug!(code = %self.credentials.code, "Retrying push of unsynced changes");
            return self.push_now().await;
        }

        self.set_status(SyncStatus::Syncing);
        let remote = match self.transport.fetch(&self.credentials).await {
            Ok(Some(remote)) => remote,
            Ok(None) => return self.unavailable(),
            Err(e) => return self.fail("Poll", e),
        };

        let decision = self.reconcile(remote, false);
        self.conclude(decision).await
    }

    /// Fetches once to find out whether the backend is reachable again. A
    /// successful fetch marks the device online and reconciles the way
    /// initialization does, so edits made while offline get pushed.
    async fn probe(&self) -> SyncOutcome {
        if !self.is_current() {
            return SyncOutcome::Skipped(SkipReason::Superseded);
        }
        let remote = match self.transport.fetch(&self.credentials).await {
            Ok(Some(remote)) => remote,
            Ok(None) => return self.unavailable(),
            Err(e) if e.is_network() => {
                tracing::debug!(code = %self.credentials.code, "Backend still unreachable: {}", e);
                return SyncOutcome::Skipped(SkipReason::Offline);
            }
            Err(e) => {
                self.connectivity.set_online(true);
                return self.fail("Probe", e);
            }
        };

        self.connectivity.set_online(true);
        self.set_status(SyncStatus::Syncing);
        let decision = self.reconcile(remote, true);
        tracing::debug!(?decision, code = %self.credentials.code, "Reconciled after reconnect");
        self.conclude(decision).await
    }

    /// Called on an offline to online transition.
    pub async fn reconnect(&self) -> SyncOutcome {
        tracing::info!(code = %self.credentials.code, "Back online");
        self.push_if_dirty().await
    }

    /// Pushes the full current document.
    async fn push_now(&self) -> SyncOutcome {
        if !self.is_current() {
            return SyncOutcome::Skipped(SkipReason::Superseded);
        }
        if self.push_in_flight.swap(true, Ordering::SeqCst) {
            return SyncOutcome::Skipped(SkipReason::PushPending);
        }
        let _in_flight = InFlight(&self.push_in_flight);

        let snapshot = self.document.snapshot();
        self.set_status(SyncStatus::Syncing);

        match self.transport.push(&self.credentials, &snapshot).await {
            Ok(_) => {
                if !self.is_current() {
                    return SyncOutcome::Skipped(SkipReason::Superseded);
                }
                let clean = self
                    .document
                    .with_model(|model| model.mark_pushed(snapshot.updated_at));
                tracing::info!(
                    code = %self.credentials.code,
                    updated_at = snapshot.updated_at,
                    clean,
                    "Pushed local document"
                );
                self.set_status(SyncStatus::synced_now());
                SyncOutcome::Pushed {
                    updated_at: snapshot.updated_at,
                }
            }
            Err(e) => self.fail("Push", e),
        }
    }

    async fn run_poll_loop(self: Arc<Self>) {
        let period = self.settings.poll_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let outcome = self.poll().await;
            tracing::trace!(?outcome, "Poll tick");
        }
    }

    async fn run_push_watcher(self: Arc<Self>) {
        let changes = self.document.local_changes();
        loop {
            changes.notified().await;
            settle(changes, self.settings.push_debounce).await;
            let outcome = self.push_if_dirty().await;
            tracing::debug!(?outcome, "Debounced push");
        }
    }

    async fn run_connectivity_watcher(self: Arc<Self>) {
        let mut online = self.connectivity.subscribe();
        let mut was_online = *online.borrow_and_update();

        while online.changed().await.is_ok() {
            let is_online = *online.borrow_and_update();
            if is_online && !was_online {
                let outcome = self.reconnect().await;
                tracing::debug!(?outcome, "Reconnect push");
            }
            was_online = is_online;
        }
    }
}

/// A running sync session. Dropping it stops every task it started.
pub struct SyncSession {
    engine: Arc<SyncEngine>,
    tasks: Vec<JoinHandle<()>>,
}

impl SyncSession {
    /// Spawns the session tasks. Must be called inside a tokio runtime.
    pub fn start(engine: SyncEngine) -> Self {
        let engine = Arc::new(engine);
        tracing::info!(
            code = %engine.credentials.code,
            device_id = %engine.document.device_id(),
            backend = engine.transport.name(),
            "Starting sync session"
        );

        let tasks = vec![
            tokio::spawn({
                let engine = engine.clone();
                async move {
                    let outcome = engine.initialize().await;
                    tracing::debug!(?outcome, "Initial sync");
                    engine.run_poll_loop().await;
                }
            }),
            tokio::spawn(engine.clone().run_push_watcher()),
            tokio::spawn(engine.clone().run_connectivity_watcher()),
        ];

        Self { engine, tasks }
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    pub fn credentials(&self) -> &SyncCredentials {
        self.engine.credentials()
    }

    pub fn status(&self) -> SyncStatus {
        self.engine.status()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SyncStatus> {
        self.engine.subscribe_status()
    }

    pub fn stop(self) {
        tracing::info!(code = %self.engine.credentials.code, "Stopping sync session");
    }
}

impl Drop for SyncSession {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}
