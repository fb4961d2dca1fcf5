//! A local installation: the persisted document, its device id and at most
//! one active sync session.

use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::models::{Document, Mutation, ValidationError};
use crate::state::{DocumentHandle, DocumentModel};
use crate::storage::{spawn_persister, LocalStore, StoreError};
use crate::sync::{
    Connectivity, SyncCode, SyncCodeError, SyncCredentials, SyncEngine, SyncSession, SyncSettings,
};
use crate::transport::{RemoteTransport, TransportError};

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Invalid sync code: {0}")]
    Code(#[from] SyncCodeError),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("No sync backend configured")]
    NoBackend,
    #[error("No sync code set")]
    NotSyncing,
}

pub struct Workspace {
    store: LocalStore,
    document: DocumentHandle,
    transport: Option<Arc<dyn RemoteTransport>>,
    connectivity: Connectivity,
    settings: SyncSettings,
    session: Option<SyncSession>,
    persister: Option<JoinHandle<()>>,
}

impl Workspace {
    /// Loads the document from `store`, generating a device id on first use.
    /// Syncing needs a transport attached with [`Workspace::with_transport`].
    pub fn open(store: LocalStore, settings: SyncSettings) -> Result<Self, WorkspaceError> {
        let device_id = store.device_id()?;
        let document = store.load_document(&device_id);
        tracing::debug!(
            device_id = %device_id,
            updated_at = document.updated_at,
            "Opened workspace"
        );

        let model = DocumentModel::new(document, device_id, settings.suppression_window);
        Ok(Self {
            store,
            document: DocumentHandle::new(model),
            transport: None,
            connectivity: Connectivity::default(),
            settings,
            session: None,
            persister: None,
        })
    }

    pub fn with_transport(mut self, transport: Arc<dyn RemoteTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn document(&self) -> &DocumentHandle {
        &self.document
    }

    pub fn snapshot(&self) -> Document {
        self.document.snapshot()
    }

    pub fn device_id(&self) -> String {
        self.document.device_id()
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    pub fn transport(&self) -> Option<&Arc<dyn RemoteTransport>> {
        self.transport.as_ref()
    }

    pub fn mutate(&self, mutation: Mutation) -> Result<i64, WorkspaceError> {
        Ok(self.document.mutate(mutation)?)
    }

    /// Starts writing the document to the store after changes settle.
    /// Must be called inside a tokio runtime.
    pub fn start_persistence(&mut self) {
        if self.persister.is_none() {
            self.persister = Some(spawn_persister(
                self.document.clone(),
                self.store.clone(),
                self.settings.persist_debounce,
            ));
        }
    }

    pub fn saved_credentials(&self) -> Option<SyncCredentials> {
        self.store.load_credentials()
    }

    /// A standalone engine for one-shot operations. Creating it supersedes
    /// any running session.
    pub fn engine(&self, credentials: SyncCredentials) -> Result<SyncEngine, WorkspaceError> {
        let transport = self.transport.clone().ok_or(WorkspaceError::NoBackend)?;
        Ok(SyncEngine::new(
            credentials,
            transport,
            self.document.clone(),
            self.connectivity.clone(),
            self.settings,
        ))
    }

    /// Persists a new code and restarts syncing under it. Results still in
    /// flight for the previous code are discarded.
    pub fn set_sync_code(
        &mut self,
        raw: &str,
        word: Option<String>,
    ) -> Result<&SyncSession, WorkspaceError> {
        let credentials = SyncCredentials::new(SyncCode::parse(raw)?, word);
        self.store.save_credentials(&credentials)?;
        tracing::info!(code = %credentials.code, "Sync code set");
        self.start_session(credentials)
    }

    /// Restarts syncing with the stored code.
    pub fn resume(&mut self) -> Result<&SyncSession, WorkspaceError> {
        let credentials = self.saved_credentials().ok_or(WorkspaceError::NotSyncing)?;
        self.start_session(credentials)
    }

    fn start_session(
        &mut self,
        credentials: SyncCredentials,
    ) -> Result<&SyncSession, WorkspaceError> {
        self.session = None;
        let session = SyncSession::start(self.engine(credentials)?);
        Ok(self.session.insert(session))
    }

    /// Stops syncing and forgets the stored code. The document stays.
    pub fn clear_sync(&mut self) -> Result<(), WorkspaceError> {
        if let Some(session) = self.session.take() {
            session.stop();
        }
        self.document.begin_session();
        self.store.clear_credentials()?;
        tracing::info!("Sync code cleared");
        Ok(())
    }

    pub fn session(&self) -> Option<&SyncSession> {
        self.session.as_ref()
    }

    /// Writes the current document to the store right away.
    pub fn flush(&self) -> Result<(), WorkspaceError> {
        self.store.save_document(&self.document.snapshot())?;
        Ok(())
    }

    /// Stops background work and writes the document one last time.
    pub fn shutdown(mut self) -> Result<(), WorkspaceError> {
        if let Some(session) = self.session.take() {
            session.stop();
        }
        if let Some(persister) = self.persister.take() {
            persister.abort();
        }
        self.flush()
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Some(persister) = &self.persister {
            persister.abort();
        }
    }
}
