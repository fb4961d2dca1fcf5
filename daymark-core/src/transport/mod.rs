//! Remote backends behind one interface.
//!
//! The sync engine only needs two operations: fetch the document stored
//! under a code, and push the full local document. Two real backend shapes
//! exist (a REST endpoint and a row-based table store) plus an in-memory one
//! for tests and local-only use.

mod memory;
mod rest;
mod table;

pub use memory::MemoryTransport;
pub use rest::RestTransport;
pub use table::{TableConfig, TableTransport, DEFAULT_TABLE};

use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::models::{Document, RemoteDocument};
use crate::sync::SyncCredentials;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Error)]
pub enum TransportError {
    /// The selected backend lacks the settings it needs.
    #[error("{0} backend is not configured")]
    NotConfigured(&'static str),
    #[error("Request failed: {0}")]
    Http(String),
    #[error("Backend returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl TransportError {
    pub fn is_not_configured(&self) -> bool {
        matches!(self, TransportError::NotConfigured(_))
    }

    /// The backend could not be reached at all.
    pub fn is_network(&self) -> bool {
        matches!(self, TransportError::Http(_))
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(e: reqwest::Error) -> Self {
        TransportError::Http(e.to_string())
    }
}

pub trait RemoteTransport: Send + Sync {
    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Fetches the document stored under a code.
    ///
    /// `Ok(Some(RemoteDocument::empty()))` means nothing was ever stored;
    /// `Ok(None)` means the backend cannot be used right now and local state
    /// must not be overwritten.
    fn fetch<'a>(
        &'a self,
        credentials: &'a SyncCredentials,
    ) -> BoxFuture<'a, Result<Option<RemoteDocument>, TransportError>>;

    /// Stores the full document and returns what the backend now holds.
    fn push<'a>(
        &'a self,
        credentials: &'a SyncCredentials,
        document: &'a Document,
    ) -> BoxFuture<'a, Result<RemoteDocument, TransportError>>;
}

/// Backend selection as read from configuration.
#[derive(Debug, Clone)]
pub enum TransportSettings {
    Rest {
        base_url: Option<String>,
        timeout: Duration,
    },
    Table {
        url: Option<String>,
        key: Option<String>,
        table: String,
        timeout: Duration,
    },
    Memory(MemoryTransport),
}

/// Builds the configured transport. A REST backend without a URL is an
/// error; a table store without credentials is built anyway and reports
/// itself as unusable.
pub fn build_transport(
    settings: &TransportSettings,
) -> Result<Arc<dyn RemoteTransport>, TransportError> {
    match settings {
        TransportSettings::Rest { base_url, timeout } => {
            let base_url = base_url
                .clone()
                .ok_or(TransportError::NotConfigured("REST"))?;
            Ok(Arc::new(RestTransport::new(base_url, *timeout)?))
        }
        TransportSettings::Table {
            url,
            key,
            table,
            timeout,
        } => {
            let config = TableConfig::from_parts(url.clone(), key.clone(), table.clone());
            Ok(Arc::new(TableTransport::new(config, *timeout)?))
        }
        TransportSettings::Memory(memory) => Ok(Arc::new(memory.clone())),
    }
}

/// Extracts a readable message from an error response body.
pub(crate) fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            ["message", "error"]
                .iter()
                .find_map(|k| v.get(*k).and_then(|m| m.as_str()).map(str::to_string))
        })
        .unwrap_or_else(|| body.trim().to_string())
}
