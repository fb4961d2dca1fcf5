//! Row-based table store spoken to over a PostgREST-style API.
//!
//! One row per sync code:
//! ```text
//! code (text, primary key) | document (json) | updated_at (bigint) | device_id (text)
//! ```

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{json, Value};
use std::time::Duration;

use super::{error_message, RemoteTransport, TransportError};
use crate::models::{Document, RemoteDocument};
use crate::sync::SyncCredentials;

pub const DEFAULT_TABLE: &str = "sync_state";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableConfig {
    pub url: String,
    pub key: String,
    pub table: String,
}

impl TableConfig {
    /// Returns `None` unless both endpoint and key are present.
    pub fn from_parts(url: Option<String>, key: Option<String>, table: String) -> Option<Self> {
        let url = url.filter(|u| !u.trim().is_empty())?;
        let key = key.filter(|k| !k.trim().is_empty())?;
        Some(Self { url, key, table })
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.url.trim_end_matches('/'), self.table)
    }
}

#[derive(Debug, Clone)]
pub struct TableTransport {
    config: Option<TableConfig>,
    client: reqwest::Client,
}

impl TableTransport {
    pub fn new(config: Option<TableConfig>, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { config, client })
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    fn authorized(&self, config: &TableConfig, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("apikey", &config.key)
            .header("Authorization", format!("Bearer {}", config.key))
    }

    async fn fetch_row(
        &self,
        credentials: &SyncCredentials,
    ) -> Result<Option<RemoteDocument>, TransportError> {
        let Some(config) = &self.config else {
            tracing::debug!("Table store not configured, skipping fetch");
            return Ok(None);
        };

        let filter = format!("eq.{}", credentials.code);
        let request = self
            .client
            .get(config.table_url())
            .query(&[("select", "document"), ("code", filter.as_str())]);
        let response = self.authorized(config, request).send().await?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let rows: Vec<Value> = response
            .json()
            .await
            .map_err(|e| TransportError::Malformed(e.to_string()))?;

        Ok(Some(match rows.into_iter().next() {
            Some(row) => row_document(row)?,
            None => RemoteDocument::empty(),
        }))
    }

    async fn upsert_row(
        &self,
        credentials: &SyncCredentials,
        document: &Document,
    ) -> Result<RemoteDocument, TransportError> {
        let config = self
            .config
            .as_ref()
            .ok_or(TransportError::NotConfigured("table-store"))?;

        let row = json!([{
            "code": credentials.code.as_str(),
            "document": document,
            "updated_at": document.updated_at,
            "device_id": document.device_id,
        }]);
        let request = self
            .client
            .post(config.table_url())
            .query(&[("on_conflict", "code")])
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(&row);
        let response = self.authorized(config, request).send().await?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let rows: Vec<Value> = response.json().await.unwrap_or_default();
        match rows.into_iter().next() {
            Some(row) => row_document(row),
            None => Ok(RemoteDocument::from(document.clone())),
        }
    }
}

/// The `document` column may come back as JSON or as a serialized string.
fn row_document(mut row: Value) -> Result<RemoteDocument, TransportError> {
    let document = match row.get_mut("document").map(Value::take) {
        Some(Value::String(text)) => serde_json::from_str(&text)
            .map_err(|e| TransportError::Malformed(format!("document column: {}", e)))?,
        Some(value) => value,
        None => return Err(TransportError::Malformed("row has no document column".into())),
    };
    Ok(RemoteDocument::from_value(document))
}

async fn status_error(response: reqwest::Response) -> TransportError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    TransportError::Status {
        status,
        message: error_message(&body),
    }
}

impl RemoteTransport for TableTransport {
    fn name(&self) -> &'static str {
        "table-store"
    }

    fn fetch<'a>(
        &'a self,
        credentials: &'a SyncCredentials,
    ) -> BoxFuture<'a, Result<Option<RemoteDocument>, TransportError>> {
        self.fetch_row(credentials).boxed()
    }

    fn push<'a>(
        &'a self,
        credentials: &'a SyncCredentials,
        document: &'a Document,
    ) -> BoxFuture<'a, Result<RemoteDocument, TransportError>> {
        self.upsert_row(credentials, document).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::SyncCode;

    fn credentials() -> SyncCredentials {
        SyncCredentials::new(SyncCode::parse("abc").unwrap(), None)
    }

    fn unconfigured() -> TableTransport {
        TableTransport::new(None, Duration::from_secs(1)).unwrap()
    }

    #[test]
    fn test_config_requires_url_and_key() {
        assert!(TableConfig::from_parts(None, Some("k".into()), DEFAULT_TABLE.into()).is_none());
        assert!(TableConfig::from_parts(Some("u".into()), None, DEFAULT_TABLE.into()).is_none());
        assert!(
            TableConfig::from_parts(Some(" ".into()), Some("k".into()), DEFAULT_TABLE.into())
                .is_none()
        );

        let config = TableConfig::from_parts(
            Some("https://db.example.com/".into()),
            Some("k".into()),
            DEFAULT_TABLE.into(),
        )
        .unwrap();
        assert_eq!(
            config.table_url(),
            "https://db.example.com/rest/v1/sync_state"
        );
    }

    #[tokio::test]
    async fn test_unconfigured_fetch_is_unusable() {
        let result = unconfigured().fetch(&credentials()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_unconfigured_push_fails_fast() {
        let doc = Document::new("dev-a");
        let err = unconfigured().push(&credentials(), &doc).await.unwrap_err();
        assert!(err.is_not_configured());
        assert_eq!(err.to_string(), "table-store backend is not configured");
    }

    #[test]
    fn test_row_document_accepts_string_column() {
        let doc = Document::new("dev-a");
        let text = serde_json::to_string(&doc).unwrap();

        let remote = row_document(json!({ "document": text })).unwrap();
        assert_eq!(remote, RemoteDocument::from(doc));
    }

    #[test]
    fn test_row_without_document_is_malformed() {
        let err = row_document(json!({ "code": "abc" })).unwrap_err();
        assert!(matches!(err, TransportError::Malformed(_)));
    }
}
