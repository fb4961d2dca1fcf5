//! REST backend: `GET`/`POST {base}/api/state?code=..&word=..`.

use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;

use super::{error_message, RemoteTransport, TransportError};
use crate::models::{Document, RemoteDocument};
use crate::sync::SyncCredentials;

#[derive(Debug, Clone)]
pub struct RestTransport {
    base_url: String,
    client: reqwest::Client,
}

impl RestTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.into(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Builds the state endpoint URL, defaulting bare hosts to http.
    fn state_url(&self) -> String {
        let base_url = if !self.base_url.starts_with("http://")
            && !self.base_url.starts_with("https://")
        {
            format!("http://{}", self.base_url)
        } else {
            self.base_url.clone()
        };

        format!("{}/api/state", base_url.trim_end_matches('/'))
    }

    fn query(credentials: &SyncCredentials) -> Vec<(&'static str, &str)> {
        let mut query = vec![("code", credentials.code.as_str())];
        if let Some(word) = &credentials.word {
            query.push(("word", word.as_str()));
        }
        query
    }

    async fn status_error(response: reqwest::Response) -> TransportError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        TransportError::Status {
            status,
            message: error_message(&body),
        }
    }

    async fn read_document(response: reqwest::Response) -> Result<RemoteDocument, TransportError> {
        let value: Value = response
            .json()
            .await
            .map_err(|e| TransportError::Malformed(e.to_string()))?;
        Ok(RemoteDocument::from_value(value))
    }

    async fn fetch_state(
        &self,
        credentials: &SyncCredentials,
    ) -> Result<Option<RemoteDocument>, TransportError> {
        let response = self
            .client
            .get(self.state_url())
            .query(&Self::query(credentials))
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                tracing::debug!(code = %credentials.code, "No remote state yet");
                Ok(Some(RemoteDocument::empty()))
            }
            status if status.is_success() => Self::read_document(response).await.map(Some),
            _ => Err(Self::status_error(response).await),
        }
    }

    async fn push_state(
        &self,
        credentials: &SyncCredentials,
        document: &Document,
    ) -> Result<RemoteDocument, TransportError> {
        let response = self
            .client
            .post(self.state_url())
            .query(&Self::query(credentials))
            .json(document)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::status_error(response).await);
        }

        Self::read_document(response).await
    }
}

impl RemoteTransport for RestTransport {
    fn name(&self) -> &'static str {
        "rest"
    }

    fn fetch<'a>(
        &'a self,
        credentials: &'a SyncCredentials,
    ) -> BoxFuture<'a, Result<Option<RemoteDocument>, TransportError>> {
        self.fetch_state(credentials).boxed()
    }

    fn push<'a>(
        &'a self,
        credentials: &'a SyncCredentials,
        document: &'a Document,
    ) -> BoxFuture<'a, Result<RemoteDocument, TransportError>> {
        self.push_state(credentials, document).boxed()
    }
}
