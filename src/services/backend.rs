use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::models::{AckEnvelope, ApiEnvelope, Item, ItemKind, ItemRecord, MatchResult};

/// Errors that can occur when talking to the reFind backend stores.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("store reported failure: {0}")]
    RemoteOperationFailed(String),

    #[error("invalid response format: {0}")]
    InvalidResponse(String),
}

impl BackendError {
    /// Transient failures are worth retrying; explicit refusals are not.
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::RequestError(_))
    }
}

/// Client for the item store, the taxonomy endpoint and the match store.
///
/// All three live behind the same REST base URL and share the
/// `{ success, data }` envelope convention.
pub struct BackendClient {
    base_url: String,
    client: Client,
}

impl BackendClient {
    pub fn new(base_url: String, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self { base_url, client }
    }

    /// Fetch every item of the given kind and tag the records with it.
    ///
    /// Individual records that fail to parse are dropped rather than
    /// failing the fetch, so one malformed document cannot block scoring.
    pub async fn fetch_items(&self, kind: ItemKind) -> Result<Vec<Item>, BackendError> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), kind.as_str());
        tracing::debug!("Fetching {} items from: {}", kind, url);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(BackendError::RemoteOperationFailed(format!(
                "item store returned {} for {} fetch",
                response.status(),
                kind
            )));
        }

        let json: Value = response.json().await?;
        if !json.get("success").and_then(Value::as_bool).unwrap_or(false) {
            return Err(BackendError::RemoteOperationFailed(format!(
                "item store refused {} fetch",
                kind
            )));
        }

        let data = json
            .get("data")
            .and_then(Value::as_array)
            .ok_or_else(|| BackendError::InvalidResponse("missing data array".into()))?;

        let items: Vec<Item> = data
            .iter()
            .filter_map(|record| serde_json::from_value::<ItemRecord>(record.clone()).ok())
            .map(|record| record.into_item(kind))
            .collect();

        tracing::debug!(
            "Fetched {} {} items ({} raw records)",
            items.len(),
            kind,
            data.len()
        );

        Ok(items)
    }

    /// Fetch the item-type taxonomy used by the similarity table builder.
    pub async fn fetch_types(&self) -> Result<Vec<String>, BackendError> {
        let url = format!("{}/config/types", self.base_url.trim_end_matches('/'));
        tracing::debug!("Fetching type taxonomy from: {}", url);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(BackendError::RemoteOperationFailed(format!(
                "taxonomy store returned {}",
                response.status()
            )));
        }

        let envelope: ApiEnvelope<Vec<String>> = response.json().await?;
        if !envelope.success {
            return Err(BackendError::RemoteOperationFailed(
                "taxonomy store refused types fetch".into(),
            ));
        }
        envelope
            .data
            .ok_or_else(|| BackendError::InvalidResponse("missing types data".into()))
    }

    /// Persist a batch of match results. A no-op for an empty batch.
    pub async fn save_matches(&self, matches: &[MatchResult]) -> Result<(), BackendError> {
        if matches.is_empty() {
            return Ok(());
        }

        let url = format!("{}/matches/batch", self.base_url.trim_end_matches('/'));

        let response = self.client.post(&url).json(matches).send().await?;
        if !response.status().is_success() {
            return Err(BackendError::RemoteOperationFailed(format!(
                "match store returned {}",
                response.status()
            )));
        }

        let envelope: AckEnvelope = response.json().await?;
        if !envelope.success {
            return Err(BackendError::RemoteOperationFailed(
                "match store refused the batch".into(),
            ));
        }

        tracing::debug!("Persisted {} match results", matches.len());
        Ok(())
    }
}
