use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, COOKIE};
use reqwest::Client;
use tracing::debug;

use crate::ops::{OfflineOperation, OperationResult, SyncRequest, SyncResponse, MAX_SYNC_BATCH};
use crate::SyncError;

/// Delivers a batch of operations to the server and returns one result per
/// operation the server processed.
#[async_trait]
pub trait SyncTransport: Send + Sync {
    async fn push(&self, operations: &[OfflineOperation]) -> Result<Vec<OperationResult>, SyncError>;
}

/// Posts batches to the server's `/api/sync` endpoint.
pub struct HttpSyncTransport {
    client: Client,
    endpoint: String,
    session_cookie: Option<String>,
    bearer_token: Option<String>,
}

impl HttpSyncTransport {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, SyncError> {
        Ok(Self {
            client: Client::builder().timeout(Duration::from_secs(30)).build()?,
            endpoint: endpoint.into(),
            session_cookie: None,
            bearer_token: None,
        })
    }

    /// Sends the given raw `Cookie` header value with every batch.
    pub fn with_session_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.session_cookie = Some(cookie.into());
        self
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }
}

#[async_trait]
impl SyncTransport for HttpSyncTransport {
    async fn push(&self, operations: &[OfflineOperation]) -> Result<Vec<OperationResult>, SyncError> {
        if operations.len() > MAX_SYNC_BATCH {
            return Err(SyncError::BatchTooLarge(operations.len()));
        }

        let body = SyncRequest {
            operations: operations.to_vec(),
        };
        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(cookie) = &self.session_cookie {
            request = request.header(COOKIE, cookie);
        }
        if let Some(token) = &self.bearer_token {
            request = request.header(AUTHORIZATION, format!("Bearer {token}"));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SyncError::Server {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: SyncResponse = response.json().await?;
        debug!(
            "Sync endpoint returned {} results for {} operations",
            parsed.results.len(),
            operations.len()
        );
        Ok(parsed.results)
    }
}
