//! Transport for sync requests
//!
//! `SyncTransport` is the seam between the controller and the network. The
//! HTTP implementation posts the request as JSON and returns the body text.

use anyhow::Result;
use futures::future::{BoxFuture, FutureExt};
use reqwest::Client;
use url::Url;

use super::protocol::{SyncRequest, SyncResponse};
use crate::config::Config;
use crate::error::{with_retry, RetryPolicy, SyncFailure};

pub trait SyncTransport: Send + Sync {
    /// Deliver one request and wait for its response
    fn send(&self, request: SyncRequest) -> BoxFuture<'_, Result<SyncResponse, SyncFailure>>;
}

/// Posts sync requests to an HTTP endpoint
pub struct HttpTransport {
    client: Client,
    endpoint: Url,
    retry: RetryPolicy,
}

impl HttpTransport {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder().timeout(config.request_timeout()).build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            retry: config.retry_policy(),
        })
    }

    async fn post_once(&self, request: &SyncRequest) -> Result<SyncResponse, SyncFailure> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(SyncFailure::status(status, &body));
        }

        tracing::debug!(%status, bytes = body.len(), "sync response received");
        Ok(SyncResponse::new(body))
    }
}

impl SyncTransport for HttpTransport {
    fn send(&self, request: SyncRequest) -> BoxFuture<'_, Result<SyncResponse, SyncFailure>> {
        async move { with_retry(&self.retry, || self.post_once(&request)).await }.boxed()
    }
}
