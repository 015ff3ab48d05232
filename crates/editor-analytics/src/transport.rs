//! Hit delivery to the collection endpoint
//!
//! Delivery never fails from the caller's point of view. Network errors trip
//! the session latch, server rejections are only logged.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::gate::FailureLatch;
use crate::providers::Logger;

/// Collection host
pub const COLLECTION_HOST: &str = "https://www.google-analytics.com";

/// Which collector path hits are posted to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Normal collection
    Collect,
    /// Validation path; the collector reports whether each hit parsed
    Validate,
}

impl Endpoint {
    pub fn for_debug(debug: bool) -> Self {
        if debug {
            Endpoint::Validate
        } else {
            Endpoint::Collect
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Collect => "/collect",
            Endpoint::Validate => "/debug/collect",
        }
    }

    pub fn url(&self) -> String {
        format!("{}{}", COLLECTION_HOST, self.path())
    }
}

/// The request never produced an HTTP response
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// HTTP response from the collector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HitResponse {
    pub status: u16,
    pub reason: Option<String>,
    pub body: String,
}

impl HitResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs the actual POST
#[async_trait]
pub trait HitSender: Send + Sync {
    async fn post(&self, endpoint: Endpoint, body: String) -> Result<HitResponse, TransportError>;
}

/// `reqwest`-backed sender
pub struct HttpSender {
    client: Client,
    host: String,
}

impl HttpSender {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self::with_client(client, COLLECTION_HOST)
    }

    /// Post to `host` with a preconfigured client
    pub fn with_client(client: Client, host: impl Into<String>) -> Self {
        Self {
            client,
            host: host.into(),
        }
    }
}

impl Default for HttpSender {
    fn default() -> Self {
        Self::new(Duration::from_secs(10))
    }
}

#[async_trait]
impl HitSender for HttpSender {
    async fn post(&self, endpoint: Endpoint, body: String) -> Result<HitResponse, TransportError> {
        let response = self
            .client
            .post(format!("{}{}", self.host, endpoint.path()))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|e| TransportError(e.to_string()))?;

        let status = response.status();
        // Status already received; an unreadable body counts as empty
        let body = response.text().await.unwrap_or_default();

        Ok(HitResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().map(str::to_string),
            body,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValidationResponse {
    #[serde(default)]
    hit_parsing_result: Vec<HitParsingResult>,
}

#[derive(Debug, Deserialize)]
struct HitParsingResult {
    valid: Option<bool>,
}

/// Posts encoded hits and contains every failure
pub struct Transport {
    sender: Arc<dyn HitSender>,
    endpoint: Endpoint,
    latch: FailureLatch,
    logger: Arc<dyn Logger>,
}

impl Transport {
    pub fn new(
        sender: Arc<dyn HitSender>,
        endpoint: Endpoint,
        latch: FailureLatch,
        logger: Arc<dyn Logger>,
    ) -> Self {
        Self {
            sender,
            endpoint,
            latch,
            logger,
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        self.endpoint
    }

    /// Send one encoded hit. Always completes.
    pub async fn deliver(&self, body: String) {
        match self.sender.post(self.endpoint, body).await {
            Ok(response) => {
                if self.endpoint == Endpoint::Validate {
                    self.check_validation(&response.body);
                }

                if !response.is_success() {
                    self.logger.info(&format!(
                        "Failed to send analytics {}: {}",
                        response.status,
                        response.reason.as_deref().unwrap_or("")
                    ));
                }
            }
            Err(e) => {
                self.latch.trip();
                self.logger.info(&format!(
                    "Failed to send analytics, disabling for session: {}",
                    e
                ));
            }
        }
    }

    fn check_validation(&self, body: &str) {
        match serde_json::from_str::<ValidationResponse>(body) {
            Ok(parsed) => match parsed.hit_parsing_result.first().and_then(|r| r.valid) {
                Some(true) => self.logger.info("Sent OK!"),
                Some(false) => self.logger.warn(body),
                None => self
                    .logger
                    .warn(&format!("Unexpected validation response: {}", body)),
            },
            Err(_) => self
                .logger
                .warn(&format!("Error in validation response: {}", body)),
        }
    }
}
