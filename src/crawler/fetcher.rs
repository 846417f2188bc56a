//! Resilient HTTP fetcher
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the HTTP client with the configured user agent and timeout
//! - Routing each attempt through the current gateway template
//! - Unwrapping JSON envelopes from gateways that wrap responses
//! - Classifying failures and retrying with linear backoff
//!
//! # Retry Logic
//!
//! | Condition | Action |
//! |-----------|--------|
//! | Timeout | Rotate gateway, back off, retry |
//! | Non-success status | Rotate gateway, back off, retry |
//! | Body shorter than 50 characters | Rotate gateway, back off, retry |
//! | Malformed JSON envelope | Rotate gateway, back off, retry |
//! | Connection error | Rotate gateway, back off, retry |
//! | Attempt budget spent | Fail with `Exhausted` |
//! | Session deactivated | Fail with `Cancelled` |

use crate::config::{CrawlerConfig, EnvelopeKind, UserAgentConfig};
use crate::crawler::gateway::{GatewayRotator, GatewayTemplate};
use crate::state::ActiveFlag;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Bodies with fewer characters than this are treated as empty
pub const MIN_BODY_LEN: usize = 50;

/// Failure of a single attempt or of a whole fetch
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Timeout")]
    Timeout,

    #[error("HTTP {status}")]
    Http { status: u16 },

    #[error("Empty/invalid response ({chars} characters)")]
    EmptyResponse { chars: usize },

    #[error("Malformed gateway envelope: {0}")]
    MalformedEnvelope(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Target unreachable after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },

    #[error("Fetch cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },
}

/// Body of a gateway that wraps the target's content
#[derive(Debug, Deserialize)]
struct Envelope {
    contents: Option<String>,
}

/// Retry tuning for the fetch client
#[derive(Debug, Clone, Copy)]
pub struct RetrySettings {
    /// Attempts per fetch, at least 1
    pub max_attempts: u32,

    /// Attempt n is followed by a pause of n times this value
    pub backoff_base: Duration,
}

impl RetrySettings {
    /// Pause after the `attempt`-th failed attempt (1-indexed)
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(attempt)
    }
}

impl From<&CrawlerConfig> for RetrySettings {
    fn from(config: &CrawlerConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            backoff_base: config.backoff_base(),
        }
    }
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The user agent configuration
/// * `timeout` - Total per-request timeout
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &UserAgentConfig, timeout: Duration) -> Result<Client, reqwest::Error> {
    // Format: CrawlerName/Version (+ContactURL; ContactEmail)
    let user_agent = format!(
        "{}/{} (+{}; {})",
        config.crawler_name, config.crawler_version, config.contact_url, config.contact_email
    );

    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetch client that retries through a rotating set of gateways
pub struct FetchClient {
    client: Client,
    rotator: GatewayRotator,
    retry: RetrySettings,
}

impl FetchClient {
    pub fn new(client: Client, rotator: GatewayRotator, retry: RetrySettings) -> Self {
        Self {
            client,
            rotator,
            retry,
        }
    }

    pub fn rotator(&self) -> &GatewayRotator {
        &self.rotator
    }

    pub fn retry_settings(&self) -> RetrySettings {
        self.retry
    }

    /// Label of the gateway the next attempt will use
    pub fn gateway_label(&self) -> String {
        self.rotator.name()
    }

    /// Fetches `target_url`, retrying through the gateways
    ///
    /// Stops early with `Cancelled` once `active` is switched off.
    pub async fn fetch(&self, target_url: &str, active: &ActiveFlag) -> Result<String, FetchError> {
        let max_attempts = self.retry.max_attempts;
        let mut attempts = 0;
        let mut last_error = None;

        while attempts < max_attempts && active.is_active() {
            if attempts == 0 {
                tracing::debug!("Requesting: {}", target_url);
            }

            let gateway = self.rotator.current().clone();
            match self.attempt(&gateway, target_url).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    attempts += 1;
                    let label = self.rotator.name();
                    self.rotator.advance();

                    if attempts == max_attempts {
                        tracing::error!(
                            "Attempt {}/{} failed for {}: {} [{}]",
                            attempts,
                            max_attempts,
                            target_url,
                            e,
                            label
                        );
                    } else {
                        tracing::warn!(
                            "Attempt {}/{} failed for {}: {} [{}]",
                            attempts,
                            max_attempts,
                            target_url,
                            e,
                            label
                        );
                        tokio::time::sleep(self.retry.backoff_delay(attempts)).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if attempts == max_attempts => Err(FetchError::Exhausted {
                attempts,
                last_error: e.to_string(),
            }),
            _ => Err(FetchError::Cancelled { attempts }),
        }
    }

    /// Performs one request through `gateway`
    async fn attempt(&self, gateway: &GatewayTemplate, target_url: &str) -> Result<String, FetchError> {
        let request_url = gateway.apply(target_url);

        let response = self
            .client
            .get(&request_url)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(classify_reqwest_error)?;
        let content = unwrap_envelope(gateway.envelope(), body)?;

        let chars = content.chars().count();
        if chars < MIN_BODY_LEN {
            return Err(FetchError::EmptyResponse { chars });
        }

        Ok(content)
    }
}

/// Extracts the target's content from a gateway response body
pub fn unwrap_envelope(kind: EnvelopeKind, body: String) -> Result<String, FetchError> {
    match kind {
        EnvelopeKind::Raw => Ok(body),
        EnvelopeKind::JsonContents => {
            let envelope: Envelope = serde_json::from_str(&body)
                .map_err(|e| FetchError::MalformedEnvelope(e.to_string()))?;
            Ok(envelope.contents.unwrap_or_default())
        }
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Network(e.to_string())
    }
}
