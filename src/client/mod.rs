//! Scraper server client split into focused submodules.
//!
//! The `ScraperClient` struct and its methods are organized by domain:
//! - [`tasks`] - Save, run, test, create and delete tasks
//! - [`status`] - Task status reads and completion polling
//! - [`export`] - Bulk export sessions and spreadsheet downloads
//! - [`console`] - Developer console commands

mod console;
mod export;
mod status;
mod tasks;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use crate::config::Config;
use crate::endpoints::{Action, EndpointRequest, Endpoints};
use crate::error::{Error, Result, TransportError};
use crate::types::{Event, TaskName};
use reqwest::Method;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Longest response body kept in a [`TransportError::Status`]
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Client for one scraper server (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct ScraperClient {
    /// HTTP client with the configured timeout and user agent
    pub(crate) http: reqwest::Client,
    /// Resolved endpoint table
    pub(crate) endpoints: Endpoints,
    /// Configuration (wrapped in Arc for sharing across sessions)
    pub(crate) config: Arc<Config>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
}

impl ScraperClient {
    /// Create a client for the server described by `config`
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let endpoints = Endpoints::new(&config)?;

        let http = reqwest::Client::builder()
            .timeout(config.http.request_timeout)
            .user_agent(config.http.user_agent.clone())
            .build()
            .map_err(Error::Network)?;

        let (event_tx, _rx) = broadcast::channel(256);

        Ok(Self {
            http,
            endpoints,
            config: Arc::new(config),
            event_tx,
        })
    }

    /// Subscribe to client events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Resolved endpoint table
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub(crate) fn emit(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    pub(crate) fn request(
        &self,
        action: Action,
        task: Option<&TaskName>,
    ) -> std::result::Result<EndpointRequest, TransportError> {
        self.endpoints
            .resolve(action, task)
            .map_err(|e| TransportError::InvalidRequest {
                endpoint: action.to_string(),
                reason: e.to_string(),
            })
    }

    /// Send a request and fail on any non-success status
    pub(crate) async fn send(
        &self,
        request: EndpointRequest,
    ) -> std::result::Result<reqwest::Response, TransportError> {
        let endpoint = request.endpoint();
        debug!(method = %request.method, endpoint = %endpoint, "sending request");

        let mut builder = self.http.request(request.method.clone(), request.url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if request.method != Method::GET {
            builder = builder.form(&request.form);
        }
        if let Some(token) = &self.config.http.auth_token {
            builder = builder.header(self.config.auth_header(), token);
            if let Some(cookie) = self.config.token_cookie() {
                builder = builder.header(reqwest::header::COOKIE, format!("{}={}", cookie, token));
            }
        }

        let response = builder
            .send()
            .await
            .map_err(|source| TransportError::Request {
                endpoint: endpoint.clone(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(endpoint = %endpoint, status = status.as_u16(), "request failed");
            return Err(TransportError::Status {
                endpoint,
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        Ok(response)
    }

    /// Send a request and decode its JSON body
    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        request: EndpointRequest,
    ) -> std::result::Result<T, TransportError> {
        let endpoint = request.endpoint();
        let response = self.send(request).await?;
        let body = response
            .bytes()
            .await
            .map_err(|source| TransportError::Request {
                endpoint: endpoint.clone(),
                source,
            })?;

        serde_json::from_slice(&body).map_err(|e| TransportError::Malformed {
            endpoint,
            reason: e.to_string(),
        })
    }

    /// Send a request whose body carries nothing but an acknowledgement
    pub(crate) async fn send_ack(
        &self,
        request: EndpointRequest,
    ) -> std::result::Result<(), TransportError> {
        self.send(request).await?;
        Ok(())
    }
}

impl std::fmt::Debug for ScraperClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScraperClient")
            .field("base_url", &self.config.base_url)
            .field("endpoint_style", &self.endpoints.style())
            .finish_non_exhaustive()
    }
}
