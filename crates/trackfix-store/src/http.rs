#![forbid(unsafe_code)]

//! HTTP client for the remote persistence endpoint.

use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;

use crate::error::{Result, StoreError};
use crate::request::StoreRequest;
use crate::service::PersistenceService;

/// Settings for [`HttpStore`].
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Full URL of the endpoint script.
    pub endpoint: String,
    pub connect_timeout: Duration,
    pub timeout: Duration,
    /// Attempts for idempotent requests on transient failures.
    pub max_attempts: u32,
}

impl HttpSettings {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            connect_timeout: Duration::from_secs(2),
            timeout: Duration::from_secs(30),
            max_attempts: 3,
        }
    }
}

/// Form-POST client.
#[derive(Debug)]
pub struct HttpStore {
    client: Client,
    settings: HttpSettings,
}

impl HttpStore {
    pub fn new(settings: HttpSettings) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.timeout)
            .build()?;
        Ok(Self { client, settings })
    }

    pub fn endpoint(&self) -> &str {
        &self.settings.endpoint
    }

    fn send_once(&self, request: &StoreRequest) -> Result<String> {
        let response = self
            .client
            .post(&self.settings.endpoint)
            .form(&request.form_fields())
            .send()?
            .error_for_status()?;
        Ok(response.text()?)
    }
}

/// Requests that are safe to repeat.
fn is_idempotent(request: &StoreRequest) -> bool {
    matches!(
        request,
        StoreRequest::GetFiles
            | StoreRequest::ReadTextFile { .. }
            | StoreRequest::WriteFile { .. }
            | StoreRequest::Query { .. }
            | StoreRequest::ParametrizedQuery { .. }
    )
}

impl PersistenceService for HttpStore {
    fn send(&self, request: &StoreRequest) -> Result<String> {
        let max_attempts = if is_idempotent(request) {
            self.settings.max_attempts.max(1)
        } else {
            1
        };
        let mut attempt = 0_u32;
        loop {
            attempt = attempt.saturating_add(1);
            match self.send_once(request) {
                Ok(text) => return Ok(text),
                Err(error) => {
                    if attempt >= max_attempts || !error.is_transient() {
                        return Err(error);
                    }
                    let backoff_ms = 100_u64.saturating_mul(1_u64 << (attempt - 1));
                    tracing::debug!(
                        target: "trackfix.store",
                        request = %request.summary(),
                        attempt,
                        backoff_ms,
                        %error,
                        "retrying request"
                    );
                    thread::sleep(Duration::from_millis(backoff_ms));
                }
            }
        }
    }

    fn name(&self) -> &str {
        "http"
    }
}
