//! HTTP transport: POST the reading as JSON to the kernel's ingest URL

use anyhow::{Context, Result};
use std::future::Future;
use std::time::Duration;

use super::{DeliveryError, Transport};
use crate::reading::Reading;

pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>, api_key: Option<String>, attempt_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(attempt_timeout)
            .user_agent(concat!("sensorwatch-agent/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client, url: url.into(), api_key })
    }
}

impl From<reqwest::Error> for DeliveryError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            DeliveryError::Timeout
        } else if let Some(status) = e.status() {
            DeliveryError::Status(status.as_u16())
        } else if e.is_connect() || e.is_request() || e.is_body() || e.is_decode() {
            DeliveryError::Transport(e.to_string())
        } else {
            DeliveryError::Unexpected(e.to_string())
        }
    }
}

impl Transport for HttpTransport {
    fn send(&self, reading: &Reading) -> impl Future<Output = Result<(), DeliveryError>> + Send {
        let mut request = self.client.post(&self.url).json(reading);
        if let Some(key) = &self.api_key {
            request = request.header("x-api-key", key);
        }

        async move {
            request.send().await?.error_for_status()?;
            Ok(())
        }
    }
}
