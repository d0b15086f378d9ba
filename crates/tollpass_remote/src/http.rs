//! Blocking HTTP client backed by `reqwest`.

use crate::error::TransportError;
use crate::jsonrpc::{HttpClient, HttpFailure};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;

/// An [`HttpClient`] over a pooled blocking `reqwest` client.
///
/// Must not be created or dropped inside an async context; the scheduler
/// runs sync cycles on blocking threads for that reason.
#[derive(Debug, Clone)]
pub struct BlockingHttpClient {
    client: Client,
}

impl BlockingHttpClient {
    /// Builds a client.
    ///
    /// # Errors
    ///
    /// Returns a connect error if the TLS backend cannot be initialized.
    pub fn new() -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(concat!("tollpass/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::connect(e.to_string()))?;
        Ok(Self { client })
    }
}

impl HttpClient for BlockingHttpClient {
    fn post(&self, url: &str, body: Vec<u8>, timeout: Duration) -> Result<Vec<u8>, HttpFailure> {
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .timeout(timeout)
            .body(body)
            .send()
            .map_err(classify)?;

        let status = response.status();
        let bytes = response.bytes().map_err(classify)?;

        if !status.is_success() {
            return Err(HttpFailure::Status {
                code: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }

        Ok(bytes.to_vec())
    }
}

fn classify(err: reqwest::Error) -> HttpFailure {
    if err.is_timeout() {
        HttpFailure::Timeout(err.to_string())
    } else {
        HttpFailure::Connect(err.to_string())
    }
}
