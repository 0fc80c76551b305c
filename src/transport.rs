use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use crate::error::TransportError;
use crate::types::DEFAULT_TIMEOUT;

/// One JSON POST to the annotate endpoint.
///
/// Implementations perform exactly one attempt; retrying is the client's
/// decision.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// POST `body` (UTF-8 JSON) to `url` and parse the response as JSON.
    async fn post(&self, url: &str, body: &[u8]) -> Result<Value, TransportError>;
}

/// [`Transport`] backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: Client,
    timeout: Duration,
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Self {
        Self {
            http: Client::new(),
            timeout,
        }
    }

    /// Use a custom `reqwest::Client` (for connection pooling, proxies, TLS).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn post(&self, url: &str, body: &[u8]) -> Result<Value, TransportError> {
        let safe_url = redact_key(url);
        tracing::debug!(url = %safe_url, bytes = body.len(), "POST annotate request");

        let resp = self
            .http
            .post(url)
            .timeout(self.timeout)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .body(body.to_vec())
            .send()
            .await
            .map_err(|e| classify(e, &safe_url))?;

        let status = resp.status();
        let bytes = resp.bytes().await.map_err(|e| classify(e, &safe_url))?;

        if !status.is_success() {
            tracing::debug!(
                url = %safe_url,
                status = status.as_u16(),
                body_len = bytes.len(),
                "Annotate endpoint returned an error status"
            );
            return Err(TransportError::Status {
                status: status.as_u16(),
                body: serde_json::from_slice(&bytes).ok(),
            });
        }

        serde_json::from_slice(&bytes).map_err(|e| TransportError::MalformedResponse(e.to_string()))
    }
}

fn classify(err: reqwest::Error, safe_url: &str) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout {
            url: safe_url.to_string(),
        }
    } else if err.is_connect() {
        TransportError::Connect {
            url: safe_url.to_string(),
            // reqwest's Display includes the full URL, key and all
            message: redact_key(&err.without_url().to_string()),
        }
    } else {
        TransportError::Request {
            retryable: err.is_request() || err.is_body(),
            message: redact_key(&err.without_url().to_string()),
        }
    }
}

/// Replace the value of any `key=` query parameter with `***`.
pub(crate) fn redact_key(url: &str) -> String {
    let mut out = String::with_capacity(url.len());
    let mut rest = url;
    while let Some(pos) = find_key_param(rest) {
        let (head, tail) = rest.split_at(pos + "key=".len());
        out.push_str(head);
        out.push_str("***");
        let end = tail.find(['&', ' ', ')']).unwrap_or(tail.len());
        rest = &tail[end..];
    }
    out.push_str(rest);
    out
}

fn find_key_param(s: &str) -> Option<usize> {
    ["?key=", "&key="]
        .iter()
        .filter_map(|p| s.find(p).map(|i| i + 1))
        .min()
}
