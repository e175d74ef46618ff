//! Remote device access over HTTP
//!
//! Filters built for a device other than the local one are deployed and run
//! through the build server:
//! - `POST {server}/deploy?device=..&signature=..&target=..` answers with a
//!   describe result
//! - `POST {server}/run?device=..&num_threads=..` with body `{"inputs": ..}`
//!   answers with a run result
//!
//! Both results use the same `success`/`failure`/`log` shape as module
//! responses.

use async_trait::async_trait;
use safelight_common::argument::json_truthy;
use safelight_common::{Error, Result};
use serde_json::json;
use std::time::Duration;
use tracing::{debug, warn};

use crate::transport::{ModuleReply, TransportError, TransportResult};

/// A compute device reachable outside this process
#[async_trait]
pub trait RemoteDevice: Send + Sync {
    /// Deploy a build to `device` and return its description
    async fn deploy(&self, device: &str, signature: &str, target: &str) -> TransportResult;

    /// Run the filter deployed on `device`
    async fn run(&self, device: &str, num_threads: u32, inputs: serde_json::Value)
        -> TransportResult;
}

/// [`RemoteDevice`] backed by the build server's HTTP endpoints
#[derive(Debug, Clone)]
pub struct HttpRemoteDevice {
    client: reqwest::Client,
    server_url: String,
}

impl HttpRemoteDevice {
    pub fn new(server_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            server_url: server_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.server_url, path)
    }
}

#[async_trait]
impl RemoteDevice for HttpRemoteDevice {
    async fn deploy(&self, device: &str, signature: &str, target: &str) -> TransportResult {
        debug!(device, signature, target, "Deploying to remote device");
        let response = self
            .client
            .post(self.endpoint("deploy"))
            .query(&[("device", device), ("signature", signature), ("target", target)])
            .send()
            .await
            .map_err(http_failure)?;
        interpret(response).await
    }

    async fn run(
        &self,
        device: &str,
        num_threads: u32,
        inputs: serde_json::Value,
    ) -> TransportResult {
        debug!(device, num_threads, "Running on remote device");
        let response = self
            .client
            .post(self.endpoint("run"))
            .query(&[("device", device.to_string()), ("num_threads", num_threads.to_string())])
            .json(&json!({ "inputs": inputs }))
            .send()
            .await
            .map_err(http_failure)?;
        interpret(response).await
    }
}

fn http_failure(e: reqwest::Error) -> TransportError {
    warn!("Remote device request failed: {}", e);
    TransportError::Rejected {
        failure: format!("HTTP error: {}", e),
        log: String::new(),
    }
}

async fn interpret(response: reqwest::Response) -> TransportResult {
    let status = response.status();
    let text = response.text().await.map_err(http_failure)?;
    let body = serde_json::from_str::<serde_json::Value>(&text).ok();

    if !status.is_success() {
        let failure = body
            .as_ref()
            .and_then(|b| b.get("failure"))
            .and_then(|f| f.as_str())
            .map(str::to_string)
            .unwrap_or(text);
        debug!(%status, "Remote device rejected request: {}", failure);
        return Err(TransportError::Rejected {
            failure,
            log: String::new(),
        });
    }

    match body {
        Some(body) => reply_from_body(&body),
        None => Err(TransportError::Rejected {
            failure: format!("Remote device returned a non-JSON body: {}", text),
            log: String::new(),
        }),
    }
}

/// Read a `{success, failure, log}` body
pub fn reply_from_body(body: &serde_json::Value) -> TransportResult {
    let log = body
        .get("log")
        .and_then(|l| l.as_str())
        .unwrap_or_default()
        .to_string();
    match body.get("success").filter(|s| json_truthy(s)) {
        Some(success) => Ok(ModuleReply {
            success: success.clone(),
            log,
        }),
        None => Err(TransportError::Rejected {
            failure: body
                .get("failure")
                .and_then(|f| f.as_str())
                .unwrap_or_default()
                .to_string(),
            log,
        }),
    }
}
