//! HTTP client for the messaging bridge daemon

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::transport::Transport;
use crate::types::{Inbound, Request};

/// Transport implementation over the local bridge daemon's JSON interface.
///
/// The bridge embeds the actual messaging client library and exposes two
/// endpoints: `POST /send` accepts a correlation-tagged request, and
/// `POST /poll` blocks up to the given timeout for the next inbound event,
/// answering `null` when none arrived.
pub struct BridgeTransport {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct SendBody<'a> {
    request_id: u64,
    request: &'a Request,
}

#[derive(Serialize)]
struct PollBody {
    timeout_ms: u64,
}

impl BridgeTransport {
    /// Create a transport for a bridge at `base_url`, e.g. `http://127.0.0.1:8014`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint)
    }
}

#[async_trait]
impl Transport for BridgeTransport {
    async fn send(&mut self, request_id: u64, request: Request) -> Result<()> {
        let url = self.url("send");
        tracing::trace!(request_id, kind = request.kind(), "sending request");

        let response = self
            .client
            .post(&url)
            .json(&SendBody {
                request_id,
                request: &request,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                code: status.as_u16(),
            });
        }
        Ok(())
    }

    async fn poll(&mut self, timeout: Duration) -> Result<Option<Inbound>> {
        let url = self.url("poll");
        let response = self
            .client
            .post(&url)
            .json(&PollBody {
                timeout_ms: timeout.as_millis() as u64,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                code: status.as_u16(),
            });
        }

        let body = response.text().await?;
        let inbound: Option<Inbound> = serde_json::from_str(&body)?;
        Ok(inbound)
    }
}
