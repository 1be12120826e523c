//! Transport abstraction over the messaging bridge

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Inbound, Request};

/// The seam between the harvest engine and the messaging client.
///
/// Implementations deliver outbound requests tagged with a caller-chosen
/// correlation id and surface inbound events one at a time. The engine is
/// strictly sequential: it never has more than one tracked request
/// outstanding, and it polls from a single task, so implementations take
/// `&mut self` and need no internal locking.
#[async_trait]
pub trait Transport: Send {
    /// Send a request tagged with `request_id`.
    async fn send(&mut self, request_id: u64, request: Request) -> Result<()>;

    /// Wait up to `timeout` for the next inbound event.
    ///
    /// `Ok(None)` means the wait elapsed without an event; the caller polls
    /// again. An error here is fatal to the run.
    async fn poll(&mut self, timeout: Duration) -> Result<Option<Inbound>>;
}
