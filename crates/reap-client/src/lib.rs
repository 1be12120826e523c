//! reap-client: wire model and transport abstraction for the messaging bridge
//!
//! The actual messaging client runs out of process behind a small bridge
//! daemon. This crate defines the typed requests, responses, and updates that
//! cross that boundary, the [`Transport`] trait the harvest engine drives,
//! and a reqwest-based implementation of it.

pub mod bridge;
pub mod error;
pub mod transport;
pub mod types;

pub use bridge::BridgeTransport;
pub use error::{Error, Result};
pub use transport::Transport;
pub use types::{ClientParams, Inbound, Message, MessageBody, Request, Response, Update};
