//! reap-engine: the harvest pipeline core
//!
//! Drives an event-driven messaging client (behind the reap-client
//! [`Transport`](reap_client::Transport) seam) through authorization,
//! conversation enumeration, and backward pagination, and serializes every
//! conversation into a token-delimited text file through a bounded,
//! auto-flushing writer.

pub mod config;
pub mod error;
pub mod harvester;
pub mod pending;
pub mod prompt;
pub mod writer;

pub use config::{HarvestConfig, Markers};
pub use error::{Error, Result};
pub use harvester::{HarvestSummary, Harvester};
pub use pending::{Handler, Pending, PendingTable};
pub use prompt::CredentialPrompt;
pub use writer::ChatWriter;
