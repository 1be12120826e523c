//! Harvest configuration

use std::path::PathBuf;

use reap_client::ClientParams;

use crate::error::{Error, Result};

/// Marker strings woven into the output files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markers {
    /// Emitted when the sender differs from the previously rendered message
    pub change_sender: String,
    /// Stands in for any non-text message body
    pub media: String,
    /// Prefixes messages authored by the harvesting account itself
    pub author: String,
    /// Opens every message
    pub message_begin: String,
    /// Closes every message
    pub message_end: String,
}

impl Default for Markers {
    fn default() -> Self {
        Self {
            change_sender: "<|cs|>".to_string(),
            media: "<|media|>".to_string(),
            author: "<|--me--|>".to_string(),
            message_begin: "<|m|>".to_string(),
            message_end: "<|--m|>".to_string(),
        }
    }
}

/// Immutable configuration for one harvest run.
///
/// Built once at startup and passed by reference to every component; nothing
/// mutates it afterwards.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Output markers
    pub markers: Markers,
    /// Output directory, recreated destructively at listing time
    pub output_dir: PathBuf,
    /// Page size for history requests
    pub messages_per_request: i32,
    /// Writer capacity in messages per conversation
    pub per_chat_buffer_size: usize,
    /// Emit each flushed batch oldest-to-newest (pages arrive newest-to-oldest)
    pub reverse_chat_order: bool,
    /// Parameters handed to the client library during bootstrap
    pub client_params: ClientParams,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            markers: Markers::default(),
            output_dir: PathBuf::from("out"),
            messages_per_request: 100,
            per_chat_buffer_size: 33_554_432,
            reverse_chat_order: true,
            client_params: ClientParams::default(),
        }
    }
}

impl HarvestConfig {
    /// Reject values the pipeline cannot run with. Called before any
    /// transport interaction happens.
    pub fn validate(&self) -> Result<()> {
        if self.messages_per_request < 1 {
            return Err(Error::Config(format!(
                "messages-per-request must be a positive integer, got {}",
                self.messages_per_request
            )));
        }
        if self.per_chat_buffer_size < 1 {
            return Err(Error::Config(format!(
                "per-chat-buffer-size must be a positive integer, got {}",
                self.per_chat_buffer_size
            )));
        }
        Ok(())
    }
}
