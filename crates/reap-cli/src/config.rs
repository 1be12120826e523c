//! Configuration file support

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use reap_client::ClientParams;
use reap_engine::HarvestConfig;

/// Optional config file layered between built-in defaults and CLI flags
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub token_change_sender: Option<String>,
    pub token_media: Option<String>,
    pub token_author: Option<String>,
    pub token_message_begin: Option<String>,
    pub token_message_end: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub messages_per_request: Option<i32>,
    pub per_chat_buffer_size: Option<usize>,
    pub reverse_chat_order: Option<bool>,
    pub bridge_url: Option<String>,
    #[serde(default)]
    pub client: ClientSection,
}

/// Parameters forwarded to the messaging client library
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSection {
    pub database_dir: Option<String>,
    pub api_id: Option<i32>,
    pub api_hash: Option<String>,
    pub system_language_code: Option<String>,
    pub device_model: Option<String>,
}

impl FileConfig {
    /// Get the config directory
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("reap")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        // Check for REAP_CONFIG_PATH env var first
        if let Ok(path) = std::env::var("REAP_CONFIG_PATH") {
            return PathBuf::from(path);
        }
        Self::config_dir().join("config.toml")
    }

    /// Load the config file from the default location, if present. A file
    /// that fails to parse is reported and ignored.
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: Failed to read config file: {}", e);
                Self::default()
            }
        }
    }

    /// Load a config file from an explicit path; errors are the caller's.
    pub fn load_from(path: &Path) -> io::Result<Self> {
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(io::Error::other)
    }

    /// Create a default config file if it doesn't exist
    pub fn init() -> io::Result<PathBuf> {
        let path = Self::config_path();
        if path.exists() {
            return Ok(path);
        }

        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(&path, example_config())?;
        Ok(path)
    }

    /// Apply the file layer over the built-in defaults.
    pub fn to_harvest_config(&self) -> HarvestConfig {
        let mut config = HarvestConfig::default();
        let markers = &mut config.markers;
        if let Some(v) = &self.token_change_sender {
            markers.change_sender = v.clone();
        }
        if let Some(v) = &self.token_media {
            markers.media = v.clone();
        }
        if let Some(v) = &self.token_author {
            markers.author = v.clone();
        }
        if let Some(v) = &self.token_message_begin {
            markers.message_begin = v.clone();
        }
        if let Some(v) = &self.token_message_end {
            markers.message_end = v.clone();
        }
        if let Some(v) = &self.output_dir {
            config.output_dir = v.clone();
        }
        if let Some(v) = self.messages_per_request {
            config.messages_per_request = v;
        }
        if let Some(v) = self.per_chat_buffer_size {
            config.per_chat_buffer_size = v;
        }
        if let Some(v) = self.reverse_chat_order {
            config.reverse_chat_order = v;
        }
        config.client_params = self.client_params();
        config
    }

    /// Resolve the client-library parameters, falling back to environment
    /// variables for the application credentials.
    pub fn client_params(&self) -> ClientParams {
        let mut params = ClientParams::default();
        let section = &self.client;
        if let Some(v) = &section.database_dir {
            params.database_dir = v.clone();
        }
        if let Some(v) = &section.system_language_code {
            params.system_language_code = v.clone();
        }
        if let Some(v) = &section.device_model {
            params.device_model = v.clone();
        }
        params.api_id = section.api_id.unwrap_or_else(|| {
            std::env::var("REAP_API_ID")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0)
        });
        params.api_hash = section.api_hash.clone().unwrap_or_else(|| {
            std::env::var("REAP_API_HASH").unwrap_or_default()
        });
        params
    }
}

/// Generate example config content
pub fn example_config() -> &'static str {
    r#"# reap configuration file
# Place at ~/.config/reap/config.toml (Linux/Mac) or %APPDATA%\reap\config.toml (Windows)

# Output markers
# token_change_sender = "<|cs|>"
# token_media = "<|media|>"
# token_author = "<|--me--|>"
# token_message_begin = "<|m|>"
# token_message_end = "<|--m|>"

# Output directory (recreated destructively at run start)
# output_dir = "out"

# Messages fetched per history request
# messages_per_request = 100

# Writer capacity in messages per conversation
# per_chat_buffer_size = 33554432

# Emit messages oldest-to-newest (pages arrive newest-to-oldest)
# reverse_chat_order = true

# Base URL of the messaging bridge daemon
# bridge_url = "http://127.0.0.1:8014"

# Client-library parameters. Application credentials can also come from the
# REAP_API_ID / REAP_API_HASH environment variables.
[client]
# database_dir = "reapdb"
# api_id = 0
# api_hash = ""
# system_language_code = "en"
# device_model = "Desktop"
"#
}
