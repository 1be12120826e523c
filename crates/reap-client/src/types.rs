//! Typed wire model for the messaging bridge

use serde::{Deserialize, Serialize};

/// Client-library parameters submitted once during bootstrap, when the
/// remote side reports it is waiting for them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientParams {
    /// Directory for the client library's local database
    pub database_dir: String,
    /// Keep a local message database
    pub use_message_database: bool,
    /// Enable secret chat support
    pub use_secret_chats: bool,
    /// Application identifier issued by the messaging service
    pub api_id: i32,
    /// Application hash issued by the messaging service
    pub api_hash: String,
    /// ISO language code reported to the service
    pub system_language_code: String,
    /// Device model reported to the service
    pub device_model: String,
    /// Application version reported to the service
    pub application_version: String,
    /// Let the client library optimize local storage
    pub enable_storage_optimizer: bool,
}

impl Default for ClientParams {
    fn default() -> Self {
        Self {
            database_dir: "reapdb".to_string(),
            use_message_database: true,
            use_secret_chats: true,
            api_id: 0,
            api_hash: String::new(),
            system_language_code: "en".to_string(),
            device_model: "Desktop".to_string(),
            application_version: env!("CARGO_PKG_VERSION").to_string(),
            enable_storage_optimizer: true,
        }
    }
}

/// Outbound requests, tagged with a caller-chosen correlation id at send time
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Set the client library's log verbosity
    SetVerbosity { level: i32 },

    /// Fire-and-forget query that wakes the client and starts the flow of
    /// authorization updates
    Probe,

    /// Submit the client-library parameters
    SetClientParams { params: ClientParams },

    /// Submit the account phone number
    SubmitPhone { phone: String },

    /// Submit the login code sent to the account
    SubmitCode { code: String },

    /// Submit the two-step-verification password
    SubmitPassword { password: String },

    /// Resolve the authorized account's own identity
    GetSelf,

    /// List every conversation id known to the account
    ListConversations { limit: i32 },

    /// Fetch one page of a conversation's history, strictly older than
    /// `from_message_id` (0 = start from the newest message)
    GetHistory {
        conversation_id: i64,
        from_message_id: i64,
        limit: i32,
    },
}

impl Request {
    /// Short name of the request kind, for log lines
    pub fn kind(&self) -> &'static str {
        match self {
            Request::SetVerbosity { .. } => "set_verbosity",
            Request::Probe => "probe",
            Request::SetClientParams { .. } => "set_client_params",
            Request::SubmitPhone { .. } => "submit_phone",
            Request::SubmitCode { .. } => "submit_code",
            Request::SubmitPassword { .. } => "submit_password",
            Request::GetSelf => "get_self",
            Request::ListConversations { .. } => "list_conversations",
            Request::GetHistory { .. } => "get_history",
        }
    }
}

/// Correlated responses to tracked requests
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// The authorized account's identity
    SelfInfo { user_id: i64 },

    /// All conversation ids, possibly with duplicates and in service order
    Conversations { ids: Vec<i64> },

    /// One page of history, newest to oldest; empty means exhausted
    Messages { messages: Vec<Message> },

    /// The request failed on the remote side
    Error { code: i32, message: String },
}

/// Unsolicited state updates delivered outside the correlation channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Update {
    /// The client library is waiting for its parameters
    AuthWaitParams,
    /// Authorization needs the account phone number
    AuthWaitPhone,
    /// Authorization needs the login code
    AuthWaitCode,
    /// Authorization needs the two-step-verification password
    AuthWaitPassword,
    /// The session is authorized and ready for requests
    AuthReady,
    /// The session was closed by the remote side
    AuthClosed,
    /// Any other update; ignored by the harvest engine
    #[serde(other)]
    Other,
}

/// One inbound event from the bridge: either an unsolicited update or a
/// response correlated to an outstanding request id
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Inbound {
    Update { update: Update },
    Response { request_id: u64, response: Response },
}

/// A single message as delivered by the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    /// 0 when the sender is not an individual user (channels, service posts)
    #[serde(default)]
    pub sender_id: i64,
    pub body: MessageBody,
}

/// Message payload; anything that is not plain text is treated as media
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageBody {
    Text { text: String },
    Media,
}

impl Message {
    /// Convenience constructor for a text message
    pub fn text(id: i64, sender_id: i64, text: impl Into<String>) -> Self {
        Self {
            id,
            sender_id,
            body: MessageBody::Text { text: text.into() },
        }
    }

    /// Convenience constructor for a non-text message
    pub fn media(id: i64, sender_id: i64) -> Self {
        Self {
            id,
            sender_id,
            body: MessageBody::Media,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbound_update_round_trip() {
        let json = r#"{"type":"update","update":{"type":"auth_wait_phone"}}"#;
        let inbound: Inbound = serde_json::from_str(json).unwrap();
        match inbound {
            Inbound::Update { update } => assert_eq!(update, Update::AuthWaitPhone),
            other => panic!("expected update, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_update_maps_to_other() {
        let json = r#"{"type":"update","update":{"type":"connection_state_changed"}}"#;
        let inbound: Inbound = serde_json::from_str(json).unwrap();
        match inbound {
            Inbound::Update { update } => assert_eq!(update, Update::Other),
            other => panic!("expected update, got {:?}", other),
        }
    }

    #[test]
    fn test_inbound_response_round_trip() {
        let json = r#"{
            "type": "response",
            "request_id": 3,
            "response": {
                "type": "messages",
                "messages": [
                    {"id": 5, "sender_id": 1, "body": {"type": "text", "text": "hi"}},
                    {"id": 4, "body": {"type": "media"}}
                ]
            }
        }"#;
        let inbound: Inbound = serde_json::from_str(json).unwrap();
        match inbound {
            Inbound::Response {
                request_id,
                response: Response::Messages { messages },
            } => {
                assert_eq!(request_id, 3);
                assert_eq!(messages[0], Message::text(5, 1, "hi"));
                // sender_id defaults to 0 when absent
                assert_eq!(messages[1], Message::media(4, 0));
            }
            other => panic!("expected messages response, got {:?}", other),
        }
    }

    #[test]
    fn test_request_serializes_with_snake_case_tag() {
        let request = Request::GetHistory {
            conversation_id: 42,
            from_message_id: 0,
            limit: 100,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["type"], "get_history");
        assert_eq!(value["conversation_id"], 42);
        assert_eq!(request.kind(), "get_history");
    }

    #[test]
    fn test_error_response_shape() {
        let json = r#"{"type":"error","code":420,"message":"FLOOD_WAIT"}"#;
        let response: Response = serde_json::from_str(json).unwrap();
        match response {
            Response::Error { code, message } => {
                assert_eq!(code, 420);
                assert_eq!(message, "FLOOD_WAIT");
            }
            other => panic!("expected error, got {:?}", other),
        }
    }
}
