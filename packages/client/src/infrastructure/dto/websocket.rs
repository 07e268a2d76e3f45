//! WebSocket message DTOs.

use serde::{Deserialize, Serialize};

/// Message type tag carried in the `type` field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageType {
    #[serde(rename = "preview:leave")]
    PreviewLeave,
    #[serde(rename = "disconnect")]
    Disconnect,
}

/// Sent by the client when it stops previewing a boss
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewLeaveMessage {
    pub r#type: MessageType,
    pub boss_id: String,
    pub event_id: String,
    /// Unix timestamp (milliseconds)
    pub left_at: i64,
}

/// Minimal view of an inbound frame, used to detect lifecycle notices
#[derive(Debug, Clone, Deserialize)]
pub struct ServerNotice {
    pub r#type: String,
}

impl ServerNotice {
    /// Whether the text frame is the server's disconnect notice
    pub fn is_disconnect(text: &str) -> bool {
        serde_json::from_str::<ServerNotice>(text)
            .map(|notice| notice.r#type == "disconnect")
            .unwrap_or(false)
    }
}
