//! Conversion logic between DTOs and domain types.

use crate::domain::OutboundMessage;
use crate::infrastructure::dto::websocket as dto;

impl From<OutboundMessage> for dto::PreviewLeaveMessage {
    fn from(message: OutboundMessage) -> Self {
        match message {
            OutboundMessage::PreviewLeave {
                boss_id,
                event_id,
                left_at,
            } => Self {
                r#type: dto::MessageType::PreviewLeave,
                boss_id: boss_id.into_string(),
                event_id: event_id.into_string(),
                left_at,
            },
        }
    }
}
