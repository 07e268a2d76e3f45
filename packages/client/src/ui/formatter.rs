//! Output formatting for the interactive session.

use bossbattle_shared::time::timestamp_to_rfc3339;

use crate::{
    domain::{BossId, ConnectionStatus, IdentityToken, JoinError, JoinRecord, PreviewTarget},
    usecase::StatusChange,
};

/// Output formatter for client display
pub struct OutputFormatter;

impl OutputFormatter {
    /// Describe the current join record
    pub fn format_join_record(record: Option<&JoinRecord>) -> String {
        match record {
            Some(record) => format!("joined {}", record),
            None => "not joined".to_string(),
        }
    }

    /// Format the result of an unconditional join
    pub fn format_joined(record: &JoinRecord) -> String {
        format!("Joined {}\n", record)
    }

    pub fn format_join_rejected(error: &JoinError) -> String {
        format!("Join rejected: {}\n", error)
    }

    pub fn format_left(previous: Option<&JoinRecord>) -> String {
        match previous {
            Some(record) => format!("Left {}\n", record),
            None => "Not joined; nothing to leave\n".to_string(),
        }
    }

    pub fn format_can_join(boss_id: &BossId, allowed: bool) -> String {
        if allowed {
            format!("You can join boss '{}'\n", boss_id)
        } else {
            format!(
                "You cannot join boss '{}' while joined to another boss\n",
                boss_id
            )
        }
    }

    /// Format a join state change observed while idle at the prompt
    pub fn format_join_changed(record: Option<&JoinRecord>) -> String {
        format!(
            "\n* join state: {}\n",
            Self::format_join_record(record)
        )
    }

    /// Format a realtime status transition
    ///
    /// # Arguments
    ///
    /// * `change` - The transition, with the time it happened (milliseconds)
    pub fn format_status_change(change: &StatusChange) -> String {
        format!(
            "\n~ preview {} -> {} at {}\n",
            change.from,
            change.to,
            timestamp_to_rfc3339(change.at)
        )
    }

    /// Format the full status report
    pub fn format_status(
        identity: &IdentityToken,
        authenticated: bool,
        record: Option<&JoinRecord>,
        status: ConnectionStatus,
        target: Option<&PreviewTarget>,
    ) -> String {
        let kind = if authenticated { "user" } else { "guest" };
        let preview = match target {
            Some(target) => format!(
                "{} (boss '{}' in event '{}')",
                status, target.boss_id, target.event_id
            ),
            None => status.to_string(),
        };
        format!(
            "identity: {} ({})\njoin:     {}\npreview:  {}\n",
            identity,
            kind,
            Self::format_join_record(record),
            preview
        )
    }

    pub fn format_preview_idle() -> String {
        "Preview needs a boss and an event; join first or pass them explicitly\n".to_string()
    }

    pub fn format_error(message: &str) -> String {
        format!("Error: {}\n", message)
    }
}
