//! Reply rows and DTOs.

use feedkit_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from `activity_replies` / `notification_replies`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Reply {
    pub id: DbId,
    pub event_id: DbId,
    pub created_user_id: DbId,
    pub last_modified_user_id: DbId,
    pub text: String,
    /// Another reply of the same event this one answers.
    pub reply_to_id: Option<DbId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for adding a reply to an event.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateReply {
    pub text: String,
    #[serde(default)]
    pub reply_to_id: Option<DbId>,
}

impl CreateReply {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            reply_to_id: None,
        }
    }

    pub fn reply_to(mut self, reply_id: DbId) -> Self {
        self.reply_to_id = Some(reply_id);
        self
    }
}
