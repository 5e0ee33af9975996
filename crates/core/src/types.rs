//! Primitive types shared by every feedkit crate.

use serde::{Deserialize, Serialize};

/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// The identity reading or writing a feed.
///
/// Authentication itself is handled by the host platform; feedkit only needs
/// to know whether there is a signed-in user and, if so, which one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "user_id", rename_all = "snake_case")]
pub enum Viewer {
    Anonymous,
    User(DbId),
}

impl Viewer {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::User(_))
    }

    /// The signed-in user id, if any.
    pub fn user_id(&self) -> Option<DbId> {
        match self {
            Self::Anonymous => None,
            Self::User(id) => Some(*id),
        }
    }

    /// The signed-in user id, or a validation error for anonymous callers.
    pub fn require_user(&self) -> Result<DbId, crate::error::CoreError> {
        self.user_id().ok_or_else(|| {
            crate::error::CoreError::Validation("User must be logged in".to_string())
        })
    }
}

impl From<Option<DbId>> for Viewer {
    fn from(user_id: Option<DbId>) -> Self {
        user_id.map_or(Self::Anonymous, Self::User)
    }
}
