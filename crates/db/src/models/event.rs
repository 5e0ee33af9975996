//! Event rows (activities and notifications) and their DTOs.

use feedkit_core::entity::PolyRef;
use feedkit_core::event::{Action, Privacy, Source};
use feedkit_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ---------------------------------------------------------------------------
// Entity struct (database row)
// ---------------------------------------------------------------------------

/// A row from `activities` / `notifications`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Event {
    pub id: DbId,
    pub created_user_id: DbId,
    pub last_modified_user_id: DbId,
    /// Stored text; `None` means display text is built at read time.
    pub text: Option<String>,
    pub about_type: Option<String>,
    pub about_id: Option<DbId>,
    #[sqlx(try_from = "String")]
    pub source: Source,
    #[sqlx(try_from = "String")]
    pub action: Action,
    #[sqlx(try_from = "String")]
    pub privacy: Privacy,
    /// Denormalized reply count, repaired by the reply-count job.
    pub reply_count: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Event {
    /// The subject of the event, if any.
    pub fn about(&self) -> Option<PolyRef> {
        PolyRef::from_parts(self.about_type.as_deref(), self.about_id)
    }
}

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// DTO for recording a new event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateEvent {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub about: Option<PolyRef>,
    #[serde(default)]
    pub source: Source,
    #[serde(default)]
    pub action: Action,
    /// Explicit privacy; inherited from the subject when `None`.
    #[serde(default)]
    pub privacy: Option<Privacy>,
    /// Extra audience members besides the subject.
    #[serde(default)]
    pub ensure_for_objs: Vec<PolyRef>,
    /// Entities removed from the audience, the subject included.
    #[serde(default)]
    pub exclude_objs: Vec<PolyRef>,
}

impl CreateEvent {
    pub fn new(source: Source, action: Action) -> Self {
        Self {
            source,
            action,
            ..Self::default()
        }
    }

    pub fn about(mut self, about: PolyRef) -> Self {
        self.about = Some(about);
        self
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn privacy(mut self, privacy: Privacy) -> Self {
        self.privacy = Some(privacy);
        self
    }

    pub fn ensure_for(mut self, objs: impl IntoIterator<Item = PolyRef>) -> Self {
        self.ensure_for_objs.extend(objs);
        self
    }

    pub fn exclude(mut self, objs: impl IntoIterator<Item = PolyRef>) -> Self {
        self.exclude_objs.extend(objs);
        self
    }
}

/// Values for a row insert after the store has validated and defaulted them.
#[derive(Debug, Clone)]
pub struct NewEventRow<'a> {
    pub created_user_id: DbId,
    pub text: Option<&'a str>,
    pub about: Option<&'a PolyRef>,
    pub source: Source,
    pub action: Action,
    pub privacy: Privacy,
}

/// DTO for bulk-updating every event about one or more subjects.
///
/// Only `Some` fields are written; rows that already hold every requested
/// value are left untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateEvents {
    pub privacy: Option<Privacy>,
    pub source: Option<Source>,
    pub text: Option<String>,
}

impl UpdateEvents {
    pub fn privacy(privacy: Privacy) -> Self {
        Self {
            privacy: Some(privacy),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.privacy.is_none() && self.source.is_none() && self.text.is_none()
    }
}

/// Query parameters for feed listings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventFilter {
    pub action: Option<Action>,
    pub source: Option<Source>,
    pub privacy: Option<Privacy>,
    /// Maximum results. Defaults to 50, capped at 200.
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl EventFilter {
    pub fn action(action: Action) -> Self {
        Self {
            action: Some(action),
            ..Self::default()
        }
    }
}
