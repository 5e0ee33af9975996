//! Event vocabulary: sources, actions, privacy tiers and the two event kinds.
//!
//! Every enum round-trips through the upper-case string stored in the
//! database (`"SYSTEM"`, `"SHARED"`, `"CUSTOM"`...). Unknown strings are
//! rejected with [`CoreError::Validation`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

pub const SOURCE_SYSTEM: &str = "SYSTEM";
pub const SOURCE_USER: &str = "USER";

pub const VALID_SOURCES: &[&str] = &[SOURCE_SYSTEM, SOURCE_USER];

/// What generated an event.
///
/// `System` events come from the platform itself (field updates, object
/// lifecycle); `User` events come from an explicit user action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Source {
    #[default]
    System,
    User,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => SOURCE_SYSTEM,
            Self::User => SOURCE_USER,
        }
    }
}

impl FromStr for Source {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            SOURCE_SYSTEM => Ok(Self::System),
            SOURCE_USER => Ok(Self::User),
            other => Err(CoreError::Validation(format!(
                "Unknown source: '{other}'. Valid sources: {}",
                VALID_SOURCES.join(", ")
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

pub const ACTION_ADDED: &str = "ADDED";
pub const ACTION_COMMENTED: &str = "COMMENTED";
pub const ACTION_CREATED: &str = "CREATED";
pub const ACTION_DELETED: &str = "DELETED";
pub const ACTION_EDITED: &str = "EDITED";
pub const ACTION_SHARED: &str = "SHARED";
pub const ACTION_UPDATED: &str = "UPDATED";
pub const ACTION_UPLOADED: &str = "UPLOADED";

pub const VALID_ACTIONS: &[&str] = &[
    ACTION_ADDED,
    ACTION_COMMENTED,
    ACTION_CREATED,
    ACTION_DELETED,
    ACTION_EDITED,
    ACTION_SHARED,
    ACTION_UPDATED,
    ACTION_UPLOADED,
];

/// Past-tense verb describing what happened to the subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Added,
    Commented,
    #[default]
    Created,
    Deleted,
    Edited,
    Shared,
    Updated,
    Uploaded,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => ACTION_ADDED,
            Self::Commented => ACTION_COMMENTED,
            Self::Created => ACTION_CREATED,
            Self::Deleted => ACTION_DELETED,
            Self::Edited => ACTION_EDITED,
            Self::Shared => ACTION_SHARED,
            Self::Updated => ACTION_UPDATED,
            Self::Uploaded => ACTION_UPLOADED,
        }
    }

    /// Human-readable label, e.g. `"Commented"`.
    pub fn display(&self) -> &'static str {
        match self {
            Self::Added => "Added",
            Self::Commented => "Commented",
            Self::Created => "Created",
            Self::Deleted => "Deleted",
            Self::Edited => "Edited",
            Self::Shared => "Shared",
            Self::Updated => "Updated",
            Self::Uploaded => "Uploaded",
        }
    }

    /// Whether repeating the action alternates between creating and removing
    /// the event instead of recording a new one.
    pub fn is_toggle(&self) -> bool {
        matches!(self, Self::Shared)
    }
}

impl FromStr for Action {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            ACTION_ADDED => Ok(Self::Added),
            ACTION_COMMENTED => Ok(Self::Commented),
            ACTION_CREATED => Ok(Self::Created),
            ACTION_DELETED => Ok(Self::Deleted),
            ACTION_EDITED => Ok(Self::Edited),
            ACTION_SHARED => Ok(Self::Shared),
            ACTION_UPDATED => Ok(Self::Updated),
            ACTION_UPLOADED => Ok(Self::Uploaded),
            other => Err(CoreError::Validation(format!(
                "Unknown action: '{other}'. Valid actions: {}",
                VALID_ACTIONS.join(", ")
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Privacy
// ---------------------------------------------------------------------------

pub const PRIVACY_PUBLIC: &str = "PUBLIC";
pub const PRIVACY_PRIVATE: &str = "PRIVATE";
pub const PRIVACY_CUSTOM: &str = "CUSTOM";

pub const VALID_PRIVACIES: &[&str] = &[PRIVACY_PUBLIC, PRIVACY_PRIVATE, PRIVACY_CUSTOM];

/// Who may see an event.
///
/// - `Public`: everyone, including anonymous viewers.
/// - `Private`: the creator, the subject, and audience members.
/// - `Custom`: the creator plus entities explicitly placed in the audience.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Privacy {
    #[default]
    Public,
    Private,
    Custom,
}

impl Privacy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => PRIVACY_PUBLIC,
            Self::Private => PRIVACY_PRIVATE,
            Self::Custom => PRIVACY_CUSTOM,
        }
    }

    /// Privacy an event inherits from its subject's own privacy value.
    ///
    /// Only PUBLIC and PRIVATE carry over; anything else (including CUSTOM or
    /// an unparseable value) falls back to the PUBLIC default.
    pub fn inherit_from(subject_privacy: Option<&str>) -> Self {
        match subject_privacy.map(str::parse::<Privacy>) {
            Some(Ok(Self::Private)) => Self::Private,
            _ => Self::Public,
        }
    }
}

impl FromStr for Privacy {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            PRIVACY_PUBLIC => Ok(Self::Public),
            PRIVACY_PRIVATE => Ok(Self::Private),
            PRIVACY_CUSTOM => Ok(Self::Custom),
            other => Err(CoreError::Validation(format!(
                "Unknown privacy: '{other}'. Valid values: {}",
                VALID_PRIVACIES.join(", ")
            ))),
        }
    }
}

macro_rules! string_conversions {
    ($($ty:ty),+) => {$(
        impl TryFrom<String> for $ty {
            type Error = CoreError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    )+};
}

string_conversions!(Source, Action, Privacy);

// ---------------------------------------------------------------------------
// EventKind
// ---------------------------------------------------------------------------

/// Actions a notification may carry.
const NOTIFICATION_ACTIONS: &[Action] = &[
    Action::Commented,
    Action::Created,
    Action::Deleted,
    Action::Updated,
];

/// Which of the two parallel subsystems an event belongs to.
///
/// Both kinds share the same row shape and query semantics; notifications
/// accept a narrower set of actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    #[default]
    Activity,
    Notification,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Activity => "activity",
            Self::Notification => "notification",
        }
    }

    pub fn allows(&self, action: Action) -> bool {
        match self {
            Self::Activity => true,
            Self::Notification => NOTIFICATION_ACTIONS.contains(&action),
        }
    }

    /// Reject actions this kind does not record.
    pub fn check_action(&self, action: Action) -> Result<(), CoreError> {
        if self.allows(action) {
            Ok(())
        } else {
            Err(CoreError::Validation(format!(
                "Action {action} is not valid for a {}",
                self.as_str()
            )))
        }
    }
}

impl FromStr for EventKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "activity" | "activities" => Ok(Self::Activity),
            "notification" | "notifications" => Ok(Self::Notification),
            other => Err(CoreError::Validation(format!(
                "Unknown event kind: '{other}'. Valid kinds: activity, notification"
            ))),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
