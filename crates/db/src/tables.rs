//! Table names for each event kind.
//!
//! Activities and notifications live in parallel table families with the
//! same columns, so repositories pick their tables from the kind.

use feedkit_core::event::EventKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventTables {
    /// Event rows.
    pub events: &'static str,
    /// Audience membership `(event_id, poly_ref_id)`.
    pub audience: &'static str,
    /// Replies `(event_id, reply_to_id, ...)`.
    pub replies: &'static str,
}

pub const ACTIVITY_TABLES: EventTables = EventTables {
    events: "activities",
    audience: "activity_for_objs",
    replies: "activity_replies",
};

pub const NOTIFICATION_TABLES: EventTables = EventTables {
    events: "notifications",
    audience: "notification_for_objs",
    replies: "notification_replies",
};

pub fn tables(kind: EventKind) -> EventTables {
    match kind {
        EventKind::Activity => ACTIVITY_TABLES,
        EventKind::Notification => NOTIFICATION_TABLES,
    }
}
