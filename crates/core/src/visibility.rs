//! Visibility rules for reading feeds.
//!
//! The store turns a [`Visibility`] into a single SQL predicate; the
//! [`Visibility::admits`] mirror exists for checks on one already-loaded
//! event.

use crate::entity::PolyRef;
use crate::event::Privacy;
use crate::types::{DbId, Viewer};

/// The restriction to apply to a feed query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Anonymous viewers: `privacy = PUBLIC` only.
    PublicOnly,
    /// The viewer is the feed's own subject and sees everything.
    Unrestricted,
    /// Authenticated viewer looking at someone else's feed.
    Member(DbId),
}

impl Visibility {
    /// Decide the restriction for `viewer` reading the feed of `obj`.
    ///
    /// `user_type` is the registry's user entity type; the viewer only
    /// "is" `obj` when `obj` is a user reference with the viewer's id.
    pub fn for_feed(viewer: &Viewer, obj: &PolyRef, user_type: &str) -> Self {
        match viewer {
            Viewer::Anonymous => Self::PublicOnly,
            Viewer::User(id) if obj.entity_type == user_type && obj.entity_id == *id => {
                Self::Unrestricted
            }
            Viewer::User(id) => Self::Member(*id),
        }
    }

    /// Restriction for fetching a single event outside of any feed.
    pub fn for_event(viewer: &Viewer) -> Self {
        match viewer {
            Viewer::Anonymous => Self::PublicOnly,
            Viewer::User(id) => Self::Member(*id),
        }
    }

    /// Row-level form of the feed predicate.
    pub fn admits(&self, privacy: Privacy, created_user_id: DbId, viewer_in_audience: bool) -> bool {
        match self {
            Self::PublicOnly => privacy == Privacy::Public,
            Self::Unrestricted => true,
            Self::Member(viewer) => {
                created_user_id == *viewer
                    || privacy == Privacy::Public
                    || (matches!(privacy, Privacy::Custom | Privacy::Private)
                        && viewer_in_audience)
            }
        }
    }
}
