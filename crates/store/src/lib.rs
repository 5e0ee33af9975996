//! In-process API for recording and reading activity and notification feeds.
//!
//! An [`EventStore`] is built once per [`EventKind`](feedkit_core::event::EventKind)
//! with a pool and an [`EntityRegistry`](feedkit_core::entity::EntityRegistry)
//! and then passed to whatever needs it.

pub mod error;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use store::{EventStore, ResolvedEntity, ShareToggle};
