//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that take
//! a `&PgPool` (or a connection, for steps that run inside a transaction) as
//! the first argument, and the event kind where the table family matters.

pub mod entity_repo;
pub mod event_repo;
pub mod maintenance_repo;
pub mod poly_ref_repo;
pub mod reply_repo;

pub use entity_repo::{EntityRepo, ShareCountFix};
pub use event_repo::EventRepo;
pub use maintenance_repo::{MaintenanceRepo, ReplyCountFix};
pub use poly_ref_repo::PolyRefRepo;
pub use reply_repo::ReplyRepo;
