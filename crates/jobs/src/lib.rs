//! Batch maintenance jobs for feedkit tables.
//!
//! Each job is a library function returning a serializable report, and a
//! subcommand of the `feedkit-jobs` binary:
//!
//! ```text
//! feedkit-jobs cleanup-stale [--kind activity|notification] [--dry-run] [--poly-refs]
//! feedkit-jobs update-reply-counts [--kind ...] [--event-ids ID...] [--dry-run]
//! feedkit-jobs update-share-counts [--dry-run]
//! ```
//!
//! Every job only writes rows whose stored value is wrong, so runs are
//! idempotent and safe to repeat.

pub mod cleanup;
pub mod cli;
pub mod config;
pub mod error;
pub mod reply_counts;
pub mod share_counts;

pub use cleanup::{cleanup_stale, collect_poly_refs, CleanupReport, StaleSubjects};
pub use cli::{Cli, Command, JobReport};
pub use config::JobsConfig;
pub use error::{JobsError, JobsResult};
pub use reply_counts::{recompute_reply_counts, ReplyCountReport};
pub use share_counts::{recompute_share_counts, ShareCountChange, ShareCountReport};
