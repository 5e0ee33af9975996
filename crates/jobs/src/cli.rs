//! Command-line definitions and dispatch for `feedkit-jobs`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use feedkit_core::event::EventKind;
use feedkit_core::types::DbId;
use feedkit_db::DbPool;
use serde::Serialize;

use crate::cleanup::{cleanup_stale, collect_poly_refs, CleanupReport};
use crate::config::JobsConfig;
use crate::error::JobsResult;
use crate::reply_counts::{recompute_reply_counts, ReplyCountReport};
use crate::share_counts::{recompute_share_counts, ShareCountReport};

/// Maintenance jobs for activity and notification feeds
#[derive(Parser, Debug)]
#[command(name = "feedkit-jobs")]
#[command(version)]
#[command(about = "Maintenance jobs for activity and notification feeds")]
pub struct Cli {
    /// Entity registry JSON file (overrides FEEDKIT_ENTITIES)
    #[arg(long, global = true)]
    pub entities: Option<PathBuf>,

    /// Print the job report as JSON on stdout
    #[arg(long, global = true)]
    pub json: bool,

    /// Job to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available jobs
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Delete events whose subject no longer exists
    CleanupStale {
        /// Event family to clean (activity, notification)
        #[arg(long, default_value = "activity")]
        kind: EventKind,

        /// Report what would be deleted without deleting anything
        #[arg(long)]
        dry_run: bool,

        /// Also delete poly refs no audience points at
        #[arg(long)]
        poly_refs: bool,
    },

    /// Recompute the denormalized reply count of events
    UpdateReplyCounts {
        /// Event family to update (activity, notification)
        #[arg(long, default_value = "activity")]
        kind: EventKind,

        /// Only these events (space or comma separated)
        #[arg(long, num_args = 1.., value_delimiter = ',')]
        event_ids: Vec<DbId>,

        /// Report mismatches without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Recompute share counts on registered subject tables
    UpdateShareCounts {
        /// Report mismatches without writing
        #[arg(long)]
        dry_run: bool,
    },
}

impl Command {
    /// Subcommand name as typed on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CleanupStale { .. } => "cleanup-stale",
            Self::UpdateReplyCounts { .. } => "update-reply-counts",
            Self::UpdateShareCounts { .. } => "update-share-counts",
        }
    }
}

/// Report of whichever job ran.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "job", rename_all = "snake_case")]
pub enum JobReport {
    CleanupStale {
        #[serde(flatten)]
        report: CleanupReport,
        /// Unreferenced poly refs removed, when requested.
        poly_refs: Option<u64>,
    },
    UpdateReplyCounts(ReplyCountReport),
    UpdateShareCounts(ShareCountReport),
}

/// Run the selected job.
pub async fn run(command: &Command, pool: &DbPool, config: &JobsConfig) -> JobsResult<JobReport> {
    match command {
        Command::CleanupStale {
            kind,
            dry_run,
            poly_refs,
        } => {
            let registry = config.load_registry()?;
            let report = cleanup_stale(pool, *kind, &registry, *dry_run).await?;
            let poly_refs = if *poly_refs {
                Some(collect_poly_refs(pool, *dry_run).await?)
            } else {
                None
            };
            Ok(JobReport::CleanupStale { report, poly_refs })
        }
        Command::UpdateReplyCounts {
            kind,
            event_ids,
            dry_run,
        } => {
            let scope = (!event_ids.is_empty()).then_some(event_ids.as_slice());
            let report = recompute_reply_counts(pool, *kind, scope, *dry_run).await?;
            Ok(JobReport::UpdateReplyCounts(report))
        }
        Command::UpdateShareCounts { dry_run } => {
            let registry = config.load_registry()?;
            let report = recompute_share_counts(pool, &registry, *dry_run).await?;
            Ok(JobReport::UpdateShareCounts(report))
        }
    }
}
