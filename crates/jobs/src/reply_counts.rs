//! Reply count repair.

use feedkit_core::event::EventKind;
use feedkit_core::types::DbId;
use feedkit_db::repositories::{MaintenanceRepo, ReplyCountFix};
use feedkit_db::DbPool;
use serde::Serialize;

use crate::error::JobsResult;

/// Summary of a reply count run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReplyCountReport {
    pub dry_run: bool,
    /// Events whose count was wrong before the run.
    pub mismatched: usize,
    /// Rows set to zero.
    pub zeroed: u64,
    /// Rows set from the aggregated reply count.
    pub updated: u64,
}

/// Bring `reply_count` in line with the replies of each event.
///
/// Only rows whose value differs are written, so a second run changes
/// nothing. `event_ids` limits the run to those events.
pub async fn recompute_reply_counts(
    pool: &DbPool,
    kind: EventKind,
    event_ids: Option<&[DbId]>,
    dry_run: bool,
) -> JobsResult<ReplyCountReport> {
    let fixes = MaintenanceRepo::reply_count_mismatches(pool, kind, event_ids).await?;
    for ReplyCountFix {
        event_id,
        stored,
        actual,
    } in &fixes
    {
        tracing::debug!(%kind, event_id, stored, actual, dry_run, "Reply count mismatch");
    }

    let mut report = ReplyCountReport {
        dry_run,
        mismatched: fixes.len(),
        ..ReplyCountReport::default()
    };
    if !dry_run {
        report.zeroed = MaintenanceRepo::zero_reply_counts(pool, kind, event_ids).await?;
        report.updated = MaintenanceRepo::apply_reply_counts(pool, kind, event_ids).await?;
    }

    tracing::info!(
        %kind,
        mismatched = report.mismatched,
        zeroed = report.zeroed,
        updated = report.updated,
        dry_run,
        "Reply counts recomputed"
    );
    Ok(report)
}
