//! Share count repair for subjects whose host table keeps a share count.

use std::collections::BTreeSet;

use feedkit_core::entity::EntityRegistry;
use feedkit_db::repositories::{EntityRepo, MaintenanceRepo};
use feedkit_db::DbPool;
use serde::Serialize;

use crate::error::JobsResult;

/// Share count changes for one subject type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShareCountChange {
    pub entity_type: String,
    /// Rows whose count was wrong before the run.
    pub mismatched: usize,
    /// Rows written (zero on a dry run).
    pub updated: u64,
}

/// Summary of a share count run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ShareCountReport {
    pub dry_run: bool,
    pub changes: Vec<ShareCountChange>,
    /// Shared subject types that are unregistered or have no share count
    /// column.
    pub skipped_types: Vec<String>,
}

impl ShareCountReport {
    pub fn updated(&self) -> u64 {
        self.changes.iter().map(|c| c.updated).sum()
    }
}

/// Set each subject's share count to its number of SHARED activities.
///
/// Every registered type with a share count column is visited, so subjects
/// that are no longer shared drop back to zero.
pub async fn recompute_share_counts(
    pool: &DbPool,
    registry: &EntityRegistry,
    dry_run: bool,
) -> JobsResult<ShareCountReport> {
    let mut report = ShareCountReport {
        dry_run,
        ..ShareCountReport::default()
    };

    let with_column: BTreeSet<&str> = registry
        .descriptors()
        .filter(|d| d.share_count_column.is_some())
        .map(|d| d.name.as_str())
        .collect();
    for shared_type in MaintenanceRepo::shared_about_types(pool).await? {
        if !with_column.contains(shared_type.as_str()) {
            tracing::info!(
                entity_type = %shared_type,
                "Subject type has shares but no share count column"
            );
            report.skipped_types.push(shared_type);
        }
    }

    for descriptor in registry
        .descriptors()
        .filter(|d| d.share_count_column.is_some())
    {
        let mismatches = match EntityRepo::share_count_mismatches(pool, descriptor).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(
                    entity_type = %descriptor.name,
                    error = %e,
                    "Failed to read share counts"
                );
                report.skipped_types.push(descriptor.name.clone());
                continue;
            }
        };
        for fix in &mismatches {
            tracing::debug!(
                entity_type = %descriptor.name,
                entity_id = fix.entity_id,
                stored = ?fix.stored,
                actual = fix.actual,
                "Share count mismatch"
            );
        }

        let updated = if dry_run || mismatches.is_empty() {
            0
        } else {
            EntityRepo::apply_share_counts(pool, descriptor).await?
        };
        report.changes.push(ShareCountChange {
            entity_type: descriptor.name.clone(),
            mismatched: mismatches.len(),
            updated,
        });
    }

    tracing::info!(
        types = report.changes.len(),
        updated = report.updated(),
        skipped = report.skipped_types.len(),
        dry_run,
        "Share counts recomputed"
    );
    Ok(report)
}
