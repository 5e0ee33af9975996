//! Stale event cleanup.
//!
//! Events outlive their subject when the host deletes a row without calling
//! `EventStore::delete_all_about_object`. This job finds subject ids that no
//! longer exist in their host table and deletes the events about them, or
//! only reports them on a dry run.

use std::collections::BTreeSet;

use feedkit_core::entity::EntityRegistry;
use feedkit_core::event::EventKind;
use feedkit_core::types::DbId;
use feedkit_db::repositories::{EntityRepo, MaintenanceRepo, PolyRefRepo};
use feedkit_db::DbPool;
use serde::Serialize;

use crate::error::JobsResult;

/// Stale subjects of one entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StaleSubjects {
    pub about_type: String,
    pub about_ids: Vec<DbId>,
    /// Events about those ids (deleted unless this was a dry run).
    pub events: u64,
}

/// Summary of a cleanup run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupReport {
    pub dry_run: bool,
    pub types_checked: usize,
    pub stale: Vec<StaleSubjects>,
    /// Subject types that could not be checked.
    pub skipped_types: Vec<String>,
}

impl CleanupReport {
    pub fn stale_events(&self) -> u64 {
        self.stale.iter().map(|s| s.events).sum()
    }
}

/// Find and delete events about subjects that no longer exist.
///
/// Types missing from `registry`, or whose host table cannot be read, are
/// logged and skipped.
pub async fn cleanup_stale(
    pool: &DbPool,
    kind: EventKind,
    registry: &EntityRegistry,
    dry_run: bool,
) -> JobsResult<CleanupReport> {
    let mut report = CleanupReport {
        dry_run,
        ..CleanupReport::default()
    };

    for about_type in MaintenanceRepo::distinct_about_types(pool, kind).await? {
        let Some(descriptor) = registry.get(&about_type) else {
            tracing::warn!(%kind, about_type = %about_type, "Skipping unregistered subject type");
            report.skipped_types.push(about_type);
            continue;
        };
        report.types_checked += 1;

        let referenced = MaintenanceRepo::about_ids_for_type(pool, kind, &about_type).await?;
        let existing: BTreeSet<DbId> =
            match EntityRepo::existing_ids(pool, descriptor, &referenced).await {
                Ok(ids) => ids.into_iter().collect(),
                Err(e) => {
                    tracing::warn!(
                        %kind,
                        about_type = %about_type,
                        error = %e,
                        "Failed to read host table"
                    );
                    report.skipped_types.push(about_type);
                    continue;
                }
            };

        let stale: Vec<DbId> = referenced
            .into_iter()
            .filter(|id| !existing.contains(id))
            .collect();
        if stale.is_empty() {
            continue;
        }

        let events = if dry_run {
            MaintenanceRepo::count_about_ids(pool, kind, &about_type, &stale).await? as u64
        } else {
            MaintenanceRepo::delete_about_ids(pool, kind, &about_type, &stale).await?
        };
        tracing::info!(
            %kind,
            about_type = %about_type,
            events,
            stale_ids = ?stale,
            dry_run,
            "Stale events found"
        );

        report.stale.push(StaleSubjects {
            about_type,
            about_ids: stale,
            events,
        });
    }

    tracing::info!(
        %kind,
        types_checked = report.types_checked,
        stale_events = report.stale_events(),
        skipped = report.skipped_types.len(),
        dry_run,
        "Stale cleanup finished"
    );
    Ok(report)
}

/// Delete `poly_refs` rows no audience points at anymore.
///
/// Returns the number of rows removed, or that would be removed on a dry run.
pub async fn collect_poly_refs(pool: &DbPool, dry_run: bool) -> JobsResult<u64> {
    let count = if dry_run {
        PolyRefRepo::count_unreferenced(pool).await? as u64
    } else {
        PolyRefRepo::delete_unreferenced(pool).await?
    };
    tracing::info!(count, dry_run, "Unreferenced poly refs collected");
    Ok(count)
}
