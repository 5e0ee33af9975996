//! Queries backing the batch maintenance jobs.
//!
//! Kept apart from [`EventRepo`](super::EventRepo) because they scan whole
//! tables and only run out of band.

use feedkit_core::event::{Action, EventKind};
use feedkit_core::types::DbId;
use sqlx::PgPool;

use crate::tables::{tables, ACTIVITY_TABLES};

/// An event whose stored reply count disagrees with its replies.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ReplyCountFix {
    pub event_id: DbId,
    pub stored: i32,
    pub actual: i64,
}

pub struct MaintenanceRepo;

impl MaintenanceRepo {
    // -----------------------------------------------------------------------
    // Stale subjects
    // -----------------------------------------------------------------------

    /// Distinct subject types referenced by events of `kind`.
    pub async fn distinct_about_types(
        pool: &PgPool,
        kind: EventKind,
    ) -> Result<Vec<String>, sqlx::Error> {
        let query = format!(
            "SELECT DISTINCT about_type FROM {} \
             WHERE about_type IS NOT NULL \
             ORDER BY about_type",
            tables(kind).events
        );
        sqlx::query_scalar(&query).fetch_all(pool).await
    }

    /// Distinct subject ids of one type referenced by events of `kind`.
    pub async fn about_ids_for_type(
        pool: &PgPool,
        kind: EventKind,
        about_type: &str,
    ) -> Result<Vec<DbId>, sqlx::Error> {
        let query = format!(
            "SELECT DISTINCT about_id FROM {} \
             WHERE about_type = $1 AND about_id IS NOT NULL \
             ORDER BY about_id",
            tables(kind).events
        );
        sqlx::query_scalar(&query)
            .bind(about_type)
            .fetch_all(pool)
            .await
    }

    /// Number of events about any of `about_ids` of one type.
    pub async fn count_about_ids(
        pool: &PgPool,
        kind: EventKind,
        about_type: &str,
        about_ids: &[DbId],
    ) -> Result<i64, sqlx::Error> {
        let query = format!(
            "SELECT COUNT(*) FROM {} WHERE about_type = $1 AND about_id = ANY($2)",
            tables(kind).events
        );
        sqlx::query_scalar(&query)
            .bind(about_type)
            .bind(about_ids)
            .fetch_one(pool)
            .await
    }

    /// Delete events about any of `about_ids` of one type. Returns rows removed.
    pub async fn delete_about_ids(
        pool: &PgPool,
        kind: EventKind,
        about_type: &str,
        about_ids: &[DbId],
    ) -> Result<u64, sqlx::Error> {
        let query = format!(
            "DELETE FROM {} WHERE about_type = $1 AND about_id = ANY($2)",
            tables(kind).events
        );
        let result = sqlx::query(&query)
            .bind(about_type)
            .bind(about_ids)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Subject types that have at least one SHARED activity.
    pub async fn shared_about_types(pool: &PgPool) -> Result<Vec<String>, sqlx::Error> {
        let query = format!(
            "SELECT DISTINCT about_type FROM {} \
             WHERE action = $1 AND about_type IS NOT NULL \
             ORDER BY about_type",
            ACTIVITY_TABLES.events
        );
        sqlx::query_scalar(&query)
            .bind(Action::Shared.as_str())
            .fetch_all(pool)
            .await
    }

    // -----------------------------------------------------------------------
    // Reply counts
    // -----------------------------------------------------------------------

    /// Events whose `reply_count` is wrong, optionally limited to `scope`.
    pub async fn reply_count_mismatches(
        pool: &PgPool,
        kind: EventKind,
        scope: Option<&[DbId]>,
    ) -> Result<Vec<ReplyCountFix>, sqlx::Error> {
        let t = tables(kind);
        let query = format!(
            "SELECT e.id AS event_id, e.reply_count AS stored, COALESCE(r.cnt, 0) AS actual \
             FROM {events} e \
             LEFT JOIN ( \
                 SELECT event_id, COUNT(*) AS cnt FROM {replies} GROUP BY event_id \
             ) r ON r.event_id = e.id \
             WHERE e.reply_count <> COALESCE(r.cnt, 0) \
               AND ($1::BIGINT[] IS NULL OR e.id = ANY($1)) \
             ORDER BY e.id",
            events = t.events,
            replies = t.replies,
        );
        sqlx::query_as::<_, ReplyCountFix>(&query)
            .bind(scope)
            .fetch_all(pool)
            .await
    }

    /// Reset `reply_count` to zero on events without replies. Returns rows changed.
    pub async fn zero_reply_counts(
        pool: &PgPool,
        kind: EventKind,
        scope: Option<&[DbId]>,
    ) -> Result<u64, sqlx::Error> {
        let t = tables(kind);
        let query = format!(
            "UPDATE {events} e SET reply_count = 0 \
             WHERE e.reply_count <> 0 \
               AND NOT EXISTS (SELECT 1 FROM {replies} r WHERE r.event_id = e.id) \
               AND ($1::BIGINT[] IS NULL OR e.id = ANY($1))",
            events = t.events,
            replies = t.replies,
        );
        let result = sqlx::query(&query).bind(scope).execute(pool).await?;
        Ok(result.rows_affected())
    }

    /// Set `reply_count` from the aggregated reply count on events that have
    /// replies and a wrong count. Returns rows changed.
    pub async fn apply_reply_counts(
        pool: &PgPool,
        kind: EventKind,
        scope: Option<&[DbId]>,
    ) -> Result<u64, sqlx::Error> {
        let t = tables(kind);
        let query = format!(
            "UPDATE {events} e SET reply_count = r.cnt \
             FROM (SELECT event_id, COUNT(*) AS cnt FROM {replies} GROUP BY event_id) r \
             WHERE e.id = r.event_id \
               AND e.reply_count <> r.cnt \
               AND ($1::BIGINT[] IS NULL OR e.id = ANY($1))",
            events = t.events,
            replies = t.replies,
        );
        let result = sqlx::query(&query).bind(scope).execute(pool).await?;
        Ok(result.rows_affected())
    }
}
