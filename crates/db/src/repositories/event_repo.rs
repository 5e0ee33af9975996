//! Repository for event tables (`activities` / `notifications`) and their
//! audience membership tables.
//!
//! Every method takes the [`EventKind`] whose table family it operates on.

use feedkit_core::entity::PolyRef;
use feedkit_core::event::{Action, EventKind};
use feedkit_core::types::DbId;
use feedkit_core::visibility::Visibility;
use sqlx::{PgConnection, PgExecutor, PgPool};

use crate::models::event::{Event, EventFilter, NewEventRow, UpdateEvents};
use crate::tables::tables;

/// Column list for event queries.
const COLUMNS: &str = "\
    id, created_user_id, last_modified_user_id, text, about_type, about_id, \
    source, action, privacy, reply_count, created_at, updated_at";

/// Default page size for feed listings.
const DEFAULT_LIMIT: i64 = 50;

/// Maximum page size for feed listings.
const MAX_LIMIT: i64 = 200;

/// Provides CRUD, audience and feed queries for events.
pub struct EventRepo;

impl EventRepo {
    // -----------------------------------------------------------------------
    // Event CRUD
    // -----------------------------------------------------------------------

    /// Insert an event row. The creator is also recorded as last modifier.
    pub async fn insert(
        conn: &mut PgConnection,
        kind: EventKind,
        row: &NewEventRow<'_>,
    ) -> Result<Event, sqlx::Error> {
        let query = format!(
            "INSERT INTO {} \
                (created_user_id, last_modified_user_id, text, about_type, about_id, \
                 source, action, privacy) \
             VALUES ($1, $1, $2, $3, $4, $5, $6, $7) \
             RETURNING {COLUMNS}",
            tables(kind).events
        );
        sqlx::query_as::<_, Event>(&query)
            .bind(row.created_user_id)
            .bind(row.text)
            .bind(row.about.map(|a| a.entity_type.as_str()))
            .bind(row.about.map(|a| a.entity_id))
            .bind(row.source.as_str())
            .bind(row.action.as_str())
            .bind(row.privacy.as_str())
            .fetch_one(conn)
            .await
    }

    pub async fn find_by_id(
        pool: &PgPool,
        kind: EventKind,
        id: DbId,
    ) -> Result<Option<Event>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM {} WHERE id = $1", tables(kind).events);
        sqlx::query_as::<_, Event>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Lock an event against deletion until the transaction ends.
    /// Returns `false` if it does not exist.
    pub async fn lock_existing<'e, E: PgExecutor<'e>>(
        executor: E,
        kind: EventKind,
        id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let query = format!("SELECT id FROM {} WHERE id = $1 FOR KEY SHARE", tables(kind).events);
        let row: Option<DbId> = sqlx::query_scalar(&query)
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(row.is_some())
    }

    /// Find the SHARED event `created_user_id` holds on `about`, locking it.
    pub async fn find_share<'e, E: PgExecutor<'e>>(
        executor: E,
        kind: EventKind,
        created_user_id: DbId,
        about: &PolyRef,
    ) -> Result<Option<Event>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM {} \
             WHERE created_user_id = $1 AND about_type = $2 AND about_id = $3 AND action = $4 \
             ORDER BY id \
             LIMIT 1 \
             FOR UPDATE",
            tables(kind).events
        );
        sqlx::query_as::<_, Event>(&query)
            .bind(created_user_id)
            .bind(&about.entity_type)
            .bind(about.entity_id)
            .bind(Action::Shared.as_str())
            .fetch_optional(executor)
            .await
    }

    /// Replace an event's text and record who changed it.
    ///
    /// Returns `None` if no event with the given ID exists.
    pub async fn update_text(
        pool: &PgPool,
        kind: EventKind,
        id: DbId,
        text: Option<&str>,
        modified_by: DbId,
    ) -> Result<Option<Event>, sqlx::Error> {
        let query = format!(
            "UPDATE {} SET text = $2, last_modified_user_id = $3 \
             WHERE id = $1 \
             RETURNING {COLUMNS}",
            tables(kind).events
        );
        sqlx::query_as::<_, Event>(&query)
            .bind(id)
            .bind(text)
            .bind(modified_by)
            .fetch_optional(pool)
            .await
    }

    /// Delete an event. Audience rows and replies cascade.
    ///
    /// Returns `true` if an event was deleted.
    pub async fn delete<'e, E: PgExecutor<'e>>(
        executor: E,
        kind: EventKind,
        id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let query = format!("DELETE FROM {} WHERE id = $1", tables(kind).events);
        let result = sqlx::query(&query).bind(id).execute(executor).await?;
        Ok(result.rows_affected() > 0)
    }

    // -----------------------------------------------------------------------
    // Audience
    // -----------------------------------------------------------------------

    /// Attach poly refs to an event's audience. Existing members are skipped.
    pub async fn attach_audience(
        conn: &mut PgConnection,
        kind: EventKind,
        event_id: DbId,
        poly_ref_ids: &[DbId],
    ) -> Result<u64, sqlx::Error> {
        if poly_ref_ids.is_empty() {
            return Ok(0);
        }
        let query = format!(
            "INSERT INTO {} (event_id, poly_ref_id) \
             SELECT $1, UNNEST($2::BIGINT[]) \
             ON CONFLICT (event_id, poly_ref_id) DO NOTHING",
            tables(kind).audience
        );
        let result = sqlx::query(&query)
            .bind(event_id)
            .bind(poly_ref_ids)
            .execute(conn)
            .await?;
        Ok(result.rows_affected())
    }

    /// List an event's audience in the order members were attached.
    pub async fn list_audience(
        pool: &PgPool,
        kind: EventKind,
        event_id: DbId,
    ) -> Result<Vec<PolyRef>, sqlx::Error> {
        let query = format!(
            "SELECT p.entity_type, p.entity_id \
             FROM {} f \
             JOIN poly_refs p ON p.id = f.poly_ref_id \
             WHERE f.event_id = $1 \
             ORDER BY f.id",
            tables(kind).audience
        );
        let rows = sqlx::query_as::<_, (String, DbId)>(&query)
            .bind(event_id)
            .fetch_all(pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(entity_type, entity_id)| PolyRef::new(entity_type, entity_id))
            .collect())
    }

    pub async fn is_member(
        pool: &PgPool,
        kind: EventKind,
        event_id: DbId,
        entity: &PolyRef,
    ) -> Result<bool, sqlx::Error> {
        let query = format!(
            "SELECT EXISTS ( \
                SELECT 1 FROM {} f \
                JOIN poly_refs p ON p.id = f.poly_ref_id \
                WHERE f.event_id = $1 AND p.entity_type = $2 AND p.entity_id = $3)",
            tables(kind).audience
        );
        sqlx::query_scalar(&query)
            .bind(event_id)
            .bind(&entity.entity_type)
            .bind(entity.entity_id)
            .fetch_one(pool)
            .await
    }

    /// Remove one entity from an event's audience.
    ///
    /// Returns `true` if a membership row was removed.
    pub async fn remove_member(
        pool: &PgPool,
        kind: EventKind,
        event_id: DbId,
        entity: &PolyRef,
    ) -> Result<bool, sqlx::Error> {
        let query = format!(
            "DELETE FROM {} f \
             USING poly_refs p \
             WHERE f.poly_ref_id = p.id \
               AND f.event_id = $1 AND p.entity_type = $2 AND p.entity_id = $3",
            tables(kind).audience
        );
        let result = sqlx::query(&query)
            .bind(event_id)
            .bind(&entity.entity_type)
            .bind(entity.entity_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // -----------------------------------------------------------------------
    // Feeds
    // -----------------------------------------------------------------------

    /// Events whose audience contains `obj`, restricted by `visibility`.
    ///
    /// `viewer_type` is the entity type used to look the viewer up in the
    /// audience for [`Visibility::Member`]. Newest first.
    pub async fn list_for_object(
        pool: &PgPool,
        kind: EventKind,
        obj: &PolyRef,
        visibility: Visibility,
        viewer_type: &str,
        filter: &EventFilter,
    ) -> Result<Vec<Event>, sqlx::Error> {
        let t = tables(kind);
        let (restriction, viewer_id) = match visibility {
            Visibility::PublicOnly => ("AND e.privacy = 'PUBLIC'".to_string(), None),
            Visibility::Unrestricted => (String::new(), None),
            Visibility::Member(viewer_id) => (
                format!(
                    "AND (e.created_user_id = $3 \
                          OR e.privacy = 'PUBLIC' \
                          OR (e.privacy IN ('CUSTOM', 'PRIVATE') AND EXISTS ( \
                              SELECT 1 FROM {aud} vf \
                              JOIN poly_refs vp ON vp.id = vf.poly_ref_id \
                              WHERE vf.event_id = e.id \
                                AND vp.entity_type = $4 AND vp.entity_id = $3)))",
                    aud = t.audience
                ),
                Some(viewer_id),
            ),
        };

        // Filter placeholders follow the two object binds and, for members,
        // the two viewer binds.
        let n = if viewer_id.is_some() { 5 } else { 3 };
        let query = format!(
            "SELECT {COLUMNS} FROM {events} e \
             WHERE EXISTS ( \
                 SELECT 1 FROM {aud} f \
                 JOIN poly_refs p ON p.id = f.poly_ref_id \
                 WHERE f.event_id = e.id AND p.entity_type = $1 AND p.entity_id = $2) \
               {restriction} \
               {filters} \
             ORDER BY e.id DESC \
             LIMIT ${limit} OFFSET ${offset}",
            events = t.events,
            aud = t.audience,
            filters = filter_clause(n),
            limit = n + 3,
            offset = n + 4,
        );

        let mut q = sqlx::query_as::<_, Event>(&query)
            .bind(&obj.entity_type)
            .bind(obj.entity_id);
        if let Some(viewer_id) = viewer_id {
            q = q.bind(viewer_id).bind(viewer_type);
        }
        let (limit, offset) = page(filter);
        q.bind(filter.action.map(|a| a.as_str()))
            .bind(filter.source.map(|s| s.as_str()))
            .bind(filter.privacy.map(|p| p.as_str()))
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Events whose subject is exactly `about`. Newest first.
    pub async fn list_about_object(
        pool: &PgPool,
        kind: EventKind,
        about: &PolyRef,
        filter: &EventFilter,
    ) -> Result<Vec<Event>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM {} e \
             WHERE e.about_type = $1 AND e.about_id = $2 \
               {} \
             ORDER BY e.id DESC \
             LIMIT $6 OFFSET $7",
            tables(kind).events,
            filter_clause(3),
        );
        let (limit, offset) = page(filter);
        sqlx::query_as::<_, Event>(&query)
            .bind(&about.entity_type)
            .bind(about.entity_id)
            .bind(filter.action.map(|a| a.as_str()))
            .bind(filter.source.map(|s| s.as_str()))
            .bind(filter.privacy.map(|p| p.as_str()))
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    // -----------------------------------------------------------------------
    // Bulk operations on a subject's events
    // -----------------------------------------------------------------------

    /// Delete every event about `about`. Returns rows removed.
    pub async fn delete_about_object(
        pool: &PgPool,
        kind: EventKind,
        about: &PolyRef,
    ) -> Result<u64, sqlx::Error> {
        let query = format!(
            "DELETE FROM {} WHERE about_type = $1 AND about_id = $2",
            tables(kind).events
        );
        let result = sqlx::query(&query)
            .bind(&about.entity_type)
            .bind(about.entity_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Apply `update` to every event about any of `abouts`.
    ///
    /// Rows already holding every requested value are skipped. Returns rows
    /// changed.
    pub async fn update_about_objects(
        pool: &PgPool,
        kind: EventKind,
        abouts: &[PolyRef],
        update: &UpdateEvents,
    ) -> Result<u64, sqlx::Error> {
        if abouts.is_empty() || update.is_empty() {
            return Ok(0);
        }
        let (types, ids): (Vec<&str>, Vec<DbId>) = abouts
            .iter()
            .map(|a| (a.entity_type.as_str(), a.entity_id))
            .unzip();

        let query = format!(
            "UPDATE {} e SET \
                 privacy = COALESCE($3::TEXT, e.privacy), \
                 source = COALESCE($4::TEXT, e.source), \
                 text = COALESCE($5::TEXT, e.text) \
             FROM (SELECT DISTINCT t, i FROM UNNEST($1::TEXT[], $2::BIGINT[]) AS u(t, i)) \
                 AS s(about_type, about_id) \
             WHERE e.about_type = s.about_type AND e.about_id = s.about_id \
               AND (($3::TEXT IS NOT NULL AND e.privacy IS DISTINCT FROM $3::TEXT) \
                 OR ($4::TEXT IS NOT NULL AND e.source IS DISTINCT FROM $4::TEXT) \
                 OR ($5::TEXT IS NOT NULL AND e.text IS DISTINCT FROM $5::TEXT))",
            tables(kind).events
        );
        let result = sqlx::query(&query)
            .bind(types)
            .bind(ids)
            .bind(update.privacy.map(|p| p.as_str()))
            .bind(update.source.map(|s| s.as_str()))
            .bind(update.text.as_deref())
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Optional equality filters on action, source and privacy, bound at `$n`,
/// `$n+1` and `$n+2`.
fn filter_clause(n: usize) -> String {
    format!(
        "AND (${a}::TEXT IS NULL OR e.action = ${a}) \
         AND (${s}::TEXT IS NULL OR e.source = ${s}) \
         AND (${p}::TEXT IS NULL OR e.privacy = ${p})",
        a = n,
        s = n + 1,
        p = n + 2,
    )
}

/// Clamp pagination parameters.
fn page(filter: &EventFilter) -> (i64, i64) {
    let limit = filter.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let offset = filter.offset.unwrap_or(0).max(0);
    (limit, offset)
}
