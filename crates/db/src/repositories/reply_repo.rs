//! Repository for reply tables (`activity_replies` / `notification_replies`).

use feedkit_core::event::EventKind;
use feedkit_core::types::DbId;
use sqlx::{PgExecutor, PgPool};

use crate::models::reply::Reply;
use crate::tables::tables;

/// Column list for reply queries.
const COLUMNS: &str = "\
    id, event_id, created_user_id, last_modified_user_id, text, reply_to_id, \
    created_at, updated_at";

/// Provides CRUD operations for replies. Every lookup is scoped to an event.
pub struct ReplyRepo;

impl ReplyRepo {
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        kind: EventKind,
        event_id: DbId,
        created_user_id: DbId,
        text: &str,
        reply_to_id: Option<DbId>,
    ) -> Result<Reply, sqlx::Error> {
        let query = format!(
            "INSERT INTO {} \
                (event_id, created_user_id, last_modified_user_id, text, reply_to_id) \
             VALUES ($1, $2, $2, $3, $4) \
             RETURNING {COLUMNS}",
            tables(kind).replies
        );
        sqlx::query_as::<_, Reply>(&query)
            .bind(event_id)
            .bind(created_user_id)
            .bind(text)
            .bind(reply_to_id)
            .fetch_one(executor)
            .await
    }

    /// Lock a reply of `event_id` against deletion until the transaction
    /// ends. Returns `false` if there is no such reply.
    pub async fn lock_existing<'e, E: PgExecutor<'e>>(
        executor: E,
        kind: EventKind,
        event_id: DbId,
        reply_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let query = format!(
            "SELECT id FROM {} WHERE id = $1 AND event_id = $2 FOR KEY SHARE",
            tables(kind).replies
        );
        let row: Option<DbId> = sqlx::query_scalar(&query)
            .bind(reply_id)
            .bind(event_id)
            .fetch_optional(executor)
            .await?;
        Ok(row.is_some())
    }

    /// List an event's replies, oldest first.
    pub async fn list_for_event(
        pool: &PgPool,
        kind: EventKind,
        event_id: DbId,
    ) -> Result<Vec<Reply>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM {} WHERE event_id = $1 ORDER BY id",
            tables(kind).replies
        );
        sqlx::query_as::<_, Reply>(&query)
            .bind(event_id)
            .fetch_all(pool)
            .await
    }

    pub async fn find(
        pool: &PgPool,
        kind: EventKind,
        event_id: DbId,
        reply_id: DbId,
    ) -> Result<Option<Reply>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM {} WHERE id = $1 AND event_id = $2",
            tables(kind).replies
        );
        sqlx::query_as::<_, Reply>(&query)
            .bind(reply_id)
            .bind(event_id)
            .fetch_optional(pool)
            .await
    }

    /// Replace a reply's text and record who changed it.
    ///
    /// Returns `None` if the reply does not exist on that event.
    pub async fn update_text(
        pool: &PgPool,
        kind: EventKind,
        event_id: DbId,
        reply_id: DbId,
        text: &str,
        modified_by: DbId,
    ) -> Result<Option<Reply>, sqlx::Error> {
        let query = format!(
            "UPDATE {} SET text = $3, last_modified_user_id = $4 \
             WHERE id = $1 AND event_id = $2 \
             RETURNING {COLUMNS}",
            tables(kind).replies
        );
        sqlx::query_as::<_, Reply>(&query)
            .bind(reply_id)
            .bind(event_id)
            .bind(text)
            .bind(modified_by)
            .fetch_optional(pool)
            .await
    }

    /// Delete one reply of an event. Replies answering it keep existing with
    /// `reply_to_id` cleared.
    ///
    /// Returns `true` if a reply was deleted.
    pub async fn delete(
        pool: &PgPool,
        kind: EventKind,
        event_id: DbId,
        reply_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let query = format!(
            "DELETE FROM {} WHERE id = $1 AND event_id = $2",
            tables(kind).replies
        );
        let result = sqlx::query(&query)
            .bind(reply_id)
            .bind(event_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn count_for_event(
        pool: &PgPool,
        kind: EventKind,
        event_id: DbId,
    ) -> Result<i64, sqlx::Error> {
        let query = format!(
            "SELECT COUNT(*) FROM {} WHERE event_id = $1",
            tables(kind).replies
        );
        sqlx::query_scalar(&query).bind(event_id).fetch_one(pool).await
    }
}
