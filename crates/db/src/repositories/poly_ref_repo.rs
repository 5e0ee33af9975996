//! Repository for the `poly_refs` table.

use std::collections::BTreeMap;

use feedkit_core::entity::PolyRef;
use feedkit_core::types::DbId;
use sqlx::{PgConnection, PgPool};

use crate::models::poly_ref::StoredPolyRef;
use crate::tables::{ACTIVITY_TABLES, NOTIFICATION_TABLES};

/// Column list for `poly_refs` queries.
const COLUMNS: &str = "id, entity_type, entity_id, created_at, updated_at";

/// Insert/select rounds before [`PolyRefRepo::get_or_create`] gives up.
const GET_OR_CREATE_ATTEMPTS: usize = 3;

/// Delete rounds before [`PolyRefRepo::delete_unreferenced`] gives up.
const COLLECT_ATTEMPTS: usize = 3;

/// Get-or-create access to polymorphic references.
pub struct PolyRefRepo;

impl PolyRefRepo {
    /// Return the id of the row for `entity`, inserting it on first use.
    ///
    /// The row is read `FOR KEY SHARE`, so it cannot be collected by
    /// [`delete_unreferenced`](Self::delete_unreferenced) before the caller's
    /// transaction attaches it. Key-share locks do not block each other.
    pub async fn get_or_create(
        conn: &mut PgConnection,
        entity: &PolyRef,
    ) -> Result<DbId, sqlx::Error> {
        // A row collected between the insert and the select is inserted again.
        for _ in 0..GET_OR_CREATE_ATTEMPTS {
            sqlx::query(
                "INSERT INTO poly_refs (entity_type, entity_id) \
                 VALUES ($1, $2) \
                 ON CONFLICT (entity_type, entity_id) DO NOTHING",
            )
            .bind(&entity.entity_type)
            .bind(entity.entity_id)
            .execute(&mut *conn)
            .await?;

            let id: Option<DbId> = sqlx::query_scalar(
                "SELECT id FROM poly_refs \
                 WHERE entity_type = $1 AND entity_id = $2 \
                 FOR KEY SHARE",
            )
            .bind(&entity.entity_type)
            .bind(entity.entity_id)
            .fetch_optional(&mut *conn)
            .await?;
            if let Some(id) = id {
                return Ok(id);
            }
        }
        Err(sqlx::Error::RowNotFound)
    }

    /// Get-or-create every reference, returning ids in input order.
    ///
    /// Rows are resolved once each, in `(entity_type, entity_id)` order, so
    /// concurrent callers with overlapping audiences insert in the same order.
    pub async fn get_or_create_many(
        conn: &mut PgConnection,
        entities: &[PolyRef],
    ) -> Result<Vec<DbId>, sqlx::Error> {
        let mut resolved: BTreeMap<&PolyRef, DbId> =
            entities.iter().map(|entity| (entity, 0)).collect();
        for (entity, id) in resolved.iter_mut() {
            *id = Self::get_or_create(&mut *conn, entity).await?;
        }
        Ok(entities.iter().map(|entity| resolved[entity]).collect())
    }

    /// Find the stored row for `entity` without creating it.
    pub async fn find(
        pool: &PgPool,
        entity: &PolyRef,
    ) -> Result<Option<StoredPolyRef>, sqlx::Error> {
        let query =
            format!("SELECT {COLUMNS} FROM poly_refs WHERE entity_type = $1 AND entity_id = $2");
        sqlx::query_as::<_, StoredPolyRef>(&query)
            .bind(&entity.entity_type)
            .bind(entity.entity_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<StoredPolyRef>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM poly_refs WHERE id = $1");
        sqlx::query_as::<_, StoredPolyRef>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Count references no audience row points at.
    pub async fn count_unreferenced(pool: &PgPool) -> Result<i64, sqlx::Error> {
        let query = format!(
            "SELECT COUNT(*) FROM poly_refs p WHERE {}",
            unreferenced_predicate()
        );
        sqlx::query_scalar(&query).fetch_one(pool).await
    }

    /// Delete references no audience row points at. Returns rows removed.
    ///
    /// Rows locked by an in-flight [`get_or_create`](Self::get_or_create) are
    /// skipped. Audience foreign keys are `ON DELETE RESTRICT`, so a row that
    /// gained a member after this statement's snapshot fails the delete
    /// instead of dropping the member; the statement is then retried with a
    /// fresh snapshot.
    pub async fn delete_unreferenced(pool: &PgPool) -> Result<u64, sqlx::Error> {
        let query = format!(
            "DELETE FROM poly_refs WHERE id IN ( \
                 SELECT p.id FROM poly_refs p WHERE {} \
                 FOR UPDATE SKIP LOCKED)",
            unreferenced_predicate()
        );
        let mut attempt = 1;
        loop {
            match sqlx::query(&query).execute(pool).await {
                Ok(result) => return Ok(result.rows_affected()),
                Err(err) if attempt < COLLECT_ATTEMPTS && is_foreign_key_violation(&err) => {
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// PostgreSQL error 23503.
fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23503"))
}

fn unreferenced_predicate() -> String {
    format!(
        "NOT EXISTS (SELECT 1 FROM {a} f WHERE f.poly_ref_id = p.id) \
         AND NOT EXISTS (SELECT 1 FROM {n} f WHERE f.poly_ref_id = p.id)",
        a = ACTIVITY_TABLES.audience,
        n = NOTIFICATION_TABLES.audience,
    )
}
