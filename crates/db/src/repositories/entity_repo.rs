//! Registry-driven queries against host entity tables.
//!
//! Table and column names come from an [`EntityDescriptor`], whose
//! identifiers were validated when it was registered.

use feedkit_core::entity::EntityDescriptor;
use feedkit_core::event::Action;
use feedkit_core::types::DbId;
use sqlx::PgPool;

use crate::tables::ACTIVITY_TABLES;

/// A subject whose stored share count disagrees with its SHARED activities.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct ShareCountFix {
    pub entity_id: DbId,
    pub stored: Option<i64>,
    pub actual: i64,
}

/// Reads (and share-count writes) on host tables described by the registry.
pub struct EntityRepo;

impl EntityRepo {
    pub async fn exists(
        pool: &PgPool,
        descriptor: &EntityDescriptor,
        id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let query = format!(
            "SELECT EXISTS (SELECT 1 FROM {} WHERE {} = $1)",
            descriptor.table, descriptor.id_column
        );
        sqlx::query_scalar(&query).bind(id).fetch_one(pool).await
    }

    /// The subset of `ids` that still exist in the host table.
    pub async fn existing_ids(
        pool: &PgPool,
        descriptor: &EntityDescriptor,
        ids: &[DbId],
    ) -> Result<Vec<DbId>, sqlx::Error> {
        let query = format!(
            "SELECT {id}::BIGINT FROM {table} WHERE {id} = ANY($1)",
            id = descriptor.id_column,
            table = descriptor.table
        );
        sqlx::query_scalar(&query).bind(ids).fetch_all(pool).await
    }

    /// Display label of a row.
    ///
    /// Returns `None` if the row does not exist and `Some(None)` if it exists
    /// but the descriptor has no label column (or the label is NULL).
    pub async fn label(
        pool: &PgPool,
        descriptor: &EntityDescriptor,
        id: DbId,
    ) -> Result<Option<Option<String>>, sqlx::Error> {
        let Some(label_column) = &descriptor.label_column else {
            let exists = Self::exists(pool, descriptor, id).await?;
            return Ok(exists.then_some(None));
        };
        let query = format!(
            "SELECT {label_column}::TEXT FROM {} WHERE {} = $1",
            descriptor.table, descriptor.id_column
        );
        sqlx::query_scalar::<_, Option<String>>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Raw privacy value of a row, if the descriptor names a privacy column.
    pub async fn privacy(
        pool: &PgPool,
        descriptor: &EntityDescriptor,
        id: DbId,
    ) -> Result<Option<String>, sqlx::Error> {
        let Some(privacy_column) = &descriptor.privacy_column else {
            return Ok(None);
        };
        let query = format!(
            "SELECT {privacy_column}::TEXT FROM {} WHERE {} = $1",
            descriptor.table, descriptor.id_column
        );
        let value = sqlx::query_scalar::<_, Option<String>>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(value.flatten())
    }

    // -----------------------------------------------------------------------
    // Share counts
    // -----------------------------------------------------------------------

    /// Rows whose share count differs from the number of SHARED activities
    /// about them. Empty when the descriptor has no share-count column.
    pub async fn share_count_mismatches(
        pool: &PgPool,
        descriptor: &EntityDescriptor,
    ) -> Result<Vec<ShareCountFix>, sqlx::Error> {
        let Some(column) = &descriptor.share_count_column else {
            return Ok(Vec::new());
        };
        let query = format!(
            "SELECT t.{id}::BIGINT AS entity_id, t.{column}::BIGINT AS stored, \
                    COALESCE(s.cnt, 0) AS actual \
             FROM {table} t \
             LEFT JOIN ( \
                 SELECT about_id, COUNT(*) AS cnt FROM {events} \
                 WHERE action = $1 AND about_type = $2 \
                 GROUP BY about_id) s ON s.about_id = t.{id} \
             WHERE t.{column} IS DISTINCT FROM COALESCE(s.cnt, 0) \
             ORDER BY t.{id}",
            id = descriptor.id_column,
            table = descriptor.table,
            events = ACTIVITY_TABLES.events,
        );
        sqlx::query_as::<_, ShareCountFix>(&query)
            .bind(Action::Shared.as_str())
            .bind(&descriptor.name)
            .fetch_all(pool)
            .await
    }

    /// Set every row's share count to its number of SHARED activities,
    /// skipping rows that are already correct. Returns rows changed.
    pub async fn apply_share_counts(
        pool: &PgPool,
        descriptor: &EntityDescriptor,
    ) -> Result<u64, sqlx::Error> {
        let Some(column) = &descriptor.share_count_column else {
            return Ok(0);
        };
        let count = format!(
            "(SELECT COUNT(*) FROM {events} a \
              WHERE a.action = $1 AND a.about_type = $2 AND a.about_id = t.{id})",
            events = ACTIVITY_TABLES.events,
            id = descriptor.id_column,
        );
        let query = format!(
            "UPDATE {table} t SET {column} = {count} \
             WHERE t.{column} IS DISTINCT FROM {count}",
            table = descriptor.table,
        );
        let result = sqlx::query(&query)
            .bind(Action::Shared.as_str())
            .bind(&descriptor.name)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
