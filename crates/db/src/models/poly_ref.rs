//! Polymorphic reference rows.

use feedkit_core::entity::PolyRef;
use feedkit_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `poly_refs` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StoredPolyRef {
    pub id: DbId,
    pub entity_type: String,
    pub entity_id: DbId,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl StoredPolyRef {
    pub fn to_ref(&self) -> PolyRef {
        PolyRef::new(self.entity_type.clone(), self.entity_id)
    }
}
