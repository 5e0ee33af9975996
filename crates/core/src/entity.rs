//! Polymorphic references and the registry of entity types that may be
//! referenced.
//!
//! A [`PolyRef`] is a `(entity_type, entity_id)` pair pointing at a row in
//! some host table. Which tables exist is not discovered at runtime: the host
//! application builds an [`EntityRegistry`] once at startup and hands it to
//! the store and the maintenance jobs.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::DbId;

/// Default entity type name for users.
pub const DEFAULT_USER_TYPE: &str = "user";

/// Maximum length of an entity type name (matches the `VARCHAR(100)` columns).
pub const MAX_ENTITY_TYPE_LEN: usize = 100;

// ---------------------------------------------------------------------------
// PolyRef
// ---------------------------------------------------------------------------

/// A pointer to any registered entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PolyRef {
    pub entity_type: String,
    pub entity_id: DbId,
}

impl PolyRef {
    pub fn new(entity_type: impl Into<String>, entity_id: DbId) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id,
        }
    }

    /// Build a reference from the nullable `about_type`/`about_id` column pair.
    ///
    /// Returns `None` unless both halves are present.
    pub fn from_parts(entity_type: Option<&str>, entity_id: Option<DbId>) -> Option<Self> {
        match (entity_type, entity_id) {
            (Some(t), Some(id)) => Some(Self::new(t, id)),
            _ => None,
        }
    }
}

impl fmt::Display for PolyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.entity_type, self.entity_id)
    }
}

// ---------------------------------------------------------------------------
// EntityDescriptor
// ---------------------------------------------------------------------------

fn default_id_column() -> String {
    "id".to_string()
}

/// How to find rows of one entity type in the host database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDescriptor {
    /// Stable discriminator stored in `poly_refs.entity_type` and
    /// `about_type` (e.g. `"user"`, `"post"`).
    pub name: String,
    /// Host table holding the rows, optionally schema-qualified.
    pub table: String,
    #[serde(default = "default_id_column")]
    pub id_column: String,
    /// Column used when rendering the entity in display text.
    #[serde(default)]
    pub label_column: Option<String>,
    /// Column holding the entity's own `PUBLIC`/`PRIVATE` value.
    #[serde(default)]
    pub privacy_column: Option<String>,
    /// Integer column kept in sync with the number of SHARED activities.
    #[serde(default)]
    pub share_count_column: Option<String>,
}

impl EntityDescriptor {
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            id_column: default_id_column(),
            label_column: None,
            privacy_column: None,
            share_count_column: None,
        }
    }

    pub fn id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = column.into();
        self
    }

    pub fn label_column(mut self, column: impl Into<String>) -> Self {
        self.label_column = Some(column.into());
        self
    }

    pub fn privacy_column(mut self, column: impl Into<String>) -> Self {
        self.privacy_column = Some(column.into());
        self
    }

    pub fn share_count_column(mut self, column: impl Into<String>) -> Self {
        self.share_count_column = Some(column.into());
        self
    }

    /// Human-readable type name used in display text (`"blog_post"` -> `"blog post"`).
    pub fn verbose_name(&self) -> String {
        self.name.replace('_', " ")
    }

    /// Check the name and every SQL identifier.
    ///
    /// Table and column names are interpolated into queries, so only plain
    /// identifiers (and one optional `schema.` prefix on the table) pass.
    pub fn validate(&self) -> Result<(), CoreError> {
        validate_entity_type(&self.name)?;
        validate_qualified_identifier(&self.table)?;
        validate_identifier(&self.id_column)?;
        for column in [
            &self.label_column,
            &self.privacy_column,
            &self.share_count_column,
        ]
        .into_iter()
        .flatten()
        {
            validate_identifier(column)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// EntityRegistry
// ---------------------------------------------------------------------------

/// On-disk shape of a registry (see `FEEDKIT_ENTITIES`).
#[derive(Debug, Clone, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    user_type: Option<String>,
    entities: Vec<EntityDescriptor>,
}

/// The explicit set of entity types feedkit may reference.
#[derive(Debug, Clone)]
pub struct EntityRegistry {
    user_type: String,
    entities: BTreeMap<String, EntityDescriptor>,
}

impl EntityRegistry {
    /// Create a registry whose user entity is described by `user`.
    pub fn new(user: EntityDescriptor) -> Result<Self, CoreError> {
        user.validate()?;
        let user_type = user.name.clone();
        let mut entities = BTreeMap::new();
        entities.insert(user_type.clone(), user);
        Ok(Self {
            user_type,
            entities,
        })
    }

    /// Add an entity type. Registering the same name twice is a validation error.
    pub fn register(mut self, descriptor: EntityDescriptor) -> Result<Self, CoreError> {
        descriptor.validate()?;
        if self.entities.contains_key(&descriptor.name) {
            return Err(CoreError::Validation(format!(
                "Entity type '{}' is already registered",
                descriptor.name
            )));
        }
        self.entities.insert(descriptor.name.clone(), descriptor);
        Ok(self)
    }

    /// Parse a registry from its JSON form.
    ///
    /// ```json
    /// { "user_type": "user",
    ///   "entities": [ { "name": "user", "table": "users", "label_column": "username" } ] }
    /// ```
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let file: RegistryFile = serde_json::from_str(json)
            .map_err(|e| CoreError::Validation(format!("Invalid entity registry: {e}")))?;
        let user_type = file
            .user_type
            .unwrap_or_else(|| DEFAULT_USER_TYPE.to_string());

        let mut rest = Vec::with_capacity(file.entities.len());
        let mut user = None;
        for descriptor in file.entities {
            if descriptor.name == user_type && user.is_none() {
                user = Some(descriptor);
            } else {
                rest.push(descriptor);
            }
        }
        let user = user.ok_or_else(|| {
            CoreError::Validation(format!(
                "Entity registry does not describe the user type '{user_type}'"
            ))
        })?;

        rest.into_iter()
            .try_fold(Self::new(user)?, |registry, d| registry.register(d))
    }

    pub fn user_type(&self) -> &str {
        &self.user_type
    }

    /// Reference to a user row.
    pub fn user_ref(&self, user_id: DbId) -> PolyRef {
        PolyRef::new(self.user_type.clone(), user_id)
    }

    pub fn get(&self, entity_type: &str) -> Option<&EntityDescriptor> {
        self.entities.get(entity_type)
    }

    /// Descriptor for `entity_type`, or a validation error if it was never registered.
    pub fn require(&self, entity_type: &str) -> Result<&EntityDescriptor, CoreError> {
        self.get(entity_type).ok_or_else(|| {
            CoreError::Validation(format!("Unknown entity type: '{entity_type}'"))
        })
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &EntityDescriptor> {
        self.entities.values()
    }
}

// ---------------------------------------------------------------------------
// Validation helpers
// ---------------------------------------------------------------------------

/// Validate an entity type discriminator: lowercase identifier, bounded length.
pub fn validate_entity_type(name: &str) -> Result<(), CoreError> {
    if name.is_empty() || name.len() > MAX_ENTITY_TYPE_LEN {
        return Err(CoreError::Validation(format!(
            "Entity type must be 1..={MAX_ENTITY_TYPE_LEN} characters"
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    {
        return Err(CoreError::Validation(format!(
            "Entity type '{name}' may only contain lowercase letters, digits and '_'"
        )));
    }
    Ok(())
}

/// Validate a bare SQL identifier.
pub fn validate_identifier(ident: &str) -> Result<(), CoreError> {
    let mut chars = ident.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "'{ident}' is not a valid SQL identifier"
        )))
    }
}

fn validate_qualified_identifier(ident: &str) -> Result<(), CoreError> {
    match ident.split_once('.') {
        Some((schema, table)) => {
            validate_identifier(schema)?;
            validate_identifier(table)
        }
        None => validate_identifier(ident),
    }
}
