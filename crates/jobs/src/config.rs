use std::path::{Path, PathBuf};

use feedkit_core::entity::EntityRegistry;
use feedkit_db::{ConfigError, DbConfig};

use crate::error::{JobsError, JobsResult};

/// Maintenance job configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct JobsConfig {
    pub db: DbConfig,
    /// JSON file describing the host entity tables. Only the jobs that
    /// touch host tables need it.
    pub entities_path: Option<PathBuf>,
}

impl JobsConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var              | Default  |
    /// |----------------------|----------|
    /// | `DATABASE_URL`       | required |
    /// | `DB_MAX_CONNECTIONS` | `20`     |
    /// | `FEEDKIT_ENTITIES`   | unset    |
    pub fn from_env() -> Result<Self, ConfigError> {
        let db = DbConfig::from_env()?;
        let entities_path = std::env::var_os("FEEDKIT_ENTITIES").map(PathBuf::from);

        Ok(Self { db, entities_path })
    }

    /// Use `path` instead of `FEEDKIT_ENTITIES`.
    pub fn with_entities(mut self, path: Option<PathBuf>) -> Self {
        if path.is_some() {
            self.entities_path = path;
        }
        self
    }

    /// Read and validate the entity registry file.
    pub fn load_registry(&self) -> JobsResult<EntityRegistry> {
        let path = self
            .entities_path
            .as_deref()
            .ok_or(ConfigError::Missing("FEEDKIT_ENTITIES"))?;
        load_registry(path)
    }
}

/// Read and validate an entity registry file.
pub fn load_registry(path: &Path) -> JobsResult<EntityRegistry> {
    let json = std::fs::read_to_string(path).map_err(|source| JobsError::Registry {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(EntityRegistry::from_json(&json)?)
}
