//! Host tables and a registry describing them.
//!
//! Every test database gets a `users` table and a `posts` table carrying a
//! privacy column and a share count, plus a `teams` table with neither.

#![allow(dead_code)]

use std::sync::Arc;

use feedkit_core::entity::{EntityDescriptor, EntityRegistry, PolyRef};
use feedkit_core::event::EventKind;
use feedkit_core::types::{DbId, Viewer};
use feedkit_store::EventStore;
use sqlx::PgPool;

/// Create the host tables used by the tests.
pub async fn create_host_tables(pool: &PgPool) {
    for ddl in [
        "CREATE TABLE users (id BIGSERIAL PRIMARY KEY, username TEXT NOT NULL)",
        "CREATE TABLE posts ( \
             id BIGSERIAL PRIMARY KEY, \
             title TEXT NOT NULL, \
             privacy VARCHAR(20) NOT NULL DEFAULT 'PUBLIC', \
             share_count INTEGER NOT NULL DEFAULT 0)",
        "CREATE TABLE teams (id BIGSERIAL PRIMARY KEY, name TEXT NOT NULL)",
    ] {
        sqlx::query(ddl).execute(pool).await.unwrap();
    }
}

pub fn registry() -> Arc<EntityRegistry> {
    let registry = EntityRegistry::new(EntityDescriptor::new("user", "users").label_column("username"))
        .unwrap()
        .register(
            EntityDescriptor::new("post", "posts")
                .label_column("title")
                .privacy_column("privacy")
                .share_count_column("share_count"),
        )
        .unwrap()
        .register(EntityDescriptor::new("team", "teams"))
        .unwrap();
    Arc::new(registry)
}

/// Host tables plus an activity store over them.
pub async fn activity_store(pool: &PgPool) -> EventStore {
    create_host_tables(pool).await;
    EventStore::new(pool.clone(), EventKind::Activity, registry())
}

pub async fn create_user(pool: &PgPool, username: &str) -> DbId {
    sqlx::query_scalar("INSERT INTO users (username) VALUES ($1) RETURNING id")
        .bind(username)
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn create_post(pool: &PgPool, title: &str, privacy: &str) -> DbId {
    sqlx::query_scalar("INSERT INTO posts (title, privacy) VALUES ($1, $2) RETURNING id")
        .bind(title)
        .bind(privacy)
        .fetch_one(pool)
        .await
        .unwrap()
}

pub fn user(id: DbId) -> PolyRef {
    PolyRef::new("user", id)
}

pub fn post(id: DbId) -> PolyRef {
    PolyRef::new("post", id)
}

pub fn viewer(id: DbId) -> Viewer {
    Viewer::User(id)
}
