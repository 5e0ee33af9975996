//! Host tables, registry and seeding helpers shared by the job tests.

#![allow(dead_code)]

use std::sync::Arc;

use feedkit_core::entity::{EntityDescriptor, EntityRegistry, PolyRef};
use feedkit_core::event::EventKind;
use feedkit_core::types::DbId;
use feedkit_store::EventStore;
use sqlx::PgPool;

pub async fn create_host_tables(pool: &PgPool) {
    for ddl in [
        "CREATE TABLE users (id BIGSERIAL PRIMARY KEY, username TEXT NOT NULL)",
        "CREATE TABLE posts ( \
             id BIGSERIAL PRIMARY KEY, \
             title TEXT NOT NULL, \
             share_count INTEGER NOT NULL DEFAULT 0)",
        "CREATE TABLE photos (id BIGSERIAL PRIMARY KEY, caption TEXT NOT NULL)",
    ] {
        sqlx::query(ddl).execute(pool).await.unwrap();
    }
}

/// Registry with users, posts (with a share count) and photos (without).
pub fn registry() -> Arc<EntityRegistry> {
    let registry = EntityRegistry::new(EntityDescriptor::new("user", "users").label_column("username"))
        .unwrap()
        .register(
            EntityDescriptor::new("post", "posts")
                .label_column("title")
                .share_count_column("share_count"),
        )
        .unwrap()
        .register(EntityDescriptor::new("photo", "photos").label_column("caption"))
        .unwrap();
    Arc::new(registry)
}

pub fn store(pool: &PgPool, kind: EventKind) -> EventStore {
    EventStore::new(pool.clone(), kind, registry())
}

pub async fn create_user(pool: &PgPool, username: &str) -> DbId {
    sqlx::query_scalar("INSERT INTO users (username) VALUES ($1) RETURNING id")
        .bind(username)
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn create_post(pool: &PgPool, title: &str) -> DbId {
    sqlx::query_scalar("INSERT INTO posts (title) VALUES ($1) RETURNING id")
        .bind(title)
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn create_photo(pool: &PgPool, caption: &str) -> DbId {
    sqlx::query_scalar("INSERT INTO photos (caption) VALUES ($1) RETURNING id")
        .bind(caption)
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn share_count(pool: &PgPool, post_id: DbId) -> i32 {
    sqlx::query_scalar("SELECT share_count FROM posts WHERE id = $1")
        .bind(post_id)
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

pub fn photo(id: DbId) -> PolyRef {
    PolyRef::new("photo", id)
}
