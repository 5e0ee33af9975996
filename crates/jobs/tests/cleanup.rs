//! Integration tests for stale event cleanup.

mod common;

use common::{create_host_tables, create_post, create_user, post, registry, store, user};
use feedkit_core::entity::PolyRef;
use feedkit_core::event::{Action, EventKind, Privacy, Source};
use feedkit_core::types::Viewer;
use feedkit_db::models::event::{CreateEvent, EventFilter, NewEventRow};
use feedkit_db::repositories::{EventRepo, PolyRefRepo};
use feedkit_jobs::{cleanup_stale, collect_poly_refs};
use sqlx::PgPool;

async fn delete_post(pool: &PgPool, id: i64) {
    sqlx::query("DELETE FROM posts WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .unwrap();
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_dry_run_reports_without_deleting(pool: PgPool) {
    create_host_tables(&pool).await;
    let store = store(&pool, EventKind::Activity);
    let registry = registry();
    let a = create_user(&pool, "alice").await;
    let kept = create_post(&pool, "kept").await;
    let gone = create_post(&pool, "gone").await;

    let event = CreateEvent::new(Source::User, Action::Created);
    store.create(&Viewer::User(a), event.clone().about(post(kept))).await.unwrap();
    store.create(&Viewer::User(a), event.clone().about(post(gone))).await.unwrap();
    store.create(&Viewer::User(a), event.about(post(gone))).await.unwrap();
    delete_post(&pool, gone).await;

    let first = cleanup_stale(&pool, EventKind::Activity, &registry, true).await.unwrap();
    let second = cleanup_stale(&pool, EventKind::Activity, &registry, true).await.unwrap();

    assert!(first.dry_run);
    assert_eq!(first.stale.len(), 1);
    assert_eq!(first.stale[0].about_type, "post");
    assert_eq!(first.stale[0].about_ids, vec![gone]);
    assert_eq!(first.stale_events(), 2);
    assert_eq!(first.stale, second.stale, "dry runs do not change anything");

    let remaining = store
        .get_about_object(&post(gone), &EventFilter::default())
        .await
        .unwrap();
    assert_eq!(remaining.len(), 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_live_run_deletes_stale_events_once(pool: PgPool) {
    create_host_tables(&pool).await;
    let store = store(&pool, EventKind::Activity);
    let registry = registry();
    let a = create_user(&pool, "alice").await;
    let kept = create_post(&pool, "kept").await;
    let gone = create_post(&pool, "gone").await;

    let event = CreateEvent::new(Source::User, Action::Created);
    store.create(&Viewer::User(a), event.clone().about(post(kept))).await.unwrap();
    store
        .create(&Viewer::User(a), event.about(post(gone)).ensure_for([user(a)]))
        .await
        .unwrap();
    delete_post(&pool, gone).await;

    let report = cleanup_stale(&pool, EventKind::Activity, &registry, false).await.unwrap();
    assert_eq!(report.stale_events(), 1);

    let filter = EventFilter::default();
    assert!(store.get_about_object(&post(gone), &filter).await.unwrap().is_empty());
    assert_eq!(store.get_about_object(&post(kept), &filter).await.unwrap().len(), 1);

    let again = cleanup_stale(&pool, EventKind::Activity, &registry, false).await.unwrap();
    assert!(again.stale.is_empty());
    assert_eq!(again.types_checked, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_unregistered_types_are_skipped(pool: PgPool) {
    create_host_tables(&pool).await;
    let registry = registry();
    let about = PolyRef::new("legacy_item", 1);
    let mut conn = pool.acquire().await.unwrap();
    EventRepo::insert(
        &mut conn,
        EventKind::Notification,
        &NewEventRow {
            created_user_id: 1,
            text: Some("imported"),
            about: Some(&about),
            source: Source::System,
            action: Action::Created,
            privacy: Privacy::Public,
        },
    )
    .await
    .unwrap();
    drop(conn);

    let report = cleanup_stale(&pool, EventKind::Notification, &registry, false)
        .await
        .unwrap();
    assert_eq!(report.skipped_types, vec!["legacy_item".to_string()]);
    assert_eq!(report.types_checked, 0);
    assert!(report.stale.is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_collect_poly_refs_after_cleanup(pool: PgPool) {
    create_host_tables(&pool).await;
    let store = store(&pool, EventKind::Activity);
    let registry = registry();
    let a = create_user(&pool, "alice").await;
    let gone = create_post(&pool, "gone").await;

    store
        .create(
            &Viewer::User(a),
            CreateEvent::new(Source::User, Action::Created).about(post(gone)),
        )
        .await
        .unwrap();
    delete_post(&pool, gone).await;
    cleanup_stale(&pool, EventKind::Activity, &registry, false).await.unwrap();

    assert_eq!(collect_poly_refs(&pool, true).await.unwrap(), 1);
    assert_eq!(collect_poly_refs(&pool, false).await.unwrap(), 1);
    assert!(PolyRefRepo::find(&pool, &post(gone)).await.unwrap().is_none());
    assert_eq!(collect_poly_refs(&pool, false).await.unwrap(), 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_collect_poly_refs_alongside_creates_keeps_audiences(pool: PgPool) {
    create_host_tables(&pool).await;
    let store = store(&pool, EventKind::Activity);
    let a = create_user(&pool, "alice").await;

    for round in 0..50 {
        let p = create_post(&pool, &format!("post {round}")).await;
        // Leave the subject's row unreferenced so both sides race for it.
        let mut conn = pool.acquire().await.unwrap();
        PolyRefRepo::get_or_create(&mut conn, &post(p)).await.unwrap();
        drop(conn);

        let create = tokio::spawn({
            let store = store.clone();
            async move {
                store
                    .create(
                        &Viewer::User(a),
                        CreateEvent::new(Source::User, Action::Updated).about(post(p)),
                    )
                    .await
            }
        });
        let collect = tokio::spawn({
            let pool = pool.clone();
            async move { collect_poly_refs(&pool, false).await }
        });

        let event = create.await.unwrap().unwrap();
        collect.await.unwrap().unwrap();

        assert_eq!(
            store.get_for_objects(event.id).await.unwrap(),
            vec![post(p)],
            "round {round}"
        );
    }
}
