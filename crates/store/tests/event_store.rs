//! Integration tests for the event store.
//!
//! Covers creation and audience fan-out, feed visibility for anonymous
//! viewers, members and strangers, share idempotence and toggling, subject
//! lifecycle hooks, creator-only writes and display text.

mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use common::{activity_store, create_post, create_user, post, registry, user, viewer};
use feedkit_core::error::CoreError;
use feedkit_core::event::{Action, EventKind, Privacy, Source};
use feedkit_core::text::{TextContext, TextRenderer};
use feedkit_core::types::Viewer;
use feedkit_db::models::event::{CreateEvent, EventFilter, NewEventRow, UpdateEvents};
use feedkit_db::repositories::EventRepo;
use feedkit_store::{EventStore, ShareToggle, StoreError};
use sqlx::PgPool;

fn created() -> CreateEvent {
    CreateEvent::new(Source::User, Action::Created)
}

fn feed_ids(events: &[feedkit_db::models::event::Event]) -> Vec<i64> {
    events.iter().map(|e| e.id).collect()
}

// ---------------------------------------------------------------------------
// Create and audience
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_audience_contains_about_and_ensured_objects(pool: PgPool) {
    let store = activity_store(&pool).await;
    let a = create_user(&pool, "alice").await;
    let b = create_user(&pool, "bob").await;
    let c = create_user(&pool, "carol").await;

    let event = store
        .create(
            &viewer(a),
            created().about(user(a)).ensure_for([user(b), user(c), user(a)]),
        )
        .await
        .unwrap();

    let audience = store.get_for_objects(event.id).await.unwrap();
    assert_eq!(audience, vec![user(a), user(b), user(c)]);

    for id in [a, b, c] {
        let feed = store
            .get_for_user(id, &viewer(id), &EventFilter::default())
            .await
            .unwrap();
        assert_eq!(feed_ids(&feed), vec![event.id], "event missing from feed of {id}");
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_excluded_objects_leave_the_audience(pool: PgPool) {
    let store = activity_store(&pool).await;
    let a = create_user(&pool, "alice").await;
    let b = create_user(&pool, "bob").await;

    let event = store
        .create(
            &viewer(a),
            created()
                .about(user(a))
                .ensure_for([user(b)])
                .exclude([user(a)]),
        )
        .await
        .unwrap();

    assert_eq!(store.get_for_objects(event.id).await.unwrap(), vec![user(b)]);
    assert_eq!(event.about(), Some(user(a)), "exclusion does not change the subject");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_create_validates_input(pool: PgPool) {
    let store = activity_store(&pool).await;
    let a = create_user(&pool, "alice").await;

    let err = store.create(&Viewer::Anonymous, created()).await.unwrap_err();
    assert_matches!(err, StoreError::Core(CoreError::Validation(_)));

    let comment = CreateEvent::new(Source::User, Action::Commented).text("   ");
    let err = store.create(&viewer(a), comment).await.unwrap_err();
    assert_matches!(err, StoreError::Core(CoreError::Validation(_)));

    let unknown = created().about(feedkit_core::entity::PolyRef::new("photo", 1));
    let err = store.create(&viewer(a), unknown).await.unwrap_err();
    assert_matches!(err, StoreError::Core(CoreError::Validation(_)));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_text_is_trimmed_and_blank_text_dropped(pool: PgPool) {
    let store = activity_store(&pool).await;
    let a = create_user(&pool, "alice").await;

    let trimmed = store
        .create(&viewer(a), created().text("  hello  "))
        .await
        .unwrap();
    assert_eq!(trimmed.text.as_deref(), Some("hello"));

    let blank = store.create(&viewer(a), created().text("  ")).await.unwrap();
    assert_eq!(blank.text, None);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_notification_store_rejects_activity_only_actions(pool: PgPool) {
    common::create_host_tables(&pool).await;
    let store = EventStore::new(pool.clone(), EventKind::Notification, registry());
    let a = create_user(&pool, "alice").await;

    let err = store
        .create(&viewer(a), CreateEvent::new(Source::System, Action::Uploaded))
        .await
        .unwrap_err();
    assert_matches!(err, StoreError::Core(CoreError::Validation(_)));

    let ok = store
        .create(&viewer(a), CreateEvent::new(Source::System, Action::Updated).about(user(a)))
        .await
        .unwrap();
    assert_eq!(store.find_by_id(ok.id).await.unwrap().action, Action::Updated);
}

// ---------------------------------------------------------------------------
// Visibility
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_default_privacy_is_public_and_visible_to_anonymous(pool: PgPool) {
    let store = activity_store(&pool).await;
    let a = create_user(&pool, "alice").await;

    let event = store.create(&viewer(a), created().about(user(a))).await.unwrap();
    assert_eq!(event.privacy, Privacy::Public);

    let feed = store
        .get_for_user(a, &Viewer::Anonymous, &EventFilter::default())
        .await
        .unwrap();
    assert_eq!(feed_ids(&feed), vec![event.id]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_private_event_is_hidden_from_non_members(pool: PgPool) {
    let store = activity_store(&pool).await;
    let a = create_user(&pool, "alice").await;
    let b = create_user(&pool, "bob").await;
    let c = create_user(&pool, "carol").await;

    let event = store
        .create(
            &viewer(a),
            created()
                .about(user(a))
                .ensure_for([user(b)])
                .privacy(Privacy::Private),
        )
        .await
        .unwrap();
    let filter = EventFilter::default();

    let stranger = store.get_for_user(a, &viewer(c), &filter).await.unwrap();
    assert!(stranger.is_empty());
    let anonymous = store.get_for_user(a, &Viewer::Anonymous, &filter).await.unwrap();
    assert!(anonymous.is_empty());

    let member = store.get_for_user(a, &viewer(b), &filter).await.unwrap();
    assert_eq!(feed_ids(&member), vec![event.id]);
    let owner = store.get_for_user(a, &viewer(a), &filter).await.unwrap();
    assert_eq!(feed_ids(&owner), vec![event.id]);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_custom_event_is_visible_to_grantees_only(pool: PgPool) {
    let store = activity_store(&pool).await;
    let a = create_user(&pool, "alice").await;
    let b = create_user(&pool, "bob").await;
    let c = create_user(&pool, "carol").await;
    let d = create_user(&pool, "dave").await;

    let event = store
        .create(
            &viewer(b),
            created()
                .about(user(a))
                .ensure_for([user(c)])
                .privacy(Privacy::Custom),
        )
        .await
        .unwrap();
    let filter = EventFilter::default();

    let grantee = store.get_for_user(a, &viewer(c), &filter).await.unwrap();
    assert_eq!(feed_ids(&grantee), vec![event.id]);
    let creator = store.get_for_user(a, &viewer(b), &filter).await.unwrap();
    assert_eq!(feed_ids(&creator), vec![event.id], "creators always see their events");
    let stranger = store.get_for_user(a, &viewer(d), &filter).await.unwrap();
    assert!(stranger.is_empty());

    assert_eq!(store.find_visible(&viewer(c), event.id).await.unwrap().id, event.id);
    let err = store.find_visible(&viewer(d), event.id).await.unwrap_err();
    assert_matches!(err, StoreError::Core(CoreError::NotFound { .. }));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_anonymous_privacy_filter_yields_nothing(pool: PgPool) {
    let store = activity_store(&pool).await;
    let a = create_user(&pool, "alice").await;
    store
        .create(&viewer(a), created().about(user(a)).privacy(Privacy::Private))
        .await
        .unwrap();

    let filter = EventFilter {
        privacy: Some(Privacy::Private),
        ..EventFilter::default()
    };
    let feed = store.get_for_user(a, &Viewer::Anonymous, &filter).await.unwrap();
    assert!(feed.is_empty());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_privacy_is_inherited_from_subject(pool: PgPool) {
    let store = activity_store(&pool).await;
    let a = create_user(&pool, "alice").await;
    let secret = create_post(&pool, "Secret", "PRIVATE").await;
    let open = create_post(&pool, "Open", "PUBLIC").await;

    let inherited = store.create(&viewer(a), created().about(post(secret))).await.unwrap();
    assert_eq!(inherited.privacy, Privacy::Private);

    let public = store.create(&viewer(a), created().about(post(open))).await.unwrap();
    assert_eq!(public.privacy, Privacy::Public);

    let explicit = store
        .create(&viewer(a), created().about(post(secret)).privacy(Privacy::Custom))
        .await
        .unwrap();
    assert_eq!(explicit.privacy, Privacy::Custom);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_hide_for_removes_event_from_one_feed(pool: PgPool) {
    let store = activity_store(&pool).await;
    let a = create_user(&pool, "alice").await;
    let b = create_user(&pool, "bob").await;

    let event = store
        .create(&viewer(a), created().about(user(a)).ensure_for([user(b)]))
        .await
        .unwrap();

    assert!(store.hide_for(&viewer(b), event.id).await.unwrap());
    assert!(!store.hide_for(&viewer(b), event.id).await.unwrap());

    let filter = EventFilter::default();
    assert!(store.get_for_user(b, &viewer(b), &filter).await.unwrap().is_empty());
    assert_eq!(store.get_for_user(a, &viewer(a), &filter).await.unwrap().len(), 1);
}

// ---------------------------------------------------------------------------
// Shares
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_share_is_idempotent(pool: PgPool) {
    let store = activity_store(&pool).await;
    let a = create_user(&pool, "alice").await;
    let p = create_post(&pool, "Hello", "PUBLIC").await;

    let share = || CreateEvent::new(Source::User, Action::Shared).about(post(p));
    let first = store.create(&viewer(a), share()).await.unwrap();
    let second = store.create(&viewer(a), share()).await.unwrap();
    assert_eq!(first.id, second.id);

    let shares = store
        .get_about_object(&post(p), &EventFilter::action(Action::Shared))
        .await
        .unwrap();
    assert_eq!(shares.len(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_toggle_share_alternates(pool: PgPool) {
    let store = activity_store(&pool).await;
    let a = create_user(&pool, "alice").await;
    let p = create_post(&pool, "Hello", "PUBLIC").await;

    let shared = store.toggle_share(&viewer(a), post(p)).await.unwrap();
    let shared = assert_matches!(shared, ShareToggle::Shared(event) => event);
    assert_eq!(
        store.get_for_objects(shared.id).await.unwrap(),
        vec![post(p), user(a)]
    );

    let unshared = store.toggle_share(&viewer(a), post(p)).await.unwrap();
    assert_matches!(unshared, ShareToggle::Unshared(id) if id == shared.id);

    let again = store.toggle_share(&viewer(a), post(p)).await.unwrap();
    assert_matches!(again, ShareToggle::Shared(event) if event.id != shared.id);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_share_requires_subject(pool: PgPool) {
    let store = activity_store(&pool).await;
    let a = create_user(&pool, "alice").await;

    let err = store
        .create(&viewer(a), CreateEvent::new(Source::User, Action::Shared))
        .await
        .unwrap_err();
    assert_matches!(err, StoreError::Core(CoreError::Validation(_)));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_duplicate_share_row_is_a_conflict(pool: PgPool) {
    let about = post(1);
    let row = NewEventRow {
        created_user_id: 1,
        text: None,
        about: Some(&about),
        source: Source::User,
        action: Action::Shared,
        privacy: Privacy::Public,
    };
    let mut conn = pool.acquire().await.unwrap();
    EventRepo::insert(&mut conn, EventKind::Activity, &row).await.unwrap();
    let err = EventRepo::insert(&mut conn, EventKind::Activity, &row)
        .await
        .unwrap_err();

    let err = StoreError::from(err);
    assert!(err.is_conflict(), "unexpected error: {err}");
}

// ---------------------------------------------------------------------------
// Subject lifecycle
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_updates_for_about_objects(pool: PgPool) {
    let store = activity_store(&pool).await;
    let a = create_user(&pool, "alice").await;
    let p1 = create_post(&pool, "One", "PUBLIC").await;
    let p2 = create_post(&pool, "Two", "PUBLIC").await;

    for p in [p1, p1, p2] {
        store.create(&viewer(a), created().about(post(p))).await.unwrap();
    }

    let update = UpdateEvents::privacy(Privacy::Private);
    assert_eq!(store.updates_for_about_object(&post(p1), &update).await.unwrap(), 2);
    assert_eq!(
        store
            .updates_for_about_objects(&[post(p1), post(p2)], &update)
            .await
            .unwrap(),
        1
    );

    let err = store
        .updates_for_about_object(&post(p1), &UpdateEvents::default())
        .await
        .unwrap_err();
    assert_matches!(err, StoreError::Core(CoreError::Validation(_)));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_delete_all_about_object(pool: PgPool) {
    let store = activity_store(&pool).await;
    let a = create_user(&pool, "alice").await;
    let p = create_post(&pool, "Doomed", "PUBLIC").await;

    store.create(&viewer(a), created().about(post(p))).await.unwrap();
    store
        .create(&viewer(a), created().about(post(p)).ensure_for([user(a)]))
        .await
        .unwrap();

    assert_eq!(store.delete_all_about_object(&post(p)).await.unwrap(), 2);
    let feed = store
        .get_for_user(a, &viewer(a), &EventFilter::default())
        .await
        .unwrap();
    assert!(feed.is_empty(), "audience rows cascade with their events");
}

// ---------------------------------------------------------------------------
// Creator-only writes
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_only_creator_may_edit_or_delete(pool: PgPool) {
    let store = activity_store(&pool).await;
    let a = create_user(&pool, "alice").await;
    let b = create_user(&pool, "bob").await;

    let event = store.create(&viewer(a), created().text("draft")).await.unwrap();

    let err = store.edit_text(&viewer(b), event.id, Some("hijack")).await.unwrap_err();
    assert_matches!(err, StoreError::Core(CoreError::Forbidden(_)));
    let err = store.delete(&viewer(b), event.id).await.unwrap_err();
    assert_matches!(err, StoreError::Core(CoreError::Forbidden(_)));

    let edited = store.edit_text(&viewer(a), event.id, Some(" final ")).await.unwrap();
    assert_eq!(edited.text.as_deref(), Some("final"));

    store.delete(&viewer(a), event.id).await.unwrap();
    let err = store.find_by_id(event.id).await.unwrap_err();
    assert_matches!(err, StoreError::Core(CoreError::NotFound { .. }));
}

// ---------------------------------------------------------------------------
// Display text and resolution
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_display_text_is_built_from_labels(pool: PgPool) {
    let store = activity_store(&pool).await;
    let a = create_user(&pool, "jane").await;
    let p = create_post(&pool, "Hello", "PUBLIC").await;

    let created_event = store.create(&viewer(a), created().about(post(p))).await.unwrap();
    assert_eq!(
        store.display_text(&created_event).await.unwrap(),
        "jane created the post Hello"
    );

    let comment = store
        .create(
            &viewer(a),
            CreateEvent::new(Source::User, Action::Commented)
                .about(post(p))
                .text("Nice"),
        )
        .await
        .unwrap();
    assert_eq!(store.display_text(&comment).await.unwrap(), "Nice");

    let bare = store.create(&viewer(a), created()).await.unwrap();
    assert_eq!(store.display_text(&bare).await.unwrap(), "jane created");
}

struct Shouting;

impl TextRenderer for Shouting {
    fn render(&self, ctx: &TextContext<'_>) -> String {
        format!("{} {}!", ctx.actor, ctx.action).to_uppercase()
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_custom_renderer_is_used(pool: PgPool) {
    let store = activity_store(&pool).await.with_renderer(Arc::new(Shouting));
    let a = create_user(&pool, "jane").await;

    let event = store.create(&viewer(a), created()).await.unwrap();
    assert_eq!(store.display_text(&event).await.unwrap(), "JANE CREATED!");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_resolve_reports_missing_rows(pool: PgPool) {
    let store = activity_store(&pool).await;
    let p = create_post(&pool, "Hello", "PUBLIC").await;

    let resolved = store.resolve(&post(p)).await.unwrap();
    assert_eq!(resolved.label.as_deref(), Some("Hello"));

    let err = store.resolve(&post(p + 100)).await.unwrap_err();
    assert_matches!(err, StoreError::Core(CoreError::NotFound { .. }));
}
