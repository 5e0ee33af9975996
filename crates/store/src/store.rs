//! The event store service.
//!
//! [`EventStore`] validates input, applies defaults and runs each write in
//! the transaction it needs. It is the only place that combines the
//! repositories; they never call each other.

use std::sync::Arc;

use feedkit_core::audience::resolve_audience;
use feedkit_core::entity::{EntityRegistry, PolyRef};
use feedkit_core::error::CoreError;
use feedkit_core::event::{Action, EventKind, Privacy, Source};
use feedkit_core::text::{
    clean_reply_text, normalize_text, DefaultTextRenderer, TextContext, TextRenderer,
};
use feedkit_core::types::{DbId, Viewer};
use feedkit_core::visibility::Visibility;
use feedkit_db::models::event::{CreateEvent, Event, EventFilter, NewEventRow, UpdateEvents};
use feedkit_db::models::reply::{CreateReply, Reply};
use feedkit_db::repositories::{EntityRepo, EventRepo, PolyRefRepo, ReplyRepo};
use feedkit_db::DbPool;
use serde::Serialize;
use sqlx::PgConnection;

use crate::error::StoreResult;

/// Outcome of [`EventStore::toggle_share`].
#[derive(Debug, Clone)]
pub enum ShareToggle {
    /// A SHARED event was created.
    Shared(Event),
    /// The existing SHARED event with this id was removed.
    Unshared(DbId),
}

/// A dereferenced [`PolyRef`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedEntity {
    pub reference: PolyRef,
    /// Value of the descriptor's label column, if it has one.
    pub label: Option<String>,
}

/// A create request after validation and defaulting.
struct PreparedEvent {
    text: Option<String>,
    about: Option<PolyRef>,
    source: Source,
    action: Action,
    privacy: Privacy,
    audience: Vec<PolyRef>,
}

/// Records and reads events of one [`EventKind`].
#[derive(Clone)]
pub struct EventStore {
    pool: DbPool,
    kind: EventKind,
    registry: Arc<EntityRegistry>,
    renderer: Arc<dyn TextRenderer>,
}

impl EventStore {
    /// Create a store using the [`DefaultTextRenderer`].
    pub fn new(pool: DbPool, kind: EventKind, registry: Arc<EntityRegistry>) -> Self {
        Self {
            pool,
            kind,
            registry,
            renderer: Arc::new(DefaultTextRenderer),
        }
    }

    /// Replace the renderer used by [`display_text`](Self::display_text).
    pub fn with_renderer(mut self, renderer: Arc<dyn TextRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    // -----------------------------------------------------------------------
    // Create
    // -----------------------------------------------------------------------

    /// Record a new event and attach its audience.
    ///
    /// A SHARED event the actor already holds on the same subject is
    /// returned as is. A concurrent duplicate share fails with
    /// [`CoreError::Conflict`].
    pub async fn create(&self, actor: &Viewer, input: CreateEvent) -> StoreResult<Event> {
        let user_id = actor.require_user()?;
        let prepared = self.prepare(input).await?;

        let mut tx = self.pool.begin().await?;
        if prepared.action.is_toggle() {
            if let Some(about) = &prepared.about {
                if let Some(existing) =
                    EventRepo::find_share(&mut *tx, self.kind, user_id, about).await?
                {
                    tx.commit().await?;
                    tracing::debug!(
                        kind = %self.kind,
                        event_id = existing.id,
                        "Share already recorded"
                    );
                    return Ok(existing);
                }
            }
        }
        let event = self.insert_prepared(&mut tx, user_id, &prepared).await?;
        tx.commit().await?;

        tracing::info!(
            kind = %self.kind,
            event_id = event.id,
            action = %event.action,
            audience = prepared.audience.len(),
            "Event recorded"
        );
        Ok(event)
    }

    /// Share `about` if the actor has not shared it yet, otherwise unshare it.
    ///
    /// The SHARED event's audience is the subject and the actor.
    pub async fn toggle_share(&self, actor: &Viewer, about: PolyRef) -> StoreResult<ShareToggle> {
        let user_id = actor.require_user()?;
        let input = CreateEvent::new(Source::User, Action::Shared)
            .about(about.clone())
            .ensure_for([self.registry.user_ref(user_id)]);
        let prepared = self.prepare(input).await?;

        let mut tx = self.pool.begin().await?;
        if let Some(existing) = EventRepo::find_share(&mut *tx, self.kind, user_id, &about).await? {
            EventRepo::delete(&mut *tx, self.kind, existing.id).await?;
            tx.commit().await?;
            tracing::info!(kind = %self.kind, event_id = existing.id, about = %about, "Unshared");
            return Ok(ShareToggle::Unshared(existing.id));
        }
        let event = self.insert_prepared(&mut tx, user_id, &prepared).await?;
        tx.commit().await?;

        tracing::info!(kind = %self.kind, event_id = event.id, about = %about, "Shared");
        Ok(ShareToggle::Shared(event))
    }

    async fn prepare(&self, input: CreateEvent) -> StoreResult<PreparedEvent> {
        self.kind.check_action(input.action)?;

        let text = normalize_text(input.text.as_deref());
        if input.action == Action::Commented && text.is_none() {
            return Err(CoreError::Validation("Comment text is required".to_string()).into());
        }
        if input.action.is_toggle() && input.about.is_none() {
            return Err(CoreError::Validation("A share needs a subject".to_string()).into());
        }
        for obj in input.about.iter().chain(&input.ensure_for_objs) {
            self.registry.require(&obj.entity_type)?;
        }

        let privacy = match input.privacy {
            Some(privacy) => privacy,
            None => self.inherited_privacy(input.about.as_ref()).await?,
        };
        let audience = resolve_audience(
            input.about.as_ref(),
            &input.ensure_for_objs,
            &input.exclude_objs,
        );

        Ok(PreparedEvent {
            text,
            about: input.about,
            source: input.source,
            action: input.action,
            privacy,
            audience,
        })
    }

    /// Privacy copied from the subject's privacy column, PUBLIC otherwise.
    async fn inherited_privacy(&self, about: Option<&PolyRef>) -> StoreResult<Privacy> {
        let Some(about) = about else {
            return Ok(Privacy::Public);
        };
        let descriptor = self.registry.require(&about.entity_type)?;
        let value = EntityRepo::privacy(&self.pool, descriptor, about.entity_id).await?;
        Ok(Privacy::inherit_from(value.as_deref()))
    }

    async fn insert_prepared(
        &self,
        conn: &mut PgConnection,
        user_id: DbId,
        prepared: &PreparedEvent,
    ) -> StoreResult<Event> {
        let row = NewEventRow {
            created_user_id: user_id,
            text: prepared.text.as_deref(),
            about: prepared.about.as_ref(),
            source: prepared.source,
            action: prepared.action,
            privacy: prepared.privacy,
        };
        let event = EventRepo::insert(&mut *conn, self.kind, &row).await?;
        let poly_ref_ids = PolyRefRepo::get_or_create_many(&mut *conn, &prepared.audience).await?;
        EventRepo::attach_audience(&mut *conn, self.kind, event.id, &poly_ref_ids).await?;
        Ok(event)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub async fn find_by_id(&self, id: DbId) -> StoreResult<Event> {
        EventRepo::find_by_id(&self.pool, self.kind, id)
            .await?
            .ok_or_else(|| CoreError::not_found(self.kind.as_str(), id).into())
    }

    /// Fetch one event if `viewer` may see it.
    ///
    /// Invisible events are reported as not found.
    pub async fn find_visible(&self, viewer: &Viewer, id: DbId) -> StoreResult<Event> {
        let event = self.find_by_id(id).await?;
        let visibility = Visibility::for_event(viewer);
        let in_audience = match viewer.user_id() {
            Some(user_id) => {
                EventRepo::is_member(&self.pool, self.kind, id, &self.registry.user_ref(user_id))
                    .await?
            }
            None => false,
        };
        if visibility.admits(event.privacy, event.created_user_id, in_audience) {
            Ok(event)
        } else {
            Err(CoreError::not_found(self.kind.as_str(), id).into())
        }
    }

    /// Events in the feed of `obj` that `viewer` may see, newest first.
    pub async fn get_for_object(
        &self,
        obj: &PolyRef,
        viewer: &Viewer,
        filter: &EventFilter,
    ) -> StoreResult<Vec<Event>> {
        let visibility = Visibility::for_feed(viewer, obj, self.registry.user_type());
        let events = EventRepo::list_for_object(
            &self.pool,
            self.kind,
            obj,
            visibility,
            self.registry.user_type(),
            filter,
        )
        .await?;
        tracing::debug!(kind = %self.kind, obj = %obj, count = events.len(), "Feed loaded");
        Ok(events)
    }

    /// Feed of a user.
    pub async fn get_for_user(
        &self,
        user_id: DbId,
        viewer: &Viewer,
        filter: &EventFilter,
    ) -> StoreResult<Vec<Event>> {
        self.get_for_object(&self.registry.user_ref(user_id), viewer, filter)
            .await
    }

    /// Events whose subject is `about`, newest first. No visibility filter.
    pub async fn get_about_object(
        &self,
        about: &PolyRef,
        filter: &EventFilter,
    ) -> StoreResult<Vec<Event>> {
        Ok(EventRepo::list_about_object(&self.pool, self.kind, about, filter).await?)
    }

    /// The audience of an event, in attach order.
    pub async fn get_for_objects(&self, event_id: DbId) -> StoreResult<Vec<PolyRef>> {
        Ok(EventRepo::list_audience(&self.pool, self.kind, event_id).await?)
    }

    // -----------------------------------------------------------------------
    // Subject lifecycle
    // -----------------------------------------------------------------------

    /// Delete every event about `about`.
    pub async fn delete_all_about_object(&self, about: &PolyRef) -> StoreResult<u64> {
        let deleted = EventRepo::delete_about_object(&self.pool, self.kind, about).await?;
        tracing::info!(kind = %self.kind, about = %about, deleted, "Deleted events about object");
        Ok(deleted)
    }

    pub async fn updates_for_about_object(
        &self,
        about: &PolyRef,
        update: &UpdateEvents,
    ) -> StoreResult<u64> {
        self.updates_for_about_objects(std::slice::from_ref(about), update)
            .await
    }

    /// Apply `update` to the events of every subject in `abouts`.
    ///
    /// Returns the number of rows that actually changed.
    pub async fn updates_for_about_objects(
        &self,
        abouts: &[PolyRef],
        update: &UpdateEvents,
    ) -> StoreResult<u64> {
        if update.is_empty() {
            return Err(CoreError::Validation("Nothing to update".to_string()).into());
        }
        let updated =
            EventRepo::update_about_objects(&self.pool, self.kind, abouts, update).await?;
        tracing::info!(
            kind = %self.kind,
            subjects = abouts.len(),
            updated,
            "Updated events about objects"
        );
        Ok(updated)
    }

    // -----------------------------------------------------------------------
    // Per-event writes
    // -----------------------------------------------------------------------

    /// Replace an event's text. Only its creator may do this.
    pub async fn edit_text(
        &self,
        actor: &Viewer,
        id: DbId,
        text: Option<&str>,
    ) -> StoreResult<Event> {
        let user_id = actor.require_user()?;
        let event = self.find_by_id(id).await?;
        ensure_creator(event.created_user_id, user_id, "edit this event")?;

        let text = normalize_text(text);
        if event.action == Action::Commented && text.is_none() {
            return Err(CoreError::Validation("Comment text is required".to_string()).into());
        }
        EventRepo::update_text(&self.pool, self.kind, id, text.as_deref(), user_id)
            .await?
            .ok_or_else(|| CoreError::not_found(self.kind.as_str(), id).into())
    }

    /// Delete an event with its audience and replies. Only its creator may
    /// do this.
    pub async fn delete(&self, actor: &Viewer, id: DbId) -> StoreResult<()> {
        let user_id = actor.require_user()?;
        let event = self.find_by_id(id).await?;
        ensure_creator(event.created_user_id, user_id, "delete this event")?;

        EventRepo::delete(&self.pool, self.kind, id).await?;
        tracing::info!(kind = %self.kind, event_id = id, user_id, "Event deleted");
        Ok(())
    }

    /// Remove the viewer from an event's audience so it leaves their feed.
    ///
    /// Returns `false` if the viewer was not in the audience.
    pub async fn hide_for(&self, viewer: &Viewer, id: DbId) -> StoreResult<bool> {
        let user_id = viewer.require_user()?;
        let removed =
            EventRepo::remove_member(&self.pool, self.kind, id, &self.registry.user_ref(user_id))
                .await?;
        if removed {
            tracing::debug!(kind = %self.kind, event_id = id, user_id, "Event hidden");
        }
        Ok(removed)
    }

    // -----------------------------------------------------------------------
    // Display
    // -----------------------------------------------------------------------

    /// Stored text, or text built by the renderer from the creator, action
    /// and subject.
    pub async fn display_text(&self, event: &Event) -> StoreResult<String> {
        if let Some(text) = &event.text {
            return Ok(text.clone());
        }

        let actor_ref = self.registry.user_ref(event.created_user_id);
        let actor = self
            .label_of(&actor_ref)
            .await?
            .unwrap_or_else(|| actor_ref.to_string());

        let (about_type, about) = match event.about() {
            Some(about) => {
                let verbose = self
                    .registry
                    .get(&about.entity_type)
                    .map(|d| d.verbose_name())
                    .unwrap_or_else(|| about.entity_type.replace('_', " "));
                (Some(verbose), self.label_of(&about).await?)
            }
            None => (None, None),
        };

        Ok(self.renderer.render(&TextContext {
            action: event.action,
            actor: &actor,
            about_type: about_type.as_deref(),
            about: about.as_deref(),
        }))
    }

    /// Label of a registered row; `None` for unknown types and missing rows.
    async fn label_of(&self, entity: &PolyRef) -> StoreResult<Option<String>> {
        let Some(descriptor) = self.registry.get(&entity.entity_type) else {
            return Ok(None);
        };
        let label = EntityRepo::label(&self.pool, descriptor, entity.entity_id).await?;
        Ok(label.flatten())
    }

    /// Look up the host row a reference points at.
    pub async fn resolve(&self, entity: &PolyRef) -> StoreResult<ResolvedEntity> {
        let descriptor = self.registry.require(&entity.entity_type)?;
        match EntityRepo::label(&self.pool, descriptor, entity.entity_id).await? {
            Some(label) => Ok(ResolvedEntity {
                reference: entity.clone(),
                label,
            }),
            None => Err(CoreError::not_found(&entity.entity_type, entity.entity_id).into()),
        }
    }

    // -----------------------------------------------------------------------
    // Replies
    // -----------------------------------------------------------------------

    /// Add a reply. `reply_to_id` must name a reply of the same event.
    ///
    /// The event and the replied-to reply stay locked until the insert
    /// commits, so a concurrent delete cannot turn into a foreign key error.
    pub async fn add_reply(
        &self,
        actor: &Viewer,
        event_id: DbId,
        input: CreateReply,
    ) -> StoreResult<Reply> {
        let user_id = actor.require_user()?;
        let text = clean_reply_text(&input.text)?;

        let mut tx = self.pool.begin().await?;
        if !EventRepo::lock_existing(&mut *tx, self.kind, event_id).await? {
            return Err(CoreError::not_found(self.kind.as_str(), event_id).into());
        }
        if let Some(reply_to_id) = input.reply_to_id {
            if !ReplyRepo::lock_existing(&mut *tx, self.kind, event_id, reply_to_id).await? {
                return Err(CoreError::Validation(format!(
                    "Reply {reply_to_id} does not belong to {} {event_id}",
                    self.kind
                ))
                .into());
            }
        }

        let reply = ReplyRepo::create(
            &mut *tx,
            self.kind,
            event_id,
            user_id,
            &text,
            input.reply_to_id,
        )
        .await?;
        tx.commit().await?;
        tracing::info!(kind = %self.kind, event_id, reply_id = reply.id, "Reply added");
        Ok(reply)
    }

    /// Replies of an event, oldest first.
    pub async fn get_replies(&self, event_id: DbId) -> StoreResult<Vec<Reply>> {
        self.find_by_id(event_id).await?;
        Ok(ReplyRepo::list_for_event(&self.pool, self.kind, event_id).await?)
    }

    pub async fn get_reply(&self, event_id: DbId, reply_id: DbId) -> StoreResult<Reply> {
        ReplyRepo::find(&self.pool, self.kind, event_id, reply_id)
            .await?
            .ok_or_else(|| CoreError::not_found("reply", reply_id).into())
    }

    /// Replace a reply's text. Only its creator may do this.
    pub async fn edit_reply(
        &self,
        actor: &Viewer,
        event_id: DbId,
        reply_id: DbId,
        text: &str,
    ) -> StoreResult<Reply> {
        let user_id = actor.require_user()?;
        let text = clean_reply_text(text)?;
        let reply = self.get_reply(event_id, reply_id).await?;
        ensure_creator(reply.created_user_id, user_id, "edit this reply")?;

        ReplyRepo::update_text(&self.pool, self.kind, event_id, reply_id, &text, user_id)
            .await?
            .ok_or_else(|| CoreError::not_found("reply", reply_id).into())
    }

    /// Delete a reply. Deleting a reply that is already gone returns `false`.
    pub async fn delete_reply(
        &self,
        actor: &Viewer,
        event_id: DbId,
        reply_id: DbId,
    ) -> StoreResult<bool> {
        let user_id = actor.require_user()?;
        let Some(reply) = ReplyRepo::find(&self.pool, self.kind, event_id, reply_id).await? else {
            return Ok(false);
        };
        ensure_creator(reply.created_user_id, user_id, "delete this reply")?;

        let deleted = ReplyRepo::delete(&self.pool, self.kind, event_id, reply_id).await?;
        tracing::info!(kind = %self.kind, event_id, reply_id, "Reply deleted");
        Ok(deleted)
    }
}

fn ensure_creator(created_user_id: DbId, user_id: DbId, what: &str) -> Result<(), CoreError> {
    if created_user_id == user_id {
        Ok(())
    } else {
        Err(CoreError::Forbidden(format!("Only the creator may {what}")))
    }
}
