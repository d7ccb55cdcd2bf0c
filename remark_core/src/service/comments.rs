use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Condition, Expr};
use sea_orm::DatabaseConnection;
use serde::Serialize;

use crate::entity::prelude::*;
use crate::error::CommentsError;
use crate::events::{CommentEvent, CommentEventHandler, CommentEventKind, EventHandlerRegistry};
use crate::ids::{CommentId, ROOT_ID};
use crate::models::comment::{DELETED_USER, VERB_REACTION, VERB_REACTION_DELETED};
use crate::models::{Comment, CommentTree};
use crate::service::read_marks::{FolderListing, ReadMarksService};
use crate::service::reactions::{self, ReactionsService};

/// Direction of since-cursor pagination.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortOrder {
    /// Strictly newer than the cursor, oldest first.
    #[default]
    Ascending,
    /// Strictly older than the cursor, newest first.
    Descending,
}

/// Distinct author reference collected from a comment thread.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ActorRef {
    pub actor_type: String,
    pub actor_id: String,
}

type DisplayNameResolver = Box<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Type -> resolver table; at most one resolver per type for the lifetime of
/// the process.
#[derive(Default)]
struct DisplayNameRegistry {
    resolvers: RwLock<HashMap<String, DisplayNameResolver>>,
}

impl DisplayNameRegistry {
    fn register(&self, kind: &str, resolver: DisplayNameResolver) -> Result<(), CommentsError> {
        let mut resolvers = self
            .resolvers
            .write()
            .expect("display name registry poisoned");
        if resolvers.contains_key(kind) {
            return Err(CommentsError::OutOfBounds(
                "display name resolver for this type already registered",
            ));
        }
        resolvers.insert(kind.to_string(), resolver);
        Ok(())
    }

    fn resolve(&self, kind: &str, id: &str) -> Result<String, CommentsError> {
        let resolvers = self
            .resolvers
            .read()
            .expect("display name registry poisoned");
        let resolver = resolvers.get(kind).ok_or(CommentsError::OutOfBounds(
            "no display name resolver for this type registered",
        ))?;
        // a resolver that yields nothing falls back to echoing the id
        Ok(resolver(id).unwrap_or_else(|| id.to_string()))
    }
}

/// Caller-facing façade over the comment store: validation, persistence,
/// tree and cursor reads, reaction and read-mark composition, lifecycle
/// events and display-name resolution.
pub struct CommentsService {
    db: DatabaseConnection,
    reactions: ReactionsService,
    read_marks: ReadMarksService,
    events: EventHandlerRegistry,
    display_names: DisplayNameRegistry,
}

impl CommentsService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            reactions: ReactionsService::new(db.clone()),
            read_marks: ReadMarksService::new(db.clone()),
            events: EventHandlerRegistry::default(),
            display_names: DisplayNameRegistry::default(),
            db,
        }
    }

    pub fn reactions(&self) -> &ReactionsService {
        &self.reactions
    }

    pub fn read_marks(&self) -> &ReadMarksService {
        &self.read_marks
    }

    /// A fresh, unsaved comment for the given author and target.
    pub fn create(
        &self,
        actor_type: &str,
        actor_id: &str,
        object_type: &str,
        object_id: &str,
    ) -> Result<Comment, CommentsError> {
        Comment::new(actor_type, actor_id, object_type, object_id)
    }

    /// Load one comment by id.
    pub async fn get(&self, id: &str) -> Result<Comment, CommentsError> {
        let id = CommentId::parse_str(id)?;
        let row = CommentEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(CommentsError::NotFound)?;
        Ok(Comment::from_model(row))
    }

    /// The comment and one expanded level of thread replies, oldest reply
    /// first, sliced by limit/offset (0 = unlimited).
    pub async fn get_tree(
        &self,
        id: &str,
        limit: u64,
        offset: u64,
    ) -> Result<CommentTree, CommentsError> {
        let root = self.get(id).await?;
        let root_id = CommentId::parse_str(id)?;

        let mut query = CommentEntity::find()
            .filter(CommentColumn::TopmostParentId.eq(root_id))
            .order_by_asc(CommentColumn::CreationTimestamp)
            .order_by_asc(CommentColumn::Id);
        if limit > 0 {
            query = query.limit(limit);
        }
        if offset > 0 {
            query = query.offset(offset);
        }

        let replies = query
            .all(&self.db)
            .await?
            .into_iter()
            .map(|row| CommentTree {
                comment: Comment::from_model(row),
                replies: Vec::new(),
            })
            .collect();

        Ok(CommentTree {
            comment: root,
            replies,
        })
    }

    /// Top-level comments on an object, newest first; `not_older_than`
    /// keeps comments created at or after the given instant.
    pub async fn get_for_object(
        &self,
        object_type: &str,
        object_id: &str,
        limit: u64,
        offset: u64,
        not_older_than: Option<DateTime<Utc>>,
    ) -> Result<Vec<Comment>, CommentsError> {
        let mut query = CommentEntity::find()
            .filter(CommentColumn::ObjectType.eq(object_type))
            .filter(CommentColumn::ObjectId.eq(object_id))
            .filter(CommentColumn::ParentId.eq(CommentId::from(0)))
            .order_by_desc(CommentColumn::CreationTimestamp)
            .order_by_desc(CommentColumn::Id);
        if let Some(at) = not_older_than {
            query = query.filter(CommentColumn::CreationTimestamp.gte(at));
        }
        if limit > 0 {
            query = query.limit(limit);
        }
        if offset > 0 {
            query = query.offset(offset);
        }

        let rows = query.all(&self.db).await?;
        Ok(rows.into_iter().map(Comment::from_model).collect())
    }

    /// Cursor pagination over every comment of an object. The cursor
    /// comment itself is excluded; a cursor of `"0"`/`None` starts from the
    /// beginning (ascending) or the most recent comment (descending). A
    /// cursor that does not belong to the object is ignored.
    pub async fn get_for_object_since(
        &self,
        object_type: &str,
        object_id: &str,
        last_known_id: Option<&str>,
        order: SortOrder,
        limit: u64,
    ) -> Result<Vec<Comment>, CommentsError> {
        let anchor_id = match last_known_id {
            Some(cursor) => CommentId::parse_cursor(cursor)?,
            None => None,
        };
        let anchor = match anchor_id {
            Some(id) => {
                CommentEntity::find_by_id(id)
                    .filter(CommentColumn::ObjectType.eq(object_type))
                    .filter(CommentColumn::ObjectId.eq(object_id))
                    .one(&self.db)
                    .await?
            }
            None => None,
        };

        let mut query = CommentEntity::find()
            .filter(CommentColumn::ObjectType.eq(object_type))
            .filter(CommentColumn::ObjectId.eq(object_id));
        query = match order {
            SortOrder::Ascending => query
                .order_by_asc(CommentColumn::CreationTimestamp)
                .order_by_asc(CommentColumn::Id),
            SortOrder::Descending => query
                .order_by_desc(CommentColumn::CreationTimestamp)
                .order_by_desc(CommentColumn::Id),
        };

        if let Some(anchor) = anchor {
            let at = anchor.creation_timestamp;
            // compare (creation, id) so same-second neighbours neither skip
            // nor repeat
            let window = match order {
                SortOrder::Ascending => Condition::any()
                    .add(CommentColumn::CreationTimestamp.gt(at))
                    .add(
                        Condition::all()
                            .add(CommentColumn::CreationTimestamp.eq(at))
                            .add(CommentColumn::Id.gt(anchor.id)),
                    ),
                SortOrder::Descending => Condition::any()
                    .add(CommentColumn::CreationTimestamp.lt(at))
                    .add(
                        Condition::all()
                            .add(CommentColumn::CreationTimestamp.eq(at))
                            .add(CommentColumn::Id.lt(anchor.id)),
                    ),
            };
            query = query.filter(window);
        }

        if limit > 0 {
            query = query.limit(limit);
        }

        let rows = query.all(&self.db).await?;
        Ok(rows.into_iter().map(Comment::from_model).collect())
    }

    /// Number of comments on an object, optionally only those created at or
    /// after `not_older_than`.
    pub async fn count_for_object(
        &self,
        object_type: &str,
        object_id: &str,
        not_older_than: Option<DateTime<Utc>>,
    ) -> Result<u64, CommentsError> {
        let mut query = CommentEntity::find()
            .filter(CommentColumn::ObjectType.eq(object_type))
            .filter(CommentColumn::ObjectId.eq(object_id));
        if let Some(at) = not_older_than {
            query = query.filter(CommentColumn::CreationTimestamp.gte(at));
        }
        Ok(query.count(&self.db).await?)
    }

    /// Number of comments on an object newer than a known comment id.
    pub async fn count_for_object_since(
        &self,
        object_type: &str,
        object_id: &str,
        last_read: &str,
    ) -> Result<u64, CommentsError> {
        let floor = CommentId::parse_cursor(last_read)?
            .map(|id| id.as_i64())
            .unwrap_or(0);
        let count = CommentEntity::find()
            .filter(CommentColumn::ObjectType.eq(object_type))
            .filter(CommentColumn::ObjectId.eq(object_id))
            .filter(CommentColumn::Id.gt(floor))
            .count(&self.db)
            .await?;
        Ok(count)
    }

    /// Id of the newest comment created strictly before the given instant.
    pub async fn last_comment_before(
        &self,
        object_type: &str,
        object_id: &str,
        before: DateTime<Utc>,
    ) -> Result<Option<String>, CommentsError> {
        let row = CommentEntity::find()
            .filter(CommentColumn::ObjectType.eq(object_type))
            .filter(CommentColumn::ObjectId.eq(object_id))
            .filter(CommentColumn::CreationTimestamp.lt(before))
            .order_by_desc(CommentColumn::CreationTimestamp)
            .order_by_desc(CommentColumn::Id)
            .one(&self.db)
            .await?;
        Ok(row.map(|r| r.id.to_string()))
    }

    /// Most recent comment time per actor, for the given verb.
    pub async fn last_comment_date_by_actor(
        &self,
        object_type: &str,
        object_id: &str,
        verb: &str,
        actor_type: &str,
        actor_ids: &[String],
    ) -> Result<HashMap<String, DateTime<Utc>>, CommentsError> {
        let mut last_comments = HashMap::new();
        for actor_id in actor_ids {
            let row = CommentEntity::find()
                .filter(CommentColumn::ObjectType.eq(object_type))
                .filter(CommentColumn::ObjectId.eq(object_id))
                .filter(CommentColumn::Verb.eq(verb))
                .filter(CommentColumn::ActorType.eq(actor_type))
                .filter(CommentColumn::ActorId.eq(actor_id))
                .order_by_desc(CommentColumn::CreationTimestamp)
                .one(&self.db)
                .await?;
            if let Some(row) = row {
                last_comments.insert(actor_id.clone(), row.creation_timestamp);
            }
        }
        Ok(last_comments)
    }

    /// Persists the comment: insert when its id is empty (the id is
    /// assigned and written back), update otherwise. Parent counters and
    /// reaction aggregates move inside the same transaction.
    pub async fn save(&self, comment: &mut Comment) -> Result<bool, CommentsError> {
        self.prepare_for_write(comment).await?;
        if comment.id().is_empty() {
            self.insert_comment(comment).await
        } else {
            self.update_comment(comment).await
        }
    }

    async fn prepare_for_write(&self, comment: &mut Comment) -> Result<(), CommentsError> {
        if comment.actor_type().is_empty()
            || comment.actor_id().is_empty()
            || comment.object_type().is_empty()
            || comment.object_id().is_empty()
            || comment.verb().is_empty()
            || comment.message().is_empty()
        {
            return Err(CommentsError::UnexpectedValue(
                "actor, object, verb and message must be provided for saving",
            ));
        }

        if comment.verb() == VERB_REACTION {
            if comment.parent_id() == ROOT_ID {
                return Err(CommentsError::UnexpectedValue(
                    "a reaction needs a parent comment",
                ));
            }
            reactions::assert_single_grapheme(comment.message())?;
        }

        if comment.id().is_empty() {
            comment.set_children_count(0)?;
            comment.set_latest_child_timestamp(None);
        }
        if comment.creation_timestamp().is_none() {
            comment.set_creation_timestamp(Utc::now());
        }

        if comment.parent_id() != ROOT_ID {
            let parent = self.get(comment.parent_id()).await?;
            let topmost = if parent.topmost_parent_id() == ROOT_ID {
                parent.id().to_string()
            } else {
                parent.topmost_parent_id().to_string()
            };
            comment.set_topmost_parent_id(&topmost)?;
        } else {
            comment.set_topmost_parent_id(ROOT_ID)?;
        }

        Ok(())
    }

    async fn insert_comment(&self, comment: &mut Comment) -> Result<bool, CommentsError> {
        let row = comment.to_active_model()?;

        let txn = self.db.begin().await?;
        let inserted = CommentEntity::insert(row).exec(&txn).await?;
        let new_id = inserted.last_insert_id;
        comment.set_id(&new_id.to_string())?;

        if comment.parent_id() != ROOT_ID {
            let parent = CommentId::parse_str(comment.parent_id())?;
            if comment.verb() == VERB_REACTION {
                reactions::add_reaction(
                    &txn,
                    parent,
                    new_id,
                    comment.actor_type(),
                    comment.actor_id(),
                    comment.message(),
                )
                .await?;
                reactions::sum_reactions(&txn, parent).await?;
            }
            self.refresh_child_info(&txn, parent, comment.creation_timestamp())
                .await?;
        }
        txn.commit().await?;

        self.events
            .dispatch(&CommentEvent::new(CommentEventKind::Add, comment.clone()));
        Ok(true)
    }

    async fn update_comment(&self, comment: &Comment) -> Result<bool, CommentsError> {
        let id = CommentId::parse_str(comment.id())?;
        let stored = CommentEntity::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(CommentsError::NotFound)?;
        self.events.dispatch(&CommentEvent::new(
            CommentEventKind::PreUpdate,
            Comment::from_model(stored),
        ));

        let row = comment.to_active_model()?;
        let txn = self.db.begin().await?;
        CommentEntity::update(row)
            .exec(&txn)
            .await
            .map_err(CommentsError::from_update)?;

        if comment.parent_id() != ROOT_ID {
            let parent = CommentId::parse_str(comment.parent_id())?;
            if comment.verb() == VERB_REACTION_DELETED {
                reactions::remove_reaction(&txn, parent, id).await?;
                reactions::sum_reactions(&txn, parent).await?;
            }
            self.refresh_child_info(&txn, parent, comment.creation_timestamp())
                .await?;
        }
        txn.commit().await?;

        self.events
            .dispatch(&CommentEvent::new(CommentEventKind::Update, comment.clone()));
        Ok(true)
    }

    /// Recounts a parent's children and maintains its latest-child time:
    /// `newest` moves it forward on replies, `None` (delete path) recomputes
    /// it from the remaining children. The recount can never go negative.
    async fn refresh_child_info<C: ConnectionTrait>(
        &self,
        conn: &C,
        parent: CommentId,
        newest: Option<DateTime<Utc>>,
    ) -> Result<(), CommentsError> {
        let Some(parent_row) = CommentEntity::find_by_id(parent).one(conn).await? else {
            // replies may outlive their parent; nothing to maintain then
            return Ok(());
        };

        let children = CommentEntity::find()
            .filter(CommentColumn::ParentId.eq(parent))
            .count(conn)
            .await?;

        let latest = match newest {
            Some(at) => match parent_row.latest_child_timestamp {
                Some(current) if current >= at => Some(current),
                _ => Some(at),
            },
            None => CommentEntity::find()
                .filter(CommentColumn::ParentId.eq(parent))
                .order_by_desc(CommentColumn::CreationTimestamp)
                .one(conn)
                .await?
                .map(|row| row.creation_timestamp),
        };

        let mut row: CommentActiveModel = parent_row.into();
        row.children_count = Set(children as i32);
        row.latest_child_timestamp = Set(latest);
        row.update(conn).await.map_err(CommentsError::from_update)?;
        Ok(())
    }

    /// Permanently removes one comment. Any id that does not name a live
    /// row — malformed, unknown, or already deleted — is reported as
    /// not found; the first successful call wins.
    pub async fn delete(&self, id: &str) -> Result<bool, CommentsError> {
        let id = CommentId::parse_str(id).map_err(|_| CommentsError::NotFound)?;

        let txn = self.db.begin().await?;
        let row = CommentEntity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or(CommentsError::NotFound)?;
        let removed = Comment::from_model(row.clone());

        CommentEntity::delete_by_id(id).exec(&txn).await?;

        if row.verb == VERB_REACTION || row.verb == VERB_REACTION_DELETED {
            reactions::remove_reaction(&txn, row.parent_id, id).await?;
            reactions::sum_reactions(&txn, row.parent_id).await?;
        }
        if row.parent_id != CommentId::from(0) {
            self.refresh_child_info(&txn, row.parent_id, None).await?;
        }
        txn.commit().await?;

        self.events
            .dispatch(&CommentEvent::new(CommentEventKind::Delete, removed));
        Ok(true)
    }

    /// Scrubs an author from all their comments, replacing the actor
    /// reference with the deleted-user marker. The comments themselves
    /// stay. Succeeds even when nothing matched.
    pub async fn delete_references_of_actor(
        &self,
        actor_type: &str,
        actor_id: &str,
    ) -> Result<bool, CommentsError> {
        if actor_type.is_empty() || actor_id.is_empty() {
            return Err(CommentsError::InvalidArgument(
                "actor parameters must not be empty",
            ));
        }

        CommentEntity::update_many()
            .col_expr(CommentColumn::ActorType, Expr::value(DELETED_USER))
            .col_expr(CommentColumn::ActorId, Expr::value(DELETED_USER))
            .filter(CommentColumn::ActorType.eq(actor_type))
            .filter(CommentColumn::ActorId.eq(actor_id))
            .exec(&self.db)
            .await?;
        Ok(true)
    }

    /// Drops every comment attached to an object (e.g. on object deletion).
    pub async fn delete_comments_at_object(
        &self,
        object_type: &str,
        object_id: &str,
    ) -> Result<bool, CommentsError> {
        if object_type.is_empty() || object_id.is_empty() {
            return Err(CommentsError::InvalidArgument(
                "object parameters must not be empty",
            ));
        }

        CommentEntity::delete_many()
            .filter(CommentColumn::ObjectType.eq(object_type))
            .filter(CommentColumn::ObjectId.eq(object_id))
            .exec(&self.db)
            .await?;
        Ok(true)
    }

    /// Drops comments whose expiry has passed; without an object id the
    /// purge sweeps every object of the type. Reports whether any row went
    /// away.
    pub async fn delete_comments_expired_at_object(
        &self,
        object_type: &str,
        object_id: Option<&str>,
    ) -> Result<bool, CommentsError> {
        let mut query = CommentEntity::delete_many()
            .filter(CommentColumn::ExpireDate.lte(Utc::now()))
            .filter(CommentColumn::ObjectType.eq(object_type));
        if let Some(object_id) = object_id {
            query = query.filter(CommentColumn::ObjectId.eq(object_id));
        }
        let deleted = query.exec(&self.db).await?;
        Ok(deleted.rows_affected > 0)
    }

    /// Distinct authors across a comment and its thread, in first-appearance
    /// order (the root first, replies by creation time).
    pub async fn actors_in_tree(&self, id: &str) -> Result<Vec<ActorRef>, CommentsError> {
        let root = self.get(id).await?;
        let root_id = CommentId::parse_str(id)?;

        let replies = CommentEntity::find()
            .filter(CommentColumn::TopmostParentId.eq(root_id))
            .order_by_asc(CommentColumn::CreationTimestamp)
            .order_by_asc(CommentColumn::Id)
            .all(&self.db)
            .await?;

        let mut seen = HashSet::new();
        let mut actors = Vec::new();
        let root_actor = (root.actor_type().to_string(), root.actor_id().to_string());
        for (actor_type, actor_id) in std::iter::once(root_actor)
            .chain(replies.into_iter().map(|row| (row.actor_type, row.actor_id)))
        {
            if seen.insert((actor_type.clone(), actor_id.clone())) {
                actors.push(ActorRef {
                    actor_type,
                    actor_id,
                });
            }
        }
        Ok(actors)
    }

    // ----------------
    // Reaction façade
    // ----------------

    pub async fn get_reaction_comment(
        &self,
        parent_id: &str,
        actor_type: &str,
        actor_id: &str,
        reaction: &str,
    ) -> Result<Comment, CommentsError> {
        self.reactions
            .reaction_comment(parent_id, actor_type, actor_id, reaction)
            .await
    }

    pub async fn retrieve_all_reactions(
        &self,
        parent_id: &str,
        reaction: Option<&str>,
    ) -> Result<Vec<Comment>, CommentsError> {
        self.reactions.retrieve_all(parent_id, reaction).await
    }

    // ----------------
    // Read-mark façade
    // ----------------

    pub async fn set_read_mark(
        &self,
        object_type: &str,
        object_id: &str,
        at: DateTime<Utc>,
        user_id: &str,
    ) -> Result<(), CommentsError> {
        self.read_marks
            .set_read_mark(object_type, object_id, at, user_id)
            .await
    }

    pub async fn get_read_mark(
        &self,
        object_type: &str,
        object_id: &str,
        user_id: &str,
    ) -> Result<Option<DateTime<Utc>>, CommentsError> {
        self.read_marks
            .get_read_mark(object_type, object_id, user_id)
            .await
    }

    pub async fn delete_read_marks_from_user(&self, user_id: &str) -> Result<bool, CommentsError> {
        self.read_marks.delete_marks_from_user(user_id).await
    }

    pub async fn delete_read_marks_on_object(
        &self,
        object_type: &str,
        object_id: &str,
    ) -> Result<bool, CommentsError> {
        self.read_marks
            .delete_marks_on_object(object_type, object_id)
            .await
    }

    pub async fn unread_count_for_objects(
        &self,
        object_type: &str,
        object_ids: &[String],
        user_id: &str,
    ) -> Result<HashMap<String, i64>, CommentsError> {
        self.read_marks
            .unread_count_for_objects(object_type, object_ids, user_id)
            .await
    }

    pub async fn unread_count_for_folder(
        &self,
        folder_id: &str,
        user_id: &str,
        listing: &dyn FolderListing,
    ) -> Result<HashMap<String, i64>, CommentsError> {
        self.read_marks
            .unread_count_for_folder(folder_id, user_id, listing)
            .await
    }

    // ----------------
    // Registries
    // ----------------

    /// Registers a lazily-constructed lifecycle event handler; the factory
    /// runs the first time an event fires, its handler is then reused.
    pub fn register_event_handler(
        &self,
        factory: Box<dyn Fn() -> std::sync::Arc<dyn CommentEventHandler> + Send + Sync>,
    ) {
        self.events.register(factory);
    }

    /// Registers a display-name resolver for a reference type; at most one
    /// resolver per type.
    pub fn register_display_name_resolver(
        &self,
        kind: &str,
        resolver: DisplayNameResolver,
    ) -> Result<(), CommentsError> {
        self.display_names.register(kind, resolver)
    }

    /// Resolves a reference id to a display name via the registered
    /// resolver for its type.
    pub fn resolve_display_name(&self, kind: &str, id: &str) -> Result<String, CommentsError> {
        self.display_names.resolve(kind, id)
    }
}
