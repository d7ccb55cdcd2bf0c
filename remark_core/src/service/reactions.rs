use std::collections::HashMap;

use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::DatabaseConnection;
use unicode_segmentation::UnicodeSegmentation;

use crate::entity::prelude::*;
use crate::error::CommentsError;
use crate::ids::CommentId;
use crate::models::Comment;

/// Page size for walking the reaction rows of one parent; keeps parents
/// with very large fan-out from turning into one unbounded query.
const REACTION_PAGE_SIZE: u64 = 200;

/// The stored summary keeps the 20 highest-ranked symbols.
const REACTION_SUMMARY_LIMIT: usize = 20;

/// A reaction message is exactly one user-perceived character; multi-code-
/// point emoji sequences (skin tones, ZWJ joins) count as one.
pub(crate) fn assert_single_grapheme(message: &str) -> Result<(), CommentsError> {
    if message.graphemes(true).count() != 1 {
        return Err(CommentsError::UnexpectedValue(
            "reactions can only be a single emoji",
        ));
    }
    Ok(())
}

/// Records an actor's reaction on a parent. Insert-if-absent keyed by
/// (parent, actor, symbol): a duplicate contribution changes nothing, backed
/// by the unique index when two requests race.
pub(crate) async fn add_reaction<C: ConnectionTrait>(
    conn: &C,
    parent_id: CommentId,
    message_id: CommentId,
    actor_type: &str,
    actor_id: &str,
    symbol: &str,
) -> Result<(), CommentsError> {
    let row = ReactionActiveModel {
        id: NotSet,
        parent_id: Set(parent_id),
        message_id: Set(message_id),
        actor_type: Set(actor_type.to_string()),
        actor_id: Set(actor_id.to_string()),
        reaction: Set(symbol.to_string()),
    };

    let result = ReactionEntity::insert(row)
        .on_conflict(
            OnConflict::columns([
                ReactionColumn::ParentId,
                ReactionColumn::ActorType,
                ReactionColumn::ActorId,
                ReactionColumn::Reaction,
            ])
            .do_nothing()
            .to_owned(),
        )
        .exec(conn)
        .await;

    match result {
        Ok(_) | Err(DbErr::RecordNotInserted) => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// Removes the contribution recorded for a reaction comment.
pub(crate) async fn remove_reaction<C: ConnectionTrait>(
    conn: &C,
    parent_id: CommentId,
    message_id: CommentId,
) -> Result<(), CommentsError> {
    ReactionEntity::delete_many()
        .filter(ReactionColumn::ParentId.eq(parent_id))
        .filter(ReactionColumn::MessageId.eq(message_id))
        .exec(conn)
        .await?;
    Ok(())
}

/// Re-aggregates the parent's stored summary from the surviving reaction
/// rows: count descending, latest contribution first on ties, symbol as the
/// final deterministic key.
pub(crate) async fn sum_reactions<C: ConnectionTrait>(
    conn: &C,
    parent_id: CommentId,
) -> Result<(), CommentsError> {
    let mut totals: HashMap<String, (u32, i64)> = HashMap::new();
    let mut cursor = 0i64;
    loop {
        let page = ReactionEntity::find()
            .filter(ReactionColumn::ParentId.eq(parent_id))
            .filter(ReactionColumn::Id.gt(cursor))
            .order_by_asc(ReactionColumn::Id)
            .limit(REACTION_PAGE_SIZE)
            .all(conn)
            .await?;
        let done = (page.len() as u64) < REACTION_PAGE_SIZE;
        for row in page {
            cursor = row.id;
            let entry = totals.entry(row.reaction).or_insert((0u32, 0i64));
            entry.0 += 1;
            entry.1 = cursor;
        }
        if done {
            break;
        }
    }

    let mut ranked: Vec<(String, (u32, i64))> = totals.into_iter().collect();
    ranked.sort_by(|a, b| {
        (b.1 .0)
            .cmp(&a.1 .0)
            .then((b.1 .1).cmp(&a.1 .1))
            .then(a.0.cmp(&b.0))
    });
    ranked.truncate(REACTION_SUMMARY_LIMIT);

    let summary: Vec<(String, u32)> = ranked
        .into_iter()
        .map(|(symbol, (count, _))| (symbol, count))
        .collect();
    let stored: Option<String> = if summary.is_empty() {
        None
    } else {
        Some(serde_json::to_string(&summary).expect("reaction summary is JSON representable"))
    };

    CommentEntity::update_many()
        .col_expr(CommentColumn::Reactions, Expr::value(stored))
        .filter(CommentColumn::Id.eq(parent_id))
        .exec(conn)
        .await?;
    Ok(())
}

#[derive(Clone)]
pub struct ReactionsService {
    db: DatabaseConnection,
}

impl ReactionsService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Resolve the live reaction comment an actor placed on a parent.
    /// A deleted (or never placed) reaction is not found.
    pub async fn reaction_comment(
        &self,
        parent_id: &str,
        actor_type: &str,
        actor_id: &str,
        reaction: &str,
    ) -> Result<Comment, CommentsError> {
        let parent = CommentId::parse_str(parent_id)?;
        let row = ReactionEntity::find()
            .filter(ReactionColumn::ParentId.eq(parent))
            .filter(ReactionColumn::ActorType.eq(actor_type))
            .filter(ReactionColumn::ActorId.eq(actor_id))
            .filter(ReactionColumn::Reaction.eq(reaction))
            .one(&self.db)
            .await?
            .ok_or(CommentsError::NotFound)?;

        let comment = CommentEntity::find_by_id(row.message_id)
            .one(&self.db)
            .await?
            .ok_or(CommentsError::NotFound)?;
        Ok(Comment::from_model(comment))
    }

    /// All reaction comment rows on a parent, optionally narrowed to one
    /// symbol, newest contribution first. Both the id walk and the row
    /// fetch run in fixed-size pages.
    pub async fn retrieve_all(
        &self,
        parent_id: &str,
        reaction: Option<&str>,
    ) -> Result<Vec<Comment>, CommentsError> {
        let parent = CommentId::parse_str(parent_id)?;

        let mut message_ids: Vec<CommentId> = Vec::new();
        let mut cursor = 0i64;
        loop {
            let mut query = ReactionEntity::find()
                .filter(ReactionColumn::ParentId.eq(parent))
                .filter(ReactionColumn::Id.gt(cursor));
            if let Some(symbol) = reaction {
                query = query.filter(ReactionColumn::Reaction.eq(symbol));
            }
            let page = query
                .order_by_asc(ReactionColumn::Id)
                .limit(REACTION_PAGE_SIZE)
                .all(&self.db)
                .await?;
            let done = (page.len() as u64) < REACTION_PAGE_SIZE;
            for row in page {
                cursor = row.id;
                message_ids.push(row.message_id);
            }
            if done {
                break;
            }
        }

        // Comment ids ascend with insertion, so fetching descending chunks
        // in descending order keeps the concatenation globally ordered.
        message_ids.sort_by(|a, b| b.cmp(a));
        let mut comments = Vec::with_capacity(message_ids.len());
        for chunk in message_ids.chunks(REACTION_PAGE_SIZE as usize) {
            let rows = CommentEntity::find()
                .filter(CommentColumn::Id.is_in(chunk.iter().copied()))
                .order_by_desc(CommentColumn::CreationTimestamp)
                .order_by_desc(CommentColumn::Id)
                .all(&self.db)
                .await?;
            comments.extend(rows.into_iter().map(Comment::from_model));
        }
        Ok(comments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_db_with_migrations;
    use chrono::Utc;

    async fn seed_comment(
        db: &DatabaseConnection,
        verb: &str,
        message: &str,
        actor_id: &str,
        parent_id: i64,
    ) -> CommentId {
        let row = CommentActiveModel {
            id: NotSet,
            parent_id: Set(parent_id.into()),
            topmost_parent_id: Set(parent_id.into()),
            children_count: Set(0),
            actor_type: Set("users".to_string()),
            actor_id: Set(actor_id.to_string()),
            object_type: Set("files".to_string()),
            object_id: Set("file64".to_string()),
            message: Set(message.to_string()),
            verb: Set(verb.to_string()),
            creation_timestamp: Set(Utc::now()),
            latest_child_timestamp: Set(None),
            expire_date: Set(None),
            reference_id: Set(None),
            meta_data: Set(None),
            reactions: NotSet,
        };
        CommentEntity::insert(row)
            .exec(db)
            .await
            .expect("Failed to insert comment row")
            .last_insert_id
    }

    async fn react(
        db: &DatabaseConnection,
        parent: CommentId,
        actor_id: &str,
        symbol: &str,
    ) -> CommentId {
        let message_id = seed_comment(db, "reaction", symbol, actor_id, parent.as_i64()).await;
        add_reaction(db, parent, message_id, "users", actor_id, symbol)
            .await
            .unwrap();
        sum_reactions(db, parent).await.unwrap();
        message_id
    }

    async fn stored_summary(db: &DatabaseConnection, parent: CommentId) -> Vec<(String, u32)> {
        let row = CommentEntity::find_by_id(parent)
            .one(db)
            .await
            .unwrap()
            .unwrap();
        Comment::from_model(row).reactions().to_vec()
    }

    #[test]
    fn test_single_grapheme_check() {
        assert!(assert_single_grapheme("👍").is_ok());
        assert!(assert_single_grapheme("👍🏽").is_ok());
        assert!(assert_single_grapheme("🧑🏽‍💻").is_ok());
        assert!(assert_single_grapheme("a").is_ok());
        assert!(assert_single_grapheme("").is_err());
        assert!(assert_single_grapheme("👍👍").is_err());
        assert!(assert_single_grapheme("🧑🏽‍💻👍").is_err());
        assert!(assert_single_grapheme("ab").is_err());
    }

    #[tokio::test]
    async fn test_duplicate_contribution_counts_once() {
        let db = create_test_db_with_migrations().await;
        let parent = seed_comment(&db, "comment", "message", "alice", 0).await;

        let first = react(&db, parent, "alice", "👍").await;
        // same actor, same symbol again
        let second = seed_comment(&db, "reaction", "👍", "alice", parent.as_i64()).await;
        add_reaction(&db, parent, second, "users", "alice", "👍")
            .await
            .unwrap();
        sum_reactions(&db, parent).await.unwrap();

        assert_eq!(
            stored_summary(&db, parent).await,
            vec![("👍".to_string(), 1)]
        );
        // the dedup row still points at the first contribution
        let rows = ReactionEntity::find()
            .filter(ReactionColumn::ParentId.eq(parent))
            .all(&db)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].message_id, first);
    }

    #[tokio::test]
    async fn test_summary_ordering_count_then_recency() {
        let db = create_test_db_with_migrations().await;
        let parent = seed_comment(&db, "comment", "message", "alice", 0).await;

        react(&db, parent, "john", "👍").await;
        react(&db, parent, "paul", "👍").await;
        react(&db, parent, "matthew", "💜").await;
        react(&db, parent, "mark", "💜").await;
        react(&db, parent, "luke", "💜").await;
        // one-off symbols; 🚀 contributed last, so it outranks 🍕 at count 1
        react(&db, parent, "luke", "🍕").await;
        react(&db, parent, "luke", "🚀").await;

        assert_eq!(
            stored_summary(&db, parent).await,
            vec![
                ("💜".to_string(), 3),
                ("👍".to_string(), 2),
                ("🚀".to_string(), 1),
                ("🍕".to_string(), 1),
            ]
        );
    }

    #[tokio::test]
    async fn test_deleting_contribution_reorders_summary() {
        let db = create_test_db_with_migrations().await;
        let parent = seed_comment(&db, "comment", "message", "alice", 0).await;

        let bob_like = react(&db, parent, "bob", "👍").await;
        react(&db, parent, "carol", "👍").await;
        react(&db, parent, "dave", "🎉").await;

        remove_reaction(&db, parent, bob_like).await.unwrap();
        sum_reactions(&db, parent).await.unwrap();

        assert_eq!(
            stored_summary(&db, parent).await,
            vec![("🎉".to_string(), 1), ("👍".to_string(), 1)]
        );
    }

    #[tokio::test]
    async fn test_summary_cleared_when_last_reaction_goes() {
        let db = create_test_db_with_migrations().await;
        let parent = seed_comment(&db, "comment", "message", "alice", 0).await;

        let only = react(&db, parent, "bob", "👍").await;
        remove_reaction(&db, parent, only).await.unwrap();
        sum_reactions(&db, parent).await.unwrap();

        let row = CommentEntity::find_by_id(parent)
            .one(&db)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.reactions, None);
    }

    #[tokio::test]
    async fn test_reaction_comment_lookup() {
        let db = create_test_db_with_migrations().await;
        let parent = seed_comment(&db, "comment", "message", "alice", 0).await;
        let message_id = react(&db, parent, "bob", "👍").await;

        let service = ReactionsService::new(db.clone());
        let found = service
            .reaction_comment(&parent.to_string(), "users", "bob", "👍")
            .await
            .unwrap();
        assert_eq!(found.id(), message_id.to_string());
        assert_eq!(found.message(), "👍");

        // unknown actor
        assert!(matches!(
            service
                .reaction_comment(&parent.to_string(), "users", "eve", "👍")
                .await,
            Err(CommentsError::NotFound)
        ));

        // deleted contribution is gone
        remove_reaction(&db, parent, message_id).await.unwrap();
        assert!(matches!(
            service
                .reaction_comment(&parent.to_string(), "users", "bob", "👍")
                .await,
            Err(CommentsError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_retrieve_all_with_and_without_filter() {
        let db = create_test_db_with_migrations().await;
        let parent = seed_comment(&db, "comment", "message", "alice", 0).await;

        react(&db, parent, "bob", "👍").await;
        react(&db, parent, "carol", "👍").await;
        let latest = react(&db, parent, "dave", "🎉").await;

        let service = ReactionsService::new(db.clone());
        let all = service
            .retrieve_all(&parent.to_string(), None)
            .await
            .unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].id(), latest.to_string(), "newest first");

        let likes = service
            .retrieve_all(&parent.to_string(), Some("👍"))
            .await
            .unwrap();
        assert_eq!(likes.len(), 2);
        assert!(likes.iter().all(|c| c.message() == "👍"));
    }
}
