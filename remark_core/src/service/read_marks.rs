use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Alias, Condition, Expr, JoinType, OnConflict, Query};
use sea_orm::DatabaseConnection;

use crate::entity::prelude::*;
use crate::error::CommentsError;

/// Object type of file comments; the folder fold only ever counts these.
const OBJECT_TYPE_FILES: &str = "files";

/// Chunk size for id lists in the grouped unread-count query.
const OBJECT_CHUNK_SIZE: usize = 1000;

/// Enumeration of a folder's direct children, consumed as a capability; the
/// file tree itself lives outside this crate.
#[async_trait]
pub trait FolderListing: Send + Sync {
    async fn direct_children(&self, folder_id: &str) -> Result<Vec<String>, CommentsError>;
}

#[derive(Clone)]
pub struct ReadMarksService {
    db: DatabaseConnection,
}

impl ReadMarksService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Upserts the (user, object) marker; last write wins, no monotonicity.
    pub async fn set_read_mark(
        &self,
        object_type: &str,
        object_id: &str,
        at: DateTime<Utc>,
        user_id: &str,
    ) -> Result<(), CommentsError> {
        if object_type.is_empty() || object_id.is_empty() {
            return Err(CommentsError::InvalidArgument(
                "object parameters must not be empty",
            ));
        }

        let row = ReadMarkerActiveModel {
            id: NotSet,
            user_id: Set(user_id.to_string()),
            object_type: Set(object_type.to_string()),
            object_id: Set(object_id.to_string()),
            marker_datetime: Set(at),
        };
        let result = ReadMarkerEntity::insert(row)
            .on_conflict(
                OnConflict::columns([
                    ReadMarkerColumn::UserId,
                    ReadMarkerColumn::ObjectType,
                    ReadMarkerColumn::ObjectId,
                ])
                .update_column(ReadMarkerColumn::MarkerDatetime)
                .to_owned(),
            )
            .exec(&self.db)
            .await;
        match result {
            Ok(_) | Err(DbErr::RecordNotInserted) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// The stored marker, or `None` when the user never marked the object
    /// (including after a bulk delete).
    pub async fn get_read_mark(
        &self,
        object_type: &str,
        object_id: &str,
        user_id: &str,
    ) -> Result<Option<DateTime<Utc>>, CommentsError> {
        let row = ReadMarkerEntity::find()
            .filter(ReadMarkerColumn::UserId.eq(user_id))
            .filter(ReadMarkerColumn::ObjectType.eq(object_type))
            .filter(ReadMarkerColumn::ObjectId.eq(object_id))
            .one(&self.db)
            .await?;
        Ok(row.map(|r| r.marker_datetime))
    }

    /// Drops every marker a user holds. Idempotent; reports whether any row
    /// went away.
    pub async fn delete_marks_from_user(&self, user_id: &str) -> Result<bool, CommentsError> {
        let result = ReadMarkerEntity::delete_many()
            .filter(ReadMarkerColumn::UserId.eq(user_id))
            .exec(&self.db)
            .await;
        match result {
            Ok(deleted) => Ok(deleted.rows_affected > 0),
            Err(err) => {
                tracing::error!(error = %err, user_id, "failed to delete read markers for user");
                Ok(false)
            }
        }
    }

    /// Drops every marker held on an object. Idempotent.
    pub async fn delete_marks_on_object(
        &self,
        object_type: &str,
        object_id: &str,
    ) -> Result<bool, CommentsError> {
        if object_type.is_empty() || object_id.is_empty() {
            return Err(CommentsError::InvalidArgument(
                "object parameters must not be empty",
            ));
        }
        let result = ReadMarkerEntity::delete_many()
            .filter(ReadMarkerColumn::ObjectType.eq(object_type))
            .filter(ReadMarkerColumn::ObjectId.eq(object_id))
            .exec(&self.db)
            .await;
        match result {
            Ok(deleted) => Ok(deleted.rows_affected > 0),
            Err(err) => {
                tracing::error!(error = %err, object_type, object_id, "failed to delete read markers on object");
                Ok(false)
            }
        }
    }

    /// Unread counts per object id: comments created strictly after the
    /// user's marker, or every comment where no marker exists. Ids the user
    /// has fully read come back as 0.
    pub async fn unread_count_for_objects(
        &self,
        object_type: &str,
        object_ids: &[String],
        user_id: &str,
    ) -> Result<HashMap<String, i64>, CommentsError> {
        let mut unread: HashMap<String, i64> =
            object_ids.iter().map(|id| (id.clone(), 0)).collect();

        for chunk in object_ids.chunks(OBJECT_CHUNK_SIZE) {
            let stmt = Query::select()
                .column((CommentEntity, CommentColumn::ObjectId))
                .expr_as(
                    Expr::col((CommentEntity, CommentColumn::Id)).count(),
                    Alias::new("unread"),
                )
                .from(CommentEntity)
                .join(
                    JoinType::LeftJoin,
                    ReadMarkerEntity,
                    Condition::all()
                        .add(
                            Expr::col((ReadMarkerEntity, ReadMarkerColumn::UserId)).eq(user_id),
                        )
                        .add(
                            Expr::col((ReadMarkerEntity, ReadMarkerColumn::ObjectType))
                                .equals((CommentEntity, CommentColumn::ObjectType)),
                        )
                        .add(
                            Expr::col((ReadMarkerEntity, ReadMarkerColumn::ObjectId))
                                .equals((CommentEntity, CommentColumn::ObjectId)),
                        ),
                )
                .cond_where(
                    Condition::all()
                        .add(
                            Expr::col((CommentEntity, CommentColumn::ObjectType)).eq(object_type),
                        )
                        .add(
                            Expr::col((CommentEntity, CommentColumn::ObjectId))
                                .is_in(chunk.iter().map(String::as_str)),
                        )
                        .add(
                            Condition::any()
                                .add(
                                    Expr::col((
                                        ReadMarkerEntity,
                                        ReadMarkerColumn::MarkerDatetime,
                                    ))
                                    .is_null(),
                                )
                                .add(
                                    Expr::col((CommentEntity, CommentColumn::CreationTimestamp))
                                        .gt(Expr::col((
                                            ReadMarkerEntity,
                                            ReadMarkerColumn::MarkerDatetime,
                                        ))),
                                ),
                        ),
                )
                .group_by_col((CommentEntity, CommentColumn::ObjectId))
                .to_owned();

            let backend = self.db.get_database_backend();
            let rows = self.db.query_all(backend.build(&stmt)).await?;
            for row in rows {
                let object_id: String = row.try_get("", "object_id")?;
                let count: i64 = row.try_get("", "unread")?;
                unread.insert(object_id, count);
            }
        }

        Ok(unread)
    }

    /// Folds unread counts over a folder's direct children, keeping only
    /// children that actually have something unread.
    pub async fn unread_count_for_folder(
        &self,
        folder_id: &str,
        user_id: &str,
        listing: &dyn FolderListing,
    ) -> Result<HashMap<String, i64>, CommentsError> {
        let children = listing.direct_children(folder_id).await?;
        let counts = self
            .unread_count_for_objects(OBJECT_TYPE_FILES, &children, user_id)
            .await?;
        Ok(counts.into_iter().filter(|(_, n)| *n > 0).collect())
    }
}
