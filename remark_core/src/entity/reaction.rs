use crate::ids::CommentId;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Dedup/aggregation row for reactions: one row per live
/// (parent, actor, symbol) triple. `message_id` points at the reaction
/// comment itself; the row id doubles as the recency of the contribution.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "reactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub parent_id: CommentId,
    pub message_id: CommentId,
    pub actor_type: String,
    pub actor_id: String,
    pub reaction: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::comment::Entity",
        from = "Column::ParentId",
        to = "super::comment::Column::Id"
    )]
    Comment,
}

impl Related<super::comment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
