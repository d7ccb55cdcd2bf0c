use crate::ids::CommentId;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// One row of the `comments` table: a discussion node or a reaction,
/// discriminated by `verb`. Parent references use 0 for "root".
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "comments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: CommentId,
    pub parent_id: CommentId,
    pub topmost_parent_id: CommentId,
    pub children_count: i32,
    pub actor_type: String,
    pub actor_id: String,
    pub object_type: String,
    pub object_id: String,
    pub message: String,
    pub verb: String,
    pub creation_timestamp: DateTimeUtc,
    pub latest_child_timestamp: Option<DateTimeUtc>,
    pub expire_date: Option<DateTimeUtc>,
    pub reference_id: Option<String>,
    /// JSON object of string -> string annotations.
    pub meta_data: Option<String>,
    /// JSON array of `[symbol, count]` pairs, ordered; only set on rows that
    /// are reaction parents.
    pub reactions: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::reaction::Entity")]
    Reaction,
}

impl Related<super::reaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reaction.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
