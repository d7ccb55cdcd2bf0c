// SeaORM entities backing the comment store: the comment rows themselves,
// the reaction dedup/aggregation table and the per-user read markers.

pub mod comment;
pub mod reaction;
pub mod read_marker;


pub mod prelude {
    // Re-export all entities for convenience
    pub use super::comment::{
        ActiveModel as CommentActiveModel, Column as CommentColumn, Entity as CommentEntity,
        Model as CommentModel,
    };
    pub use super::reaction::{
        ActiveModel as ReactionActiveModel, Column as ReactionColumn, Entity as ReactionEntity,
        Model as ReactionModel,
    };
    pub use super::read_marker::{
        ActiveModel as ReadMarkerActiveModel, Column as ReadMarkerColumn,
        Entity as ReadMarkerEntity, Model as ReadMarkerModel,
    };

    // Re-export commonly used SeaORM types and traits
    pub use sea_orm::{
        ActiveModelTrait,
        ActiveValue,

        ColumnTrait,
        ConnectionTrait,

        // Database and connection types
        Database,
        DatabaseConnection,
        DbConn,
        // Common result types
        DbErr,
        Delete,

        // Core traits
        EntityTrait,
        Insert,

        ModelTrait,
        NotSet,
        // Pagination
        PaginatorTrait,
        QueryFilter,
        QueryOrder,
        QuerySelect,
        Related,
        RelationTrait,
        // Query builders
        Select,
        // Active model helpers
        Set,
        TransactionTrait,

        Unchanged,
        Update,
    };
}
