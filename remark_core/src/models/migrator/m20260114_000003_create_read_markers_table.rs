use sea_orm_migration::{prelude::*, schema::*};

use super::big_pk_auto;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(CommentsReadMarkers::Table)
                    .col(big_pk_auto(CommentsReadMarkers::Id))
                    .col(string(CommentsReadMarkers::UserId))
                    .col(string(CommentsReadMarkers::ObjectType))
                    .col(string(CommentsReadMarkers::ObjectId))
                    .col(timestamp_with_time_zone(CommentsReadMarkers::MarkerDatetime))
                    .to_owned(),
            )
            .await?;

        // One marker per (user, object); set_read_mark upserts against this.
        manager
            .create_index(
                Index::create()
                    .name("uniq_read_markers_user_object")
                    .table(CommentsReadMarkers::Table)
                    .col(CommentsReadMarkers::UserId)
                    .col(CommentsReadMarkers::ObjectType)
                    .col(CommentsReadMarkers::ObjectId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Create index on object for the unread-count joins
        manager
            .create_index(
                Index::create()
                    .name("idx_read_markers_object")
                    .table(CommentsReadMarkers::Table)
                    .col(CommentsReadMarkers::ObjectType)
                    .col(CommentsReadMarkers::ObjectId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CommentsReadMarkers::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum CommentsReadMarkers {
    Table,
    Id,
    UserId,
    ObjectType,
    ObjectId,
    MarkerDatetime,
}
