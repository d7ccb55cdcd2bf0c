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
                    .table(Comments::Table)
                    .col(big_pk_auto(Comments::Id))
                    // Parent references use 0 for "root", so no foreign key
                    // can be declared on them.
                    .col(big_integer(Comments::ParentId))
                    .col(big_integer(Comments::TopmostParentId))
                    .col(integer(Comments::ChildrenCount))
                    .col(string(Comments::ActorType))
                    .col(string(Comments::ActorId))
                    .col(string(Comments::ObjectType))
                    .col(string(Comments::ObjectId))
                    .col(string(Comments::Message))
                    .col(string(Comments::Verb))
                    .col(timestamp_with_time_zone(Comments::CreationTimestamp))
                    .col(timestamp_with_time_zone_null(Comments::LatestChildTimestamp))
                    .col(timestamp_with_time_zone_null(Comments::ExpireDate))
                    .col(string_null(Comments::ReferenceId))
                    .col(string_null(Comments::MetaData))
                    .col(string_null(Comments::Reactions))
                    .to_owned(),
            )
            .await?;

        // Create index for per-object listings ordered by creation time
        manager
            .create_index(
                Index::create()
                    .name("idx_comments_object")
                    .table(Comments::Table)
                    .col(Comments::ObjectType)
                    .col(Comments::ObjectId)
                    .col(Comments::CreationTimestamp)
                    .to_owned(),
            )
            .await?;

        // Create index on parent_id for children counting
        manager
            .create_index(
                Index::create()
                    .name("idx_comments_parent_id")
                    .table(Comments::Table)
                    .col(Comments::ParentId)
                    .to_owned(),
            )
            .await?;

        // Create index on topmost_parent_id for tree expansion
        manager
            .create_index(
                Index::create()
                    .name("idx_comments_topmost_parent_id")
                    .table(Comments::Table)
                    .col(Comments::TopmostParentId)
                    .to_owned(),
            )
            .await?;

        // Create index on expire_date for the expiry purge
        manager
            .create_index(
                Index::create()
                    .name("idx_comments_expire_date")
                    .table(Comments::Table)
                    .col(Comments::ExpireDate)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Comments::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Comments {
    Table,
    Id,
    ParentId,
    TopmostParentId,
    ChildrenCount,
    ActorType,
    ActorId,
    ObjectType,
    ObjectId,
    Message,
    Verb,
    CreationTimestamp,
    LatestChildTimestamp,
    ExpireDate,
    ReferenceId,
    MetaData,
    Reactions,
}
