use sea_orm_migration::{prelude::*, schema::*};

use super::big_pk_auto;
use super::m20260114_000001_create_comments_table::Comments;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Reactions::Table)
                    .col(big_pk_auto(Reactions::Id))
                    .col(big_integer(Reactions::ParentId))
                    .col(big_integer(Reactions::MessageId))
                    .col(string(Reactions::ActorType))
                    .col(string(Reactions::ActorId))
                    .col(string(Reactions::Reaction))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-reactions-parent_id")
                            .from(Reactions::Table, Reactions::ParentId)
                            .to(Comments::Table, Comments::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-reactions-message_id")
                            .from(Reactions::Table, Reactions::MessageId)
                            .to(Comments::Table, Comments::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One live row per (parent, actor, symbol); insert-if-absent leans
        // on this at the storage boundary.
        manager
            .create_index(
                Index::create()
                    .name("uniq_reactions_parent_actor_reaction")
                    .table(Reactions::Table)
                    .col(Reactions::ParentId)
                    .col(Reactions::ActorType)
                    .col(Reactions::ActorId)
                    .col(Reactions::Reaction)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Create index on message_id for cleanup on comment delete
        manager
            .create_index(
                Index::create()
                    .name("idx_reactions_message_id")
                    .table(Reactions::Table)
                    .col(Reactions::MessageId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Reactions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Reactions {
    Table,
    Id,
    ParentId,
    MessageId,
    ActorType,
    ActorId,
    Reaction,
}
