use sea_orm_migration::prelude::*;
use sea_orm_migration::schema::big_integer;

/// Big-integer auto-increment primary key column. The `schema` helper module
/// ships `pk_auto` (a 32-bit integer PK) but no big-integer variant, so we
/// build it from the big-integer column helper to match the `i64` entity ids.
pub(crate) fn big_pk_auto<T: IntoIden>(name: T) -> ColumnDef {
    big_integer(name).auto_increment().primary_key().take()
}

mod m20260114_000001_create_comments_table;
mod m20260114_000002_create_reactions_table;
mod m20260114_000003_create_read_markers_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260114_000001_create_comments_table::Migration),
            Box::new(m20260114_000002_create_reactions_table::Migration),
            Box::new(m20260114_000003_create_read_markers_table::Migration),
        ]
    }
}

#[cfg(test)]
use sea_orm::{Database, DbErr};

#[tokio::test]
async fn test_migrations_okay() -> Result<(), DbErr> {
    let db = Database::connect("sqlite::memory:").await?;
    let schema_manager = SchemaManager::new(&db);

    Migrator::refresh(&db).await?;

    assert!(schema_manager.has_table("comments").await?);
    assert!(schema_manager.has_table("reactions").await?);
    assert!(schema_manager.has_table("comments_read_markers").await?);

    Ok(())
}
