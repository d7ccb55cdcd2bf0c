use sea_orm::{Database, DatabaseConnection};

/// Create a new in-memory SQLite database for testing.
/// Each call creates a fresh, isolated database instance.
pub async fn create_test_db() -> DatabaseConnection {
    Database::connect("sqlite::memory:")
        .await
        .expect("Failed to create test database")
}

/// Create a new in-memory SQLite database with migrations already applied.
/// This is a convenience function for tests that need a fully set up database.
///
/// # Example
/// ```
/// use remark_core::test_utils;
///
/// # async fn demo() {
/// let db = test_utils::create_test_db_with_migrations().await;
/// // Database is ready to use!
/// # }
/// ```
pub async fn create_test_db_with_migrations() -> DatabaseConnection {
    let db = create_test_db().await;
    crate::models::migrate_up(db.clone()).await;
    db
}
