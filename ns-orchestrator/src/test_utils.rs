use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

/// In-memory ledger database with migrations applied.
///
/// Each connection to `sqlite::memory:` is its own database, so the pool is
/// pinned to a single connection.
pub async fn create_test_db() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    pool
}
