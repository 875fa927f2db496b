//! Every test gets its own SQLite file under the system temp dir, so tests can run in parallel.
use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

use crate::SqliteDatabase;

fn random_db_url() -> String {
    let dir = std::env::temp_dir();
    format!("sqlite://{}/test_dpos_{:016x}.db", dir.display(), rand::random::<u64>())
}

/// Creates a fresh, migrated database at a random path and opens it.
///
/// Settings from `.env.test` are loaded first, if the file exists.
pub async fn fresh_database() -> SqliteDatabase {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    let url = random_db_url();
    Sqlite::create_database(&url).await.expect("Error creating test database");
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error opening test database");
    db.run_migrations().await.expect("Error running DB migrations");
    debug!("🗃️ Test database ready at {url}");
    db
}

/// Closes the pool and deletes the database file.
pub async fn tear_down(db: SqliteDatabase) {
    let url = db.url().to_string();
    db.close().await;
    if let Err(e) = Sqlite::drop_database(&url).await {
        warn!("🗃️ Could not drop test database {url}. {e}");
    }
}
