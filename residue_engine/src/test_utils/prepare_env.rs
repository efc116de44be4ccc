use log::*;
use sqlx::{migrate::MigrateDatabase, Sqlite};

use crate::SqliteDatabase;

/// A fresh, uniquely named database file in the system temp directory.
pub fn random_db_path() -> String {
    let path = std::env::temp_dir().join(format!("residue_test_{}.db", rand::random::<u64>()));
    format!("sqlite://{}", path.display())
}

/// Creates the database at `url` (dropping any previous copy) and brings its schema up to date.
pub async fn prepare_test_db(url: &str, max_connections: u32) -> Result<SqliteDatabase, sqlx::Error> {
    create_database(url).await?;
    let db = SqliteDatabase::new_with_url(url, max_connections).await?;
    db.run_migrations().await?;
    debug!("🚀️ Test database ready at {url}");
    Ok(db)
}

pub async fn create_database(url: &str) -> Result<(), sqlx::Error> {
    if Sqlite::database_exists(url).await? {
        if let Err(e) = Sqlite::drop_database(url).await {
            warn!("🚀️ Error dropping database {url}: {e:?}");
        }
    }
    Sqlite::create_database(url).await?;
    info!("🚀️ Created Sqlite database {url}");
    Ok(())
}

pub async fn drop_database(url: &str) -> Result<(), sqlx::Error> {
    Sqlite::drop_database(url).await
}
