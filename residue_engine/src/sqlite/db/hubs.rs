use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::db_types::{Hub, NewHub};

pub async fn insert_hub(hub: NewHub, now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<Hub, sqlx::Error> {
    sqlx::query_as("INSERT INTO hubs (id, name, created_at) VALUES (?, ?, ?) RETURNING *")
        .bind(hub.id)
        .bind(hub.name)
        .bind(now)
        .fetch_one(conn)
        .await
}

pub async fn fetch_hub(hub_id: &str, conn: &mut SqliteConnection) -> Result<Option<Hub>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM hubs WHERE id = ?").bind(hub_id).fetch_optional(conn).await
}
