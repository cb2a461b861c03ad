use anyhow::Result;
use chrono::Utc;
use sqlx::{Pool, Row, Sqlite};

use crate::models::*;

use super::row_helpers::map_connection_row;

/// Physical link operations. Rows hold normalized endpoints (a < b).
pub struct ConnectionRepo;

impl ConnectionRepo {
    pub async fn list(pool: &Pool<Sqlite>) -> Result<Vec<Connection>> {
        let rows = sqlx::query(
            r#"
            SELECT a_device, a_interface, b_device, b_interface
            FROM connections
            ORDER BY a_device, a_interface
            "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(rows.iter().map(map_connection_row).collect())
    }

    /// The interface cabled to `end`, looking at both columns
    pub async fn peer_of(pool: &Pool<Sqlite>, end: &InterfaceId) -> Result<Option<InterfaceId>> {
        let row = sqlx::query(
            r#"
            SELECT b_device AS device, b_interface AS interface
            FROM connections WHERE a_device = ? AND a_interface = ?
            UNION ALL
            SELECT a_device AS device, a_interface AS interface
            FROM connections WHERE b_device = ? AND b_interface = ?
            LIMIT 1
            "#,
        )
        .bind(&end.device)
        .bind(&end.name)
        .bind(&end.device)
        .bind(&end.name)
        .fetch_optional(pool)
        .await?;

        Ok(row.map(|r| {
            InterfaceId::new(
                r.get::<String, _>("device"),
                r.get::<String, _>("interface"),
            )
        }))
    }

    pub async fn insert(pool: &Pool<Sqlite>, connection: &Connection) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO connections (a_device, a_interface, b_device, b_interface, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&connection.a.device)
        .bind(&connection.a.name)
        .bind(&connection.b.device)
        .bind(&connection.b.name)
        .bind(Utc::now())
        .execute(pool)
        .await?;
        Ok(())
    }
}
