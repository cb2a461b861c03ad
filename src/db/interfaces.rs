use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Pool, Sqlite};

use crate::models::*;

use super::row_helpers::map_interface_row;

const SELECT_INTERFACE: &str = "SELECT device, name, description, position FROM interfaces";

/// Interface database operations
pub struct InterfaceRepo;

impl InterfaceRepo {
    pub async fn list(pool: &Pool<Sqlite>) -> Result<Vec<Interface>> {
        let rows = sqlx::query(&format!("{} ORDER BY device, name", SELECT_INTERFACE))
            .fetch_all(pool)
            .await?;

        Ok(rows.iter().map(map_interface_row).collect())
    }

    pub async fn list_for_device(pool: &Pool<Sqlite>, device: &str) -> Result<Vec<Interface>> {
        let rows = sqlx::query(&format!(
            "{} WHERE device = ? ORDER BY position",
            SELECT_INTERFACE
        ))
        .bind(device)
        .fetch_all(pool)
        .await?;

        Ok(rows.iter().map(map_interface_row).collect())
    }

    pub async fn get(pool: &Pool<Sqlite>, id: &InterfaceId) -> Result<Option<Interface>> {
        let row = sqlx::query(&format!(
            "{} WHERE device = ? AND name = ?",
            SELECT_INTERFACE
        ))
        .bind(&id.device)
        .bind(&id.name)
        .fetch_optional(pool)
        .await?;

        Ok(row.as_ref().map(map_interface_row))
    }

    /// New interfaces are appended after the device's last position
    pub async fn upsert(
        pool: &Pool<Sqlite>,
        device: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<Interface> {
        sqlx::query(
            r#"
            INSERT INTO interfaces (device, name, description, position, updated_at)
            SELECT ?, ?, ?, COALESCE(MAX(position) + 1, 0), ?
            FROM interfaces WHERE device = ?
            ON CONFLICT(device, name) DO UPDATE SET
                description = COALESCE(excluded.description, description),
                updated_at = excluded.updated_at
            "#,
        )
        .bind(device)
        .bind(name)
        .bind(description)
        .bind(Utc::now())
        .bind(device)
        .execute(pool)
        .await?;

        Self::get(pool, &InterfaceId::new(device, name))
            .await?
            .context("Interface not found after upsert")
    }
}
