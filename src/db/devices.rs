use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Pool, Sqlite};

use crate::models::*;

use super::row_helpers::map_device_row;

const SELECT_DEVICE: &str = r#"
    SELECT name, site, device_type, asn, role, custom
    FROM devices
"#;

/// Device database operations
pub struct DeviceRepo;

impl DeviceRepo {
    pub async fn list(pool: &Pool<Sqlite>) -> Result<Vec<Device>> {
        let rows = sqlx::query(&format!("{} ORDER BY name", SELECT_DEVICE))
            .fetch_all(pool)
            .await?;

        rows.iter().map(map_device_row).collect()
    }

    pub async fn get(pool: &Pool<Sqlite>, name: &str) -> Result<Option<Device>> {
        let row = sqlx::query(&format!("{} WHERE name = ?", SELECT_DEVICE))
            .bind(name)
            .fetch_optional(pool)
            .await?;

        row.as_ref().map(map_device_row).transpose()
    }

    /// Merge the request into the stored device. The custom bag is merged
    /// key by key in Rust since SQLite has no null-skipping JSON patch.
    pub async fn upsert(pool: &Pool<Sqlite>, req: &UpsertDevice) -> Result<Device> {
        let existing = Self::get(pool, &req.name).await?;
        let merged = req.merge_into(existing);
        let custom = serde_json::to_string(&merged.attrs.custom)?;

        sqlx::query(
            r#"
            INSERT INTO devices (name, site, device_type, asn, role, custom, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                site = excluded.site,
                device_type = excluded.device_type,
                asn = COALESCE(excluded.asn, asn),
                role = COALESCE(excluded.role, role),
                custom = excluded.custom,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&merged.name)
        .bind(&merged.site)
        .bind(&merged.device_type)
        .bind(merged.attrs.asn.map(i64::from))
        .bind(merged.attrs.role.map(|r| r.as_str()))
        .bind(&custom)
        .bind(Utc::now())
        .execute(pool)
        .await?;

        Self::get(pool, &req.name)
            .await?
            .context("Device not found after upsert")
    }
}
