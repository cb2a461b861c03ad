use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Pool, Sqlite};

use crate::models::*;

use super::row_helpers::map_device_type_row;

const SELECT_DEVICE_TYPE: &str = "SELECT model, manufacturer, slots FROM device_types";

/// Device type catalogue operations
pub struct DeviceTypeRepo;

impl DeviceTypeRepo {
    pub async fn list(pool: &Pool<Sqlite>) -> Result<Vec<DeviceType>> {
        let rows = sqlx::query(&format!("{} ORDER BY model", SELECT_DEVICE_TYPE))
            .fetch_all(pool)
            .await?;

        Ok(rows.iter().map(map_device_type_row).collect())
    }

    pub async fn get(pool: &Pool<Sqlite>, model: &str) -> Result<Option<DeviceType>> {
        let row = sqlx::query(&format!("{} WHERE model = ?", SELECT_DEVICE_TYPE))
            .bind(model)
            .fetch_optional(pool)
            .await?;

        Ok(row.as_ref().map(map_device_type_row))
    }

    /// An empty slot list leaves the stored slots untouched
    pub async fn upsert(pool: &Pool<Sqlite>, device_type: &DeviceType) -> Result<DeviceType> {
        let slots = serde_json::to_string(&device_type.interfaces)?;
        sqlx::query(
            r#"
            INSERT INTO device_types (model, manufacturer, slots, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(model) DO UPDATE SET
                manufacturer = COALESCE(excluded.manufacturer, manufacturer),
                slots = CASE WHEN excluded.slots = '[]' THEN slots ELSE excluded.slots END,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&device_type.model)
        .bind(&device_type.manufacturer)
        .bind(&slots)
        .bind(Utc::now())
        .execute(pool)
        .await?;

        Self::get(pool, &device_type.model)
            .await?
            .context("Device type not found after upsert")
    }
}
