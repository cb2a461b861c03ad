use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{Pool, Sqlite};

use crate::models::*;

use super::row_helpers::{map_region_row, map_site_row};

/// Region database operations
pub struct RegionRepo;

impl RegionRepo {
    pub async fn list(pool: &Pool<Sqlite>) -> Result<Vec<Region>> {
        let rows = sqlx::query("SELECT name FROM regions ORDER BY name")
            .fetch_all(pool)
            .await?;

        Ok(rows.iter().map(map_region_row).collect())
    }

    pub async fn get(pool: &Pool<Sqlite>, name: &str) -> Result<Option<Region>> {
        let row = sqlx::query("SELECT name FROM regions WHERE name = ?")
            .bind(name)
            .fetch_optional(pool)
            .await?;

        Ok(row.as_ref().map(map_region_row))
    }

    pub async fn upsert(pool: &Pool<Sqlite>, name: &str) -> Result<Region> {
        sqlx::query(
            r#"
            INSERT INTO regions (name, updated_at) VALUES (?, ?)
            ON CONFLICT(name) DO NOTHING
            "#,
        )
        .bind(name)
        .bind(Utc::now())
        .execute(pool)
        .await?;

        Self::get(pool, name)
            .await?
            .context("Region not found after upsert")
    }
}

/// Site database operations
pub struct SiteRepo;

impl SiteRepo {
    pub async fn list(pool: &Pool<Sqlite>) -> Result<Vec<Site>> {
        let rows = sqlx::query("SELECT name, region FROM sites ORDER BY name")
            .fetch_all(pool)
            .await?;

        Ok(rows.iter().map(map_site_row).collect())
    }

    pub async fn get(pool: &Pool<Sqlite>, name: &str) -> Result<Option<Site>> {
        let row = sqlx::query("SELECT name, region FROM sites WHERE name = ?")
            .bind(name)
            .fetch_optional(pool)
            .await?;

        Ok(row.as_ref().map(map_site_row))
    }

    pub async fn upsert(pool: &Pool<Sqlite>, name: &str, region: &str) -> Result<Site> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO sites (name, region, updated_at) VALUES (?, ?, ?)
            ON CONFLICT(name) DO UPDATE SET
                region = excluded.region,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(name)
        .bind(region)
        .bind(now)
        .execute(pool)
        .await?;

        Self::get(pool, name)
            .await?
            .context("Site not found after upsert")
    }
}
