use anyhow::{Context, Result};
use chrono::Utc;
use ipnet::IpNet;
use sqlx::{Pool, Sqlite};

use crate::models::*;

use super::row_helpers::{map_address_row, map_subnet_row};

const SELECT_SUBNET: &str = "SELECT cidr, purpose, site, description FROM subnets";
const SELECT_ADDRESS: &str = "SELECT address, device, interface FROM ip_addresses";

/// Declared subnet operations
pub struct SubnetRepo;

impl SubnetRepo {
    pub async fn list(pool: &Pool<Sqlite>) -> Result<Vec<Subnet>> {
        let rows = sqlx::query(SELECT_SUBNET).fetch_all(pool).await?;
        let mut subnets = rows.iter().map(map_subnet_row).collect::<Result<Vec<_>>>()?;
        // text order of cidrs is not numeric order
        subnets.sort_by(|a, b| a.cidr.cmp(&b.cidr));
        Ok(subnets)
    }

    pub async fn get(pool: &Pool<Sqlite>, cidr: &IpNet) -> Result<Option<Subnet>> {
        let row = sqlx::query(&format!("{} WHERE cidr = ?", SELECT_SUBNET))
            .bind(cidr.to_string())
            .fetch_optional(pool)
            .await?;

        row.as_ref().map(map_subnet_row).transpose()
    }

    pub async fn upsert(pool: &Pool<Sqlite>, subnet: &Subnet) -> Result<Subnet> {
        sqlx::query(
            r#"
            INSERT INTO subnets (cidr, purpose, site, description, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(cidr) DO UPDATE SET
                purpose = excluded.purpose,
                site = COALESCE(excluded.site, site),
                description = COALESCE(excluded.description, description),
                updated_at = excluded.updated_at
            "#,
        )
        .bind(subnet.cidr.to_string())
        .bind(subnet.purpose.as_str())
        .bind(&subnet.site)
        .bind(&subnet.description)
        .bind(Utc::now())
        .execute(pool)
        .await?;

        Self::get(pool, &subnet.cidr)
            .await?
            .context("Subnet not found after upsert")
    }
}

/// Interface address binding operations
pub struct AddressRepo;

impl AddressRepo {
    pub async fn list(pool: &Pool<Sqlite>) -> Result<Vec<IpAddress>> {
        let rows = sqlx::query(&format!("{} ORDER BY device, interface", SELECT_ADDRESS))
            .fetch_all(pool)
            .await?;

        rows.iter().map(map_address_row).collect()
    }

    pub async fn get_for_interface(
        pool: &Pool<Sqlite>,
        interface: &InterfaceId,
    ) -> Result<Option<IpAddress>> {
        let row = sqlx::query(&format!(
            "{} WHERE device = ? AND interface = ?",
            SELECT_ADDRESS
        ))
        .bind(&interface.device)
        .bind(&interface.name)
        .fetch_optional(pool)
        .await?;

        row.as_ref().map(map_address_row).transpose()
    }

    /// Replace whatever the interface held and take the address away from
    /// any other interface, in one transaction
    pub async fn assign(
        pool: &Pool<Sqlite>,
        interface: &InterfaceId,
        address: IpNet,
    ) -> Result<IpAddress> {
        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM ip_addresses WHERE (device = ? AND interface = ?) OR address = ?")
            .bind(&interface.device)
            .bind(&interface.name)
            .bind(address.to_string())
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT INTO ip_addresses (address, device, interface, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(address.to_string())
        .bind(&interface.device)
        .bind(&interface.name)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(IpAddress {
            address,
            interface: interface.clone(),
        })
    }
}
