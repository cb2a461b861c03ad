use anyhow::{Context, Result};
use sqlx::{sqlite::SqliteRow, Row};
use std::collections::BTreeMap;

use crate::models::*;

/// Treat empty strings as NULL
pub fn none_if_empty(opt: Option<String>) -> Option<String> {
    opt.filter(|s| !s.is_empty())
}

/// Map a SQLite row to a Region struct
pub fn map_region_row(row: &SqliteRow) -> Region {
    Region {
        name: row.get("name"),
    }
}

/// Map a SQLite row to a Site struct
pub fn map_site_row(row: &SqliteRow) -> Site {
    Site {
        name: row.get("name"),
        region: row.get("region"),
    }
}

/// Map a SQLite row to a DeviceType struct
pub fn map_device_type_row(row: &SqliteRow) -> DeviceType {
    let slots_json: String = row.get("slots");
    let interfaces: Vec<String> = serde_json::from_str(&slots_json).unwrap_or_default();
    DeviceType {
        model: row.get("model"),
        manufacturer: none_if_empty(row.get("manufacturer")),
        interfaces,
    }
}

/// Map a SQLite row to a Subnet struct
pub fn map_subnet_row(row: &SqliteRow) -> Result<Subnet> {
    let cidr: String = row.get("cidr");
    let purpose: String = row.get("purpose");
    Ok(Subnet {
        cidr: cidr
            .parse()
            .with_context(|| format!("Corrupt subnet cidr '{}'", cidr))?,
        purpose: purpose.parse().map_err(anyhow::Error::msg)?,
        site: none_if_empty(row.get("site")),
        description: none_if_empty(row.get("description")),
    })
}

/// Map a SQLite row to a Device struct
pub fn map_device_row(row: &SqliteRow) -> Result<Device> {
    let custom_json: String = row.get("custom");
    let custom: BTreeMap<String, serde_json::Value> =
        serde_json::from_str(&custom_json).unwrap_or_default();
    let role = match none_if_empty(row.get("role")) {
        Some(role) => Some(role.parse::<FabricRole>().map_err(anyhow::Error::msg)?),
        None => None,
    };
    Ok(Device {
        name: row.get("name"),
        site: row.get("site"),
        device_type: row.get("device_type"),
        attrs: DeviceAttrs {
            asn: row
                .try_get::<Option<i64>, _>("asn")
                .ok()
                .flatten()
                .map(|asn| asn as u32),
            role,
            custom,
        },
    })
}

/// Map a SQLite row to an Interface struct
pub fn map_interface_row(row: &SqliteRow) -> Interface {
    let position: i64 = row.get("position");
    Interface {
        device: row.get("device"),
        name: row.get("name"),
        description: none_if_empty(row.get("description")),
        position: position as u32,
    }
}

/// Map a SQLite row to an IpAddress struct
pub fn map_address_row(row: &SqliteRow) -> Result<IpAddress> {
    let address: String = row.get("address");
    Ok(IpAddress {
        address: address
            .parse()
            .with_context(|| format!("Corrupt address '{}'", address))?,
        interface: InterfaceId::new(
            row.get::<String, _>("device"),
            row.get::<String, _>("interface"),
        ),
    })
}

/// Map a SQLite row to a Connection struct
pub fn map_connection_row(row: &SqliteRow) -> Connection {
    Connection::new(
        InterfaceId::new(
            row.get::<String, _>("a_device"),
            row.get::<String, _>("a_interface"),
        ),
        InterfaceId::new(
            row.get::<String, _>("b_device"),
            row.get::<String, _>("b_interface"),
        ),
    )
}
