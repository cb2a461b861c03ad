use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Declarative topology description as accepted by the loader.
///
/// Addresses, CIDRs, roles and purposes stay as raw strings here so that
/// malformed values surface as validation issues instead of parse errors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TopologyDocument {
    #[serde(default)]
    pub regions: Vec<RegionRecord>,
    #[serde(default)]
    pub sites: Vec<SiteRecord>,
    #[serde(default)]
    pub device_types: Vec<DeviceTypeRecord>,
    #[serde(default)]
    pub subnets: Vec<SubnetRecord>,
    #[serde(default)]
    pub devices: Vec<DeviceRecord>,
    #[serde(default)]
    pub links: Vec<LinkRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionRecord {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteRecord {
    pub name: String,
    pub region: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceTypeRecord {
    pub model: String,
    #[serde(default)]
    pub manufacturer: Option<String>,
    pub interfaces: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubnetRecord {
    pub cidr: String,
    pub purpose: String,
    #[serde(default)]
    pub site: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub name: String,
    pub site: String,
    pub device_type: String,
    #[serde(default)]
    pub asn: Option<u32>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub custom: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub interfaces: Vec<InterfaceRecord>,
}

/// Per-slot detail for a device: description and/or pinned address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceRecord {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LinkEnd {
    pub device: String,
    pub interface: String,
}

impl std::fmt::Display for LinkEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.device, self.interface)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub a: LinkEnd,
    pub b: LinkEnd,
}

impl TopologyDocument {
    /// Parse a YAML document. JSON is a subset of YAML so both are accepted.
    pub fn parse(raw: &str) -> Result<Self> {
        serde_yaml::from_str(raw).context("Failed to parse topology document")
    }

    pub async fn from_path(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&raw)
    }
}
