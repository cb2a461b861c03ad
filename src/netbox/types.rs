use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// --- NetBox API types ---

#[derive(Debug, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub count: i32,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NestedRef {
    pub id: i32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub display: Option<String>,
}

/// Region, site, manufacturer, role: anything addressed by slug
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NbNamed {
    pub id: i32,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NbDeviceType {
    pub id: i32,
    pub model: String,
    pub slug: String,
    #[serde(default)]
    pub manufacturer: Option<NestedRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NbDevice {
    pub id: i32,
    pub name: Option<String>,
    #[serde(default)]
    pub site: Option<NestedRef>,
    #[serde(default)]
    pub custom_fields: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NbInterface {
    pub id: i32,
    pub name: String,
    #[serde(default)]
    pub device: Option<NestedRef>,
    /// Set once the interface is cabled
    #[serde(default)]
    pub cable: Option<NestedRef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NbPrefix {
    pub id: i32,
    pub prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NbIPAddress {
    pub id: i32,
    pub address: String,
    #[serde(default)]
    pub assigned_object_id: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NbCable {
    pub id: i32,
}

// --- Create request types ---

#[derive(Debug, Serialize)]
pub(crate) struct NamedCreate {
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct SiteCreate {
    pub name: String,
    pub slug: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<i32>,
}

#[derive(Debug, Serialize)]
pub(crate) struct DeviceRoleCreate {
    pub name: String,
    pub slug: String,
    pub color: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct DeviceTypeCreate {
    pub manufacturer: i32,
    pub model: String,
    pub slug: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct PrefixCreate {
    pub prefix: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct DeviceCreate {
    pub name: String,
    pub device_type: i32,
    pub role: i32,
    pub site: i32,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_fields: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct InterfaceCreate {
    pub device: i32,
    pub name: String,
    #[serde(rename = "type")]
    pub iface_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct IPAddressCreate {
    pub address: String,
    pub status: String,
    pub assigned_object_type: String,
    pub assigned_object_id: i32,
}

#[derive(Debug, Serialize)]
pub(crate) struct Termination {
    pub object_type: String,
    pub object_id: i32,
}

impl Termination {
    pub fn interface(id: i32) -> Self {
        Self {
            object_type: "dcim.interface".to_string(),
            object_id: id,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct CableCreate {
    pub a_terminations: Vec<Termination>,
    pub b_terminations: Vec<Termination>,
    pub status: String,
}

// --- Sync result ---

#[derive(Debug, Clone, Serialize)]
pub struct SyncResult {
    pub message: String,
    pub result: SyncCounts,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncCounts {
    pub created: i32,
    pub updated: i32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}
