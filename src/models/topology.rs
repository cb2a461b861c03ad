use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::ipam::{IpAddress, Subnet};

/// Region is a top-level location tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub name: String,
}

/// Site belongs to exactly one region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub name: String,
    pub region: String,
}

/// DeviceType is a device model plus its fixed, ordered interface slots
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceType {
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    pub interfaces: Vec<String>,
}

/// Position of a device in a two-tier CLOS fabric
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FabricRole {
    Spine,
    Leaf,
}

impl FabricRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            FabricRole::Spine => "spine",
            FabricRole::Leaf => "leaf",
        }
    }

    /// Name of the peer group a device of this role puts its neighbors in.
    /// Spines peer downwards with leaves, leaves peer upwards with spines.
    pub fn peer_group(&self) -> &'static str {
        match self {
            FabricRole::Spine => "LEAFS",
            FabricRole::Leaf => "SPINES",
        }
    }
}

impl fmt::Display for FabricRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FabricRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "spine" => Ok(FabricRole::Spine),
            "leaf" => Ok(FabricRole::Leaf),
            other => Err(format!("unknown fabric role '{}' (expected spine or leaf)", other)),
        }
    }
}

/// Mutable attribute bag carried by a device.
///
/// Merging follows natural-key upsert rules: a present value overwrites,
/// an absent (or JSON null) value never clears what is already stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceAttrs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asn: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<FabricRole>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom: BTreeMap<String, serde_json::Value>,
}

impl DeviceAttrs {
    pub fn merge(&mut self, update: &DeviceAttrs) {
        if let Some(asn) = update.asn {
            self.asn = Some(asn);
        }
        if let Some(role) = update.role {
            self.role = Some(role);
        }
        for (key, value) in &update.custom {
            if !value.is_null() {
                self.custom.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Device is an instance of a DeviceType placed at a Site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub name: String,
    pub site: String,
    pub device_type: String,
    #[serde(flatten)]
    pub attrs: DeviceAttrs,
}

/// UpsertDevice carries the natural key plus the fields to merge
#[derive(Debug, Clone, Deserialize)]
pub struct UpsertDevice {
    pub name: String,
    pub site: String,
    pub device_type: String,
    #[serde(default)]
    pub attrs: DeviceAttrs,
}

impl UpsertDevice {
    /// Apply this request on top of an existing device (or create one)
    pub fn merge_into(&self, existing: Option<Device>) -> Device {
        match existing {
            Some(mut device) => {
                device.site = self.site.clone();
                device.device_type = self.device_type.clone();
                device.attrs.merge(&self.attrs);
                device
            }
            None => {
                let mut attrs = DeviceAttrs::default();
                attrs.merge(&self.attrs);
                Device {
                    name: self.name.clone(),
                    site: self.site.clone(),
                    device_type: self.device_type.clone(),
                    attrs,
                }
            }
        }
    }
}

/// Natural key of an interface: owning device + interface name
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InterfaceId {
    pub device: String,
    #[serde(rename = "interface")]
    pub name: String,
}

impl InterfaceId {
    pub fn new(device: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.device, self.name)
    }
}

/// Interface belongs to exactly one device; `position` is the store's
/// enumeration order within that device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interface {
    pub device: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub position: u32,
}

impl Interface {
    pub fn id(&self) -> InterfaceId {
        InterfaceId::new(&self.device, &self.name)
    }
}

/// Connection is an unordered pair of interfaces on two distinct devices.
/// Endpoints are kept sorted so equal links compare equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Connection {
    pub a: InterfaceId,
    pub b: InterfaceId,
}

impl Connection {
    pub fn new(x: InterfaceId, y: InterfaceId) -> Self {
        if x <= y {
            Self { a: x, b: y }
        } else {
            Self { a: y, b: x }
        }
    }

    pub fn is_self_loop(&self) -> bool {
        self.a.device == self.b.device
    }

    /// The far end as seen from `end`, if `end` is part of this link
    pub fn other_end(&self, end: &InterfaceId) -> Option<&InterfaceId> {
        if &self.a == end {
            Some(&self.b)
        } else if &self.b == end {
            Some(&self.a)
        } else {
            None
        }
    }
}

/// Full structural dump of a topology store, sorted by natural key
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    pub regions: Vec<Region>,
    pub sites: Vec<Site>,
    pub device_types: Vec<DeviceType>,
    pub subnets: Vec<Subnet>,
    pub devices: Vec<Device>,
    pub interfaces: Vec<Interface>,
    pub addresses: Vec<IpAddress>,
    pub connections: Vec<Connection>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attrs_merge_never_clears() {
        let mut attrs = DeviceAttrs {
            asn: Some(65001),
            role: Some(FabricRole::Leaf),
            custom: BTreeMap::from([("rack".to_string(), serde_json::json!("R1"))]),
        };
        attrs.merge(&DeviceAttrs {
            asn: None,
            role: None,
            custom: BTreeMap::from([("rack".to_string(), serde_json::Value::Null)]),
        });
        assert_eq!(attrs.asn, Some(65001));
        assert_eq!(attrs.role, Some(FabricRole::Leaf));
        assert_eq!(attrs.custom["rack"], serde_json::json!("R1"));

        attrs.merge(&DeviceAttrs {
            asn: Some(65002),
            ..Default::default()
        });
        assert_eq!(attrs.asn, Some(65002));
    }

    #[test]
    fn test_role_parse() {
        assert_eq!("Spine".parse::<FabricRole>(), Ok(FabricRole::Spine));
        assert_eq!(" leaf ".parse::<FabricRole>(), Ok(FabricRole::Leaf));
        assert!("super-spine".parse::<FabricRole>().is_err());
        assert_eq!(FabricRole::Spine.peer_group(), "LEAFS");
        assert_eq!(FabricRole::Leaf.peer_group(), "SPINES");
    }

    #[test]
    fn test_connection_is_unordered() {
        let x = InterfaceId::new("spine1", "Ethernet1");
        let y = InterfaceId::new("leaf1", "Ethernet1");
        let link = Connection::new(x.clone(), y.clone());
        assert_eq!(link, Connection::new(y.clone(), x.clone()));
        assert_eq!(link.other_end(&x), Some(&y));
        assert_eq!(link.other_end(&y), Some(&x));
        assert!(!link.is_self_loop());
        assert!(Connection::new(InterfaceId::new("a", "e1"), InterfaceId::new("a", "e2")).is_self_loop());
    }
}
