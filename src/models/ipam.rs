use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::topology::InterfaceId;

/// What a declared subnet is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubnetPurpose {
    Loopback,
    Underlay,
    Management,
    Customer,
}

impl SubnetPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubnetPurpose::Loopback => "loopback",
            SubnetPurpose::Underlay => "underlay",
            SubnetPurpose::Management => "management",
            SubnetPurpose::Customer => "customer",
        }
    }
}

impl fmt::Display for SubnetPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubnetPurpose {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "loopback" => Ok(SubnetPurpose::Loopback),
            "underlay" | "p2p" | "point-to-point" => Ok(SubnetPurpose::Underlay),
            "management" | "mgmt" => Ok(SubnetPurpose::Management),
            "customer" => Ok(SubnetPurpose::Customer),
            other => Err(format!("unknown subnet purpose '{}'", other)),
        }
    }
}

/// Subnet is a declared CIDR block tagged with a purpose
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subnet {
    pub cidr: IpNet,
    pub purpose: SubnetPurpose,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Subnet {
    /// True if `address` (host part) falls inside this block.
    /// The address family must match.
    pub fn contains(&self, address: &IpNet) -> bool {
        self.cidr.contains(&address.addr())
    }
}

/// IpAddress is a CIDR-qualified address bound to one interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpAddress {
    pub address: IpNet,
    #[serde(flatten)]
    pub interface: InterfaceId,
}

impl IpAddress {
    /// Host part without prefix length, as used in neighbor statements
    pub fn host(&self) -> String {
        self.address.addr().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subnet(cidr: &str, purpose: SubnetPurpose) -> Subnet {
        Subnet {
            cidr: cidr.parse().unwrap(),
            purpose,
            site: None,
            description: None,
        }
    }

    #[test]
    fn test_subnet_contains() {
        let p2p = subnet("10.0.1.0/24", SubnetPurpose::Underlay);
        assert!(p2p.contains(&"10.0.1.1/31".parse().unwrap()));
        assert!(p2p.contains(&"10.0.1.255/32".parse().unwrap()));
        assert!(!p2p.contains(&"10.0.2.1/31".parse().unwrap()));
        assert!(!p2p.contains(&"2001:db8::1/64".parse().unwrap()));
    }

    #[test]
    fn test_purpose_aliases() {
        assert_eq!("p2p".parse::<SubnetPurpose>(), Ok(SubnetPurpose::Underlay));
        assert_eq!("Point-To-Point".parse::<SubnetPurpose>(), Ok(SubnetPurpose::Underlay));
        assert_eq!("loopback".parse::<SubnetPurpose>(), Ok(SubnetPurpose::Loopback));
        assert!("transit".parse::<SubnetPurpose>().is_err());
    }

    #[test]
    fn test_address_host() {
        let addr = IpAddress {
            address: "10.0.1.1/31".parse().unwrap(),
            interface: InterfaceId::new("spine1", "Ethernet1"),
        };
        assert_eq!(addr.host(), "10.0.1.1");
        assert_eq!(addr.address.to_string(), "10.0.1.1/31");
    }
}
