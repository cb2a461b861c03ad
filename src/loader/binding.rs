use anyhow::Result;

use crate::db::TopologyStore;
use crate::error::FabricError;
use crate::fabric::RoleResolver;
use crate::models::*;

use super::validate::AddressPin;

/// Outcome of binding a batch of address pins
#[derive(Debug, Default)]
pub struct BindOutcome {
    pub bound: usize,
    pub rejected: Vec<RejectedBinding>,
}

/// Subnet of the interface's purpose that contains `pin`, if any
pub fn covering_subnet<'a>(
    resolver: &RoleResolver,
    subnets: &'a [Subnet],
    pin: &AddressPin,
) -> Result<&'a Subnet, FabricError> {
    let purpose = resolver.classify(&pin.interface.name).purpose();
    subnets
        .iter()
        .find(|s| s.purpose == purpose && s.contains(&pin.address))
        .ok_or_else(|| FabricError::AddressOutOfSubnet {
            interface: pin.interface.to_string(),
            address: pin.address.to_string(),
            purpose: purpose.to_string(),
        })
}

/// Bind each pin whose address lies in a subnet of the matching purpose.
/// Out-of-subnet pins are rejected one by one; the rest still bind.
pub async fn bind_addresses(
    store: &dyn TopologyStore,
    resolver: &RoleResolver,
    pins: &[AddressPin],
) -> Result<BindOutcome> {
    let subnets = store.list_subnets().await?;
    let mut outcome = BindOutcome::default();
    for pin in pins {
        match covering_subnet(resolver, &subnets, pin) {
            Ok(subnet) => {
                store.assign_address(&pin.interface, pin.address).await?;
                tracing::debug!("Bound {} to {} (subnet {})", pin.address, pin.interface, subnet.cidr);
                outcome.bound += 1;
            }
            Err(e) => {
                tracing::warn!("Rejected address binding: {}", e);
                outcome.rejected.push(RejectedBinding {
                    device: pin.interface.device.clone(),
                    interface: pin.interface.name.clone(),
                    address: pin.address.to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subnets() -> Vec<Subnet> {
        vec![
            Subnet {
                cidr: "10.0.0.0/24".parse().unwrap(),
                purpose: SubnetPurpose::Loopback,
                site: None,
                description: None,
            },
            Subnet {
                cidr: "10.0.1.0/24".parse().unwrap(),
                purpose: SubnetPurpose::Underlay,
                site: None,
                description: None,
            },
        ]
    }

    fn pin(interface: &str, address: &str) -> AddressPin {
        AddressPin {
            interface: InterfaceId::new("leaf1", interface),
            address: address.parse().unwrap(),
        }
    }

    #[test]
    fn test_covering_subnet_matches_purpose() {
        let resolver = RoleResolver::new(&["Management\\d*"]).unwrap();
        let subnets = subnets();

        let hit = covering_subnet(&resolver, &subnets, &pin("Loopback0", "10.0.0.1/32")).unwrap();
        assert_eq!(hit.purpose, SubnetPurpose::Loopback);

        // right range, wrong purpose
        let err = covering_subnet(&resolver, &subnets, &pin("Ethernet1", "10.0.0.9/31")).unwrap_err();
        assert_eq!(err.kind(), "address_out_of_subnet");
        assert_eq!(
            err.to_string(),
            "10.0.0.9/31 on leaf1:Ethernet1 is outside every underlay subnet"
        );

        // no management subnet declared at all
        assert!(covering_subnet(&resolver, &subnets, &pin("Management1", "192.168.0.10/24")).is_err());
    }
}
