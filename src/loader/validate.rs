use anyhow::Result;
use ipnet::IpNet;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::db::TopologyStore;
use crate::fabric::{InterfaceClass, RoleResolver};
use crate::models::*;
use crate::utils::is_valid_hostname;

/// Address pin requested by a device record
#[derive(Debug, Clone, PartialEq)]
pub struct AddressPin {
    pub interface: InterfaceId,
    pub address: IpNet,
}

/// A device record with every field parsed
#[derive(Debug, Clone)]
pub struct PlannedDevice {
    pub upsert: UpsertDevice,
    /// Slot names to create, in device type order
    pub slots: Vec<String>,
    pub descriptions: HashMap<String, String>,
}

/// A document that passed validation, ready to be applied
#[derive(Debug, Clone, Default)]
pub struct LoadPlan {
    pub regions: Vec<String>,
    pub sites: Vec<Site>,
    pub device_types: Vec<DeviceType>,
    pub subnets: Vec<Subnet>,
    pub devices: Vec<PlannedDevice>,
    pub pins: Vec<AddressPin>,
    pub links: Vec<(InterfaceId, InterfaceId)>,
}

/// Check every record of `doc` against itself and the current store.
///
/// The store is only read. All issues are collected; an empty report
/// yields the parsed plan. `resolver` decides which slots are loopbacks.
pub async fn validate(
    doc: &TopologyDocument,
    store: &dyn TopologyStore,
    resolver: &RoleResolver,
) -> Result<std::result::Result<LoadPlan, ValidationReport>> {
    let mut report = ValidationReport::default();
    let mut plan = LoadPlan::default();

    let mut regions = BTreeSet::new();
    for (i, record) in doc.regions.iter().enumerate() {
        let loc = locator("regions", i, &record.name);
        if record.name.trim().is_empty() {
            report.push(loc, "region name is empty");
        } else if !regions.insert(record.name.as_str()) {
            report.push(loc, format!("duplicate region '{}'", record.name));
        } else {
            plan.regions.push(record.name.clone());
        }
    }

    let mut sites = BTreeSet::new();
    for (i, record) in doc.sites.iter().enumerate() {
        let loc = locator("sites", i, &record.name);
        if record.name.trim().is_empty() {
            report.push(loc, "site name is empty");
            continue;
        }
        if !sites.insert(record.name.as_str()) {
            report.push(loc, format!("duplicate site '{}'", record.name));
            continue;
        }
        if !regions.contains(record.region.as_str())
            && store.get_region(&record.region).await?.is_none()
        {
            report.push(loc, format!("unknown region '{}'", record.region));
            continue;
        }
        plan.sites.push(Site {
            name: record.name.clone(),
            region: record.region.clone(),
        });
    }

    let mut device_types: BTreeMap<&str, &DeviceTypeRecord> = BTreeMap::new();
    for (i, record) in doc.device_types.iter().enumerate() {
        let loc = locator("device_types", i, &record.model);
        if record.model.trim().is_empty() {
            report.push(loc, "device type model is empty");
            continue;
        }
        if device_types.contains_key(record.model.as_str()) {
            report.push(loc, format!("duplicate device type '{}'", record.model));
            continue;
        }
        let mut seen = BTreeSet::new();
        let dupes: Vec<&str> = record
            .interfaces
            .iter()
            .filter(|slot| !seen.insert(slot.as_str()))
            .map(String::as_str)
            .collect();
        if !dupes.is_empty() {
            report.push(loc, format!("duplicate interface slots: {}", dupes.join(", ")));
            continue;
        }
        let loopbacks = record
            .interfaces
            .iter()
            .filter(|slot| resolver.classify(slot) == InterfaceClass::Loopback)
            .count();
        if loopbacks != 1 {
            report.push(
                loc,
                format!(
                    "device type '{}' must have exactly one loopback slot (found {})",
                    record.model, loopbacks
                ),
            );
        }
        device_types.insert(record.model.as_str(), record);
        plan.device_types.push(DeviceType {
            model: record.model.clone(),
            manufacturer: record.manufacturer.clone(),
            interfaces: record.interfaces.clone(),
        });
    }

    let mut cidrs = BTreeSet::new();
    for (i, record) in doc.subnets.iter().enumerate() {
        let loc = locator("subnets", i, &record.cidr);
        let mut ok = true;
        let cidr = match record.cidr.trim().parse::<IpNet>() {
            Ok(cidr) => Some(cidr.trunc()),
            Err(_) => {
                report.push(loc.clone(), format!("malformed CIDR '{}'", record.cidr));
                ok = false;
                None
            }
        };
        let purpose = match record.purpose.parse::<SubnetPurpose>() {
            Ok(purpose) => Some(purpose),
            Err(e) => {
                report.push(loc.clone(), e);
                ok = false;
                None
            }
        };
        if let Some(site) = &record.site {
            if !site_known(site, &sites, store).await? {
                report.push(loc.clone(), format!("unknown site '{}'", site));
                ok = false;
            }
        }
        if let Some(cidr) = cidr {
            if !cidrs.insert(cidr) {
                report.push(loc, format!("duplicate subnet {}", cidr));
                ok = false;
            }
        }
        if let (true, Some(cidr), Some(purpose)) = (ok, cidr, purpose) {
            plan.subnets.push(Subnet {
                cidr,
                purpose,
                site: record.site.clone(),
                description: record.description.clone(),
            });
        }
    }

    // device name -> slots, for link checks
    let mut device_slots: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for (i, record) in doc.devices.iter().enumerate() {
        let loc = locator("devices", i, &record.name);
        if !is_valid_hostname(&record.name) {
            report.push(loc, format!("invalid device name '{}'", record.name));
            continue;
        }
        if device_slots.contains_key(record.name.as_str()) {
            report.push(loc, format!("duplicate device '{}'", record.name));
            continue;
        }
        let mut ok = true;
        if !site_known(&record.site, &sites, store).await? {
            report.push(loc.clone(), format!("unknown site '{}'", record.site));
            ok = false;
        }
        let role = match record.role.as_deref().map(str::parse::<FabricRole>) {
            Some(Err(e)) => {
                report.push(loc.clone(), e);
                ok = false;
                None
            }
            Some(Ok(role)) => Some(role),
            None => None,
        };

        let slots = match device_types.get(record.device_type.as_str()) {
            Some(dt) => Some(dt.interfaces.clone()),
            None => store
                .get_device_type(&record.device_type)
                .await?
                .map(|dt| dt.interfaces),
        };
        let Some(slots) = slots else {
            // slot checks depend on the type; one issue is enough
            report.push(loc, format!("unknown device type '{}'", record.device_type));
            continue;
        };

        let mut descriptions = HashMap::new();
        let mut pins = Vec::new();
        let mut detailed = BTreeSet::new();
        for iface in &record.interfaces {
            if !slots.contains(&iface.name) {
                report.push(
                    loc.clone(),
                    format!(
                        "interface '{}' is not a slot of device type '{}'",
                        iface.name, record.device_type
                    ),
                );
                ok = false;
                continue;
            }
            if !detailed.insert(iface.name.as_str()) {
                report.push(loc.clone(), format!("interface '{}' listed twice", iface.name));
                ok = false;
                continue;
            }
            if let Some(desc) = &iface.description {
                descriptions.insert(iface.name.clone(), desc.clone());
            }
            if let Some(raw) = &iface.address {
                match raw.trim().parse::<IpNet>() {
                    Ok(address) => pins.push(AddressPin {
                        interface: InterfaceId::new(&record.name, &iface.name),
                        address,
                    }),
                    Err(_) => {
                        report.push(
                            loc.clone(),
                            format!(
                                "malformed address '{}' on {} (expected CIDR notation)",
                                raw, iface.name
                            ),
                        );
                        ok = false;
                    }
                }
            }
        }

        device_slots.insert(record.name.as_str(), slots.clone());
        if ok {
            plan.devices.push(PlannedDevice {
                upsert: UpsertDevice {
                    name: record.name.clone(),
                    site: record.site.clone(),
                    device_type: record.device_type.clone(),
                    attrs: DeviceAttrs {
                        asn: record.asn,
                        role,
                        custom: record.custom.clone(),
                    },
                },
                slots,
                descriptions,
            });
            plan.pins.extend(pins);
        }
    }

    let mut cabled: HashMap<InterfaceId, String> = HashMap::new();
    for (i, record) in doc.links.iter().enumerate() {
        let loc = format!("links[{}] ({} <-> {})", i, record.a, record.b);
        let mut ok = true;
        for end in [&record.a, &record.b] {
            if !interface_known(end, &device_slots, store).await? {
                report.push(loc.clone(), format!("unknown interface {}", end));
                ok = false;
            }
        }
        if record.a.device == record.b.device {
            report.push(loc.clone(), "both ends on the same device");
            ok = false;
        }
        let a = InterfaceId::new(&record.a.device, &record.a.interface);
        let b = InterfaceId::new(&record.b.device, &record.b.interface);
        for (end, other) in [(&a, &b), (&b, &a)] {
            if let Some(prev) = cabled.insert(end.clone(), loc.clone()) {
                report.push(loc.clone(), format!("{} already used by {}", end, prev));
                ok = false;
            }
            if let Some(peer) = store.get_connected_peer(end).await? {
                if &peer.id() != other {
                    report.push(
                        loc.clone(),
                        format!("{} is already connected to {}", end, peer.id()),
                    );
                    ok = false;
                }
            }
        }
        if ok {
            plan.links.push((a, b));
        }
    }

    if report.is_empty() {
        Ok(Ok(plan))
    } else {
        Ok(Err(report))
    }
}

fn locator(section: &str, index: usize, key: &str) -> String {
    format!("{}[{}] ({})", section, index, key)
}

async fn site_known(
    site: &str,
    declared: &BTreeSet<&str>,
    store: &dyn TopologyStore,
) -> Result<bool> {
    Ok(declared.contains(site) || store.get_site(site).await?.is_some())
}

async fn interface_known(
    end: &LinkEnd,
    device_slots: &BTreeMap<&str, Vec<String>>,
    store: &dyn TopologyStore,
) -> Result<bool> {
    if let Some(slots) = device_slots.get(end.device.as_str()) {
        return Ok(slots.contains(&end.interface));
    }
    Ok(store
        .get_interface(&InterfaceId::new(&end.device, &end.interface))
        .await?
        .is_some())
}
