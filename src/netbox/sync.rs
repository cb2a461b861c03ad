use anyhow::Result;
use std::collections::HashMap;

use crate::db::TopologyStore;
use crate::fabric::{FabricGraph, InterfaceClass, RoleResolver};
use crate::models::*;
use crate::utils::slugify;

use super::client::NetBoxClient;
use super::types::{DeviceCreate, NbInterface, PrefixCreate, SyncCounts, SyncResult};

const DEFAULT_MANUFACTURER: &str = "Generic";
const UNASSIGNED_ROLE: &str = "unassigned";

/// Device role slug and display color
fn role_for(role: Option<FabricRole>) -> (&'static str, &'static str) {
    match role {
        Some(FabricRole::Spine) => ("spine", "2196f3"),
        Some(FabricRole::Leaf) => ("leaf", "4caf50"),
        None => (UNASSIGNED_ROLE, "9e9e9e"),
    }
}

fn interface_type(class: InterfaceClass) -> &'static str {
    match class {
        InterfaceClass::Loopback => "virtual",
        InterfaceClass::Excluded | InterfaceClass::Physical => "other",
    }
}

fn display_name(slug: &str) -> String {
    let mut chars = slug.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[derive(Default)]
struct Tally {
    created: i32,
    updated: i32,
    errors: Vec<String>,
}

impl Tally {
    fn record<T>(&mut self, what: &str, result: Result<(T, bool)>) -> Option<T> {
        match result {
            Ok((value, created)) => {
                if created {
                    self.created += 1;
                }
                Some(value)
            }
            Err(e) => {
                self.errors.push(format!("{}: {}", what, e));
                None
            }
        }
    }
}

/// Push a snapshot of the store into NetBox.
///
/// Every entity is get-or-create, so pushing twice creates nothing new.
/// A failing entity is recorded in the result and the push moves on.
pub async fn sync_push(
    store: &dyn TopologyStore,
    nb: &NetBoxClient,
    resolver: &RoleResolver,
) -> Result<SyncResult> {
    let inventory = store.snapshot().await?;
    let graph = FabricGraph::build(store).await?;
    let roles = resolver.infer_roles(&graph).resolved();
    let mut tally = Tally::default();

    let mut regions = HashMap::new();
    for region in &inventory.regions {
        let result = nb.get_or_create_region(&region.name, &slugify(&region.name)).await;
        if let Some(nb_region) = tally.record(&format!("region {}", region.name), result) {
            regions.insert(region.name.clone(), nb_region.id);
        }
    }

    let mut sites = HashMap::new();
    for site in &inventory.sites {
        let region = regions.get(&site.region).copied();
        let result = nb.get_or_create_site(&site.name, &slugify(&site.name), region).await;
        if let Some(nb_site) = tally.record(&format!("site {}", site.name), result) {
            sites.insert(site.name.clone(), nb_site.id);
        }
    }

    let mut device_types = HashMap::new();
    for dt in &inventory.device_types {
        let vendor = dt.manufacturer.as_deref().unwrap_or(DEFAULT_MANUFACTURER);
        let result = nb.get_or_create_manufacturer(vendor, &slugify(vendor)).await;
        let Some(manufacturer) = tally.record(&format!("{}: manufacturer", dt.model), result) else {
            continue;
        };
        let result = nb
            .get_or_create_device_type(manufacturer.id, &dt.model, &slugify(&dt.model))
            .await;
        if let Some(nb_dt) = tally.record(&format!("{}: device type", dt.model), result) {
            device_types.insert(dt.model.clone(), nb_dt.id);
        }
    }

    let mut device_roles = HashMap::new();
    for role in [Some(FabricRole::Spine), Some(FabricRole::Leaf), None] {
        let (slug, color) = role_for(role);
        let result = nb.get_or_create_role(&display_name(slug), slug, color).await;
        if let Some(nb_role) = tally.record(&format!("device role {}", slug), result) {
            device_roles.insert(slug, nb_role.id);
        }
    }

    let mut ipam_roles = HashMap::new();
    for subnet in &inventory.subnets {
        let slug = subnet.purpose.as_str();
        if !ipam_roles.contains_key(slug) {
            let result = nb.get_or_create_ipam_role(&display_name(slug), slug).await;
            if let Some(nb_role) = tally.record(&format!("prefix role {}", slug), result) {
                ipam_roles.insert(slug, nb_role.id);
            }
        }
        let prefix = PrefixCreate {
            prefix: subnet.cidr.to_string(),
            status: "active".to_string(),
            role: ipam_roles.get(slug).copied(),
            site: subnet.site.as_ref().and_then(|s| sites.get(s).copied()),
            description: subnet.description.clone(),
        };
        let result = nb.get_or_create_prefix(&prefix).await;
        tally.record(&format!("prefix {}", subnet.cidr), result);
    }

    let mut devices = HashMap::new();
    for device in &inventory.devices {
        let (Some(&site), Some(&device_type)) = (
            sites.get(&device.site),
            device_types.get(&device.device_type),
        ) else {
            tally
                .errors
                .push(format!("{}: site or device type missing in NetBox", device.name));
            continue;
        };
        let role = device.attrs.role.or_else(|| roles.get(&device.name).copied());
        let (role_slug, _) = role_for(role);
        let Some(&role) = device_roles.get(role_slug) else {
            tally
                .errors
                .push(format!("{}: device role {} missing in NetBox", device.name, role_slug));
            continue;
        };

        let mut custom_fields = HashMap::new();
        if let Some(asn) = device.attrs.asn {
            custom_fields.insert("ASN".to_string(), serde_json::json!(asn));
        }

        match nb.get_device_by_name(&device.name).await {
            Ok(Some(existing)) => {
                if !custom_fields.is_empty() {
                    match nb.update_device_custom_fields(existing.id, &custom_fields).await {
                        Ok(_) => tally.updated += 1,
                        Err(e) => tally.errors.push(format!("{}: update: {}", device.name, e)),
                    }
                }
                devices.insert(device.name.clone(), existing.id);
            }
            Ok(None) => {
                let create = DeviceCreate {
                    name: device.name.clone(),
                    device_type,
                    role,
                    site,
                    status: "active".to_string(),
                    custom_fields: if custom_fields.is_empty() { None } else { Some(custom_fields) },
                };
                match nb.create_device(&create).await {
                    Ok(nb_dev) => {
                        tally.created += 1;
                        devices.insert(device.name.clone(), nb_dev.id);
                    }
                    Err(e) => tally.errors.push(format!("{}: create: {}", device.name, e)),
                }
            }
            Err(e) => tally.errors.push(format!("{}: lookup: {}", device.name, e)),
        }
    }

    let mut interfaces: HashMap<InterfaceId, NbInterface> = HashMap::new();
    for iface in &inventory.interfaces {
        let Some(&device_id) = devices.get(&iface.device) else {
            continue;
        };
        let id = iface.id();
        match nb.get_interface(device_id, &iface.name).await {
            Ok(Some(existing)) => {
                interfaces.insert(id, existing);
            }
            Ok(None) => {
                let kind = interface_type(resolver.classify(&iface.name));
                match nb
                    .create_interface(device_id, &iface.name, kind, iface.description.as_deref())
                    .await
                {
                    Ok(created) => {
                        tally.created += 1;
                        interfaces.insert(id, created);
                    }
                    Err(e) => tally.errors.push(format!("{}: create: {}", id, e)),
                }
            }
            Err(e) => tally.errors.push(format!("{}: lookup: {}", id, e)),
        }
    }

    for address in &inventory.addresses {
        let Some(nb_iface) = interfaces.get(&address.interface) else {
            continue;
        };
        let text = address.address.to_string();
        match nb.get_ip_address(&text).await {
            Ok(Some(_)) => {}
            Ok(None) => match nb.create_ip_address(&text, nb_iface.id).await {
                Ok(_) => tally.created += 1,
                Err(e) => tally.errors.push(format!("{} on {}: {}", text, address.interface, e)),
            },
            Err(e) => tally.errors.push(format!("{}: lookup: {}", text, e)),
        }
    }

    for connection in &inventory.connections {
        let (Some(a), Some(b)) = (interfaces.get(&connection.a), interfaces.get(&connection.b)) else {
            continue;
        };
        if a.cable.is_some() || b.cable.is_some() {
            tracing::debug!("Cable {} <-> {} already present", connection.a, connection.b);
            continue;
        }
        match nb.create_cable(a.id, b.id).await {
            Ok(_) => tally.created += 1,
            Err(e) => tally
                .errors
                .push(format!("cable {} <-> {}: {}", connection.a, connection.b, e)),
        }
    }

    tracing::info!(
        "NetBox push: {} created, {} updated, {} error(s)",
        tally.created,
        tally.updated,
        tally.errors.len()
    );
    Ok(SyncResult {
        message: format!(
            "Pushed {} devices ({} objects created, {} updated)",
            devices.len(),
            tally.created,
            tally.updated
        ),
        result: SyncCounts {
            created: tally.created,
            updated: tally.updated,
            errors: tally.errors,
        },
    })
}
