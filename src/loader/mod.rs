//! Topology loader: declarative document in, normalized inventory out.
//!
//! A load is two phases. Validation reads the store and collects every
//! issue; if any is found nothing is written. The apply phase then runs the
//! upserts one at a time, parents first, so re-running the same document
//! leaves the store unchanged. Loads through one loader are serialized.

mod binding;
mod validate;

pub use binding::{bind_addresses, covering_subnet, BindOutcome};
pub use validate::{validate, AddressPin, LoadPlan, PlannedDevice};

use std::sync::Arc;
use tokio::sync::Mutex;

use crate::db::TopologyStore;
use crate::error::{FabricError, FabricResult};
use crate::fabric::RoleResolver;
use crate::models::*;

/// Applies topology documents to a store
#[derive(Debug, Clone)]
pub struct TopologyLoader {
    resolver: RoleResolver,
    /// Held from validation to the last write; clones share it
    guard: Arc<Mutex<()>>,
}

impl TopologyLoader {
    pub fn new(resolver: RoleResolver) -> Self {
        Self {
            resolver,
            guard: Arc::new(Mutex::new(())),
        }
    }

    pub async fn load(
        &self,
        store: &dyn TopologyStore,
        doc: &TopologyDocument,
    ) -> FabricResult<LoadReport> {
        let _guard = self.guard.lock().await;
        let plan = match validate(doc, store, &self.resolver).await? {
            Ok(plan) => plan,
            Err(report) => {
                tracing::warn!("Topology document rejected with {} issue(s)", report.len());
                for issue in &report.issues {
                    tracing::warn!("  {}", issue);
                }
                return Err(FabricError::Validation(report));
            }
        };
        self.apply(store, &plan).await
    }

    async fn apply(&self, store: &dyn TopologyStore, plan: &LoadPlan) -> FabricResult<LoadReport> {
        let mut report = LoadReport::default();

        for region in &plan.regions {
            store.upsert_region(region).await?;
            report.regions += 1;
        }
        for site in &plan.sites {
            store.upsert_site(&site.name, &site.region).await?;
            report.sites += 1;
        }
        for device_type in &plan.device_types {
            store.upsert_device_type(device_type).await?;
            report.device_types += 1;
        }
        for subnet in &plan.subnets {
            store.upsert_subnet(subnet).await?;
            report.subnets += 1;
        }

        for device in &plan.devices {
            store.upsert_device(&device.upsert).await?;
            report.devices += 1;
            for slot in &device.slots {
                let description = device.descriptions.get(slot).map(String::as_str);
                store
                    .upsert_interface(&device.upsert.name, slot, description)
                    .await?;
                report.interfaces += 1;
            }
        }

        let bound = bind_addresses(store, &self.resolver, &plan.pins).await?;
        report.addresses = bound.bound;
        report.rejected_bindings = bound.rejected;

        for (a, b) in &plan.links {
            store.connect(a, b).await?;
            report.links += 1;
        }

        tracing::info!(
            "Loaded topology: {} regions, {} sites, {} device types, {} subnets, {} devices, {} interfaces, {} addresses ({} rejected), {} links",
            report.regions,
            report.sites,
            report.device_types,
            report.subnets,
            report.devices,
            report.interfaces,
            report.addresses,
            report.rejected_bindings.len(),
            report.links
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryStore, Store};
    use pretty_assertions::assert_eq;

    const FABRIC: &str = r#"
regions: [{ name: Europe }]
sites: [{ name: Paris, region: Europe }]
device_types:
  - model: DCS-7050SX
    manufacturer: Arista
    interfaces: [Loopback0, Management1, Ethernet1, Ethernet2]
subnets:
  - { cidr: 10.0.0.0/24, purpose: loopback }
  - { cidr: 10.0.1.0/24, purpose: p2p }
devices:
  - name: leaf1
    site: Paris
    device_type: DCS-7050SX
    asn: 65001
    interfaces:
      - { name: Loopback0, address: 10.0.0.1/32 }
      - { name: Ethernet1, description: to-spine1, address: 10.0.1.0/31 }
  - name: spine1
    site: Paris
    device_type: DCS-7050SX
    asn: 65000
    role: spine
    interfaces:
      - { name: Loopback0, address: 10.0.0.2/32 }
      - { name: Ethernet1, address: 10.0.1.1/31 }
links:
  - { a: { device: leaf1, interface: Ethernet1 }, b: { device: spine1, interface: Ethernet1 } }
"#;

    fn loader() -> TopologyLoader {
        TopologyLoader::new(RoleResolver::new(&["Management\\d*"]).unwrap())
    }

    #[tokio::test]
    async fn test_load_fabric() {
        let store = MemoryStore::new();
        let doc = TopologyDocument::parse(FABRIC).unwrap();
        let report = loader().load(&store, &doc).await.unwrap();

        assert_eq!(report.devices, 2);
        assert_eq!(report.interfaces, 8);
        assert_eq!(report.addresses, 4);
        assert_eq!(report.links, 1);
        assert!(report.rejected_bindings.is_empty());

        let leaf = store.require_device("leaf1").await.unwrap();
        assert_eq!(leaf.attrs.asn, Some(65001));
        assert_eq!(leaf.attrs.role, None);
        let ifaces = store.get_interfaces("leaf1").await.unwrap();
        assert_eq!(ifaces[2].name, "Ethernet1");
        assert_eq!(ifaces[2].description.as_deref(), Some("to-spine1"));
        let peer = store
            .get_connected_peer(&InterfaceId::new("leaf1", "Ethernet1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(peer.device, "spine1");
    }

    #[tokio::test]
    async fn test_load_twice_is_idempotent() {
        let store = MemoryStore::new();
        let doc = TopologyDocument::parse(FABRIC).unwrap();
        loader().load(&store, &doc).await.unwrap();
        let once = store.snapshot().await.unwrap();
        loader().load(&store, &doc).await.unwrap();
        assert_eq!(store.snapshot().await.unwrap(), once);
    }

    #[tokio::test]
    async fn test_unknown_device_type_aborts_whole_load() {
        let store = MemoryStore::new();
        let doc = TopologyDocument::parse(FABRIC).unwrap();
        loader().load(&store, &doc).await.unwrap();
        let before = store.snapshot().await.unwrap();

        let mut bad = doc.clone();
        bad.devices[0].asn = Some(65010);
        bad.devices.push(DeviceRecord {
            name: "leaf2".to_string(),
            site: "Paris".to_string(),
            device_type: "unknown-model".to_string(),
            asn: Some(65002),
            role: None,
            custom: Default::default(),
            interfaces: vec![InterfaceRecord {
                name: "Ethernet1".to_string(),
                description: None,
                address: None,
            }],
        });

        match loader().load(&store, &bad).await {
            Err(FabricError::Validation(report)) => {
                assert_eq!(report.len(), 1);
                assert_eq!(report.issues[0].record, "devices[2] (leaf2)");
                assert_eq!(report.issues[0].message, "unknown device type 'unknown-model'");
            }
            other => panic!("expected validation error, got {:?}", other.map(|_| ())),
        }
        assert_eq!(store.snapshot().await.unwrap(), before);
    }

    #[tokio::test]
    async fn test_collects_every_issue() {
        let store = MemoryStore::new();
        let doc = TopologyDocument::parse(
            r#"
sites: [{ name: Paris, region: Atlantis }]
device_types:
  - { model: box, interfaces: [Ethernet1] }
subnets:
  - { cidr: 10.0.300.0/24, purpose: underlay }
  - { cidr: 10.0.2.0/24, purpose: transit }
devices:
  - { name: "bad name", site: Paris, device_type: box }
  - name: leaf1
    site: Paris
    device_type: box
    role: core
    interfaces:
      - { name: Ethernet9 }
      - { name: Ethernet1, address: 10.0.1.1 }
links:
  - { a: { device: leaf1, interface: Ethernet1 }, b: { device: leaf1, interface: Ethernet1 } }
"#,
        )
        .unwrap();

        let err = loader().load(&store, &doc).await.unwrap_err();
        let FabricError::Validation(report) = err else {
            panic!("expected validation error");
        };
        let messages: Vec<String> = report.issues.iter().map(|i| i.to_string()).collect();
        assert!(messages.contains(&"sites[0] (Paris): unknown region 'Atlantis'".to_string()));
        assert!(messages.contains(&"subnets[0] (10.0.300.0/24): malformed CIDR '10.0.300.0/24'".to_string()));
        assert!(messages.contains(&"subnets[1] (10.0.2.0/24): unknown subnet purpose 'transit'".to_string()));
        assert!(messages.contains(&"devices[0] (bad name): invalid device name 'bad name'".to_string()));
        assert!(messages
            .iter()
            .any(|m| m.starts_with("devices[1] (leaf1): unknown fabric role 'core'")));
        assert!(messages.contains(
            &"devices[1] (leaf1): interface 'Ethernet9' is not a slot of device type 'box'".to_string()
        ));
        assert!(messages
            .iter()
            .any(|m| m.starts_with("devices[1] (leaf1): malformed address '10.0.1.1'")));
        assert!(messages
            .iter()
            .any(|m| m.ends_with("both ends on the same device")));
        assert_eq!(store.snapshot().await.unwrap(), Inventory::default());
    }

    #[tokio::test]
    async fn test_changed_asn_updates_in_place() {
        let store = MemoryStore::new();
        let mut doc = TopologyDocument::parse(FABRIC).unwrap();
        loader().load(&store, &doc).await.unwrap();

        doc.devices[0].asn = Some(65002);
        loader().load(&store, &doc).await.unwrap();

        let devices = store.list_devices().await.unwrap();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].name, "leaf1");
        assert_eq!(devices[0].attrs.asn, Some(65002));
    }

    #[tokio::test]
    async fn test_out_of_subnet_binding_is_rejected_alone() {
        let store = MemoryStore::new();
        let mut doc = TopologyDocument::parse(FABRIC).unwrap();
        doc.devices[0].interfaces[1].address = Some("192.168.9.0/31".to_string());

        let report = loader().load(&store, &doc).await.unwrap();
        assert_eq!(report.addresses, 3);
        assert_eq!(report.rejected_bindings.len(), 1);
        assert_eq!(report.rejected_bindings[0].interface, "Ethernet1");
        assert!(store
            .get_address(&InterfaceId::new("leaf1", "Ethernet1"))
            .await
            .unwrap()
            .is_none());
        assert!(store
            .get_address(&InterfaceId::new("leaf1", "Loopback0"))
            .await
            .unwrap()
            .is_some());
        assert_eq!(store.list_devices().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_device_type_needs_one_loopback() {
        let store = MemoryStore::new();
        let mut doc = TopologyDocument::parse(FABRIC).unwrap();
        doc.device_types[0].interfaces.push("Loopback1".to_string());

        let err = loader().load(&store, &doc).await.unwrap_err();
        let FabricError::Validation(report) = err else {
            panic!("expected validation error");
        };
        assert_eq!(report.len(), 1);
        assert_eq!(report.issues[0].record, "device_types[0] (DCS-7050SX)");
        assert_eq!(
            report.issues[0].message,
            "device type 'DCS-7050SX' must have exactly one loopback slot (found 2)"
        );

        doc.device_types[0].interfaces.retain(|slot| !slot.starts_with("Loopback"));
        let err = loader().load(&store, &doc).await.unwrap_err();
        assert!(err
            .to_string()
            .contains("must have exactly one loopback slot (found 0)"));
        assert_eq!(store.snapshot().await.unwrap(), Inventory::default());
    }

    #[tokio::test]
    async fn test_concurrent_loads_do_not_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fabric.db");
        let store = Store::new(path.to_str().unwrap()).await.unwrap();

        // Both documents cable leaf1:Ethernet1, to spine1 and to spine2
        let first = TopologyDocument::parse(FABRIC).unwrap();
        let mut second = first.clone();
        second.devices[1].name = "spine2".to_string();
        second.devices[1].interfaces[0].address = Some("10.0.0.3/32".to_string());
        second.devices[1].interfaces[1].address = Some("10.0.1.3/31".to_string());
        second.devices[0].interfaces[1].address = Some("10.0.1.2/31".to_string());
        second.links[0].b.device = "spine2".to_string();

        let loader = loader();
        let (r1, r2) = tokio::join!(loader.load(&store, &first), loader.load(&store, &second));
        assert!(r1.is_ok() != r2.is_ok(), "exactly one load must win");

        let (loser, winner) = if r1.is_ok() { (r2, "spine1") } else { (r1, "spine2") };
        let Err(FabricError::Validation(report)) = loser else {
            panic!("expected validation error");
        };
        assert_eq!(report.len(), 1);
        assert!(report.issues[0].message.starts_with("leaf1:Ethernet1 is already connected"));

        let names: Vec<String> = store
            .list_devices()
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["leaf1".to_string(), winner.to_string()]);
    }

    #[tokio::test]
    async fn test_link_to_already_cabled_interface() {
        let store = MemoryStore::new();
        let doc = TopologyDocument::parse(FABRIC).unwrap();
        loader().load(&store, &doc).await.unwrap();

        let mut recable = doc.clone();
        recable.links[0].b.interface = "Ethernet2".to_string();
        let err = loader().load(&store, &recable).await.unwrap_err();
        let FabricError::Validation(report) = err else {
            panic!("expected validation error");
        };
        assert_eq!(report.len(), 1);
        assert_eq!(
            report.issues[0].message,
            "leaf1:Ethernet1 is already connected to spine1:Ethernet1"
        );
    }
}
