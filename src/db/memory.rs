use anyhow::Result;
use async_trait::async_trait;
use ipnet::IpNet;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use crate::error::FabricError;
use crate::models::*;

use super::TopologyStore;

#[derive(Default)]
struct Inner {
    regions: BTreeMap<String, Region>,
    sites: BTreeMap<String, Site>,
    device_types: BTreeMap<String, DeviceType>,
    subnets: BTreeMap<IpNet, Subnet>,
    devices: BTreeMap<String, Device>,
    /// device name -> interfaces in enumeration order
    interfaces: BTreeMap<String, Vec<Interface>>,
    addresses: BTreeMap<InterfaceId, IpNet>,
    /// both directions of every connection
    peers: BTreeMap<InterfaceId, InterfaceId>,
}

impl Inner {
    fn interface(&self, id: &InterfaceId) -> Option<&Interface> {
        self.interfaces
            .get(&id.device)
            .and_then(|list| list.iter().find(|i| i.name == id.name))
    }

    fn require_interface(&self, id: &InterfaceId) -> Result<&Interface> {
        self.interface(id)
            .ok_or_else(|| FabricError::not_found("interface", id.to_string()).into())
    }
}

/// In-process topology store, used by tests and the `compile` command
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TopologyStore for MemoryStore {
    async fn upsert_region(&self, name: &str) -> Result<Region> {
        let mut inner = self.inner.write().await;
        let region = inner
            .regions
            .entry(name.to_string())
            .or_insert_with(|| Region {
                name: name.to_string(),
            });
        Ok(region.clone())
    }

    async fn upsert_site(&self, name: &str, region: &str) -> Result<Site> {
        let mut inner = self.inner.write().await;
        let site = Site {
            name: name.to_string(),
            region: region.to_string(),
        };
        inner.sites.insert(name.to_string(), site.clone());
        Ok(site)
    }

    async fn upsert_device_type(&self, device_type: &DeviceType) -> Result<DeviceType> {
        let mut inner = self.inner.write().await;
        let merged = match inner.device_types.remove(&device_type.model) {
            Some(mut existing) => {
                if device_type.manufacturer.is_some() {
                    existing.manufacturer = device_type.manufacturer.clone();
                }
                if !device_type.interfaces.is_empty() {
                    existing.interfaces = device_type.interfaces.clone();
                }
                existing
            }
            None => device_type.clone(),
        };
        inner
            .device_types
            .insert(merged.model.clone(), merged.clone());
        Ok(merged)
    }

    async fn upsert_subnet(&self, subnet: &Subnet) -> Result<Subnet> {
        let mut inner = self.inner.write().await;
        let merged = match inner.subnets.remove(&subnet.cidr) {
            Some(mut existing) => {
                existing.purpose = subnet.purpose;
                if subnet.site.is_some() {
                    existing.site = subnet.site.clone();
                }
                if subnet.description.is_some() {
                    existing.description = subnet.description.clone();
                }
                existing
            }
            None => subnet.clone(),
        };
        inner.subnets.insert(merged.cidr, merged.clone());
        Ok(merged)
    }

    async fn upsert_device(&self, req: &UpsertDevice) -> Result<Device> {
        let mut inner = self.inner.write().await;
        let existing = inner.devices.remove(&req.name);
        let device = req.merge_into(existing);
        inner.devices.insert(device.name.clone(), device.clone());
        Ok(device)
    }

    async fn upsert_interface(
        &self,
        device: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<Interface> {
        let mut inner = self.inner.write().await;
        let list = inner.interfaces.entry(device.to_string()).or_default();
        if let Some(existing) = list.iter_mut().find(|i| i.name == name) {
            if let Some(desc) = description {
                existing.description = Some(desc.to_string());
            }
            return Ok(existing.clone());
        }
        let position = list.iter().map(|i| i.position + 1).max().unwrap_or(0);
        let interface = Interface {
            device: device.to_string(),
            name: name.to_string(),
            description: description.map(str::to_string),
            position,
        };
        list.push(interface.clone());
        Ok(interface)
    }

    async fn assign_address(&self, interface: &InterfaceId, address: IpNet) -> Result<IpAddress> {
        let mut inner = self.inner.write().await;
        inner.require_interface(interface)?;
        // an address is held by at most one interface
        inner
            .addresses
            .retain(|holder, bound| holder == interface || *bound != address);
        inner.addresses.insert(interface.clone(), address);
        Ok(IpAddress {
            address,
            interface: interface.clone(),
        })
    }

    async fn connect(&self, a: &InterfaceId, b: &InterfaceId) -> Result<Connection> {
        let mut inner = self.inner.write().await;
        let connection = Connection::new(a.clone(), b.clone());
        if connection.is_self_loop() {
            return Err(FabricError::Conflict(format!(
                "cannot connect {} to {}: both ends on the same device",
                a, b
            ))
            .into());
        }
        inner.require_interface(a)?;
        inner.require_interface(b)?;
        for (end, other) in [(a, b), (b, a)] {
            match inner.peers.get(end) {
                Some(peer) if peer == other => return Ok(connection),
                Some(peer) => {
                    return Err(FabricError::Conflict(format!(
                        "{} is already connected to {}",
                        end, peer
                    ))
                    .into())
                }
                None => {}
            }
        }
        inner.peers.insert(a.clone(), b.clone());
        inner.peers.insert(b.clone(), a.clone());
        Ok(connection)
    }

    async fn get_region(&self, name: &str) -> Result<Option<Region>> {
        Ok(self.inner.read().await.regions.get(name).cloned())
    }

    async fn get_site(&self, name: &str) -> Result<Option<Site>> {
        Ok(self.inner.read().await.sites.get(name).cloned())
    }

    async fn get_device_type(&self, model: &str) -> Result<Option<DeviceType>> {
        Ok(self.inner.read().await.device_types.get(model).cloned())
    }

    async fn get_device(&self, name: &str) -> Result<Option<Device>> {
        Ok(self.inner.read().await.devices.get(name).cloned())
    }

    async fn list_devices(&self) -> Result<Vec<Device>> {
        Ok(self.inner.read().await.devices.values().cloned().collect())
    }

    async fn list_subnets(&self) -> Result<Vec<Subnet>> {
        Ok(self.inner.read().await.subnets.values().cloned().collect())
    }

    async fn get_interfaces(&self, device: &str) -> Result<Vec<Interface>> {
        Ok(self
            .inner
            .read()
            .await
            .interfaces
            .get(device)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_interface(&self, id: &InterfaceId) -> Result<Option<Interface>> {
        Ok(self.inner.read().await.interface(id).cloned())
    }

    async fn get_connected_peer(&self, interface: &InterfaceId) -> Result<Option<Interface>> {
        let inner = self.inner.read().await;
        Ok(inner
            .peers
            .get(interface)
            .and_then(|peer| inner.interface(peer))
            .cloned())
    }

    async fn get_address(&self, interface: &InterfaceId) -> Result<Option<IpAddress>> {
        Ok(self
            .inner
            .read()
            .await
            .addresses
            .get(interface)
            .map(|address| IpAddress {
                address: *address,
                interface: interface.clone(),
            }))
    }

    async fn snapshot(&self) -> Result<Inventory> {
        let inner = self.inner.read().await;
        let mut interfaces: Vec<Interface> =
            inner.interfaces.values().flatten().cloned().collect();
        interfaces.sort_by(|x, y| (&x.device, &x.name).cmp(&(&y.device, &y.name)));
        let connections: Vec<Connection> = inner
            .peers
            .iter()
            .filter(|(end, peer)| end < peer)
            .map(|(end, peer)| Connection::new(end.clone(), peer.clone()))
            .collect();
        Ok(Inventory {
            regions: inner.regions.values().cloned().collect(),
            sites: inner.sites.values().cloned().collect(),
            device_types: inner.device_types.values().cloned().collect(),
            subnets: inner.subnets.values().cloned().collect(),
            devices: inner.devices.values().cloned().collect(),
            interfaces,
            addresses: inner
                .addresses
                .iter()
                .map(|(interface, address)| IpAddress {
                    address: *address,
                    interface: interface.clone(),
                })
                .collect(),
            connections,
        })
    }
}
