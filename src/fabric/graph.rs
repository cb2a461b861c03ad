use anyhow::Result;
use std::collections::{BTreeMap, HashMap};

use crate::db::TopologyStore;
use crate::models::*;

/// Adjacency index of the fabric, materialized once per batch from the store.
///
/// Interfaces keep the store's enumeration order; peers are keyed by
/// interface identity in both directions.
#[derive(Debug, Default)]
pub struct FabricGraph {
    devices: BTreeMap<String, Device>,
    interfaces: BTreeMap<String, Vec<Interface>>,
    peers: HashMap<InterfaceId, InterfaceId>,
}

impl FabricGraph {
    pub async fn build(store: &dyn TopologyStore) -> Result<Self> {
        let mut graph = FabricGraph::default();
        for device in store.list_devices().await? {
            let interfaces = store.get_interfaces(&device.name).await?;
            for iface in &interfaces {
                let id = iface.id();
                if graph.peers.contains_key(&id) {
                    continue;
                }
                if let Some(peer) = store.get_connected_peer(&id).await? {
                    graph.peers.insert(peer.id(), id.clone());
                    graph.peers.insert(id, peer.id());
                }
            }
            graph.interfaces.insert(device.name.clone(), interfaces);
            graph.devices.insert(device.name.clone(), device);
        }
        tracing::debug!(
            "Materialized fabric graph: {} devices, {} links",
            graph.devices.len(),
            graph.peers.len() / 2
        );
        Ok(graph)
    }

    pub fn device(&self, name: &str) -> Option<&Device> {
        self.devices.get(name)
    }

    /// Devices in name order
    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    pub fn interfaces(&self, device: &str) -> &[Interface] {
        self.interfaces
            .get(device)
            .map(|list| list.as_slice())
            .unwrap_or(&[])
    }

    pub fn interface(&self, id: &InterfaceId) -> Option<&Interface> {
        self.interfaces(&id.device).iter().find(|i| i.name == id.name)
    }

    pub fn peer(&self, id: &InterfaceId) -> Option<&InterfaceId> {
        self.peers.get(id)
    }
}
