//! Per-device configuration renderer and the batch compiler on top of it.

mod batch;
mod templates;

pub use batch::Compiler;
pub use templates::{load_templates, send_community_line, TEMPLATE_NAME, UNDERLAY_TEMPLATE};

use serde::Serialize;
use tera::{Context, Tera};

use crate::config::{BgpPolicy, Config};
use crate::db::TopologyStore;
use crate::error::{FabricError, FabricResult};
use crate::fabric::{FabricGraph, FabricLink, InterfaceClass, RoleAssignment, RoleResolver};
use crate::models::*;

/// Peer group of a device whose role is neither stated nor inferable
pub const FABRIC_PEER_GROUP: &str = "FABRIC";

#[derive(Debug, Serialize)]
struct InterfaceView {
    name: String,
    description: Option<String>,
    routed: bool,
    address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
struct NeighborView {
    address: String,
    remote_as: u32,
    description: String,
}

#[derive(Debug, Serialize)]
struct PolicyView {
    maximum_paths: u32,
    ebgp_multihop: u32,
    send_community: Option<String>,
    maximum_routes: u32,
}

/// Renders one device's interface and underlay BGP configuration
pub struct ConfigRenderer {
    tera: Tera,
    resolver: RoleResolver,
    mtu: u32,
    policy: BgpPolicy,
}

impl ConfigRenderer {
    pub fn new(tera: Tera, resolver: RoleResolver, mtu: u32, policy: BgpPolicy) -> Self {
        Self {
            tera,
            resolver,
            mtu,
            policy,
        }
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self::new(
            load_templates(config.template_path.as_deref())?,
            RoleResolver::new(&config.excluded_interfaces)?,
            config.mtu,
            config.bgp.clone(),
        ))
    }

    pub fn resolver(&self) -> &RoleResolver {
        &self.resolver
    }

    /// Render `name` against a graph materialized for this batch.
    ///
    /// Device attributes, addresses and remote ASNs are read live from the
    /// store. A missing router-id or ASN fails this device only. A device
    /// with no stated or inferable role peers in the `FABRIC` group;
    /// neighbors whose remote address or ASN is unknown are left out.
    pub async fn render(
        &self,
        store: &dyn TopologyStore,
        graph: &FabricGraph,
        roles: &RoleAssignment,
        name: &str,
    ) -> FabricResult<String> {
        let device = store.require_device(name).await?;
        let peer_group = match device.attrs.role {
            Some(role) => role.peer_group(),
            None => match roles.role(name) {
                Ok(role) => role.peer_group(),
                Err(FabricError::RoleAmbiguous { reason, .. }) => {
                    tracing::warn!(
                        "{}: no fabric role ({}), using peer group {}",
                        name,
                        reason,
                        FABRIC_PEER_GROUP
                    );
                    FABRIC_PEER_GROUP
                }
                Err(e) => return Err(e),
            },
        };

        let mut interfaces = Vec::new();
        let mut router_id = None;
        for iface in store.get_interfaces(name).await? {
            let class = self.resolver.classify(&iface.name);
            let address = store.get_address(&iface.id()).await?;
            if class == InterfaceClass::Loopback && router_id.is_none() {
                router_id = address.as_ref().map(|a| a.host());
            }
            interfaces.push(InterfaceView {
                name: iface.name,
                description: iface.description,
                routed: class == InterfaceClass::Physical,
                address: address.map(|a| a.address.to_string()),
            });
        }
        let router_id = router_id.ok_or_else(|| FabricError::MissingRouterId {
            device: name.to_string(),
        })?;
        let asn = device.attrs.asn.ok_or_else(|| FabricError::MissingAsn {
            device: name.to_string(),
        })?;

        let links = self.resolver.fabric_links(graph, name);
        let neighbors = self.neighbor_pass(store, name, &links).await?;
        let activations = self.activation_pass(store, &links, &neighbors).await?;

        let mut context = Context::new();
        context.insert("hostname", &device.name);
        context.insert("interfaces", &interfaces);
        context.insert("mtu", &self.mtu);
        context.insert("asn", &asn);
        context.insert("router_id", &router_id);
        context.insert("peer_group", peer_group);
        context.insert(
            "policy",
            &PolicyView {
                maximum_paths: self.policy.maximum_paths,
                ebgp_multihop: self.policy.ebgp_multihop,
                send_community: send_community_line(&self.policy.send_community),
                maximum_routes: self.policy.maximum_routes,
            },
        );
        context.insert("neighbors", &neighbors);
        context.insert("activations", &activations);

        Ok(self.tera.render(TEMPLATE_NAME, &context)?)
    }

    /// One neighbor per fabric link, in link order
    async fn neighbor_pass(
        &self,
        store: &dyn TopologyStore,
        name: &str,
        links: &[FabricLink<'_>],
    ) -> FabricResult<Vec<NeighborView>> {
        let mut neighbors = Vec::with_capacity(links.len());
        for link in links {
            let Some(address) = store.get_address(&link.remote.id()).await? else {
                tracing::warn!(
                    "{}: no address on {}, skipping neighbor",
                    name,
                    link.remote.id()
                );
                continue;
            };
            let remote_as = store
                .get_device(&link.remote_device.name)
                .await?
                .and_then(|d| d.attrs.asn);
            let Some(remote_as) = remote_as else {
                tracing::warn!(
                    "{}: {} has no ASN, skipping neighbor {}",
                    name,
                    link.remote_device.name,
                    address.host()
                );
                continue;
            };
            neighbors.push(NeighborView {
                address: address.host(),
                remote_as,
                description: link.remote_device.name.clone(),
            });
        }
        Ok(neighbors)
    }

    /// Walks the same links again and activates every declared neighbor
    /// in the ipv4 address family
    async fn activation_pass(
        &self,
        store: &dyn TopologyStore,
        links: &[FabricLink<'_>],
        declared: &[NeighborView],
    ) -> FabricResult<Vec<String>> {
        let mut activations = Vec::with_capacity(declared.len());
        for link in links {
            if let Some(address) = store.get_address(&link.remote.id()).await? {
                let host = address.host();
                if declared.iter().any(|n| n.address == host) {
                    activations.push(host);
                }
            }
        }
        Ok(activations)
    }
}
