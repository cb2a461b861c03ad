use regex_lite::Regex;
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{FabricError, FabricResult};
use crate::models::*;

use super::graph::FabricGraph;

/// Function of an interface as far as the fabric is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceClass {
    /// Router-id source, never a peering interface
    Loopback,
    /// Management / out-of-band, never part of the fabric
    Excluded,
    /// Everything else; fabric-facing when cabled to another device
    Physical,
}

impl InterfaceClass {
    /// Subnet purpose an address on this class of interface must come from
    pub fn purpose(&self) -> SubnetPurpose {
        match self {
            InterfaceClass::Loopback => SubnetPurpose::Loopback,
            InterfaceClass::Excluded => SubnetPurpose::Management,
            InterfaceClass::Physical => SubnetPurpose::Underlay,
        }
    }
}

/// One fabric-facing interface: local end, far end and the far device
#[derive(Debug, Clone)]
pub struct FabricLink<'a> {
    pub local: &'a Interface,
    pub remote: &'a Interface,
    pub remote_device: &'a Device,
}

enum Outcome {
    Resolved(FabricRole),
    Ambiguous(String),
}

/// Roles of every device in one graph, hinted or inferred
pub struct RoleAssignment {
    outcomes: BTreeMap<String, Outcome>,
}

impl RoleAssignment {
    pub fn role(&self, device: &str) -> FabricResult<FabricRole> {
        match self.outcomes.get(device) {
            Some(Outcome::Resolved(role)) => Ok(*role),
            Some(Outcome::Ambiguous(reason)) => Err(FabricError::RoleAmbiguous {
                device: device.to_string(),
                reason: reason.clone(),
            }),
            None => Err(FabricError::not_found("device", device)),
        }
    }

    /// Resolved roles only, in device name order
    pub fn resolved(&self) -> BTreeMap<String, FabricRole> {
        self.outcomes
            .iter()
            .filter_map(|(name, outcome)| match outcome {
                Outcome::Resolved(role) => Some((name.clone(), *role)),
                Outcome::Ambiguous(_) => None,
            })
            .collect()
    }
}

/// Classifies interfaces and derives spine/leaf roles from connection shape
#[derive(Debug, Clone)]
pub struct RoleResolver {
    excluded: Vec<Regex>,
}

impl RoleResolver {
    /// Build from exclusion patterns; each pattern must match the whole name
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> anyhow::Result<Self> {
        let mut excluded = Vec::with_capacity(patterns.len());
        for pattern in patterns {
            let pattern = pattern.as_ref().trim();
            if pattern.is_empty() {
                continue;
            }
            let re = Regex::new(&format!("^(?:{})$", pattern))
                .map_err(|e| anyhow::anyhow!("Invalid interface exclusion '{}': {}", pattern, e))?;
            excluded.push(re);
        }
        Ok(Self { excluded })
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.excluded.iter().any(|re| re.is_match(name))
    }

    pub fn classify(&self, name: &str) -> InterfaceClass {
        if self.is_excluded(name) {
            InterfaceClass::Excluded
        } else if is_loopback(name) {
            InterfaceClass::Loopback
        } else {
            InterfaceClass::Physical
        }
    }

    /// Fabric-facing interfaces of `device` in enumeration order.
    /// A link is dropped when either end is excluded or not physical.
    pub fn fabric_links<'g>(&self, graph: &'g FabricGraph, device: &str) -> Vec<FabricLink<'g>> {
        let mut links = Vec::new();
        for local in graph.interfaces(device) {
            if self.classify(&local.name) != InterfaceClass::Physical {
                continue;
            }
            let Some(peer_id) = graph.peer(&local.id()) else {
                continue;
            };
            if peer_id.device == device || self.classify(&peer_id.name) != InterfaceClass::Physical {
                continue;
            }
            let (Some(remote), Some(remote_device)) =
                (graph.interface(peer_id), graph.device(&peer_id.device))
            else {
                continue;
            };
            links.push(FabricLink {
                local,
                remote,
                remote_device,
            });
        }
        links
    }

    /// Assign a role to every device in the graph.
    ///
    /// Explicit role hints always win. The rest is inferred on the device
    /// adjacency of fabric links, iterating to a fixpoint in name order:
    /// a device takes the opposite role of its resolved neighbours, or if
    /// none is resolved yet, LEAF when it has the leaf shape (stub
    /// neighbours below, pure spines above) and SPINE when all of its
    /// neighbours have the leaf shape. Anything else is ambiguous.
    pub fn infer_roles(&self, graph: &FabricGraph) -> RoleAssignment {
        let mut adjacency: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for device in graph.devices() {
            let neighbours = self
                .fabric_links(graph, &device.name)
                .into_iter()
                .map(|link| link.remote_device.name.as_str())
                .collect();
            adjacency.insert(device.name.as_str(), neighbours);
        }

        let empty = BTreeSet::new();
        let neighbours = |d: &str| adjacency.get(d).unwrap_or(&empty);
        let is_stub = |d: &str| neighbours(d).len() == 1;
        let leaf_shape = |d: &str| {
            let n = neighbours(d);
            !is_stub(d)
                && n.iter().any(|x| is_stub(*x))
                && n.iter().any(|x| !is_stub(*x))
                && n.iter()
                    .filter(|x| !is_stub(**x))
                    .all(|x| !neighbours(*x).iter().any(|y| is_stub(*y)))
        };

        let mut roles: BTreeMap<&str, FabricRole> = graph
            .devices()
            .filter_map(|d| d.attrs.role.map(|role| (d.name.as_str(), role)))
            .collect();

        loop {
            let mut changed = false;
            for device in graph.devices() {
                let name = device.name.as_str();
                if roles.contains_key(name) || neighbours(name).is_empty() {
                    continue;
                }
                let resolved: BTreeSet<FabricRole> = neighbours(name)
                    .iter()
                    .filter_map(|n| roles.get(n).copied())
                    .collect();
                let role = if resolved.len() > 1 {
                    None
                } else if resolved.contains(&FabricRole::Spine) {
                    Some(FabricRole::Leaf)
                } else if resolved.contains(&FabricRole::Leaf) {
                    (!is_stub(name)).then_some(FabricRole::Spine)
                } else if leaf_shape(name) {
                    Some(FabricRole::Leaf)
                } else if neighbours(name).len() >= 2
                    && neighbours(name).iter().all(|n| leaf_shape(*n))
                {
                    Some(FabricRole::Spine)
                } else {
                    None
                };
                if let Some(role) = role {
                    tracing::debug!("Inferred {} role for {}", role, name);
                    roles.insert(name, role);
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        let mut outcomes = BTreeMap::new();
        for device in graph.devices() {
            let name = device.name.as_str();
            let outcome = match roles.get(name) {
                Some(role) => Outcome::Resolved(*role),
                None => {
                    let reason = ambiguity_reason(neighbours(name), &roles);
                    tracing::warn!("Cannot infer role for {}: {}", name, reason);
                    Outcome::Ambiguous(reason)
                }
            };
            outcomes.insert(device.name.clone(), outcome);
        }
        RoleAssignment { outcomes }
    }
}

fn ambiguity_reason(neighbours: &BTreeSet<&str>, roles: &BTreeMap<&str, FabricRole>) -> String {
    if neighbours.is_empty() {
        return "no fabric links and no role hint".to_string();
    }
    let resolved: BTreeSet<FabricRole> = neighbours
        .iter()
        .filter_map(|n| roles.get(n).copied())
        .collect();
    if resolved.len() > 1 {
        "connected to both spines and leaves".to_string()
    } else {
        format!(
            "connection shape matches neither spine nor leaf ({} neighbour(s))",
            neighbours.len()
        )
    }
}

fn is_loopback(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.starts_with("loopback")
        || (lower.starts_with("lo")
            && lower.len() > 2
            && lower[2..].chars().all(|c| c.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{MemoryStore, TopologyStore};
    use pretty_assertions::assert_eq;

    fn resolver() -> RoleResolver {
        RoleResolver::new(&["Management\\d*", "mgmt\\d*", "eth0"]).unwrap()
    }

    async fn add_device(store: &MemoryStore, name: &str, role: Option<FabricRole>, ports: usize) {
        store
            .upsert_device(&UpsertDevice {
                name: name.to_string(),
                site: "Paris".to_string(),
                device_type: "generic".to_string(),
                attrs: DeviceAttrs {
                    asn: Some(65000),
                    role,
                    ..Default::default()
                },
            })
            .await
            .unwrap();
        store.upsert_interface(name, "Loopback0", None).await.unwrap();
        store.upsert_interface(name, "Management1", None).await.unwrap();
        for port in 1..=ports {
            store
                .upsert_interface(name, &format!("Ethernet{}", port), None)
                .await
                .unwrap();
        }
    }

    async fn cable(store: &MemoryStore, a: (&str, &str), b: (&str, &str)) {
        store
            .connect(&InterfaceId::new(a.0, a.1), &InterfaceId::new(b.0, b.1))
            .await
            .unwrap();
    }

    /// spine1..2 full-meshed to leaf1..2, each leaf with two hosts
    async fn two_tier_with_hosts() -> MemoryStore {
        let store = MemoryStore::new();
        for spine in ["spine1", "spine2"] {
            add_device(&store, spine, None, 2).await;
        }
        for leaf in ["leaf1", "leaf2"] {
            add_device(&store, leaf, None, 4).await;
        }
        for host in ["host1", "host2", "host3", "host4"] {
            add_device(&store, host, None, 1).await;
        }
        cable(&store, ("leaf1", "Ethernet1"), ("spine1", "Ethernet1")).await;
        cable(&store, ("leaf1", "Ethernet2"), ("spine2", "Ethernet1")).await;
        cable(&store, ("leaf2", "Ethernet1"), ("spine1", "Ethernet2")).await;
        cable(&store, ("leaf2", "Ethernet2"), ("spine2", "Ethernet2")).await;
        cable(&store, ("leaf1", "Ethernet3"), ("host1", "Ethernet1")).await;
        cable(&store, ("leaf1", "Ethernet4"), ("host2", "Ethernet1")).await;
        cable(&store, ("leaf2", "Ethernet3"), ("host3", "Ethernet1")).await;
        cable(&store, ("leaf2", "Ethernet4"), ("host4", "Ethernet1")).await;
        store
    }

    #[test]
    fn test_classify() {
        let r = resolver();
        assert_eq!(r.classify("Loopback0"), InterfaceClass::Loopback);
        assert_eq!(r.classify("lo1"), InterfaceClass::Loopback);
        assert_eq!(r.classify("Management1"), InterfaceClass::Excluded);
        assert_eq!(r.classify("eth0"), InterfaceClass::Excluded);
        assert_eq!(r.classify("eth01"), InterfaceClass::Physical);
        assert_eq!(r.classify("Ethernet1"), InterfaceClass::Physical);
        assert_eq!(r.classify("local0"), InterfaceClass::Physical);
        assert_eq!(InterfaceClass::Physical.purpose(), SubnetPurpose::Underlay);
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        assert!(RoleResolver::new(&["Ethernet("]).is_err());
    }

    #[tokio::test]
    async fn test_fabric_links_skip_excluded_interfaces() {
        let store = MemoryStore::new();
        add_device(&store, "leaf1", Some(FabricRole::Leaf), 2).await;
        add_device(&store, "spine1", Some(FabricRole::Spine), 2).await;
        cable(&store, ("leaf1", "Ethernet2"), ("spine1", "Ethernet1")).await;
        cable(&store, ("leaf1", "Management1"), ("spine1", "Ethernet2")).await;
        cable(&store, ("leaf1", "Ethernet1"), ("spine1", "Management1")).await;

        let graph = FabricGraph::build(&store).await.unwrap();
        let links = resolver().fabric_links(&graph, "leaf1");
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].local.name, "Ethernet2");
        assert_eq!(links[0].remote.name, "Ethernet1");
        assert_eq!(links[0].remote_device.name, "spine1");
    }

    #[tokio::test]
    async fn test_infer_two_tier_with_hosts() {
        let store = two_tier_with_hosts().await;
        let graph = FabricGraph::build(&store).await.unwrap();
        let roles = resolver().infer_roles(&graph);

        assert_eq!(roles.role("spine1").unwrap(), FabricRole::Spine);
        assert_eq!(roles.role("spine2").unwrap(), FabricRole::Spine);
        assert_eq!(roles.role("leaf1").unwrap(), FabricRole::Leaf);
        assert_eq!(roles.role("leaf2").unwrap(), FabricRole::Leaf);
        assert_eq!(roles.role("host1").unwrap_err().kind(), "role_ambiguous");
    }

    #[tokio::test]
    async fn test_hint_propagates_to_neighbours() {
        // full mesh without hosts has no shape to go on
        let store = MemoryStore::new();
        add_device(&store, "spine1", Some(FabricRole::Spine), 2).await;
        add_device(&store, "spine2", None, 2).await;
        add_device(&store, "leaf1", None, 2).await;
        add_device(&store, "leaf2", None, 2).await;
        cable(&store, ("leaf1", "Ethernet1"), ("spine1", "Ethernet1")).await;
        cable(&store, ("leaf1", "Ethernet2"), ("spine2", "Ethernet1")).await;
        cable(&store, ("leaf2", "Ethernet1"), ("spine1", "Ethernet2")).await;
        cable(&store, ("leaf2", "Ethernet2"), ("spine2", "Ethernet2")).await;

        let graph = FabricGraph::build(&store).await.unwrap();
        let roles = resolver().infer_roles(&graph);
        assert_eq!(
            roles.resolved(),
            BTreeMap::from([
                ("leaf1".to_string(), FabricRole::Leaf),
                ("leaf2".to_string(), FabricRole::Leaf),
                ("spine1".to_string(), FabricRole::Spine),
                ("spine2".to_string(), FabricRole::Spine),
            ])
        );
    }

    #[tokio::test]
    async fn test_unhinted_mesh_is_ambiguous() {
        let store = MemoryStore::new();
        add_device(&store, "a", None, 2).await;
        add_device(&store, "b", None, 2).await;
        add_device(&store, "c", None, 2).await;
        cable(&store, ("a", "Ethernet1"), ("b", "Ethernet1")).await;
        cable(&store, ("b", "Ethernet2"), ("c", "Ethernet1")).await;
        cable(&store, ("c", "Ethernet2"), ("a", "Ethernet2")).await;
        add_device(&store, "island", None, 1).await;

        let graph = FabricGraph::build(&store).await.unwrap();
        let roles = resolver().infer_roles(&graph);
        assert!(roles.resolved().is_empty());
        let err = roles.role("island").unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot infer fabric role for island: no fabric links and no role hint"
        );
        assert_eq!(roles.role("ghost").unwrap_err().kind(), "not_found");
    }

    #[tokio::test]
    async fn test_explicit_role_overrides_shape() {
        let store = two_tier_with_hosts().await;
        store
            .upsert_device(&UpsertDevice {
                name: "leaf1".to_string(),
                site: "Paris".to_string(),
                device_type: "generic".to_string(),
                attrs: DeviceAttrs {
                    role: Some(FabricRole::Spine),
                    ..Default::default()
                },
            })
            .await
            .unwrap();
        let graph = FabricGraph::build(&store).await.unwrap();
        let roles = resolver().infer_roles(&graph);
        assert_eq!(roles.role("leaf1").unwrap(), FabricRole::Spine);
    }
}
