mod connections;
mod device_types;
mod devices;
mod interfaces;
mod ipam;
mod locations;
mod memory;
pub(crate) mod row_helpers;

pub use memory::MemoryStore;

use anyhow::{Context, Result};
use async_trait::async_trait;
use ipnet::IpNet;
use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite};

use crate::error::FabricError;
use crate::models::*;

use connections::ConnectionRepo;
use device_types::DeviceTypeRepo;
use devices::DeviceRepo;
use interfaces::InterfaceRepo;
use ipam::{AddressRepo, SubnetRepo};
use locations::{RegionRepo, SiteRepo};

/// Read/write contract of the topology inventory.
///
/// Upserts are keyed by natural identity and never fail on not-found: they
/// create or merge, and a `None` field never clears a stored value. Parent
/// references are not checked here, the loader validates them up front.
/// Implementations must not be driven concurrently for the same key.
#[async_trait]
pub trait TopologyStore: Send + Sync {
    async fn upsert_region(&self, name: &str) -> Result<Region>;
    async fn upsert_site(&self, name: &str, region: &str) -> Result<Site>;
    async fn upsert_device_type(&self, device_type: &DeviceType) -> Result<DeviceType>;
    async fn upsert_subnet(&self, subnet: &Subnet) -> Result<Subnet>;
    async fn upsert_device(&self, req: &UpsertDevice) -> Result<Device>;
    async fn upsert_interface(
        &self,
        device: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<Interface>;

    /// Bind `address` to `interface`, replacing the interface's previous
    /// address and detaching it from any other holder
    async fn assign_address(&self, interface: &InterfaceId, address: IpNet) -> Result<IpAddress>;

    /// Cable two interfaces. Idempotent for the same pair; fails with
    /// `Conflict` on a self-loop or when either end is cabled elsewhere
    async fn connect(&self, a: &InterfaceId, b: &InterfaceId) -> Result<Connection>;

    async fn get_region(&self, name: &str) -> Result<Option<Region>>;
    async fn get_site(&self, name: &str) -> Result<Option<Site>>;
    async fn get_device_type(&self, model: &str) -> Result<Option<DeviceType>>;
    async fn get_device(&self, name: &str) -> Result<Option<Device>>;
    async fn list_devices(&self) -> Result<Vec<Device>>;
    async fn list_subnets(&self) -> Result<Vec<Subnet>>;

    /// Interfaces of `device` in enumeration order
    async fn get_interfaces(&self, device: &str) -> Result<Vec<Interface>>;
    async fn get_interface(&self, id: &InterfaceId) -> Result<Option<Interface>>;
    async fn get_connected_peer(&self, interface: &InterfaceId) -> Result<Option<Interface>>;
    async fn get_address(&self, interface: &InterfaceId) -> Result<Option<IpAddress>>;

    async fn snapshot(&self) -> Result<Inventory>;

    async fn require_device(&self, name: &str) -> Result<Device> {
        self.get_device(name)
            .await?
            .ok_or_else(|| FabricError::not_found("device", name).into())
    }

    async fn require_interface(&self, id: &InterfaceId) -> Result<Interface> {
        self.get_interface(id)
            .await?
            .ok_or_else(|| FabricError::not_found("interface", id.to_string()).into())
    }
}

/// Store persists the topology in SQLite, delegating to per-entity repo modules.
#[derive(Clone)]
pub struct Store {
    pool: Pool<Sqlite>,
}

impl Store {
    /// Create a new database store with configurable pool size
    pub async fn new(db_path: &str) -> Result<Self> {
        Self::with_pool_size(db_path, 5).await
    }

    /// Create a new database store with a specific pool size
    pub async fn with_pool_size(db_path: &str, max_connections: u32) -> Result<Self> {
        let db_url = format!("sqlite:{}?mode=rwc", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(&db_url)
            .await
            .context("Failed to connect to database")?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Run database migrations
    async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(())
    }
}

#[async_trait]
impl TopologyStore for Store {
    async fn upsert_region(&self, name: &str) -> Result<Region> {
        RegionRepo::upsert(&self.pool, name).await
    }

    async fn upsert_site(&self, name: &str, region: &str) -> Result<Site> {
        SiteRepo::upsert(&self.pool, name, region).await
    }

    async fn upsert_device_type(&self, device_type: &DeviceType) -> Result<DeviceType> {
        DeviceTypeRepo::upsert(&self.pool, device_type).await
    }

    async fn upsert_subnet(&self, subnet: &Subnet) -> Result<Subnet> {
        SubnetRepo::upsert(&self.pool, subnet).await
    }

    async fn upsert_device(&self, req: &UpsertDevice) -> Result<Device> {
        DeviceRepo::upsert(&self.pool, req).await
    }

    async fn upsert_interface(
        &self,
        device: &str,
        name: &str,
        description: Option<&str>,
    ) -> Result<Interface> {
        InterfaceRepo::upsert(&self.pool, device, name, description).await
    }

    async fn assign_address(&self, interface: &InterfaceId, address: IpNet) -> Result<IpAddress> {
        self.require_interface(interface).await?;
        AddressRepo::assign(&self.pool, interface, address).await
    }

    async fn connect(&self, a: &InterfaceId, b: &InterfaceId) -> Result<Connection> {
        let connection = Connection::new(a.clone(), b.clone());
        if connection.is_self_loop() {
            return Err(FabricError::Conflict(format!(
                "cannot connect {} to {}: both ends on the same device",
                a, b
            ))
            .into());
        }
        self.require_interface(a).await?;
        self.require_interface(b).await?;
        for (end, other) in [(a, b), (b, a)] {
            match ConnectionRepo::peer_of(&self.pool, end).await? {
                Some(peer) if &peer == other => return Ok(connection),
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
        ConnectionRepo::insert(&self.pool, &connection).await?;
        Ok(connection)
    }

    async fn get_region(&self, name: &str) -> Result<Option<Region>> {
        RegionRepo::get(&self.pool, name).await
    }

    async fn get_site(&self, name: &str) -> Result<Option<Site>> {
        SiteRepo::get(&self.pool, name).await
    }

    async fn get_device_type(&self, model: &str) -> Result<Option<DeviceType>> {
        DeviceTypeRepo::get(&self.pool, model).await
    }

    async fn get_device(&self, name: &str) -> Result<Option<Device>> {
        DeviceRepo::get(&self.pool, name).await
    }

    async fn list_devices(&self) -> Result<Vec<Device>> {
        DeviceRepo::list(&self.pool).await
    }

    async fn list_subnets(&self) -> Result<Vec<Subnet>> {
        SubnetRepo::list(&self.pool).await
    }

    async fn get_interfaces(&self, device: &str) -> Result<Vec<Interface>> {
        InterfaceRepo::list_for_device(&self.pool, device).await
    }

    async fn get_interface(&self, id: &InterfaceId) -> Result<Option<Interface>> {
        InterfaceRepo::get(&self.pool, id).await
    }

    async fn get_connected_peer(&self, interface: &InterfaceId) -> Result<Option<Interface>> {
        match ConnectionRepo::peer_of(&self.pool, interface).await? {
            Some(peer) => InterfaceRepo::get(&self.pool, &peer).await,
            None => Ok(None),
        }
    }

    async fn get_address(&self, interface: &InterfaceId) -> Result<Option<IpAddress>> {
        AddressRepo::get_for_interface(&self.pool, interface).await
    }

    async fn snapshot(&self) -> Result<Inventory> {
        Ok(Inventory {
            regions: RegionRepo::list(&self.pool).await?,
            sites: SiteRepo::list(&self.pool).await?,
            device_types: DeviceTypeRepo::list(&self.pool).await?,
            subnets: SubnetRepo::list(&self.pool).await?,
            devices: DeviceRepo::list(&self.pool).await?,
            interfaces: InterfaceRepo::list(&self.pool).await?,
            addresses: AddressRepo::list(&self.pool).await?,
            connections: ConnectionRepo::list(&self.pool).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn temp_store(dir: &tempfile::TempDir) -> Store {
        let path = dir.path().join("fabric.db");
        Store::new(path.to_str().unwrap()).await.unwrap()
    }

    async fn seed(store: &dyn TopologyStore) {
        store.upsert_region("Europe").await.unwrap();
        store.upsert_site("Paris", "Europe").await.unwrap();
        store
            .upsert_device_type(&DeviceType {
                model: "DCS-7050SX".to_string(),
                manufacturer: Some("Arista".to_string()),
                interfaces: vec!["Loopback0".to_string(), "Ethernet1".to_string()],
            })
            .await
            .unwrap();
        store
            .upsert_subnet(&Subnet {
                cidr: "10.0.0.0/24".parse().unwrap(),
                purpose: SubnetPurpose::Loopback,
                site: Some("Paris".to_string()),
                description: None,
            })
            .await
            .unwrap();
        for (name, asn) in [("leaf1", 65001), ("spine1", 65000)] {
            store
                .upsert_device(&UpsertDevice {
                    name: name.to_string(),
                    site: "Paris".to_string(),
                    device_type: "DCS-7050SX".to_string(),
                    attrs: DeviceAttrs {
                        asn: Some(asn),
                        ..Default::default()
                    },
                })
                .await
                .unwrap();
            store.upsert_interface(name, "Loopback0", None).await.unwrap();
            store
                .upsert_interface(name, "Ethernet1", Some("fabric"))
                .await
                .unwrap();
        }
        store
            .assign_address(
                &InterfaceId::new("leaf1", "Loopback0"),
                "10.0.0.1/32".parse().unwrap(),
            )
            .await
            .unwrap();
        store
            .connect(
                &InterfaceId::new("leaf1", "Ethernet1"),
                &InterfaceId::new("spine1", "Ethernet1"),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_sqlite_matches_memory_store() {
        let dir = tempfile::tempdir().unwrap();
        let sqlite = temp_store(&dir).await;
        let memory = MemoryStore::new();
        seed(&sqlite).await;
        seed(&memory).await;

        assert_eq!(sqlite.snapshot().await.unwrap(), memory.snapshot().await.unwrap());
    }

    #[tokio::test]
    async fn test_sqlite_merge_keeps_existing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let store = temp_store(&dir).await;
        seed(&store).await;

        store
            .upsert_device(&UpsertDevice {
                name: "leaf1".to_string(),
                site: "Paris".to_string(),
                device_type: "DCS-7050SX".to_string(),
                attrs: DeviceAttrs {
                    role: Some(FabricRole::Leaf),
                    ..Default::default()
                },
            })
            .await
            .unwrap();
        let device = store.require_device("leaf1").await.unwrap();
        assert_eq!(device.attrs.asn, Some(65001));
        assert_eq!(device.attrs.role, Some(FabricRole::Leaf));

        let dt = store
            .upsert_device_type(&DeviceType {
                model: "DCS-7050SX".to_string(),
                manufacturer: None,
                interfaces: vec![],
            })
            .await
            .unwrap();
        assert_eq!(dt.manufacturer.as_deref(), Some("Arista"));
        assert_eq!(dt.interfaces.len(), 2);
    }

    #[tokio::test]
    async fn test_sqlite_peer_and_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let store = temp_store(&dir).await;
        seed(&store).await;

        let peer = store
            .get_connected_peer(&InterfaceId::new("spine1", "Ethernet1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(peer.id(), InterfaceId::new("leaf1", "Ethernet1"));

        let err = store
            .connect(
                &InterfaceId::new("spine1", "Ethernet1"),
                &InterfaceId::new("leaf1", "Loopback0"),
            )
            .await
            .unwrap_err();
        assert_eq!(FabricError::from(err).kind(), "conflict");

        let err = store
            .assign_address(
                &InterfaceId::new("leaf1", "Ethernet9"),
                "10.0.1.0/31".parse().unwrap(),
            )
            .await
            .unwrap_err();
        assert_eq!(FabricError::from(err).kind(), "not_found");
    }
}
