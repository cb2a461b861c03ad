use anyhow::Result;
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;

use super::types::*;

/// NetBox API client
pub struct NetBoxClient {
    base_url: String,
    token: String,
    client: Client,
}

impl NetBoxClient {
    pub fn new(url: String, token: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;

        Ok(Self {
            base_url: url.trim_end_matches('/').to_string(),
            token,
            client,
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }

    fn auth_header(&self) -> String {
        format!("Token {}", self.token)
    }

    /// Helper to perform a filtered GET list request
    async fn list_filtered<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let resp = self
            .client
            .get(self.api_url(endpoint))
            .query(query)
            .header("Authorization", self.auth_header())
            .header("Accept", "application/json")
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("NetBox API error {}: {}", status, body));
        }

        let paginated: PaginatedResponse<T> = resp.json().await?;
        Ok(paginated.results)
    }

    async fn find_one<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>> {
        Ok(self.list_filtered(endpoint, query).await?.into_iter().next())
    }

    /// Helper to look up a single item by slug
    async fn get_by_slug<T: serde::de::DeserializeOwned>(&self, endpoint: &str, slug: &str) -> Result<Option<T>> {
        self.find_one(endpoint, &[("slug", slug.to_string())]).await
    }

    /// Helper to create a resource via POST
    async fn create_resource<T, B>(&self, endpoint: &str, body: &B) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
        B: serde::Serialize,
    {
        let resp = self
            .client
            .post(self.api_url(endpoint))
            .header("Authorization", self.auth_header())
            .json(body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("NetBox API create error on {}: {}", endpoint, body));
        }

        Ok(resp.json().await?)
    }

    /// Slug lookup falling back to creation
    async fn get_or_create<T, B>(&self, endpoint: &str, slug: &str, body: &B) -> Result<(T, bool)>
    where
        T: serde::de::DeserializeOwned,
        B: serde::Serialize,
    {
        if let Some(existing) = self.get_by_slug::<T>(endpoint, slug).await? {
            return Ok((existing, false));
        }
        Ok((self.create_resource(endpoint, body).await?, true))
    }

    /// Test connectivity to NetBox
    pub async fn test_connection(&self) -> bool {
        match self
            .client
            .get(self.api_url("/dcim/sites/?limit=1"))
            .header("Authorization", self.auth_header())
            .header("Accept", "application/json")
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    // --- Regions and sites ---

    pub async fn get_or_create_region(&self, name: &str, slug: &str) -> Result<(NbNamed, bool)> {
        self.get_or_create("/dcim/regions/", slug, &NamedCreate {
            name: name.to_string(),
            slug: slug.to_string(),
        }).await
    }

    pub async fn get_or_create_site(&self, name: &str, slug: &str, region: Option<i32>) -> Result<(NbNamed, bool)> {
        self.get_or_create("/dcim/sites/", slug, &SiteCreate {
            name: name.to_string(),
            slug: slug.to_string(),
            status: "active".to_string(),
            region,
        }).await
    }

    // --- Manufacturers and device types ---

    pub async fn get_or_create_manufacturer(&self, name: &str, slug: &str) -> Result<(NbNamed, bool)> {
        self.get_or_create("/dcim/manufacturers/", slug, &NamedCreate {
            name: name.to_string(),
            slug: slug.to_string(),
        }).await
    }

    pub async fn get_or_create_device_type(&self, manufacturer_id: i32, model: &str, slug: &str) -> Result<(NbDeviceType, bool)> {
        self.get_or_create("/dcim/device-types/", slug, &DeviceTypeCreate {
            manufacturer: manufacturer_id,
            model: model.to_string(),
            slug: slug.to_string(),
        }).await
    }

    // --- Roles ---

    pub async fn get_or_create_role(&self, name: &str, slug: &str, color: &str) -> Result<(NbNamed, bool)> {
        self.get_or_create("/dcim/device-roles/", slug, &DeviceRoleCreate {
            name: name.to_string(),
            slug: slug.to_string(),
            color: color.to_string(),
        }).await
    }

    pub async fn get_or_create_ipam_role(&self, name: &str, slug: &str) -> Result<(NbNamed, bool)> {
        self.get_or_create("/ipam/roles/", slug, &NamedCreate {
            name: name.to_string(),
            slug: slug.to_string(),
        }).await
    }

    // --- Prefixes ---

    pub(crate) async fn get_or_create_prefix(&self, prefix: &PrefixCreate) -> Result<(NbPrefix, bool)> {
        let query = [("prefix", prefix.prefix.clone())];
        if let Some(existing) = self.find_one::<NbPrefix>("/ipam/prefixes/", &query).await? {
            return Ok((existing, false));
        }
        Ok((self.create_resource("/ipam/prefixes/", prefix).await?, true))
    }

    // --- Devices ---

    pub async fn get_device_by_name(&self, name: &str) -> Result<Option<NbDevice>> {
        self.find_one("/dcim/devices/", &[("name", name.to_string())]).await
    }

    pub(crate) async fn create_device(&self, device: &DeviceCreate) -> Result<NbDevice> {
        self.create_resource("/dcim/devices/", device).await
    }

    /// PATCH only the custom fields of an existing device
    pub async fn update_device_custom_fields(
        &self,
        id: i32,
        fields: &HashMap<String, serde_json::Value>,
    ) -> Result<NbDevice> {
        let resp = self
            .client
            .patch(self.api_url(&format!("/dcim/devices/{}/", id)))
            .header("Authorization", self.auth_header())
            .json(&serde_json::json!({ "custom_fields": fields }))
            .send()
            .await?;

        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Failed to update device: {}", body));
        }

        Ok(resp.json().await?)
    }

    // --- Interfaces ---

    pub async fn get_interface(&self, device_id: i32, name: &str) -> Result<Option<NbInterface>> {
        self.find_one(
            "/dcim/interfaces/",
            &[("device_id", device_id.to_string()), ("name", name.to_string())],
        ).await
    }

    pub async fn create_interface(&self, device_id: i32, name: &str, iface_type: &str, description: Option<&str>) -> Result<NbInterface> {
        self.create_resource("/dcim/interfaces/", &InterfaceCreate {
            device: device_id,
            name: name.to_string(),
            iface_type: iface_type.to_string(),
            description: description.map(|s| s.to_string()),
        }).await
    }

    // --- IP addresses ---

    pub async fn get_ip_address(&self, address: &str) -> Result<Option<NbIPAddress>> {
        self.find_one("/ipam/ip-addresses/", &[("address", address.to_string())]).await
    }

    pub async fn create_ip_address(&self, address: &str, interface_id: i32) -> Result<NbIPAddress> {
        self.create_resource("/ipam/ip-addresses/", &IPAddressCreate {
            address: address.to_string(),
            status: "active".to_string(),
            assigned_object_type: "dcim.interface".to_string(),
            assigned_object_id: interface_id,
        }).await
    }

    // --- Cables ---

    pub async fn create_cable(&self, a_interface: i32, b_interface: i32) -> Result<NbCable> {
        self.create_resource("/dcim/cables/", &CableCreate {
            a_terminations: vec![Termination::interface(a_interface)],
            b_terminations: vec![Termination::interface(b_interface)],
            status: "connected".to_string(),
        }).await
    }
}
