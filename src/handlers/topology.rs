use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::models::*;
use crate::AppState;

use super::ApiError;

/// Interface row of a device detail response
#[derive(Debug, Serialize)]
pub struct InterfaceDetail {
    #[serde(flatten)]
    pub interface: Interface,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub peer: Option<InterfaceId>,
}

#[derive(Debug, Serialize)]
pub struct DeviceDetail {
    #[serde(flatten)]
    pub device: Device,
    pub interfaces: Vec<InterfaceDetail>,
}

/// Load a topology document (YAML or JSON body)
pub async fn load_topology(
    State(state): State<Arc<AppState>>,
    body: String,
) -> Result<Json<LoadReport>, ApiError> {
    let doc = TopologyDocument::parse(&body)
        .map_err(|e| ApiError::bad_request(format!("{:#}", e)))?;
    let report = state.loader.load(state.store.as_ref(), &doc).await?;
    Ok(Json(report))
}

/// Full inventory snapshot
pub async fn get_topology(State(state): State<Arc<AppState>>) -> Result<Json<Inventory>, ApiError> {
    Ok(Json(state.store.snapshot().await?))
}

pub async fn list_devices(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Device>>, ApiError> {
    Ok(Json(state.store.list_devices().await?))
}

/// One device with its interfaces, addresses and cabling
pub async fn get_device(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<DeviceDetail>, ApiError> {
    let device = state.store.require_device(&name).await?;
    let mut interfaces = Vec::new();
    for iface in state.store.get_interfaces(&name).await? {
        let id = iface.id();
        let address = state.store.get_address(&id).await?.map(|a| a.address.to_string());
        let peer = state.store.get_connected_peer(&id).await?.map(|p| p.id());
        interfaces.push(InterfaceDetail {
            interface: iface,
            address,
            peer,
        });
    }
    Ok(Json(DeviceDetail { device, interfaces }))
}
