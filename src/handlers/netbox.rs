use axum::{extract::State, Json};
use std::sync::Arc;

use crate::config::Config;
use crate::netbox::{self, NetBoxClient};
use crate::AppState;

use super::ApiError;

/// Create a NetBoxClient from config, rejecting an unconfigured target
pub fn make_client(config: &Config) -> Result<NetBoxClient, ApiError> {
    let (Some(url), Some(token)) = (&config.netbox_url, &config.netbox_token) else {
        return Err(ApiError::bad_request("NetBox not configured"));
    };
    NetBoxClient::new(url.clone(), token.clone())
        .map_err(|e| ApiError::internal(format!("Failed to create NetBox client: {}", e)))
}

/// Push the current topology to NetBox
pub async fn sync_push(State(state): State<Arc<AppState>>) -> Result<Json<netbox::SyncResult>, ApiError> {
    let nb = make_client(&state.config)?;
    let result = netbox::sync_push(
        state.store.as_ref(),
        &nb,
        state.compiler.renderer().resolver(),
    )
    .await?;
    Ok(Json(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_state;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_push_requires_configuration() {
        let err = sync_push(State(test_state())).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }
}
