pub mod configs;
pub mod netbox;
pub mod topology;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::FabricError;

/// Error response body: {"error": "message"}
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// API error type
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.into(),
        }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: msg.into(),
        }
    }

    pub fn unprocessable(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse::new(self.message)),
        )
            .into_response()
    }
}

impl From<FabricError> for ApiError {
    fn from(err: FabricError) -> Self {
        let message = err.to_string();
        match err {
            FabricError::Validation(_) => Self::bad_request(message),
            FabricError::NotFound { .. } => Self::not_found(message),
            FabricError::Conflict(_) => Self::conflict(message),
            FabricError::RoleAmbiguous { .. }
            | FabricError::MissingRouterId { .. }
            | FabricError::MissingAsn { .. }
            | FabricError::AddressOutOfSubnet { .. } => Self::unprocessable(message),
            FabricError::Template(_) | FabricError::Backend(_) => {
                tracing::error!("Request failed: {}", message);
                Self::internal(message)
            }
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        FabricError::from(err).into()
    }
}

/// Healthcheck endpoint: returns 200 OK with status
pub async fn healthcheck() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "fabric-compiler",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ValidationReport;

    #[test]
    fn test_fabric_error_status_mapping() {
        let mut report = ValidationReport::default();
        report.push("devices[0] (x)", "unknown site 'y'");
        assert_eq!(ApiError::from(FabricError::Validation(report)).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::from(FabricError::not_found("device", "ghost")).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(FabricError::Conflict("taken".into())).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(FabricError::MissingAsn { device: "leaf1".into() }).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
    }

    #[test]
    fn test_anyhow_wrapping_keeps_status() {
        let err = anyhow::Error::from(FabricError::not_found("device", "ghost"));
        assert_eq!(ApiError::from(err).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::from(anyhow::anyhow!("disk on fire")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
