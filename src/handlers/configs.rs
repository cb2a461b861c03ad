use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use crate::models::{BatchReport, RenderRequest};
use crate::AppState;

use super::ApiError;

/// Rendered configuration of one device as plain text
pub async fn get_device_config(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    let text = state
        .compiler
        .render_one(state.store.as_ref(), &name)
        .await?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        text,
    )
        .into_response())
}

/// Batch render; failures are reported per device in the body
pub async fn render(
    State(state): State<Arc<AppState>>,
    body: Option<Json<RenderRequest>>,
) -> Result<Json<BatchReport>, ApiError> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let report = state
        .compiler
        .compile(state.store.as_ref(), &request.devices)
        .await?;
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_state;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_unknown_device_config_is_not_found() {
        let state = test_state();
        let err = get_device_config(State(state), Path("ghost".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_render_empty_store() {
        let state = test_state();
        let Json(report) = render(State(state), None).await.unwrap();
        assert_eq!(report.succeeded(), 0);
        assert_eq!(report.failed(), 0);
        assert!(!report.run_id.is_empty());
    }
}
