//! Collection management endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::CollectionSummary;

/// GET /api/collections
pub async fn list_collections(State(state): State<AppState>) -> Json<Vec<CollectionSummary>> {
    Json(state.pipeline().index().list_collections().await)
}

/// DELETE /api/collections/:name
pub async fn delete_collection(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<StatusCode> {
    if state.pipeline().index().delete_collection(&name) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(Error::EmptyCollection(name))
    }
}
