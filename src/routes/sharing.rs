//! Share reconciliation endpoint.

use axum::Json;
use serde::Deserialize;

use crate::sharing::{self, SharePatch, ShareWith};

#[derive(Debug, Deserialize)]
pub struct DiffRequest {
    pub desired: ShareWith,
    #[serde(default)]
    pub current: ShareWith,
}

/// Compute the add/revoke patch that moves `current` to `desired`.
#[tracing::instrument(name = "sharing_diff", skip_all)]
pub async fn diff_shares(Json(request): Json<DiffRequest>) -> Json<SharePatch> {
    Json(sharing::diff(&request.desired, &request.current))
}
