use axum::{extract::State, routing::get, Json, Router};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};

use crate::error::{AppError, Result};
use crate::models::CameraSummary;
use crate::state::AppState;

/// Camera routes
pub fn camera_routes() -> Router<AppState> {
    Router::new().route("/", get(list_cameras))
}

/// GET /api/v1/cameras - List live cameras visible to the caller.
///
/// Read-only snapshot, filtered by the same `list_visible_to` the real-time
/// `cameras-updated` broadcast uses, so the two paths cannot drift.
async fn list_cameras(
    State(state): State<AppState>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Vec<CameraSummary>>> {
    let identity = state.auth.verify(auth.token())?;
    if !identity.authenticated {
        return Err(AppError::AuthRequired);
    }

    Ok(Json(state.presence.list_visible_to(&identity)))
}
