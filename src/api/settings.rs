//! Notification preference endpoints.

use axum::{
    extract::{Path, State},
    Json,
};

use super::{success, ApiResult};
use crate::models::{ProfessionalSettings, UpdateSettingsRequest};
use crate::AppState;

/// GET /api/professionals/{pid}/settings - Sound and vibration preferences.
pub async fn get_settings(
    State(state): State<AppState>,
    Path(professional_id): Path<String>,
) -> ApiResult<ProfessionalSettings> {
    success(state.repo.get_settings(&professional_id).await?)
}

/// PUT /api/professionals/{pid}/settings - Update preferences.
pub async fn update_settings(
    State(state): State<AppState>,
    Path(professional_id): Path<String>,
    Json(request): Json<UpdateSettingsRequest>,
) -> ApiResult<ProfessionalSettings> {
    success(
        state
            .repo
            .upsert_settings(&professional_id, &request)
            .await?,
    )
}
