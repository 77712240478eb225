//! Unit fidelity settings endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use domain::models::{FidelityConfigResponse, UnitFidelityConfig, UpdateFidelityConfigRequest};
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::ApiKeyAuth;

/// GET /api/v1/units/:unit_id/fidelity
pub async fn get_fidelity_config(
    State(state): State<AppState>,
    auth: ApiKeyAuth,
    Path(unit_id): Path<Uuid>,
) -> Result<Json<FidelityConfigResponse>, ApiError> {
    auth.ensure_unit_access(unit_id)?;

    let config = state.loyalty.fidelity_config(unit_id).await?;
    Ok(Json(FidelityConfigResponse::new(unit_id, config)))
}

/// PUT /api/v1/units/:unit_id/fidelity
pub async fn update_fidelity_config(
    State(state): State<AppState>,
    auth: ApiKeyAuth,
    Path(unit_id): Path<Uuid>,
    Json(request): Json<UpdateFidelityConfigRequest>,
) -> Result<Json<FidelityConfigResponse>, ApiError> {
    auth.ensure_unit_access(unit_id)?;
    request.validate()?;

    let config = state
        .loyalty
        .update_fidelity_config(unit_id, UnitFidelityConfig::from(request))
        .await?;

    tracing::info!(
        unit_id = %unit_id,
        key_prefix = %auth.key_prefix,
        "Fidelity settings changed through API"
    );
    Ok(Json(FidelityConfigResponse::new(unit_id, config)))
}
