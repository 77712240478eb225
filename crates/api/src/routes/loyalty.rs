//! Client loyalty endpoints used at checkout and by the admin sync screen.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    Json,
};
use chrono::Utc;
use domain::models::{LoyaltyStateResponse, RecordVisitRequest};
use domain::services::{FreeCutPrediction, ReconciledCounters, RedemptionResult, VisitResult};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::ApiKeyAuth;
use crate::middleware::metrics;

/// Body of POST /loyalty/redemptions.
#[derive(Debug, Default, Deserialize)]
pub struct RedeemCourtesyRequest {
    /// Appointment paid with the courtesy. Repeats for the same appointment are ignored.
    #[serde(default)]
    pub appointment_id: Option<Uuid>,
}

impl RedeemCourtesyRequest {
    /// Parses an optional JSON body. An empty body redeems without an appointment.
    pub fn from_body(body: &[u8]) -> Result<Self, ApiError> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
            .map_err(|e| ApiError::validation(format!("Invalid redemption body: {}", e)))
    }
}

/// Query of GET /loyalty/free-cut.
#[derive(Debug, Deserialize)]
pub struct FreeCutQuery {
    pub candidate_value: Decimal,
}

/// Checks that the key may act on this client's unit.
async fn authorize_client(
    state: &AppState,
    auth: &ApiKeyAuth,
    client_id: Uuid,
) -> Result<(), ApiError> {
    let client = state.loyalty.client(client_id).await?;
    auth.ensure_unit_access(client.unit_id)
}

/// GET /api/v1/clients/:client_id/loyalty
pub async fn get_loyalty_state(
    State(state): State<AppState>,
    auth: ApiKeyAuth,
    Path(client_id): Path<Uuid>,
) -> Result<Json<LoyaltyStateResponse>, ApiError> {
    let response = state.loyalty.loyalty_state(client_id).await?;
    auth.ensure_unit_access(response.unit_id)?;
    Ok(Json(response))
}

/// POST /api/v1/clients/:client_id/loyalty/visits
///
/// A disabled program is reported with `outcome = "disabled"`, not as an error.
pub async fn record_visit(
    State(state): State<AppState>,
    auth: ApiKeyAuth,
    Path(client_id): Path<Uuid>,
    Json(request): Json<RecordVisitRequest>,
) -> Result<Json<VisitResult>, ApiError> {
    request.validate()?;
    authorize_client(&state, &auth, client_id).await?;

    let event = request.into_event(Utc::now());
    let result = state
        .loyalty
        .record_completed_appointment(client_id, event)
        .await?;

    metrics::record_visit(&result);
    Ok(Json(result))
}

/// POST /api/v1/clients/:client_id/loyalty/redemptions
pub async fn redeem_courtesy(
    State(state): State<AppState>,
    auth: ApiKeyAuth,
    Path(client_id): Path<Uuid>,
    body: Bytes,
) -> Result<Json<RedemptionResult>, ApiError> {
    let request = RedeemCourtesyRequest::from_body(&body)?;
    authorize_client(&state, &auth, client_id).await?;

    let result = state
        .loyalty
        .consume_courtesy(client_id, request.appointment_id)
        .await?;

    if result.redeemed {
        metrics::record_courtesy_redeemed();
    }
    Ok(Json(result))
}

/// GET /api/v1/clients/:client_id/loyalty/free-cut?candidate_value=
pub async fn predict_free_cut(
    State(state): State<AppState>,
    auth: ApiKeyAuth,
    Path(client_id): Path<Uuid>,
    Query(query): Query<FreeCutQuery>,
) -> Result<Json<FreeCutPrediction>, ApiError> {
    if query.candidate_value.is_sign_negative() && !query.candidate_value.is_zero() {
        return Err(ApiError::validation("candidate_value cannot be negative"));
    }
    authorize_client(&state, &auth, client_id).await?;

    let prediction = state
        .loyalty
        .predict_free_cut(client_id, query.candidate_value)
        .await?;
    Ok(Json(prediction))
}

/// POST /api/v1/clients/:client_id/loyalty/recalculate
pub async fn recalculate(
    State(state): State<AppState>,
    auth: ApiKeyAuth,
    Path(client_id): Path<Uuid>,
) -> Result<Json<ReconciledCounters>, ApiError> {
    authorize_client(&state, &auth, client_id).await?;

    let result = state.loyalty.recalculate(client_id).await;
    metrics::record_reconciliations(usize::from(result.is_ok()), usize::from(result.is_err()));
    Ok(Json(result?))
}
