//! Admin endpoints.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use domain::services::BulkReconciliationReport;
use uuid::Uuid;

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::ApiKeyAuth;
use crate::middleware::{metrics, RequestId};

/// POST /api/v1/admin/units/:unit_id/loyalty/recalculate
///
/// Rebuilds the counters of every client in the unit. Clients that fail are listed
/// in the report; the others are still reconciled.
pub async fn recalculate_unit(
    State(state): State<AppState>,
    auth: ApiKeyAuth,
    Extension(request_id): Extension<RequestId>,
    Path(unit_id): Path<Uuid>,
) -> Result<Json<BulkReconciliationReport>, ApiError> {
    tracing::info!(
        unit_id = %unit_id,
        key_prefix = %auth.key_prefix,
        request_id = %request_id.0,
        "Unit reconciliation requested"
    );

    let report = state.loyalty.recalculate_unit(unit_id).await?;
    metrics::record_unit_reconciliation(&report);
    Ok(Json(report))
}
