//! Handlers for the `/campaigns` resource.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use mteval_core::error::CoreError;
use mteval_core::types::DbId;
use mteval_db::models::campaign::{Campaign, CreateCampaign};
use mteval_db::repositories::CampaignRepo;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// POST /api/v1/campaigns
pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<CreateCampaign>,
) -> AppResult<(StatusCode, Json<Campaign>)> {
    if input.required_annotations < 1 {
        return Err(AppError::BadRequest(
            "requiredAnnotations must be at least 1".to_string(),
        ));
    }
    let campaign = CampaignRepo::create(&state.pool, &input).await?;
    Ok((StatusCode::CREATED, Json(campaign)))
}

/// GET /api/v1/campaigns
pub async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<Campaign>>> {
    let campaigns = CampaignRepo::list(&state.pool).await?;
    Ok(Json(campaigns))
}

/// GET /api/v1/campaigns/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<Campaign>> {
    let campaign = find_campaign(&state, id).await?;
    Ok(Json(campaign))
}

/// Fetch a campaign or fail with 404.
pub async fn find_campaign(state: &AppState, id: DbId) -> Result<Campaign, AppError> {
    CampaignRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| CoreError::NotFound { entity: "campaign", id }.into())
}
