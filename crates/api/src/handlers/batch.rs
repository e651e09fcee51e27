//! Handlers for campaign batches.
//!
//! Batches arrive pre-composed as the batch JSON wire format and are
//! sealed on upload; the stored item array never changes afterwards.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use mteval_core::batch::Batch;
use mteval_core::error::CoreError;
use mteval_core::types::DbId;
use mteval_db::models::batch::{CreateBatch, StoredBatch};
use mteval_db::repositories::BatchRepo;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::handlers::campaign::find_campaign;
use crate::state::AppState;

/// Upload summary.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub stored: usize,
}

/// POST /api/v1/campaigns/{id}/batches
///
/// Body is a batch JSON document (array of batches). Uploading a batch
/// number the campaign already holds is a 409 via `uq_batches_campaign_no`.
pub async fn upload(
    State(state): State<AppState>,
    Path(campaign_id): Path<DbId>,
    Json(batches): Json<Vec<Batch>>,
) -> AppResult<(StatusCode, Json<UploadResponse>)> {
    find_campaign(&state, campaign_id).await?;
    if batches.is_empty() {
        return Err(AppError::BadRequest("batch upload is empty".to_string()));
    }

    for batch in &batches {
        let items = serde_json::to_value(&batch.items)
            .map_err(|e| AppError::InternalError(format!("cannot serialize items: {e}")))?;
        let input = CreateBatch {
            batch_no: batch.task.batch_no,
            batch_size: batch.task.batch_size,
            random_seed: batch.task.random_seed as i64,
            items,
        };
        BatchRepo::create(&state.pool, campaign_id, &input).await?;
    }

    tracing::info!(campaign_id, count = batches.len(), "stored uploaded batches");
    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            stored: batches.len(),
        }),
    ))
}

/// GET /api/v1/campaigns/{id}/batches
pub async fn list(
    State(state): State<AppState>,
    Path(campaign_id): Path<DbId>,
) -> AppResult<Json<Vec<StoredBatch>>> {
    find_campaign(&state, campaign_id).await?;
    let batches = BatchRepo::list_for_campaign(&state.pool, campaign_id).await?;
    Ok(Json(batches))
}

/// GET /api/v1/campaigns/{id}/batches/{batch_no}
pub async fn get_by_no(
    State(state): State<AppState>,
    Path((campaign_id, batch_no)): Path<(DbId, i32)>,
) -> AppResult<Json<StoredBatch>> {
    let batch = BatchRepo::find(&state.pool, campaign_id, batch_no)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "batch",
            id: batch_no as DbId,
        })?;
    Ok(Json(batch))
}

/// DELETE /api/v1/campaigns/{id}/batches/{batch_no}
///
/// Refuses to delete a batch any agenda still references.
pub async fn delete(
    State(state): State<AppState>,
    Path((campaign_id, batch_no)): Path<(DbId, i32)>,
) -> AppResult<StatusCode> {
    let references = BatchRepo::reference_count(&state.pool, campaign_id, batch_no).await?;
    if references > 0 {
        return Err(CoreError::Conflict(format!(
            "batch {batch_no} is referenced by {references} agenda entries"
        ))
        .into());
    }
    let deleted = BatchRepo::delete(&state.pool, campaign_id, batch_no).await?;
    if !deleted {
        return Err(CoreError::NotFound {
            entity: "batch",
            id: batch_no as DbId,
        }
        .into());
    }
    Ok(StatusCode::NO_CONTENT)
}
