//! Work dispatch: serve the next item to annotate and accept results.

use std::collections::HashSet;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use mteval_core::batch::Item;
use mteval_core::error::{validate_timestamps, CoreError};
use mteval_core::mqm::validate_span_payload;
use mteval_core::types::DbId;
use mteval_db::models::result::{AnnotationResult, CreateResult};
use mteval_db::repositories::{AgendaRepo, BatchRepo, ResultRepo};
use serde::Serialize;

use crate::error::{map_duplicate_result, AppError, AppResult};
use crate::state::AppState;

/// Next-item payload. `done` is set when the whole agenda is exhausted.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NextItemResponse {
    pub batch_no: Option<i32>,
    pub item: Option<Item>,
    pub remaining_in_batch: Option<usize>,
    pub done: bool,
}

/// GET /api/v1/campaigns/{id}/users/{user_id}/next-item
///
/// Returns the first unanswered item of the oldest open batch. A batch
/// with every item answered is auto-completed and the scan advances to
/// the next open batch.
pub async fn next_item(
    State(state): State<AppState>,
    Path((campaign_id, user_id)): Path<(DbId, DbId)>,
) -> AppResult<Json<NextItemResponse>> {
    let header = AgendaRepo::find(&state.pool, campaign_id, user_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "agenda",
            id: user_id,
        })?;

    loop {
        let Some(entry) = AgendaRepo::next_open(&state.pool, header.id).await? else {
            return Ok(Json(NextItemResponse {
                batch_no: None,
                item: None,
                remaining_in_batch: None,
                done: true,
            }));
        };
        let handle = entry.handle();
        let batch_no: i32 = handle.primary_id.parse().map_err(|_| {
            AppError::InternalError(format!("agenda entry '{handle}' has no batch number"))
        })?;

        let stored = BatchRepo::find(&state.pool, campaign_id, batch_no)
            .await?
            .ok_or_else(|| {
                AppError::InternalError(format!(
                    "agenda references batch {batch_no} which does not exist"
                ))
            })?;
        let items = stored.items()?;
        let answered: HashSet<i32> =
            ResultRepo::answered_item_ids(&state.pool, campaign_id, user_id, batch_no)
                .await?
                .into_iter()
                .collect();

        let mut unanswered = items.iter().filter(|i| !answered.contains(&i.item_id));
        if let Some(item) = unanswered.next() {
            let remaining = 1 + unanswered.count();
            return Ok(Json(NextItemResponse {
                batch_no: Some(batch_no),
                item: Some(item.clone()),
                remaining_in_batch: Some(remaining),
                done: false,
            }));
        }

        // Every item answered: close this batch and look at the next one.
        AgendaRepo::mark_completed(&state.pool, header.id, &handle).await?;
        tracing::info!(user_id, batch_no, "batch exhausted, auto-completed");
    }
}

/// Submit outcome. `alreadyCompleted` marks a submit against a batch the
/// annotator has already finished; nothing is stored in that case.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub stored: bool,
    pub already_completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<AnnotationResult>,
}

fn completed_submit_response() -> (StatusCode, Json<SubmitResponse>) {
    (
        StatusCode::OK,
        Json(SubmitResponse {
            stored: false,
            already_completed: true,
            result: None,
        }),
    )
}

/// POST /api/v1/campaigns/{id}/users/{user_id}/results
///
/// Validates timestamps, the MQM payload, assignment, and item existence,
/// then appends an immutable result row. A duplicate (user, batch, item)
/// submission is rejected with `ALREADY_ANSWERED`; a submit against a
/// batch the annotator already completed is a no-op success.
pub async fn submit_result(
    State(state): State<AppState>,
    Path((campaign_id, user_id)): Path<(DbId, DbId)>,
    Json(input): Json<CreateResult>,
) -> AppResult<(StatusCode, Json<SubmitResponse>)> {
    validate_timestamps(input.start_time, input.end_time)?;
    if let Some(mqm) = &input.mqm {
        validate_span_payload(mqm)?;
    }

    let handle = mteval_core::agenda::ObjectId::batch(input.batch_no);
    let header = AgendaRepo::find(&state.pool, campaign_id, user_id)
        .await?
        .ok_or_else(|| CoreError::NotAssigned {
            user: user_id,
            task: handle.to_string(),
        })?;
    let rows = AgendaRepo::items(&state.pool, header.id).await?;
    let entry = rows
        .iter()
        .find(|r| r.type_name == handle.type_name && r.primary_id == handle.primary_id)
        .ok_or_else(|| CoreError::NotAssigned {
            user: user_id,
            task: handle.to_string(),
        })?;
    if entry.completed_at.is_some() {
        tracing::debug!(
            user_id,
            batch_no = input.batch_no,
            "submit against completed batch ignored"
        );
        return Ok(completed_submit_response());
    }

    let stored = BatchRepo::find(&state.pool, campaign_id, input.batch_no)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "batch",
            id: input.batch_no as DbId,
        })?;
    let items = stored.items()?;
    if !items.iter().any(|i| i.item_id == input.item_id) {
        return Err(AppError::BadRequest(format!(
            "batch {} has no item {}",
            input.batch_no, input.item_id
        )));
    }

    let created = ResultRepo::create(&state.pool, campaign_id, user_id, &input)
        .await
        .map_err(|e| map_duplicate_result(e, user_id, input.batch_no, input.item_id))?;

    tracing::debug!(
        user_id,
        batch_no = input.batch_no,
        item_id = input.item_id,
        "result stored"
    );
    Ok((
        StatusCode::CREATED,
        Json(SubmitResponse {
            stored: true,
            already_completed: false,
            result: Some(created),
        }),
    ))
}

/// GET /api/v1/campaigns/{id}/batches/{batch_no}/results
pub async fn batch_results(
    State(state): State<AppState>,
    Path((campaign_id, batch_no)): Path<(DbId, i32)>,
) -> AppResult<Json<Vec<AnnotationResult>>> {
    let results = ResultRepo::list_for_batch(&state.pool, campaign_id, batch_no).await?;
    Ok(Json(results))
}
