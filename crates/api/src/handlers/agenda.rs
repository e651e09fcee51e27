//! Handlers for batch assignment and agenda inspection.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use mteval_core::agenda::{self, ObjectId};
use mteval_core::error::CoreError;
use mteval_core::types::DbId;
use mteval_db::models::agenda::agenda_from_rows;
use mteval_db::repositories::{AgendaRepo, BatchRepo, UserRepo};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::handlers::campaign::find_campaign;
use crate::state::AppState;

/// Assignment request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    pub replication: usize,
    pub user_ids: Vec<DbId>,
}

/// Assignment summary.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignResponse {
    pub users: usize,
    pub batches: usize,
    pub replication: usize,
}

/// Agenda status for one annotator.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgendaResponse {
    pub campaign_id: DbId,
    pub user_id: DbId,
    pub open: Vec<String>,
    pub completed: Vec<String>,
}

/// Completion request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteRequest {
    pub batch_no: i32,
}

/// Completion outcome. `already_completed` marks the idempotent repeat.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteResponse {
    pub completed: bool,
    pub already_completed: bool,
}

/// POST /api/v1/campaigns/{id}/assign
///
/// Computes a fresh balanced assignment of the campaign's batches over the
/// given annotators and replaces any previous agendas.
pub async fn assign(
    State(state): State<AppState>,
    Path(campaign_id): Path<DbId>,
    Json(input): Json<AssignRequest>,
) -> AppResult<Json<AssignResponse>> {
    find_campaign(&state, campaign_id).await?;

    for &user_id in &input.user_ids {
        if UserRepo::find_by_id(&state.pool, user_id).await?.is_none() {
            return Err(CoreError::NotFound {
                entity: "user",
                id: user_id,
            }
            .into());
        }
    }

    let batch_nos = BatchRepo::batch_numbers(&state.pool, campaign_id).await?;
    if batch_nos.is_empty() {
        return Err(AppError::BadRequest(format!(
            "campaign {campaign_id} has no batches to assign"
        )));
    }
    let handles: Vec<ObjectId> = batch_nos.iter().map(|&n| ObjectId::batch(n)).collect();

    let agendas = agenda::assign(&input.user_ids, &handles, input.replication)?;
    AgendaRepo::save_assignment(&state.pool, campaign_id, &agendas).await?;

    tracing::info!(
        campaign_id,
        users = agendas.len(),
        batches = handles.len(),
        replication = input.replication,
        "assignment saved"
    );
    Ok(Json(AssignResponse {
        users: agendas.len(),
        batches: handles.len(),
        replication: input.replication,
    }))
}

/// GET /api/v1/campaigns/{id}/agendas/{user_id}
pub async fn get_agenda(
    State(state): State<AppState>,
    Path((campaign_id, user_id)): Path<(DbId, DbId)>,
) -> AppResult<Json<AgendaResponse>> {
    let header = AgendaRepo::find(&state.pool, campaign_id, user_id)
        .await?
        .ok_or(CoreError::NotFound {
            entity: "agenda",
            id: user_id,
        })?;
    let rows = AgendaRepo::items(&state.pool, header.id).await?;
    let agenda = agenda_from_rows(user_id, &rows)?;

    Ok(Json(AgendaResponse {
        campaign_id,
        user_id,
        open: agenda.open().iter().map(ObjectId::to_string).collect(),
        completed: agenda.completed().iter().map(ObjectId::to_string).collect(),
    }))
}

/// POST /api/v1/campaigns/{id}/agendas/{user_id}/complete
///
/// Marks one assigned batch completed. Repeating the call on an already
/// completed batch reports success without changing anything.
pub async fn complete(
    State(state): State<AppState>,
    Path((campaign_id, user_id)): Path<(DbId, DbId)>,
    Json(input): Json<CompleteRequest>,
) -> AppResult<(StatusCode, Json<CompleteResponse>)> {
    let handle = ObjectId::batch(input.batch_no);
    let header = AgendaRepo::find(&state.pool, campaign_id, user_id)
        .await?
        .ok_or_else(|| CoreError::NotAssigned {
            user: user_id,
            task: handle.to_string(),
        })?;

    if AgendaRepo::mark_completed(&state.pool, header.id, &handle).await? {
        return Ok((
            StatusCode::OK,
            Json(CompleteResponse {
                completed: true,
                already_completed: false,
            }),
        ));
    }
    if AgendaRepo::is_completed(&state.pool, header.id, &handle).await? {
        return Ok((
            StatusCode::OK,
            Json(CompleteResponse {
                completed: true,
                already_completed: true,
            }),
        ));
    }
    Err(CoreError::NotAssigned {
        user: user_id,
        task: handle.to_string(),
    }
    .into())
}
