//! Handlers for the `/users` resource.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use mteval_core::error::CoreError;
use mteval_core::types::DbId;
use mteval_db::models::user::{CreateUser, User};
use mteval_db::repositories::UserRepo;

use crate::error::AppResult;
use crate::state::AppState;

/// POST /api/v1/users
pub async fn create(
    State(state): State<AppState>,
    Json(input): Json<CreateUser>,
) -> AppResult<(StatusCode, Json<User>)> {
    let user = UserRepo::create(&state.pool, &input).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /api/v1/users
pub async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<User>>> {
    let users = UserRepo::list(&state.pool).await?;
    Ok(Json(users))
}

/// GET /api/v1/users/{id}
pub async fn get_by_id(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<Json<User>> {
    let user = UserRepo::find_by_id(&state.pool, id)
        .await?
        .ok_or(CoreError::NotFound { entity: "user", id })?;
    Ok(Json(user))
}

/// DELETE /api/v1/users/{id}
///
/// Soft-deactivates; existing results and agendas stay intact.
pub async fn deactivate(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<StatusCode> {
    let updated = UserRepo::deactivate(&state.pool, id).await?;
    if !updated {
        return Err(CoreError::NotFound { entity: "user", id }.into());
    }
    Ok(StatusCode::NO_CONTENT)
}
