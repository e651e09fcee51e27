//! Route definitions for campaigns and everything scoped beneath them.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{agenda, batch, campaign, dispatch};
use crate::state::AppState;

/// Routes mounted at `/campaigns`.
///
/// ```text
/// GET    /                                         -> list
/// POST   /                                         -> create
/// GET    /{id}                                     -> get_by_id
/// GET    /{id}/batches                             -> batch list
/// POST   /{id}/batches                             -> batch upload
/// GET    /{id}/batches/{batch_no}                  -> batch detail
/// DELETE /{id}/batches/{batch_no}                  -> batch delete
/// GET    /{id}/batches/{batch_no}/results          -> batch results
/// POST   /{id}/assign                              -> compute assignment
/// GET    /{id}/agendas/{user_id}                   -> agenda status
/// POST   /{id}/agendas/{user_id}/complete          -> mark batch completed
/// GET    /{id}/users/{user_id}/next-item           -> next item
/// POST   /{id}/users/{user_id}/results             -> submit result
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(campaign::list).post(campaign::create))
        .route("/{id}", get(campaign::get_by_id))
        .route("/{id}/batches", get(batch::list).post(batch::upload))
        .route(
            "/{id}/batches/{batch_no}",
            get(batch::get_by_no).delete(batch::delete),
        )
        .route(
            "/{id}/batches/{batch_no}/results",
            get(dispatch::batch_results),
        )
        .route("/{id}/assign", post(agenda::assign))
        .route("/{id}/agendas/{user_id}", get(agenda::get_agenda))
        .route("/{id}/agendas/{user_id}/complete", post(agenda::complete))
        .route(
            "/{id}/users/{user_id}/next-item",
            get(dispatch::next_item),
        )
        .route(
            "/{id}/users/{user_id}/results",
            post(dispatch::submit_result),
        )
}
