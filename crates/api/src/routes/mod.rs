pub mod campaigns;
pub mod health;
pub mod users;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /users                                          list, create
/// /users/{id}                                     get, deactivate
///
/// /campaigns                                      list, create
/// /campaigns/{id}                                 get
/// /campaigns/{id}/batches                         list, upload
/// /campaigns/{id}/batches/{batch_no}              get, delete
/// /campaigns/{id}/batches/{batch_no}/results      results for a batch
/// /campaigns/{id}/assign                          compute assignment (POST)
/// /campaigns/{id}/agendas/{user_id}               agenda status
/// /campaigns/{id}/agendas/{user_id}/complete      mark batch completed (POST)
/// /campaigns/{id}/users/{user_id}/next-item       next item to annotate
/// /campaigns/{id}/users/{user_id}/results         submit a result (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/users", users::router())
        .nest("/campaigns", campaigns::router())
}
