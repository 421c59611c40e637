pub mod reply;
pub mod status;
pub mod threads;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Build the full router for the server
pub fn configure(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(status::routes())
        .merge(reply::routes(state.clone()))
        .merge(threads::routes(state))
}
