use crate::handlers;
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/api/preview", post(handlers::preview))
        .route("/api/ranks", get(handlers::ranks))
        .with_state(state)
}
