use axum::{routing::get, Router};

use crate::generation::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/generate-letter",
            get(handlers::handle_letter_probe).post(handlers::handle_generate_letter),
        )
        .route(
            "/api/generate-letter",
            get(handlers::handle_letter_probe).post(handlers::handle_generate_letter),
        )
        .with_state(state)
}
