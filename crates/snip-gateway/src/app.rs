use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    create_batch_handler, create_json_handler, create_text_handler, delete_user_urls_handler,
    health_handler, list_user_urls_handler, ping_handler, resolve_handler, stats_handler,
};
use crate::state::AppState;

pub struct App {}

impl App {
    pub fn router(state: AppState) -> Router {
        Router::new()
            .route("/", post(create_text_handler))
            .route("/health", get(health_handler))
            .route("/ping", get(ping_handler))
            .route("/{code}", get(resolve_handler))
            .nest(
                "/api",
                Router::new()
                    .route("/shorten", post(create_json_handler))
                    .route("/shorten/batch", post(create_batch_handler))
                    .route(
                        "/user/urls",
                        get(list_user_urls_handler).delete(delete_user_urls_handler),
                    )
                    .route("/internal/stats", get(stats_handler)),
            )
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }
}
