use super::{handlers, AppState};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn build_router(state: AppState) -> Router {
    let cors = if state.config.cors_origins.is_empty() {
        CorsLayer::permissive()
    } else {
        let origins: Vec<_> = state
            .config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new().allow_origin(AllowOrigin::list(origins))
    };

    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/v2/inbox", get(handlers::inbox))
        .route("/api/v2/inbox/:id/action", post(handlers::inbox_action))
        .route("/api/v2/clients", get(handlers::list_clients))
        .route("/api/v2/clients/:id", get(handlers::get_client))
        .route("/api/v2/intelligence/summary", get(handlers::intelligence_summary))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
