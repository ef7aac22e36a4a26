use crate::handlers::{self, AppState};
use crate::openapi::ApiDoc;
use crate::webhook_handler;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Request size limit: 5MB max payload.
pub const MAX_BODY_BYTES: usize = 5 * 1024 * 1024;

/// API routes without the health check or docs. The binary puts the rate
/// limiter in front of these.
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        // Search session
        .route("/search", post(handlers::search).get(handlers::search_info))
        // Readers
        .route("/stream-companies", get(handlers::stream_companies))
        .route("/enriched-competitors", get(handlers::enriched_competitors))
        .route("/enrich-selected", post(handlers::enrich_selected))
        // Clay webhooks
        .route(
            "/webhook/receive-companies",
            post(webhook_handler::receive_companies)
                .put(webhook_handler::receive_companies)
                .get(webhook_handler::receive_companies_info),
        )
        .route(
            "/webhook/clay-results",
            post(webhook_handler::clay_results),
        )
        .route(
            "/webhook/clay-results/main",
            post(webhook_handler::clay_results_main),
        )
        .route(
            "/webhook/clay-results/jobs",
            post(webhook_handler::clay_results_jobs),
        )
        .layer(ServiceBuilder::new().layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES)))
}

/// Assemble the full application around `protected`, the API routes with any
/// extra layers applied by the caller.
pub fn assemble(protected: Router<Arc<AppState>>, state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(protected)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Full application without rate limiting, as used by tests and tools.
pub fn router(state: Arc<AppState>) -> Router {
    assemble(api_routes(), state)
}
