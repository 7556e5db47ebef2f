pub mod dto;
pub mod errors;
pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use handlers::ApiDoc;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .route(
            "/esp32/environment",
            get(handlers::get_environment).post(handlers::ingest_environment),
        )
        .route("/esp32/preferences", get(handlers::get_preferences))
        .route("/esp32/tags/{tag}", get(handlers::get_tag_preferences))
        .route(
            "/esp32/employees/{employee_id}",
            get(handlers::get_employee_preferences),
        )
        .route(
            "/esp32/employees/{employee_id}/preferences",
            post(handlers::update_employee_preferences),
        )
        .route(
            "/esp32/lighting",
            get(handlers::poll_lighting).post(handlers::set_lighting),
        )
        .route("/esp32/climate", get(handlers::get_climate))
        .route(
            "/esp32/climate/command",
            get(handlers::consume_climate_command).post(handlers::issue_climate_command),
        )
        .route("/presence/events", get(handlers::get_presence_events))
        .with_state(state)
        .split_for_parts();

    router
        .route("/health", get(handlers::health))
        .route(
            "/api-docs/openapi.json",
            get(move || async move { axum::Json(api) }),
        )
        .layer(TraceLayer::new_for_http())
}
