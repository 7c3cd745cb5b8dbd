//! Route configuration.

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

const HTTP_CONCURRENCY_LIMIT: usize = 1_000;

pub fn setup_routes(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    let api = Router::new()
        .route(
            "/allocations",
            post(handlers::allocations::create_allocation),
        )
        .route(
            "/allocations/{allocation_id}",
            get(handlers::allocations::get_allocation),
        )
        .route(
            "/allocations/{allocation_id}/status",
            put(handlers::allocations::update_allocation_status),
        )
        .route(
            "/allocations/{allocation_id}/renew",
            post(handlers::allocations::renew_allocation),
        )
        .route(
            "/allocations/{allocation_id}/admin-actions",
            get(handlers::allocations::list_admin_actions),
        )
        .route(
            "/allocations/{allocation_id}/users",
            post(handlers::users::add_users).delete(handlers::users::remove_users),
        )
        .route(
            "/allocations/{allocation_id}/eula",
            put(handlers::users::review_eula),
        )
        .route(
            "/allocations/{allocation_id}/users/{user_id}/role",
            put(handlers::users::update_role),
        )
        .route(
            "/allocations/{allocation_id}/change-requests",
            post(handlers::change_requests::create_change_request)
                .get(handlers::change_requests::list_change_requests),
        )
        .route(
            "/change-requests/pending",
            get(handlers::change_requests::list_pending_change_requests),
        )
        .route(
            "/change-requests/{request_id}",
            get(handlers::change_requests::get_change_request),
        )
        .route(
            "/change-requests/{request_id}/resolve",
            post(handlers::change_requests::resolve_change_request),
        )
        .route(
            "/change-requests/{request_id}/changes/{change_id}",
            axum::routing::delete(handlers::change_requests::delete_attribute_change),
        )
        .route(
            "/allocations/{allocation_id}/attributes",
            post(handlers::attributes::create_attribute),
        )
        .route(
            "/allocations/{allocation_id}/usage",
            get(handlers::attributes::list_usage_gauges),
        )
        .route(
            "/attributes/{attribute_id}",
            put(handlers::attributes::update_attribute)
                .delete(handlers::attributes::delete_attribute),
        )
        .route(
            "/allocations/{allocation_id}/notes",
            post(handlers::notes::create_note).get(handlers::notes::list_notes),
        )
        .route(
            "/notes/{note_id}",
            put(handlers::notes::update_note).delete(handlers::notes::delete_note),
        );

    Router::new()
        .route("/health", get(health))
        .route("/api/openapi.json", get(openapi_spec))
        .nest("/api/v0", api)
        .layer(ConcurrencyLimitLayer::new(HTTP_CONCURRENCY_LIMIT))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

async fn openapi_spec() -> impl IntoResponse {
    Json(crate::api_doc::get_openapi_spec())
}
