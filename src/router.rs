use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::{Json, Router, middleware, routing::get};
use chrono::Utc;
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable as _};
use utoipa_swagger_ui::SwaggerUi;

use crate::docs::ApiDoc;
use crate::logging::logging_middleware;
use crate::metrics::metrics_middleware;
use crate::middleware::role::require_admin;
use crate::modules::attendance::init_attendance_router;
use crate::modules::auth::init_auth_router;
use crate::modules::classes::init_classes_router;
use crate::modules::dashboard::init_dashboard_router;
use crate::modules::leave_requests::init_leave_requests_router;
use crate::modules::schedules::init_schedules_router;
use crate::modules::subjects::init_subjects_router;
use crate::modules::users::{init_profile_router, init_users_router};
use crate::state::AppState;

/// Room for the text fields and multipart framing around an evidence file.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok", "timestamp": Utc::now() }))
}

pub fn init_router(state: AppState) -> Router {
    let admin_only = || middleware::from_fn_with_state(state.clone(), require_admin);
    let evidence_limit = state.storage_config.max_evidence_bytes + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .route("/health", get(health_check))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(Scalar::with_url("/scalar", ApiDoc::openapi()))
        .nest(
            "/api",
            Router::new()
                .nest("/auth", init_auth_router())
                .nest(
                    "/users",
                    init_profile_router().merge(init_users_router().route_layer(admin_only())),
                )
                .nest("/classes", init_classes_router().route_layer(admin_only()))
                .nest("/subjects", init_subjects_router().route_layer(admin_only()))
                .nest("/schedules", init_schedules_router())
                .nest("/attendance", init_attendance_router())
                .nest(
                    "/leave-requests",
                    init_leave_requests_router().layer(DefaultBodyLimit::max(evidence_limit)),
                )
                .nest("/dashboard", init_dashboard_router()),
        )
        .with_state(state.clone())
        .layer({
            let allowed_origins: Vec<HeaderValue> = state
                .cors_config
                .allowed_origins
                .iter()
                .filter_map(|origin| origin.parse().ok())
                .collect();

            CorsLayer::new()
                .allow_origin(allowed_origins)
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
                .allow_credentials(true)
        })
        .layer(TimeoutLayer::new(Duration::from_secs(
            state.server_config.request_timeout_secs,
        )))
        .layer(middleware::from_fn(logging_middleware))
        .layer(middleware::from_fn(metrics_middleware))
}
