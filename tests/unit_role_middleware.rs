use std::sync::Arc;

use axum::{Router, body::Body, http::Request, http::StatusCode, routing::get};
use rollcall::middleware::auth::AuthUser;
use rollcall::middleware::role::{RequireAdmin, RequireStaff, RequireStudent};
use rollcall::state::AppState;
use rollcall_auth::create_access_token;
use rollcall_config::{CorsConfig, JwtConfig, ServerConfig, StorageConfig};
use rollcall_core::LocalFileStorage;
use rollcall_models::{UserId, UserRole};
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;

fn test_state() -> AppState {
    let storage_config = StorageConfig::default();
    AppState {
        // never connected; the extractors only read the JWT config
        db: PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap(),
        jwt_config: JwtConfig {
            secret: "role-middleware-test-secret-32-chars!".to_string(),
            access_token_expiry: 3600,
            refresh_token_expiry: 604800,
        },
        cors_config: CorsConfig::from_list("http://localhost:5173"),
        server_config: ServerConfig::default(),
        storage: Arc::new(LocalFileStorage::new(storage_config.upload_dir.clone())),
        storage_config,
    }
}

fn app(state: AppState) -> Router {
    Router::new()
        .route(
            "/any",
            get(|user: AuthUser| async move { user.role().to_string() }),
        )
        .route("/admin", get(|_: RequireAdmin| async { "ok" }))
        .route("/staff", get(|_: RequireStaff| async { "ok" }))
        .route("/student", get(|_: RequireStudent| async { "ok" }))
        .with_state(state)
}

async fn status_for(path: &str, authorization: Option<String>) -> StatusCode {
    let state = test_state();
    let mut request = Request::builder().uri(path);
    if let Some(value) = authorization {
        request = request.header("authorization", value);
    }
    app(state)
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap()
        .status()
}

fn bearer(role: UserRole) -> Option<String> {
    let token = create_access_token(
        UserId::new(),
        "someone@school.test",
        role,
        &test_state().jwt_config,
    )
    .unwrap();
    Some(format!("Bearer {}", token))
}

#[tokio::test]
async fn test_missing_header_is_unauthorized() {
    assert_eq!(status_for("/any", None).await, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_non_bearer_header_is_unauthorized() {
    let status = status_for("/any", Some("Basic dXNlcjpwYXNz".to_string())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_garbage_token_is_unauthorized() {
    let status = status_for("/any", Some("Bearer not.a.jwt".to_string())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_every_role_is_authenticated() {
    for role in [UserRole::Admin, UserRole::Teacher, UserRole::Student] {
        assert_eq!(status_for("/any", bearer(role)).await, StatusCode::OK);
    }
}

#[tokio::test]
async fn test_admin_extractor() {
    assert_eq!(status_for("/admin", bearer(UserRole::Admin)).await, StatusCode::OK);
    assert_eq!(
        status_for("/admin", bearer(UserRole::Teacher)).await,
        StatusCode::FORBIDDEN
    );
}

#[tokio::test]
async fn test_staff_extractor() {
    assert_eq!(status_for("/staff", bearer(UserRole::Admin)).await, StatusCode::OK);
    assert_eq!(status_for("/staff", bearer(UserRole::Teacher)).await, StatusCode::OK);
    assert_eq!(
        status_for("/staff", bearer(UserRole::Student)).await,
        StatusCode::FORBIDDEN
    );
}

#[tokio::test]
async fn test_student_extractor() {
    assert_eq!(
        status_for("/student", bearer(UserRole::Student)).await,
        StatusCode::OK
    );
    assert_eq!(
        status_for("/student", bearer(UserRole::Admin)).await,
        StatusCode::FORBIDDEN
    );
}
