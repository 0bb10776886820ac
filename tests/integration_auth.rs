mod common;

use axum::http::StatusCode;
use common::{PASSWORD, create_test_user, generate_unique_email, send, setup_test_app};
use rollcall_models::UserRole;
use serde_json::json;
use sqlx::PgPool;

#[sqlx::test(migrations = "./migrations")]
async fn test_login_success(pool: PgPool) {
    let user = create_test_user(&pool, UserRole::Teacher).await;

    let (status, body) = send(
        setup_test_app(pool.clone()),
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": user.email, "password": PASSWORD })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["access_token"].is_string());
    assert!(body["refresh_token"].is_string());
    assert_eq!(body["user"]["email"], user.email);
    assert_eq!(body["user"]["role"], "teacher");
    assert!(body["user"].get("password").is_none());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_login_failures_look_identical(pool: PgPool) {
    let user = create_test_user(&pool, UserRole::Student).await;

    let (wrong_status, wrong_body) = send(
        setup_test_app(pool.clone()),
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": user.email, "password": "not-the-password" })),
    )
    .await;
    let (unknown_status, unknown_body) = send(
        setup_test_app(pool.clone()),
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": "nobody@test.com", "password": PASSWORD })),
    )
    .await;

    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_body, unknown_body);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_register_creates_student(pool: PgPool) {
    let email = generate_unique_email();

    let (status, body) = send(
        setup_test_app(pool.clone()),
        "POST",
        "/api/auth/register",
        None,
        Some(json!({
            "first_name": "Grace",
            "last_name": "Hopper",
            "email": email,
            "password": "password123",
            "student_number": "S-0001"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["role"], "student");
    assert_eq!(body["student_number"], "S-0001");
}

#[sqlx::test(migrations = "./migrations")]
async fn test_register_duplicate_email_conflicts(pool: PgPool) {
    let existing = create_test_user(&pool, UserRole::Student).await;

    let (status, _) = send(
        setup_test_app(pool.clone()),
        "POST",
        "/api/auth/register",
        None,
        Some(json!({
            "first_name": "Grace",
            "last_name": "Hopper",
            "email": existing.email,
            "password": "password123"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_register_validation_reports_fields(pool: PgPool) {
    let (status, body) = send(
        setup_test_app(pool.clone()),
        "POST",
        "/api/auth/register",
        None,
        Some(json!({
            "first_name": "Grace",
            "last_name": "Hopper",
            "email": "not-an-email",
            "password": "short"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["details"]["email"].is_string());
    assert!(body["details"]["password"].is_string());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_refresh_issues_new_access_token(pool: PgPool) {
    let user = create_test_user(&pool, UserRole::Admin).await;
    let (_, login) = send(
        setup_test_app(pool.clone()),
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": user.email, "password": PASSWORD })),
    )
    .await;

    let (status, body) = send(
        setup_test_app(pool.clone()),
        "POST",
        "/api/auth/refresh",
        None,
        Some(json!({ "refresh_token": login["refresh_token"] })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["access_token"].is_string());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_access_token_is_not_a_refresh_token(pool: PgPool) {
    let user = create_test_user(&pool, UserRole::Admin).await;
    let token = common::login(&pool, &user).await;

    let (status, _) = send(
        setup_test_app(pool.clone()),
        "POST",
        "/api/auth/refresh",
        None,
        Some(json!({ "refresh_token": token })),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_protected_route_requires_token(pool: PgPool) {
    let (status, _) = send(setup_test_app(pool.clone()), "GET", "/api/users/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_health_check(pool: PgPool) {
    let (status, body) = send(setup_test_app(pool.clone()), "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
