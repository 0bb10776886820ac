mod common;

use axum::http::StatusCode;
use common::{
    create_test_class, create_test_user, generate_unique_email, login, send, setup_test_app,
};
use rollcall_models::UserRole;
use serde_json::json;
use sqlx::PgPool;

#[sqlx::test(migrations = "./migrations")]
async fn test_get_profile_for_student_lists_classes(pool: PgPool) {
    let student = create_test_user(&pool, UserRole::Student).await;
    let class_id = create_test_class(&pool).await;
    common::enroll(&pool, class_id, student.id).await;
    let token = login(&pool, &student).await;

    let (status, body) =
        send(setup_test_app(pool.clone()), "GET", "/api/users/me", Some(&token), None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], student.email);
    assert_eq!(body["classes"].as_array().unwrap().len(), 1);
    assert_eq!(body["classes"][0]["id"], class_id.to_string());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_non_admin_cannot_list_users(pool: PgPool) {
    let teacher = create_test_user(&pool, UserRole::Teacher).await;
    let token = login(&pool, &teacher).await;

    let (status, _) =
        send(setup_test_app(pool.clone()), "GET", "/api/users", Some(&token), None).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_admin_creates_student_with_classes(pool: PgPool) {
    let admin = create_test_user(&pool, UserRole::Admin).await;
    let class_id = create_test_class(&pool).await;
    let token = login(&pool, &admin).await;

    let (status, body) = send(
        setup_test_app(pool.clone()),
        "POST",
        "/api/users",
        Some(&token),
        Some(json!({
            "first_name": "Alan",
            "last_name": "Turing",
            "email": generate_unique_email(),
            "password": "password123",
            "role": "student",
            "student_number": "S-100",
            "class_ids": [class_id]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let user_id = body["id"].as_str().unwrap().to_string();
    let (status, detail) = send(
        setup_test_app(pool.clone()),
        "GET",
        &format!("/api/users/{}", user_id),
        Some(&token),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["role"], "student");
    assert_eq!(detail["classes"][0]["id"], class_id.to_string());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_create_user_with_unknown_class_is_rejected(pool: PgPool) {
    let admin = create_test_user(&pool, UserRole::Admin).await;
    let token = login(&pool, &admin).await;

    let (status, body) = send(
        setup_test_app(pool.clone()),
        "POST",
        "/api/users",
        Some(&token),
        Some(json!({
            "first_name": "Alan",
            "last_name": "Turing",
            "email": generate_unique_email(),
            "password": "password123",
            "role": "student",
            "class_ids": [uuid::Uuid::new_v4()]
        })),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["details"]["class_ids"].is_string());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_filter_users_by_role_and_search(pool: PgPool) {
    let admin = create_test_user(&pool, UserRole::Admin).await;
    create_test_user(&pool, UserRole::Teacher).await;
    let student = create_test_user(&pool, UserRole::Student).await;
    let token = login(&pool, &admin).await;

    let (status, body) = send(
        setup_test_app(pool.clone()),
        "GET",
        "/api/users?role=student",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["total"], 1);
    assert_eq!(body["data"][0]["id"], student.id.to_string());

    let local_part = student.email.split('@').next().unwrap().to_uppercase();
    let (_, body) = send(
        setup_test_app(pool.clone()),
        "GET",
        &format!("/api/users?search={}", local_part),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(body["meta"]["total"], 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_last_admin_cannot_be_deleted(pool: PgPool) {
    let admin = create_test_user(&pool, UserRole::Admin).await;
    let token = login(&pool, &admin).await;

    let (status, body) = send(
        setup_test_app(pool.clone()),
        "DELETE",
        &format!("/api/users/{}", admin.id),
        Some(&token),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Cannot delete the last admin");
}

#[sqlx::test(migrations = "./migrations")]
async fn test_last_admin_cannot_be_demoted(pool: PgPool) {
    let admin = create_test_user(&pool, UserRole::Admin).await;
    let token = login(&pool, &admin).await;

    let (status, _) = send(
        setup_test_app(pool.clone()),
        "PUT",
        &format!("/api/users/{}", admin.id),
        Some(&token),
        Some(json!({ "role": "teacher" })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_admin_can_be_deleted_while_another_remains(pool: PgPool) {
    let admin = create_test_user(&pool, UserRole::Admin).await;
    let other = create_test_user(&pool, UserRole::Admin).await;
    let token = login(&pool, &admin).await;

    let (status, _) = send(
        setup_test_app(pool.clone()),
        "DELETE",
        &format!("/api/users/{}", other.id),
        Some(&token),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_update_user_duplicate_email_conflicts(pool: PgPool) {
    let admin = create_test_user(&pool, UserRole::Admin).await;
    let teacher = create_test_user(&pool, UserRole::Teacher).await;
    let token = login(&pool, &admin).await;

    let (status, _) = send(
        setup_test_app(pool.clone()),
        "PUT",
        &format!("/api/users/{}", teacher.id),
        Some(&token),
        Some(json!({ "email": admin.email })),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
}
