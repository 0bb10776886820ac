mod common;

use axum::http::StatusCode;
use common::{
    create_test_class, create_test_schedule, create_test_user, login, send, setup_test_app,
};
use rollcall_models::UserRole;
use serde_json::json;
use sqlx::PgPool;

#[sqlx::test(migrations = "./migrations")]
async fn test_create_subject_and_reject_duplicate_code(pool: PgPool) {
    let admin = create_test_user(&pool, UserRole::Admin).await;
    let token = login(&pool, &admin).await;
    let body = json!({ "name": "Physics", "code": "PHY101" });

    let (status, created) = send(
        setup_test_app(pool.clone()),
        "POST",
        "/api/subjects",
        Some(&token),
        Some(body.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["code"], "PHY101");

    let (status, error) =
        send(setup_test_app(pool.clone()), "POST", "/api/subjects", Some(&token), Some(body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error["error"], "A subject with this code already exists");
}

#[sqlx::test(migrations = "./migrations")]
async fn test_search_subjects(pool: PgPool) {
    let admin = create_test_user(&pool, UserRole::Admin).await;
    let token = login(&pool, &admin).await;
    for (name, code) in [("Physics", "PHY101"), ("Chemistry", "CHE101")] {
        send(
            setup_test_app(pool.clone()),
            "POST",
            "/api/subjects",
            Some(&token),
            Some(json!({ "name": name, "code": code })),
        )
        .await;
    }

    let (status, list) = send(
        setup_test_app(pool.clone()),
        "GET",
        "/api/subjects?search=chem",
        Some(&token),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["meta"]["total"], 1);
    assert_eq!(list["data"][0]["name"], "Chemistry");
    assert_eq!(list["data"][0]["schedule_count"], 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_delete_subject_with_active_schedule_conflicts(pool: PgPool) {
    let admin = create_test_user(&pool, UserRole::Admin).await;
    let teacher = create_test_user(&pool, UserRole::Teacher).await;
    let token = login(&pool, &admin).await;

    let (_, subject) = send(
        setup_test_app(pool.clone()),
        "POST",
        "/api/subjects",
        Some(&token),
        Some(json!({ "name": "Physics", "code": "PHY101" })),
    )
    .await;
    let subject_id: uuid::Uuid = subject["id"].as_str().unwrap().parse().unwrap();
    let class_id = create_test_class(&pool).await;
    create_test_schedule(&pool, class_id, subject_id, teacher.id, "08:00", "09:00").await;

    let (status, body) = send(
        setup_test_app(pool.clone()),
        "DELETE",
        &format!("/api/subjects/{}", subject_id),
        Some(&token),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Cannot delete subject with 1 active schedule(s)");
}

#[sqlx::test(migrations = "./migrations")]
async fn test_student_cannot_list_subjects(pool: PgPool) {
    let student = create_test_user(&pool, UserRole::Student).await;
    let token = login(&pool, &student).await;

    let (status, _) =
        send(setup_test_app(pool.clone()), "GET", "/api/subjects", Some(&token), None).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}
