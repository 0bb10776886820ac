mod common;

use axum::http::StatusCode;
use common::{
    create_test_class, create_test_schedule, create_test_subject, create_test_user, enroll, login,
    send, setup_test_app,
};
use rollcall_models::UserRole;
use serde_json::json;
use sqlx::PgPool;

#[sqlx::test(migrations = "./migrations")]
async fn test_create_and_list_classes(pool: PgPool) {
    let admin = create_test_user(&pool, UserRole::Admin).await;
    let token = login(&pool, &admin).await;

    let (status, created) = send(
        setup_test_app(pool.clone()),
        "POST",
        "/api/classes",
        Some(&token),
        Some(json!({ "name": "10-A", "grade": "10", "description": "Science stream" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["is_active"], true);

    let (status, list) = send(
        setup_test_app(pool.clone()),
        "GET",
        "/api/classes?grade=10",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["meta"]["total"], 1);
    assert_eq!(list["data"][0]["name"], "10-A");
    assert_eq!(list["data"][0]["student_count"], 0);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_duplicate_class_name_conflicts(pool: PgPool) {
    let admin = create_test_user(&pool, UserRole::Admin).await;
    let token = login(&pool, &admin).await;
    let body = json!({ "name": "10-A", "grade": "10" });

    let (first, _) = send(
        setup_test_app(pool.clone()),
        "POST",
        "/api/classes",
        Some(&token),
        Some(body.clone()),
    )
    .await;
    let (second, _) =
        send(setup_test_app(pool.clone()), "POST", "/api/classes", Some(&token), Some(body)).await;

    assert_eq!(first, StatusCode::CREATED);
    assert_eq!(second, StatusCode::CONFLICT);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_teacher_cannot_manage_classes(pool: PgPool) {
    let teacher = create_test_user(&pool, UserRole::Teacher).await;
    let token = login(&pool, &teacher).await;

    let (status, _) = send(
        setup_test_app(pool.clone()),
        "POST",
        "/api/classes",
        Some(&token),
        Some(json!({ "name": "10-A", "grade": "10" })),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_delete_class_with_students_conflicts(pool: PgPool) {
    let admin = create_test_user(&pool, UserRole::Admin).await;
    let student = create_test_user(&pool, UserRole::Student).await;
    let class_id = create_test_class(&pool).await;
    enroll(&pool, class_id, student.id).await;
    let token = login(&pool, &admin).await;
    let uri = format!("/api/classes/{}", class_id);

    let (status, body) = send(setup_test_app(pool.clone()), "DELETE", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Cannot delete class with 1 enrolled student(s)");

    let (status, _) = send(
        setup_test_app(pool.clone()),
        "DELETE",
        &format!("{}/students/{}", uri, student.id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(setup_test_app(pool.clone()), "DELETE", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_delete_class_with_schedule_conflicts(pool: PgPool) {
    let admin = create_test_user(&pool, UserRole::Admin).await;
    let teacher = create_test_user(&pool, UserRole::Teacher).await;
    let class_id = create_test_class(&pool).await;
    let subject_id = create_test_subject(&pool).await;
    create_test_schedule(&pool, class_id, subject_id, teacher.id, "08:00", "09:00").await;
    let token = login(&pool, &admin).await;

    let (status, body) = send(
        setup_test_app(pool.clone()),
        "DELETE",
        &format!("/api/classes/{}", class_id),
        Some(&token),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Cannot delete class with 1 schedule(s)");
    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM classes WHERE id = $1")
        .bind(class_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(remaining, 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_enroll_reports_non_students(pool: PgPool) {
    let admin = create_test_user(&pool, UserRole::Admin).await;
    let student = create_test_user(&pool, UserRole::Student).await;
    let teacher = create_test_user(&pool, UserRole::Teacher).await;
    let class_id = create_test_class(&pool).await;
    let token = login(&pool, &admin).await;

    let (status, body) = send(
        setup_test_app(pool.clone()),
        "POST",
        &format!("/api/classes/{}/students", class_id),
        Some(&token),
        Some(json!({ "student_ids": [student.id, teacher.id] })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["enrolled_count"], 1);
    assert_eq!(body["failed_ids"], json!([teacher.id]));
}

#[sqlx::test(migrations = "./migrations")]
async fn test_reenrolling_reactivates_enrollment(pool: PgPool) {
    let admin = create_test_user(&pool, UserRole::Admin).await;
    let student = create_test_user(&pool, UserRole::Student).await;
    let class_id = create_test_class(&pool).await;
    enroll(&pool, class_id, student.id).await;
    let token = login(&pool, &admin).await;
    let students_uri = format!("/api/classes/{}/students", class_id);

    send(
        setup_test_app(pool.clone()),
        "DELETE",
        &format!("{}/{}", students_uri, student.id),
        Some(&token),
        None,
    )
    .await;
    let (_, body) = send(
        setup_test_app(pool.clone()),
        "POST",
        &students_uri,
        Some(&token),
        Some(json!({ "student_ids": [student.id] })),
    )
    .await;
    assert_eq!(body["enrolled_count"], 1);

    let (status, students) =
        send(setup_test_app(pool.clone()), "GET", &students_uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    let students = students.as_array().unwrap();
    assert_eq!(students.len(), 1);
    assert_eq!(students[0]["is_active"], true);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_update_class_syncs_students(pool: PgPool) {
    let admin = create_test_user(&pool, UserRole::Admin).await;
    let kept = create_test_user(&pool, UserRole::Student).await;
    let dropped = create_test_user(&pool, UserRole::Student).await;
    let class_id = create_test_class(&pool).await;
    enroll(&pool, class_id, dropped.id).await;
    let token = login(&pool, &admin).await;

    let (status, _) = send(
        setup_test_app(pool.clone()),
        "PUT",
        &format!("/api/classes/{}", class_id),
        Some(&token),
        Some(json!({ "description": "Updated", "student_ids": [kept.id] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, detail) = send(
        setup_test_app(pool.clone()),
        "GET",
        &format!("/api/classes/{}", class_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(detail["description"], "Updated");
    assert_eq!(detail["student_count"], 1);
    assert_eq!(detail["students"][0]["id"], kept.id.to_string());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_get_missing_class_is_not_found(pool: PgPool) {
    let admin = create_test_user(&pool, UserRole::Admin).await;
    let token = login(&pool, &admin).await;

    let (status, _) = send(
        setup_test_app(pool.clone()),
        "GET",
        &format!("/api/classes/{}", uuid::Uuid::new_v4()),
        Some(&token),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}
