mod common;

use axum::http::StatusCode;
use common::{TestUser, create_lesson, create_test_user, login, send, setup_test_app};
use rollcall_models::UserRole;
use serde_json::{Value, json};
use sqlx::PgPool;
use uuid::Uuid;

async fn record(
    pool: &PgPool,
    token: &str,
    schedule_id: Uuid,
    entries: Value,
) -> (StatusCode, Value) {
    send(
        setup_test_app(pool.clone()),
        "POST",
        "/api/attendance",
        Some(token),
        Some(json!({
            "schedule_id": schedule_id,
            "date": "2024-01-08",
            "attendance": entries,
        })),
    )
    .await
}

fn entry(student: &TestUser, status: &str) -> Value {
    json!({ "student_id": student.id, "status": status })
}

#[sqlx::test(migrations = "./migrations")]
async fn test_recording_twice_updates_the_same_row(pool: PgPool) {
    let teacher = create_test_user(&pool, UserRole::Teacher).await;
    let student = create_test_user(&pool, UserRole::Student).await;
    let (_, schedule_id) = create_lesson(&pool, &teacher, &student).await;
    let token = login(&pool, &teacher).await;

    let (status, first) =
        record(&pool, &token, schedule_id, json!([entry(&student, "present")])).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["inserted"], 1);
    assert_eq!(first["updated"], 0);

    let (_, second) = record(
        &pool,
        &token,
        schedule_id,
        json!([{ "student_id": student.id, "status": "late", "notes": "Bus delayed" }]),
    )
    .await;
    assert_eq!(second["inserted"], 0);
    assert_eq!(second["updated"], 1);

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM attendance WHERE student_id = $1")
        .bind(student.id)
        .fetch_one(&pool)
        .await
        .unwrap();
    let (status, notes): (String, Option<String>) =
        sqlx::query_as("SELECT status::text, notes FROM attendance WHERE student_id = $1")
            .bind(student.id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(rows, 1);
    assert_eq!(status, "late");
    assert_eq!(notes.as_deref(), Some("Bus delayed"));
}

#[sqlx::test(migrations = "./migrations")]
async fn test_unenrolled_student_fails_without_aborting_batch(pool: PgPool) {
    let teacher = create_test_user(&pool, UserRole::Teacher).await;
    let student = create_test_user(&pool, UserRole::Student).await;
    let stranger = create_test_user(&pool, UserRole::Student).await;
    let (_, schedule_id) = create_lesson(&pool, &teacher, &student).await;
    let token = login(&pool, &teacher).await;

    let (status, body) = record(
        &pool,
        &token,
        schedule_id,
        json!([entry(&student, "present"), entry(&stranger, "absent")]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["inserted"], 1);
    assert_eq!(body["failed"][0]["student_id"], stranger.id.to_string());
    assert_eq!(
        body["failed"][0]["reason"],
        "Student is not actively enrolled in this class"
    );
}

#[sqlx::test(migrations = "./migrations")]
async fn test_other_teacher_cannot_record(pool: PgPool) {
    let teacher = create_test_user(&pool, UserRole::Teacher).await;
    let colleague = create_test_user(&pool, UserRole::Teacher).await;
    let student = create_test_user(&pool, UserRole::Student).await;
    let (_, schedule_id) = create_lesson(&pool, &teacher, &student).await;
    let token = login(&pool, &colleague).await;

    let (status, _) = record(&pool, &token, schedule_id, json!([entry(&student, "present")])).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_student_cannot_record(pool: PgPool) {
    let teacher = create_test_user(&pool, UserRole::Teacher).await;
    let student = create_test_user(&pool, UserRole::Student).await;
    let (_, schedule_id) = create_lesson(&pool, &teacher, &student).await;
    let token = login(&pool, &student).await;

    let (status, _) = record(&pool, &token, schedule_id, json!([entry(&student, "present")])).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_empty_batch_is_rejected(pool: PgPool) {
    let teacher = create_test_user(&pool, UserRole::Teacher).await;
    let student = create_test_user(&pool, UserRole::Student).await;
    let (_, schedule_id) = create_lesson(&pool, &teacher, &student).await;
    let token = login(&pool, &teacher).await;

    let (status, body) = record(&pool, &token, schedule_id, json!([])).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["details"]["attendance"].is_string());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_roster_defaults_to_absent(pool: PgPool) {
    let teacher = create_test_user(&pool, UserRole::Teacher).await;
    let student = create_test_user(&pool, UserRole::Student).await;
    let (_, schedule_id) = create_lesson(&pool, &teacher, &student).await;
    let token = login(&pool, &teacher).await;

    let (status, roster) = send(
        setup_test_app(pool.clone()),
        "GET",
        &format!("/api/attendance/roster?schedule_id={}&date=2024-01-08", schedule_id),
        Some(&token),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(roster["date"], "2024-01-08");
    assert_eq!(roster["students"][0]["student_id"], student.id.to_string());
    assert_eq!(roster["students"][0]["status"], "absent");
    assert_eq!(roster["students"][0]["recorded"], false);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_student_sees_only_own_attendance(pool: PgPool) {
    let teacher = create_test_user(&pool, UserRole::Teacher).await;
    let student = create_test_user(&pool, UserRole::Student).await;
    let classmate = create_test_user(&pool, UserRole::Student).await;
    let (class_id, schedule_id) = create_lesson(&pool, &teacher, &student).await;
    common::enroll(&pool, class_id, classmate.id).await;
    let teacher_token = login(&pool, &teacher).await;
    record(
        &pool,
        &teacher_token,
        schedule_id,
        json!([entry(&student, "present"), entry(&classmate, "absent")]),
    )
    .await;

    let token = login(&pool, &student).await;
    let (status, list) =
        send(setup_test_app(pool.clone()), "GET", "/api/attendance", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["meta"]["total"], 1);
    assert_eq!(list["data"][0]["student_id"], student.id.to_string());

    let (_, list) = send(
        setup_test_app(pool.clone()),
        "GET",
        "/api/attendance?status=absent",
        Some(&teacher_token),
        None,
    )
    .await;
    assert_eq!(list["meta"]["total"], 1);
    assert_eq!(list["data"][0]["student_id"], classmate.id.to_string());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_class_report_counts_statuses(pool: PgPool) {
    let teacher = create_test_user(&pool, UserRole::Teacher).await;
    let student = create_test_user(&pool, UserRole::Student).await;
    let (class_id, schedule_id) = create_lesson(&pool, &teacher, &student).await;
    let token = login(&pool, &teacher).await;
    for (date, status) in [("2024-01-08", "present"), ("2024-01-15", "late"), ("2024-01-22", "absent")] {
        send(
            setup_test_app(pool.clone()),
            "POST",
            "/api/attendance",
            Some(&token),
            Some(json!({
                "schedule_id": schedule_id,
                "date": date,
                "attendance": [entry(&student, status)],
            })),
        )
        .await;
    }

    let (status, report) = send(
        setup_test_app(pool.clone()),
        "GET",
        &format!(
            "/api/attendance/report?type=class&id={}&date_from=2024-01-01&date_to=2024-01-31",
            class_id
        ),
        Some(&token),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["rows"][0]["id"], student.id.to_string());
    assert_eq!(report["rows"][0]["present"], 1);
    assert_eq!(report["rows"][0]["late"], 1);
    assert_eq!(report["rows"][0]["absent"], 1);
    assert_eq!(report["totals"]["total"], 3);
    assert_eq!(report["totals"]["attendance_rate"], 66.7);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_report_rejects_inverted_range(pool: PgPool) {
    let admin = create_test_user(&pool, UserRole::Admin).await;
    let token = login(&pool, &admin).await;

    let (status, body) = send(
        setup_test_app(pool.clone()),
        "GET",
        &format!(
            "/api/attendance/report?type=student&id={}&date_from=2024-02-01&date_to=2024-01-01",
            admin.id
        ),
        Some(&token),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["details"]["date_to"].is_string());
}
