#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use rollcall::router::init_router;
use rollcall::state::AppState;
use rollcall_config::{CorsConfig, JwtConfig, ServerConfig, StorageConfig};
use rollcall_core::{LocalFileStorage, hash_password};
use rollcall_models::UserRole;
use serde_json::{Value, json};
use sqlx::PgPool;
use tower::ServiceExt;
use uuid::Uuid;

pub const PASSWORD: &str = "testpass123";

pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub role: UserRole,
}

/// Each app gets its own upload directory under the system temp dir.
pub fn setup_test_app(pool: PgPool) -> axum::Router {
    setup_test_app_with_uploads(pool, temp_upload_dir())
}

pub fn temp_upload_dir() -> PathBuf {
    std::env::temp_dir().join(format!("rollcall-test-{}", Uuid::new_v4()))
}

/// An app whose evidence files land in `upload_dir`.
pub fn setup_test_app_with_uploads(pool: PgPool, upload_dir: PathBuf) -> axum::Router {
    dotenvy::dotenv().ok();
    let storage_config = StorageConfig {
        upload_dir,
        ..StorageConfig::default()
    };
    let state = AppState {
        db: pool,
        jwt_config: JwtConfig::from_env(),
        cors_config: CorsConfig::from_env(),
        server_config: ServerConfig::default(),
        storage: Arc::new(LocalFileStorage::with_max_size(
            storage_config.upload_dir.clone(),
            storage_config.max_evidence_bytes,
        )),
        storage_config,
    };
    init_router(state)
}

pub fn generate_unique_email() -> String {
    format!("test-{}@test.com", Uuid::new_v4())
}

pub async fn create_test_user(pool: &PgPool, role: UserRole) -> TestUser {
    let email = generate_unique_email();
    let hashed = hash_password(PASSWORD).unwrap();
    let student_number = (role == UserRole::Student).then(|| format!("S-{}", Uuid::new_v4()));

    let id = sqlx::query_scalar(
        r#"INSERT INTO users (first_name, last_name, email, password, role, student_number)
           VALUES ('Test', $1, $2, $3, $4, $5)
           RETURNING id"#,
    )
    .bind(role.as_str())
    .bind(&email)
    .bind(hashed)
    .bind(role)
    .bind(student_number)
    .fetch_one(pool)
    .await
    .unwrap();

    TestUser { id, email, role }
}

pub async fn create_test_class(pool: &PgPool) -> Uuid {
    sqlx::query_scalar("INSERT INTO classes (name, grade) VALUES ($1, '10') RETURNING id")
        .bind(format!("10-{}", Uuid::new_v4()))
        .fetch_one(pool)
        .await
        .unwrap()
}

pub async fn create_test_subject(pool: &PgPool) -> Uuid {
    let code = Uuid::new_v4().simple().to_string()[..10].to_uppercase();
    sqlx::query_scalar("INSERT INTO subjects (name, code) VALUES ('Mathematics', $1) RETURNING id")
        .bind(code)
        .fetch_one(pool)
        .await
        .unwrap()
}

/// A Monday lesson from `start` to `end` (`HH:MM`).
pub async fn create_test_schedule(
    pool: &PgPool,
    class_id: Uuid,
    subject_id: Uuid,
    teacher_id: Uuid,
    start: &str,
    end: &str,
) -> Uuid {
    sqlx::query_scalar(
        r#"INSERT INTO schedules (class_id, subject_id, teacher_id, day_of_week, start_time, end_time)
           VALUES ($1, $2, $3, 'monday', $4::time, $5::time)
           RETURNING id"#,
    )
    .bind(class_id)
    .bind(subject_id)
    .bind(teacher_id)
    .bind(start)
    .bind(end)
    .fetch_one(pool)
    .await
    .unwrap()
}

pub async fn enroll(pool: &PgPool, class_id: Uuid, student_id: Uuid) {
    sqlx::query("INSERT INTO class_enrollments (class_id, student_id) VALUES ($1, $2)")
        .bind(class_id)
        .bind(student_id)
        .execute(pool)
        .await
        .unwrap();
}

/// A class taught by `teacher` on Mondays 08:00-09:00 with `student` enrolled.
/// Returns `(class_id, schedule_id)`.
pub async fn create_lesson(pool: &PgPool, teacher: &TestUser, student: &TestUser) -> (Uuid, Uuid) {
    let class_id = create_test_class(pool).await;
    let subject_id = create_test_subject(pool).await;
    let schedule_id =
        create_test_schedule(pool, class_id, subject_id, teacher.id, "08:00", "09:00").await;
    enroll(pool, class_id, student.id).await;
    (class_id, schedule_id)
}

pub async fn get_auth_token(app: axum::Router, email: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": email, "password": PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    body["access_token"].as_str().unwrap().to_string()
}

/// Logs `user` in against a fresh app built on `pool`.
pub async fn login(pool: &PgPool, user: &TestUser) -> String {
    get_auth_token(setup_test_app(pool.clone()), &user.email).await
}

/// Sends a JSON request and decodes the JSON response (`Null` when empty).
pub async fn send(
    app: axum::Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}
