use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use tracing::instrument;
use uuid::Uuid;

use rollcall_core::AppError;
use rollcall_models::{ClassId, UserId};

use crate::modules::classes::model::{
    BulkEnrollResponse, ClassDetail, ClassFilterParams, CreateClassDto, EnrollStudentsDto,
    EnrolledStudent, PaginatedClassesResponse, SchoolClass, UpdateClassDto,
};
use crate::modules::classes::service::ClassService;
use crate::state::AppState;
use crate::validator::ValidatedJson;

#[utoipa::path(
    post,
    path = "/api/classes",
    request_body = CreateClassDto,
    responses(
        (status = 201, description = "Class created", body = SchoolClass),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only"),
        (status = 409, description = "Class name already exists"),
        (status = 422, description = "Validation error")
    ),
    tag = "Classes",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn create_class(
    State(state): State<AppState>,
    ValidatedJson(dto): ValidatedJson<CreateClassDto>,
) -> Result<(StatusCode, Json<SchoolClass>), AppError> {
    let class = ClassService::create_class(&state.db, dto).await?;
    Ok((StatusCode::CREATED, Json(class)))
}

#[utoipa::path(
    get,
    path = "/api/classes",
    params(ClassFilterParams),
    responses(
        (status = 200, description = "Classes with active student counts", body = PaginatedClassesResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only")
    ),
    tag = "Classes",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn get_classes(
    State(state): State<AppState>,
    Query(filters): Query<ClassFilterParams>,
) -> Result<Json<PaginatedClassesResponse>, AppError> {
    let classes = ClassService::get_classes(&state.db, filters).await?;
    Ok(Json(classes))
}

#[utoipa::path(
    get,
    path = "/api/classes/{id}",
    params(("id" = Uuid, Path, description = "Class ID")),
    responses(
        (status = 200, description = "Class with active students and schedules", body = ClassDetail),
        (status = 404, description = "Class not found")
    ),
    tag = "Classes",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn get_class_by_id(
    State(state): State<AppState>,
    Path(id): Path<ClassId>,
) -> Result<Json<ClassDetail>, AppError> {
    let class = ClassService::get_class_by_id(&state.db, id).await?;
    Ok(Json(class))
}

#[utoipa::path(
    put,
    path = "/api/classes/{id}",
    params(("id" = Uuid, Path, description = "Class ID")),
    request_body = UpdateClassDto,
    responses(
        (status = 200, description = "Class updated", body = SchoolClass),
        (status = 404, description = "Class not found"),
        (status = 409, description = "Class name already exists"),
        (status = 422, description = "Validation error or non-student in student_ids")
    ),
    tag = "Classes",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn update_class(
    State(state): State<AppState>,
    Path(id): Path<ClassId>,
    ValidatedJson(dto): ValidatedJson<UpdateClassDto>,
) -> Result<Json<SchoolClass>, AppError> {
    let class = ClassService::update_class(&state.db, id, dto).await?;
    Ok(Json(class))
}

#[utoipa::path(
    delete,
    path = "/api/classes/{id}",
    params(("id" = Uuid, Path, description = "Class ID")),
    responses(
        (status = 204, description = "Class deleted"),
        (status = 404, description = "Class not found"),
        (status = 409, description = "Class still has enrolled students or schedules")
    ),
    tag = "Classes",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn delete_class(
    State(state): State<AppState>,
    Path(id): Path<ClassId>,
) -> Result<StatusCode, AppError> {
    ClassService::delete_class(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/api/classes/{id}/students",
    params(("id" = Uuid, Path, description = "Class ID")),
    responses(
        (status = 200, description = "All enrollments, active first", body = Vec<EnrolledStudent>),
        (status = 404, description = "Class not found")
    ),
    tag = "Classes",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn get_students_in_class(
    State(state): State<AppState>,
    Path(id): Path<ClassId>,
) -> Result<Json<Vec<EnrolledStudent>>, AppError> {
    let students = ClassService::get_students_in_class(&state.db, id).await?;
    Ok(Json(students))
}

#[utoipa::path(
    post,
    path = "/api/classes/{id}/students",
    params(("id" = Uuid, Path, description = "Class ID")),
    request_body = EnrollStudentsDto,
    responses(
        (status = 200, description = "Enrollment result", body = BulkEnrollResponse),
        (status = 404, description = "Class not found"),
        (status = 422, description = "Validation error")
    ),
    tag = "Classes",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn enroll_students(
    State(state): State<AppState>,
    Path(id): Path<ClassId>,
    ValidatedJson(dto): ValidatedJson<EnrollStudentsDto>,
) -> Result<Json<BulkEnrollResponse>, AppError> {
    let response = ClassService::enroll_students(&state.db, id, dto).await?;
    Ok(Json(response))
}

#[utoipa::path(
    delete,
    path = "/api/classes/{id}/students/{student_id}",
    params(
        ("id" = Uuid, Path, description = "Class ID"),
        ("student_id" = Uuid, Path, description = "Student ID")
    ),
    responses(
        (status = 204, description = "Enrollment deactivated"),
        (status = 404, description = "Student is not enrolled in this class")
    ),
    tag = "Classes",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn unenroll_student(
    State(state): State<AppState>,
    Path((id, student_id)): Path<(ClassId, UserId)>,
) -> Result<StatusCode, AppError> {
    ClassService::unenroll_student(&state.db, id, student_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
