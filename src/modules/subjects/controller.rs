use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use tracing::instrument;
use uuid::Uuid;

use rollcall_core::AppError;
use rollcall_models::SubjectId;

use crate::modules::subjects::model::{
    CreateSubjectDto, PaginatedSubjectsResponse, Subject, SubjectDetail, SubjectFilterParams,
    UpdateSubjectDto,
};
use crate::modules::subjects::service::SubjectService;
use crate::state::AppState;
use crate::validator::ValidatedJson;

#[utoipa::path(
    post,
    path = "/api/subjects",
    request_body = CreateSubjectDto,
    responses(
        (status = 201, description = "Subject created", body = Subject),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only"),
        (status = 409, description = "Subject code already exists"),
        (status = 422, description = "Validation error")
    ),
    tag = "Subjects",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn create_subject(
    State(state): State<AppState>,
    ValidatedJson(dto): ValidatedJson<CreateSubjectDto>,
) -> Result<(StatusCode, Json<Subject>), AppError> {
    let subject = SubjectService::create_subject(&state.db, dto).await?;
    Ok((StatusCode::CREATED, Json(subject)))
}

#[utoipa::path(
    get,
    path = "/api/subjects",
    params(SubjectFilterParams),
    responses(
        (status = 200, description = "Subjects with active schedule counts", body = PaginatedSubjectsResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only")
    ),
    tag = "Subjects",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn get_subjects(
    State(state): State<AppState>,
    Query(filters): Query<SubjectFilterParams>,
) -> Result<Json<PaginatedSubjectsResponse>, AppError> {
    let subjects = SubjectService::get_subjects(&state.db, filters).await?;
    Ok(Json(subjects))
}

#[utoipa::path(
    get,
    path = "/api/subjects/{id}",
    params(("id" = Uuid, Path, description = "Subject ID")),
    responses(
        (status = 200, description = "Subject with its schedules", body = SubjectDetail),
        (status = 404, description = "Subject not found")
    ),
    tag = "Subjects",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn get_subject_by_id(
    State(state): State<AppState>,
    Path(id): Path<SubjectId>,
) -> Result<Json<SubjectDetail>, AppError> {
    let subject = SubjectService::get_subject_by_id(&state.db, id).await?;
    Ok(Json(subject))
}

#[utoipa::path(
    put,
    path = "/api/subjects/{id}",
    params(("id" = Uuid, Path, description = "Subject ID")),
    request_body = UpdateSubjectDto,
    responses(
        (status = 200, description = "Subject updated", body = Subject),
        (status = 404, description = "Subject not found"),
        (status = 409, description = "Subject code already exists")
    ),
    tag = "Subjects",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn update_subject(
    State(state): State<AppState>,
    Path(id): Path<SubjectId>,
    ValidatedJson(dto): ValidatedJson<UpdateSubjectDto>,
) -> Result<Json<Subject>, AppError> {
    let subject = SubjectService::update_subject(&state.db, id, dto).await?;
    Ok(Json(subject))
}

#[utoipa::path(
    delete,
    path = "/api/subjects/{id}",
    params(("id" = Uuid, Path, description = "Subject ID")),
    responses(
        (status = 204, description = "Subject deleted"),
        (status = 404, description = "Subject not found"),
        (status = 409, description = "Subject still has active schedules")
    ),
    tag = "Subjects",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn delete_subject(
    State(state): State<AppState>,
    Path(id): Path<SubjectId>,
) -> Result<StatusCode, AppError> {
    SubjectService::delete_subject(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
