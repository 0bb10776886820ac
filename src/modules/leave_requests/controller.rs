use axum::{
    Json,
    extract::{Multipart, Path, Query, State, multipart::MultipartError},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::NaiveDate;
use tracing::instrument;
use uuid::Uuid;

use rollcall_core::AppError;
use rollcall_models::LeaveRequestId;

use crate::middleware::auth::AuthUser;
use crate::middleware::role::{RequireStaff, RequireStudent};
use crate::modules::leave_requests::model::{
    EvidenceUpload, LeaveFilterParams, LeaveRequest, LeaveRequestView, LeaveType,
    PaginatedLeaveRequestsResponse, ReviewLeaveRequestDto, SubmitLeaveRequest,
    SubmitLeaveRequestForm,
};
use crate::modules::leave_requests::service::LeaveRequestService;
use crate::state::AppState;
use crate::validator::ValidatedJson;

fn multipart_error(err: MultipartError) -> AppError {
    AppError::new(err.status(), anyhow::anyhow!(err.body_text()))
}

fn required(field: &str, value: Option<String>) -> Result<String, AppError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::field(field, format!("{} is required", field)))
}

fn parse_date(field: &str, value: Option<String>) -> Result<NaiveDate, AppError> {
    let raw = required(field, value)?;
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::field(field, format!("{} must be a date (YYYY-MM-DD)", field)))
}

/// Reads the text fields and the optional file out of the submit form.
async fn read_submission(
    mut multipart: Multipart,
) -> Result<(SubmitLeaveRequest, Option<EvidenceUpload>), AppError> {
    let mut from_date = None;
    let mut to_date = None;
    let mut leave_type = None;
    let mut reason = None;
    let mut evidence = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "evidence_file" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let content = field.bytes().await.map_err(multipart_error)?;
                // browsers send an empty part when no file was picked
                if !filename.is_empty() || !content.is_empty() {
                    evidence = Some(EvidenceUpload {
                        filename,
                        content: content.to_vec(),
                    });
                }
            }
            "from_date" => from_date = Some(field.text().await.map_err(multipart_error)?),
            "to_date" => to_date = Some(field.text().await.map_err(multipart_error)?),
            "type" => leave_type = Some(field.text().await.map_err(multipart_error)?),
            "reason" => reason = Some(field.text().await.map_err(multipart_error)?),
            _ => {}
        }
    }

    let submission = SubmitLeaveRequest {
        from_date: parse_date("from_date", from_date)?,
        to_date: parse_date("to_date", to_date)?,
        leave_type: required("type", leave_type)?
            .parse::<LeaveType>()
            .map_err(|message| AppError::field("type", message))?,
        reason: required("reason", reason)?,
    };

    Ok((submission, evidence))
}

#[utoipa::path(
    post,
    path = "/api/leave-requests",
    request_body(content = SubmitLeaveRequestForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Leave request submitted", body = LeaveRequest),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Students only"),
        (status = 413, description = "Upload too large"),
        (status = 422, description = "Invalid dates, reason, or evidence file")
    ),
    tag = "Leave Requests",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state, multipart))]
pub async fn submit_leave_request(
    State(state): State<AppState>,
    RequireStudent(auth_user): RequireStudent,
    multipart: Multipart,
) -> Result<(StatusCode, Json<LeaveRequest>), AppError> {
    let (submission, evidence) = read_submission(multipart).await?;

    let request = LeaveRequestService::submit_leave_request(
        &state.db,
        state.storage.as_ref(),
        auth_user.user_id(),
        submission,
        evidence,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(request)))
}

#[utoipa::path(
    get,
    path = "/api/leave-requests",
    params(LeaveFilterParams),
    responses(
        (status = 200, description = "Leave requests visible to the caller, newest first", body = PaginatedLeaveRequestsResponse),
        (status = 401, description = "Unauthorized")
    ),
    tag = "Leave Requests",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn get_leave_requests(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(filters): Query<LeaveFilterParams>,
) -> Result<Json<PaginatedLeaveRequestsResponse>, AppError> {
    let requests =
        LeaveRequestService::get_leave_requests(&state.db, auth_user.scope(), filters).await?;
    Ok(Json(requests))
}

#[utoipa::path(
    get,
    path = "/api/leave-requests/{id}",
    params(("id" = Uuid, Path, description = "Leave request ID")),
    responses(
        (status = 200, description = "Leave request", body = LeaveRequestView),
        (status = 404, description = "Leave request not found or not visible")
    ),
    tag = "Leave Requests",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn get_leave_request_by_id(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<LeaveRequestId>,
) -> Result<Json<LeaveRequestView>, AppError> {
    let request =
        LeaveRequestService::get_leave_request_by_id(&state.db, auth_user.scope(), id).await?;
    Ok(Json(request))
}

#[utoipa::path(
    get,
    path = "/api/leave-requests/{id}/evidence",
    params(("id" = Uuid, Path, description = "Leave request ID")),
    responses(
        (status = 200, description = "The evidence file", content_type = "application/octet-stream"),
        (status = 404, description = "No request, or no evidence attached")
    ),
    tag = "Leave Requests",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn get_evidence(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<LeaveRequestId>,
) -> Result<Response, AppError> {
    let (content_type, content) = LeaveRequestService::get_evidence(
        &state.db,
        state.storage.as_ref(),
        auth_user.scope(),
        id,
    )
    .await?;

    Ok(([(header::CONTENT_TYPE, content_type)], content).into_response())
}

#[utoipa::path(
    put,
    path = "/api/leave-requests/{id}/review",
    params(("id" = Uuid, Path, description = "Leave request ID")),
    request_body = ReviewLeaveRequestDto,
    responses(
        (status = 200, description = "Leave request reviewed", body = LeaveRequest),
        (status = 403, description = "Student is not in one of the teacher's classes"),
        (status = 404, description = "Leave request not found"),
        (status = 409, description = "Leave request has already been reviewed")
    ),
    tag = "Leave Requests",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn review_leave_request(
    State(state): State<AppState>,
    RequireStaff(auth_user): RequireStaff,
    Path(id): Path<LeaveRequestId>,
    ValidatedJson(dto): ValidatedJson<ReviewLeaveRequestDto>,
) -> Result<Json<LeaveRequest>, AppError> {
    let request = LeaveRequestService::review_leave_request(
        &state.db,
        auth_user.scope(),
        auth_user.user_id(),
        id,
        dto,
    )
    .await?;
    Ok(Json(request))
}

#[utoipa::path(
    delete,
    path = "/api/leave-requests/{id}",
    params(("id" = Uuid, Path, description = "Leave request ID")),
    responses(
        (status = 204, description = "Leave request deleted"),
        (status = 403, description = "Not the owner, or no longer pending"),
        (status = 404, description = "Leave request not found")
    ),
    tag = "Leave Requests",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn delete_leave_request(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<LeaveRequestId>,
) -> Result<StatusCode, AppError> {
    LeaveRequestService::delete_leave_request(
        &state.db,
        state.storage.as_ref(),
        auth_user.scope(),
        id,
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}
