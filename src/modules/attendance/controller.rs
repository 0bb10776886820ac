use axum::{
    Json,
    extract::{Query, State},
};
use tracing::instrument;

use rollcall_core::AppError;

use crate::middleware::auth::AuthUser;
use crate::middleware::role::RequireStaff;
use crate::modules::attendance::model::{
    AttendanceFilterParams, AttendanceReport, PaginatedAttendanceResponse, RecordAttendanceDto,
    RecordAttendanceResponse, ReportParams, RosterQuery, RosterResponse,
};
use crate::modules::attendance::service::AttendanceService;
use crate::state::AppState;
use crate::validator::ValidatedJson;

#[utoipa::path(
    post,
    path = "/api/attendance",
    request_body = RecordAttendanceDto,
    responses(
        (status = 200, description = "Per-entry outcome of the batch", body = RecordAttendanceResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Not the teacher of this schedule"),
        (status = 404, description = "Schedule not found"),
        (status = 422, description = "Validation error")
    ),
    tag = "Attendance",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn record_attendance(
    State(state): State<AppState>,
    RequireStaff(auth_user): RequireStaff,
    ValidatedJson(dto): ValidatedJson<RecordAttendanceDto>,
) -> Result<Json<RecordAttendanceResponse>, AppError> {
    let response = AttendanceService::record_attendance(
        &state.db,
        auth_user.scope(),
        auth_user.user_id(),
        dto,
    )
    .await?;
    Ok(Json(response))
}

#[utoipa::path(
    get,
    path = "/api/attendance/roster",
    params(RosterQuery),
    responses(
        (status = 200, description = "Enrolled students with their status for the date", body = RosterResponse),
        (status = 403, description = "Not the teacher of this schedule"),
        (status = 404, description = "Schedule not found")
    ),
    tag = "Attendance",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn get_roster(
    State(state): State<AppState>,
    RequireStaff(auth_user): RequireStaff,
    Query(query): Query<RosterQuery>,
) -> Result<Json<RosterResponse>, AppError> {
    let roster = AttendanceService::get_roster(&state.db, auth_user.scope(), query).await?;
    Ok(Json(roster))
}

#[utoipa::path(
    get,
    path = "/api/attendance",
    params(AttendanceFilterParams),
    responses(
        (status = 200, description = "Attendance visible to the caller, newest first", body = PaginatedAttendanceResponse),
        (status = 401, description = "Unauthorized")
    ),
    tag = "Attendance",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn get_attendance(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(filters): Query<AttendanceFilterParams>,
) -> Result<Json<PaginatedAttendanceResponse>, AppError> {
    let records = AttendanceService::get_attendance(&state.db, auth_user.scope(), filters).await?;
    Ok(Json(records))
}

#[utoipa::path(
    get,
    path = "/api/attendance/report",
    params(ReportParams),
    responses(
        (status = 200, description = "Status counts over the range", body = AttendanceReport),
        (status = 403, description = "Class or student outside the teacher's classes"),
        (status = 404, description = "Class or student not found"),
        (status = 422, description = "date_to before date_from")
    ),
    tag = "Attendance",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn get_report(
    State(state): State<AppState>,
    RequireStaff(auth_user): RequireStaff,
    Query(params): Query<ReportParams>,
) -> Result<Json<AttendanceReport>, AppError> {
    let report = AttendanceService::get_report(&state.db, auth_user.scope(), params).await?;
    Ok(Json(report))
}
