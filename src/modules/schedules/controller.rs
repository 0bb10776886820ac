use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use tracing::instrument;
use uuid::Uuid;

use rollcall_core::AppError;
use rollcall_models::ScheduleId;

use crate::middleware::auth::AuthUser;
use crate::middleware::role::RequireAdmin;
use crate::modules::schedules::model::{
    CreateScheduleDto, PaginatedSchedulesResponse, ScheduleDetail, ScheduleFilterParams,
    ScheduleView, UpdateScheduleDto,
};
use crate::modules::schedules::service::ScheduleService;
use crate::state::AppState;
use crate::validator::ValidatedJson;

#[utoipa::path(
    post,
    path = "/api/schedules",
    request_body = CreateScheduleDto,
    responses(
        (status = 201, description = "Schedule created", body = ScheduleView),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Admin only"),
        (status = 422, description = "Validation error, unknown reference, or the teacher is already booked")
    ),
    tag = "Schedules",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn create_schedule(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    ValidatedJson(dto): ValidatedJson<CreateScheduleDto>,
) -> Result<(StatusCode, Json<ScheduleView>), AppError> {
    let schedule = ScheduleService::create_schedule(&state.db, dto).await?;
    Ok((StatusCode::CREATED, Json(schedule)))
}

#[utoipa::path(
    get,
    path = "/api/schedules",
    params(ScheduleFilterParams),
    responses(
        (status = 200, description = "Schedules visible to the caller, by day and start time", body = PaginatedSchedulesResponse),
        (status = 401, description = "Unauthorized")
    ),
    tag = "Schedules",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn get_schedules(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Query(filters): Query<ScheduleFilterParams>,
) -> Result<Json<PaginatedSchedulesResponse>, AppError> {
    let schedules = ScheduleService::get_schedules(&state.db, auth_user.scope(), filters).await?;
    Ok(Json(schedules))
}

#[utoipa::path(
    get,
    path = "/api/schedules/{id}",
    params(("id" = Uuid, Path, description = "Schedule ID")),
    responses(
        (status = 200, description = "Schedule with enrolled students", body = ScheduleDetail),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Schedule not found or not visible")
    ),
    tag = "Schedules",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn get_schedule_by_id(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<ScheduleId>,
) -> Result<Json<ScheduleDetail>, AppError> {
    let schedule = ScheduleService::get_schedule_by_id(&state.db, auth_user.scope(), id).await?;
    Ok(Json(schedule))
}

#[utoipa::path(
    put,
    path = "/api/schedules/{id}",
    params(("id" = Uuid, Path, description = "Schedule ID")),
    request_body = UpdateScheduleDto,
    responses(
        (status = 200, description = "Schedule updated", body = ScheduleView),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Schedule not found"),
        (status = 422, description = "Validation error, unknown reference, or the teacher is already booked")
    ),
    tag = "Schedules",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn update_schedule(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<ScheduleId>,
    ValidatedJson(dto): ValidatedJson<UpdateScheduleDto>,
) -> Result<Json<ScheduleView>, AppError> {
    let schedule = ScheduleService::update_schedule(&state.db, id, dto).await?;
    Ok(Json(schedule))
}

#[utoipa::path(
    delete,
    path = "/api/schedules/{id}",
    params(("id" = Uuid, Path, description = "Schedule ID")),
    responses(
        (status = 204, description = "Schedule and its attendance deleted"),
        (status = 403, description = "Admin only"),
        (status = 404, description = "Schedule not found")
    ),
    tag = "Schedules",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn delete_schedule(
    State(state): State<AppState>,
    RequireAdmin(_admin): RequireAdmin,
    Path(id): Path<ScheduleId>,
) -> Result<StatusCode, AppError> {
    ScheduleService::delete_schedule(&state.db, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
