use axum::{Json, extract::State};
use tracing::instrument;

use rollcall_core::AppError;

use crate::middleware::auth::AuthUser;
use crate::modules::dashboard::model::DashboardResponse;
use crate::modules::dashboard::service::DashboardService;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/api/dashboard",
    responses(
        (status = 200, description = "Role-specific dashboard, tagged by `role`", body = DashboardResponse),
        (status = 401, description = "Unauthorized")
    ),
    tag = "Dashboard",
    security(("bearer_auth" = []))
)]
#[instrument(skip(state))]
pub async fn get_dashboard(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<DashboardResponse>, AppError> {
    let dashboard = DashboardService::get_dashboard(&state.db, auth_user.scope()).await?;
    Ok(Json(dashboard))
}
