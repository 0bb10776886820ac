use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

use super::controller::{get_attendance, get_report, get_roster, record_attendance};

pub fn init_attendance_router() -> Router<AppState> {
    Router::new()
        .route("/", post(record_attendance).get(get_attendance))
        .route("/roster", get(get_roster))
        .route("/report", get(get_report))
}
