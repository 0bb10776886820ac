use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

use super::controller::{
    create_subject, delete_subject, get_subject_by_id, get_subjects, update_subject,
};

pub fn init_subjects_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_subject).get(get_subjects))
        .route(
            "/{id}",
            get(get_subject_by_id)
                .put(update_subject)
                .delete(delete_subject),
        )
}
