use axum::{
    Router,
    routing::{delete, get, post},
};

use crate::state::AppState;

use super::controller::{
    create_class, delete_class, enroll_students, get_class_by_id, get_classes,
    get_students_in_class, unenroll_student, update_class,
};

pub fn init_classes_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_class).get(get_classes))
        .route(
            "/{id}",
            get(get_class_by_id).put(update_class).delete(delete_class),
        )
        .route(
            "/{id}/students",
            post(enroll_students).get(get_students_in_class),
        )
        .route("/{id}/students/{student_id}", delete(unenroll_student))
}
