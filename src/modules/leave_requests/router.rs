use axum::{
    Router,
    routing::{get, post, put},
};

use crate::state::AppState;

use super::controller::{
    delete_leave_request, get_evidence, get_leave_request_by_id, get_leave_requests,
    review_leave_request, submit_leave_request,
};

pub fn init_leave_requests_router() -> Router<AppState> {
    Router::new()
        .route("/", post(submit_leave_request).get(get_leave_requests))
        .route(
            "/{id}",
            get(get_leave_request_by_id).delete(delete_leave_request),
        )
        .route("/{id}/evidence", get(get_evidence))
        .route("/{id}/review", put(review_leave_request))
}
