//! Application error type with HTTP response conversion.
//!
//! Every handler and service returns [`AppError`]. The status code picks the
//! error kind (403 authorization, 404 not found, 409 conflict, 422
//! validation); `details` optionally carries field-level messages so clients
//! can attach them to form inputs.

use std::collections::BTreeMap;

use anyhow::{Error, anyhow};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use validator::{ValidationErrors, ValidationErrorsKind};

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub error: Error,
    pub details: Option<BTreeMap<String, String>>,
}

impl AppError {
    pub fn new<E>(status: StatusCode, err: E) -> Self
    where
        E: Into<Error>,
    {
        Self {
            status,
            error: err.into(),
            details: None,
        }
    }

    pub fn internal<E>(err: E) -> Self
    where
        E: Into<Error>,
    {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, err)
    }

    pub fn not_found<E>(err: E) -> Self
    where
        E: Into<Error>,
    {
        Self::new(StatusCode::NOT_FOUND, err)
    }

    pub fn unprocessable<E>(err: E) -> Self
    where
        E: Into<Error>,
    {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, err)
    }

    pub fn bad_request<E>(err: E) -> Self
    where
        E: Into<Error>,
    {
        Self::new(StatusCode::BAD_REQUEST, err)
    }

    pub fn conflict<E>(err: E) -> Self
    where
        E: Into<Error>,
    {
        Self::new(StatusCode::CONFLICT, err)
    }

    pub fn database<E>(err: E) -> Self
    where
        E: Into<Error>,
    {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, err)
    }

    pub fn forbidden(message: String) -> Self {
        Self::new(StatusCode::FORBIDDEN, anyhow!(message))
    }

    pub fn unauthorized(message: String) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, anyhow!(message))
    }

    pub fn internal_error(message: String) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, anyhow!(message))
    }

    /// A 422 tied to a single input field.
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        Self::unprocessable(anyhow!(message.clone())).with_detail(field, message)
    }

    /// Converts `validator` output into a 422 carrying one message per field.
    /// Nested list errors are keyed by path, e.g. `attendance[1].notes`.
    pub fn validation(errors: &ValidationErrors) -> Self {
        let mut details = BTreeMap::new();
        collect_messages("", errors, &mut details);

        let summary = details.values().cloned().collect::<Vec<_>>().join(", ");
        let summary = if summary.is_empty() {
            "Validation failed".to_string()
        } else {
            summary
        };

        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            error: anyhow!(summary),
            details: if details.is_empty() {
                None
            } else {
                Some(details)
            },
        }
    }

    pub fn with_detail(mut self, field: &str, message: impl Into<String>) -> Self {
        self.details
            .get_or_insert_with(BTreeMap::new)
            .insert(field.to_string(), message.into());
        self
    }
}

fn collect_messages(prefix: &str, errors: &ValidationErrors, out: &mut BTreeMap<String, String>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", prefix, field)
        };
        match kind {
            ValidationErrorsKind::Field(errs) => {
                let message = errs
                    .iter()
                    .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
                    .unwrap_or_else(|| format!("{} is invalid", field));
                out.insert(path, message);
            }
            ValidationErrorsKind::Struct(nested) => collect_messages(&path, nested, out),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    collect_messages(&format!("{}[{}]", path, index), nested, out);
                }
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(error = ?self.error, status = %self.status, "Request failed");
        }

        let body = match self.details {
            Some(details) => json!({
                "error": self.error.to_string(),
                "details": details,
            }),
            None => json!({
                "error": self.error.to_string()
            }),
        };

        (self.status, Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<Error>,
{
    fn from(err: E) -> Self {
        AppError::internal(err)
    }
}
