use anyhow::anyhow;
use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::StatusCode,
};
use serde::de::DeserializeOwned;
use validator::Validate;

use rollcall_core::AppError;

/// `Json<T>` that also runs `T::validate`, rejecting with 422 and
/// per-field details.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

impl<T, S> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(json_rejection_to_error)?;

        value
            .validate()
            .map_err(|errors| AppError::validation(&errors))?;

        Ok(ValidatedJson(value))
    }
}

fn json_rejection_to_error(rejection: JsonRejection) -> AppError {
    let error_msg = rejection.body_text();

    if error_msg.contains("missing field") {
        let field = error_msg
            .split("missing field `")
            .nth(1)
            .and_then(|s| s.split('`').next())
            .unwrap_or("unknown");
        return AppError::field(field, format!("{} is required", field));
    }

    if matches!(rejection, JsonRejection::MissingJsonContentType(_)) {
        return AppError::new(
            StatusCode::BAD_REQUEST,
            anyhow!("Missing 'Content-Type: application/json' header"),
        );
    }

    if matches!(rejection, JsonRejection::JsonDataError(_)) {
        return AppError::unprocessable(anyhow!("Invalid request body: {}", error_msg));
    }

    AppError::new(StatusCode::BAD_REQUEST, anyhow!("Invalid request body"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, Validate)]
    struct Payload {
        #[validate(length(min = 3, message = "Name is too short"))]
        name: String,
    }

    fn json_request(body: &str) -> Request {
        Request::builder()
            .method("POST")
            .uri("/")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_valid_payload_passes() {
        let ValidatedJson(payload) =
            ValidatedJson::<Payload>::from_request(json_request(r#"{"name":"Ada"}"#), &())
                .await
                .unwrap();
        assert_eq!(payload.name, "Ada");
    }

    #[tokio::test]
    async fn test_validation_failure_is_422_with_details() {
        let err = ValidatedJson::<Payload>::from_request(json_request(r#"{"name":"A"}"#), &())
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.details.unwrap().get("name").unwrap(), "Name is too short");
    }

    #[tokio::test]
    async fn test_missing_field_names_the_field() {
        let err = ValidatedJson::<Payload>::from_request(json_request("{}"), &())
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(err.details.unwrap().contains_key("name"));
    }
}
