use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};

use rollcall_auth::{Claims, verify_token};
use rollcall_core::AppError;
use rollcall_models::{Scope, UserId, UserRole};

use crate::state::AppState;

/// Extractor that validates the bearer JWT. This is the only place the
/// caller's identity enters the application; handlers pass it on explicitly.
#[derive(Debug, Clone)]
pub struct AuthUser(pub Claims);

impl AuthUser {
    pub fn user_id(&self) -> UserId {
        self.0.sub
    }

    pub fn role(&self) -> UserRole {
        self.0.role
    }

    pub fn email(&self) -> &str {
        &self.0.email
    }

    /// The row visibility this caller is entitled to.
    pub fn scope(&self) -> Scope {
        Scope::from_role(self.0.role, self.0.sub)
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::unauthorized("Missing authorization header".to_string()))?;

        let token = auth_header.strip_prefix("Bearer ").ok_or_else(|| {
            AppError::unauthorized("Invalid authorization header format".to_string())
        })?;

        let claims = verify_token(token, &state.jwt_config)?;

        Ok(AuthUser(claims))
    }
}
