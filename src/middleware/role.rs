//! Role-based authorization.
//!
//! Two styles, as in the routers:
//! 1. The `require_admin` layer, applied with
//!    `middleware::from_fn_with_state` to whole routers
//! 2. Extractors (`RequireAdmin`, `RequireStaff`, `RequireStudent`) on
//!    single handlers, carrying the verified [`AuthUser`]

use axum::{
    extract::{FromRequestParts, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use rollcall_core::AppError;
use rollcall_models::UserRole;

use crate::middleware::auth::AuthUser;
use crate::state::AppState;

pub const STAFF_ROLES: &[UserRole] = &[UserRole::Admin, UserRole::Teacher];

/// Rejects the request unless the caller has one of `allowed_roles`.
pub async fn require_roles(
    State(state): State<AppState>,
    req: Request,
    next: Next,
    allowed_roles: &[UserRole],
) -> Result<Response, AppError> {
    let (mut parts, body) = req.into_parts();

    let auth_user = AuthUser::from_request_parts(&mut parts, &state).await?;
    check_any_role(&auth_user, allowed_roles)?;

    let req = Request::from_parts(parts, body);
    Ok(next.run(req).await)
}

pub async fn require_admin(State(state): State<AppState>, req: Request, next: Next) -> Response {
    match require_roles(State(state), req, next, &[UserRole::Admin]).await {
        Ok(response) => response,
        Err(err) => err.into_response(),
    }
}

/// Declares an extractor wrapping [`AuthUser`] that only admits the given roles.
macro_rules! require_role {
    ($name:ident, $roles:expr, $message:literal) => {
        #[derive(Debug, Clone)]
        pub struct $name(pub AuthUser);

        impl FromRequestParts<AppState> for $name {
            type Rejection = AppError;

            async fn from_request_parts(
                parts: &mut axum::http::request::Parts,
                state: &AppState,
            ) -> Result<Self, Self::Rejection> {
                let auth_user = AuthUser::from_request_parts(parts, state).await?;
                if !$roles.contains(&auth_user.role()) {
                    return Err(AppError::forbidden($message.to_string()));
                }
                Ok($name(auth_user))
            }
        }
    };
}

require_role!(
    RequireAdmin,
    [UserRole::Admin],
    "Access denied. Administrator privileges required."
);
require_role!(
    RequireStaff,
    STAFF_ROLES,
    "Access denied. Teacher or administrator privileges required."
);
require_role!(
    RequireStudent,
    [UserRole::Student],
    "Access denied. Only students can perform this action."
);

pub fn check_any_role(auth_user: &AuthUser, allowed_roles: &[UserRole]) -> Result<(), AppError> {
    let user_role = auth_user.role();

    if !allowed_roles.contains(&user_role) {
        let allowed = allowed_roles
            .iter()
            .map(UserRole::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        return Err(AppError::forbidden(format!(
            "Access denied. Required roles: {}, but user has role: {}",
            allowed, user_role
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use rollcall_auth::Claims;
    use rollcall_models::UserId;

    fn auth_user(role: UserRole) -> AuthUser {
        AuthUser(Claims {
            sub: UserId::new(),
            email: "user@school.test".to_string(),
            role,
            exp: 0,
            iat: 0,
        })
    }

    #[test]
    fn test_check_any_role_admin_only() {
        assert!(check_any_role(&auth_user(UserRole::Admin), &[UserRole::Admin]).is_ok());
        let err = check_any_role(&auth_user(UserRole::Teacher), &[UserRole::Admin]).unwrap_err();
        assert_eq!(err.status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_check_any_role_staff() {
        assert!(check_any_role(&auth_user(UserRole::Admin), STAFF_ROLES).is_ok());
        assert!(check_any_role(&auth_user(UserRole::Teacher), STAFF_ROLES).is_ok());

        let err = check_any_role(&auth_user(UserRole::Student), STAFF_ROLES).unwrap_err();
        assert_eq!(
            err.error.to_string(),
            "Access denied. Required roles: admin, teacher, but user has role: student"
        );
    }

    #[test]
    fn test_scope_follows_role() {
        let student = auth_user(UserRole::Student);
        assert_eq!(
            student.scope(),
            rollcall_models::Scope::Student(student.user_id())
        );
        assert!(auth_user(UserRole::Admin).scope().is_admin());
    }
}
