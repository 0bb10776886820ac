//! Authentication and role checks.
//!
//! 1. Client sends `Authorization: Bearer <token>`
//! 2. [`auth::AuthUser`] verifies the JWT and exposes the caller's id, role
//!    and [`Scope`](rollcall_models::Scope)
//! 3. Role extractors or the `require_*` layers reject callers without an
//!    allowed role with 403
//!
//! ```ignore
//! use crate::middleware::role::RequireStaff;
//!
//! async fn record(RequireStaff(auth_user): RequireStaff) -> impl IntoResponse {
//!     let scope = auth_user.scope();
//!     // ...
//! }
//! ```

pub mod auth;
pub mod role;
