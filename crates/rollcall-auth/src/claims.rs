//! JWT claim structures.

use rollcall_models::{UserId, UserRole};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Access token claims.
///
/// The role is embedded so authorization needs no database lookup; it is
/// re-read from storage whenever a token is refreshed.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Claims {
    /// User ID (subject claim)
    pub sub: UserId,
    pub email: String,
    pub role: UserRole,
    /// Expiration (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// Refresh token claims. Carries no role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshTokenClaims {
    pub sub: UserId,
    pub email: String,
    pub exp: usize,
    pub iat: usize,
    /// Unique token id so two refresh tokens issued in the same second differ
    pub jti: String,
}
