//! # Rollcall Auth
//!
//! JWT claim types and token utilities.
//!
//! - **Access token** ([`Claims`]): short-lived, carries the user's role
//! - **Refresh token** ([`RefreshTokenClaims`]): long-lived, exchanged for a
//!   new access token

pub mod claims;
pub mod jwt;

pub use claims::{Claims, RefreshTokenClaims};
pub use jwt::{create_access_token, create_refresh_token, verify_refresh_token, verify_token};
