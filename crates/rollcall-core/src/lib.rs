//! # Rollcall Core
//!
//! Foundational types shared by every Rollcall crate:
//!
//! - [`errors`]: the [`AppError`] type and its HTTP response conversion
//! - [`pagination`]: limit/offset/page query parameters and response metadata
//! - [`file_storage`]: storage backend trait for uploaded evidence files
//! - [`password`]: bcrypt hashing and verification
//! - [`serde`]: query-string deserialization helpers
//!
//! # Example
//!
//! ```ignore
//! use rollcall_core::{AppError, PaginationParams, hash_password};
//!
//! let error = AppError::not_found(anyhow::anyhow!("Class not found"));
//! let hash = hash_password("secure_password")?;
//! let limit = PaginationParams::default().limit();
//! ```

pub mod errors;
pub mod file_storage;
pub mod pagination;
pub mod password;
pub mod serde;

pub use errors::AppError;
pub use file_storage::{FileStorage, LocalFileStorage, StorageError};
pub use pagination::{PaginationMeta, PaginationParams};
pub use password::{hash_password, verify_password};
