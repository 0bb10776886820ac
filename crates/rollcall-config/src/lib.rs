//! # Rollcall Config
//!
//! Configuration structures loaded from environment variables:
//!
//! - [`jwt`]: token signing secret and lifetimes
//! - [`cors`]: allowed browser origins
//! - [`storage`]: upload directory and evidence size limit
//! - [`server`]: bind address, metrics port, request timeout
//!
//! ```ignore
//! use rollcall_config::{CorsConfig, JwtConfig, ServerConfig, StorageConfig};
//!
//! let jwt_config = JwtConfig::from_env();
//! let server_config = ServerConfig::from_env();
//! ```

pub mod cors;
pub mod jwt;
pub mod server;
pub mod storage;

pub use cors::CorsConfig;
pub use jwt::JwtConfig;
pub use server::ServerConfig;
pub use storage::StorageConfig;
