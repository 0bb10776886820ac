//! # Rollcall CLI
//!
//! Administrative commands and demo-data seeding for Rollcall.
//!
//! ```ignore
//! use rollcall_cli::seeder::{seed_all, SeedConfig};
//!
//! seed_all(&pool, SeedConfig::default()).await?;
//! ```

pub mod admin;
pub mod seeder;
