//! # Rollcall Models
//!
//! Domain entities, DTOs and pure domain rules for the Rollcall API.
//!
//! # Modules
//!
//! - [`ids`]: typed UUID wrappers
//! - [`users`]: accounts and roles
//! - [`classes`], [`subjects`]: academic structure and enrollment
//! - [`schedules`]: weekly slots and the teacher-overlap rule
//! - [`attendance`]: the per-lesson attendance ledger
//! - [`leave_requests`]: the leave approval state machine
//! - [`dashboard`]: per-role rollups
//! - [`scope`]: role-scoped query restrictions
//!
//! ```ignore
//! use rollcall_models::schedules::{TimeSlot, find_conflict};
//!
//! let candidate = TimeSlot::new(start, end)?;
//! if let Some(id) = find_conflict(&candidate, &existing, None) {
//!     // reject
//! }
//! ```

pub mod attendance;
pub mod auth;
pub mod classes;
pub mod dashboard;
pub mod ids;
pub mod leave_requests;
pub mod schedules;
pub mod scope;
pub mod subjects;
pub mod users;

pub use ids::{
    AttendanceId, ClassId, EnrollmentId, LeaveRequestId, ScheduleId, SubjectId, UserId,
};
pub use scope::Scope;
pub use users::{User, UserRole};
