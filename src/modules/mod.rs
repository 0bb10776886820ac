pub mod attendance;
pub mod auth;
pub mod classes;
pub mod dashboard;
pub mod leave_requests;
pub mod schedules;
pub mod subjects;
pub mod users;
