//! User accounts and their role.
//!
//! Every account has exactly one [`UserRole`]. Students may carry a
//! `student_number`; the column is unique but not restricted to students at
//! the storage level.

use std::fmt;

use chrono::{DateTime, Utc};
use rollcall_core::pagination::{PaginationMeta, PaginationParams};
use rollcall_core::serde::empty_string_as_none;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::classes::SchoolClass;
use crate::ids::{ClassId, UserId};
use crate::schedules::ScheduleView;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Teacher,
    Student,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Teacher => "teacher",
            UserRole::Student => "student",
        }
    }

    /// Admins and teachers.
    pub fn is_staff(&self) -> bool {
        matches!(self, UserRole::Admin | UserRole::Teacher)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column list matching [`User`], for `SELECT`/`RETURNING` clauses.
pub const USER_COLUMNS: &str =
    "id, first_name, last_name, email, role, student_number, phone, address, created_at, updated_at";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct User {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: UserRole,
    pub student_number: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Compact user reference embedded in other views.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct UserSummary {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub student_number: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUserDto {
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    #[validate(
        email(message = "Email must be a valid address"),
        length(max = 255, message = "Email must be at most 255 characters")
    )]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    pub role: UserRole,
    #[validate(length(min = 1, max = 50))]
    pub student_number: Option<String>,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    /// Classes to enroll a new student in. Ignored for staff.
    pub class_ids: Option<Vec<ClassId>>,
}

/// Partial update. `class_ids`, when present, replaces a student's active
/// enrollments.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateUserDto {
    #[validate(length(min = 1, max = 100))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub last_name: Option<String>,
    #[validate(
        email(message = "Email must be a valid address"),
        length(max = 255, message = "Email must be at most 255 characters")
    )]
    pub email: Option<String>,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: Option<String>,
    pub role: Option<UserRole>,
    #[validate(length(min = 1, max = 50))]
    pub student_number: Option<String>,
    #[validate(length(max = 20))]
    pub phone: Option<String>,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    pub class_ids: Option<Vec<ClassId>>,
}

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct UserFilterParams {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub role: Option<UserRole>,
    /// Matches name, email or student number (case-insensitive)
    pub search: Option<String>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaginatedUsersResponse {
    pub data: Vec<User>,
    pub meta: PaginationMeta,
}

/// A user with the academic relations relevant to their role.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserDetail {
    #[serde(flatten)]
    pub user: User,
    /// Active classes (students only)
    pub classes: Vec<SchoolClass>,
    /// Active teaching schedules (teachers only)
    pub schedules: Vec<ScheduleView>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&UserRole::Teacher).unwrap(), r#""teacher""#);
        let role: UserRole = serde_json::from_str(r#""admin""#).unwrap();
        assert_eq!(role, UserRole::Admin);
        assert!(serde_json::from_str::<UserRole>(r#""principal""#).is_err());
    }

    #[test]
    fn test_is_staff() {
        assert!(UserRole::Admin.is_staff());
        assert!(UserRole::Teacher.is_staff());
        assert!(!UserRole::Student.is_staff());
    }

    #[test]
    fn test_create_user_dto_validation() {
        let dto = CreateUserDto {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "not-an-email".to_string(),
            password: "short".to_string(),
            role: UserRole::Student,
            student_number: None,
            phone: None,
            address: None,
            class_ids: None,
        };
        let errors = dto.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
    }
}
