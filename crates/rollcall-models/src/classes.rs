//! Classes and the class-student enrollment relation.

use chrono::{DateTime, NaiveDate, Utc};
use rollcall_core::pagination::{PaginationMeta, PaginationParams};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::ids::{ClassId, EnrollmentId, UserId};
use crate::schedules::ScheduleView;

pub const CLASS_COLUMNS: &str =
    "id, name, grade, description, is_active, created_at, updated_at";

/// A teaching group, e.g. "10-A".
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct SchoolClass {
    pub id: ClassId,
    pub name: String,
    pub grade: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ClassWithStats {
    pub id: ClassId,
    pub name: String,
    pub grade: String,
    pub description: Option<String>,
    pub is_active: bool,
    /// Students with an active enrollment
    pub student_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateClassDto {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1, max = 10))]
    pub grade: String,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateClassDto {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 10))]
    pub grade: Option<String>,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    pub is_active: Option<bool>,
    /// Replaces the set of actively enrolled students when present
    pub student_ids: Option<Vec<UserId>>,
}

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ClassFilterParams {
    /// Matches class name or grade
    pub search: Option<String>,
    pub grade: Option<String>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaginatedClassesResponse {
    pub data: Vec<ClassWithStats>,
    pub meta: PaginationMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct EnrolledStudent {
    pub enrollment_id: EnrollmentId,
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub student_number: Option<String>,
    pub enrolled_at: NaiveDate,
    pub is_active: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ClassDetail {
    #[serde(flatten)]
    pub class: ClassWithStats,
    pub students: Vec<EnrolledStudent>,
    pub schedules: Vec<ScheduleView>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct EnrollStudentsDto {
    #[validate(length(min = 1, message = "At least one student is required"))]
    pub student_ids: Vec<UserId>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BulkEnrollResponse {
    pub enrolled_count: usize,
    /// Ids that do not belong to a student account
    pub failed_ids: Vec<UserId>,
}
