use chrono::{DateTime, Utc};
use rollcall_core::pagination::{PaginationMeta, PaginationParams};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::ids::SubjectId;
use crate::schedules::ScheduleView;

pub const SUBJECT_COLUMNS: &str = "id, name, code, description, is_active, created_at, updated_at";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Subject {
    pub id: SubjectId,
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct SubjectWithStats {
    pub id: SubjectId,
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub schedule_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateSubjectDto {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(length(min = 1, max = 10, message = "Code must be 1-10 characters"))]
    pub code: String,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateSubjectDto {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 10, message = "Code must be 1-10 characters"))]
    pub code: Option<String>,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SubjectFilterParams {
    /// Matches subject name or code
    pub search: Option<String>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaginatedSubjectsResponse {
    pub data: Vec<SubjectWithStats>,
    pub meta: PaginationMeta,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SubjectDetail {
    #[serde(flatten)]
    pub subject: SubjectWithStats,
    pub schedules: Vec<ScheduleView>,
}
