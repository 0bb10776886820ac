//! Leave requests and their approval state machine.
//!
//! ```text
//! pending ──review(approved)──▶ approved
//!    │
//!    └─────review(rejected)──▶ rejected
//! ```
//!
//! Approved and rejected are terminal. Only pending requests may be reviewed
//! by staff or withdrawn by their owner.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rollcall_core::pagination::{PaginationMeta, PaginationParams};
use rollcall_core::serde::empty_string_as_none;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::ids::{LeaveRequestId, UserId};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema,
)]
#[sqlx(type_name = "leave_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LeaveType {
    Sick,
    Family,
    Personal,
    Emergency,
}

impl FromStr for LeaveType {
    type Err = String;

    /// Parses the lowercase wire name, as sent in multipart forms.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "sick" => Ok(LeaveType::Sick),
            "family" => Ok(LeaveType::Family),
            "personal" => Ok(LeaveType::Personal),
            "emergency" => Ok(LeaveType::Emergency),
            other => Err(format!(
                "Unknown leave type '{}'. Expected sick, family, personal or emergency",
                other
            )),
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema,
)]
#[sqlx(type_name = "leave_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LeaveStatus {
    Pending,
    Approved,
    Rejected,
}

impl LeaveStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeaveStatus::Pending => "pending",
            LeaveStatus::Approved => "approved",
            LeaveStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, LeaveStatus::Pending)
    }

    /// The status a review moves this request to.
    pub fn review(self, decision: ReviewDecision) -> Result<LeaveStatus, AlreadyReviewed> {
        if self.is_terminal() {
            return Err(AlreadyReviewed(self));
        }
        Ok(decision.into())
    }
}

impl fmt::Display for LeaveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A review was attempted on a request that already left `pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlreadyReviewed(pub LeaveStatus);

impl fmt::Display for AlreadyReviewed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Leave request has already been {}", self.0)
    }
}

/// The outcome staff may choose; `pending` is not a valid review target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReviewDecision {
    Approved,
    Rejected,
}

impl From<ReviewDecision> for LeaveStatus {
    fn from(decision: ReviewDecision) -> Self {
        match decision {
            ReviewDecision::Approved => LeaveStatus::Approved,
            ReviewDecision::Rejected => LeaveStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct LeaveRequest {
    pub id: LeaveRequestId,
    pub student_id: UserId,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    #[serde(rename = "type")]
    pub leave_type: LeaveType,
    pub reason: String,
    /// Storage key of the uploaded evidence
    pub evidence_file: Option<String>,
    pub status: LeaveStatus,
    pub admin_notes: Option<String>,
    pub reviewed_by: Option<UserId>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const LEAVE_REQUEST_COLUMNS: &str = "id, student_id, from_date, to_date, leave_type, reason, \
     evidence_file, status, admin_notes, reviewed_by, reviewed_at, created_at, updated_at";

pub const LEAVE_REQUEST_VIEW_SELECT: &str = r#"SELECT
    lr.id, lr.student_id, st.first_name AS student_first_name,
    st.last_name AS student_last_name, st.student_number,
    lr.from_date, lr.to_date, lr.leave_type, lr.reason,
    (lr.evidence_file IS NOT NULL) AS has_evidence,
    lr.status, lr.admin_notes, lr.reviewed_by,
    (rv.first_name || ' ' || rv.last_name) AS reviewer_name,
    lr.reviewed_at, lr.created_at, lr.updated_at
  FROM leave_requests lr
  JOIN users st ON st.id = lr.student_id
  LEFT JOIN users rv ON rv.id = lr.reviewed_by"#;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct LeaveRequestView {
    pub id: LeaveRequestId,
    pub student_id: UserId,
    pub student_first_name: String,
    pub student_last_name: String,
    pub student_number: Option<String>,
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    #[serde(rename = "type")]
    pub leave_type: LeaveType,
    pub reason: String,
    pub has_evidence: bool,
    pub status: LeaveStatus,
    pub admin_notes: Option<String>,
    pub reviewed_by: Option<UserId>,
    pub reviewer_name: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Which date in a submission broke the range rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveDateError {
    FromDateInPast,
    ToDateBeforeFromDate,
}

impl LeaveDateError {
    pub fn field(&self) -> &'static str {
        match self {
            LeaveDateError::FromDateInPast => "from_date",
            LeaveDateError::ToDateBeforeFromDate => "to_date",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            LeaveDateError::FromDateInPast => "From date cannot be in the past",
            LeaveDateError::ToDateBeforeFromDate => "To date must be on or after the from date",
        }
    }
}

/// The text fields of a submission, parsed from the multipart form.
#[derive(Debug, Clone, Validate)]
pub struct SubmitLeaveRequest {
    pub from_date: NaiveDate,
    pub to_date: NaiveDate,
    pub leave_type: LeaveType,
    #[validate(length(min = 10, max = 1000, message = "Reason must be 10-1000 characters"))]
    pub reason: String,
}

impl SubmitLeaveRequest {
    /// Future leave only: `today <= from_date <= to_date`.
    pub fn check_dates(&self, today: NaiveDate) -> Result<(), LeaveDateError> {
        if self.to_date < self.from_date {
            return Err(LeaveDateError::ToDateBeforeFromDate);
        }
        if self.from_date < today {
            return Err(LeaveDateError::FromDateInPast);
        }
        Ok(())
    }
}

/// Multipart body accepted by the submit endpoint (documentation only).
#[derive(Debug, Deserialize, ToSchema)]
#[allow(dead_code)]
pub struct SubmitLeaveRequestForm {
    #[schema(example = "2024-02-01")]
    pub from_date: String,
    #[schema(example = "2024-02-02")]
    pub to_date: String,
    #[serde(rename = "type")]
    pub leave_type: LeaveType,
    pub reason: String,
    /// pdf, jpg, jpeg or png, at most 5 MiB
    #[schema(value_type = Option<String>, format = Binary)]
    pub evidence_file: Option<Vec<u8>>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ReviewLeaveRequestDto {
    pub status: ReviewDecision,
    #[validate(length(max = 1000, message = "Admin notes must be at most 1000 characters"))]
    pub admin_notes: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LeaveFilterParams {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub status: Option<LeaveStatus>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub student_id: Option<UserId>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaginatedLeaveRequestsResponse {
    pub data: Vec<LeaveRequestView>,
    pub meta: PaginationMeta,
}
