//! Attendance ledger: one row per (student, schedule, date).

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rollcall_core::pagination::{PaginationMeta, PaginationParams};
use rollcall_core::serde::empty_string_as_none;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::ids::{AttendanceId, ClassId, ScheduleId, SubjectId, UserId};
use crate::schedules::{DayOfWeek, time_hm};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema,
)]
#[sqlx(type_name = "attendance_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    /// Assumed for students with no record yet
    Absent,
    Late,
    Excused,
}

impl AttendanceStatus {
    pub const ALL: [AttendanceStatus; 4] = [
        AttendanceStatus::Present,
        AttendanceStatus::Absent,
        AttendanceStatus::Late,
        AttendanceStatus::Excused,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Late => "late",
            AttendanceStatus::Excused => "excused",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct AttendanceRecord {
    pub id: AttendanceId,
    pub student_id: UserId,
    pub schedule_id: ScheduleId,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub notes: Option<String>,
    pub recorded_by: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const ATTENDANCE_VIEW_SELECT: &str = r#"SELECT
    a.id, a.date, a.status, a.notes,
    a.student_id, st.first_name AS student_first_name, st.last_name AS student_last_name,
    st.student_number,
    a.schedule_id, s.class_id, c.name AS class_name,
    s.subject_id, sub.name AS subject_name,
    s.day_of_week, s.start_time, s.end_time,
    a.recorded_by, (r.first_name || ' ' || r.last_name) AS recorded_by_name,
    a.created_at, a.updated_at
  FROM attendance a
  JOIN users st ON st.id = a.student_id
  JOIN schedules s ON s.id = a.schedule_id
  JOIN classes c ON c.id = s.class_id
  JOIN subjects sub ON sub.id = s.subject_id
  JOIN users r ON r.id = a.recorded_by"#;

/// An attendance row joined with its student, lesson and recorder.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct AttendanceView {
    pub id: AttendanceId,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub notes: Option<String>,
    pub student_id: UserId,
    pub student_first_name: String,
    pub student_last_name: String,
    pub student_number: Option<String>,
    pub schedule_id: ScheduleId,
    pub class_id: ClassId,
    pub class_name: String,
    pub subject_id: SubjectId,
    pub subject_name: String,
    pub day_of_week: DayOfWeek,
    #[serde(with = "time_hm")]
    #[schema(value_type = String, example = "08:00")]
    pub start_time: chrono::NaiveTime,
    #[serde(with = "time_hm")]
    #[schema(value_type = String, example = "09:00")]
    pub end_time: chrono::NaiveTime,
    pub recorded_by: UserId,
    pub recorded_by_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct AttendanceEntryDto {
    pub student_id: UserId,
    pub status: AttendanceStatus,
    #[validate(length(max = 500, message = "Notes must be at most 500 characters"))]
    pub notes: Option<String>,
}

/// A batch for one lesson on one date.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RecordAttendanceDto {
    pub schedule_id: ScheduleId,
    #[schema(example = "2024-01-10")]
    pub date: NaiveDate,
    #[validate(
        length(min = 1, message = "At least one attendance entry is required"),
        nested
    )]
    pub attendance: Vec<AttendanceEntryDto>,
}

/// Whether an upsert created the row or overwrote an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RecordOutcome {
    Inserted,
    Updated,
}

impl RecordOutcome {
    pub fn from_inserted(inserted: bool) -> Self {
        if inserted {
            RecordOutcome::Inserted
        } else {
            RecordOutcome::Updated
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordOutcome::Inserted => "inserted",
            RecordOutcome::Updated => "updated",
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FailedEntry {
    pub student_id: UserId,
    pub reason: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RecordAttendanceResponse {
    pub schedule_id: ScheduleId,
    pub date: NaiveDate,
    pub inserted: usize,
    pub updated: usize,
    pub failed: Vec<FailedEntry>,
}

impl RecordAttendanceResponse {
    pub fn new(schedule_id: ScheduleId, date: NaiveDate) -> Self {
        Self {
            schedule_id,
            date,
            inserted: 0,
            updated: 0,
            failed: Vec::new(),
        }
    }

    pub fn push(&mut self, outcome: RecordOutcome) {
        match outcome {
            RecordOutcome::Inserted => self.inserted += 1,
            RecordOutcome::Updated => self.updated += 1,
        }
    }

    pub fn fail(&mut self, student_id: UserId, reason: impl Into<String>) {
        self.failed.push(FailedEntry {
            student_id,
            reason: reason.into(),
        });
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RosterQuery {
    pub schedule_id: ScheduleId,
    /// Defaults to today (UTC)
    pub date: Option<NaiveDate>,
}

/// One expected student in the "take attendance" view.
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
pub struct RosterEntry {
    pub student_id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub student_number: Option<String>,
    pub status: AttendanceStatus,
    pub notes: Option<String>,
    /// False when `status` is the assumed absence
    pub recorded: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RosterResponse {
    pub schedule_id: ScheduleId,
    pub class_name: String,
    pub subject_name: String,
    pub date: NaiveDate,
    pub students: Vec<RosterEntry>,
}

#[derive(Debug, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AttendanceFilterParams {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub class_id: Option<ClassId>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub subject_id: Option<SubjectId>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub date_from: Option<NaiveDate>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub date_to: Option<NaiveDate>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub status: Option<AttendanceStatus>,
    /// Matches student name or number
    pub search: Option<String>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaginatedAttendanceResponse {
    pub data: Vec<AttendanceView>,
    pub meta: PaginationMeta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    /// One row per student of the class
    Class,
    /// One row per subject the student attended
    Student,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReportParams {
    #[serde(rename = "type")]
    pub report_type: ReportType,
    /// Class id or student id depending on `type`
    pub id: uuid::Uuid,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl ReportParams {
    /// The requested range, defaulting to the calendar month containing `today`.
    pub fn range(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        let (month_start, month_end) = month_bounds(today);
        (
            self.date_from.unwrap_or(month_start),
            self.date_to.unwrap_or(month_end),
        )
    }
}

/// First and last day of the month containing `day`.
pub fn month_bounds(day: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = day.with_day(1).unwrap_or(day);
    let next_month = if day.month() == 12 {
        NaiveDate::from_ymd_opt(day.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(day.year(), day.month() + 1, 1)
    };
    let end = next_month.and_then(|d| d.pred_opt()).unwrap_or(day);
    (start, end)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct StatusCounts {
    pub present: i64,
    pub absent: i64,
    pub late: i64,
    pub excused: i64,
    pub total: i64,
    /// Share of present + late over all records, 0-100 with one decimal
    pub attendance_rate: f64,
}

impl StatusCounts {
    pub fn from_pairs(pairs: impl IntoIterator<Item = (AttendanceStatus, i64)>) -> Self {
        let mut counts = StatusCounts::default();
        for (status, count) in pairs {
            counts.add(status, count);
        }
        counts
    }

    pub fn add(&mut self, status: AttendanceStatus, count: i64) {
        match status {
            AttendanceStatus::Present => self.present += count,
            AttendanceStatus::Absent => self.absent += count,
            AttendanceStatus::Late => self.late += count,
            AttendanceStatus::Excused => self.excused += count,
        }
        self.total += count;
        self.attendance_rate = if self.total == 0 {
            0.0
        } else {
            let rate = (self.present + self.late) as f64 * 100.0 / self.total as f64;
            (rate * 10.0).round() / 10.0
        };
    }
}

/// Grouped count row as returned by `GROUP BY key, status` queries.
#[derive(Debug, Clone, FromRow)]
pub struct StatusCountRow {
    pub key_id: uuid::Uuid,
    pub label: String,
    pub status: AttendanceStatus,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReportRow {
    /// Student id for class reports, subject id for student reports
    pub id: uuid::Uuid,
    pub label: String,
    #[serde(flatten)]
    pub counts: StatusCounts,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AttendanceReport {
    #[serde(rename = "type")]
    pub report_type: ReportType,
    pub id: uuid::Uuid,
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub rows: Vec<ReportRow>,
    pub totals: StatusCounts,
}

impl AttendanceReport {
    /// Folds grouped rows into one [`ReportRow`] per key, preserving first-seen order.
    pub fn from_rows(
        report_type: ReportType,
        id: uuid::Uuid,
        (date_from, date_to): (NaiveDate, NaiveDate),
        grouped: Vec<StatusCountRow>,
    ) -> Self {
        let mut rows: Vec<ReportRow> = Vec::new();
        let mut totals = StatusCounts::default();
        for row in grouped {
            totals.add(row.status, row.count);
            match rows.iter_mut().find(|r| r.id == row.key_id) {
                Some(existing) => existing.counts.add(row.status, row.count),
                None => {
                    let mut counts = StatusCounts::default();
                    counts.add(row.status, row.count);
                    rows.push(ReportRow {
                        id: row.key_id,
                        label: row.label,
                        counts,
                    });
                }
            }
        }
        Self {
            report_type,
            id,
            date_from,
            date_to,
            rows,
            totals,
        }
    }
}
