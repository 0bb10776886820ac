//! Weekly recurring schedule slots and the teacher-overlap rule.
//!
//! A slot occupies the half-open interval `[start, end)`. Two slots of the
//! same teacher on the same day conflict when `s1 < e2 && s2 < e1`, so a
//! lesson ending at 09:00 and one starting at 09:00 do not conflict.

use chrono::{DateTime, NaiveTime, Utc, Weekday};
use rollcall_core::pagination::{PaginationMeta, PaginationParams};
use rollcall_core::serde::empty_string_as_none;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::ids::{ClassId, ScheduleId, SubjectId, UserId};
use crate::users::UserSummary;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    sqlx::Type,
    ToSchema,
)]
#[sqlx(type_name = "day_of_week", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl From<Weekday> for DayOfWeek {
    fn from(day: Weekday) -> Self {
        match day {
            Weekday::Mon => DayOfWeek::Monday,
            Weekday::Tue => DayOfWeek::Tuesday,
            Weekday::Wed => DayOfWeek::Wednesday,
            Weekday::Thu => DayOfWeek::Thursday,
            Weekday::Fri => DayOfWeek::Friday,
            Weekday::Sat => DayOfWeek::Saturday,
            Weekday::Sun => DayOfWeek::Sunday,
        }
    }
}

/// `HH:MM` wire format for times of day. Seconds are accepted on input.
pub mod time_hm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn parse(s: &str) -> Option<NaiveTime> {
        NaiveTime::parse_from_str(s, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
            .ok()
    }

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse(&s).ok_or_else(|| serde::de::Error::custom("time must be formatted as HH:MM"))
    }

    pub mod option {
        use super::*;

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<NaiveTime>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                None => Ok(None),
                Some(s) => parse(&s)
                    .map(Some)
                    .ok_or_else(|| serde::de::Error::custom("time must be formatted as HH:MM")),
            }
        }
    }
}

/// A `[start, end)` interval within one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSlot {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmptyTimeSlot;

impl TimeSlot {
    /// Fails unless `end` is strictly after `start`.
    pub fn new(start: NaiveTime, end: NaiveTime) -> Result<Self, EmptyTimeSlot> {
        if end > start {
            Ok(Self { start, end })
        } else {
            Err(EmptyTimeSlot)
        }
    }

    pub fn overlaps(&self, other: &TimeSlot) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// An existing active slot of the teacher being checked.
#[derive(Debug, Clone, FromRow)]
pub struct TeacherSlot {
    pub id: ScheduleId,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// Returns the first existing slot that overlaps `candidate`, skipping
/// `exclude` (the schedule being updated).
pub fn find_conflict<'a>(
    candidate: &TimeSlot,
    existing: impl IntoIterator<Item = &'a TeacherSlot>,
    exclude: Option<ScheduleId>,
) -> Option<ScheduleId> {
    existing
        .into_iter()
        .filter(|slot| Some(slot.id) != exclude)
        .find(|slot| {
            candidate.overlaps(&TimeSlot {
                start: slot.start_time,
                end: slot.end_time,
            })
        })
        .map(|slot| slot.id)
}

/// Columns and joins producing a [`ScheduleView`]; callers append `WHERE`.
pub const SCHEDULE_VIEW_SELECT: &str = r#"SELECT
    s.id, s.class_id, c.name AS class_name,
    s.subject_id, sub.name AS subject_name, sub.code AS subject_code,
    s.teacher_id, (t.first_name || ' ' || t.last_name) AS teacher_name,
    s.day_of_week, s.start_time, s.end_time, s.room, s.is_active,
    s.created_at, s.updated_at
  FROM schedules s
  JOIN classes c ON c.id = s.class_id
  JOIN subjects sub ON sub.id = s.subject_id
  JOIN users t ON t.id = s.teacher_id"#;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct ScheduleView {
    pub id: ScheduleId,
    pub class_id: ClassId,
    pub class_name: String,
    pub subject_id: SubjectId,
    pub subject_name: String,
    pub subject_code: String,
    pub teacher_id: UserId,
    pub teacher_name: String,
    pub day_of_week: DayOfWeek,
    #[serde(with = "time_hm")]
    #[schema(value_type = String, example = "08:00")]
    pub start_time: NaiveTime,
    #[serde(with = "time_hm")]
    #[schema(value_type = String, example = "09:00")]
    pub end_time: NaiveTime,
    pub room: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateScheduleDto {
    pub class_id: ClassId,
    pub subject_id: SubjectId,
    pub teacher_id: UserId,
    pub day_of_week: DayOfWeek,
    #[serde(deserialize_with = "time_hm::deserialize")]
    #[schema(value_type = String, example = "08:00")]
    pub start_time: NaiveTime,
    #[serde(deserialize_with = "time_hm::deserialize")]
    #[schema(value_type = String, example = "09:00")]
    pub end_time: NaiveTime,
    #[validate(length(max = 50))]
    pub room: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateScheduleDto {
    pub class_id: Option<ClassId>,
    pub subject_id: Option<SubjectId>,
    pub teacher_id: Option<UserId>,
    pub day_of_week: Option<DayOfWeek>,
    #[serde(default, deserialize_with = "time_hm::option::deserialize")]
    #[schema(value_type = Option<String>, example = "08:00")]
    pub start_time: Option<NaiveTime>,
    #[serde(default, deserialize_with = "time_hm::option::deserialize")]
    #[schema(value_type = Option<String>, example = "09:00")]
    pub end_time: Option<NaiveTime>,
    /// An empty string clears the room
    #[validate(length(max = 50))]
    pub room: Option<String>,
    pub is_active: Option<bool>,
}

/// Admin-only filters; other roles are restricted by their scope first.
#[derive(Debug, Deserialize, ToSchema, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ScheduleFilterParams {
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub class_id: Option<ClassId>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub teacher_id: Option<UserId>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub day_of_week: Option<DayOfWeek>,
    #[serde(flatten)]
    pub pagination: PaginationParams,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaginatedSchedulesResponse {
    pub data: Vec<ScheduleView>,
    pub meta: PaginationMeta,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ScheduleDetail {
    #[serde(flatten)]
    pub schedule: ScheduleView,
    /// Actively enrolled students of the class
    pub students: Vec<UserSummary>,
}
