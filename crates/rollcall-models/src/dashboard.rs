//! Read-only rollups, one view-model per role.

use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use utoipa::ToSchema;

use crate::attendance::{AttendanceView, StatusCounts};
use crate::classes::{ClassWithStats, SchoolClass};
use crate::leave_requests::LeaveRequestView;
use crate::schedules::ScheduleView;

#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct AdminTotals {
    pub students: i64,
    pub teachers: i64,
    pub active_classes: i64,
    pub active_subjects: i64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DailyCounts {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub counts: StatusCounts,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdminDashboard {
    pub totals: AdminTotals,
    pub today: StatusCounts,
    /// Monday to Sunday of the current week
    pub week: Vec<DailyCounts>,
    pub pending_leave_requests: Vec<LeaveRequestView>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TeacherDashboard {
    pub today_schedule: Vec<ScheduleView>,
    pub classes: Vec<ClassWithStats>,
    pub recent_attendance: Vec<AttendanceView>,
    pub pending_leave_requests: Vec<LeaveRequestView>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StudentDashboard {
    pub classes: Vec<SchoolClass>,
    pub today_schedule: Vec<ScheduleView>,
    pub attendance: StatusCounts,
    pub recent_attendance: Vec<AttendanceView>,
    pub recent_leave_requests: Vec<LeaveRequestView>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum DashboardResponse {
    Admin(AdminDashboard),
    Teacher(TeacherDashboard),
    Student(StudentDashboard),
}

/// Monday and Sunday of the week containing `day`.
pub fn week_bounds(day: NaiveDate) -> (NaiveDate, NaiveDate) {
    let monday = day - Duration::days(i64::from(day.weekday().num_days_from_monday()));
    (monday, monday + Duration::days(6))
}

/// One entry per day from `start` to `end` inclusive, zero-filled where
/// `counted` has no entry.
pub fn fill_days(
    start: NaiveDate,
    end: NaiveDate,
    mut counted: Vec<DailyCounts>,
) -> Vec<DailyCounts> {
    let mut days = Vec::new();
    let mut day = start;
    while day <= end {
        let counts = counted
            .iter()
            .position(|d| d.date == day)
            .map(|i| counted.swap_remove(i).counts)
            .unwrap_or_default();
        days.push(DailyCounts { date: day, counts });
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }
    days
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attendance::AttendanceStatus;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_week_bounds() {
        // 2024-01-10 is a Wednesday
        assert_eq!(week_bounds(date(2024, 1, 10)), (date(2024, 1, 8), date(2024, 1, 14)));
        assert_eq!(week_bounds(date(2024, 1, 8)), (date(2024, 1, 8), date(2024, 1, 14)));
        assert_eq!(week_bounds(date(2024, 1, 14)), (date(2024, 1, 8), date(2024, 1, 14)));
    }

    #[test]
    fn test_fill_days_zero_fills_gaps() {
        let counted = vec![DailyCounts {
            date: date(2024, 1, 9),
            counts: StatusCounts::from_pairs([(AttendanceStatus::Present, 3)]),
        }];
        let days = fill_days(date(2024, 1, 8), date(2024, 1, 14), counted);
        assert_eq!(days.len(), 7);
        assert_eq!(days[0].counts.total, 0);
        assert_eq!(days[1].counts.present, 3);
    }

    #[test]
    fn test_dashboard_is_tagged_by_role() {
        let response = DashboardResponse::Admin(AdminDashboard {
            totals: AdminTotals::default(),
            today: StatusCounts::default(),
            week: vec![],
            pending_leave_requests: vec![],
        });
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["role"], "admin");
        assert_eq!(json["totals"]["students"], 0);
    }
}
