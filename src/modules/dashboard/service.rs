use chrono::{Datelike, NaiveDate, Utc};
use sqlx::{PgPool, QueryBuilder};
use tracing::instrument;

use rollcall_core::AppError;
use rollcall_models::attendance::{AttendanceStatus, StatusCounts};
use rollcall_models::classes::ClassWithStats;
use rollcall_models::leave_requests::LeaveStatus;
use rollcall_models::schedules::DayOfWeek;
use rollcall_models::{Scope, UserId, UserRole};

use crate::modules::attendance::service::AttendanceService;
use crate::modules::classes::service::{CLASS_WITH_STATS_SELECT, ClassService};
use crate::modules::dashboard::model::{
    AdminDashboard, AdminTotals, DailyCounts, DashboardResponse, StudentDashboard,
    TeacherDashboard, fill_days, week_bounds,
};
use crate::modules::leave_requests::service::LeaveRequestService;
use crate::modules::schedules::service::ScheduleService;

const RECENT_ATTENDANCE: i64 = 10;
const RECENT_LEAVE_REQUESTS: i64 = 5;

pub struct DashboardService;

impl DashboardService {
    /// Builds the view-model for the caller's role. "Today" is the UTC date.
    #[instrument(skip(db))]
    pub async fn get_dashboard(db: &PgPool, scope: Scope) -> Result<DashboardResponse, AppError> {
        let today = Utc::now().date_naive();

        let dashboard = match scope {
            Scope::Admin => DashboardResponse::Admin(Self::admin(db, today).await?),
            Scope::Teacher(teacher_id) => {
                DashboardResponse::Teacher(Self::teacher(db, teacher_id, today).await?)
            }
            Scope::Student(student_id) => {
                DashboardResponse::Student(Self::student(db, student_id, today).await?)
            }
        };

        Ok(dashboard)
    }

    async fn admin(db: &PgPool, today: NaiveDate) -> Result<AdminDashboard, AppError> {
        let (students, teachers, active_classes, active_subjects) =
            sqlx::query_as::<_, (i64, i64, i64, i64)>(
                r#"SELECT
                    (SELECT COUNT(*) FROM users WHERE role = $1),
                    (SELECT COUNT(*) FROM users WHERE role = $2),
                    (SELECT COUNT(*) FROM classes WHERE is_active),
                    (SELECT COUNT(*) FROM subjects WHERE is_active)"#,
            )
            .bind(UserRole::Student)
            .bind(UserRole::Teacher)
            .fetch_one(db)
            .await?;

        let today_counts = sqlx::query_as::<_, (AttendanceStatus, i64)>(
            "SELECT status, COUNT(*) FROM attendance WHERE date = $1 GROUP BY status",
        )
        .bind(today)
        .fetch_all(db)
        .await?;

        let (monday, sunday) = week_bounds(today);
        let week_rows = sqlx::query_as::<_, (NaiveDate, AttendanceStatus, i64)>(
            r#"SELECT date, status, COUNT(*) FROM attendance
               WHERE date BETWEEN $1 AND $2
               GROUP BY date, status"#,
        )
        .bind(monday)
        .bind(sunday)
        .fetch_all(db)
        .await?;

        let mut counted: Vec<DailyCounts> = Vec::new();
        for (date, status, count) in week_rows {
            match counted.iter_mut().find(|d| d.date == date) {
                Some(day) => day.counts.add(status, count),
                None => counted.push(DailyCounts {
                    date,
                    counts: StatusCounts::from_pairs([(status, count)]),
                }),
            }
        }

        let pending_leave_requests = LeaveRequestService::get_recent(
            db,
            Scope::Admin,
            Some(LeaveStatus::Pending),
            RECENT_LEAVE_REQUESTS,
        )
        .await?;

        Ok(AdminDashboard {
            totals: AdminTotals {
                students,
                teachers,
                active_classes,
                active_subjects,
            },
            today: StatusCounts::from_pairs(today_counts),
            week: fill_days(monday, sunday, counted),
            pending_leave_requests,
        })
    }

    async fn teacher(
        db: &PgPool,
        teacher_id: UserId,
        today: NaiveDate,
    ) -> Result<TeacherDashboard, AppError> {
        let scope = Scope::Teacher(teacher_id);

        let today_schedule =
            ScheduleService::get_schedules_for_day(db, scope, DayOfWeek::from(today.weekday()))
                .await?;

        let mut classes_query = QueryBuilder::new(format!(
            "{CLASS_WITH_STATS_SELECT} WHERE EXISTS \
             (SELECT 1 FROM schedules s WHERE s.class_id = c.id AND s.is_active AND s.teacher_id = "
        ));
        classes_query.push_bind(teacher_id).push(") ORDER BY c.name");
        let classes = classes_query
            .build_query_as::<ClassWithStats>()
            .fetch_all(db)
            .await?;

        let recent_attendance =
            AttendanceService::get_recent(db, scope, Some(teacher_id), RECENT_ATTENDANCE).await?;

        let pending_leave_requests = LeaveRequestService::get_recent(
            db,
            scope,
            Some(LeaveStatus::Pending),
            RECENT_LEAVE_REQUESTS,
        )
        .await?;

        Ok(TeacherDashboard {
            today_schedule,
            classes,
            recent_attendance,
            pending_leave_requests,
        })
    }

    async fn student(
        db: &PgPool,
        student_id: UserId,
        today: NaiveDate,
    ) -> Result<StudentDashboard, AppError> {
        let scope = Scope::Student(student_id);

        let classes = ClassService::get_classes_of_student(db, student_id).await?;

        let today_schedule =
            ScheduleService::get_schedules_for_day(db, scope, DayOfWeek::from(today.weekday()))
                .await?;

        let counts = sqlx::query_as::<_, (AttendanceStatus, i64)>(
            "SELECT status, COUNT(*) FROM attendance WHERE student_id = $1 GROUP BY status",
        )
        .bind(student_id)
        .fetch_all(db)
        .await?;

        let recent_attendance =
            AttendanceService::get_recent(db, scope, None, RECENT_ATTENDANCE).await?;

        let recent_leave_requests =
            LeaveRequestService::get_recent(db, scope, None, RECENT_LEAVE_REQUESTS).await?;

        Ok(StudentDashboard {
            classes,
            today_schedule,
            attendance: StatusCounts::from_pairs(counts),
            recent_attendance,
            recent_leave_requests,
        })
    }
}
