use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use rollcall_core::{PaginationMeta, PaginationParams};
use rollcall_models::attendance::{
    AttendanceEntryDto, AttendanceFilterParams, AttendanceRecord, AttendanceReport,
    AttendanceStatus, AttendanceView, FailedEntry, PaginatedAttendanceResponse,
    RecordAttendanceDto, RecordAttendanceResponse, RecordOutcome, ReportRow, ReportType,
    RosterEntry, RosterResponse, StatusCounts,
};
use rollcall_models::auth::{
    LoginRequest, LoginResponse, RefreshTokenRequest, RefreshTokenResponse, RegisterRequestDto,
};
use rollcall_models::classes::{
    BulkEnrollResponse, ClassDetail, ClassFilterParams, ClassWithStats, CreateClassDto,
    EnrollStudentsDto, EnrolledStudent, PaginatedClassesResponse, SchoolClass, UpdateClassDto,
};
use rollcall_models::dashboard::{
    AdminDashboard, AdminTotals, DailyCounts, DashboardResponse, StudentDashboard,
    TeacherDashboard,
};
use rollcall_models::leave_requests::{
    LeaveFilterParams, LeaveRequest, LeaveRequestView, LeaveStatus, LeaveType,
    PaginatedLeaveRequestsResponse, ReviewDecision, ReviewLeaveRequestDto, SubmitLeaveRequestForm,
};
use rollcall_models::schedules::{
    CreateScheduleDto, DayOfWeek, PaginatedSchedulesResponse, ScheduleDetail,
    ScheduleFilterParams, ScheduleView, UpdateScheduleDto,
};
use rollcall_models::subjects::{
    CreateSubjectDto, PaginatedSubjectsResponse, Subject, SubjectDetail, SubjectFilterParams,
    SubjectWithStats, UpdateSubjectDto,
};
use rollcall_models::users::{
    CreateUserDto, PaginatedUsersResponse, UpdateUserDto, User, UserDetail, UserFilterParams,
    UserRole, UserSummary,
};

use crate::modules::auth::controller::ErrorResponse;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::auth::controller::register_user,
        crate::modules::auth::controller::login_user,
        crate::modules::auth::controller::refresh_token,
        crate::modules::users::controller::get_profile,
        crate::modules::users::controller::create_user,
        crate::modules::users::controller::get_users,
        crate::modules::users::controller::get_user,
        crate::modules::users::controller::update_user,
        crate::modules::users::controller::delete_user,
        crate::modules::classes::controller::create_class,
        crate::modules::classes::controller::get_classes,
        crate::modules::classes::controller::get_class_by_id,
        crate::modules::classes::controller::update_class,
        crate::modules::classes::controller::delete_class,
        crate::modules::classes::controller::get_students_in_class,
        crate::modules::classes::controller::enroll_students,
        crate::modules::classes::controller::unenroll_student,
        crate::modules::subjects::controller::create_subject,
        crate::modules::subjects::controller::get_subjects,
        crate::modules::subjects::controller::get_subject_by_id,
        crate::modules::subjects::controller::update_subject,
        crate::modules::subjects::controller::delete_subject,
        crate::modules::schedules::controller::create_schedule,
        crate::modules::schedules::controller::get_schedules,
        crate::modules::schedules::controller::get_schedule_by_id,
        crate::modules::schedules::controller::update_schedule,
        crate::modules::schedules::controller::delete_schedule,
        crate::modules::attendance::controller::record_attendance,
        crate::modules::attendance::controller::get_roster,
        crate::modules::attendance::controller::get_attendance,
        crate::modules::attendance::controller::get_report,
        crate::modules::leave_requests::controller::submit_leave_request,
        crate::modules::leave_requests::controller::get_leave_requests,
        crate::modules::leave_requests::controller::get_leave_request_by_id,
        crate::modules::leave_requests::controller::get_evidence,
        crate::modules::leave_requests::controller::review_leave_request,
        crate::modules::leave_requests::controller::delete_leave_request,
        crate::modules::dashboard::controller::get_dashboard,
    ),
    components(
        schemas(
            ErrorResponse,
            PaginationMeta,
            PaginationParams,
            LoginRequest,
            LoginResponse,
            RegisterRequestDto,
            RefreshTokenRequest,
            RefreshTokenResponse,
            User,
            UserRole,
            UserSummary,
            UserDetail,
            CreateUserDto,
            UpdateUserDto,
            UserFilterParams,
            PaginatedUsersResponse,
            SchoolClass,
            ClassWithStats,
            ClassDetail,
            CreateClassDto,
            UpdateClassDto,
            ClassFilterParams,
            PaginatedClassesResponse,
            EnrolledStudent,
            EnrollStudentsDto,
            BulkEnrollResponse,
            Subject,
            SubjectWithStats,
            SubjectDetail,
            CreateSubjectDto,
            UpdateSubjectDto,
            SubjectFilterParams,
            PaginatedSubjectsResponse,
            DayOfWeek,
            ScheduleView,
            ScheduleDetail,
            CreateScheduleDto,
            UpdateScheduleDto,
            ScheduleFilterParams,
            PaginatedSchedulesResponse,
            AttendanceStatus,
            AttendanceRecord,
            AttendanceView,
            AttendanceEntryDto,
            RecordAttendanceDto,
            RecordOutcome,
            FailedEntry,
            RecordAttendanceResponse,
            RosterEntry,
            RosterResponse,
            AttendanceFilterParams,
            PaginatedAttendanceResponse,
            ReportType,
            ReportRow,
            AttendanceReport,
            StatusCounts,
            LeaveType,
            LeaveStatus,
            LeaveRequest,
            LeaveRequestView,
            SubmitLeaveRequestForm,
            ReviewDecision,
            ReviewLeaveRequestDto,
            LeaveFilterParams,
            PaginatedLeaveRequestsResponse,
            AdminTotals,
            DailyCounts,
            AdminDashboard,
            TeacherDashboard,
            StudentDashboard,
            DashboardResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Authentication", description = "Registration, login and token refresh"),
        (name = "Users", description = "Account management and the caller's profile"),
        (name = "Classes", description = "Classes and student enrollment"),
        (name = "Subjects", description = "Subject catalogue"),
        (name = "Schedules", description = "Weekly timetable with teacher conflict checks"),
        (name = "Attendance", description = "Per-lesson attendance ledger and reports"),
        (name = "Leave Requests", description = "Student leave requests and their review"),
        (name = "Dashboard", description = "Role-specific summaries")
    ),
    info(
        title = "Rollcall API",
        version = "0.1.0",
        description = "School attendance tracking with role-scoped access, built with Rust, Axum, and PostgreSQL.",
        license(
            name = "MIT"
        )
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_registers_bearer_scheme() {
        let doc = ApiDoc::openapi();
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }

    #[test]
    fn test_openapi_lists_conflict_checked_schedule_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/schedules"));
        assert!(doc.paths.paths.contains_key("/api/leave-requests/{id}/review"));
    }
}
