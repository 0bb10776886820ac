//! Role-scoped read paths.
//!
//! A [`Scope`] is chosen once from the authenticated caller and pushed into
//! every query builder before any caller-supplied filter. Each `push_*`
//! method appends ` AND ...` restrictions, so queries start from a
//! `WHERE TRUE` clause. User filters appended afterwards can only narrow
//! the result further.

use sqlx::{Postgres, QueryBuilder};

use crate::ids::UserId;
use crate::users::UserRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Admin,
    Teacher(UserId),
    Student(UserId),
}

impl Scope {
    pub fn from_role(role: UserRole, user_id: UserId) -> Self {
        match role {
            UserRole::Admin => Scope::Admin,
            UserRole::Teacher => Scope::Teacher(user_id),
            UserRole::Student => Scope::Student(user_id),
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Scope::Admin)
    }

    /// Schedules aliased as `s`.
    ///
    /// Teachers see their own active schedules; students see active
    /// schedules of classes they are actively enrolled in.
    pub fn push_schedule_scope(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        match *self {
            Scope::Admin => {}
            Scope::Teacher(teacher_id) => {
                qb.push(" AND s.is_active AND s.teacher_id = ");
                qb.push_bind(teacher_id);
            }
            Scope::Student(student_id) => {
                qb.push(
                    " AND s.is_active AND EXISTS (SELECT 1 FROM class_enrollments e \
                     WHERE e.class_id = s.class_id AND e.is_active AND e.student_id = ",
                );
                qb.push_bind(student_id);
                qb.push(")");
            }
        }
    }

    /// Attendance aliased as `a`, joined to its schedule as `s`.
    pub fn push_attendance_scope(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        match *self {
            Scope::Admin => {}
            Scope::Teacher(teacher_id) => {
                qb.push(" AND s.teacher_id = ");
                qb.push_bind(teacher_id);
            }
            Scope::Student(student_id) => {
                qb.push(" AND a.student_id = ");
                qb.push_bind(student_id);
            }
        }
    }

    /// Leave requests aliased as `lr`.
    ///
    /// Teachers see requests of students actively enrolled in a class they
    /// teach.
    pub fn push_leave_request_scope(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        match *self {
            Scope::Admin => {}
            Scope::Teacher(teacher_id) => {
                qb.push(
                    " AND EXISTS (SELECT 1 FROM class_enrollments e \
                     JOIN schedules ts ON ts.class_id = e.class_id \
                     WHERE e.student_id = lr.student_id AND e.is_active AND ts.teacher_id = ",
                );
                qb.push_bind(teacher_id);
                qb.push(")");
            }
            Scope::Student(student_id) => {
                qb.push(" AND lr.student_id = ");
                qb.push_bind(student_id);
            }
        }
    }
}
