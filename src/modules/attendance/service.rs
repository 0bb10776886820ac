use chrono::Utc;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::instrument;

use rollcall_core::{AppError, PaginationMeta};
use rollcall_models::{ClassId, Scope, ScheduleId, UserId, UserRole};

use crate::metrics;
use crate::modules::attendance::model::{
    ATTENDANCE_VIEW_SELECT, AttendanceFilterParams, AttendanceReport, AttendanceView,
    PaginatedAttendanceResponse, RecordAttendanceDto, RecordAttendanceResponse, RecordOutcome,
    ReportParams, ReportType, RosterEntry, RosterQuery, RosterResponse, StatusCountRow,
};

const NOT_ENROLLED: &str = "Student is not actively enrolled in this class";

/// The parts of a schedule that attendance writes are checked against.
#[derive(Debug, sqlx::FromRow)]
struct LessonInfo {
    class_id: ClassId,
    teacher_id: UserId,
    class_name: String,
    subject_name: String,
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filters: &AttendanceFilterParams) {
    if let Some(class_id) = filters.class_id {
        qb.push(" AND s.class_id = ").push_bind(class_id);
    }
    if let Some(subject_id) = filters.subject_id {
        qb.push(" AND s.subject_id = ").push_bind(subject_id);
    }
    if let Some(date) = filters.date {
        qb.push(" AND a.date = ").push_bind(date);
    }
    if let Some(date_from) = filters.date_from {
        qb.push(" AND a.date >= ").push_bind(date_from);
    }
    if let Some(date_to) = filters.date_to {
        qb.push(" AND a.date <= ").push_bind(date_to);
    }
    if let Some(status) = filters.status {
        qb.push(" AND a.status = ").push_bind(status);
    }
    if let Some(search) = filters.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        qb.push(
            " AND (st.first_name || ' ' || st.last_name || ' ' || COALESCE(st.student_number, '')) ILIKE ",
        )
        .push_bind(format!("%{}%", search));
    }
}

pub struct AttendanceService;

impl AttendanceService {
    /// Upserts one row per entry. Entries succeed or fail on their own;
    /// failures are reported in the response instead of aborting the batch.
    #[instrument(skip(db, dto), fields(schedule_id = %dto.schedule_id, date = %dto.date, entries = dto.attendance.len()))]
    pub async fn record_attendance(
        db: &PgPool,
        scope: Scope,
        recorded_by: UserId,
        dto: RecordAttendanceDto,
    ) -> Result<RecordAttendanceResponse, AppError> {
        let lesson = Self::authorize_lesson(db, scope, dto.schedule_id).await?;
        let mut response = RecordAttendanceResponse::new(dto.schedule_id, dto.date);

        for entry in dto.attendance {
            let enrolled = sqlx::query_scalar::<_, bool>(
                r#"SELECT EXISTS(
                    SELECT 1 FROM class_enrollments
                    WHERE class_id = $1 AND student_id = $2 AND is_active
                )"#,
            )
            .bind(lesson.class_id)
            .bind(entry.student_id)
            .fetch_one(db)
            .await;

            match enrolled {
                Ok(true) => {}
                Ok(false) => {
                    response.fail(entry.student_id, NOT_ENROLLED);
                    continue;
                }
                Err(e) => {
                    tracing::warn!(error = ?e, student_id = %entry.student_id, "Enrollment check failed");
                    response.fail(entry.student_id, "Failed to record attendance");
                    continue;
                }
            }

            // xmax is zero only for a freshly inserted tuple
            let inserted = sqlx::query_scalar::<_, bool>(
                r#"INSERT INTO attendance (student_id, schedule_id, date, status, notes, recorded_by)
                   VALUES ($1, $2, $3, $4, $5, $6)
                   ON CONFLICT (student_id, schedule_id, date) DO UPDATE
                   SET status = EXCLUDED.status,
                       notes = EXCLUDED.notes,
                       recorded_by = EXCLUDED.recorded_by,
                       updated_at = NOW()
                   RETURNING (xmax = 0) AS inserted"#,
            )
            .bind(entry.student_id)
            .bind(dto.schedule_id)
            .bind(dto.date)
            .bind(entry.status)
            .bind(&entry.notes)
            .bind(recorded_by)
            .fetch_one(db)
            .await;

            match inserted {
                Ok(inserted) => {
                    let outcome = RecordOutcome::from_inserted(inserted);
                    metrics::track_attendance_upsert(outcome);
                    response.push(outcome);
                }
                Err(e) => {
                    tracing::warn!(error = ?e, student_id = %entry.student_id, "Attendance upsert failed");
                    response.fail(entry.student_id, "Failed to record attendance");
                }
            }
        }

        metrics::track_attendance_failed_entries(response.failed.len());

        Ok(response)
    }

    /// Every actively enrolled student with their recorded status, or an
    /// assumed absence.
    #[instrument(skip(db))]
    pub async fn get_roster(
        db: &PgPool,
        scope: Scope,
        query: RosterQuery,
    ) -> Result<RosterResponse, AppError> {
        let lesson = Self::authorize_lesson(db, scope, query.schedule_id).await?;
        let date = query.date.unwrap_or_else(|| Utc::now().date_naive());

        let students = sqlx::query_as::<_, RosterEntry>(
            r#"SELECT u.id AS student_id, u.first_name, u.last_name, u.student_number,
                      COALESCE(a.status, 'absent') AS status, a.notes,
                      (a.id IS NOT NULL) AS recorded
               FROM class_enrollments e
               JOIN users u ON u.id = e.student_id
               LEFT JOIN attendance a
                 ON a.student_id = u.id AND a.schedule_id = $1 AND a.date = $2
               WHERE e.class_id = $3 AND e.is_active
               ORDER BY u.last_name, u.first_name"#,
        )
        .bind(query.schedule_id)
        .bind(date)
        .bind(lesson.class_id)
        .fetch_all(db)
        .await?;

        Ok(RosterResponse {
            schedule_id: query.schedule_id,
            class_name: lesson.class_name,
            subject_name: lesson.subject_name,
            date,
            students,
        })
    }

    #[instrument(skip(db))]
    pub async fn get_attendance(
        db: &PgPool,
        scope: Scope,
        filters: AttendanceFilterParams,
    ) -> Result<PaginatedAttendanceResponse, AppError> {
        let limit = filters.pagination.limit();
        let offset = filters.pagination.offset();

        let mut count_query = QueryBuilder::new(
            r#"SELECT COUNT(*) FROM attendance a
               JOIN schedules s ON s.id = a.schedule_id
               JOIN users st ON st.id = a.student_id
               WHERE TRUE"#,
        );
        scope.push_attendance_scope(&mut count_query);
        push_filters(&mut count_query, &filters);
        let total = count_query
            .build_query_scalar::<i64>()
            .fetch_one(db)
            .await?;

        let mut data_query = QueryBuilder::new(format!("{ATTENDANCE_VIEW_SELECT} WHERE TRUE"));
        scope.push_attendance_scope(&mut data_query);
        push_filters(&mut data_query, &filters);
        data_query
            .push(" ORDER BY a.date DESC, s.start_time DESC, st.last_name LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        let records = data_query
            .build_query_as::<AttendanceView>()
            .fetch_all(db)
            .await?;

        Ok(PaginatedAttendanceResponse {
            data: records,
            meta: PaginationMeta::new(total, &filters.pagination),
        })
    }

    /// Newest rows in `scope`, optionally only those written by `recorded_by`.
    #[instrument(skip(db))]
    pub async fn get_recent(
        db: &PgPool,
        scope: Scope,
        recorded_by: Option<UserId>,
        limit: i64,
    ) -> Result<Vec<AttendanceView>, AppError> {
        let mut query = QueryBuilder::new(format!("{ATTENDANCE_VIEW_SELECT} WHERE TRUE"));
        scope.push_attendance_scope(&mut query);
        if let Some(recorder) = recorded_by {
            query.push(" AND a.recorded_by = ").push_bind(recorder);
        }
        query
            .push(" ORDER BY a.updated_at DESC LIMIT ")
            .push_bind(limit);

        let records = query.build_query_as::<AttendanceView>().fetch_all(db).await?;
        Ok(records)
    }

    /// Per-student counts for a class, or per-subject counts for a student.
    #[instrument(skip(db))]
    pub async fn get_report(
        db: &PgPool,
        scope: Scope,
        params: ReportParams,
    ) -> Result<AttendanceReport, AppError> {
        let (date_from, date_to) = params.range(Utc::now().date_naive());
        if date_to < date_from {
            return Err(AppError::field(
                "date_to",
                "date_to must be on or after date_from",
            ));
        }

        let mut query = match params.report_type {
            ReportType::Class => {
                let class_id = ClassId::from_uuid(params.id);
                Self::authorize_class_report(db, scope, class_id).await?;

                let mut query = QueryBuilder::new(
                    r#"SELECT st.id AS key_id, (st.first_name || ' ' || st.last_name) AS label,
                              a.status, COUNT(*) AS count
                       FROM attendance a
                       JOIN schedules s ON s.id = a.schedule_id
                       JOIN users st ON st.id = a.student_id
                       WHERE s.class_id = "#,
                );
                query.push_bind(class_id);
                query
            }
            ReportType::Student => {
                let student_id = UserId::from_uuid(params.id);
                Self::authorize_student_report(db, scope, student_id).await?;

                let mut query = QueryBuilder::new(
                    r#"SELECT sub.id AS key_id, sub.name AS label, a.status, COUNT(*) AS count
                       FROM attendance a
                       JOIN schedules s ON s.id = a.schedule_id
                       JOIN subjects sub ON sub.id = s.subject_id
                       WHERE a.student_id = "#,
                );
                query.push_bind(student_id);
                query
            }
        };

        scope.push_attendance_scope(&mut query);
        query
            .push(" AND a.date >= ")
            .push_bind(date_from)
            .push(" AND a.date <= ")
            .push_bind(date_to);
        query.push(match params.report_type {
            ReportType::Class => {
                " GROUP BY st.id, st.first_name, st.last_name, a.status \
                 ORDER BY st.last_name, st.first_name, st.id"
            }
            ReportType::Student => " GROUP BY sub.id, sub.name, a.status ORDER BY sub.name, sub.id",
        });

        let rows = query.build_query_as::<StatusCountRow>().fetch_all(db).await?;

        Ok(AttendanceReport::from_rows(
            params.report_type,
            params.id,
            (date_from, date_to),
            rows,
        ))
    }

    /// Admins may record for any lesson, teachers only for their own.
    async fn authorize_lesson(
        db: &PgPool,
        scope: Scope,
        schedule_id: ScheduleId,
    ) -> Result<LessonInfo, AppError> {
        let lesson = sqlx::query_as::<_, LessonInfo>(
            r#"SELECT s.class_id, s.teacher_id, c.name AS class_name, sub.name AS subject_name
               FROM schedules s
               JOIN classes c ON c.id = s.class_id
               JOIN subjects sub ON sub.id = s.subject_id
               WHERE s.id = $1"#,
        )
        .bind(schedule_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow::anyhow!("Schedule not found")))?;

        match scope {
            Scope::Admin => Ok(lesson),
            Scope::Teacher(teacher_id) if teacher_id == lesson.teacher_id => Ok(lesson),
            Scope::Teacher(_) => Err(AppError::forbidden(
                "You can only take attendance for your own schedules".to_string(),
            )),
            Scope::Student(_) => Err(AppError::forbidden(
                "Students cannot take attendance".to_string(),
            )),
        }
    }

    async fn authorize_class_report(
        db: &PgPool,
        scope: Scope,
        class_id: ClassId,
    ) -> Result<(), AppError> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM classes WHERE id = $1)")
                .bind(class_id)
                .fetch_one(db)
                .await?;
        if !exists {
            return Err(AppError::not_found(anyhow::anyhow!("Class not found")));
        }

        match scope {
            Scope::Admin => Ok(()),
            Scope::Teacher(teacher_id) => {
                let teaches = sqlx::query_scalar::<_, bool>(
                    "SELECT EXISTS(SELECT 1 FROM schedules WHERE class_id = $1 AND teacher_id = $2)",
                )
                .bind(class_id)
                .bind(teacher_id)
                .fetch_one(db)
                .await?;
                if teaches {
                    Ok(())
                } else {
                    Err(AppError::forbidden(
                        "You can only view reports for classes you teach".to_string(),
                    ))
                }
            }
            Scope::Student(_) => Err(AppError::forbidden(
                "Students cannot view attendance reports".to_string(),
            )),
        }
    }

    async fn authorize_student_report(
        db: &PgPool,
        scope: Scope,
        student_id: UserId,
    ) -> Result<(), AppError> {
        let is_student = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE id = $1 AND role = $2)",
        )
        .bind(student_id)
        .bind(UserRole::Student)
        .fetch_one(db)
        .await?;
        if !is_student {
            return Err(AppError::not_found(anyhow::anyhow!("Student not found")));
        }

        match scope {
            Scope::Admin => Ok(()),
            Scope::Teacher(teacher_id) => {
                let teaches = sqlx::query_scalar::<_, bool>(
                    r#"SELECT EXISTS(
                        SELECT 1 FROM class_enrollments e
                        JOIN schedules s ON s.class_id = e.class_id
                        WHERE e.student_id = $1 AND e.is_active AND s.teacher_id = $2
                    )"#,
                )
                .bind(student_id)
                .bind(teacher_id)
                .fetch_one(db)
                .await?;
                if teaches {
                    Ok(())
                } else {
                    Err(AppError::forbidden(
                        "You can only view reports for students in your classes".to_string(),
                    ))
                }
            }
            Scope::Student(_) => Err(AppError::forbidden(
                "Students cannot view attendance reports".to_string(),
            )),
        }
    }
}
