use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use tracing::instrument;

use rollcall_core::{AppError, PaginationMeta};
use rollcall_models::schedules::{SCHEDULE_VIEW_SELECT, ScheduleView};
use rollcall_models::{ClassId, UserId, UserRole};

use crate::modules::classes::model::{
    BulkEnrollResponse, CLASS_COLUMNS, ClassDetail, ClassFilterParams, ClassWithStats,
    CreateClassDto, EnrollStudentsDto, EnrolledStudent, PaginatedClassesResponse, SchoolClass,
    UpdateClassDto,
};

/// Classes with their active student count. Alias `c`; callers append `WHERE`.
pub const CLASS_WITH_STATS_SELECT: &str = r#"SELECT
    c.id, c.name, c.grade, c.description, c.is_active,
    (SELECT COUNT(*) FROM class_enrollments e WHERE e.class_id = c.id AND e.is_active) AS student_count,
    c.created_at, c.updated_at
  FROM classes c"#;

const ENROLLED_STUDENT_SELECT: &str = r#"SELECT
    e.id AS enrollment_id, u.id, u.first_name, u.last_name, u.email, u.student_number,
    e.enrolled_at, e.is_active
  FROM class_enrollments e
  JOIN users u ON u.id = e.student_id"#;

fn map_unique_violation(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &e
        && db_err.is_unique_violation()
    {
        return AppError::conflict(anyhow::anyhow!("A class with this name already exists"));
    }
    AppError::from(e)
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filters: &ClassFilterParams) {
    if let Some(grade) = filters.grade.as_deref().filter(|g| !g.is_empty()) {
        qb.push(" AND c.grade = ").push_bind(grade.to_string());
    }
    if let Some(search) = filters.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        qb.push(" AND (c.name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR c.grade ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

pub struct ClassService;

impl ClassService {
    #[instrument(skip(db))]
    pub async fn create_class(db: &PgPool, dto: CreateClassDto) -> Result<SchoolClass, AppError> {
        let class = sqlx::query_as::<_, SchoolClass>(&format!(
            "INSERT INTO classes (name, grade, description, is_active)
             VALUES ($1, $2, $3, $4)
             RETURNING {CLASS_COLUMNS}"
        ))
        .bind(&dto.name)
        .bind(&dto.grade)
        .bind(&dto.description)
        .bind(dto.is_active.unwrap_or(true))
        .fetch_one(db)
        .await
        .map_err(map_unique_violation)?;

        Ok(class)
    }

    #[instrument(skip(db))]
    pub async fn get_classes(
        db: &PgPool,
        filters: ClassFilterParams,
    ) -> Result<PaginatedClassesResponse, AppError> {
        let limit = filters.pagination.limit();
        let offset = filters.pagination.offset();

        let mut count_query = QueryBuilder::new("SELECT COUNT(*) FROM classes c WHERE TRUE");
        push_filters(&mut count_query, &filters);
        let total = count_query
            .build_query_scalar::<i64>()
            .fetch_one(db)
            .await?;

        let mut data_query = QueryBuilder::new(format!("{CLASS_WITH_STATS_SELECT} WHERE TRUE"));
        push_filters(&mut data_query, &filters);
        data_query
            .push(" ORDER BY c.grade, c.name LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        let classes = data_query
            .build_query_as::<ClassWithStats>()
            .fetch_all(db)
            .await?;

        Ok(PaginatedClassesResponse {
            data: classes,
            meta: PaginationMeta::new(total, &filters.pagination),
        })
    }

    #[instrument(skip(db))]
    pub async fn get_class_by_id(db: &PgPool, class_id: ClassId) -> Result<ClassDetail, AppError> {
        let class = sqlx::query_as::<_, ClassWithStats>(&format!(
            "{CLASS_WITH_STATS_SELECT} WHERE c.id = $1"
        ))
        .bind(class_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow::anyhow!("Class not found")))?;

        let students = sqlx::query_as::<_, EnrolledStudent>(&format!(
            "{ENROLLED_STUDENT_SELECT}
             WHERE e.class_id = $1 AND e.is_active
             ORDER BY u.last_name, u.first_name"
        ))
        .bind(class_id)
        .fetch_all(db)
        .await?;

        let schedules = sqlx::query_as::<_, ScheduleView>(&format!(
            "{SCHEDULE_VIEW_SELECT} WHERE s.class_id = $1 ORDER BY s.day_of_week, s.start_time"
        ))
        .bind(class_id)
        .fetch_all(db)
        .await?;

        Ok(ClassDetail {
            class,
            students,
            schedules,
        })
    }

    /// Partial update. `student_ids`, when present, replaces the active
    /// enrollment set in the same transaction.
    #[instrument(skip(db))]
    pub async fn update_class(
        db: &PgPool,
        class_id: ClassId,
        dto: UpdateClassDto,
    ) -> Result<SchoolClass, AppError> {
        let mut tx = db.begin().await?;

        let class = sqlx::query_as::<_, SchoolClass>(&format!(
            "UPDATE classes
             SET name = COALESCE($1, name),
                 grade = COALESCE($2, grade),
                 description = COALESCE($3, description),
                 is_active = COALESCE($4, is_active),
                 updated_at = NOW()
             WHERE id = $5
             RETURNING {CLASS_COLUMNS}"
        ))
        .bind(&dto.name)
        .bind(&dto.grade)
        .bind(&dto.description)
        .bind(dto.is_active)
        .bind(class_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_unique_violation)?
        .ok_or_else(|| AppError::not_found(anyhow::anyhow!("Class not found")))?;

        if let Some(student_ids) = &dto.student_ids {
            Self::sync_class_students(&mut tx, class_id, student_ids).await?;
        }

        tx.commit().await?;

        Ok(class)
    }

    /// Refuses while the class still has active enrollments or any schedule.
    #[instrument(skip(db))]
    pub async fn delete_class(db: &PgPool, class_id: ClassId) -> Result<(), AppError> {
        let mut tx = db.begin().await?;

        // Row lock blocks concurrent enrollments and schedule inserts, whose
        // foreign key checks need a share lock on the class.
        sqlx::query_scalar::<_, ClassId>("SELECT id FROM classes WHERE id = $1 FOR UPDATE")
            .bind(class_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::not_found(anyhow::anyhow!("Class not found")))?;

        let (active_students, schedules) = sqlx::query_as::<_, (i64, i64)>(
            r#"SELECT
                (SELECT COUNT(*) FROM class_enrollments WHERE class_id = $1 AND is_active),
                (SELECT COUNT(*) FROM schedules WHERE class_id = $1)"#,
        )
        .bind(class_id)
        .fetch_one(&mut *tx)
        .await?;

        if active_students > 0 {
            return Err(AppError::conflict(anyhow::anyhow!(
                "Cannot delete class with {} enrolled student(s)",
                active_students
            )));
        }
        if schedules > 0 {
            return Err(AppError::conflict(anyhow::anyhow!(
                "Cannot delete class with {} schedule(s)",
                schedules
            )));
        }

        sqlx::query("DELETE FROM classes WHERE id = $1")
            .bind(class_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }

    /// Every enrollment of the class, active ones first.
    #[instrument(skip(db))]
    pub async fn get_students_in_class(
        db: &PgPool,
        class_id: ClassId,
    ) -> Result<Vec<EnrolledStudent>, AppError> {
        Self::ensure_class_exists(db, class_id).await?;

        let students = sqlx::query_as::<_, EnrolledStudent>(&format!(
            "{ENROLLED_STUDENT_SELECT}
             WHERE e.class_id = $1
             ORDER BY e.is_active DESC, u.last_name, u.first_name"
        ))
        .bind(class_id)
        .fetch_all(db)
        .await?;

        Ok(students)
    }

    /// Ids that are not student accounts are reported back instead of
    /// failing the batch.
    #[instrument(skip(db))]
    pub async fn enroll_students(
        db: &PgPool,
        class_id: ClassId,
        dto: EnrollStudentsDto,
    ) -> Result<BulkEnrollResponse, AppError> {
        Self::ensure_class_exists(db, class_id).await?;

        let mut enrolled_count = 0;
        let mut failed_ids = Vec::new();
        let mut conn = db.acquire().await?;

        for student_id in dto.student_ids {
            let is_student = sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM users WHERE id = $1 AND role = $2)",
            )
            .bind(student_id)
            .bind(UserRole::Student)
            .fetch_one(&mut *conn)
            .await?;

            if !is_student {
                failed_ids.push(student_id);
                continue;
            }

            match Self::upsert_enrollment(&mut conn, class_id, student_id).await {
                Ok(()) => enrolled_count += 1,
                Err(e) => {
                    tracing::warn!(error = ?e, %student_id, "Failed to enroll student");
                    failed_ids.push(student_id);
                }
            }
        }

        Ok(BulkEnrollResponse {
            enrolled_count,
            failed_ids,
        })
    }

    #[instrument(skip(db))]
    pub async fn unenroll_student(
        db: &PgPool,
        class_id: ClassId,
        student_id: UserId,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            r#"UPDATE class_enrollments
               SET is_active = FALSE, updated_at = NOW()
               WHERE class_id = $1 AND student_id = $2 AND is_active"#,
        )
        .bind(class_id)
        .bind(student_id)
        .execute(db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(anyhow::anyhow!(
                "Student is not enrolled in this class"
            )));
        }

        Ok(())
    }

    /// Active classes of a student, by name.
    #[instrument(skip(db))]
    pub async fn get_classes_of_student(
        db: &PgPool,
        student_id: UserId,
    ) -> Result<Vec<SchoolClass>, AppError> {
        let classes = sqlx::query_as::<_, SchoolClass>(
            r#"SELECT c.id, c.name, c.grade, c.description, c.is_active, c.created_at, c.updated_at
               FROM classes c
               JOIN class_enrollments e ON e.class_id = c.id
               WHERE e.student_id = $1 AND e.is_active
               ORDER BY c.name"#,
        )
        .bind(student_id)
        .fetch_all(db)
        .await?;

        Ok(classes)
    }

    async fn ensure_class_exists(db: &PgPool, class_id: ClassId) -> Result<(), AppError> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM classes WHERE id = $1)")
                .bind(class_id)
                .fetch_one(db)
                .await?;

        if !exists {
            return Err(AppError::not_found(anyhow::anyhow!("Class not found")));
        }
        Ok(())
    }

    /// Creates the enrollment, or reactivates it dated today if it had been
    /// deactivated.
    pub async fn upsert_enrollment(
        conn: &mut PgConnection,
        class_id: ClassId,
        student_id: UserId,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"INSERT INTO class_enrollments (class_id, student_id)
               VALUES ($1, $2)
               ON CONFLICT (class_id, student_id) DO UPDATE
               SET is_active = TRUE,
                   enrolled_at = CASE
                       WHEN class_enrollments.is_active THEN class_enrollments.enrolled_at
                       ELSE CURRENT_DATE
                   END,
                   updated_at = NOW()"#,
        )
        .bind(class_id)
        .bind(student_id)
        .execute(conn)
        .await?;

        Ok(())
    }

    /// Makes `class_ids` the exact set of active classes of a student.
    pub async fn sync_student_classes(
        conn: &mut PgConnection,
        student_id: UserId,
        class_ids: &[ClassId],
    ) -> Result<(), AppError> {
        let found = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(DISTINCT id) FROM classes WHERE id = ANY($1)",
        )
        .bind(class_ids)
        .fetch_one(&mut *conn)
        .await?;

        let mut distinct = class_ids.to_vec();
        distinct.sort_by_key(|id| id.into_inner());
        distinct.dedup();
        if found != distinct.len() as i64 {
            return Err(AppError::field("class_ids", "One or more classes do not exist"));
        }

        sqlx::query(
            r#"UPDATE class_enrollments
               SET is_active = FALSE, updated_at = NOW()
               WHERE student_id = $1 AND is_active AND NOT (class_id = ANY($2))"#,
        )
        .bind(student_id)
        .bind(class_ids)
        .execute(&mut *conn)
        .await?;

        for class_id in distinct {
            Self::upsert_enrollment(conn, class_id, student_id).await?;
        }

        Ok(())
    }

    /// Makes `student_ids` the exact set of active students of a class.
    pub async fn sync_class_students(
        conn: &mut PgConnection,
        class_id: ClassId,
        student_ids: &[UserId],
    ) -> Result<(), AppError> {
        let students = sqlx::query_scalar::<_, UserId>(
            "SELECT id FROM users WHERE id = ANY($1) AND role = $2",
        )
        .bind(student_ids)
        .bind(UserRole::Student)
        .fetch_all(&mut *conn)
        .await?;

        if let Some(invalid) = student_ids.iter().find(|id| !students.contains(id)) {
            return Err(AppError::field(
                "student_ids",
                format!("User {} is not a student", invalid),
            ));
        }

        sqlx::query(
            r#"UPDATE class_enrollments
               SET is_active = FALSE, updated_at = NOW()
               WHERE class_id = $1 AND is_active AND NOT (student_id = ANY($2))"#,
        )
        .bind(class_id)
        .bind(student_ids)
        .execute(&mut *conn)
        .await?;

        for student_id in students {
            Self::upsert_enrollment(conn, class_id, student_id).await?;
        }

        Ok(())
    }
}
