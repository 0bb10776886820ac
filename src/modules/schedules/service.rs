use chrono::NaiveTime;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use tracing::instrument;

use rollcall_core::{AppError, PaginationMeta};
use rollcall_models::users::UserSummary;
use rollcall_models::{ClassId, Scope, ScheduleId, SubjectId, UserId, UserRole};

use crate::metrics;
use crate::modules::schedules::model::{
    CreateScheduleDto, DayOfWeek, PaginatedSchedulesResponse, SCHEDULE_VIEW_SELECT,
    ScheduleDetail, ScheduleFilterParams, ScheduleView, TeacherSlot, TimeSlot,
    UpdateScheduleDto, find_conflict,
};

/// The fields a write decides on, after merging an update into the stored row.
#[derive(Debug, Clone, sqlx::FromRow)]
struct ScheduleFields {
    class_id: ClassId,
    subject_id: SubjectId,
    teacher_id: UserId,
    day_of_week: DayOfWeek,
    start_time: NaiveTime,
    end_time: NaiveTime,
    room: Option<String>,
    is_active: bool,
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filters: &ScheduleFilterParams) {
    if let Some(class_id) = filters.class_id {
        qb.push(" AND s.class_id = ").push_bind(class_id);
    }
    if let Some(teacher_id) = filters.teacher_id {
        qb.push(" AND s.teacher_id = ").push_bind(teacher_id);
    }
    if let Some(day) = filters.day_of_week {
        qb.push(" AND s.day_of_week = ").push_bind(day);
    }
}

/// A blank room clears the field.
fn non_blank(room: String) -> Option<String> {
    let room = room.trim();
    (!room.is_empty()).then(|| room.to_string())
}

pub struct ScheduleService;

impl ScheduleService {
    #[instrument(skip(db))]
    pub async fn create_schedule(
        db: &PgPool,
        dto: CreateScheduleDto,
    ) -> Result<ScheduleView, AppError> {
        let fields = ScheduleFields {
            class_id: dto.class_id,
            subject_id: dto.subject_id,
            teacher_id: dto.teacher_id,
            day_of_week: dto.day_of_week,
            start_time: dto.start_time,
            end_time: dto.end_time,
            room: dto.room.and_then(non_blank),
            is_active: dto.is_active.unwrap_or(true),
        };

        let mut tx = db.begin().await?;

        Self::validate_write(&mut tx, &fields, None).await?;

        let id = sqlx::query_scalar::<_, ScheduleId>(
            r#"INSERT INTO schedules
                (class_id, subject_id, teacher_id, day_of_week, start_time, end_time, room, is_active)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
               RETURNING id"#,
        )
        .bind(fields.class_id)
        .bind(fields.subject_id)
        .bind(fields.teacher_id)
        .bind(fields.day_of_week)
        .bind(fields.start_time)
        .bind(fields.end_time)
        .bind(&fields.room)
        .bind(fields.is_active)
        .fetch_one(&mut *tx)
        .await?;

        let schedule = Self::fetch_view(&mut tx, id).await?;
        tx.commit().await?;

        Ok(schedule)
    }

    #[instrument(skip(db))]
    pub async fn update_schedule(
        db: &PgPool,
        schedule_id: ScheduleId,
        dto: UpdateScheduleDto,
    ) -> Result<ScheduleView, AppError> {
        let mut tx = db.begin().await?;

        let existing = sqlx::query_as::<_, ScheduleFields>(
            r#"SELECT class_id, subject_id, teacher_id, day_of_week, start_time, end_time, room, is_active
               FROM schedules WHERE id = $1 FOR UPDATE"#,
        )
        .bind(schedule_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow::anyhow!("Schedule not found")))?;

        let fields = ScheduleFields {
            class_id: dto.class_id.unwrap_or(existing.class_id),
            subject_id: dto.subject_id.unwrap_or(existing.subject_id),
            teacher_id: dto.teacher_id.unwrap_or(existing.teacher_id),
            day_of_week: dto.day_of_week.unwrap_or(existing.day_of_week),
            start_time: dto.start_time.unwrap_or(existing.start_time),
            end_time: dto.end_time.unwrap_or(existing.end_time),
            room: match dto.room {
                Some(room) => non_blank(room),
                None => existing.room,
            },
            is_active: dto.is_active.unwrap_or(existing.is_active),
        };

        Self::validate_write(&mut tx, &fields, Some(schedule_id)).await?;

        sqlx::query(
            r#"UPDATE schedules
               SET class_id = $1, subject_id = $2, teacher_id = $3, day_of_week = $4,
                   start_time = $5, end_time = $6, room = $7, is_active = $8, updated_at = NOW()
               WHERE id = $9"#,
        )
        .bind(fields.class_id)
        .bind(fields.subject_id)
        .bind(fields.teacher_id)
        .bind(fields.day_of_week)
        .bind(fields.start_time)
        .bind(fields.end_time)
        .bind(&fields.room)
        .bind(fields.is_active)
        .bind(schedule_id)
        .execute(&mut *tx)
        .await?;

        let schedule = Self::fetch_view(&mut tx, schedule_id).await?;
        tx.commit().await?;

        Ok(schedule)
    }

    /// Attendance recorded against the schedule is removed with it.
    #[instrument(skip(db))]
    pub async fn delete_schedule(db: &PgPool, schedule_id: ScheduleId) -> Result<(), AppError> {
        let result = sqlx::query("DELETE FROM schedules WHERE id = $1")
            .bind(schedule_id)
            .execute(db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::not_found(anyhow::anyhow!("Schedule not found")));
        }

        Ok(())
    }

    #[instrument(skip(db))]
    pub async fn get_schedules(
        db: &PgPool,
        scope: Scope,
        filters: ScheduleFilterParams,
    ) -> Result<PaginatedSchedulesResponse, AppError> {
        let limit = filters.pagination.limit();
        let offset = filters.pagination.offset();

        let mut count_query = QueryBuilder::new("SELECT COUNT(*) FROM schedules s WHERE TRUE");
        scope.push_schedule_scope(&mut count_query);
        push_filters(&mut count_query, &filters);
        let total = count_query
            .build_query_scalar::<i64>()
            .fetch_one(db)
            .await?;

        let mut data_query = QueryBuilder::new(format!("{SCHEDULE_VIEW_SELECT} WHERE TRUE"));
        scope.push_schedule_scope(&mut data_query);
        push_filters(&mut data_query, &filters);
        data_query
            .push(" ORDER BY s.day_of_week, s.start_time, c.name LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        let schedules = data_query
            .build_query_as::<ScheduleView>()
            .fetch_all(db)
            .await?;

        Ok(PaginatedSchedulesResponse {
            data: schedules,
            meta: PaginationMeta::new(total, &filters.pagination),
        })
    }

    /// Schedules outside the caller's scope are reported as missing.
    #[instrument(skip(db))]
    pub async fn get_schedule_by_id(
        db: &PgPool,
        scope: Scope,
        schedule_id: ScheduleId,
    ) -> Result<ScheduleDetail, AppError> {
        let mut query = QueryBuilder::new(format!("{SCHEDULE_VIEW_SELECT} WHERE s.id = "));
        query.push_bind(schedule_id);
        scope.push_schedule_scope(&mut query);

        let schedule = query
            .build_query_as::<ScheduleView>()
            .fetch_optional(db)
            .await?
            .ok_or_else(|| AppError::not_found(anyhow::anyhow!("Schedule not found")))?;

        let students = sqlx::query_as::<_, UserSummary>(
            r#"SELECT u.id, u.first_name, u.last_name, u.email, u.student_number
               FROM class_enrollments e
               JOIN users u ON u.id = e.student_id
               WHERE e.class_id = $1 AND e.is_active
               ORDER BY u.last_name, u.first_name"#,
        )
        .bind(schedule.class_id)
        .fetch_all(db)
        .await?;

        Ok(ScheduleDetail { schedule, students })
    }

    /// Active schedules of `scope` on `day`, by start time.
    #[instrument(skip(db))]
    pub async fn get_schedules_for_day(
        db: &PgPool,
        scope: Scope,
        day: DayOfWeek,
    ) -> Result<Vec<ScheduleView>, AppError> {
        let mut query = QueryBuilder::new(format!(
            "{SCHEDULE_VIEW_SELECT} WHERE s.is_active AND s.day_of_week = "
        ));
        query.push_bind(day);
        scope.push_schedule_scope(&mut query);
        query.push(" ORDER BY s.start_time");

        let schedules = query.build_query_as::<ScheduleView>().fetch_all(db).await?;
        Ok(schedules)
    }

    /// Reference and overlap checks shared by create and update.
    ///
    /// Locks the teacher's row first, so concurrent writes for the same
    /// teacher queue here and each sees the others' committed slots.
    async fn validate_write(
        conn: &mut PgConnection,
        fields: &ScheduleFields,
        exclude: Option<ScheduleId>,
    ) -> Result<(), AppError> {
        let slot = TimeSlot::new(fields.start_time, fields.end_time)
            .map_err(|_| AppError::field("end_time", "End time must be after start time"))?;

        let class_exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM classes WHERE id = $1)")
                .bind(fields.class_id)
                .fetch_one(&mut *conn)
                .await?;
        if !class_exists {
            return Err(AppError::field("class_id", "Class not found"));
        }

        let subject_exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM subjects WHERE id = $1)")
                .bind(fields.subject_id)
                .fetch_one(&mut *conn)
                .await?;
        if !subject_exists {
            return Err(AppError::field("subject_id", "Subject not found"));
        }

        let (role, first_name, last_name) = sqlx::query_as::<_, (UserRole, String, String)>(
            "SELECT role, first_name, last_name FROM users WHERE id = $1 FOR UPDATE",
        )
        .bind(fields.teacher_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| AppError::field("teacher_id", "Teacher not found"))?;

        if role != UserRole::Teacher {
            return Err(AppError::field(
                "teacher_id",
                "The selected user is not a teacher",
            ));
        }

        if !fields.is_active {
            return Ok(());
        }

        let existing = sqlx::query_as::<_, TeacherSlot>(
            r#"SELECT id, start_time, end_time FROM schedules
               WHERE teacher_id = $1 AND day_of_week = $2 AND is_active"#,
        )
        .bind(fields.teacher_id)
        .bind(fields.day_of_week)
        .fetch_all(&mut *conn)
        .await?;

        if let Some(conflicting) = find_conflict(&slot, &existing, exclude) {
            tracing::info!(
                teacher_id = %fields.teacher_id,
                %conflicting,
                "Rejected overlapping schedule"
            );
            metrics::track_schedule_conflict();
            return Err(AppError::field(
                "teacher_id",
                format!(
                    "{} {} already teaches at this time. Please choose another time or teacher.",
                    first_name, last_name
                ),
            ));
        }

        Ok(())
    }

    async fn fetch_view(
        conn: &mut PgConnection,
        schedule_id: ScheduleId,
    ) -> Result<ScheduleView, AppError> {
        let schedule =
            sqlx::query_as::<_, ScheduleView>(&format!("{SCHEDULE_VIEW_SELECT} WHERE s.id = $1"))
                .bind(schedule_id)
                .fetch_one(conn)
                .await?;
        Ok(schedule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    struct Fixture {
        class_id: ClassId,
        subject_id: SubjectId,
        teacher_id: UserId,
    }

    async fn insert_teacher(pool: &PgPool, role: UserRole) -> UserId {
        sqlx::query_scalar(
            r#"INSERT INTO users (first_name, last_name, email, password, role)
               VALUES ('Ada', 'Lovelace', $1, '$2b$10$test', $2)
               RETURNING id"#,
        )
        .bind(format!("teacher-{}@test.com", Uuid::new_v4()))
        .bind(role)
        .fetch_one(pool)
        .await
        .unwrap()
    }

    async fn setup(pool: &PgPool) -> Fixture {
        let class_id = sqlx::query_scalar(
            "INSERT INTO classes (name, grade) VALUES ($1, '10') RETURNING id",
        )
        .bind(format!("10-{}", Uuid::new_v4()))
        .fetch_one(pool)
        .await
        .unwrap();

        let subject_id = sqlx::query_scalar(
            "INSERT INTO subjects (name, code) VALUES ('Mathematics', 'MATH101') RETURNING id",
        )
        .fetch_one(pool)
        .await
        .unwrap();

        Fixture {
            class_id,
            subject_id,
            teacher_id: insert_teacher(pool, UserRole::Teacher).await,
        }
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn dto(f: &Fixture, start: NaiveTime, end: NaiveTime) -> CreateScheduleDto {
        CreateScheduleDto {
            class_id: f.class_id,
            subject_id: f.subject_id,
            teacher_id: f.teacher_id,
            day_of_week: DayOfWeek::Monday,
            start_time: start,
            end_time: end,
            room: None,
            is_active: None,
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_overlapping_slot_is_rejected(pool: PgPool) {
        let f = setup(&pool).await;
        ScheduleService::create_schedule(&pool, dto(&f, t(8, 0), t(9, 0)))
            .await
            .unwrap();

        let err = ScheduleService::create_schedule(&pool, dto(&f, t(8, 30), t(9, 30)))
            .await
            .unwrap_err();

        assert_eq!(err.status, axum::http::StatusCode::UNPROCESSABLE_ENTITY);
        let details = err.details.unwrap();
        assert!(details["teacher_id"].contains("Ada Lovelace already teaches at this time"));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_back_to_back_slots_are_allowed(pool: PgPool) {
        let f = setup(&pool).await;
        ScheduleService::create_schedule(&pool, dto(&f, t(8, 0), t(9, 0)))
            .await
            .unwrap();

        let second = ScheduleService::create_schedule(&pool, dto(&f, t(9, 0), t(10, 0)))
            .await
            .unwrap();

        assert_eq!(second.start_time, t(9, 0));
        assert_eq!(second.teacher_name, "Ada Lovelace");
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_update_ignores_own_slot(pool: PgPool) {
        let f = setup(&pool).await;
        let created = ScheduleService::create_schedule(&pool, dto(&f, t(8, 0), t(9, 0)))
            .await
            .unwrap();

        let update = UpdateScheduleDto {
            class_id: None,
            subject_id: None,
            teacher_id: None,
            day_of_week: None,
            start_time: Some(t(8, 15)),
            end_time: Some(t(9, 15)),
            room: Some("B12".to_string()),
            is_active: None,
        };
        let updated = ScheduleService::update_schedule(&pool, created.id, update)
            .await
            .unwrap();

        assert_eq!(updated.start_time, t(8, 15));
        assert_eq!(updated.room.as_deref(), Some("B12"));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_blank_room_clears_room(pool: PgPool) {
        let f = setup(&pool).await;
        let mut with_room = dto(&f, t(8, 0), t(9, 0));
        with_room.room = Some("B12".to_string());
        let created = ScheduleService::create_schedule(&pool, with_room).await.unwrap();

        let keep = UpdateScheduleDto {
            class_id: None,
            subject_id: None,
            teacher_id: None,
            day_of_week: None,
            start_time: None,
            end_time: None,
            room: None,
            is_active: None,
        };
        let kept = ScheduleService::update_schedule(&pool, created.id, keep)
            .await
            .unwrap();
        assert_eq!(kept.room.as_deref(), Some("B12"));

        let clear = UpdateScheduleDto {
            class_id: None,
            subject_id: None,
            teacher_id: None,
            day_of_week: None,
            start_time: None,
            end_time: None,
            room: Some("  ".to_string()),
            is_active: None,
        };
        let cleared = ScheduleService::update_schedule(&pool, created.id, clear)
            .await
            .unwrap();
        assert_eq!(cleared.room, None);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_inactive_slots_do_not_conflict(pool: PgPool) {
        let f = setup(&pool).await;
        let mut inactive = dto(&f, t(8, 0), t(9, 0));
        inactive.is_active = Some(false);
        ScheduleService::create_schedule(&pool, inactive).await.unwrap();

        let result = ScheduleService::create_schedule(&pool, dto(&f, t(8, 30), t(9, 30))).await;
        assert!(result.is_ok());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_non_teacher_is_rejected(pool: PgPool) {
        let mut f = setup(&pool).await;
        f.teacher_id = insert_teacher(&pool, UserRole::Student).await;

        let err = ScheduleService::create_schedule(&pool, dto(&f, t(8, 0), t(9, 0)))
            .await
            .unwrap_err();

        assert_eq!(
            err.details.unwrap()["teacher_id"],
            "The selected user is not a teacher"
        );
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_end_before_start_is_rejected(pool: PgPool) {
        let f = setup(&pool).await;
        let err = ScheduleService::create_schedule(&pool, dto(&f, t(10, 0), t(9, 0)))
            .await
            .unwrap_err();

        assert!(err.details.unwrap().contains_key("end_time"));
    }
}
