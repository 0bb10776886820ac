use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::instrument;

use rollcall_core::{AppError, PaginationMeta};
use rollcall_models::SubjectId;
use rollcall_models::schedules::{SCHEDULE_VIEW_SELECT, ScheduleView};

use crate::modules::subjects::model::{
    CreateSubjectDto, PaginatedSubjectsResponse, SUBJECT_COLUMNS, Subject, SubjectDetail,
    SubjectFilterParams, SubjectWithStats, UpdateSubjectDto,
};

const SUBJECT_WITH_STATS_SELECT: &str = r#"SELECT
    sub.id, sub.name, sub.code, sub.description, sub.is_active,
    (SELECT COUNT(*) FROM schedules s WHERE s.subject_id = sub.id AND s.is_active) AS schedule_count,
    sub.created_at, sub.updated_at
  FROM subjects sub"#;

fn map_unique_violation(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &e
        && db_err.is_unique_violation()
    {
        return AppError::conflict(anyhow::anyhow!("A subject with this code already exists"));
    }
    AppError::from(e)
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filters: &SubjectFilterParams) {
    if let Some(search) = filters.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        qb.push(" AND (sub.name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR sub.code ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

pub struct SubjectService;

impl SubjectService {
    #[instrument(skip(db))]
    pub async fn create_subject(db: &PgPool, dto: CreateSubjectDto) -> Result<Subject, AppError> {
        let subject = sqlx::query_as::<_, Subject>(&format!(
            "INSERT INTO subjects (name, code, description, is_active)
             VALUES ($1, $2, $3, $4)
             RETURNING {SUBJECT_COLUMNS}"
        ))
        .bind(&dto.name)
        .bind(&dto.code)
        .bind(&dto.description)
        .bind(dto.is_active.unwrap_or(true))
        .fetch_one(db)
        .await
        .map_err(map_unique_violation)?;

        Ok(subject)
    }

    #[instrument(skip(db))]
    pub async fn get_subjects(
        db: &PgPool,
        filters: SubjectFilterParams,
    ) -> Result<PaginatedSubjectsResponse, AppError> {
        let limit = filters.pagination.limit();
        let offset = filters.pagination.offset();

        let mut count_query = QueryBuilder::new("SELECT COUNT(*) FROM subjects sub WHERE TRUE");
        push_filters(&mut count_query, &filters);
        let total = count_query
            .build_query_scalar::<i64>()
            .fetch_one(db)
            .await?;

        let mut data_query =
            QueryBuilder::new(format!("{SUBJECT_WITH_STATS_SELECT} WHERE TRUE"));
        push_filters(&mut data_query, &filters);
        data_query
            .push(" ORDER BY sub.name LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        let subjects = data_query
            .build_query_as::<SubjectWithStats>()
            .fetch_all(db)
            .await?;

        Ok(PaginatedSubjectsResponse {
            data: subjects,
            meta: PaginationMeta::new(total, &filters.pagination),
        })
    }

    #[instrument(skip(db))]
    pub async fn get_subject_by_id(
        db: &PgPool,
        subject_id: SubjectId,
    ) -> Result<SubjectDetail, AppError> {
        let subject = sqlx::query_as::<_, SubjectWithStats>(&format!(
            "{SUBJECT_WITH_STATS_SELECT} WHERE sub.id = $1"
        ))
        .bind(subject_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow::anyhow!("Subject not found")))?;

        let schedules = sqlx::query_as::<_, ScheduleView>(&format!(
            "{SCHEDULE_VIEW_SELECT} WHERE s.subject_id = $1 ORDER BY s.day_of_week, s.start_time"
        ))
        .bind(subject_id)
        .fetch_all(db)
        .await?;

        Ok(SubjectDetail { subject, schedules })
    }

    #[instrument(skip(db))]
    pub async fn update_subject(
        db: &PgPool,
        subject_id: SubjectId,
        dto: UpdateSubjectDto,
    ) -> Result<Subject, AppError> {
        let subject = sqlx::query_as::<_, Subject>(&format!(
            "UPDATE subjects
             SET name = COALESCE($1, name),
                 code = COALESCE($2, code),
                 description = COALESCE($3, description),
                 is_active = COALESCE($4, is_active),
                 updated_at = NOW()
             WHERE id = $5
             RETURNING {SUBJECT_COLUMNS}"
        ))
        .bind(&dto.name)
        .bind(&dto.code)
        .bind(&dto.description)
        .bind(dto.is_active)
        .bind(subject_id)
        .fetch_optional(db)
        .await
        .map_err(map_unique_violation)?
        .ok_or_else(|| AppError::not_found(anyhow::anyhow!("Subject not found")))?;

        Ok(subject)
    }

    /// Refuses while any active schedule teaches the subject.
    #[instrument(skip(db))]
    pub async fn delete_subject(db: &PgPool, subject_id: SubjectId) -> Result<(), AppError> {
        let mut tx = db.begin().await?;

        sqlx::query_scalar::<_, SubjectId>("SELECT id FROM subjects WHERE id = $1 FOR UPDATE")
            .bind(subject_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::not_found(anyhow::anyhow!("Subject not found")))?;

        let active_schedules = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM schedules WHERE subject_id = $1 AND is_active",
        )
        .bind(subject_id)
        .fetch_one(&mut *tx)
        .await?;

        if active_schedules > 0 {
            return Err(AppError::conflict(anyhow::anyhow!(
                "Cannot delete subject with {} active schedule(s)",
                active_schedules
            )));
        }

        sqlx::query("DELETE FROM subjects WHERE id = $1")
            .bind(subject_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }
}
