use chrono::Utc;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use rollcall_core::file_storage::{EVIDENCE_EXTENSIONS, content_type_for, validate_extension};
use rollcall_core::{AppError, FileStorage, PaginationMeta, StorageError};
use rollcall_models::{LeaveRequestId, Scope, UserId};

use crate::metrics;
use crate::modules::leave_requests::model::{
    EvidenceUpload, LEAVE_REQUEST_COLUMNS, LEAVE_REQUEST_VIEW_SELECT, LeaveFilterParams,
    LeaveRequest, LeaveRequestView, LeaveStatus, PaginatedLeaveRequestsResponse,
    ReviewLeaveRequestDto, SubmitLeaveRequest,
};

fn storage_error(err: StorageError) -> AppError {
    match err {
        StorageError::InvalidFileSize { .. } | StorageError::InvalidFileType { .. } => {
            AppError::field("evidence_file", err.to_string())
        }
        StorageError::NotFound => {
            AppError::not_found(anyhow::anyhow!("Evidence file not found"))
        }
        other => AppError::internal(other),
    }
}

fn not_found() -> AppError {
    AppError::not_found(anyhow::anyhow!("Leave request not found"))
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filters: &LeaveFilterParams) {
    if let Some(status) = filters.status {
        qb.push(" AND lr.status = ").push_bind(status);
    }
    if let Some(student_id) = filters.student_id {
        qb.push(" AND lr.student_id = ").push_bind(student_id);
    }
}

pub struct LeaveRequestService;

impl LeaveRequestService {
    /// Stores the evidence first and removes it again if the row cannot be
    /// written, so neither side is left dangling.
    #[instrument(skip(db, storage, evidence), fields(has_evidence = evidence.is_some()))]
    pub async fn submit_leave_request(
        db: &PgPool,
        storage: &dyn FileStorage,
        student_id: UserId,
        submission: SubmitLeaveRequest,
        evidence: Option<EvidenceUpload>,
    ) -> Result<LeaveRequest, AppError> {
        submission
            .validate()
            .map_err(|errors| AppError::validation(&errors))?;
        submission
            .check_dates(Utc::now().date_naive())
            .map_err(|e| AppError::field(e.field(), e.message()))?;

        let evidence_key = match &evidence {
            Some(upload) => {
                let ext = validate_extension(&upload.filename, EVIDENCE_EXTENSIONS)
                    .map_err(storage_error)?;
                if upload.content.len() > storage.max_file_size() {
                    return Err(storage_error(StorageError::InvalidFileSize {
                        max_bytes: storage.max_file_size(),
                    }));
                }
                let key = format!("leave-requests/{}.{}", Uuid::new_v4(), ext);
                storage
                    .save(&key, &upload.content)
                    .await
                    .map_err(storage_error)?;
                Some(key)
            }
            None => None,
        };

        let inserted = sqlx::query_as::<_, LeaveRequest>(&format!(
            "INSERT INTO leave_requests (student_id, from_date, to_date, leave_type, reason, evidence_file)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {LEAVE_REQUEST_COLUMNS}"
        ))
        .bind(student_id)
        .bind(submission.from_date)
        .bind(submission.to_date)
        .bind(submission.leave_type)
        .bind(&submission.reason)
        .bind(&evidence_key)
        .fetch_one(db)
        .await;

        match inserted {
            Ok(request) => {
                metrics::track_leave_request_submitted(evidence_key.is_some());
                Ok(request)
            }
            Err(e) => {
                if let Some(key) = &evidence_key
                    && let Err(cleanup) = storage.delete(key).await
                {
                    tracing::error!(error = %cleanup, %key, "Failed to remove orphaned evidence file");
                }
                Err(e.into())
            }
        }
    }

    /// Moves a pending request to approved or rejected. The `status =
    /// 'pending'` condition on the update is what makes a second review
    /// lose, even when two reviewers race.
    #[instrument(skip(db, dto))]
    pub async fn review_leave_request(
        db: &PgPool,
        scope: Scope,
        reviewer_id: UserId,
        request_id: LeaveRequestId,
        dto: ReviewLeaveRequestDto,
    ) -> Result<LeaveRequest, AppError> {
        let current = sqlx::query_scalar::<_, LeaveStatus>(
            "SELECT status FROM leave_requests WHERE id = $1",
        )
        .bind(request_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(not_found)?;

        if !Self::is_visible(db, scope, request_id).await? {
            return Err(AppError::forbidden(
                "You can only review leave requests of students in your classes".to_string(),
            ));
        }

        let next = current
            .review(dto.status)
            .map_err(|e| AppError::conflict(anyhow::anyhow!(e.to_string())))?;

        let reviewed = sqlx::query_as::<_, LeaveRequest>(&format!(
            "UPDATE leave_requests
             SET status = $1, admin_notes = $2, reviewed_by = $3,
                 reviewed_at = NOW(), updated_at = NOW()
             WHERE id = $4 AND status = $5
             RETURNING {LEAVE_REQUEST_COLUMNS}"
        ))
        .bind(next)
        .bind(&dto.admin_notes)
        .bind(reviewer_id)
        .bind(request_id)
        .bind(LeaveStatus::Pending)
        .fetch_optional(db)
        .await?;

        match reviewed {
            Some(request) => {
                metrics::track_leave_request_reviewed(next);
                Ok(request)
            }
            None => {
                let status = sqlx::query_scalar::<_, LeaveStatus>(
                    "SELECT status FROM leave_requests WHERE id = $1",
                )
                .bind(request_id)
                .fetch_optional(db)
                .await?
                .ok_or_else(not_found)?;
                Err(AppError::conflict(anyhow::anyhow!(
                    "Leave request has already been {}",
                    status
                )))
            }
        }
    }

    /// Students withdraw their own pending requests; admins may delete any.
    /// The evidence file goes before the commit, so a storage failure keeps
    /// the row.
    #[instrument(skip(db, storage))]
    pub async fn delete_leave_request(
        db: &PgPool,
        storage: &dyn FileStorage,
        scope: Scope,
        request_id: LeaveRequestId,
    ) -> Result<(), AppError> {
        let mut tx = db.begin().await?;

        let (owner, status, evidence_file) =
            sqlx::query_as::<_, (UserId, LeaveStatus, Option<String>)>(
                "SELECT student_id, status, evidence_file FROM leave_requests WHERE id = $1 FOR UPDATE",
            )
            .bind(request_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(not_found)?;

        match scope {
            Scope::Admin => {}
            Scope::Student(student_id) if student_id == owner => {
                if status != LeaveStatus::Pending {
                    return Err(AppError::forbidden(
                        "Only pending leave requests can be withdrawn".to_string(),
                    ));
                }
            }
            _ => {
                return Err(AppError::forbidden(
                    "You can only withdraw your own leave requests".to_string(),
                ));
            }
        }

        sqlx::query("DELETE FROM leave_requests WHERE id = $1")
            .bind(request_id)
            .execute(&mut *tx)
            .await?;

        if let Some(key) = &evidence_file {
            storage.delete(key).await.map_err(AppError::internal)?;
        }

        tx.commit().await?;

        Ok(())
    }

    #[instrument(skip(db))]
    pub async fn get_leave_requests(
        db: &PgPool,
        scope: Scope,
        filters: LeaveFilterParams,
    ) -> Result<PaginatedLeaveRequestsResponse, AppError> {
        let limit = filters.pagination.limit();
        let offset = filters.pagination.offset();

        let mut count_query =
            QueryBuilder::new("SELECT COUNT(*) FROM leave_requests lr WHERE TRUE");
        scope.push_leave_request_scope(&mut count_query);
        push_filters(&mut count_query, &filters);
        let total = count_query
            .build_query_scalar::<i64>()
            .fetch_one(db)
            .await?;

        let mut data_query = QueryBuilder::new(format!("{LEAVE_REQUEST_VIEW_SELECT} WHERE TRUE"));
        scope.push_leave_request_scope(&mut data_query);
        push_filters(&mut data_query, &filters);
        data_query
            .push(" ORDER BY lr.created_at DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        let requests = data_query
            .build_query_as::<LeaveRequestView>()
            .fetch_all(db)
            .await?;

        Ok(PaginatedLeaveRequestsResponse {
            data: requests,
            meta: PaginationMeta::new(total, &filters.pagination),
        })
    }

    /// Newest requests in `scope`, optionally only those in `status`.
    #[instrument(skip(db))]
    pub async fn get_recent(
        db: &PgPool,
        scope: Scope,
        status: Option<LeaveStatus>,
        limit: i64,
    ) -> Result<Vec<LeaveRequestView>, AppError> {
        let mut query = QueryBuilder::new(format!("{LEAVE_REQUEST_VIEW_SELECT} WHERE TRUE"));
        scope.push_leave_request_scope(&mut query);
        if let Some(status) = status {
            query.push(" AND lr.status = ").push_bind(status);
        }
        query
            .push(" ORDER BY lr.created_at DESC LIMIT ")
            .push_bind(limit);

        let requests = query
            .build_query_as::<LeaveRequestView>()
            .fetch_all(db)
            .await?;
        Ok(requests)
    }

    #[instrument(skip(db))]
    pub async fn get_leave_request_by_id(
        db: &PgPool,
        scope: Scope,
        request_id: LeaveRequestId,
    ) -> Result<LeaveRequestView, AppError> {
        let mut query = QueryBuilder::new(format!("{LEAVE_REQUEST_VIEW_SELECT} WHERE lr.id = "));
        query.push_bind(request_id);
        scope.push_leave_request_scope(&mut query);

        query
            .build_query_as::<LeaveRequestView>()
            .fetch_optional(db)
            .await?
            .ok_or_else(not_found)
    }

    /// The stored evidence bytes and their content type.
    #[instrument(skip(db, storage))]
    pub async fn get_evidence(
        db: &PgPool,
        storage: &dyn FileStorage,
        scope: Scope,
        request_id: LeaveRequestId,
    ) -> Result<(&'static str, Vec<u8>), AppError> {
        let mut query =
            QueryBuilder::new("SELECT lr.evidence_file FROM leave_requests lr WHERE lr.id = ");
        query.push_bind(request_id);
        scope.push_leave_request_scope(&mut query);

        let key = query
            .build_query_scalar::<Option<String>>()
            .fetch_optional(db)
            .await?
            .ok_or_else(not_found)?
            .ok_or_else(|| {
                AppError::not_found(anyhow::anyhow!("No evidence file attached"))
            })?;

        let content = storage.read(&key).await.map_err(storage_error)?;
        Ok((content_type_for(&key), content))
    }

    async fn is_visible(
        db: &PgPool,
        scope: Scope,
        request_id: LeaveRequestId,
    ) -> Result<bool, AppError> {
        if scope.is_admin() {
            return Ok(true);
        }

        let mut query = QueryBuilder::new(
            "SELECT EXISTS(SELECT 1 FROM leave_requests lr WHERE lr.id = ",
        );
        query.push_bind(request_id);
        scope.push_leave_request_scope(&mut query);
        query.push(")");

        let visible = query.build_query_scalar::<bool>().fetch_one(db).await?;
        Ok(visible)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use axum::http::StatusCode;
    use chrono::Duration;
    use rollcall_core::file_storage::StorageFuture;
    use rollcall_models::UserRole;

    use crate::modules::leave_requests::model::LeaveType;

    /// Keeps saved files in memory and can be told to fail deletes.
    #[derive(Default)]
    struct MemoryStorage {
        files: Mutex<Vec<String>>,
        fail_delete: bool,
    }

    impl MemoryStorage {
        fn failing_delete() -> Self {
            Self {
                fail_delete: true,
                ..Self::default()
            }
        }

        fn keys(&self) -> Vec<String> {
            self.files.lock().unwrap().clone()
        }
    }

    impl FileStorage for MemoryStorage {
        fn save<'a>(&'a self, key: &'a str, _content: &'a [u8]) -> StorageFuture<'a, String> {
            Box::pin(async move {
                self.files.lock().unwrap().push(key.to_string());
                Ok(key.to_string())
            })
        }

        fn read<'a>(&'a self, _key: &'a str) -> StorageFuture<'a, Vec<u8>> {
            Box::pin(async move { Err(StorageError::NotFound) })
        }

        fn delete<'a>(&'a self, key: &'a str) -> StorageFuture<'a, ()> {
            Box::pin(async move {
                if self.fail_delete {
                    return Err(StorageError::Io(std::io::Error::other("disk unavailable")));
                }
                self.files.lock().unwrap().retain(|k| k != key);
                Ok(())
            })
        }

        fn max_file_size(&self) -> usize {
            1024
        }
    }

    async fn insert_student(pool: &PgPool) -> UserId {
        sqlx::query_scalar(
            r#"INSERT INTO users (first_name, last_name, email, password, role)
               VALUES ('Grace', 'Hopper', $1, '$2b$10$test', $2)
               RETURNING id"#,
        )
        .bind(format!("student-{}@test.com", Uuid::new_v4()))
        .bind(UserRole::Student)
        .fetch_one(pool)
        .await
        .unwrap()
    }

    fn submission() -> SubmitLeaveRequest {
        let from_date = Utc::now().date_naive() + Duration::days(3);
        SubmitLeaveRequest {
            from_date,
            to_date: from_date + Duration::days(1),
            leave_type: LeaveType::Sick,
            reason: "Dentist appointment in the morning".to_string(),
        }
    }

    fn evidence() -> Option<EvidenceUpload> {
        Some(EvidenceUpload {
            filename: "note.pdf".to_string(),
            content: b"%PDF".to_vec(),
        })
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_failed_insert_removes_saved_evidence(pool: PgPool) {
        let storage = MemoryStorage::default();
        let missing_student = UserId::new();

        let result = LeaveRequestService::submit_leave_request(
            &pool,
            &storage,
            missing_student,
            submission(),
            evidence(),
        )
        .await;

        assert!(result.is_err());
        assert!(storage.keys().is_empty());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_submit_keeps_evidence_on_success(pool: PgPool) {
        let storage = MemoryStorage::default();
        let student = insert_student(&pool).await;

        let request = LeaveRequestService::submit_leave_request(
            &pool,
            &storage,
            student,
            submission(),
            evidence(),
        )
        .await
        .unwrap();

        assert_eq!(storage.keys(), vec![request.evidence_file.unwrap()]);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn test_withdraw_keeps_row_when_evidence_delete_fails(pool: PgPool) {
        let storage = MemoryStorage::failing_delete();
        let student = insert_student(&pool).await;
        let request = LeaveRequestService::submit_leave_request(
            &pool,
            &storage,
            student,
            submission(),
            evidence(),
        )
        .await
        .unwrap();

        let err = LeaveRequestService::delete_leave_request(
            &pool,
            &storage,
            Scope::Student(student),
            request.id,
        )
        .await
        .unwrap_err();

        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM leave_requests WHERE id = $1")
            .bind(request.id)
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(remaining, 1);
        assert_eq!(storage.keys().len(), 1);
    }
}
