use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use tracing::instrument;

use rollcall_core::{AppError, PaginationMeta, hash_password};
use rollcall_models::schedules::{SCHEDULE_VIEW_SELECT, ScheduleView};
use rollcall_models::{UserId, UserRole};

use crate::metrics;
use crate::modules::classes::service::ClassService;
use crate::modules::users::model::{
    CreateUserDto, PaginatedUsersResponse, USER_COLUMNS, UpdateUserDto, User, UserDetail,
    UserFilterParams,
};

fn map_unique_violation(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db_err) = &e
        && db_err.is_unique_violation()
    {
        return AppError::conflict(anyhow::anyhow!(
            "Email or student number already exists"
        ));
    }
    AppError::from(e)
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filters: &UserFilterParams) {
    if let Some(role) = filters.role {
        qb.push(" AND role = ").push_bind(role);
    }
    if let Some(search) = filters.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        qb.push(
            " AND (first_name || ' ' || last_name || ' ' || email || ' ' || COALESCE(student_number, '')) ILIKE ",
        )
        .push_bind(format!("%{}%", search));
    }
}

/// Fails when `user_id` is the only admin left. Locks every admin row
/// (in id order) so concurrent removals queue behind each other.
async fn ensure_not_last_admin(
    conn: &mut PgConnection,
    user_id: UserId,
    message: &str,
) -> Result<(), AppError> {
    let admins = sqlx::query_scalar::<_, UserId>(
        "SELECT id FROM users WHERE role = $1 ORDER BY id FOR UPDATE",
    )
    .bind(UserRole::Admin)
    .fetch_all(conn)
    .await?;

    if admins.contains(&user_id) && admins.len() <= 1 {
        return Err(AppError::conflict(anyhow::anyhow!(message.to_string())));
    }
    Ok(())
}

pub struct UserService;

impl UserService {
    #[instrument(skip(db, dto), fields(email = %dto.email, role = %dto.role))]
    pub async fn create_user(db: &PgPool, dto: CreateUserDto) -> Result<User, AppError> {
        let hashed_password = hash_password(&dto.password)?;
        let mut tx = db.begin().await?;

        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (first_name, last_name, email, password, role, student_number, phone, address)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&dto.first_name)
        .bind(&dto.last_name)
        .bind(&dto.email)
        .bind(&hashed_password)
        .bind(dto.role)
        .bind(&dto.student_number)
        .bind(&dto.phone)
        .bind(&dto.address)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_unique_violation)?;

        if user.role == UserRole::Student
            && let Some(class_ids) = &dto.class_ids
        {
            ClassService::sync_student_classes(&mut tx, user.id, class_ids).await?;
        }

        tx.commit().await?;
        metrics::track_user_created(user.role.as_str());

        Ok(user)
    }

    #[instrument(skip(db))]
    pub async fn get_users(
        db: &PgPool,
        filters: UserFilterParams,
    ) -> Result<PaginatedUsersResponse, AppError> {
        let limit = filters.pagination.limit();
        let offset = filters.pagination.offset();

        let mut count_query = QueryBuilder::new("SELECT COUNT(*) FROM users WHERE TRUE");
        push_filters(&mut count_query, &filters);
        let total = count_query
            .build_query_scalar::<i64>()
            .fetch_one(db)
            .await?;

        let mut data_query = QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM users WHERE TRUE"));
        push_filters(&mut data_query, &filters);
        data_query
            .push(" ORDER BY created_at DESC, id LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        let users = data_query.build_query_as::<User>().fetch_all(db).await?;

        Ok(PaginatedUsersResponse {
            data: users,
            meta: PaginationMeta::new(total, &filters.pagination),
        })
    }

    /// The user plus active classes for students or teaching schedules for
    /// teachers.
    #[instrument(skip(db))]
    pub async fn get_user(db: &PgPool, user_id: UserId) -> Result<UserDetail, AppError> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(user_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::not_found(anyhow::anyhow!("User not found")))?;

        let classes = match user.role {
            UserRole::Student => ClassService::get_classes_of_student(db, user.id).await?,
            _ => Vec::new(),
        };

        let schedules = match user.role {
            UserRole::Teacher => {
                sqlx::query_as::<_, ScheduleView>(&format!(
                    "{SCHEDULE_VIEW_SELECT}
                     WHERE s.teacher_id = $1 AND s.is_active
                     ORDER BY s.day_of_week, s.start_time"
                ))
                .bind(user.id)
                .fetch_all(db)
                .await?
            }
            _ => Vec::new(),
        };

        Ok(UserDetail {
            user,
            classes,
            schedules,
        })
    }

    /// Partial update. Demoting the last admin is refused; `class_ids`
    /// replaces a student's enrollments.
    #[instrument(skip(db, dto))]
    pub async fn update_user(
        db: &PgPool,
        user_id: UserId,
        dto: UpdateUserDto,
    ) -> Result<User, AppError> {
        let hashed_password = dto.password.as_deref().map(hash_password).transpose()?;
        let mut tx = db.begin().await?;

        let current_role =
            sqlx::query_scalar::<_, UserRole>("SELECT role FROM users WHERE id = $1")
                .bind(user_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| AppError::not_found(anyhow::anyhow!("User not found")))?;

        if current_role == UserRole::Admin
            && dto.role.is_some_and(|role| role != UserRole::Admin)
        {
            ensure_not_last_admin(&mut tx, user_id, "Cannot demote the last admin").await?;
        }

        let user = sqlx::query_as::<_, User>(&format!(
            "UPDATE users
             SET first_name = COALESCE($1, first_name),
                 last_name = COALESCE($2, last_name),
                 email = COALESCE($3, email),
                 password = COALESCE($4, password),
                 role = COALESCE($5, role),
                 student_number = COALESCE($6, student_number),
                 phone = COALESCE($7, phone),
                 address = COALESCE($8, address),
                 updated_at = NOW()
             WHERE id = $9
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&dto.first_name)
        .bind(&dto.last_name)
        .bind(&dto.email)
        .bind(&hashed_password)
        .bind(dto.role)
        .bind(&dto.student_number)
        .bind(&dto.phone)
        .bind(&dto.address)
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_unique_violation)?;

        if user.role == UserRole::Student
            && let Some(class_ids) = &dto.class_ids
        {
            ClassService::sync_student_classes(&mut tx, user.id, class_ids).await?;
        }

        tx.commit().await?;

        Ok(user)
    }

    /// Cascades to the user's enrollments, schedules, attendance and leave
    /// requests.
    #[instrument(skip(db))]
    pub async fn delete_user(db: &PgPool, user_id: UserId) -> Result<(), AppError> {
        let mut tx = db.begin().await?;

        let role = sqlx::query_scalar::<_, UserRole>("SELECT role FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::not_found(anyhow::anyhow!("User not found")))?;

        if role == UserRole::Admin {
            ensure_not_last_admin(&mut tx, user_id, "Cannot delete the last admin").await?;
        }

        sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }
}
