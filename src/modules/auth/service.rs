use sqlx::PgPool;
use tracing::instrument;

use rollcall_auth::{create_access_token, create_refresh_token, verify_refresh_token};
use rollcall_config::JwtConfig;
use rollcall_core::{AppError, hash_password, verify_password};
use rollcall_models::users::USER_COLUMNS;
use rollcall_models::{User, UserId, UserRole};

use crate::metrics;

use super::model::{
    LoginRequest, LoginResponse, RefreshTokenRequest, RefreshTokenResponse, RegisterRequestDto,
};

const INVALID_CREDENTIALS: &str = "Invalid email or password";

pub struct AuthService;

impl AuthService {
    /// Self-registration always yields a student account.
    #[instrument(skip(db, dto), fields(email = %dto.email))]
    pub async fn register_user(db: &PgPool, dto: RegisterRequestDto) -> Result<User, AppError> {
        let hashed_password = hash_password(&dto.password)?;

        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (first_name, last_name, email, password, role, student_number)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&dto.first_name)
        .bind(&dto.last_name)
        .bind(&dto.email)
        .bind(&hashed_password)
        .bind(UserRole::Student)
        .bind(&dto.student_number)
        .fetch_one(db)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e
                && db_err.is_unique_violation()
            {
                return AppError::conflict(anyhow::anyhow!(
                    "Email or student number already exists"
                ));
            }
            AppError::from(e)
        })?;

        metrics::track_user_created(user.role.as_str());

        Ok(user)
    }

    #[instrument(skip(db, dto, jwt_config), fields(email = %dto.email))]
    pub async fn login_user(
        db: &PgPool,
        dto: LoginRequest,
        jwt_config: &JwtConfig,
    ) -> Result<LoginResponse, AppError> {
        #[derive(sqlx::FromRow)]
        struct UserWithPassword {
            #[sqlx(flatten)]
            user: User,
            password: String,
        }

        let Some(found) = sqlx::query_as::<_, UserWithPassword>(&format!(
            "SELECT {USER_COLUMNS}, password FROM users WHERE email = $1"
        ))
        .bind(&dto.email)
        .fetch_optional(db)
        .await?
        else {
            metrics::track_user_login_failure("unknown_email");
            return Err(AppError::unauthorized(INVALID_CREDENTIALS.to_string()));
        };

        if !verify_password(&dto.password, &found.password)? {
            metrics::track_user_login_failure("wrong_password");
            return Err(AppError::unauthorized(INVALID_CREDENTIALS.to_string()));
        }

        let user = found.user;
        let access_token = create_access_token(user.id, &user.email, user.role, jwt_config)?;
        let refresh_token = create_refresh_token(user.id, &user.email, jwt_config)?;

        metrics::track_user_login_success(user.role.as_str());
        metrics::track_jwt_issued();

        Ok(LoginResponse {
            access_token,
            refresh_token,
            user,
        })
    }

    /// Issues a new access token. The role comes from the database, so a
    /// role change takes effect on the next refresh.
    #[instrument(skip(db, dto, jwt_config))]
    pub async fn refresh_token(
        db: &PgPool,
        dto: RefreshTokenRequest,
        jwt_config: &JwtConfig,
    ) -> Result<RefreshTokenResponse, AppError> {
        let claims = verify_refresh_token(&dto.refresh_token, jwt_config)?;

        let (user_id, email, role) = sqlx::query_as::<_, (UserId, String, UserRole)>(
            "SELECT id, email, role FROM users WHERE id = $1",
        )
        .bind(claims.sub)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| AppError::unauthorized("User no longer exists".to_string()))?;

        let access_token = create_access_token(user_id, &email, role, jwt_config)?;
        metrics::track_jwt_issued();

        Ok(RefreshTokenResponse { access_token })
    }
}
