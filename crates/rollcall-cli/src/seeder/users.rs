//! Teacher and student generation.

use std::error::Error;
use std::time::Instant;

use fake::Fake;
use fake::faker::name::en::*;
use rayon::prelude::*;
use rollcall_models::{UserId, UserRole};
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::models::UserSeed;

// 6 params per user
const BATCH_SIZE: usize = 1000;

pub fn generate_teachers(count: usize, run_tag: &str, password_hash: &str) -> Vec<UserSeed> {
    (0..count)
        .into_par_iter()
        .map(|idx| generate_user(UserRole::Teacher, idx, run_tag, password_hash))
        .collect()
}

/// Students numbered consecutively, `students_per_class` for each class.
pub fn generate_students(count: usize, run_tag: &str, password_hash: &str) -> Vec<UserSeed> {
    (0..count)
        .into_par_iter()
        .map(|idx| {
            let mut user = generate_user(UserRole::Student, idx, run_tag, password_hash);
            user.student_number = Some(format!("{}-{:05}", run_tag, idx + 1));
            user
        })
        .collect()
}

fn generate_user(role: UserRole, idx: usize, run_tag: &str, password_hash: &str) -> UserSeed {
    let first_name: String = FirstName().fake();
    let last_name: String = LastName().fake();

    let email = format!(
        "{}.{}+{}{}.{}@example.com",
        first_name.to_lowercase(),
        last_name.to_lowercase(),
        role,
        idx,
        run_tag
    );

    UserSeed {
        first_name,
        last_name,
        email,
        password_hash: password_hash.to_string(),
        role,
        student_number: None,
    }
}

pub async fn seed_users(
    db: &PgPool,
    label: &str,
    users: &[UserSeed],
) -> Result<Vec<UserId>, Box<dyn Error>> {
    let start_time = Instant::now();
    println!("👥 Seeding {} {}...", users.len(), label);

    let mut tx = db.begin().await?;
    let mut ids = Vec::with_capacity(users.len());

    for chunk in users.chunks(BATCH_SIZE) {
        let mut query = QueryBuilder::<Postgres>::new(
            "INSERT INTO users (first_name, last_name, email, password, role, student_number) ",
        );
        query.push_values(chunk, |mut row, user| {
            row.push_bind(&user.first_name)
                .push_bind(&user.last_name)
                .push_bind(&user.email)
                .push_bind(&user.password_hash)
                .push_bind(user.role)
                .push_bind(user.student_number.as_deref());
        });
        query.push(" RETURNING id");

        let chunk_ids: Vec<UserId> = query.build_query_scalar().fetch_all(&mut *tx).await?;
        ids.extend(chunk_ids);
    }

    tx.commit().await?;
    println!("   ✓ Inserted {} {} in {:?}", ids.len(), label, start_time.elapsed());
    Ok(ids)
}

/// Deletes every non-admin account. Attendance, enrollments and leave
/// requests go with them.
pub async fn clear_users(db: &PgPool) -> Result<u64, Box<dyn Error>> {
    let deleted = sqlx::query("DELETE FROM users WHERE role <> $1")
        .bind(UserRole::Admin)
        .execute(db)
        .await?
        .rows_affected();
    println!("   ✓ Deleted {} users", deleted);
    Ok(deleted)
}
