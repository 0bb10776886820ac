//! Demo-data seeding.
//!
//! Every run stamps its rows with a short random tag so repeated seeds do
//! not collide on unique emails, class names or subject codes.
//!
//! ```ignore
//! use rollcall_cli::seeder::{seed_all, SeedConfig};
//!
//! seed_all(&pool, SeedConfig { classes: 12, ..Default::default() }).await?;
//! ```

pub mod academics;
pub mod models;
pub mod schedules;
pub mod users;

pub use models::SeedConfig;

use std::error::Error;
use std::time::Instant;

use bcrypt::hash;
use sqlx::PgPool;
use uuid::Uuid;

pub const SEED_PASSWORD: &str = "Password@123";

pub async fn seed_all(db: &PgPool, config: SeedConfig) -> Result<(), Box<dyn Error>> {
    let start_time = Instant::now();
    let run_tag = run_tag();

    println!("🌱 Starting database seeding (tag {})...", run_tag);
    println!(
        "   - Classes: {}, Subjects: {}, Teachers: {}",
        config.classes, config.subjects, config.teachers
    );
    println!(
        "   - Students: {} ({} per class), {} periods per day",
        config.total_students(),
        config.students_per_class,
        config.periods_per_day
    );

    let password_hash = hash_password()?;

    let teachers = users::generate_teachers(config.teachers, &run_tag, &password_hash);
    let teacher_ids = users::seed_users(db, "teachers", &teachers).await?;

    let students = users::generate_students(config.total_students(), &run_tag, &password_hash);
    let student_ids = users::seed_users(db, "students", &students).await?;

    let class_ids =
        academics::seed_classes(db, &academics::generate_classes(config.classes, &run_tag)).await?;
    let subject_ids =
        academics::seed_subjects(db, &academics::generate_subjects(config.subjects, &run_tag))
            .await?;

    academics::seed_enrollments(db, &class_ids, &student_ids, config.students_per_class).await?;

    let plan = schedules::plan_schedules(
        class_ids.len(),
        subject_ids.len(),
        teacher_ids.len(),
        config.periods_per_day,
    );
    schedules::seed_schedules(db, &plan, &class_ids, &subject_ids, &teacher_ids).await?;

    println!("\n✅ Seeding complete in {:?}", start_time.elapsed());
    println!("\n📝 Default password for all seeded users: {}", SEED_PASSWORD);
    Ok(())
}

/// Removes seeded data. Admin accounts are kept.
pub async fn clear_all(db: &PgPool) -> Result<(), Box<dyn Error>> {
    let start_time = Instant::now();
    println!("🗑️  Clearing seeded data...");

    academics::clear_academics(db).await?;
    users::clear_users(db).await?;

    println!("✅ Seeded data cleared in {:?}", start_time.elapsed());
    Ok(())
}

fn run_tag() -> String {
    Uuid::new_v4().simple().to_string()[..4].to_string()
}

fn hash_password() -> Result<String, Box<dyn Error>> {
    println!("🔐 Hashing password...");
    let start = Instant::now();
    // Low cost keeps seeding fast; these accounts are for demos only.
    let hash = hash(SEED_PASSWORD, 4).map_err(|e| format!("Failed to hash password: {}", e))?;
    println!("   ✓ Hashed password in {:?}", start.elapsed());
    Ok(hash)
}
