//! Classes, subjects and enrollments.

use std::error::Error;
use std::time::Instant;

use fake::Fake;
use fake::faker::lorem::en::Sentence;
use rollcall_models::{ClassId, SubjectId, UserId};
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::models::{ClassSeed, SubjectSeed};

const SUBJECT_CATALOGUE: &[(&str, &str)] = &[
    ("Mathematics", "MAT"),
    ("English Language", "ENG"),
    ("Biology", "BIO"),
    ("Chemistry", "CHE"),
    ("Physics", "PHY"),
    ("History", "HIS"),
    ("Geography", "GEO"),
    ("Computer Science", "CSC"),
    ("Art", "ART"),
    ("Music", "MUS"),
    ("Physical Education", "PED"),
    ("Economics", "ECO"),
];

const SECTIONS: &[&str] = &["A", "B", "C", "D"];

/// Grades 7 upward, `SECTIONS.len()` classes per grade.
pub fn generate_classes(count: usize, run_tag: &str) -> Vec<ClassSeed> {
    (0..count)
        .map(|idx| {
            let grade = format!("{}", 7 + idx / SECTIONS.len());
            let section = SECTIONS[idx % SECTIONS.len()];
            ClassSeed {
                name: format!("Grade {}{} ({})", grade, section, run_tag),
                grade,
                description: Some(Sentence(4..10).fake()),
            }
        })
        .collect()
}

/// Codes stay within 10 characters: three-letter prefix, two-digit index, run tag.
pub fn generate_subjects(count: usize, run_tag: &str) -> Vec<SubjectSeed> {
    (0..count)
        .map(|idx| {
            let (name, prefix) = SUBJECT_CATALOGUE[idx % SUBJECT_CATALOGUE.len()];
            let round = idx / SUBJECT_CATALOGUE.len();
            let name = if round == 0 {
                name.to_string()
            } else {
                format!("{} {}", name, round + 1)
            };
            SubjectSeed {
                name,
                code: format!("{}{:02}{}", prefix, idx % 100, run_tag),
                description: Some(Sentence(4..10).fake()),
            }
        })
        .collect()
}

pub async fn seed_classes(db: &PgPool, classes: &[ClassSeed]) -> Result<Vec<ClassId>, Box<dyn Error>> {
    let start_time = Instant::now();
    println!("🏫 Seeding {} classes...", classes.len());
    if classes.is_empty() {
        return Ok(Vec::new());
    }

    let mut query = QueryBuilder::<Postgres>::new("INSERT INTO classes (name, grade, description) ");
    query.push_values(classes, |mut row, class| {
        row.push_bind(&class.name)
            .push_bind(&class.grade)
            .push_bind(class.description.as_deref());
    });
    query.push(" RETURNING id");
    let ids: Vec<ClassId> = query.build_query_scalar().fetch_all(db).await?;

    println!("   ✓ Inserted {} classes in {:?}", ids.len(), start_time.elapsed());
    Ok(ids)
}

pub async fn seed_subjects(
    db: &PgPool,
    subjects: &[SubjectSeed],
) -> Result<Vec<SubjectId>, Box<dyn Error>> {
    let start_time = Instant::now();
    println!("📚 Seeding {} subjects...", subjects.len());
    if subjects.is_empty() {
        return Ok(Vec::new());
    }

    let mut query =
        QueryBuilder::<Postgres>::new("INSERT INTO subjects (name, code, description) ");
    query.push_values(subjects, |mut row, subject| {
        row.push_bind(&subject.name)
            .push_bind(&subject.code)
            .push_bind(subject.description.as_deref());
    });
    query.push(" RETURNING id");
    let ids: Vec<SubjectId> = query.build_query_scalar().fetch_all(db).await?;

    println!("   ✓ Inserted {} subjects in {:?}", ids.len(), start_time.elapsed());
    Ok(ids)
}

/// Enrolls consecutive runs of `per_class` students into each class.
pub async fn seed_enrollments(
    db: &PgPool,
    class_ids: &[ClassId],
    student_ids: &[UserId],
    per_class: usize,
) -> Result<u64, Box<dyn Error>> {
    let start_time = Instant::now();
    let pairs: Vec<(ClassId, UserId)> = class_ids
        .iter()
        .zip(student_ids.chunks(per_class.max(1)))
        .flat_map(|(&class_id, students)| students.iter().map(move |&s| (class_id, s)))
        .collect();
    println!("📝 Enrolling {} students...", pairs.len());

    let mut inserted = 0;
    for chunk in pairs.chunks(5000) {
        let mut query =
            QueryBuilder::<Postgres>::new("INSERT INTO class_enrollments (class_id, student_id) ");
        query.push_values(chunk, |mut row, (class_id, student_id)| {
            row.push_bind(*class_id).push_bind(*student_id);
        });
        inserted += query.build().execute(db).await?.rows_affected();
    }

    println!("   ✓ Inserted {} enrollments in {:?}", inserted, start_time.elapsed());
    Ok(inserted)
}

/// Deletes all classes and subjects. Schedules and enrollments cascade.
pub async fn clear_academics(db: &PgPool) -> Result<(), Box<dyn Error>> {
    let classes = sqlx::query("DELETE FROM classes")
        .execute(db)
        .await?
        .rows_affected();
    let subjects = sqlx::query("DELETE FROM subjects")
        .execute(db)
        .await?
        .rows_affected();
    println!("   ✓ Deleted {} classes and {} subjects", classes, subjects);
    Ok(())
}
