//! Conflict-free weekly timetable generation.
//!
//! Each school day is planned independently: a teacher teaches at most one
//! class per period, so no two lessons of one teacher overlap.

use std::error::Error;
use std::time::Instant;

use chrono::{Duration, NaiveTime};
use rayon::prelude::*;
use rollcall_models::schedules::{DayOfWeek, TimeSlot};
use rollcall_models::{ClassId, SubjectId, UserId};
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::models::ScheduleSeed;

pub const SCHOOL_DAYS: [DayOfWeek; 5] = [
    DayOfWeek::Monday,
    DayOfWeek::Tuesday,
    DayOfWeek::Wednesday,
    DayOfWeek::Thursday,
    DayOfWeek::Friday,
];

const PERIOD_MINUTES: i64 = 45;
const BREAK_MINUTES: i64 = 15;

/// The `period`th lesson of the day, starting at 08:00. `None` once a
/// lesson would run past midnight.
pub fn period_slot(period: usize) -> Option<TimeSlot> {
    let first = NaiveTime::from_hms_opt(8, 0, 0)?;
    let offset = Duration::minutes((PERIOD_MINUTES + BREAK_MINUTES) * i64::try_from(period).ok()?);
    let (start, start_wrapped) = first.overflowing_add_signed(offset);
    let (end, end_wrapped) = start.overflowing_add_signed(Duration::minutes(PERIOD_MINUTES));
    if start_wrapped != 0 || end_wrapped != 0 {
        return None;
    }
    TimeSlot::new(start, end).ok()
}

pub fn plan_schedules(
    classes: usize,
    subjects: usize,
    teachers: usize,
    periods_per_day: usize,
) -> Vec<ScheduleSeed> {
    if classes == 0 || subjects == 0 || teachers == 0 {
        return Vec::new();
    }

    SCHOOL_DAYS[..]
        .par_iter()
        .enumerate()
        .flat_map_iter(|(day_idx, &day)| {
            plan_day(day_idx, day, classes, subjects, teachers, periods_per_day)
        })
        .collect()
}

/// Classes beyond the number of free teachers in a period get no lesson then.
fn plan_day(
    day_idx: usize,
    day: DayOfWeek,
    classes: usize,
    subjects: usize,
    teachers: usize,
    periods_per_day: usize,
) -> Vec<ScheduleSeed> {
    let mut seeds = Vec::new();

    for period in 0..periods_per_day {
        let Some(slot) = period_slot(period) else {
            break;
        };
        let mut busy = vec![false; teachers];

        for class_idx in 0..classes {
            let preferred = (class_idx + period + day_idx) % teachers;
            let Some(teacher_idx) = (0..teachers)
                .map(|k| (preferred + k) % teachers)
                .find(|&t| !busy[t])
            else {
                break;
            };
            busy[teacher_idx] = true;

            seeds.push(ScheduleSeed {
                class_idx,
                subject_idx: (class_idx + period + day_idx * periods_per_day) % subjects,
                teacher_idx,
                day,
                slot,
                room: format!("Room {}", 101 + class_idx),
            });
        }
    }

    seeds
}

pub async fn seed_schedules(
    db: &PgPool,
    plan: &[ScheduleSeed],
    class_ids: &[ClassId],
    subject_ids: &[SubjectId],
    teacher_ids: &[UserId],
) -> Result<u64, Box<dyn Error>> {
    let start_time = Instant::now();
    println!("🗓️  Seeding {} schedules...", plan.len());

    let mut inserted = 0;
    for chunk in plan.chunks(2000) {
        let mut query = QueryBuilder::<Postgres>::new(
            "INSERT INTO schedules (class_id, subject_id, teacher_id, day_of_week, start_time, end_time, room) ",
        );
        query.push_values(chunk, |mut row, seed| {
            row.push_bind(class_ids[seed.class_idx])
                .push_bind(subject_ids[seed.subject_idx])
                .push_bind(teacher_ids[seed.teacher_idx])
                .push_bind(seed.day)
                .push_bind(seed.slot.start)
                .push_bind(seed.slot.end)
                .push_bind(&seed.room);
        });
        inserted += query.build().execute(db).await?.rows_affected();
    }

    println!("   ✓ Inserted {} schedules in {:?}", inserted, start_time.elapsed());
    Ok(inserted)
}
