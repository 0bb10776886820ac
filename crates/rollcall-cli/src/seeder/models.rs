//! Seed rows and the seeding configuration.

use rollcall_models::UserRole;
use rollcall_models::schedules::{DayOfWeek, TimeSlot};

pub struct UserSeed {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password_hash: String,
    pub role: UserRole,
    pub student_number: Option<String>,
}

pub struct ClassSeed {
    pub name: String,
    pub grade: String,
    pub description: Option<String>,
}

pub struct SubjectSeed {
    pub name: String,
    pub code: String,
    pub description: Option<String>,
}

/// A planned lesson. Indices point into the inserted class, subject and
/// teacher id lists.
#[derive(Debug, Clone)]
pub struct ScheduleSeed {
    pub class_idx: usize,
    pub subject_idx: usize,
    pub teacher_idx: usize,
    pub day: DayOfWeek,
    pub slot: TimeSlot,
    pub room: String,
}

#[derive(Debug, Clone)]
pub struct SeedConfig {
    pub classes: usize,
    pub subjects: usize,
    pub teachers: usize,
    pub students_per_class: usize,
    pub periods_per_day: usize,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            classes: 6,
            subjects: 8,
            teachers: 6,
            students_per_class: 25,
            periods_per_day: 6,
        }
    }
}

impl SeedConfig {
    pub fn total_students(&self) -> usize {
        self.classes * self.students_per_class
    }
}
