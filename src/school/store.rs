use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use super::models::{Course, Enrollment, Homework, HomeworkStatus, Student};

/// Default number of homework records returned per lookup.
pub const DEFAULT_HOMEWORK_LIMIT: usize = 10;

/// Filter for homework lookups.
///
/// Names match by substring, so `小明` finds `張小明`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HomeworkQuery {
    pub student_name: String,
    pub course_name: Option<String>,
    pub status: Option<HomeworkStatus>,
    pub limit: usize,
}

impl HomeworkQuery {
    pub fn for_student(name: impl Into<String>) -> Self {
        Self {
            student_name: name.into(),
            course_name: None,
            status: None,
            limit: DEFAULT_HOMEWORK_LIMIT,
        }
    }
}

/// A homework record joined with its student and course names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HomeworkRecord {
    pub homework: Homework,
    pub student_name: String,
    pub course_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrolledCourse {
    pub enrollment: Enrollment,
    pub course: Course,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StudentProfile {
    pub student: Student,
    pub enrollments: Vec<EnrolledCourse>,
}

/// A course with its enrollment counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CourseListing {
    pub course: Course,
    pub total_enrollments: usize,
    pub active_enrollments: usize,
}

impl CourseListing {
    pub fn remaining_seats(&self) -> u32 {
        let taken = u32::try_from(self.active_enrollments).unwrap_or(u32::MAX);
        self.course.max_students.saturating_sub(taken)
    }

    pub fn is_open(&self) -> bool {
        self.remaining_seats() > 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RosterEntry {
    pub student: Student,
    pub enrollment: Enrollment,
}

/// A course with its active roster.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseDetail {
    pub course: Course,
    pub roster: Vec<RosterEntry>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreCounts {
    pub students: usize,
    pub courses: usize,
    pub enrollments: usize,
    pub homework: usize,
}

/// Persistence for student, course, enrollment, and homework records.
///
/// Lookups return `Ok(None)` or an empty list on a miss; `Err` is reserved
/// for backend failures.
#[async_trait]
pub trait SchoolStore: Send + Sync + std::fmt::Debug {
    /// First student whose name contains `name`, with enrollments.
    async fn find_student(&self, name: &str) -> Result<Option<StudentProfile>>;

    /// Matching homework, newest assignment first.
    async fn student_homework(&self, query: &HomeworkQuery) -> Result<Vec<HomeworkRecord>>;

    /// Courses ordered by start date, optionally filtered by subject substring.
    async fn list_courses(&self, subject: Option<&str>) -> Result<Vec<CourseListing>>;

    /// Course by numeric id, falling back to a name substring.
    async fn find_course(&self, identifier: &str) -> Result<Option<CourseDetail>>;

    /// Append a feedback entry to the first homework matching both names.
    ///
    /// Returns the updated record, or `None` if nothing matched. The append is
    /// atomic with respect to other writers.
    async fn append_homework_feedback(
        &self,
        student_name: &str,
        homework_title: &str,
        entry: &str,
    ) -> Result<Option<HomeworkRecord>>;

    async fn counts(&self) -> Result<StoreCounts>;
}
