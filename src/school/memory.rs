//! In-memory [`SchoolStore`] seeded with demo records.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Days, Local, Months, NaiveDate};
use tokio::sync::RwLock;

use super::models::{
    Course, Enrollment, EnrollmentStatus, Homework, HomeworkStatus, Student,
};
use super::store::{
    CourseDetail, CourseListing, EnrolledCourse, HomeworkQuery, HomeworkRecord, RosterEntry,
    SchoolStore, StoreCounts, StudentProfile,
};

/// Raw tables backing the in-memory store.
#[derive(Debug, Clone, Default)]
pub struct SchoolData {
    pub students: Vec<Student>,
    pub courses: Vec<Course>,
    pub enrollments: Vec<Enrollment>,
    pub homework: Vec<Homework>,
}

fn months_before(day: NaiveDate, n: u32) -> NaiveDate {
    day.checked_sub_months(Months::new(n)).unwrap_or(day)
}

fn months_after(day: NaiveDate, n: u32) -> NaiveDate {
    day.checked_add_months(Months::new(n)).unwrap_or(day)
}

fn days_before(day: NaiveDate, n: u64) -> NaiveDate {
    day.checked_sub_days(Days::new(n)).unwrap_or(day)
}

fn days_after(day: NaiveDate, n: u64) -> NaiveDate {
    day.checked_add_days(Days::new(n)).unwrap_or(day)
}

impl SchoolData {
    /// Demo data set with dates relative to `today`.
    #[allow(clippy::too_many_lines)]
    pub fn seeded(today: NaiveDate) -> Self {
        let students = vec![
            Student {
                id: 1,
                name: "張小明".into(),
                email: "ming@example.com".into(),
                grade: "國三".into(),
                enrollment_date: months_before(today, 3),
            },
            Student {
                id: 2,
                name: "李小華".into(),
                email: "hua@example.com".into(),
                grade: "高一".into(),
                enrollment_date: months_before(today, 2),
            },
            Student {
                id: 3,
                name: "王小美".into(),
                email: "mei@example.com".into(),
                grade: "國二".into(),
                enrollment_date: months_before(today, 1),
            },
        ];

        let courses = vec![
            Course {
                id: 1,
                name: "國三數學總復習".into(),
                subject: "數學".into(),
                description: "國三會考數學總復習".into(),
                teacher_name: "陳老師".into(),
                price: 12_000,
                max_students: 20,
                start_date: months_before(today, 2),
                end_date: months_after(today, 2),
            },
            Course {
                id: 2,
                name: "高一英文".into(),
                subject: "英文".into(),
                description: "高一英文基礎課程".into(),
                teacher_name: "林老師".into(),
                price: 10_000,
                max_students: 25,
                start_date: months_before(today, 1),
                end_date: months_after(today, 3),
            },
            Course {
                id: 3,
                name: "國二物理".into(),
                subject: "物理".into(),
                description: "國二物理觀念建立".into(),
                teacher_name: "黃老師".into(),
                price: 8_000,
                max_students: 15,
                start_date: today,
                end_date: months_after(today, 4),
            },
        ];

        let enrollments = vec![
            Enrollment {
                id: 1,
                student_id: 1,
                course_id: 1,
                enrollment_date: months_before(today, 2),
                final_grade: None,
                status: EnrollmentStatus::Active,
            },
            Enrollment {
                id: 2,
                student_id: 2,
                course_id: 2,
                enrollment_date: months_before(today, 1),
                final_grade: None,
                status: EnrollmentStatus::Active,
            },
            Enrollment {
                id: 3,
                student_id: 3,
                course_id: 3,
                enrollment_date: today,
                final_grade: None,
                status: EnrollmentStatus::Active,
            },
        ];

        let homework = vec![
            Homework {
                id: 1,
                student_id: 1,
                course_id: 1,
                title: "二次函數練習".into(),
                description: "完成課本 P.45-50 題目".into(),
                submitted_content: None,
                assigned_date: days_before(today, 7),
                due_date: days_before(today, 1),
                submitted_date: Some(days_before(today, 2)),
                score: Some(85),
                feedback: Some("計算正確，但要注意圖形標示".into()),
                status: HomeworkStatus::Graded,
            },
            Homework {
                id: 2,
                student_id: 2,
                course_id: 2,
                title: "英文閱讀測驗".into(),
                description: "閱讀文章並回答問題".into(),
                submitted_content: None,
                assigned_date: days_before(today, 5),
                due_date: days_after(today, 2),
                submitted_date: None,
                score: None,
                feedback: None,
                status: HomeworkStatus::Assigned,
            },
            Homework {
                id: 3,
                student_id: 1,
                course_id: 1,
                title: "三角函數應用".into(),
                description: "實際應用題練習".into(),
                submitted_content: Some("已完成前 5 題，第 6 題需要協助".into()),
                assigned_date: days_before(today, 3),
                due_date: days_after(today, 1),
                submitted_date: Some(days_before(today, 1)),
                score: None,
                feedback: None,
                status: HomeworkStatus::Submitted,
            },
        ];

        Self {
            students,
            courses,
            enrollments,
            homework,
        }
    }

    fn student(&self, id: u32) -> Option<&Student> {
        self.students.iter().find(|s| s.id == id)
    }

    fn course(&self, id: u32) -> Option<&Course> {
        self.courses.iter().find(|c| c.id == id)
    }

    fn record(&self, hw: &Homework) -> Option<HomeworkRecord> {
        Some(HomeworkRecord {
            homework: hw.clone(),
            student_name: self.student(hw.student_id)?.name.clone(),
            course_name: self.course(hw.course_id)?.name.clone(),
        })
    }

    fn listing(&self, course: &Course) -> CourseListing {
        let enrolled = self
            .enrollments
            .iter()
            .filter(|e| e.course_id == course.id);
        let (total, active) = enrolled.fold((0, 0), |(t, a), e| {
            (t + 1, a + usize::from(e.status == EnrollmentStatus::Active))
        });
        CourseListing {
            course: course.clone(),
            total_enrollments: total,
            active_enrollments: active,
        }
    }
}

/// Thread-safe in-memory store.
#[derive(Debug, Default)]
pub struct InMemorySchoolStore {
    data: RwLock<SchoolData>,
}

impl InMemorySchoolStore {
    pub fn new(data: SchoolData) -> Self {
        Self {
            data: RwLock::new(data),
        }
    }

    /// Store seeded with the demo data set, dated from today.
    pub fn seeded() -> Self {
        Self::new(SchoolData::seeded(Local::now().date_naive()))
    }

    /// Copy of the current tables.
    pub async fn snapshot(&self) -> SchoolData {
        self.data.read().await.clone()
    }
}

#[async_trait]
impl SchoolStore for InMemorySchoolStore {
    async fn find_student(&self, name: &str) -> Result<Option<StudentProfile>> {
        let data = self.data.read().await;
        let Some(student) = data.students.iter().find(|s| s.name.contains(name)) else {
            return Ok(None);
        };

        let enrollments = data
            .enrollments
            .iter()
            .filter(|e| e.student_id == student.id)
            .filter_map(|e| {
                data.course(e.course_id).map(|c| EnrolledCourse {
                    enrollment: e.clone(),
                    course: c.clone(),
                })
            })
            .collect();

        Ok(Some(StudentProfile {
            student: student.clone(),
            enrollments,
        }))
    }

    async fn student_homework(&self, query: &HomeworkQuery) -> Result<Vec<HomeworkRecord>> {
        let data = self.data.read().await;
        let mut records: Vec<HomeworkRecord> = data
            .homework
            .iter()
            .filter(|hw| query.status.is_none_or(|s| hw.status == s))
            .filter_map(|hw| data.record(hw))
            .filter(|r| r.student_name.contains(&query.student_name))
            .filter(|r| {
                query
                    .course_name
                    .as_deref()
                    .is_none_or(|c| r.course_name.contains(c))
            })
            .collect();

        records.sort_by(|a, b| b.homework.assigned_date.cmp(&a.homework.assigned_date));
        records.truncate(query.limit);
        Ok(records)
    }

    async fn list_courses(&self, subject: Option<&str>) -> Result<Vec<CourseListing>> {
        let data = self.data.read().await;
        let mut listings: Vec<CourseListing> = data
            .courses
            .iter()
            .filter(|c| subject.is_none_or(|s| c.subject.contains(s)))
            .map(|c| data.listing(c))
            .collect();
        listings.sort_by_key(|l| l.course.start_date);
        Ok(listings)
    }

    async fn find_course(&self, identifier: &str) -> Result<Option<CourseDetail>> {
        let data = self.data.read().await;
        let by_id = identifier
            .trim()
            .parse::<u32>()
            .ok()
            .and_then(|id| data.course(id));
        let Some(course) = by_id.or_else(|| data.courses.iter().find(|c| c.name.contains(identifier)))
        else {
            return Ok(None);
        };

        let roster = data
            .enrollments
            .iter()
            .filter(|e| e.course_id == course.id && e.status == EnrollmentStatus::Active)
            .filter_map(|e| {
                data.student(e.student_id).map(|s| RosterEntry {
                    student: s.clone(),
                    enrollment: e.clone(),
                })
            })
            .collect();

        Ok(Some(CourseDetail {
            course: course.clone(),
            roster,
        }))
    }

    async fn append_homework_feedback(
        &self,
        student_name: &str,
        homework_title: &str,
        entry: &str,
    ) -> Result<Option<HomeworkRecord>> {
        let mut data = self.data.write().await;
        let student_ids: Vec<u32> = data
            .students
            .iter()
            .filter(|s| s.name.contains(student_name))
            .map(|s| s.id)
            .collect();

        let Some(idx) = data
            .homework
            .iter()
            .position(|hw| student_ids.contains(&hw.student_id) && hw.title.contains(homework_title))
        else {
            return Ok(None);
        };

        data.homework[idx].append_feedback(entry);
        let updated = data.homework[idx].clone();
        Ok(data.record(&updated))
    }

    async fn counts(&self) -> Result<StoreCounts> {
        let data = self.data.read().await;
        Ok(StoreCounts {
            students: data.students.len(),
            courses: data.courses.len(),
            enrollments: data.enrollments.len(),
            homework: data.homework.len(),
        })
    }
}
