//! School records.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Display format for calendar dates.
pub const DATE_FORMAT: &str = "%Y/%m/%d";

/// Timestamp format inside assistant feedback headers.
pub const FEEDBACK_TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: u32,
    pub name: String,
    pub email: String,
    /// Grade label, e.g. `國三` or `高一`.
    pub grade: String,
    pub enrollment_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    pub id: u32,
    pub name: String,
    pub subject: String,
    pub description: String,
    pub teacher_name: String,
    /// Tuition in whole NT dollars.
    pub price: u32,
    pub max_students: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnrollmentStatus {
    Active,
    Completed,
    Dropped,
}

impl EnrollmentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "Active",
            Self::Completed => "Completed",
            Self::Dropped => "Dropped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enrollment {
    pub id: u32,
    pub student_id: u32,
    pub course_id: u32,
    pub enrollment_date: NaiveDate,
    pub final_grade: Option<f32>,
    pub status: EnrollmentStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HomeworkStatus {
    Assigned,
    Submitted,
    Graded,
    Late,
}

impl HomeworkStatus {
    pub const ALL: [Self; 4] = [Self::Assigned, Self::Submitted, Self::Graded, Self::Late];

    /// Wire names, in the same order as [`Self::ALL`].
    pub const NAMES: [&'static str; 4] = ["Assigned", "Submitted", "Graded", "Late"];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Assigned => "Assigned",
            Self::Submitted => "Submitted",
            Self::Graded => "Graded",
            Self::Late => "Late",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Homework {
    pub id: u32,
    pub student_id: u32,
    pub course_id: u32,
    pub title: String,
    pub description: String,
    pub submitted_content: Option<String>,
    pub assigned_date: NaiveDate,
    pub due_date: NaiveDate,
    pub submitted_date: Option<NaiveDate>,
    pub score: Option<u32>,
    pub feedback: Option<String>,
    pub status: HomeworkStatus,
}

impl Homework {
    /// Append `entry` after any existing feedback, separated by a blank line.
    ///
    /// Existing feedback is never overwritten.
    pub fn append_feedback(&mut self, entry: &str) {
        match &mut self.feedback {
            Some(existing) if !existing.is_empty() => {
                existing.push_str("\n\n");
                existing.push_str(entry);
            }
            _ => self.feedback = Some(entry.to_string()),
        }
    }
}

/// Header-stamped feedback entry written by the assistant.
pub fn assistant_feedback_entry(at: NaiveDateTime, feedback: &str) -> String {
    format!(
        "[AI 助理 {}]\n{feedback}",
        at.format(FEEDBACK_TIMESTAMP_FORMAT)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn homework(feedback: Option<&str>) -> Homework {
        let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        Homework {
            id: 1,
            student_id: 1,
            course_id: 1,
            title: "二次函數練習".into(),
            description: String::new(),
            submitted_content: None,
            assigned_date: day,
            due_date: day,
            submitted_date: None,
            score: None,
            feedback: feedback.map(ToString::to_string),
            status: HomeworkStatus::Assigned,
        }
    }

    #[test]
    fn feedback_entry_header() {
        let at = NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(9, 5, 0)
            .unwrap();
        assert_eq!(
            assistant_feedback_entry(at, "很好"),
            "[AI 助理 2024/05/01 09:05]\n很好"
        );
    }

    #[test]
    fn append_keeps_existing_feedback() {
        let mut hw = homework(Some("計算正確，但要注意圖形標示"));
        hw.append_feedback("[AI 助理 2024/05/01 09:05]\nY");
        assert_eq!(
            hw.feedback.as_deref(),
            Some("計算正確，但要注意圖形標示\n\n[AI 助理 2024/05/01 09:05]\nY")
        );
    }

    #[test]
    fn append_to_empty_sets_entry() {
        let mut hw = homework(None);
        hw.append_feedback("entry");
        assert_eq!(hw.feedback.as_deref(), Some("entry"));

        let mut hw = homework(Some(""));
        hw.append_feedback("entry");
        assert_eq!(hw.feedback.as_deref(), Some("entry"));
    }

    #[test]
    fn status_parse_round_trip() {
        for (status, name) in HomeworkStatus::ALL.into_iter().zip(HomeworkStatus::NAMES) {
            assert_eq!(status.as_str(), name);
            assert_eq!(HomeworkStatus::parse(name), Some(status));
        }
        assert_eq!(HomeworkStatus::parse("Lost"), None);
    }
}
