//! Course recommendation scoring.

use chrono::{Days, Months, NaiveDate};
use serde::Serialize;

use super::store::CourseListing;

const BASE_SCORE: u32 = 50;
const GRADE_MATCH_BONUS: u32 = 30;
const SUBJECT_MATCH_BONUS: u32 = 20;
const OPEN_SEATS_BONUS: u32 = 10;
const STARTING_SOON_BONUS: u32 = 5;

/// Course-name keywords associated with a grade label.
///
/// Unknown grades map to no keywords, which disables grade filtering.
pub fn grade_keywords(grade: &str) -> &'static [&'static str] {
    let g = grade.to_lowercase();
    if g.contains("國一") || g.contains("七年級") {
        &["國一", "七年級", "國中基礎"]
    } else if g.contains("國二") || g.contains("八年級") {
        &["國二", "八年級", "國中進階"]
    } else if g.contains("國三") || g.contains("九年級") {
        &["國三", "九年級", "會考", "總復習"]
    } else if g.contains("高一") {
        &["高一", "高中基礎"]
    } else if g.contains("高二") {
        &["高二", "高中進階"]
    } else if g.contains("高三") {
        &["高三", "學測", "指考", "總復習"]
    } else {
        &[]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recommendation {
    pub listing: CourseListing,
    pub score: u32,
}

/// Score a single course for a student.
pub fn score(listing: &CourseListing, grade: &str, preferred_subject: Option<&str>, today: NaiveDate) -> u32 {
    let course = &listing.course;
    let mut score = BASE_SCORE;

    if grade_keywords(grade).iter().any(|k| course.name.contains(k)) {
        score += GRADE_MATCH_BONUS;
    }
    if preferred_subject.is_some_and(|s| course.subject.contains(s)) {
        score += SUBJECT_MATCH_BONUS;
    }
    if listing.remaining_seats() * 2 > course.max_students {
        score += OPEN_SEATS_BONUS;
    }
    let soon = today.checked_add_days(Days::new(7)).unwrap_or(today);
    if course.start_date <= soon {
        score += STARTING_SOON_BONUS;
    }
    score
}

/// Open courses starting within a month that fit the grade and subject,
/// best score first.
pub fn recommend(
    listings: &[CourseListing],
    grade: &str,
    preferred_subject: Option<&str>,
    today: NaiveDate,
) -> Vec<Recommendation> {
    let keywords = grade_keywords(grade);
    let horizon = today.checked_add_months(Months::new(1)).unwrap_or(today);

    let mut picks: Vec<&CourseListing> = listings
        .iter()
        .filter(|l| keywords.is_empty() || keywords.iter().any(|k| l.course.name.contains(k)))
        .filter(|l| preferred_subject.is_none_or(|s| l.course.subject.contains(s)))
        .filter(|l| l.course.start_date <= horizon)
        .filter(|l| l.is_open())
        .collect();
    picks.sort_by_key(|l| l.course.start_date);

    let mut ranked: Vec<Recommendation> = picks
        .into_iter()
        .map(|l| Recommendation {
            listing: l.clone(),
            score: score(l, grade, preferred_subject, today),
        })
        .collect();
    ranked.sort_by(|a, b| b.score.cmp(&a.score));
    ranked
}
