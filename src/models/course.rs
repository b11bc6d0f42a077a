use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::error::AppError;

/// Periods per day on the timetable (08:10 through 18:30).
pub const PERIODS_PER_DAY: i32 = 10;

/// A course's fixed weekly time slot. Periods are an inclusive integer
/// range; weekday 1 is Monday, 7 is Sunday.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct WeeklyOccurrence {
    pub weekday: i32,
    pub start_period: i32,
    pub end_period: i32,
}

impl WeeklyOccurrence {
    /// Two occurrences collide iff they fall on the same weekday and their
    /// period ranges intersect. Symmetric; an occurrence overlaps itself.
    pub fn overlaps(&self, other: &WeeklyOccurrence) -> bool {
        self.weekday == other.weekday
            && self.start_period <= other.end_period
            && other.start_period <= self.end_period
    }

    /// Range validation happens here, at construction time, so `overlaps`
    /// can stay a total function over well-formed inputs.
    pub fn validate(&self) -> Result<(), AppError> {
        if !(1..=7).contains(&self.weekday) {
            return Err(AppError::BadRequest(format!(
                "weekday must be 1-7, got {}",
                self.weekday
            )));
        }
        if self.start_period < 1
            || self.end_period > PERIODS_PER_DAY
            || self.start_period > self.end_period
        {
            return Err(AppError::BadRequest(format!(
                "invalid period range {}-{}",
                self.start_period, self.end_period
            )));
        }
        Ok(())
    }

    pub fn span(&self) -> i32 {
        self.end_period - self.start_period + 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum CourseStatus {
    Open,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum CourseType {
    Required,
    Elective,
    GeneralRequired,
    GeneralElective,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CourseOffering {
    pub id: String,
    pub course_code: String,
    pub course_name: String,
    pub course_type: CourseType,
    pub description: String,
    pub credits: i32,
    pub academic_year: String,
    pub semester: String,
    pub department: String,
    pub classroom: String,
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub occurrence: WeeklyOccurrence,
    pub capacity: i32,
    pub enrolled_count: i32,
    pub status: CourseStatus,
    pub created_at: String,
}

impl CourseOffering {
    pub fn is_full(&self) -> bool {
        self.enrolled_count >= self.capacity
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCourseRequest {
    pub course_code: String,
    pub course_name: String,
    pub course_type: CourseType,
    #[serde(default)]
    pub description: String,
    pub credits: i32,
    pub academic_year: String,
    pub semester: String,
    pub department: String,
    pub classroom: String,
    pub weekday: i32,
    pub start_period: i32,
    pub end_period: i32,
    pub capacity: i32,
}

impl NewCourseRequest {
    pub fn occurrence(&self) -> WeeklyOccurrence {
        WeeklyOccurrence {
            weekday: self.weekday,
            start_period: self.start_period,
            end_period: self.end_period,
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        self.occurrence().validate()?;
        if self.capacity < 1 {
            return Err(AppError::BadRequest(format!(
                "capacity must be positive, got {}",
                self.capacity
            )));
        }
        if self.credits < 0 {
            return Err(AppError::BadRequest(format!(
                "credits must not be negative, got {}",
                self.credits
            )));
        }
        if self.semester != "1" && self.semester != "2" {
            return Err(AppError::BadRequest(format!(
                "semester must be \"1\" or \"2\", got {:?}",
                self.semester
            )));
        }
        Ok(())
    }
}

/// Course row as returned by search and favorites listings, annotated with
/// the calling student's relationship to it.
#[derive(Debug, Clone, Serialize)]
pub struct CourseSummary {
    #[serde(flatten)]
    pub course: CourseOffering,
    pub is_full: bool,
    pub is_favorited: bool,
    pub is_enrolled: bool,
}

impl CourseSummary {
    pub fn new(course: CourseOffering, is_favorited: bool, is_enrolled: bool) -> Self {
        let is_full = course.is_full();
        Self {
            course,
            is_full,
            is_favorited,
            is_enrolled,
        }
    }
}
