use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::course::CourseOffering;

/// One (student, course, term) enrollment. Exists iff the student currently
/// holds a seat in that offering; dropping deletes the row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EnrollmentRecord {
    pub student_id: String,
    pub course_id: String,
    pub academic_year: String,
    pub semester: String,
    pub enrolled_at: String,
}

/// Enrollment joined with its course, as served to listings and the
/// timetable builder.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct EnrolledCourse {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub course: CourseOffering,
    pub enrolled_at: String,
}
