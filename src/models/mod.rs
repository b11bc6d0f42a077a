pub mod course;
pub mod enrollment;

pub use course::{
    CourseOffering, CourseStatus, CourseSummary, CourseType, NewCourseRequest, WeeklyOccurrence,
    PERIODS_PER_DAY,
};
pub use enrollment::{EnrolledCourse, EnrollmentRecord};
