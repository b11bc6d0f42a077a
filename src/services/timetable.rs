use serde::Serialize;

use crate::error::AppError;
use crate::models::{EnrolledCourse, PERIODS_PER_DAY};

pub const WEEKDAYS: usize = 7;

/// What a rendered timetable cell holds. A multi-period course appears once
/// at its starting period with its span; the periods it covers after that
/// are `Suppressed` so the view does not render them independently.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimetableCell {
    Empty,
    Course(TimetableEntry),
    Suppressed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimetableEntry {
    pub course_id: String,
    pub course_code: String,
    pub course_name: String,
    pub classroom: String,
    pub credits: i32,
    pub span: i32,
}

/// Weekly grid, `cells[weekday - 1][period - 1]`, 7 days by 10 periods.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Timetable {
    pub cells: Vec<Vec<TimetableCell>>,
}

impl Timetable {
    pub fn cell(&self, weekday: i32, period: i32) -> &TimetableCell {
        &self.cells[(weekday - 1) as usize][(period - 1) as usize]
    }
}

/// Lays a student's enrollments out on the weekly grid.
///
/// Pure and order-independent: cells are keyed by (weekday, period), never
/// by arrival order. Enrollments that collide on a cell mean the ledger's
/// conflict check was bypassed, so this fails loudly instead of overwriting.
pub fn build(enrollments: &[EnrolledCourse]) -> Result<Timetable, AppError> {
    let mut cells = vec![vec![TimetableCell::Empty; PERIODS_PER_DAY as usize]; WEEKDAYS];

    for enrolled in enrollments {
        let course = &enrolled.course;
        let occ = &course.occurrence;
        if occ.validate().is_err() {
            return Err(AppError::InvariantViolation(format!(
                "malformed occurrence stored for course {}",
                course.id
            )));
        }

        let day = (occ.weekday - 1) as usize;
        for period in occ.start_period..=occ.end_period {
            let slot = &mut cells[day][(period - 1) as usize];
            if *slot != TimetableCell::Empty {
                return Err(AppError::InvariantViolation(format!(
                    "overlapping enrollments at weekday {} period {} ({})",
                    occ.weekday, period, course.course_code
                )));
            }
            *slot = if period == occ.start_period {
                TimetableCell::Course(TimetableEntry {
                    course_id: course.id.clone(),
                    course_code: course.course_code.clone(),
                    course_name: course.course_name.clone(),
                    classroom: course.classroom.clone(),
                    credits: course.credits,
                    span: occ.span(),
                })
            } else {
                TimetableCell::Suppressed
            };
        }
    }

    Ok(Timetable { cells })
}
