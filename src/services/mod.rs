pub mod ledger;
pub mod timetable;

pub use ledger::{CreditSummary, EnrollmentLedger};
pub use timetable::{Timetable, TimetableCell, TimetableEntry};
