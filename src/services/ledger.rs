use std::borrow::Borrow;
use std::hash::Hash;
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use sqlx::SqlitePool;
use tokio::sync::Mutex;
use tracing::info;

use crate::db::repository;
use crate::error::AppError;
use crate::models::{CourseStatus, CourseType, EnrolledCourse, EnrollmentRecord};

/// Owns every mutation of enrollment records and seat counters. All writes
/// go through here; the HTTP layer never touches those tables directly.
///
/// Admission control is serialized with lazily-created async mutexes, one
/// per student and one per course, so two enrolls racing for the last seat
/// resolve to exactly one winner while unrelated students and courses never
/// contend. `enroll` and `drop_course` take the student lock before the
/// course lock; the fixed order keeps the two lock classes cycle-free.
/// Entries are evicted once no task holds them, so the maps track the
/// working set rather than every key ever seen.
pub struct EnrollmentLedger {
    db: SqlitePool,
    student_locks: DashMap<String, Arc<Mutex<()>>>,
    course_locks: DashMap<String, Arc<Mutex<()>>>,
    // Favorite state is independent of admission control (different
    // resource), so it gets its own lock per (student, course) pair.
    favorite_locks: DashMap<(String, String), Arc<Mutex<()>>>,
}

/// Per-term credit totals, grouped the way the transcript page groups them.
#[derive(Debug, Serialize)]
pub struct CreditSummary {
    pub required: i32,
    pub elective: i32,
    pub general: i32,
    pub total: i32,
}

impl EnrollmentLedger {
    pub fn new(db: SqlitePool) -> Self {
        Self {
            db,
            student_locks: DashMap::new(),
            course_locks: DashMap::new(),
            favorite_locks: DashMap::new(),
        }
    }

    fn lock_for<K>(map: &DashMap<K, Arc<Mutex<()>>>, key: K) -> Arc<Mutex<()>>
    where
        K: Hash + Eq,
    {
        map.entry(key).or_default().clone()
    }

    // Removable only while the map holds the sole reference; `remove_if`
    // runs under the shard lock, which also guards `lock_for`'s clone, so a
    // lock still held (or about to be taken) by another task survives.
    fn prune<K, Q>(map: &DashMap<K, Arc<Mutex<()>>>, key: &Q)
    where
        K: Hash + Eq + Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        map.remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
    }

    /// Enrolls a student in a course for the course's own term.
    ///
    /// Precondition order, first failure wins: course exists, course open,
    /// not already enrolled this term, seat available, no timetable overlap
    /// with the student's current enrollments. The record insert and the
    /// counter increment commit in one transaction, so readers never see one
    /// without the other.
    pub async fn enroll(
        &self,
        student_id: &str,
        course_id: &str,
    ) -> Result<EnrollmentRecord, AppError> {
        let student_lock = Self::lock_for(&self.student_locks, student_id.to_string());
        let course_lock = Self::lock_for(&self.course_locks, course_id.to_string());
        let result = {
            let _student = student_lock.lock().await;
            let _course = course_lock.lock().await;
            self.enroll_under_locks(student_id, course_id).await
        };
        drop(student_lock);
        drop(course_lock);
        Self::prune(&self.student_locks, student_id);
        Self::prune(&self.course_locks, course_id);
        result
    }

    async fn enroll_under_locks(
        &self,
        student_id: &str,
        course_id: &str,
    ) -> Result<EnrollmentRecord, AppError> {
        // Immediate, not deferred: this transaction always writes, and a
        // deferred read-to-write upgrade against another writer fails with
        // SQLITE_BUSY instead of queueing on the busy handler.
        let mut tx = self.db.begin_with("BEGIN IMMEDIATE").await?;

        let course = repository::find_course_by_id(&mut *tx, course_id)
            .await?
            .ok_or(AppError::NotFound)?;
        if course.status == CourseStatus::Closed {
            return Err(AppError::CourseClosed);
        }

        let existing = repository::find_enrollment(
            &mut *tx,
            student_id,
            course_id,
            &course.academic_year,
            &course.semester,
        )
        .await?;
        if existing.is_some() {
            return Err(AppError::AlreadyEnrolled);
        }

        if course.is_full() {
            return Err(AppError::CourseFull);
        }

        let current = repository::fetch_enrolled(
            &mut *tx,
            student_id,
            &course.academic_year,
            &course.semester,
        )
        .await?;
        for enrolled in &current {
            if enrolled.course.occurrence.overlaps(&course.occurrence) {
                return Err(AppError::ScheduleConflict {
                    course_id: enrolled.course.id.clone(),
                    course_name: enrolled.course.course_name.clone(),
                });
            }
        }

        let record = EnrollmentRecord {
            student_id: student_id.to_string(),
            course_id: course_id.to_string(),
            academic_year: course.academic_year.clone(),
            semester: course.semester.clone(),
            enrolled_at: Utc::now().to_rfc3339(),
        };
        repository::insert_enrollment(&mut *tx, &record).await?;

        // The guard can only refuse if the counter moved while we held the
        // admission lock, which would mean a write bypassed the ledger.
        let rows = repository::reserve_seat(&mut *tx, course_id).await?;
        if rows != 1 {
            return Err(AppError::InvariantViolation(format!(
                "seat guard refused course {course_id} under admission lock"
            )));
        }

        tx.commit().await?;
        info!(
            "enrolled: student={} course={} ({})",
            student_id, course.course_code, course.course_name
        );
        Ok(record)
    }

    /// Drops an enrollment, deleting the record and releasing the seat in
    /// one transaction. A drop with no record is `NotEnrolled`, a terminal
    /// condition rather than a silent success.
    pub async fn drop_course(&self, student_id: &str, course_id: &str) -> Result<(), AppError> {
        let student_lock = Self::lock_for(&self.student_locks, student_id.to_string());
        let course_lock = Self::lock_for(&self.course_locks, course_id.to_string());
        let result = {
            let _student = student_lock.lock().await;
            let _course = course_lock.lock().await;
            self.drop_under_locks(student_id, course_id).await
        };
        drop(student_lock);
        drop(course_lock);
        Self::prune(&self.student_locks, student_id);
        Self::prune(&self.course_locks, course_id);
        result
    }

    async fn drop_under_locks(&self, student_id: &str, course_id: &str) -> Result<(), AppError> {
        let mut tx = self.db.begin_with("BEGIN IMMEDIATE").await?;

        let course = repository::find_course_by_id(&mut *tx, course_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let deleted = repository::delete_enrollment(
            &mut *tx,
            student_id,
            course_id,
            &course.academic_year,
            &course.semester,
        )
        .await?;
        if deleted == 0 {
            return Err(AppError::NotEnrolled);
        }

        let rows = repository::release_seat(&mut *tx, course_id).await?;
        if rows != 1 {
            return Err(AppError::InvariantViolation(format!(
                "seat release refused course {course_id} with a record present"
            )));
        }

        tx.commit().await?;
        info!(
            "dropped: student={} course={} ({})",
            student_id, course.course_code, course.course_name
        );
        Ok(())
    }

    /// Flips the favorite mark for (student, course) and returns the new
    /// state. Never looks at capacity or conflicts.
    pub async fn toggle_favorite(
        &self,
        student_id: &str,
        course_id: &str,
    ) -> Result<bool, AppError> {
        let pair_key = (student_id.to_string(), course_id.to_string());
        let pair_lock = Self::lock_for(&self.favorite_locks, pair_key.clone());
        let result = {
            let _pair = pair_lock.lock().await;
            self.toggle_under_lock(student_id, course_id).await
        };
        drop(pair_lock);
        Self::prune(&self.favorite_locks, &pair_key);
        result
    }

    async fn toggle_under_lock(
        &self,
        student_id: &str,
        course_id: &str,
    ) -> Result<bool, AppError> {
        repository::find_course_by_id(&self.db, course_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let removed = repository::delete_favorite(&self.db, student_id, course_id).await?;
        if removed > 0 {
            Ok(false)
        } else {
            repository::insert_favorite(&self.db, student_id, course_id).await?;
            Ok(true)
        }
    }

    /// The student's enrollments for a term, joined with course data and
    /// ordered by (weekday, start period, course code). A single statement,
    /// so the snapshot is consistent with respect to concurrent admissions.
    pub async fn list_enrolled(
        &self,
        student_id: &str,
        academic_year: &str,
        semester: &str,
    ) -> Result<Vec<EnrolledCourse>, AppError> {
        let courses =
            repository::fetch_enrolled(&self.db, student_id, academic_year, semester).await?;
        Ok(courses)
    }

    pub async fn total_credits(
        &self,
        student_id: &str,
        academic_year: &str,
        semester: &str,
    ) -> Result<i32, AppError> {
        let courses = self.list_enrolled(student_id, academic_year, semester).await?;
        Ok(courses.iter().map(|e| e.course.credits).sum())
    }

    pub async fn credit_summary(
        &self,
        student_id: &str,
        academic_year: &str,
        semester: &str,
    ) -> Result<CreditSummary, AppError> {
        let courses = self.list_enrolled(student_id, academic_year, semester).await?;

        let mut summary = CreditSummary {
            required: 0,
            elective: 0,
            general: 0,
            total: 0,
        };
        for enrolled in &courses {
            let credits = enrolled.course.credits;
            match enrolled.course.course_type {
                CourseType::Required => summary.required += credits,
                CourseType::Elective => summary.elective += credits,
                CourseType::GeneralRequired | CourseType::GeneralElective => {
                    summary.general += credits
                }
            }
            summary.total += credits;
        }
        Ok(summary)
    }
}
