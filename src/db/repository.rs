use chrono::Utc;
use sqlx::{Executor, QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

use crate::models::{CourseOffering, EnrolledCourse, EnrollmentRecord, NewCourseRequest};

const COURSE_COLUMNS: &str = "id, course_code, course_name, course_type, description, credits, \
     academic_year, semester, department, classroom, weekday, start_period, end_period, \
     capacity, enrolled_count, status, created_at";

// Same column set, qualified for joins against the enrollments/favorites tables.
const COURSE_COLUMNS_QUALIFIED: &str =
    "c.id, c.course_code, c.course_name, c.course_type, c.description, c.credits, \
     c.academic_year, c.semester, c.department, c.classroom, c.weekday, c.start_period, \
     c.end_period, c.capacity, c.enrolled_count, c.status, c.created_at";

pub async fn insert_course(
    db: &SqlitePool,
    req: NewCourseRequest,
) -> Result<CourseOffering, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();

    sqlx::query(
        "INSERT INTO courses \
             (id, course_code, course_name, course_type, description, credits, \
             academic_year, semester, department, classroom, weekday, start_period, \
             end_period, capacity, enrolled_count, status, created_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, 'open', ?)",
    )
    .bind(&id)
    .bind(&req.course_code)
    .bind(&req.course_name)
    .bind(req.course_type)
    .bind(&req.description)
    .bind(req.credits)
    .bind(&req.academic_year)
    .bind(&req.semester)
    .bind(&req.department)
    .bind(&req.classroom)
    .bind(req.weekday)
    .bind(req.start_period)
    .bind(req.end_period)
    .bind(req.capacity)
    .bind(&now)
    .execute(db)
    .await?;

    find_course_by_id(db, &id)
        .await?
        .ok_or(sqlx::Error::RowNotFound)
}

pub async fn find_course_by_id<'e, E>(
    db: E,
    id: &str,
) -> Result<Option<CourseOffering>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, CourseOffering>(&format!(
        "SELECT {COURSE_COLUMNS} FROM courses WHERE id = ?"
    ))
    .bind(id)
    .fetch_optional(db)
    .await
}

#[derive(Debug, Default, Clone)]
pub struct CourseFilter {
    pub academic_year: String,
    pub semester: Option<String>,
    pub department: Option<String>,
    pub weekday: Option<i32>,
    pub search: Option<String>,
}

pub async fn search_courses(
    db: &SqlitePool,
    filter: &CourseFilter,
) -> Result<Vec<CourseOffering>, sqlx::Error> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "SELECT {COURSE_COLUMNS} FROM courses WHERE academic_year = "
    ));
    qb.push_bind(&filter.academic_year);

    if let Some(semester) = &filter.semester {
        qb.push(" AND semester = ").push_bind(semester);
    }
    if let Some(department) = &filter.department {
        qb.push(" AND department = ").push_bind(department);
    }
    if let Some(weekday) = filter.weekday {
        qb.push(" AND weekday = ").push_bind(weekday);
    }
    if let Some(search) = &filter.search {
        let pattern = format!("%{}%", search.trim());
        qb.push(" AND (course_code LIKE ")
            .push_bind(pattern.clone())
            .push(" OR course_name LIKE ")
            .push_bind(pattern)
            .push(")");
    }
    qb.push(" ORDER BY course_code");

    qb.build_query_as::<CourseOffering>().fetch_all(db).await
}

pub async fn delete_course(db: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    // enrollments/favorites go with it via ON DELETE CASCADE
    let rows = sqlx::query("DELETE FROM courses WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?
        .rows_affected();
    Ok(rows > 0)
}

pub async fn find_enrollment<'e, E>(
    db: E,
    student_id: &str,
    course_id: &str,
    academic_year: &str,
    semester: &str,
) -> Result<Option<EnrollmentRecord>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, EnrollmentRecord>(
        "SELECT student_id, course_id, academic_year, semester, enrolled_at \
         FROM enrollments \
         WHERE student_id = ? AND course_id = ? AND academic_year = ? AND semester = ?",
    )
    .bind(student_id)
    .bind(course_id)
    .bind(academic_year)
    .bind(semester)
    .fetch_optional(db)
    .await
}

pub async fn insert_enrollment<'e, E>(
    db: E,
    record: &EnrollmentRecord,
) -> Result<(), sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        "INSERT INTO enrollments (student_id, course_id, academic_year, semester, enrolled_at) \
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&record.student_id)
    .bind(&record.course_id)
    .bind(&record.academic_year)
    .bind(&record.semester)
    .bind(&record.enrolled_at)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn delete_enrollment<'e, E>(
    db: E,
    student_id: &str,
    course_id: &str,
    academic_year: &str,
    semester: &str,
) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        "DELETE FROM enrollments \
         WHERE student_id = ? AND course_id = ? AND academic_year = ? AND semester = ?",
    )
    .bind(student_id)
    .bind(course_id)
    .bind(academic_year)
    .bind(semester)
    .execute(db)
    .await?
    .rows_affected();
    Ok(rows)
}

/// The student's current enrollments for a term, joined with their courses.
/// Single statement, so readers always see record and counter together.
pub async fn fetch_enrolled<'e, E>(
    db: E,
    student_id: &str,
    academic_year: &str,
    semester: &str,
) -> Result<Vec<EnrolledCourse>, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query_as::<_, EnrolledCourse>(&format!(
        "SELECT {COURSE_COLUMNS_QUALIFIED}, e.enrolled_at \
         FROM enrollments e JOIN courses c ON c.id = e.course_id \
         WHERE e.student_id = ? AND e.academic_year = ? AND e.semester = ? \
         ORDER BY c.weekday, c.start_period, c.course_code"
    ))
    .bind(student_id)
    .bind(academic_year)
    .bind(semester)
    .fetch_all(db)
    .await
}

/// Takes one seat, guarded so the counter can never pass capacity even if
/// the caller's serialization is broken. Returns rows affected (0 or 1).
pub async fn reserve_seat<'e, E>(db: E, course_id: &str) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        "UPDATE courses SET enrolled_count = enrolled_count + 1 \
         WHERE id = ? AND enrolled_count < capacity",
    )
    .bind(course_id)
    .execute(db)
    .await?
    .rows_affected();
    Ok(rows)
}

/// Releases one seat, guarded against underflow.
pub async fn release_seat<'e, E>(db: E, course_id: &str) -> Result<u64, sqlx::Error>
where
    E: Executor<'e, Database = Sqlite>,
{
    let rows = sqlx::query(
        "UPDATE courses SET enrolled_count = enrolled_count - 1 \
         WHERE id = ? AND enrolled_count > 0",
    )
    .bind(course_id)
    .execute(db)
    .await?
    .rows_affected();
    Ok(rows)
}

pub async fn insert_favorite(
    db: &SqlitePool,
    student_id: &str,
    course_id: &str,
) -> Result<(), sqlx::Error> {
    let now = Utc::now().to_rfc3339();
    sqlx::query("INSERT INTO favorites (student_id, course_id, created_at) VALUES (?, ?, ?)")
        .bind(student_id)
        .bind(course_id)
        .bind(&now)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn delete_favorite(
    db: &SqlitePool,
    student_id: &str,
    course_id: &str,
) -> Result<u64, sqlx::Error> {
    let rows = sqlx::query("DELETE FROM favorites WHERE student_id = ? AND course_id = ?")
        .bind(student_id)
        .bind(course_id)
        .execute(db)
        .await?
        .rows_affected();
    Ok(rows)
}

pub async fn fetch_favorite_courses(
    db: &SqlitePool,
    student_id: &str,
) -> Result<Vec<CourseOffering>, sqlx::Error> {
    sqlx::query_as::<_, CourseOffering>(&format!(
        "SELECT {COURSE_COLUMNS_QUALIFIED} \
         FROM favorites f JOIN courses c ON c.id = f.course_id \
         WHERE f.student_id = ? \
         ORDER BY f.created_at"
    ))
    .bind(student_id)
    .fetch_all(db)
    .await
}

pub async fn favorite_course_ids(
    db: &SqlitePool,
    student_id: &str,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT course_id FROM favorites WHERE student_id = ?")
        .bind(student_id)
        .fetch_all(db)
        .await
}

pub async fn enrolled_course_ids(
    db: &SqlitePool,
    student_id: &str,
    academic_year: &str,
    semester: &str,
) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT course_id FROM enrollments \
         WHERE student_id = ? AND academic_year = ? AND semester = ?",
    )
    .bind(student_id)
    .bind(academic_year)
    .bind(semester)
    .fetch_all(db)
    .await
}
