use axum::Json;
use axum::extract::{Path, Query};
use axum::routing::{delete, post};
use axum::{Router, extract::State, http::StatusCode, routing::get};
use serde::{Deserialize, Serialize};

use crate::db::repository::{self, CourseFilter};
use crate::error::AppError;
use crate::models::*;
use crate::services::{CreditSummary, Timetable, timetable};
use crate::state::AppState;

fn default_academic_year() -> String {
    "113".to_string()
}

fn default_semester() -> String {
    "1".to_string()
}

#[derive(Deserialize)]
struct CourseQueryParams {
    #[serde(default = "default_academic_year")]
    academic_year: String,
    semester: Option<String>,
    department: Option<String>,
    weekday: Option<i32>,
    search: Option<String>,
    student_id: Option<String>,
}

#[derive(Deserialize)]
struct TermParams {
    student_id: String,
    #[serde(default = "default_academic_year")]
    academic_year: String,
    #[serde(default = "default_semester")]
    semester: String,
}

#[derive(Deserialize)]
struct StudentRequest {
    student_id: String,
}

#[derive(Serialize)]
struct CourseListResponse {
    courses: Vec<CourseSummary>,
    count: usize,
}

#[derive(Serialize)]
struct EnrolledResponse {
    courses: Vec<EnrolledCourse>,
    count: usize,
    total_credits: i32,
}

#[derive(Serialize)]
struct FavoriteResponse {
    is_favorited: bool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/courses", get(search_courses).post(create_course))
        .route("/courses/{id}", delete(delete_course))
        .route("/courses/{id}/enroll", post(enroll_course))
        .route("/courses/{id}/drop", post(drop_course))
        .route("/courses/{id}/favorite", post(toggle_favorite))
        .route("/courses/enrolled", get(list_enrolled))
        .route("/favorites", get(list_favorites))
        .route("/timetable", get(get_timetable))
        .route("/credits/summary", get(get_credit_summary))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    sqlx::query("select 1").execute(&state.db).await?;
    Ok(StatusCode::OK)
}

async fn search_courses(
    State(state): State<AppState>,
    Query(params): Query<CourseQueryParams>,
) -> Result<Json<CourseListResponse>, AppError> {
    let filter = CourseFilter {
        academic_year: params.academic_year.clone(),
        semester: params.semester.clone(),
        department: params.department,
        weekday: params.weekday,
        search: params.search,
    };
    let courses = repository::search_courses(&state.db, &filter).await?;

    let (favorite_ids, enrolled_ids) = match &params.student_id {
        Some(student_id) => {
            let semester = params.semester.unwrap_or_else(default_semester);
            (
                repository::favorite_course_ids(&state.db, student_id).await?,
                repository::enrolled_course_ids(
                    &state.db,
                    student_id,
                    &params.academic_year,
                    &semester,
                )
                .await?,
            )
        }
        None => (Vec::new(), Vec::new()),
    };

    let courses: Vec<CourseSummary> = courses
        .into_iter()
        .map(|course| {
            let is_favorited = favorite_ids.contains(&course.id);
            let is_enrolled = enrolled_ids.contains(&course.id);
            CourseSummary::new(course, is_favorited, is_enrolled)
        })
        .collect();

    let count = courses.len();
    Ok(Json(CourseListResponse { courses, count }))
}

async fn create_course(
    State(state): State<AppState>,
    Json(req): Json<NewCourseRequest>,
) -> Result<(StatusCode, Json<CourseOffering>), AppError> {
    req.validate()?;
    let course_code = req.course_code.clone();
    // Uniqueness rides on the UNIQUE constraint rather than a racy
    // check-then-insert; a losing create maps back to a client error.
    let course = repository::insert_course(&state.db, req)
        .await
        .map_err(|err| match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => AppError::BadRequest(
                format!("course code {course_code} already exists"),
            ),
            _ => AppError::Database(err),
        })?;
    Ok((StatusCode::CREATED, Json(course)))
}

async fn delete_course(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    let deleted = repository::delete_course(&state.db, &id).await?;
    if deleted {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound)
    }
}

async fn enroll_course(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<StudentRequest>,
) -> Result<(StatusCode, Json<EnrollmentRecord>), AppError> {
    let record = state.ledger.enroll(&req.student_id, &id).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

async fn drop_course(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<StudentRequest>,
) -> Result<StatusCode, AppError> {
    state.ledger.drop_course(&req.student_id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn toggle_favorite(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<StudentRequest>,
) -> Result<Json<FavoriteResponse>, AppError> {
    let is_favorited = state.ledger.toggle_favorite(&req.student_id, &id).await?;
    Ok(Json(FavoriteResponse { is_favorited }))
}

async fn list_enrolled(
    State(state): State<AppState>,
    Query(params): Query<TermParams>,
) -> Result<Json<EnrolledResponse>, AppError> {
    let courses = state
        .ledger
        .list_enrolled(&params.student_id, &params.academic_year, &params.semester)
        .await?;
    let total_credits = courses.iter().map(|e| e.course.credits).sum();
    let count = courses.len();
    Ok(Json(EnrolledResponse {
        courses,
        count,
        total_credits,
    }))
}

async fn list_favorites(
    State(state): State<AppState>,
    Query(params): Query<TermParams>,
) -> Result<Json<CourseListResponse>, AppError> {
    let favorites = repository::fetch_favorite_courses(&state.db, &params.student_id).await?;
    let enrolled_ids = repository::enrolled_course_ids(
        &state.db,
        &params.student_id,
        &params.academic_year,
        &params.semester,
    )
    .await?;

    let courses: Vec<CourseSummary> = favorites
        .into_iter()
        .map(|course| {
            let is_enrolled = enrolled_ids.contains(&course.id);
            CourseSummary::new(course, true, is_enrolled)
        })
        .collect();

    let count = courses.len();
    Ok(Json(CourseListResponse { courses, count }))
}

async fn get_timetable(
    State(state): State<AppState>,
    Query(params): Query<TermParams>,
) -> Result<Json<Timetable>, AppError> {
    let courses = state
        .ledger
        .list_enrolled(&params.student_id, &params.academic_year, &params.semester)
        .await?;
    let grid = timetable::build(&courses)?;
    Ok(Json(grid))
}

async fn get_credit_summary(
    State(state): State<AppState>,
    Query(params): Query<TermParams>,
) -> Result<Json<CreditSummary>, AppError> {
    let summary = state
        .ledger
        .credit_summary(&params.student_id, &params.academic_year, &params.semester)
        .await?;
    Ok(Json(summary))
}
