use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use sqlx::sqlite::SqlitePoolOptions;
use tower::ServiceExt;

use backend::api::router;
use backend::state::AppState;

async fn setup_app() -> Router {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create test db");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    router(AppState::new(pool))
}

fn course_body(code: &str, weekday: i64, start: i64, end: i64, capacity: i64) -> Value {
    json!({
        "course_code": code,
        "course_name": format!("Course {code}"),
        "course_type": "elective",
        "credits": 2,
        "academic_year": "113",
        "semester": "1",
        "department": "CS",
        "classroom": "B210",
        "weekday": weekday,
        "start_period": start,
        "end_period": end,
        "capacity": capacity,
    })
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Body was not JSON")
}

async fn create_course(app: &Router, body: &Value) -> Value {
    let response = app
        .clone()
        .oneshot(post_json("/courses", body))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await
}

#[tokio::test]
async fn health_is_ok() {
    let app = setup_app().await;
    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn create_course_rejects_malformed_occurrence() {
    let app = setup_app().await;

    let response = app
        .clone()
        .oneshot(post_json("/courses", &course_body("A001", 9, 1, 2, 50)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "bad_request");

    let response = app
        .oneshot(post_json("/courses", &course_body("A001", 1, 4, 2, 50)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_course_rejects_duplicate_code() {
    let app = setup_app().await;
    create_course(&app, &course_body("A001", 1, 1, 2, 50)).await;

    let response = app
        .oneshot(post_json("/courses", &course_body("A001", 2, 1, 2, 50)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "bad_request");
}

#[tokio::test]
async fn search_flags_enrollment_and_favorites_for_the_student() {
    let app = setup_app().await;
    let a = create_course(&app, &course_body("A001", 1, 1, 2, 50)).await;
    create_course(&app, &course_body("B002", 2, 3, 4, 50)).await;

    let course_id = a["id"].as_str().unwrap();
    let enroll = app
        .clone()
        .oneshot(post_json(
            &format!("/courses/{course_id}/enroll"),
            &json!({"student_id": "s1"}),
        ))
        .await
        .unwrap();
    assert_eq!(enroll.status(), StatusCode::CREATED);

    let favorite = app
        .clone()
        .oneshot(post_json(
            &format!("/courses/{course_id}/favorite"),
            &json!({"student_id": "s1"}),
        ))
        .await
        .unwrap();
    assert_eq!(body_json(favorite).await["is_favorited"], true);

    let response = app
        .oneshot(get("/courses?academic_year=113&semester=1&student_id=s1"))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["count"], 2);
    let courses = body["courses"].as_array().unwrap();
    let a_row = courses
        .iter()
        .find(|c| c["course_code"] == "A001")
        .unwrap();
    let b_row = courses
        .iter()
        .find(|c| c["course_code"] == "B002")
        .unwrap();
    assert_eq!(a_row["is_enrolled"], true);
    assert_eq!(a_row["is_favorited"], true);
    assert_eq!(b_row["is_enrolled"], false);
    assert_eq!(b_row["is_favorited"], false);
}

#[tokio::test]
async fn duplicate_enroll_returns_conflict_code() {
    let app = setup_app().await;
    let course = create_course(&app, &course_body("A001", 1, 1, 2, 50)).await;
    let course_id = course["id"].as_str().unwrap();
    let uri = format!("/courses/{course_id}/enroll");
    let body = json!({"student_id": "s1"});

    let first = app.clone().oneshot(post_json(&uri, &body)).await.unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = app.oneshot(post_json(&uri, &body)).await.unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(second).await["error"], "already_enrolled");
}

#[tokio::test]
async fn schedule_conflict_carries_the_conflicting_course_id() {
    let app = setup_app().await;
    let a = create_course(&app, &course_body("A001", 1, 1, 2, 50)).await;
    let b = create_course(&app, &course_body("B002", 1, 2, 3, 50)).await;
    let a_id = a["id"].as_str().unwrap();
    let b_id = b["id"].as_str().unwrap();
    let student = json!({"student_id": "s1"});

    let first = app
        .clone()
        .oneshot(post_json(&format!("/courses/{a_id}/enroll"), &student))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = app
        .oneshot(post_json(&format!("/courses/{b_id}/enroll"), &student))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
    let body = body_json(second).await;
    assert_eq!(body["error"], "schedule_conflict");
    assert_eq!(body["conflicting_course_id"], a_id);
}

#[tokio::test]
async fn full_course_returns_course_full_code() {
    let app = setup_app().await;
    let course = create_course(&app, &course_body("A001", 1, 1, 2, 1)).await;
    let course_id = course["id"].as_str().unwrap();
    let uri = format!("/courses/{course_id}/enroll");

    let first = app
        .clone()
        .oneshot(post_json(&uri, &json!({"student_id": "s1"})))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = app
        .oneshot(post_json(&uri, &json!({"student_id": "s2"})))
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(second).await["error"], "course_full");
}

#[tokio::test]
async fn drop_then_repeat_drop_is_not_enrolled() {
    let app = setup_app().await;
    let course = create_course(&app, &course_body("A001", 1, 1, 2, 50)).await;
    let course_id = course["id"].as_str().unwrap();
    let student = json!({"student_id": "s1"});

    app.clone()
        .oneshot(post_json(&format!("/courses/{course_id}/enroll"), &student))
        .await
        .unwrap();

    let drop = app
        .clone()
        .oneshot(post_json(&format!("/courses/{course_id}/drop"), &student))
        .await
        .unwrap();
    assert_eq!(drop.status(), StatusCode::NO_CONTENT);

    let again = app
        .oneshot(post_json(&format!("/courses/{course_id}/drop"), &student))
        .await
        .unwrap();
    assert_eq!(again.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(again).await["error"], "not_enrolled");
}

#[tokio::test]
async fn enrolled_listing_reports_total_credits() {
    let app = setup_app().await;
    let a = create_course(&app, &course_body("A001", 1, 1, 2, 50)).await;
    let b = create_course(&app, &course_body("B002", 2, 3, 4, 50)).await;
    let student = json!({"student_id": "s1"});

    for course in [&a, &b] {
        let id = course["id"].as_str().unwrap();
        let response = app
            .clone()
            .oneshot(post_json(&format!("/courses/{id}/enroll"), &student))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let response = app
        .oneshot(get(
            "/courses/enrolled?student_id=s1&academic_year=113&semester=1",
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["count"], 2);
    assert_eq!(body["total_credits"], 4);
}

#[tokio::test]
async fn timetable_renders_span_and_suppressed_cells() {
    let app = setup_app().await;
    // Tuesday, periods 1-3.
    let course = create_course(&app, &course_body("D001", 2, 1, 3, 50)).await;
    let course_id = course["id"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/courses/{course_id}/enroll"),
            &json!({"student_id": "s1"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .oneshot(get("/timetable?student_id=s1&academic_year=113&semester=1"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;

    let tuesday = &body["cells"][1];
    assert_eq!(tuesday[0]["kind"], "course");
    assert_eq!(tuesday[0]["course_code"], "D001");
    assert_eq!(tuesday[0]["span"], 3);
    assert_eq!(tuesday[1]["kind"], "suppressed");
    assert_eq!(tuesday[2]["kind"], "suppressed");
    assert_eq!(tuesday[3]["kind"], "empty");
}

#[tokio::test]
async fn credit_summary_groups_by_course_type() {
    let app = setup_app().await;
    let mut required = course_body("R001", 1, 1, 2, 50);
    required["course_type"] = json!("required");
    required["credits"] = json!(3);
    let r = create_course(&app, &required).await;
    let student = json!({"student_id": "s1"});

    let id = r["id"].as_str().unwrap();
    app.clone()
        .oneshot(post_json(&format!("/courses/{id}/enroll"), &student))
        .await
        .unwrap();

    let response = app
        .oneshot(get(
            "/credits/summary?student_id=s1&academic_year=113&semester=1",
        ))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["required"], 3);
    assert_eq!(body["total"], 3);
}

#[tokio::test]
async fn delete_course_removes_it_from_search() {
    let app = setup_app().await;
    let course = create_course(&app, &course_body("A001", 1, 1, 2, 50)).await;
    let course_id = course["id"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/courses/{course_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.oneshot(get("/courses?academic_year=113")).await.unwrap();
    assert_eq!(body_json(response).await["count"], 0);
}
