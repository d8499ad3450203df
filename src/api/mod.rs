use axum::Json;
use axum::extract::Path;
use axum::routing::{patch, post, put};
use axum::{Router, extract::State, http::StatusCode, routing::get};

use crate::db::repository;
use crate::error::AppError;
use crate::models::*;
use crate::services::{EnrollmentService, ProgressService, QuizService};
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/enrollments", post(request_enrollment))
        .route("/enrollments/withdraw", post(withdraw_request))
        .route("/enrollments/{id}/decide", patch(decide))
        .route("/enrollments/{id}/revoke", patch(revoke))
        .route("/courses/{id}/limit", put(set_limit).get(get_limit))
        .route("/courses/{id}/rollup", get(course_roll_up))
        .route("/courses/{id}/completion-rate", get(completion_rate))
        .route(
            "/students/{student_id}/courses/{course_id}/progress",
            get(progress_snapshot),
        )
        .route("/students/{id}/progress", get(student_overview))
        .route("/quizzes/{id}/attempts", post(submit_quiz_attempt))
        .with_state(state)
}

fn enrollment_service(state: &AppState) -> EnrollmentService {
    EnrollmentService::new(
        state.db.clone(),
        state.audit.clone(),
        state.config.strict_capacity_enforcement,
    )
}

async fn health(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    sqlx::query("select 1").execute(&state.db).await?;
    Ok(StatusCode::OK)
}

async fn request_enrollment(
    State(state): State<AppState>,
    Json(req): Json<NewEnrollmentRequest>,
) -> Result<Json<EnrollmentRequest>, AppError> {
    let service = enrollment_service(&state);
    let request = service
        .request_enrollment(&req.student_id, &req.course_id)
        .await?;
    Ok(Json(request))
}

async fn withdraw_request(
    State(state): State<AppState>,
    Json(req): Json<WithdrawRequest>,
) -> Result<StatusCode, AppError> {
    let service = enrollment_service(&state);
    service
        .withdraw_request(&req.student_id, &req.course_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn decide(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<DecisionRequest>,
) -> Result<Json<EnrollmentRequest>, AppError> {
    let service = enrollment_service(&state);
    let request = service.decide(&id, req.action, &req.actor_id).await?;
    Ok(Json(request))
}

async fn revoke(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<RevokeRequest>,
) -> Result<Json<EnrollmentRequest>, AppError> {
    let service = enrollment_service(&state);
    let request = service.revoke(&id, &req.actor_id).await?;
    Ok(Json(request))
}

async fn set_limit(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SetLimitRequest>,
) -> Result<Json<CourseEnrollmentLimit>, AppError> {
    let service = enrollment_service(&state);
    let capacity = service
        .set_enrollment_limit(&id, req.enrollment_limit, &req.actor_id)
        .await?;
    Ok(Json(capacity))
}

async fn get_limit(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CourseEnrollmentLimit>, AppError> {
    repository::find_course(&state.db, &id)
        .await?
        .ok_or(AppError::NotFound)?;
    let capacity = repository::get_capacity(&state.db, &id)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(Json(capacity))
}

async fn progress_snapshot(
    State(state): State<AppState>,
    Path((student_id, course_id)): Path<(String, String)>,
) -> Result<Json<ProgressSnapshot>, AppError> {
    let service = ProgressService::new(state.db.clone());
    let snapshot = service.snapshot(&student_id, &course_id).await?;
    Ok(Json(snapshot))
}

async fn course_roll_up(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<StudentRollUp>>, AppError> {
    let service = ProgressService::new(state.db.clone());
    let rows = service.course_roll_up(&id).await?;
    Ok(Json(rows))
}

async fn completion_rate(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<CompletionRate>, AppError> {
    let service = ProgressService::new(state.db.clone());
    let rate = service.completion_rate(&id).await?;
    Ok(Json(rate))
}

async fn student_overview(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<CourseProgressOverview>>, AppError> {
    let service = ProgressService::new(state.db.clone());
    let rows = service.student_overview(&id).await?;
    Ok(Json(rows))
}

async fn submit_quiz_attempt(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<SubmitQuizRequest>,
) -> Result<Json<QuizAttempt>, AppError> {
    let service = QuizService::new(state.db.clone(), state.audit.clone());
    let attempt = service
        .submit_attempt(&req.student_id, &id, &req.answers)
        .await?;
    Ok(Json(attempt))
}
