mod common;

use std::sync::Arc;

use lms_backend::audit::{NoopAuditSink, SqlAuditSink};
use lms_backend::error::AppError;
use lms_backend::models::{Decision, EnrollmentStatus};
use lms_backend::services::EnrollmentService;

use common::*;

async fn seed_basic(pool: &sqlx::SqlitePool) {
    insert_user(pool, "admin-1", "admin", "admin").await;
    insert_user(pool, "inst-1", "alice", "instructor").await;
    insert_user(pool, "stu-1", "bob", "student").await;
    insert_user(pool, "stu-2", "carol", "student").await;
    insert_course(pool, "course-1", "Rust 101", Some("inst-1")).await;
}

fn service(pool: &sqlx::SqlitePool) -> EnrollmentService {
    EnrollmentService::new(pool.clone(), Arc::new(NoopAuditSink), false)
}

fn strict_service(pool: &sqlx::SqlitePool) -> EnrollmentService {
    EnrollmentService::new(pool.clone(), Arc::new(NoopAuditSink), true)
}

#[tokio::test]
async fn request_creates_pending_and_is_idempotent() {
    let pool = setup_pool().await;
    seed_basic(&pool).await;
    let service = service(&pool);

    let first = service.request_enrollment("stu-1", "course-1").await.unwrap();
    assert_eq!(first.status, EnrollmentStatus::Pending);
    assert!(first.response_date.is_none());

    let second = service.request_enrollment("stu-1", "course-1").await.unwrap();
    assert_eq!(second.id, first.id);

    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM enrollment_requests WHERE student_id = 'stu-1' AND course_id = 'course-1'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn rejected_request_is_revived_in_place() {
    let pool = setup_pool().await;
    seed_basic(&pool).await;
    let service = service(&pool);

    let request = service.request_enrollment("stu-1", "course-1").await.unwrap();
    let rejected = service
        .decide(&request.id, Decision::Reject, "inst-1")
        .await
        .unwrap();
    assert_eq!(rejected.status, EnrollmentStatus::Rejected);
    assert!(rejected.response_date.is_some());

    let revived = service.request_enrollment("stu-1", "course-1").await.unwrap();
    assert_eq!(revived.id, request.id);
    assert_eq!(revived.status, EnrollmentStatus::Pending);
}

#[tokio::test]
async fn withdraw_applies_to_pending_and_rejected_only() {
    let pool = setup_pool().await;
    seed_basic(&pool).await;
    let service = service(&pool);

    let request = service.request_enrollment("stu-1", "course-1").await.unwrap();
    service.withdraw_request("stu-1", "course-1").await.unwrap();
    assert!(matches!(
        service.withdraw_request("stu-1", "course-1").await,
        Err(AppError::NotFound)
    ));

    // Once approved, the student cannot withdraw; removal is the admin path.
    let request = service.request_enrollment("stu-1", "course-1").await.unwrap();
    service
        .set_enrollment_limit("course-1", 5, "inst-1")
        .await
        .unwrap();
    service
        .decide(&request.id, Decision::Approve, "inst-1")
        .await
        .unwrap();
    assert!(matches!(
        service.withdraw_request("stu-1", "course-1").await,
        Err(AppError::InvalidTransition(_))
    ));
}

#[tokio::test]
async fn approve_grants_seat_and_sets_response_date() {
    let pool = setup_pool().await;
    seed_basic(&pool).await;
    let service = service(&pool);

    service
        .set_enrollment_limit("course-1", 1, "admin-1")
        .await
        .unwrap();
    let request = service.request_enrollment("stu-1", "course-1").await.unwrap();
    let approved = service
        .decide(&request.id, Decision::Approve, "inst-1")
        .await
        .unwrap();

    assert_eq!(approved.status, EnrollmentStatus::Approved);
    assert!(approved.response_date.is_some());
    assert_eq!(current_enrollments(&pool, "course-1").await, 1);
}

#[tokio::test]
async fn full_course_still_approves_but_never_overshoots_the_ledger() {
    let pool = setup_pool().await;
    seed_basic(&pool).await;
    let service = service(&pool);

    service
        .set_enrollment_limit("course-1", 1, "inst-1")
        .await
        .unwrap();

    let a = service.request_enrollment("stu-1", "course-1").await.unwrap();
    service.decide(&a.id, Decision::Approve, "inst-1").await.unwrap();
    assert_eq!(current_enrollments(&pool, "course-1").await, 1);

    // Historical behavior: status flips even though the grant fails.
    let b = service.request_enrollment("stu-2", "course-1").await.unwrap();
    let approved_b = service.decide(&b.id, Decision::Approve, "inst-1").await.unwrap();
    assert_eq!(approved_b.status, EnrollmentStatus::Approved);
    assert_eq!(current_enrollments(&pool, "course-1").await, 1);

    // Revoking A frees the seat.
    let removed = service.revoke(&a.id, "inst-1").await.unwrap();
    assert_eq!(removed.status, EnrollmentStatus::Removed);
    assert_eq!(current_enrollments(&pool, "course-1").await, 0);
}

#[tokio::test]
async fn strict_mode_keeps_the_request_pending_when_full() {
    let pool = setup_pool().await;
    seed_basic(&pool).await;
    let service = strict_service(&pool);

    service
        .set_enrollment_limit("course-1", 1, "inst-1")
        .await
        .unwrap();

    let a = service.request_enrollment("stu-1", "course-1").await.unwrap();
    service.decide(&a.id, Decision::Approve, "inst-1").await.unwrap();

    let b = service.request_enrollment("stu-2", "course-1").await.unwrap();
    let err = service.decide(&b.id, Decision::Approve, "inst-1").await;
    assert!(matches!(err, Err(AppError::CapacityExceeded)));

    let status: String =
        sqlx::query_scalar("SELECT status FROM enrollment_requests WHERE id = ?")
            .bind(&b.id)
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(status, "pending");
    assert_eq!(current_enrollments(&pool, "course-1").await, 1);
}

#[tokio::test]
async fn sequential_approvals_respect_the_limit() {
    let pool = setup_pool().await;
    seed_basic(&pool).await;
    insert_user(&pool, "stu-3", "dave", "student").await;
    let service = service(&pool);

    service
        .set_enrollment_limit("course-1", 2, "inst-1")
        .await
        .unwrap();

    for student in ["stu-1", "stu-2", "stu-3"] {
        let request = service.request_enrollment(student, "course-1").await.unwrap();
        service
            .decide(&request.id, Decision::Approve, "inst-1")
            .await
            .unwrap();
    }

    let occupancy = current_enrollments(&pool, "course-1").await;
    assert!(occupancy <= 2, "ledger overshot the limit: {occupancy}");
    assert_eq!(occupancy, 2);
}

#[tokio::test]
async fn capacity_record_reports_fullness() {
    let pool = setup_pool().await;
    seed_basic(&pool).await;
    let service = service(&pool);

    // Lazily created with a limit of 0, which counts as full.
    let request = service.request_enrollment("stu-1", "course-1").await.unwrap();
    service
        .decide(&request.id, Decision::Approve, "inst-1")
        .await
        .unwrap();
    let capacity = lms_backend::db::repository::get_capacity(&pool, "course-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(capacity.enrollment_limit, 0);
    assert!(capacity.is_full());

    let capacity = service
        .set_enrollment_limit("course-1", 3, "admin-1")
        .await
        .unwrap();
    assert!(!capacity.is_full());
}

#[tokio::test]
async fn concurrent_decisions_adjust_the_ledger_exactly_once() {
    let pool = setup_pool().await;
    seed_basic(&pool).await;
    let service = Arc::new(service(&pool));

    service
        .set_enrollment_limit("course-1", 2, "inst-1")
        .await
        .unwrap();
    let request = service.request_enrollment("stu-1", "course-1").await.unwrap();

    let s1 = service.clone();
    let s2 = service.clone();
    let id1 = request.id.clone();
    let id2 = request.id.clone();
    let (a, b) = tokio::join!(
        async move { s1.decide(&id1, Decision::Approve, "inst-1").await },
        async move { s2.decide(&id2, Decision::Approve, "inst-1").await },
    );

    let successes = [&a, &b].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one decision may apply: {a:?} / {b:?}");
    // The losing decision must not have kept its seat.
    assert_eq!(current_enrollments(&pool, "course-1").await, 1);
}

#[tokio::test]
async fn revoking_twice_releases_only_one_seat() {
    let pool = setup_pool().await;
    seed_basic(&pool).await;
    let service = service(&pool);

    service
        .set_enrollment_limit("course-1", 1, "inst-1")
        .await
        .unwrap();
    let request = service.request_enrollment("stu-1", "course-1").await.unwrap();
    service
        .decide(&request.id, Decision::Approve, "inst-1")
        .await
        .unwrap();

    service.revoke(&request.id, "inst-1").await.unwrap();
    assert_eq!(current_enrollments(&pool, "course-1").await, 0);

    assert!(matches!(
        service.revoke(&request.id, "inst-1").await,
        Err(AppError::InvalidTransition(_))
    ));
    assert_eq!(current_enrollments(&pool, "course-1").await, 0);
}

#[tokio::test]
async fn duplicate_insert_yields_no_second_row() {
    let pool = setup_pool().await;
    seed_basic(&pool).await;

    let first = lms_backend::db::repository::insert_enrollment(&pool, "stu-1", "course-1")
        .await
        .unwrap();
    assert!(first.is_some());

    // The unique pair is absorbed, not surfaced as an error.
    let second = lms_backend::db::repository::insert_enrollment(&pool, "stu-1", "course-1")
        .await
        .unwrap();
    assert!(second.is_none());

    let service = service(&pool);
    let request = service.request_enrollment("stu-1", "course-1").await.unwrap();
    assert_eq!(request.id, first.unwrap().id);
}

#[tokio::test]
async fn failed_withdraw_leaves_no_audit_entry() {
    let pool = setup_pool().await;
    seed_basic(&pool).await;
    let service =
        EnrollmentService::new(pool.clone(), Arc::new(SqlAuditSink::new(pool.clone())), false);

    service
        .set_enrollment_limit("course-1", 1, "inst-1")
        .await
        .unwrap();
    let request = service.request_enrollment("stu-1", "course-1").await.unwrap();
    service
        .decide(&request.id, Decision::Approve, "inst-1")
        .await
        .unwrap();

    assert!(service.withdraw_request("stu-1", "course-1").await.is_err());

    let withdrawals: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM user_activity_log WHERE activity LIKE 'Removed enrollment request%'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(withdrawals, 0);
}

#[tokio::test]
async fn deciding_a_non_pending_request_is_rejected() {
    let pool = setup_pool().await;
    seed_basic(&pool).await;
    let service = service(&pool);

    service
        .set_enrollment_limit("course-1", 5, "inst-1")
        .await
        .unwrap();
    let request = service.request_enrollment("stu-1", "course-1").await.unwrap();
    service
        .decide(&request.id, Decision::Approve, "inst-1")
        .await
        .unwrap();

    assert!(matches!(
        service.decide(&request.id, Decision::Approve, "inst-1").await,
        Err(AppError::InvalidTransition(_))
    ));
    assert!(matches!(
        service.decide(&request.id, Decision::Reject, "inst-1").await,
        Err(AppError::InvalidTransition(_))
    ));
    // The failed decisions must not have touched the ledger again.
    assert_eq!(current_enrollments(&pool, "course-1").await, 1);
}

#[tokio::test]
async fn only_the_course_instructor_or_an_admin_may_decide() {
    let pool = setup_pool().await;
    seed_basic(&pool).await;
    insert_user(&pool, "inst-2", "mallory", "instructor").await;
    let service = service(&pool);

    let request = service.request_enrollment("stu-1", "course-1").await.unwrap();

    assert!(matches!(
        service.decide(&request.id, Decision::Reject, "stu-2").await,
        Err(AppError::Forbidden)
    ));
    assert!(matches!(
        service.decide(&request.id, Decision::Reject, "inst-2").await,
        Err(AppError::Forbidden)
    ));

    let rejected = service
        .decide(&request.id, Decision::Reject, "admin-1")
        .await
        .unwrap();
    assert_eq!(rejected.status, EnrollmentStatus::Rejected);
}

#[tokio::test]
async fn revoke_without_occupancy_never_goes_negative() {
    let pool = setup_pool().await;
    seed_basic(&pool).await;
    let service = service(&pool);

    // Default limit is 0, so approval wins no seat; occupancy stays 0.
    let request = service.request_enrollment("stu-1", "course-1").await.unwrap();
    service
        .decide(&request.id, Decision::Approve, "inst-1")
        .await
        .unwrap();
    assert_eq!(current_enrollments(&pool, "course-1").await, 0);

    let removed = service.revoke(&request.id, "inst-1").await.unwrap();
    assert_eq!(removed.status, EnrollmentStatus::Removed);
    assert_eq!(current_enrollments(&pool, "course-1").await, 0);
}

#[tokio::test]
async fn removed_is_final_and_cannot_be_re_requested() {
    let pool = setup_pool().await;
    seed_basic(&pool).await;
    let service = service(&pool);

    service
        .set_enrollment_limit("course-1", 1, "inst-1")
        .await
        .unwrap();
    let request = service.request_enrollment("stu-1", "course-1").await.unwrap();
    service
        .decide(&request.id, Decision::Approve, "inst-1")
        .await
        .unwrap();
    service.revoke(&request.id, "inst-1").await.unwrap();

    // Re-requesting after removal returns the removed row untouched.
    let again = service.request_enrollment("stu-1", "course-1").await.unwrap();
    assert_eq!(again.id, request.id);
    assert_eq!(again.status, EnrollmentStatus::Removed);
}

#[tokio::test]
async fn decisions_are_written_to_the_activity_log() {
    let pool = setup_pool().await;
    seed_basic(&pool).await;
    let service = EnrollmentService::new(pool.clone(), Arc::new(SqlAuditSink::new(pool.clone())), false);

    service
        .set_enrollment_limit("course-1", 1, "inst-1")
        .await
        .unwrap();
    let request = service.request_enrollment("stu-1", "course-1").await.unwrap();
    service
        .decide(&request.id, Decision::Approve, "inst-1")
        .await
        .unwrap();

    let entries: Vec<String> = sqlx::query_scalar("SELECT activity FROM user_activity_log ORDER BY id")
        .fetch_all(&pool)
        .await
        .unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries[0].contains("Requested enrollment in course: Rust 101"));
    assert!(entries[1].contains("course request approved"));
}

#[tokio::test]
async fn unknown_ids_surface_not_found() {
    let pool = setup_pool().await;
    seed_basic(&pool).await;
    let service = service(&pool);

    assert!(matches!(
        service.request_enrollment("stu-1", "missing").await,
        Err(AppError::NotFound)
    ));
    assert!(matches!(
        service.request_enrollment("missing", "course-1").await,
        Err(AppError::NotFound)
    ));
    assert!(matches!(
        service.decide("missing", Decision::Approve, "inst-1").await,
        Err(AppError::NotFound)
    ));
    // Instructors cannot enroll as students.
    assert!(matches!(
        service.request_enrollment("inst-1", "course-1").await,
        Err(AppError::Forbidden)
    ));
}
