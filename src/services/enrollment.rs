use std::sync::Arc;

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::audit::AuditSink;
use crate::db::repository;
use crate::error::AppError;
use crate::models::{
    Course, CourseEnrollmentLimit, Decision, EnrollmentRequest, EnrollmentStatus, User, UserRole,
};

/// Orchestrates the enrollment request lifecycle: student request/withdraw,
/// instructor or admin approve/reject/revoke, and the capacity ledger updates
/// that go with approval and removal.
pub struct EnrollmentService {
    db: SqlitePool,
    audit: Arc<dyn AuditSink>,
    strict_capacity: bool,
}

impl EnrollmentService {
    pub fn new(db: SqlitePool, audit: Arc<dyn AuditSink>, strict_capacity: bool) -> Self {
        Self {
            db,
            audit,
            strict_capacity,
        }
    }

    /// Idempotent: an existing active request is returned unchanged, a
    /// rejected one is revived to pending with a fresh request date.
    pub async fn request_enrollment(
        &self,
        student_id: &str,
        course_id: &str,
    ) -> Result<EnrollmentRequest, AppError> {
        let student = repository::find_user(&self.db, student_id)
            .await?
            .ok_or(AppError::NotFound)?;
        if student.role != UserRole::Student {
            return Err(AppError::Forbidden);
        }
        let course = repository::find_course(&self.db, course_id)
            .await?
            .ok_or(AppError::NotFound)?;

        match repository::find_enrollment(&self.db, student_id, course_id).await? {
            None => {
                match repository::insert_enrollment(&self.db, student_id, course_id).await? {
                    Some(request) => {
                        self.audit
                            .record(
                                student_id,
                                &format!("Requested enrollment in course: {}", course.title),
                            )
                            .await?;
                        info!(student = %student.username, course = %course.title, "enrollment requested");
                        Ok(request)
                    }
                    // Lost a race with an identical request; the winner's row
                    // serves both.
                    None => repository::find_enrollment(&self.db, student_id, course_id)
                        .await?
                        .ok_or(AppError::NotFound),
                }
            }
            Some(existing) if existing.status == EnrollmentStatus::Rejected => {
                repository::revive_enrollment(&self.db, &existing.id).await?;
                repository::find_enrollment_by_id(&self.db, &existing.id)
                    .await?
                    .ok_or(AppError::NotFound)
            }
            Some(existing) => Ok(existing),
        }
    }

    /// Deletes the row, but only while the request is still pending or
    /// rejected. Approved enrollments leave via `revoke`, and removed ones
    /// stay on record.
    pub async fn withdraw_request(
        &self,
        student_id: &str,
        course_id: &str,
    ) -> Result<(), AppError> {
        let course = repository::find_course(&self.db, course_id)
            .await?
            .ok_or(AppError::NotFound)?;
        let existing = repository::find_enrollment(&self.db, student_id, course_id)
            .await?
            .ok_or(AppError::NotFound)?;

        match existing.status {
            EnrollmentStatus::Pending | EnrollmentStatus::Rejected => {
                // Audit only what actually happened: the trail entry follows
                // the delete.
                repository::delete_enrollment(&self.db, &existing.id).await?;
                self.audit
                    .record(
                        student_id,
                        &format!("Removed enrollment request for course: {}", course.title),
                    )
                    .await?;
                Ok(())
            }
            status => Err(AppError::InvalidTransition(format!(
                "cannot withdraw a request in status '{}'",
                status.as_str()
            ))),
        }
    }

    /// Approve or reject a pending request. Approval claims a seat in the
    /// capacity ledger inside the same transaction that flips the status.
    ///
    /// When the course is full the historical behavior still approves and
    /// only logs the failed grant; `strict_capacity` makes the grant a
    /// precondition instead, leaving the request pending.
    pub async fn decide(
        &self,
        request_id: &str,
        action: Decision,
        actor_id: &str,
    ) -> Result<EnrollmentRequest, AppError> {
        let request = repository::find_enrollment_by_id(&self.db, request_id)
            .await?
            .ok_or(AppError::NotFound)?;
        let course = repository::find_course(&self.db, &request.course_id)
            .await?
            .ok_or(AppError::NotFound)?;
        let actor = self.authorize_decider(actor_id, &course).await?;

        if request.status != EnrollmentStatus::Pending {
            return Err(AppError::InvalidTransition(format!(
                "request is '{}', only pending requests can be decided",
                request.status.as_str()
            )));
        }

        let student = repository::find_user(&self.db, &request.student_id)
            .await?
            .ok_or(AppError::NotFound)?;
        let now = Utc::now().to_rfc3339();

        match action {
            Decision::Approve => {
                let mut tx = self.db.begin().await?;
                repository::ensure_capacity_record(&mut *tx, &course.id).await?;
                let granted = repository::grant_seat(&mut *tx, &course.id).await?;

                if !granted {
                    if self.strict_capacity {
                        tx.rollback().await?;
                        warn!(course = %course.title, "approval blocked, enrollment limit reached");
                        return Err(AppError::CapacityExceeded);
                    }
                    warn!(
                        course = %course.title,
                        "enrollment limit reached, approving without a seat"
                    );
                }

                // Re-validated inside the transaction: a racing decision may
                // have flipped the status since the read above.
                let flipped = repository::transition_enrollment_status(
                    &mut *tx,
                    &request.id,
                    EnrollmentStatus::Pending,
                    EnrollmentStatus::Approved,
                    Some(&now),
                )
                .await?;
                if !flipped {
                    tx.rollback().await?;
                    return Err(AppError::InvalidTransition(
                        "request is no longer pending".to_string(),
                    ));
                }
                tx.commit().await?;

                self.audit
                    .record(
                        &actor.id,
                        &format!(
                            "{} {} course request approved",
                            student.username, course.title
                        ),
                    )
                    .await?;
            }
            Decision::Reject => {
                let mut tx = self.db.begin().await?;
                let flipped = repository::transition_enrollment_status(
                    &mut *tx,
                    &request.id,
                    EnrollmentStatus::Pending,
                    EnrollmentStatus::Rejected,
                    Some(&now),
                )
                .await?;
                if !flipped {
                    tx.rollback().await?;
                    return Err(AppError::InvalidTransition(
                        "request is no longer pending".to_string(),
                    ));
                }
                tx.commit().await?;

                self.audit
                    .record(
                        &actor.id,
                        &format!(
                            "{} {} course request rejected",
                            student.username, course.title
                        ),
                    )
                    .await?;
            }
        }

        repository::find_enrollment_by_id(&self.db, &request.id)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Remove an approved student. The seat goes back to the ledger; the row
    /// stays, in status `removed`, which is final.
    pub async fn revoke(
        &self,
        request_id: &str,
        actor_id: &str,
    ) -> Result<EnrollmentRequest, AppError> {
        let request = repository::find_enrollment_by_id(&self.db, request_id)
            .await?
            .ok_or(AppError::NotFound)?;
        let course = repository::find_course(&self.db, &request.course_id)
            .await?
            .ok_or(AppError::NotFound)?;
        let actor = self.authorize_decider(actor_id, &course).await?;

        if request.status != EnrollmentStatus::Approved {
            return Err(AppError::InvalidTransition(format!(
                "request is '{}', only approved enrollments can be removed",
                request.status.as_str()
            )));
        }

        let student = repository::find_user(&self.db, &request.student_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let mut tx = self.db.begin().await?;
        repository::ensure_capacity_record(&mut *tx, &course.id).await?;
        let released = repository::release_seat(&mut *tx, &course.id).await?;
        if !released {
            warn!(course = %course.title, "no enrollments to release");
        }
        let flipped = repository::transition_enrollment_status(
            &mut *tx,
            &request.id,
            EnrollmentStatus::Approved,
            EnrollmentStatus::Removed,
            None,
        )
        .await?;
        if !flipped {
            // Somebody else already removed it; the rollback also returns
            // the seat released above.
            tx.rollback().await?;
            return Err(AppError::InvalidTransition(
                "request is no longer approved".to_string(),
            ));
        }
        tx.commit().await?;

        self.audit
            .record(
                &actor.id,
                &format!("{} removed from course {}", student.username, course.title),
            )
            .await?;

        repository::find_enrollment_by_id(&self.db, &request.id)
            .await?
            .ok_or(AppError::NotFound)
    }

    /// Configure the seat limit for a course, creating the ledger row if it
    /// does not exist yet. Lowering the limit below current occupancy is
    /// allowed; no further grants succeed until seats free up.
    pub async fn set_enrollment_limit(
        &self,
        course_id: &str,
        limit: i64,
        actor_id: &str,
    ) -> Result<CourseEnrollmentLimit, AppError> {
        if limit < 0 {
            return Err(AppError::BadRequest(
                "enrollment_limit must be non-negative".to_string(),
            ));
        }
        let course = repository::find_course(&self.db, course_id)
            .await?
            .ok_or(AppError::NotFound)?;
        self.authorize_decider(actor_id, &course).await?;

        let mut tx = self.db.begin().await?;
        let capacity = repository::set_enrollment_limit(&mut *tx, course_id, limit).await?;
        tx.commit().await?;
        Ok(capacity)
    }

    /// Instructor of the course, or an admin.
    async fn authorize_decider(&self, actor_id: &str, course: &Course) -> Result<User, AppError> {
        let actor = repository::find_user(&self.db, actor_id)
            .await?
            .ok_or(AppError::NotFound)?;
        let allowed = match actor.role {
            UserRole::Admin => true,
            UserRole::Instructor => course.instructor_id.as_deref() == Some(actor.id.as_str()),
            UserRole::Student => false,
        };
        if allowed { Ok(actor) } else { Err(AppError::Forbidden) }
    }
}
