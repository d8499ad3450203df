use sqlx::SqlitePool;

use crate::db::repository;
use crate::error::AppError;
use crate::models::{CompletionRate, CourseProgressOverview, ProgressSnapshot, StudentRollUp};

/// Read-only reductions over quiz attempts, course structure, and enrollment
/// requests. Nothing here writes to the database.
pub struct ProgressService {
    db: SqlitePool,
}

impl ProgressService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Live snapshot for one (student, course). A course with no quizzes
    /// reports 0 for both percentages.
    pub async fn snapshot(
        &self,
        student_id: &str,
        course_id: &str,
    ) -> Result<ProgressSnapshot, AppError> {
        repository::find_course(&self.db, course_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let total = repository::count_course_quizzes(&self.db, course_id).await?;
        let completed =
            repository::count_completed_quizzes(&self.db, student_id, course_id).await?;
        let score_sum = repository::sum_attempt_scores(&self.db, student_id, course_id).await?;

        let progress_pct = if total > 0 {
            (completed as f64 / total as f64) * 100.0
        } else {
            0.0
        };
        // Divides by total, not completed: unattempted quizzes count as zero.
        let avg_score = if total > 0 {
            score_sum / total as f64
        } else {
            0.0
        };

        Ok(ProgressSnapshot {
            total_quizzes: total,
            completed_quizzes: completed,
            progress_pct,
            avg_score,
        })
    }

    /// Instructor-facing roll-up: one snapshot per approved student, with the
    /// enrollment response date. Also drives the CSV export layer.
    pub async fn course_roll_up(&self, course_id: &str) -> Result<Vec<StudentRollUp>, AppError> {
        repository::find_course(&self.db, course_id)
            .await?
            .ok_or(AppError::NotFound)?;

        let enrollments = repository::fetch_approved_enrollments(&self.db, course_id).await?;
        let mut rows = Vec::with_capacity(enrollments.len());
        for enrollment in enrollments {
            let student = repository::find_user(&self.db, &enrollment.student_id)
                .await?
                .ok_or(AppError::NotFound)?;
            let snapshot = self.snapshot(&enrollment.student_id, course_id).await?;
            rows.push(StudentRollUp {
                student_id: student.id,
                username: student.username,
                total_quizzes: snapshot.total_quizzes,
                completed_quizzes: snapshot.completed_quizzes,
                progress_pct: snapshot.progress_pct,
                avg_score: snapshot.avg_score,
                response_date: enrollment.response_date,
            });
        }
        Ok(rows)
    }

    /// Student dashboard: a snapshot for every course the student is
    /// currently approved in.
    pub async fn student_overview(
        &self,
        student_id: &str,
    ) -> Result<Vec<CourseProgressOverview>, AppError> {
        let enrollments =
            repository::fetch_student_approved_enrollments(&self.db, student_id).await?;
        let mut rows = Vec::with_capacity(enrollments.len());
        for enrollment in enrollments {
            let course = repository::find_course(&self.db, &enrollment.course_id)
                .await?
                .ok_or(AppError::NotFound)?;
            let snapshot = self.snapshot(student_id, &course.id).await?;
            rows.push(CourseProgressOverview {
                course_id: course.id,
                course_title: course.title,
                total_quizzes: snapshot.total_quizzes,
                completed_quizzes: snapshot.completed_quizzes,
                progress_pct: snapshot.progress_pct,
                avg_score: snapshot.avg_score,
            });
        }
        Ok(rows)
    }

    /// Average of the stored `progress` column for the completion-rate
    /// report. That column is a legacy counter with no write path from quiz
    /// completion; the live snapshot is the authoritative figure.
    pub async fn completion_rate(&self, course_id: &str) -> Result<CompletionRate, AppError> {
        repository::find_course(&self.db, course_id)
            .await?
            .ok_or(AppError::NotFound)?;
        let avg_progress = repository::avg_stored_progress(&self.db, course_id).await?;
        Ok(CompletionRate {
            course_id: course_id.to_string(),
            avg_progress,
        })
    }

    /// Certificate gate: the snapshot average (summed over TOTAL quizzes)
    /// must reach the template threshold. An incomplete course drags the
    /// average down and can make a student ineligible.
    pub async fn certificate_eligible(
        &self,
        student_id: &str,
        course_id: &str,
        min_avg_score: f64,
    ) -> Result<bool, AppError> {
        let snapshot = self.snapshot(student_id, course_id).await?;
        Ok(snapshot.avg_score >= min_avg_score)
    }
}
