use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    Pending,
    Approved,
    Rejected,
    Removed,
}

impl EnrollmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnrollmentStatus::Pending => "pending",
            EnrollmentStatus::Approved => "approved",
            EnrollmentStatus::Rejected => "rejected",
            EnrollmentStatus::Removed => "removed",
        }
    }
}

/// One row per (student, course). Re-requesting after rejection revives this
/// row; removal flips status and keeps the row. The `progress` column is a
/// legacy counter that is never written by quiz completion; the live snapshot
/// from the progress service is authoritative.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct EnrollmentRequest {
    pub id: String,
    pub student_id: String,
    pub course_id: String,
    pub status: EnrollmentStatus,
    pub request_date: String,
    pub response_date: Option<String>,
    pub progress: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CourseEnrollmentLimit {
    pub course_id: String,
    pub enrollment_limit: i64,
    pub current_enrollments: i64,
}

impl CourseEnrollmentLimit {
    pub fn is_full(&self) -> bool {
        self.current_enrollments >= self.enrollment_limit
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEnrollmentRequest {
    pub student_id: String,
    pub course_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawRequest {
    pub student_id: String,
    pub course_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRequest {
    pub action: Decision,
    pub actor_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevokeRequest {
    pub actor_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetLimitRequest {
    pub enrollment_limit: i64,
    pub actor_id: String,
}
