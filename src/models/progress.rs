use serde::{Deserialize, Serialize};

/// Point-in-time derived view for one (student, course). Never persisted.
///
/// `avg_score` divides by the TOTAL quiz count, not the completed count, so
/// an unfinished course pulls the average down. Certificate eligibility
/// depends on this exact definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub total_quizzes: i64,
    pub completed_quizzes: i64,
    pub progress_pct: f64,
    pub avg_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudentRollUp {
    pub student_id: String,
    pub username: String,
    pub total_quizzes: i64,
    pub completed_quizzes: i64,
    pub progress_pct: f64,
    pub avg_score: f64,
    pub response_date: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseProgressOverview {
    pub course_id: String,
    pub course_title: String,
    pub total_quizzes: i64,
    pub completed_quizzes: i64,
    pub progress_pct: f64,
    pub avg_score: f64,
}

/// Average of the stored `progress` column across all requests for a course.
/// None when the course has no enrollment requests at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRate {
    pub course_id: String,
    pub avg_progress: Option<f64>,
}
