use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A graded submission. At most one per (student, quiz); later submissions
/// are rejected and the original score is preserved.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct QuizAttempt {
    pub id: String,
    pub student_id: String,
    pub quiz_id: String,
    pub attempt_date: String,
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerSelection {
    pub question_id: String,
    pub selected_option_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitQuizRequest {
    pub student_id: String,
    pub answers: Vec<AnswerSelection>,
}
