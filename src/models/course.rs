use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// Course structure is authored elsewhere in the system; the enrollment and
// progress core only reads it.

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Course {
    pub id: String,
    pub title: String,
    pub instructor_id: Option<String>,
    pub is_published: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CourseModule {
    pub id: String,
    pub course_id: String,
    pub title: String,
    pub position: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Quiz {
    pub id: String,
    pub module_id: String,
    pub title: String,
    pub is_published: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Question {
    pub id: String,
    pub quiz_id: String,
    pub text: String,
    pub question_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AnswerOption {
    pub id: String,
    pub question_id: String,
    pub text: String,
    pub is_correct: bool,
}
