use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::info;
use uuid::Uuid;

use crate::audit::AuditSink;
use crate::db::repository;
use crate::error::AppError;
use crate::models::{AnswerSelection, QuizAttempt, UserRole};

pub struct QuizService {
    db: SqlitePool,
    audit: Arc<dyn AuditSink>,
}

impl QuizService {
    pub fn new(db: SqlitePool, audit: Arc<dyn AuditSink>) -> Self {
        Self { db, audit }
    }

    /// Grade and record one submission. Score is correct/total questions as
    /// a percentage, 0 for a quiz without questions. A second submission for
    /// the same quiz is rejected and the original attempt is preserved.
    pub async fn submit_attempt(
        &self,
        student_id: &str,
        quiz_id: &str,
        answers: &[AnswerSelection],
    ) -> Result<QuizAttempt, AppError> {
        let student = repository::find_user(&self.db, student_id)
            .await?
            .ok_or(AppError::NotFound)?;
        if student.role != UserRole::Student {
            return Err(AppError::Forbidden);
        }
        let quiz = repository::find_quiz(&self.db, quiz_id)
            .await?
            .ok_or(AppError::NotFound)?;

        if repository::find_attempt(&self.db, student_id, quiz_id)
            .await?
            .is_some()
        {
            return Err(AppError::DuplicateAttempt);
        }

        let questions = repository::fetch_questions(&self.db, quiz_id).await?;
        // Kept as pairs: a question may have more than one correct option,
        // and any of them earns the point.
        let correct: HashSet<(String, String)> =
            repository::fetch_correct_options(&self.db, quiz_id)
                .await?
                .into_iter()
                .collect();
        let valid_options: HashSet<(String, String)> =
            repository::fetch_option_pairs(&self.db, quiz_id)
                .await?
                .into_iter()
                .collect();
        let selected: HashMap<&str, &str> = answers
            .iter()
            .map(|a| (a.question_id.as_str(), a.selected_option_id.as_str()))
            .collect();

        for answer in answers {
            let known_question = questions.iter().any(|q| q.id == answer.question_id);
            let pair = (answer.question_id.clone(), answer.selected_option_id.clone());
            if known_question && !valid_options.contains(&pair) {
                return Err(AppError::BadRequest(format!(
                    "option '{}' does not belong to question '{}'",
                    answer.selected_option_id, answer.question_id
                )));
            }
        }

        let total_questions = questions.len();
        let mut correct_answers = 0usize;
        for question in &questions {
            if let Some(picked) = selected.get(question.id.as_str()) {
                if correct.contains(&(question.id.clone(), (*picked).to_string())) {
                    correct_answers += 1;
                }
            }
        }

        let score = if total_questions > 0 {
            (correct_answers as f64 / total_questions as f64) * 100.0
        } else {
            0.0
        };

        let attempt = QuizAttempt {
            id: Uuid::new_v4().to_string(),
            student_id: student_id.to_string(),
            quiz_id: quiz_id.to_string(),
            attempt_date: Utc::now().to_rfc3339(),
            score: Some(score),
        };

        let mut tx = self.db.begin().await?;
        repository::insert_attempt(&mut *tx, &attempt).await?;
        for answer in answers {
            // Selections for questions outside this quiz are dropped,
            // matching the grading loop above.
            if questions.iter().any(|q| q.id == answer.question_id) {
                repository::insert_answer(
                    &mut *tx,
                    &attempt.id,
                    &answer.question_id,
                    &answer.selected_option_id,
                )
                .await?;
            }
        }
        tx.commit().await?;

        self.audit
            .record(
                student_id,
                &format!("Submitted quiz: {} (score {:.1})", quiz.title, score),
            )
            .await?;
        info!(student = %student.username, quiz = %quiz.title, score, "quiz attempt recorded");

        Ok(attempt)
    }
}
