#![allow(dead_code)]

use chrono::Utc;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;

use lms_backend::db::MIGRATOR;

// One connection so every query sees the same in-memory database.
pub async fn setup_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create database");
    MIGRATOR.run(&pool).await.expect("Failed to run migrations");
    pool
}

pub async fn insert_user(pool: &SqlitePool, id: &str, username: &str, role: &str) {
    sqlx::query("INSERT INTO users (id, username, role) VALUES (?, ?, ?)")
        .bind(id)
        .bind(username)
        .bind(role)
        .execute(pool)
        .await
        .expect("Failed to insert user");
}

pub async fn insert_course(pool: &SqlitePool, id: &str, title: &str, instructor_id: Option<&str>) {
    sqlx::query(
        "INSERT INTO courses (id, title, instructor_id, is_published, created_at) VALUES (?, ?, ?, 1, ?)",
    )
    .bind(id)
    .bind(title)
    .bind(instructor_id)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await
    .expect("Failed to insert course");
}

pub async fn insert_module(pool: &SqlitePool, id: &str, course_id: &str, title: &str) {
    sqlx::query("INSERT INTO course_modules (id, course_id, title, position) VALUES (?, ?, ?, 0)")
        .bind(id)
        .bind(course_id)
        .bind(title)
        .execute(pool)
        .await
        .expect("Failed to insert module");
}

pub async fn insert_quiz(pool: &SqlitePool, id: &str, module_id: &str, title: &str) {
    sqlx::query("INSERT INTO quizzes (id, module_id, title, is_published) VALUES (?, ?, ?, 1)")
        .bind(id)
        .bind(module_id)
        .bind(title)
        .execute(pool)
        .await
        .expect("Failed to insert quiz");
}

pub async fn insert_question(pool: &SqlitePool, id: &str, quiz_id: &str, text: &str) {
    sqlx::query("INSERT INTO questions (id, quiz_id, text, question_type) VALUES (?, ?, ?, 'MC')")
        .bind(id)
        .bind(quiz_id)
        .bind(text)
        .execute(pool)
        .await
        .expect("Failed to insert question");
}

pub async fn insert_option(pool: &SqlitePool, id: &str, question_id: &str, is_correct: bool) {
    sqlx::query("INSERT INTO options (id, question_id, text, is_correct) VALUES (?, ?, 'option', ?)")
        .bind(id)
        .bind(question_id)
        .bind(is_correct)
        .execute(pool)
        .await
        .expect("Failed to insert option");
}

pub async fn insert_attempt(pool: &SqlitePool, student_id: &str, quiz_id: &str, score: f64) {
    sqlx::query(
        "INSERT INTO quiz_attempts (id, student_id, quiz_id, attempt_date, score) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(student_id)
    .bind(quiz_id)
    .bind(Utc::now().to_rfc3339())
    .bind(score)
    .execute(pool)
    .await
    .expect("Failed to insert attempt");
}

pub async fn current_enrollments(pool: &SqlitePool, course_id: &str) -> i64 {
    sqlx::query_scalar("SELECT current_enrollments FROM course_enrollment_limits WHERE course_id = ?")
        .bind(course_id)
        .fetch_one(pool)
        .await
        .expect("Failed to read capacity")
}
