use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::models::{
    Course, CourseEnrollmentLimit, EnrollmentRequest, EnrollmentStatus, Question, Quiz,
    QuizAttempt, User,
};

// Runtime-checked queries throughout; mutating capacity queries take a
// connection so the service can keep them inside one transaction.

pub async fn find_user(db: &SqlitePool, id: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT id, username, role FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn find_course(db: &SqlitePool, id: &str) -> Result<Option<Course>, sqlx::Error> {
    sqlx::query_as::<_, Course>(
        "SELECT id, title, instructor_id, is_published, created_at FROM courses WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(db)
    .await
}

pub async fn find_quiz(db: &SqlitePool, id: &str) -> Result<Option<Quiz>, sqlx::Error> {
    sqlx::query_as::<_, Quiz>(
        "SELECT id, module_id, title, is_published FROM quizzes WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(db)
    .await
}

// --- enrollment requests ---

pub async fn find_enrollment(
    db: &SqlitePool,
    student_id: &str,
    course_id: &str,
) -> Result<Option<EnrollmentRequest>, sqlx::Error> {
    sqlx::query_as::<_, EnrollmentRequest>(
        r#"
        SELECT id, student_id, course_id, status, request_date, response_date, progress
        FROM enrollment_requests
        WHERE student_id = ? AND course_id = ?
        "#,
    )
    .bind(student_id)
    .bind(course_id)
    .fetch_optional(db)
    .await
}

pub async fn find_enrollment_by_id(
    db: &SqlitePool,
    id: &str,
) -> Result<Option<EnrollmentRequest>, sqlx::Error> {
    sqlx::query_as::<_, EnrollmentRequest>(
        r#"
        SELECT id, student_id, course_id, status, request_date, response_date, progress
        FROM enrollment_requests
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await
}

/// Inserts a fresh pending request, or returns None when a row for the
/// (student, course) pair already exists — a concurrent duplicate request
/// must not surface the unique violation as an error.
pub async fn insert_enrollment(
    db: &SqlitePool,
    student_id: &str,
    course_id: &str,
) -> Result<Option<EnrollmentRequest>, sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    let now = Utc::now().to_rfc3339();

    let inserted = sqlx::query(
        r#"
        INSERT INTO enrollment_requests
            (id, student_id, course_id, status, request_date, response_date, progress)
        VALUES (?, ?, ?, 'pending', ?, NULL, 0.0)
        ON CONFLICT (student_id, course_id) DO NOTHING
        "#,
    )
    .bind(&id)
    .bind(student_id)
    .bind(course_id)
    .bind(&now)
    .execute(db)
    .await?
    .rows_affected();

    if inserted == 0 {
        return Ok(None);
    }

    Ok(Some(EnrollmentRequest {
        id,
        student_id: student_id.to_string(),
        course_id: course_id.to_string(),
        status: EnrollmentStatus::Pending,
        request_date: now,
        response_date: None,
        progress: 0.0,
    }))
}

/// Rejected request revived by the student: same row, back to pending with a
/// fresh request date.
pub async fn revive_enrollment(db: &SqlitePool, id: &str) -> Result<(), sqlx::Error> {
    let now = Utc::now().to_rfc3339();
    sqlx::query("UPDATE enrollment_requests SET status = 'pending', request_date = ? WHERE id = ?")
        .bind(now)
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn delete_enrollment(db: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM enrollment_requests WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?
        .rows_affected();
    Ok(result > 0)
}

/// Conditional status flip: the row must still be in `from`, so two racing
/// decisions cannot both apply. False means somebody else got there first.
pub async fn transition_enrollment_status(
    conn: &mut SqliteConnection,
    id: &str,
    from: EnrollmentStatus,
    to: EnrollmentStatus,
    response_date: Option<&str>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE enrollment_requests
        SET status = ?, response_date = COALESCE(?, response_date)
        WHERE id = ? AND status = ?
        "#,
    )
    .bind(to.as_str())
    .bind(response_date)
    .bind(id)
    .bind(from.as_str())
    .execute(conn)
    .await?
    .rows_affected();
    Ok(result > 0)
}

pub async fn fetch_approved_enrollments(
    db: &SqlitePool,
    course_id: &str,
) -> Result<Vec<EnrollmentRequest>, sqlx::Error> {
    sqlx::query_as::<_, EnrollmentRequest>(
        r#"
        SELECT id, student_id, course_id, status, request_date, response_date, progress
        FROM enrollment_requests
        WHERE course_id = ? AND status = 'approved'
        ORDER BY request_date
        "#,
    )
    .bind(course_id)
    .fetch_all(db)
    .await
}

pub async fn fetch_student_approved_enrollments(
    db: &SqlitePool,
    student_id: &str,
) -> Result<Vec<EnrollmentRequest>, sqlx::Error> {
    sqlx::query_as::<_, EnrollmentRequest>(
        r#"
        SELECT id, student_id, course_id, status, request_date, response_date, progress
        FROM enrollment_requests
        WHERE student_id = ? AND status = 'approved'
        ORDER BY request_date
        "#,
    )
    .bind(student_id)
    .fetch_all(db)
    .await
}

// --- capacity ledger ---

/// Get-or-create, defaulting to a limit of 0 seats. Courses without a
/// configured limit therefore admit nobody until an admin raises it.
pub async fn ensure_capacity_record(
    conn: &mut SqliteConnection,
    course_id: &str,
) -> Result<CourseEnrollmentLimit, sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO course_enrollment_limits (course_id, enrollment_limit, current_enrollments)
        VALUES (?, 0, 0)
        ON CONFLICT (course_id) DO NOTHING
        "#,
    )
    .bind(course_id)
    .execute(&mut *conn)
    .await?;

    sqlx::query_as::<_, CourseEnrollmentLimit>(
        r#"
        SELECT course_id, enrollment_limit, current_enrollments
        FROM course_enrollment_limits
        WHERE course_id = ?
        "#,
    )
    .bind(course_id)
    .fetch_one(conn)
    .await
}

pub async fn get_capacity(
    db: &SqlitePool,
    course_id: &str,
) -> Result<Option<CourseEnrollmentLimit>, sqlx::Error> {
    sqlx::query_as::<_, CourseEnrollmentLimit>(
        r#"
        SELECT course_id, enrollment_limit, current_enrollments
        FROM course_enrollment_limits
        WHERE course_id = ?
        "#,
    )
    .bind(course_id)
    .fetch_optional(db)
    .await
}

/// Claims one seat. The guard lives in the WHERE clause so the check and the
/// increment are a single statement; false means the course is full.
pub async fn grant_seat(
    conn: &mut SqliteConnection,
    course_id: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE course_enrollment_limits
        SET current_enrollments = current_enrollments + 1
        WHERE course_id = ? AND current_enrollments < enrollment_limit
        "#,
    )
    .bind(course_id)
    .execute(conn)
    .await?
    .rows_affected();
    Ok(result > 0)
}

/// Returns one seat. False when there is nothing to release.
pub async fn release_seat(
    conn: &mut SqliteConnection,
    course_id: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE course_enrollment_limits
        SET current_enrollments = current_enrollments - 1
        WHERE course_id = ? AND current_enrollments > 0
        "#,
    )
    .bind(course_id)
    .execute(conn)
    .await?
    .rows_affected();
    Ok(result > 0)
}

pub async fn set_enrollment_limit(
    conn: &mut SqliteConnection,
    course_id: &str,
    limit: i64,
) -> Result<CourseEnrollmentLimit, sqlx::Error> {
    ensure_capacity_record(&mut *conn, course_id).await?;
    sqlx::query("UPDATE course_enrollment_limits SET enrollment_limit = ? WHERE course_id = ?")
        .bind(limit)
        .bind(course_id)
        .execute(&mut *conn)
        .await?;
    ensure_capacity_record(conn, course_id).await
}

// --- progress queries (read-only) ---

pub async fn count_course_quizzes(db: &SqlitePool, course_id: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*)
        FROM quizzes q
        JOIN course_modules m ON q.module_id = m.id
        WHERE m.course_id = ?
        "#,
    )
    .bind(course_id)
    .fetch_one(db)
    .await
}

pub async fn count_completed_quizzes(
    db: &SqlitePool,
    student_id: &str,
    course_id: &str,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>(
        r#"
        SELECT COUNT(*)
        FROM quiz_attempts a
        JOIN quizzes q ON a.quiz_id = q.id
        JOIN course_modules m ON q.module_id = m.id
        WHERE a.student_id = ? AND m.course_id = ?
        "#,
    )
    .bind(student_id)
    .bind(course_id)
    .fetch_one(db)
    .await
}

pub async fn sum_attempt_scores(
    db: &SqlitePool,
    student_id: &str,
    course_id: &str,
) -> Result<f64, sqlx::Error> {
    sqlx::query_scalar::<_, f64>(
        r#"
        SELECT COALESCE(SUM(a.score), 0.0)
        FROM quiz_attempts a
        JOIN quizzes q ON a.quiz_id = q.id
        JOIN course_modules m ON q.module_id = m.id
        WHERE a.student_id = ? AND m.course_id = ?
        "#,
    )
    .bind(student_id)
    .bind(course_id)
    .fetch_one(db)
    .await
}

/// Average of the stored, legacy `progress` column over every request for the
/// course, whatever its status. Nothing in this core writes that column.
pub async fn avg_stored_progress(
    db: &SqlitePool,
    course_id: &str,
) -> Result<Option<f64>, sqlx::Error> {
    sqlx::query_scalar::<_, Option<f64>>(
        "SELECT AVG(progress) FROM enrollment_requests WHERE course_id = ?",
    )
    .bind(course_id)
    .fetch_one(db)
    .await
}

// --- quiz attempts ---

pub async fn find_attempt(
    db: &SqlitePool,
    student_id: &str,
    quiz_id: &str,
) -> Result<Option<QuizAttempt>, sqlx::Error> {
    sqlx::query_as::<_, QuizAttempt>(
        r#"
        SELECT id, student_id, quiz_id, attempt_date, score
        FROM quiz_attempts
        WHERE student_id = ? AND quiz_id = ?
        "#,
    )
    .bind(student_id)
    .bind(quiz_id)
    .fetch_optional(db)
    .await
}

pub async fn fetch_questions(db: &SqlitePool, quiz_id: &str) -> Result<Vec<Question>, sqlx::Error> {
    sqlx::query_as::<_, Question>(
        "SELECT id, quiz_id, text, question_type FROM questions WHERE quiz_id = ?",
    )
    .bind(quiz_id)
    .fetch_all(db)
    .await
}

/// (question_id, option_id) pairs for every option of the quiz, used to
/// validate submitted selections before anything is written.
pub async fn fetch_option_pairs(
    db: &SqlitePool,
    quiz_id: &str,
) -> Result<Vec<(String, String)>, sqlx::Error> {
    sqlx::query_as::<_, (String, String)>(
        r#"
        SELECT o.question_id, o.id
        FROM options o
        JOIN questions qn ON o.question_id = qn.id
        WHERE qn.quiz_id = ?
        "#,
    )
    .bind(quiz_id)
    .fetch_all(db)
    .await
}

/// (question_id, option_id) pairs for every correct option of the quiz.
pub async fn fetch_correct_options(
    db: &SqlitePool,
    quiz_id: &str,
) -> Result<Vec<(String, String)>, sqlx::Error> {
    sqlx::query_as::<_, (String, String)>(
        r#"
        SELECT o.question_id, o.id
        FROM options o
        JOIN questions qn ON o.question_id = qn.id
        WHERE qn.quiz_id = ? AND o.is_correct = 1
        "#,
    )
    .bind(quiz_id)
    .fetch_all(db)
    .await
}

pub async fn insert_attempt(
    conn: &mut SqliteConnection,
    attempt: &QuizAttempt,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO quiz_attempts (id, student_id, quiz_id, attempt_date, score)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(&attempt.id)
    .bind(&attempt.student_id)
    .bind(&attempt.quiz_id)
    .bind(&attempt.attempt_date)
    .bind(attempt.score)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn insert_answer(
    conn: &mut SqliteConnection,
    attempt_id: &str,
    question_id: &str,
    selected_option_id: &str,
) -> Result<(), sqlx::Error> {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        r#"
        INSERT INTO answers (id, attempt_id, question_id, selected_option_id)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(id)
    .bind(attempt_id)
    .bind(question_id)
    .bind(selected_option_id)
    .execute(conn)
    .await?;
    Ok(())
}
