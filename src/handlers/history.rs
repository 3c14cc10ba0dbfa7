// src/handlers/history.rs

use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use sqlx::PgPool;

use crate::{
    config::LEADERBOARD_SIZE,
    error::AppError,
    models::{
        envelope::Envelope,
        test_record::{GradedTest, HistoryRow, RankEntry, Stats, TestHistory},
        topic::LearningHistoryItem,
    },
    utils::jwt::Claims,
};

/// Average of per-test ratios on a 0 to 10 scale, rounded to two decimals.
/// Tests without questions are ignored.
pub fn grade_of(tests: &[GradedTest]) -> f64 {
    let ratios: Vec<f64> = tests
        .iter()
        .filter(|t| t.number_of_questions > 0)
        .map(|t| t.correct_answers.unwrap_or(0) as f64 / t.number_of_questions as f64)
        .collect();
    if ratios.is_empty() {
        return 0.0;
    }
    let grade = ratios.iter().sum::<f64>() / ratios.len() as f64 * 10.0;
    (grade * 100.0).round() / 100.0
}

async fn ensure_user(pool: &PgPool, user_id: i64) -> Result<(), AppError> {
    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    exists
        .map(|_| ())
        .ok_or_else(|| AppError::NotFound("Invalid User".to_string()))
}

/// A user's tests, newest first, split into practice and simulation runs.
pub async fn test_history(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_owner_or_admin(user_id)?;
    ensure_user(&pool, user_id).await?;

    let rows = sqlx::query_as::<_, HistoryRow>(
        r#"
        SELECT t.id, c.name AS category_name, t.test_type, t.number_of_questions,
               t.correct_answers, t.is_completed, t.created_at
        FROM tests t
        LEFT JOIN categories c ON c.id = t.category_id
        WHERE t.user_id = $1
        ORDER BY t.created_at DESC, t.id DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!(user_id, "Failed to load test history: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(Envelope::ok("Test history", TestHistory::from_rows(rows))))
}

#[derive(sqlx::FromRow)]
struct Counts {
    total_tests: i64,
    completed_tests: i64,
    total_questions: i64,
    correct_answers: i64,
}

/// Counts and grade for one user.
pub async fn user_stats(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_owner_or_admin(user_id)?;
    ensure_user(&pool, user_id).await?;

    let counts = sqlx::query_as::<_, Counts>(
        r#"
        SELECT COUNT(*) AS total_tests,
               COUNT(*) FILTER (WHERE is_completed) AS completed_tests,
               COALESCE(SUM(number_of_questions) FILTER (WHERE is_completed), 0)::BIGINT AS total_questions,
               COALESCE(SUM(correct_answers) FILTER (WHERE is_completed), 0)::BIGINT AS correct_answers
        FROM tests
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_one(&pool)
    .await?;

    let graded = sqlx::query_as::<_, GradedTest>(
        r#"
        SELECT number_of_questions, correct_answers
        FROM tests
        WHERE user_id = $1 AND is_completed = TRUE
        "#,
    )
    .bind(user_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(Envelope::ok(
        "Stats",
        Stats {
            total_tests: counts.total_tests,
            completed_tests: counts.completed_tests,
            total_questions: counts.total_questions,
            correct_answers: counts.correct_answers,
            grade: grade_of(&graded),
        },
    )))
}

/// Public leaderboard, highest grade first. Ties go to the older account.
///
/// Same grade as [`grade_of`], computed in SQL so only the top rows leave
/// the database.
pub async fn ranks(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let ranks = sqlx::query_as::<_, RankEntry>(
        r#"
        SELECT t.user_id AS id,
               COALESCE(u.name, u.username) AS name,
               ROUND((AVG(COALESCE(t.correct_answers, 0)::FLOAT8 / t.number_of_questions) * 10)::NUMERIC, 2)::FLOAT8 AS grade
        FROM tests t
        JOIN users u ON u.id = t.user_id
        WHERE t.is_completed = TRUE AND t.number_of_questions > 0
        GROUP BY t.user_id, u.name, u.username
        ORDER BY grade DESC, t.user_id
        LIMIT $1
        "#,
    )
    .bind(LEADERBOARD_SIZE)
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to load ranks: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(Envelope::ok("Ranks", ranks)))
}

/// Topics the user has opened, most recently read first.
pub async fn learning_history(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(user_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    claims.require_owner_or_admin(user_id)?;
    ensure_user(&pool, user_id).await?;

    let items = sqlx::query_as::<_, LearningHistoryItem>(
        r#"
        SELECT ut.topic_id, t.name AS topic_name, c.name AS category_name, t.pages, ut.updated_at
        FROM user_topics ut
        JOIN topics t ON t.id = ut.topic_id
        JOIN categories c ON c.id = t.category_id
        WHERE ut.user_id = $1
        ORDER BY ut.updated_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(&pool)
    .await?;

    Ok(Json(Envelope::ok("Learning history", items)))
}

/// Records that the caller read a topic. Re-reading bumps `updated_at`.
pub async fn record_progress(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path(topic_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let user_id = claims.user_id()?;

    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM topics WHERE id = $1")
        .bind(topic_id)
        .fetch_optional(&pool)
        .await?;
    if exists.is_none() {
        return Err(AppError::NotFound("Topic not found".to_string()));
    }

    sqlx::query(
        r#"
        INSERT INTO user_topics (user_id, topic_id)
        VALUES ($1, $2)
        ON CONFLICT (user_id, topic_id) DO UPDATE SET updated_at = NOW()
        "#,
    )
    .bind(user_id)
    .bind(topic_id)
    .execute(&pool)
    .await
    .map_err(|e| {
        tracing::error!(user_id, topic_id, "Failed to record progress: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(Envelope::ok("Progress recorded", topic_id)))
}
