// src/handlers/test.rs

use std::collections::{BTreeSet, HashMap};

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgPool, types::Json as SqlJson};
use validator::Validate;

use crate::{
    config::{Config, SIMULATION_MULTIPLE_COUNT, SIMULATION_SINGLE_COUNT},
    error::AppError,
    handlers::admin::QUESTION_COLUMNS,
    models::{
        envelope::Envelope,
        question::{Choice, Question},
        test_record::{CreateTestRequest, TestRow},
    },
    session::model::{
        SessionChoice, SessionPayload, SessionQuestion, SimulationPayload, StandardPayload,
        Submission, TestMode, TestResult,
    },
    utils::jwt::Claims,
};

const DEFAULT_QUESTION_COUNT: i64 = 10;

const TEST_COLUMNS: &str = "id, user_id, category_id, test_type, duration, question_ids, \
     number_of_questions, correct_answers, user_answers, is_completed, created_at";

/// Helper struct for fetching answer keys from the database.
#[derive(sqlx::FromRow)]
struct AnswerKey {
    id: i64,
    answer: Vec<i64>,
}

/// Picks random question ids, optionally limited to a category and an answer kind.
async fn random_question_ids(
    pool: &PgPool,
    category_id: Option<i64>,
    multiple: Option<bool>,
    limit: i64,
) -> Result<Vec<i64>, AppError> {
    let ids = sqlx::query_scalar::<_, i64>(
        r#"
        SELECT q.id FROM questions q
        JOIN categories c ON c.id = q.category_id
        WHERE c.deleted = FALSE
          AND ($1::BIGINT IS NULL OR q.category_id = $1)
          AND ($2::BOOLEAN IS NULL OR q.is_multiple_answer = $2)
        ORDER BY RANDOM()
        LIMIT $3
        "#,
    )
    .bind(category_id)
    .bind(multiple)
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to pick questions: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(ids)
}

/// Joins the two simulation draws. Both must be complete, otherwise the
/// multiple-answer questions would shift into the single-answer block.
pub fn simulation_set(single: Vec<i64>, multiple: Vec<i64>) -> Result<Vec<i64>, AppError> {
    if single.len() as i64 != SIMULATION_SINGLE_COUNT
        || multiple.len() as i64 != SIMULATION_MULTIPLE_COUNT
    {
        return Err(AppError::NotFound(format!(
            "A simulation needs {} single-answer and {} multiple-answer questions, found {} and {}",
            SIMULATION_SINGLE_COUNT,
            SIMULATION_MULTIPLE_COUNT,
            single.len(),
            multiple.len()
        )));
    }
    let mut ids = single;
    ids.extend(multiple);
    Ok(ids)
}

/// Assigns a new test to the caller and returns its session payload.
///
/// * `NOTIMER` / `TIMER`: `questionCount` random questions from the category;
///   timed tests get a fixed number of seconds per question.
/// * `SIMULATION`: 50 single-answer then 10 multiple-answer questions,
///   optionally from one category, with a fixed duration.
pub async fn create_test(
    State(pool): State<PgPool>,
    State(config): State<Config>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateTestRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }
    let user_id = claims.user_id()?;

    let (question_ids, duration) = match payload.test_type {
        TestMode::Simulation => {
            let single =
                random_question_ids(&pool, payload.category_id, Some(false), SIMULATION_SINGLE_COUNT)
                    .await?;
            let multiple =
                random_question_ids(&pool, payload.category_id, Some(true), SIMULATION_MULTIPLE_COUNT)
                    .await?;
            (simulation_set(single, multiple)?, Some(config.simulation_duration))
        }
        mode => {
            let category_id = payload.category_id.ok_or_else(|| {
                AppError::BadRequest("categoryId is required for this test type".to_string())
            })?;
            let count = payload.question_count.unwrap_or(DEFAULT_QUESTION_COUNT);
            let ids = random_question_ids(&pool, Some(category_id), None, count).await?;
            let duration = mode
                .is_timed()
                .then(|| ids.len() as i64 * config.timer_seconds_per_question);
            (ids, duration)
        }
    };

    if question_ids.is_empty() {
        return Err(AppError::NotFound("No questions available for this test".to_string()));
    }

    let row = sqlx::query_as::<_, TestRow>(&format!(
        r#"
        INSERT INTO tests (user_id, category_id, test_type, duration, question_ids, number_of_questions)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING {TEST_COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(payload.category_id)
    .bind(payload.test_type.as_str())
    .bind(duration.map(|d| d as i32))
    .bind(&question_ids)
    .bind(question_ids.len() as i32)
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create test: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    tracing::info!(test_id = row.id, user_id, test_type = %payload.test_type, "Test assigned");

    let session = load_session(&pool, &row).await?;
    Ok((StatusCode::CREATED, Json(Envelope::ok("Test created", session))))
}

/// Loads a test row the caller may access, checking it has the expected type.
async fn find_test(
    pool: &PgPool,
    claims: &Claims,
    test_id: i64,
    mode: TestMode,
) -> Result<TestRow, AppError> {
    let row = sqlx::query_as::<_, TestRow>(&format!("SELECT {TEST_COLUMNS} FROM tests WHERE id = $1"))
        .bind(test_id)
        .fetch_optional(pool)
        .await?
        .filter(|row| row.mode() == Some(mode))
        .ok_or_else(|| AppError::NotFound("Test not found".to_string()))?;

    claims.require_owner_or_admin(row.user_id)?;
    Ok(row)
}

async fn load_session(pool: &PgPool, row: &TestRow) -> Result<SessionPayload, AppError> {
    let questions = sqlx::query_as::<_, Question>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = ANY($1)"
    ))
    .bind(&row.question_ids)
    .fetch_all(pool)
    .await?;

    let choices = sqlx::query_as::<_, Choice>(
        "SELECT id, question_id, text FROM choices WHERE question_id = ANY($1) ORDER BY id",
    )
    .bind(&row.question_ids)
    .fetch_all(pool)
    .await?;

    build_session_payload(row, questions, choices)
}

/// Assembles the wire payload in the order the test stored its questions.
/// Deleted questions are left out; correct answers never leave the server.
pub fn build_session_payload(
    row: &TestRow,
    questions: Vec<Question>,
    choices: Vec<Choice>,
) -> Result<SessionPayload, AppError> {
    let mode = row
        .mode()
        .ok_or_else(|| AppError::InternalServerError(format!("Unknown test type '{}'", row.test_type)))?;

    let mut choices_by_question: HashMap<i64, Vec<SessionChoice>> = HashMap::new();
    for choice in choices {
        choices_by_question
            .entry(choice.question_id)
            .or_default()
            .push(SessionChoice {
                id: choice.id,
                text: choice.text,
            });
    }

    let mut by_id: HashMap<i64, Question> = questions.into_iter().map(|q| (q.id, q)).collect();
    let ordered: Vec<SessionQuestion> = row
        .question_ids
        .iter()
        .filter_map(|id| by_id.remove(id))
        .map(|q| SessionQuestion {
            level: q.level(),
            choices: choices_by_question.remove(&q.id).unwrap_or_default(),
            id: q.id,
            title: q.title,
            question: q.question,
            is_multiple_answer: q.is_multiple_answer,
        })
        .collect();

    let duration = row.duration.map(i64::from);
    let payload = match mode {
        TestMode::Simulation => {
            let (multiple_question, single_question): (Vec<_>, Vec<_>) =
                ordered.into_iter().partition(|q| q.is_multiple_answer);
            SessionPayload::Simulation(SimulationPayload {
                id: row.id,
                single_question,
                multiple_question,
                duration,
                created_at: Some(row.created_at),
                is_completed: row.is_completed,
            })
        }
        TestMode::NoTimer | TestMode::Timer => {
            let standard = StandardPayload {
                id: row.id,
                question: ordered,
                duration,
                created_at: Some(row.created_at),
                is_completed: row.is_completed,
            };
            if mode == TestMode::Timer {
                SessionPayload::Timer(standard)
            } else {
                SessionPayload::NoTimer(standard)
            }
        }
    };
    Ok(payload)
}

/// Session fetch: the test's questions in the standard or simulation shape.
pub async fn get_test(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path((test_id, test_type)): Path<(i64, String)>,
) -> Result<impl IntoResponse, AppError> {
    let mode: TestMode = test_type
        .parse()
        .map_err(|_| AppError::NotFound("Test not found".to_string()))?;
    let row = find_test(&pool, &claims, test_id, mode).await?;
    let session = load_session(&pool, &row).await?;

    Ok(Json(Envelope::ok("Test fetched", session)))
}

/// Scores answers against the keys. A question counts as correct when the
/// submitted set equals the key set, order aside.
pub fn calculate_result(keys: Vec<Vec<i64>>, answers: Vec<Vec<i64>>) -> TestResult {
    let correct = keys
        .iter()
        .zip(&answers)
        .filter(|(key, given)| {
            !given.is_empty()
                && key.iter().collect::<BTreeSet<_>>() == given.iter().collect::<BTreeSet<_>>()
        })
        .count();
    let total = keys.len();
    let score = if total == 0 {
        0.0
    } else {
        correct as f64 / total as f64 * 100.0
    };

    TestResult {
        total_questions: total,
        correct_answers: correct,
        score,
        correct_answers_ids: keys,
        user_answers: answers,
    }
}

/// Scores a submission once and records it. A completed test is never
/// rescored, which also turns duplicate submissions into a 409.
pub async fn submit_test(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Path((test_id, test_type)): Path<(i64, String)>,
    Json(submission): Json<Submission>,
) -> Result<impl IntoResponse, AppError> {
    let mode: TestMode = test_type
        .parse()
        .map_err(|_| AppError::NotFound("Test not found".to_string()))?;
    if submission.test_id != test_id || submission.test_type != mode {
        return Err(AppError::BadRequest("Submission does not match the test".to_string()));
    }

    let mut tx = pool.begin().await?;

    let row = sqlx::query_as::<_, TestRow>(&format!(
        "SELECT {TEST_COLUMNS} FROM tests WHERE id = $1 FOR UPDATE"
    ))
    .bind(test_id)
    .fetch_optional(&mut *tx)
    .await?
    .filter(|row| row.mode() == Some(mode))
    .ok_or_else(|| AppError::NotFound("Test not found".to_string()))?;
    claims.require_owner_or_admin(row.user_id)?;

    if row.is_completed {
        return Err(AppError::Conflict("Test has already been submitted".to_string()));
    }
    let keys: HashMap<i64, Vec<i64>> =
        sqlx::query_as::<_, AnswerKey>("SELECT id, answer FROM questions WHERE id = ANY($1)")
            .bind(&row.question_ids)
            .fetch_all(&mut *tx)
            .await?
            .into_iter()
            .map(|k| (k.id, k.answer))
            .collect();

    // questions deleted since assignment are not in the session payload either
    let ordered_keys: Vec<Vec<i64>> = row
        .question_ids
        .iter()
        .filter_map(|id| keys.get(id).cloned())
        .collect();

    if submission.answers.len() != ordered_keys.len() {
        return Err(AppError::BadRequest(format!(
            "Expected {} answers, got {}",
            ordered_keys.len(),
            submission.answers.len()
        )));
    }

    let result = calculate_result(ordered_keys, submission.answers);

    sqlx::query(
        r#"
        UPDATE tests
        SET correct_answers = $1, user_answers = $2, is_completed = TRUE
        WHERE id = $3
        "#,
    )
    .bind(result.correct_answers as i32)
    .bind(SqlJson(&result.user_answers))
    .bind(test_id)
    .execute(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!(test_id, "Failed to record test result: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    tx.commit().await?;
    tracing::info!(
        test_id,
        correct = result.correct_answers,
        total = result.total_questions,
        "Test scored"
    );

    Ok(Json(Envelope::ok("Test submitted", result)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_simulation_set_requires_full_draws() {
        let single: Vec<i64> = (1..=SIMULATION_SINGLE_COUNT).collect();
        let multiple: Vec<i64> = (100..100 + SIMULATION_MULTIPLE_COUNT).collect();

        let ids = simulation_set(single.clone(), multiple.clone()).unwrap();
        assert_eq!(ids.len() as i64, SIMULATION_SINGLE_COUNT + SIMULATION_MULTIPLE_COUNT);
        assert_eq!(ids[SIMULATION_SINGLE_COUNT as usize], 100);

        let short_single = simulation_set(vec![1, 2], multiple).unwrap_err();
        assert!(matches!(short_single, AppError::NotFound(_)));

        let short_multiple = simulation_set(single, vec![100, 101]).unwrap_err();
        assert!(matches!(short_multiple, AppError::NotFound(_)));
    }

    fn test_row(mode: TestMode, question_ids: Vec<i64>) -> TestRow {
        TestRow {
            id: 9,
            user_id: 1,
            category_id: Some(2),
            test_type: mode.as_str().to_string(),
            duration: mode.is_timed().then_some(600),
            number_of_questions: question_ids.len() as i32,
            question_ids,
            correct_answers: None,
            user_answers: None,
            is_completed: false,
            created_at: Utc::now(),
        }
    }

    fn question(id: i64, multiple: bool) -> Question {
        Question {
            id,
            category_id: 2,
            title: format!("Q{}", id),
            question: format!("Question {}", id),
            paragraph: None,
            is_multiple_answer: multiple,
            level: "HARD".to_string(),
            answer: vec![id * 10],
            created_at: Utc::now(),
        }
    }

    fn choice(id: i64, question_id: i64) -> Choice {
        Choice {
            id,
            question_id,
            text: format!("Choice {}", id),
        }
    }

    #[test]
    fn test_scoring_ignores_answer_order() {
        let result = calculate_result(
            vec![vec![1, 2], vec![3], vec![5]],
            vec![vec![2, 1], vec![4], vec![]],
        );
        assert_eq!(result.total_questions, 3);
        assert_eq!(result.correct_answers, 1);
        assert!((result.score - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(result.user_answers[0], vec![2, 1]);
    }

    #[test]
    fn test_partial_multiple_answer_is_wrong() {
        let result = calculate_result(vec![vec![1, 2]], vec![vec![1]]);
        assert_eq!(result.correct_answers, 0);
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn test_empty_test_scores_zero() {
        let result = calculate_result(vec![], vec![]);
        assert_eq!(result.score, 0.0);
    }

    #[test]
    fn test_payload_keeps_stored_order_and_hides_keys() {
        let row = test_row(TestMode::Timer, vec![3, 1, 2]);
        let payload = build_session_payload(
            &row,
            vec![question(1, false), question(2, true), question(3, false)],
            vec![choice(11, 1), choice(31, 3), choice(32, 3)],
        )
        .unwrap();

        let SessionPayload::Timer(standard) = &payload else {
            panic!("expected a timed payload");
        };
        let ids: Vec<i64> = standard.question.iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
        assert_eq!(standard.question[0].choices.len(), 2);
        assert_eq!(standard.duration, Some(600));

        let json = serde_json::to_string(&payload).unwrap();
        assert!(!json.contains("answer\""));
    }

    #[test]
    fn test_simulation_payload_splits_by_answer_kind() {
        let row = test_row(TestMode::Simulation, vec![1, 2, 3]);
        let payload = build_session_payload(
            &row,
            vec![question(1, false), question(2, false), question(3, true)],
            vec![],
        )
        .unwrap();

        let SessionPayload::Simulation(sim) = payload else {
            panic!("expected a simulation payload");
        };
        assert_eq!(sim.single_question.len(), 2);
        assert_eq!(sim.multiple_question[0].id, 3);
    }

    #[test]
    fn test_deleted_questions_are_skipped() {
        let row = test_row(TestMode::NoTimer, vec![1, 2]);
        let payload = build_session_payload(&row, vec![question(2, false)], vec![]).unwrap();
        assert_eq!(payload.normalize().questions.len(), 1);
    }
}
