// src/handlers/admin.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        envelope::Envelope,
        question::{
            Choice, CreateQuestionRequest, Question, QuestionEditorView, UpdateQuestionRequest,
            title_from,
        },
        topic::{Category, CreateCategoryRequest, CreateTopicRequest, Topic},
    },
    utils::html::clean_paragraph,
};

pub(crate) const QUESTION_COLUMNS: &str =
    "id, category_id, title, question, paragraph, is_multiple_answer, level, answer, created_at";

/// Creates a category.
/// Admin only.
pub async fn create_category(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateCategoryRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let category = sqlx::query_as::<_, Category>(
        "INSERT INTO categories (name) VALUES ($1) RETURNING id, name, deleted, created_at",
    )
    .bind(payload.name.trim())
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create category: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((StatusCode::CREATED, Json(Envelope::ok("Category created", category))))
}

/// Lists live categories.
pub async fn list_categories(State(pool): State<PgPool>) -> Result<impl IntoResponse, AppError> {
    let categories = sqlx::query_as::<_, Category>(
        "SELECT id, name, deleted, created_at FROM categories WHERE deleted = FALSE ORDER BY name",
    )
    .fetch_all(&pool)
    .await?;

    Ok(Json(Envelope::ok("Categories", categories)))
}

/// Creates a topic inside a category.
/// Admin only.
pub async fn create_topic(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateTopicRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }
    ensure_category(&pool, payload.category_id).await?;

    let topic = sqlx::query_as::<_, Topic>(
        r#"
        INSERT INTO topics (category_id, name)
        VALUES ($1, $2)
        RETURNING id, category_id, name, docfile_name, pages, created_at
        "#,
    )
    .bind(payload.category_id)
    .bind(payload.name.trim())
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create topic: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok((StatusCode::CREATED, Json(Envelope::ok("Topic created", topic))))
}

pub(crate) async fn ensure_category(pool: &PgPool, category_id: i64) -> Result<(), AppError> {
    let exists: Option<i64> =
        sqlx::query_scalar("SELECT id FROM categories WHERE id = $1 AND deleted = FALSE")
            .bind(category_id)
            .fetch_optional(pool)
            .await?;
    exists
        .map(|_| ())
        .ok_or_else(|| AppError::NotFound(format!("Category {} not found", category_id)))
}

/// Maps 1-based positions onto the ids of the inserted choices.
fn correct_ids(positions: &[usize], choice_ids: &[i64]) -> Result<Vec<i64>, AppError> {
    positions
        .iter()
        .map(|&p| {
            p.checked_sub(1)
                .and_then(|i| choice_ids.get(i).copied())
                .ok_or_else(|| AppError::BadRequest(format!("Correct choice {} does not exist", p)))
        })
        .collect()
}

/// Creates a question with its choices in one transaction.
/// Admin only.
pub async fn create_question(
    State(pool): State<PgPool>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }
    if let Some(&bad) = payload
        .correct
        .iter()
        .find(|&&p| p == 0 || p > payload.choices.len())
    {
        return Err(AppError::BadRequest(format!("Correct choice {} does not exist", bad)));
    }
    ensure_category(&pool, payload.category_id).await?;

    let title = payload
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| title_from(&payload.question));

    let mut tx = pool.begin().await?;

    let question_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO questions (category_id, title, question, paragraph, is_multiple_answer, level)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
        "#,
    )
    .bind(payload.category_id)
    .bind(&title)
    .bind(&payload.question)
    .bind(clean_paragraph(payload.paragraph.as_deref()))
    .bind(payload.correct.len() > 1)
    .bind(payload.level.as_str())
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create question: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    let mut choice_ids = Vec::with_capacity(payload.choices.len());
    for text in &payload.choices {
        let id: i64 =
            sqlx::query_scalar("INSERT INTO choices (question_id, text) VALUES ($1, $2) RETURNING id")
                .bind(question_id)
                .bind(text.trim())
                .fetch_one(&mut *tx)
                .await?;
        choice_ids.push(id);
    }

    let answer = correct_ids(&payload.correct, &choice_ids)?;
    sqlx::query("UPDATE questions SET answer = $1 WHERE id = $2")
        .bind(&answer)
        .bind(question_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    tracing::info!(question_id, "Question created");

    Ok((
        StatusCode::CREATED,
        Json(Envelope::ok("Question created", serde_json::json!({ "id": question_id }))),
    ))
}

pub(crate) async fn load_question(pool: &PgPool, id: i64) -> Result<QuestionEditorView, AppError> {
    let question = sqlx::query_as::<_, Question>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Question not found".to_string()))?;

    let choices = sqlx::query_as::<_, Choice>(
        "SELECT id, question_id, text FROM choices WHERE question_id = $1 ORDER BY id",
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    Ok(QuestionEditorView::new(question, choices))
}

/// Question editor view: question, choices and the correct ids.
/// Admin only.
pub async fn get_question(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let view = load_question(&pool, id).await?;
    Ok(Json(Envelope::ok("Question", view)))
}

/// Inline update of a question and, optionally, its whole choice list.
/// Admin only.
pub async fn update_question(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let mut tx = pool.begin().await?;

    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM questions WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
    if exists.is_none() {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    let has_fields = payload.title.is_some()
        || payload.question.is_some()
        || payload.paragraph.is_some()
        || payload.level.is_some()
        || payload.is_multiple_answer.is_some()
        || payload.answer.is_some();

    if has_fields {
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE questions SET ");
        let mut separated = builder.separated(", ");

        if let Some(title) = payload.title {
            separated.push("title = ");
            separated.push_bind_unseparated(title);
        }

        if let Some(question) = payload.question {
            separated.push("question = ");
            separated.push_bind_unseparated(question);
        }

        if let Some(paragraph) = payload.paragraph {
            separated.push("paragraph = ");
            separated.push_bind_unseparated(clean_paragraph(Some(paragraph.as_str())));
        }

        if let Some(level) = payload.level {
            separated.push("level = ");
            separated.push_bind_unseparated(level.as_str());
        }

        if let Some(is_multiple_answer) = payload.is_multiple_answer {
            separated.push("is_multiple_answer = ");
            separated.push_bind_unseparated(is_multiple_answer);
        }

        if let Some(answer) = payload.answer {
            separated.push("answer = ");
            separated.push_bind_unseparated(answer);
        }

        builder.push(" WHERE id = ");
        builder.push_bind(id);

        builder.build().execute(&mut *tx).await.map_err(|e| {
            tracing::error!("Failed to update question: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;
    }

    if let Some(choices) = payload.choice {
        if choices.iter().any(|c| c.text.trim().is_empty()) {
            return Err(AppError::BadRequest("Choice text cannot be empty".to_string()));
        }

        let kept: Vec<i64> = choices.iter().filter_map(|c| c.id).collect();
        sqlx::query("DELETE FROM choices WHERE question_id = $1 AND NOT (id = ANY($2))")
            .bind(id)
            .bind(&kept)
            .execute(&mut *tx)
            .await?;

        for choice in choices {
            match choice.id {
                Some(choice_id) => {
                    let result = sqlx::query(
                        "UPDATE choices SET text = $1, updated_at = NOW() WHERE id = $2 AND question_id = $3",
                    )
                    .bind(choice.text.trim())
                    .bind(choice_id)
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                    if result.rows_affected() == 0 {
                        return Err(AppError::BadRequest(format!(
                            "Choice {} does not belong to question {}",
                            choice_id, id
                        )));
                    }
                }
                None => {
                    sqlx::query("INSERT INTO choices (question_id, text) VALUES ($1, $2)")
                        .bind(id)
                        .bind(choice.text.trim())
                        .execute(&mut *tx)
                        .await?;
                }
            }
        }

        // drop correct ids that pointed at removed choices
        sqlx::query(
            r#"
            UPDATE questions
            SET answer = ARRAY(
                SELECT a FROM unnest(answer) AS a
                WHERE a IN (SELECT id FROM choices WHERE question_id = $1)
            )
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    let view = load_question(&pool, id).await?;
    Ok(Json(Envelope::ok("Question updated", view)))
}

/// Deletes a question; its choices and flags go with it.
/// Admin only.
pub async fn delete_question(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let result = sqlx::query("DELETE FROM questions WHERE id = $1")
        .bind(id)
        .execute(&pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to delete question: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correct_positions_map_to_ids() {
        assert_eq!(correct_ids(&[1, 3], &[10, 11, 12]).unwrap(), vec![10, 12]);
        assert!(matches!(correct_ids(&[4], &[10, 11, 12]), Err(AppError::BadRequest(_))));
        assert!(matches!(correct_ids(&[0], &[10]), Err(AppError::BadRequest(_))));
    }
}
