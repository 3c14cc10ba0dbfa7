// src/handlers/flags.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use sqlx::{PgPool, Postgres, QueryBuilder};
use validator::Validate;

use crate::{
    config::FLAGS_PER_PAGE,
    error::AppError,
    models::{
        envelope::Envelope,
        flag::{CreateFlagRequest, Flag, FlagDetail, FlagPage, FlagQuery, UpdateFlagRequest},
    },
    utils::jwt::Claims,
};

const FLAG_COLUMNS: &str = "id, question_id, user_id, description, resolved, comment, created_at";

/// Flags a question as wrong or unclear.
pub async fn create_flag(
    State(pool): State<PgPool>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateFlagRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM questions WHERE id = $1")
        .bind(payload.question_id)
        .fetch_optional(&pool)
        .await?;
    if exists.is_none() {
        return Err(AppError::NotFound("Question not found".to_string()));
    }

    let flag = sqlx::query_as::<_, Flag>(&format!(
        r#"
        INSERT INTO flags (question_id, user_id, description)
        VALUES ($1, $2, $3)
        RETURNING {FLAG_COLUMNS}
        "#
    ))
    .bind(payload.question_id)
    .bind(claims.user_id()?)
    .bind(payload.description.trim())
    .fetch_one(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create flag: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    tracing::info!(flag_id = flag.id, question_id = flag.question_id, "Question flagged");
    Ok((StatusCode::CREATED, Json(Envelope::ok("Question flagged", flag))))
}

/// Lists flags by resolution state, newest first, a page at a time.
/// Admin only.
pub async fn list_flags(
    State(pool): State<PgPool>,
    Query(params): Query<FlagQuery>,
) -> Result<impl IntoResponse, AppError> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM flags WHERE resolved = $1")
        .bind(params.resolved)
        .fetch_one(&pool)
        .await?;

    let flags = sqlx::query_as::<_, Flag>(&format!(
        r#"
        SELECT {FLAG_COLUMNS} FROM flags
        WHERE resolved = $1
        ORDER BY created_at DESC, id DESC
        LIMIT $2 OFFSET $3
        "#
    ))
    .bind(params.resolved)
    .bind(FLAGS_PER_PAGE)
    .bind(params.offset())
    .fetch_all(&pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to list flags: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(Json(Envelope::ok("Flags", FlagPage::new(flags, params.page(), total))))
}

/// One flag with its reporter and the flagged question.
/// Admin only.
pub async fn get_flag(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let flag = sqlx::query_as::<_, FlagDetail>(
        r#"
        SELECT f.id, f.question_id, f.user_id, u.username, f.description, f.resolved,
               f.comment, q.title AS question_title, q.question, f.created_at
        FROM flags f
        JOIN users u ON u.id = f.user_id
        JOIN questions q ON q.id = f.question_id
        WHERE f.id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(&pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Flag not found".to_string()))?;

    Ok(Json(Envelope::ok("Flag", flag)))
}

/// Resolves or annotates a flag. Only the provided fields change.
/// Admin only.
pub async fn update_flag(
    State(pool): State<PgPool>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateFlagRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }
    if payload.resolved.is_none() && payload.comment.is_none() {
        return Err(AppError::BadRequest("Nothing to update".to_string()));
    }

    let mut builder: QueryBuilder<Postgres> = QueryBuilder::new("UPDATE flags SET ");
    let mut separated = builder.separated(", ");
    if let Some(resolved) = payload.resolved {
        separated.push("resolved = ");
        separated.push_bind_unseparated(resolved);
    }
    if let Some(comment) = &payload.comment {
        separated.push("comment = ");
        separated.push_bind_unseparated(comment.trim().to_string());
    }
    builder.push(" WHERE id = ");
    builder.push_bind(id);
    builder.push(format!(" RETURNING {FLAG_COLUMNS}"));

    let flag = builder
        .build_query_as::<Flag>()
        .fetch_optional(&pool)
        .await
        .map_err(|e| {
            tracing::error!(flag_id = id, "Failed to update flag: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?
        .ok_or_else(|| AppError::NotFound("Flag not found".to_string()))?;

    tracing::info!(flag_id = id, resolved = flag.resolved, "Flag updated");
    Ok(Json(Envelope::ok("Flag updated", flag)))
}
