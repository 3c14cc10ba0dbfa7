// src/handlers/documents.rs

use axum::{
    Json,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use sqlx::PgPool;
use validator::Validate;

use crate::{
    error::AppError,
    ingest::document::{PipelineError, ingest_document},
    models::{
        envelope::Envelope,
        topic::{DocUploadRequest, DocUploadResponse, Topic},
    },
    state::AppState,
    storage::{DocumentStorage, StorageError},
    utils::format::sanitize_file_name,
};

async fn find_topic(pool: &PgPool, topic_id: i64) -> Result<Topic, AppError> {
    sqlx::query_as::<_, Topic>(
        "SELECT id, category_id, name, docfile_name, pages, created_at FROM topics WHERE id = $1",
    )
    .bind(topic_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Topic does not exist. Please provide a valid topicId.".to_string()))
}

#[derive(Debug, Serialize)]
struct StageFailure<'a> {
    stage: &'a str,
}

/// Pipeline failures keep the envelope shape and name the failed stage in `data`.
fn pipeline_failure(err: PipelineError) -> Response {
    let stage = err.stage();
    tracing::warn!(stage, "Document pipeline failed: {}", err);
    let status = match err {
        PipelineError::Decode(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::BAD_GATEWAY,
    };
    let body = Json(serde_json::json!({
        "err": true,
        "msg": err.to_string(),
        "data": StageFailure { stage },
    }));
    (status, body).into_response()
}

/// Converts an uploaded office document to PDF, stores it and records it
/// on the topic. The topic only changes after the upload succeeded.
/// Admin only.
pub async fn upload_document(
    State(state): State<AppState>,
    Json(payload): Json<DocUploadRequest>,
) -> Result<Response, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }
    let topic = find_topic(&state.pool, payload.topic_id).await?;

    let stored = match ingest_document(
        state.converter.as_ref(),
        &state.storage,
        topic.id,
        &payload.file,
    )
    .await
    {
        Ok(stored) => stored,
        Err(e) => return Ok(pipeline_failure(e)),
    };

    sqlx::query("UPDATE topics SET docfile_name = $1, pages = $2 WHERE id = $3")
        .bind(&stored.key)
        .bind(stored.pages as i32)
        .bind(topic.id)
        .execute(&state.pool)
        .await
        .map_err(|e| {
            tracing::error!(topic_id = topic.id, "Failed to record document: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    let body = Envelope::ok(
        "Document uploaded and converted to PDF successfully",
        DocUploadResponse {
            topic_id: topic.id,
            docfile_name: stored.key,
            pages: stored.pages,
        },
    );
    Ok(Json(body).into_response())
}

/// Streams a topic's stored PDF with a download name derived from the topic.
pub async fn download_document(
    State(pool): State<PgPool>,
    State(storage): State<DocumentStorage>,
    Path(topic_id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let topic = find_topic(&pool, topic_id).await?;
    let key = topic
        .docfile_name
        .ok_or_else(|| AppError::NotFound("Topic has no document yet".to_string()))?;

    let bytes = storage.fetch(&key).await.map_err(|e| match e {
        StorageError::NotFound(_) => AppError::NotFound("Document not found in storage".to_string()),
        other => AppError::ExternalService(other.to_string()),
    })?;

    let disposition = format!("inline; filename=\"{}.pdf\"", sanitize_file_name(&topic.name));
    Ok((
        [
            (header::CONTENT_TYPE, "application/pdf".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}
