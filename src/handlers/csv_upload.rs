// src/handlers/csv_upload.rs

use axum::{
    Json,
    extract::{Multipart, State},
    response::IntoResponse,
};
use sqlx::PgPool;

use crate::{
    error::AppError,
    handlers::admin::ensure_category,
    ingest::csv_import::import_csv,
    models::envelope::Envelope,
};

/// Bulk question import from a multipart form with `file` and `categoryId`.
/// Admin only.
pub async fn upload_csv(
    State(pool): State<PgPool>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut file: Option<Vec<u8>> = None;
    let mut category_id: Option<i64> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                file = Some(bytes.to_vec());
            }
            Some("categoryId") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                let id = text
                    .trim()
                    .parse()
                    .map_err(|_| AppError::BadRequest("categoryId must be a number".to_string()))?;
                category_id = Some(id);
            }
            _ => {}
        }
    }

    let file = file.ok_or_else(|| AppError::BadRequest("No CSV file uploaded".to_string()))?;
    let category_id =
        category_id.ok_or_else(|| AppError::BadRequest("categoryId is required".to_string()))?;
    ensure_category(&pool, category_id).await?;

    let summary = import_csv(&pool, category_id, &file).await?;
    tracing::info!(category_id, imported = summary.imported, "CSV import finished");

    Ok(Json(Envelope::ok(
        format!("{} questions imported", summary.imported),
        summary,
    )))
}
