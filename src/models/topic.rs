// src/models/topic.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

/// Represents the 'categories' table. Deleted categories stay for history.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub deleted: bool,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be between 1 and 100 characters."))]
    pub name: String,
}

/// Represents the 'topics' table: study material within a category.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub id: i64,
    pub category_id: i64,
    pub name: String,
    /// Storage key of the converted PDF, once uploaded.
    pub docfile_name: Option<String>,
    pub pages: Option<i32>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTopicRequest {
    pub category_id: i64,
    #[validate(length(min = 1, max = 200, message = "Name must be between 1 and 200 characters."))]
    pub name: String,
}

/// Admin document upload: the file is base64, optionally as a data URL.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DocUploadRequest {
    pub topic_id: i64,
    #[validate(length(min = 1, message = "File is required."))]
    pub file: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocUploadResponse {
    pub topic_id: i64,
    pub docfile_name: String,
    pub pages: u32,
}

/// A topic the user has opened, most recent first.
#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LearningHistoryItem {
    pub topic_id: i64,
    pub topic_name: String,
    pub category_name: String,
    pub pages: Option<i32>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}
