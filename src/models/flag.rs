// src/models/flag.rs

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::config::FLAGS_PER_PAGE;

/// Represents the 'flags' table: a user's report against a question.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flag {
    pub id: i64,
    pub question_id: i64,
    pub user_id: i64,
    pub description: String,
    pub resolved: bool,
    pub comment: Option<String>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Flag joined with the question it points at, for the admin detail view.
#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FlagDetail {
    pub id: i64,
    pub question_id: i64,
    pub user_id: i64,
    pub username: String,
    pub description: String,
    pub resolved: bool,
    pub comment: Option<String>,
    pub question_title: String,
    pub question: String,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct FlagQuery {
    #[serde(default)]
    pub resolved: bool,
    pub page: Option<i64>,
}

impl FlagQuery {
    /// 1-based; anything below 1 is page 1.
    pub fn page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    /// Saturates instead of overflowing; a page past the end is just empty.
    pub fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(FLAGS_PER_PAGE)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlagPage {
    pub flags: Vec<Flag>,
    pub page: i64,
    pub total_pages: i64,
    pub total: i64,
}

impl FlagPage {
    pub fn new(flags: Vec<Flag>, page: i64, total: i64) -> Self {
        Self {
            flags,
            page,
            total_pages: total_pages(total),
            total,
        }
    }
}

pub fn total_pages(total: i64) -> i64 {
    (total + FLAGS_PER_PAGE - 1) / FLAGS_PER_PAGE
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateFlagRequest {
    pub question_id: i64,
    #[validate(length(min = 1, max = 1000, message = "Description must be between 1 and 1000 characters."))]
    pub description: String,
}

/// Admin resolution of a flag. Absent fields are left untouched.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateFlagRequest {
    pub resolved: Option<bool>,
    #[validate(length(max = 1000))]
    pub comment: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages_rounds_up() {
        assert_eq!(total_pages(0), 0);
        assert_eq!(total_pages(1), 1);
        assert_eq!(total_pages(30), 1);
        assert_eq!(total_pages(31), 2);
        assert_eq!(total_pages(90), 3);
    }

    #[test]
    fn test_page_offsets() {
        let query = FlagQuery {
            resolved: false,
            page: Some(3),
        };
        assert_eq!(query.offset(), 60);

        let query = FlagQuery {
            resolved: true,
            page: Some(0),
        };
        assert_eq!(query.page(), 1);
        assert_eq!(query.offset(), 0);
    }

    #[test]
    fn test_huge_page_saturates_offset() {
        let query = FlagQuery {
            resolved: false,
            page: Some(i64::MAX),
        };
        assert_eq!(query.page(), i64::MAX);
        assert_eq!(query.offset(), i64::MAX);

        let query = FlagQuery {
            resolved: false,
            page: Some(i64::MIN),
        };
        assert_eq!(query.offset(), 0);
    }
}
