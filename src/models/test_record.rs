// src/models/test_record.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use validator::Validate;

use crate::{session::model::TestMode, utils::format::format_date_time};

/// Represents the 'tests' table: one assigned attempt.
#[derive(Debug, Clone, FromRow)]
pub struct TestRow {
    pub id: i64,
    pub user_id: i64,
    pub category_id: Option<i64>,
    pub test_type: String,
    pub duration: Option<i32>,
    /// Question ids in session order.
    pub question_ids: Vec<i64>,
    pub number_of_questions: i32,
    pub correct_answers: Option<i32>,
    pub user_answers: Option<Json<Vec<Vec<i64>>>>,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
}

impl TestRow {
    pub fn mode(&self) -> Option<TestMode> {
        self.test_type.parse().ok()
    }
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTestRequest {
    pub category_id: Option<i64>,
    pub test_type: TestMode,
    /// Ignored for simulations, which have a fixed shape.
    #[validate(range(min = 1, max = 100, message = "Question count must be between 1 and 100."))]
    pub question_count: Option<i64>,
}

/// Row of the history query before formatting.
#[derive(Debug, FromRow)]
pub struct HistoryRow {
    pub id: i64,
    pub category_name: Option<String>,
    pub test_type: String,
    pub number_of_questions: i32,
    pub correct_answers: Option<i32>,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: i64,
    pub category: Option<String>,
    pub test_type: String,
    pub number_of_questions: i32,
    pub correct_answers: Option<i32>,
    pub is_completed: bool,
    pub created_at: DateTime<Utc>,
    /// e.g. "Jan 5, 2024 3:07pm"
    pub date: String,
}

impl From<HistoryRow> for HistoryEntry {
    fn from(row: HistoryRow) -> Self {
        Self {
            date: format_date_time(&row.created_at),
            id: row.id,
            category: row.category_name,
            test_type: row.test_type,
            number_of_questions: row.number_of_questions,
            correct_answers: row.correct_answers,
            is_completed: row.is_completed,
            created_at: row.created_at,
        }
    }
}

/// Test history split the way the history page shows it.
#[derive(Debug, Default, Serialize)]
pub struct TestHistory {
    #[serde(rename = "UserTestDetail")]
    pub user_test_detail: Vec<HistoryEntry>,
    #[serde(rename = "SimulationTestDetail")]
    pub simulation_test_detail: Vec<HistoryEntry>,
}

impl TestHistory {
    pub fn from_rows(rows: Vec<HistoryRow>) -> Self {
        let mut history = Self::default();
        for row in rows {
            let entry = HistoryEntry::from(row);
            if entry.test_type == TestMode::Simulation.as_str() {
                history.simulation_test_detail.push(entry);
            } else {
                history.user_test_detail.push(entry);
            }
        }
        history
    }
}

/// Per-user aggregates. `grade` is on a 0 to 10 scale.
#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total_tests: i64,
    pub completed_tests: i64,
    pub total_questions: i64,
    pub correct_answers: i64,
    pub grade: f64,
}

/// Completed-test numbers used for grading.
#[derive(Debug, Clone, FromRow)]
pub struct GradedTest {
    pub number_of_questions: i32,
    pub correct_answers: Option<i32>,
}

/// One leaderboard row. `name` falls back to the username.
#[derive(Debug, Serialize, PartialEq, FromRow)]
pub struct RankEntry {
    pub id: i64,
    pub name: String,
    pub grade: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn row(id: i64, test_type: &str) -> HistoryRow {
        HistoryRow {
            id,
            category_name: Some("Physics".to_string()),
            test_type: test_type.to_string(),
            number_of_questions: 10,
            correct_answers: Some(7),
            is_completed: true,
            created_at: Utc.with_ymd_and_hms(2024, 1, 5, 15, 7, 0).unwrap(),
        }
    }

    #[test]
    fn test_history_splits_simulations() {
        let history = TestHistory::from_rows(vec![
            row(1, "TIMER"),
            row(2, "SIMULATION"),
            row(3, "NOTIMER"),
        ]);

        assert_eq!(history.user_test_detail.len(), 2);
        assert_eq!(history.simulation_test_detail[0].id, 2);
        assert_eq!(history.user_test_detail[0].date, "Jan 5, 2024 3:07pm");

        let json = serde_json::to_value(&history).unwrap();
        assert!(json.get("UserTestDetail").is_some());
        assert!(json.get("SimulationTestDetail").is_some());
    }
}
