// src/ingest/csv_import.rs

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use thiserror::Error;

use crate::models::question::{Level, title_from};

/// Failures carry the 1-based data row (the header is row 0).
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("CSV file is unreadable: {0}")]
    Header(String),
    #[error("row {row}: {message}")]
    Parse { row: usize, message: String },
    #[error("row {row}: failed to save question: {message}")]
    Database { row: usize, message: String },
}

/// One CSV record: `question, choice1..choice5, answer, level`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CsvQuestionRow {
    pub question: String,
    #[serde(default)]
    pub choice1: Option<String>,
    #[serde(default)]
    pub choice2: Option<String>,
    #[serde(default)]
    pub choice3: Option<String>,
    #[serde(default)]
    pub choice4: Option<String>,
    #[serde(default)]
    pub choice5: Option<String>,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub level: Option<String>,
}

/// A row checked and shaped for insertion.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedQuestion {
    pub title: String,
    pub question: String,
    pub level: Level,
    pub is_multiple_answer: bool,
    pub choices: Vec<String>,
    pub answer: String,
}

impl CsvQuestionRow {
    pub fn prepare(self, row: usize) -> Result<PreparedQuestion, ImportError> {
        let question = self.question.trim().to_string();
        if question.is_empty() {
            return Err(ImportError::Parse {
                row,
                message: "question is empty".to_string(),
            });
        }

        let choices: Vec<String> = [self.choice1, self.choice2, self.choice3, self.choice4, self.choice5]
            .into_iter()
            .flatten()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        if choices.is_empty() {
            return Err(ImportError::Parse {
                row,
                message: "no choices given".to_string(),
            });
        }

        Ok(PreparedQuestion {
            title: title_from(&question),
            is_multiple_answer: self.answer.contains(','),
            level: self.level.as_deref().map(Level::from_code).unwrap_or_default(),
            question,
            choices,
            answer: self.answer,
        })
    }
}

/// Maps the 1-based indices in `answer` onto the ids of the created choices.
/// Indices with no created choice, or that do not parse, are dropped.
pub fn correct_choice_ids(answer: &str, created: &[i64]) -> Vec<i64> {
    answer
        .split(',')
        .filter_map(|part| part.trim().parse::<usize>().ok())
        .filter_map(|index| index.checked_sub(1))
        .filter_map(|index| created.get(index).copied())
        .collect()
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub imported: usize,
    pub question_ids: Vec<i64>,
}

/// Imports every record of `data` into `category_id`, in order.
///
/// Each row is committed in its own transaction. A failing row stops the
/// import; rows before it stay committed.
pub async fn import_csv(
    pool: &PgPool,
    category_id: i64,
    data: &[u8],
) -> Result<ImportSummary, ImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .flexible(true)
        .from_reader(data);

    let headers = reader
        .headers()
        .map_err(|e| ImportError::Header(e.to_string()))?;
    if !headers.iter().any(|h| h == "question") {
        return Err(ImportError::Header("missing 'question' column".to_string()));
    }

    let mut summary = ImportSummary::default();
    for (i, record) in reader.deserialize::<CsvQuestionRow>().enumerate() {
        let row = i + 1;
        let prepared = record
            .map_err(|e| ImportError::Parse {
                row,
                message: e.to_string(),
            })?
            .prepare(row)?;

        let id = insert_question(pool, category_id, &prepared)
            .await
            .map_err(|e| {
                tracing::error!(row, "CSV import failed: {:?}", e);
                ImportError::Database {
                    row,
                    message: e.to_string(),
                }
            })?;

        summary.imported += 1;
        summary.question_ids.push(id);
    }

    tracing::info!(category_id, imported = summary.imported, "CSV import finished");
    Ok(summary)
}

async fn insert_question(
    pool: &PgPool,
    category_id: i64,
    prepared: &PreparedQuestion,
) -> Result<i64, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let question_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO questions (category_id, title, question, is_multiple_answer, level)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
        "#,
    )
    .bind(category_id)
    .bind(&prepared.title)
    .bind(&prepared.question)
    .bind(prepared.is_multiple_answer)
    .bind(prepared.level.as_str())
    .fetch_one(&mut *tx)
    .await?;

    let mut created = Vec::with_capacity(prepared.choices.len());
    for text in &prepared.choices {
        let choice_id: i64 =
            sqlx::query_scalar("INSERT INTO choices (question_id, text) VALUES ($1, $2) RETURNING id")
                .bind(question_id)
                .bind(text)
                .fetch_one(&mut *tx)
                .await?;
        created.push(choice_id);
    }

    let answer = correct_choice_ids(&prepared.answer, &created);
    sqlx::query("UPDATE questions SET answer = $1 WHERE id = $2")
        .bind(&answer)
        .bind(question_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(question_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(answer: &str) -> CsvQuestionRow {
        CsvQuestionRow {
            question: "Which planets are gas giants?".to_string(),
            choice1: Some("Jupiter".to_string()),
            choice2: Some("Saturn".to_string()),
            answer: answer.to_string(),
            level: Some("2".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_indices_past_created_choices_are_dropped() {
        assert_eq!(correct_choice_ids("1,3", &[101, 102]), vec![101]);
        assert_eq!(correct_choice_ids(" 2 , 1", &[101, 102]), vec![102, 101]);
        assert_eq!(correct_choice_ids("0,x,", &[101, 102]), Vec::<i64>::new());
    }

    #[test]
    fn test_prepare_row() {
        let prepared = row("1,3").prepare(1).unwrap();
        assert!(prepared.is_multiple_answer);
        assert_eq!(prepared.level, Level::Medium);
        assert_eq!(prepared.choices, vec!["Jupiter", "Saturn"]);
        assert_eq!(prepared.title, prepared.question);

        let single = row("2").prepare(1).unwrap();
        assert!(!single.is_multiple_answer);
    }

    #[test]
    fn test_blank_choices_are_skipped_in_column_order() {
        let mut r = row("2");
        r.choice2 = Some("  ".to_string());
        r.choice4 = Some("Neptune".to_string());
        let prepared = r.prepare(1).unwrap();
        assert_eq!(prepared.choices, vec!["Jupiter", "Neptune"]);
    }

    #[test]
    fn test_unknown_level_defaults_to_easy() {
        let mut r = row("1");
        r.level = Some("7".to_string());
        assert_eq!(r.prepare(1).unwrap().level, Level::Easy);

        let mut r = row("1");
        r.level = None;
        assert_eq!(r.prepare(1).unwrap().level, Level::Easy);
    }

    #[test]
    fn test_rejects_rows_without_question_or_choices() {
        let mut r = row("1");
        r.question = " ".to_string();
        assert!(matches!(r.prepare(4), Err(ImportError::Parse { row: 4, .. })));

        let r = CsvQuestionRow {
            question: "Lonely?".to_string(),
            answer: "1".to_string(),
            ..Default::default()
        };
        assert!(matches!(r.prepare(2), Err(ImportError::Parse { row: 2, .. })));
    }

    #[test]
    fn test_records_deserialize_from_csv() {
        let data = "question,choice1,choice2,choice3,choice4,choice5,answer,level\n\
                    What is 2+2?,3,4,,,,2,1\n";
        let mut reader = csv::Reader::from_reader(data.as_bytes());
        let rows: Vec<CsvQuestionRow> = reader.deserialize().collect::<Result<_, _>>().unwrap();

        assert_eq!(rows.len(), 1);
        let prepared = rows[0].clone().prepare(1).unwrap();
        assert_eq!(prepared.choices, vec!["3", "4"]);
        assert_eq!(correct_choice_ids(&prepared.answer, &[7, 8]), vec![8]);
    }
}
