// src/models/question.rs

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::prelude::FromRow;
use validator::Validate;

/// Difficulty level, stored as upper-case text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Level {
    #[default]
    Easy,
    Medium,
    Hard,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Easy => "EASY",
            Level::Medium => "MEDIUM",
            Level::Hard => "HARD",
        }
    }

    /// Maps the numeric code used by CSV imports. Unknown codes fall back to `Easy`.
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "2" => Level::Medium,
            "3" => Level::Hard,
            _ => Level::Easy,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EASY" => Ok(Level::Easy),
            "MEDIUM" => Ok(Level::Medium),
            "HARD" => Ok(Level::Hard),
            other => Err(format!("unknown level '{}'", other)),
        }
    }
}

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub category_id: i64,
    pub title: String,

    /// The question prompt shown to the user.
    pub question: String,

    /// Optional rich-text explanation, sanitized on write.
    pub paragraph: Option<String>,

    pub is_multiple_answer: bool,

    /// One of `EASY`, `MEDIUM`, `HARD`.
    pub level: String,

    /// Ids of the correct choices.
    pub answer: Vec<i64>,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Question {
    pub fn level(&self) -> Level {
        self.level.parse().unwrap_or_default()
    }
}

/// Represents the 'choices' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Choice {
    pub id: i64,
    pub question_id: i64,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChoiceView {
    pub id: i64,
    pub text: String,
}

/// Everything the question editor shows: the question plus its ordered choices.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionEditorView {
    pub id: i64,
    pub category_id: i64,
    pub title: String,
    pub question: String,
    pub paragraph: Option<String>,
    pub is_multiple_answer: bool,
    pub level: Level,
    pub answer: Vec<i64>,
    pub choice: Vec<ChoiceView>,
}

impl QuestionEditorView {
    pub fn new(question: Question, choices: Vec<Choice>) -> Self {
        let level = question.level();
        Self {
            id: question.id,
            category_id: question.category_id,
            title: question.title,
            question: question.question,
            paragraph: question.paragraph,
            is_multiple_answer: question.is_multiple_answer,
            level,
            answer: question.answer,
            choice: choices
                .into_iter()
                .map(|c| ChoiceView { id: c.id, text: c.text })
                .collect(),
        }
    }
}

/// DTO for creating a new question together with its choices.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateQuestionRequest {
    pub category_id: i64,
    #[validate(length(max = 200))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 5000))]
    pub question: String,
    #[validate(length(max = 20000))]
    pub paragraph: Option<String>,
    #[serde(default)]
    pub level: Level,
    #[validate(length(min = 2, max = 10), custom(function = validate_choices))]
    pub choices: Vec<String>,
    /// 1-based positions of the correct entries in `choices`.
    #[validate(length(min = 1))]
    pub correct: Vec<usize>,
}

/// One choice in the inline editor. Entries without an id are created.
#[derive(Debug, Deserialize)]
pub struct ChoiceEdit {
    pub id: Option<i64>,
    pub text: String,
}

/// DTO for updating a question. Fields are optional.
///
/// When `choice` is present it replaces the whole choice list: listed ids are
/// updated, new entries inserted, and unlisted choices removed.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQuestionRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 5000))]
    pub question: Option<String>,
    #[validate(length(max = 20000))]
    pub paragraph: Option<String>,
    pub level: Option<Level>,
    pub is_multiple_answer: Option<bool>,
    pub answer: Option<Vec<i64>>,
    pub choice: Option<Vec<ChoiceEdit>>,
}

fn validate_choices(choices: &[String]) -> Result<(), validator::ValidationError> {
    for choice in choices {
        if choice.trim().is_empty() {
            return Err(validator::ValidationError::new("choice_cannot_be_empty"));
        }
        if choice.len() > 1000 {
            return Err(validator::ValidationError::new("choice_too_long"));
        }
    }
    Ok(())
}

/// Titles are the first 50 characters of the prompt unless given explicitly.
pub fn title_from(question: &str) -> String {
    question.chars().take(50).collect()
}
