// src/session/model.rs

//! Wire shapes shared by the test endpoints and the session client.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::question::Level;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TestMode {
    #[serde(rename = "NOTIMER")]
    NoTimer,
    #[serde(rename = "TIMER")]
    Timer,
    #[serde(rename = "SIMULATION")]
    Simulation,
}

impl TestMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestMode::NoTimer => "NOTIMER",
            TestMode::Timer => "TIMER",
            TestMode::Simulation => "SIMULATION",
        }
    }

    pub fn is_timed(&self) -> bool {
        !matches!(self, TestMode::NoTimer)
    }
}

impl fmt::Display for TestMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NOTIMER" => Ok(TestMode::NoTimer),
            "TIMER" => Ok(TestMode::Timer),
            "SIMULATION" => Ok(TestMode::Simulation),
            other => Err(format!("unknown test type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionChoice {
    pub id: i64,
    pub text: String,
}

/// A question as the test taker sees it: no correct answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionQuestion {
    pub id: i64,
    pub title: String,
    pub question: String,
    #[serde(rename = "choice")]
    pub choices: Vec<SessionChoice>,
    #[serde(default)]
    pub level: Level,
    #[serde(default)]
    pub is_multiple_answer: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StandardPayload {
    pub id: i64,
    pub question: Vec<SessionQuestion>,
    /// Total seconds; absent for untimed tests.
    pub duration: Option<i64>,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationPayload {
    pub id: i64,
    #[serde(default)]
    pub single_question: Vec<SessionQuestion>,
    #[serde(default)]
    pub multiple_question: Vec<SessionQuestion>,
    pub duration: Option<i64>,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_completed: bool,
}

/// Session fetch payload, discriminated by `testType`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "testType")]
pub enum SessionPayload {
    #[serde(rename = "NOTIMER")]
    NoTimer(StandardPayload),
    #[serde(rename = "TIMER")]
    Timer(StandardPayload),
    #[serde(rename = "SIMULATION")]
    Simulation(SimulationPayload),
}

/// The canonical session every payload shape normalizes into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionData {
    pub id: i64,
    pub mode: TestMode,
    pub duration: Option<i64>,
    pub created_at: Option<DateTime<Utc>>,
    pub is_completed: bool,
    pub questions: Vec<SessionQuestion>,
}

impl SessionPayload {
    pub fn id(&self) -> i64 {
        match self {
            SessionPayload::NoTimer(p) | SessionPayload::Timer(p) => p.id,
            SessionPayload::Simulation(p) => p.id,
        }
    }

    pub fn mode(&self) -> TestMode {
        match self {
            SessionPayload::NoTimer(_) => TestMode::NoTimer,
            SessionPayload::Timer(_) => TestMode::Timer,
            SessionPayload::Simulation(_) => TestMode::Simulation,
        }
    }

    pub fn is_completed(&self) -> bool {
        match self {
            SessionPayload::NoTimer(p) | SessionPayload::Timer(p) => p.is_completed,
            SessionPayload::Simulation(p) => p.is_completed,
        }
    }

    /// Flattens either shape into one ordered question list. Simulation
    /// single-answer questions come first, then the multiple-answer ones.
    pub fn normalize(self) -> SessionData {
        let mode = self.mode();
        match self {
            SessionPayload::NoTimer(p) | SessionPayload::Timer(p) => SessionData {
                id: p.id,
                mode,
                duration: if mode.is_timed() { p.duration } else { None },
                created_at: p.created_at,
                is_completed: p.is_completed,
                questions: p.question,
            },
            SessionPayload::Simulation(p) => {
                let singles = p.single_question.into_iter().map(|mut q| {
                    q.is_multiple_answer = false;
                    q
                });
                let multiples = p.multiple_question.into_iter().map(|mut q| {
                    q.is_multiple_answer = true;
                    q
                });
                SessionData {
                    id: p.id,
                    mode,
                    duration: p.duration,
                    created_at: p.created_at,
                    is_completed: p.is_completed,
                    questions: singles.chain(multiples).collect(),
                }
            }
        }
    }
}

/// Body of the scoring request. `answers` follows the session's question order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub test_id: i64,
    pub test_type: TestMode,
    pub answers: Vec<Vec<i64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub total_questions: usize,
    pub correct_answers: usize,
    /// Percentage, 0 to 100.
    pub score: f64,
    pub correct_answers_ids: Vec<Vec<i64>>,
    pub user_answers: Vec<Vec<i64>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn question_json(id: i64) -> serde_json::Value {
        json!({
            "id": id,
            "title": format!("Q{}", id),
            "question": format!("Question {}", id),
            "choice": [{ "id": id * 10, "text": "A" }, { "id": id * 10 + 1, "text": "B" }],
            "level": "MEDIUM",
            "isMultipleAnswer": false
        })
    }

    #[test]
    fn test_standard_payload_decodes_by_test_type() {
        let raw = json!({
            "testType": "TIMER",
            "id": 5,
            "question": [question_json(1), question_json(2)],
            "duration": 600,
            "createdAt": "2024-05-01T10:00:00Z",
            "isCompleted": false
        });

        let payload: SessionPayload = serde_json::from_value(raw).unwrap();
        assert_eq!(payload.mode(), TestMode::Timer);

        let data = payload.normalize();
        assert_eq!(data.id, 5);
        assert_eq!(data.duration, Some(600));
        assert_eq!(data.questions.len(), 2);
        assert_eq!(data.questions[1].choices[0].id, 20);
        assert_eq!(data.questions[0].level, Level::Medium);
    }

    #[test]
    fn test_untimed_payload_drops_duration() {
        let raw = json!({
            "testType": "NOTIMER",
            "id": 1,
            "question": [question_json(1)],
            "duration": 900,
            "createdAt": null
        });
        let data = serde_json::from_value::<SessionPayload>(raw).unwrap().normalize();
        assert_eq!(data.duration, None);
        assert!(!data.is_completed);
    }

    #[test]
    fn test_simulation_payload_puts_single_answers_first() {
        let raw = json!({
            "testType": "SIMULATION",
            "id": 8,
            "multipleQuestion": [question_json(3)],
            "singleQuestion": [question_json(1), question_json(2)],
            "duration": 7200,
            "createdAt": "2024-05-01T10:00:00Z"
        });

        let data = serde_json::from_value::<SessionPayload>(raw).unwrap().normalize();

        let ids: Vec<i64> = data.questions.iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert!(!data.questions[0].is_multiple_answer);
        assert!(data.questions[2].is_multiple_answer);
        assert_eq!(data.mode, TestMode::Simulation);
    }

    #[test]
    fn test_submission_wire_shape() {
        let submission = Submission {
            test_id: 3,
            test_type: TestMode::NoTimer,
            answers: vec![vec![1], vec![]],
        };
        assert_eq!(
            serde_json::to_value(&submission).unwrap(),
            json!({ "testId": 3, "testType": "NOTIMER", "answers": [[1], []] })
        );
    }
}
