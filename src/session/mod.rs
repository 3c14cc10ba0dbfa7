// src/session/mod.rs

//! Client-side test session: navigation, answers, countdown, resume and
//! submission for one attempt at a test.
//!
//! A [`TestSession`] owns its progress and talks to the outside world through
//! two seams: [`SessionApi`] for the server and [`SessionStore`] for local
//! persistence. Every mutation is persisted before the method returns, so a
//! reload resumes where the user left off.

pub mod client;
pub mod keyboard;
pub mod model;
pub mod store;
pub mod timer;

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use thiserror::Error;

pub use client::{HttpSessionApi, SessionApi};
pub use keyboard::Key;
pub use model::{SessionData, SessionPayload, SessionQuestion, Submission, TestMode, TestResult};
pub use store::{FileSessionStore, MemorySessionStore, PersistedSession, SessionStore, StoreError};
pub use timer::Countdown;

/// In simulation mode the first this-many questions take exactly one answer.
pub const SIMULATION_SINGLE_ANSWER_LIMIT: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Loading,
    InProgress,
    ConfirmPending,
    Submitting,
    Completed,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("test session {0} not found")]
    NotFound(i64),
    #[error("test session {0} has no questions")]
    EmptySession(i64),
    #[error("not allowed while the session is {0:?}")]
    InvalidPhase(Phase),
    #[error("answer question {} before moving on", .index + 1)]
    AnswerRequired { index: usize },
    #[error("question {} is already answered and cannot be skipped", .index + 1)]
    SkipNotAllowed { index: usize },
    #[error("Please answer all {total} questions. Unanswered: {missing}")]
    Incomplete { missing: usize, total: usize },
    #[error("question {0} is not part of this test")]
    UnknownQuestion(i64),
    #[error("choice {choice} does not belong to question {question}")]
    UnknownChoice { question: i64, choice: i64 },
    #[error("question index {index} is out of range (0..{len})")]
    OutOfRange { index: usize, len: usize },
    #[error("network request failed: {0}")]
    Network(String),
    #[error("server rejected the request: {0}")]
    Server(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Navigation and answer-tracking sets kept alongside the answer map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressMarkers {
    pub current: usize,
    pub skipped: BTreeSet<usize>,
    pub answered: BTreeSet<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InitOutcome {
    Ready,
    /// The server already scored this test; show its results instead.
    AlreadyCompleted,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Waiting for [`TestSession::confirm`] or [`TestSession::cancel_submit`].
    ConfirmationRequired,
    Completed(TestResult),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Navigation {
    Moved(usize),
    Submit(SubmitOutcome),
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Untimed, finished, or not running.
    Idle,
    Running(i64),
    Expired(SubmitOutcome),
}

#[derive(Debug, Clone, PartialEq)]
pub enum KeyOutcome {
    Skipped(bool),
    Selected,
    Navigated(Navigation),
    Retreated(usize),
    Highlighted(usize),
    Ignored,
}

pub struct TestSession<A, S> {
    session_id: i64,
    mode_hint: TestMode,
    api: A,
    store: S,
    phase: Phase,
    payload: Option<SessionPayload>,
    data: Option<SessionData>,
    answers: BTreeMap<i64, Vec<i64>>,
    markers: ProgressMarkers,
    remaining: Option<i64>,
    countdown_done: bool,
    highlighted: Option<usize>,
    result: Option<TestResult>,
}

impl<A: SessionApi, S: SessionStore> TestSession<A, S> {
    /// `mode_hint` selects the fetch endpoint when the session has to come
    /// from the network.
    pub fn new(session_id: i64, mode_hint: TestMode, api: A, store: S) -> Self {
        Self {
            session_id,
            mode_hint,
            api,
            store,
            phase: Phase::Loading,
            payload: None,
            data: None,
            answers: BTreeMap::new(),
            markers: ProgressMarkers::default(),
            remaining: None,
            countdown_done: false,
            highlighted: None,
            result: None,
        }
    }

    /// Resolves the session from the assignment context, then local
    /// persistence, then the network.
    ///
    /// Progress is restored from the store unless the session had to be
    /// fetched, in which case the fetched session starts from scratch.
    pub async fn initialize(
        &mut self,
        context: Option<SessionPayload>,
        now: DateTime<Utc>,
    ) -> Result<InitOutcome, SessionError> {
        self.require_phase(Phase::Loading)?;

        let persisted = match self.store.load(self.session_id) {
            Ok(state) => state,
            Err(e) => {
                tracing::warn!(session_id = self.session_id, "Ignoring local progress: {}", e);
                None
            }
        };

        let context = context.filter(|payload| {
            let matches = payload.id() == self.session_id;
            if !matches {
                tracing::warn!(
                    session_id = self.session_id,
                    context_id = payload.id(),
                    "Assignment context belongs to another session"
                );
            }
            matches
        });

        let (payload, fetched) = match (context, persisted.as_ref().and_then(|p| p.payload.clone())) {
            (Some(payload), _) => (payload, false),
            (None, Some(payload)) => (payload, false),
            (None, None) => {
                let payload = self.api.fetch_session(self.session_id, self.mode_hint).await?;
                (payload, true)
            }
        };

        if payload.is_completed() {
            tracing::info!(session_id = self.session_id, "Session already completed");
            self.phase = Phase::Completed;
            self.clear_store();
            return Ok(InitOutcome::AlreadyCompleted);
        }

        let data = payload.clone().normalize();
        if data.questions.is_empty() {
            return Err(SessionError::EmptySession(self.session_id));
        }

        let restored = if fetched { None } else { persisted };
        self.restore_progress(&data, restored.as_ref());
        self.remaining = resume_remaining(&data, restored.as_ref(), now);

        tracing::debug!(
            session_id = self.session_id,
            mode = %data.mode,
            questions = data.questions.len(),
            remaining = ?self.remaining,
            "Session ready"
        );

        self.payload = Some(payload);
        self.data = Some(data);
        self.phase = Phase::InProgress;
        self.persist();
        Ok(InitOutcome::Ready)
    }

    fn restore_progress(&mut self, data: &SessionData, persisted: Option<&PersistedSession>) {
        self.answers.clear();
        self.markers = ProgressMarkers::default();
        let Some(state) = persisted else {
            return;
        };

        for (index, question) in data.questions.iter().enumerate() {
            let Some(selected) = state.answers.get(&question.id) else {
                continue;
            };
            let valid: Vec<i64> = selected
                .iter()
                .copied()
                .filter(|id| question.choices.iter().any(|c| c.id == *id))
                .collect();
            if !valid.is_empty() {
                self.answers.insert(question.id, valid);
                self.markers.answered.insert(index);
            }
        }

        let len = data.questions.len();
        self.markers.current = state.current_index.min(len - 1);
        self.markers.skipped = state
            .skipped
            .iter()
            .copied()
            .filter(|i| *i < len && !self.markers.answered.contains(i))
            .collect();
    }

    /// Records a choice for a question.
    ///
    /// Multiple-answer questions toggle the choice. Single-answer questions,
    /// and the leading simulation questions, replace the selection.
    pub fn select_answer(&mut self, question_id: i64, choice_id: i64) -> Result<(), SessionError> {
        self.require_phase(Phase::InProgress)?;
        let (index, single) = {
            let data = self.loaded()?;
            let (index, question) = data
                .questions
                .iter()
                .enumerate()
                .find(|(_, q)| q.id == question_id)
                .ok_or(SessionError::UnknownQuestion(question_id))?;

            if !question.choices.iter().any(|c| c.id == choice_id) {
                return Err(SessionError::UnknownChoice {
                    question: question_id,
                    choice: choice_id,
                });
            }

            let single = !question.is_multiple_answer
                || (data.mode == TestMode::Simulation && index < SIMULATION_SINGLE_ANSWER_LIMIT);
            (index, single)
        };

        let selected = self.answers.entry(question_id).or_default();
        if single {
            *selected = vec![choice_id];
        } else if let Some(pos) = selected.iter().position(|id| *id == choice_id) {
            selected.remove(pos);
        } else {
            selected.push(choice_id);
        }

        if selected.is_empty() {
            self.answers.remove(&question_id);
            self.markers.answered.remove(&index);
        } else {
            self.markers.answered.insert(index);
            self.markers.skipped.remove(&index);
        }

        self.persist();
        Ok(())
    }

    /// Moves to the next question, or asks to submit from the last one.
    ///
    /// Outside simulation mode the current question must be answered first.
    pub async fn advance(&mut self) -> Result<Navigation, SessionError> {
        self.require_phase(Phase::InProgress)?;
        let data = self.loaded()?;
        let index = self.markers.current;
        let len = data.questions.len();

        if data.mode != TestMode::Simulation && !self.is_answered(index) {
            return Err(SessionError::AnswerRequired { index });
        }

        if index + 1 >= len {
            let outcome = self.submit(false).await?;
            return Ok(Navigation::Submit(outcome));
        }

        self.move_to(index + 1);
        Ok(Navigation::Moved(self.markers.current))
    }

    pub fn retreat(&mut self) -> Result<usize, SessionError> {
        self.require_phase(Phase::InProgress)?;
        if self.markers.current > 0 {
            self.move_to(self.markers.current - 1);
        }
        Ok(self.markers.current)
    }

    /// Jumps straight to a question, as the question list does.
    pub fn jump_to(&mut self, index: usize) -> Result<(), SessionError> {
        self.require_phase(Phase::InProgress)?;
        let len = self.loaded()?.questions.len();
        if index >= len {
            return Err(SessionError::OutOfRange { index, len });
        }
        self.move_to(index);
        Ok(())
    }

    /// Marks the current unanswered question as skipped and moves on.
    /// Returns `false` at the last question, where skipping does nothing.
    pub fn skip(&mut self) -> Result<bool, SessionError> {
        self.require_phase(Phase::InProgress)?;
        let len = self.loaded()?.questions.len();
        let index = self.markers.current;

        if self.is_answered(index) {
            return Err(SessionError::SkipNotAllowed { index });
        }
        if index + 1 >= len {
            return Ok(false);
        }

        self.markers.skipped.insert(index);
        self.move_to(index + 1);
        Ok(true)
    }

    /// Submits the test.
    ///
    /// Without `forced`, simulation tests must be fully answered and every
    /// mode stops in [`Phase::ConfirmPending`]. A forced submission sends the
    /// answers; on failure the session returns to [`Phase::InProgress`] with
    /// its local progress intact.
    pub async fn submit(&mut self, forced: bool) -> Result<SubmitOutcome, SessionError> {
        if !matches!(self.phase, Phase::InProgress | Phase::ConfirmPending) {
            return Err(SessionError::InvalidPhase(self.phase));
        }
        let data = self.loaded()?;

        if !forced {
            if data.mode == TestMode::Simulation {
                let missing = self.unanswered_count();
                if missing > 0 {
                    return Err(SessionError::Incomplete {
                        missing,
                        total: data.questions.len(),
                    });
                }
            }
            self.phase = Phase::ConfirmPending;
            return Ok(SubmitOutcome::ConfirmationRequired);
        }

        self.phase = Phase::Submitting;
        let submission = self.build_submission()?;

        match self.api.submit(&submission).await {
            Ok(result) => {
                tracing::info!(
                    session_id = self.session_id,
                    correct = result.correct_answers,
                    total = result.total_questions,
                    "Test submitted"
                );
                self.phase = Phase::Completed;
                self.countdown_done = true;
                self.clear_store();
                self.result = Some(result.clone());
                Ok(SubmitOutcome::Completed(result))
            }
            Err(e) => {
                tracing::error!(session_id = self.session_id, "Failed to submit test: {}", e);
                self.phase = Phase::InProgress;
                Err(e)
            }
        }
    }

    pub async fn confirm(&mut self) -> Result<SubmitOutcome, SessionError> {
        self.require_phase(Phase::ConfirmPending)?;
        self.submit(true).await
    }

    pub fn cancel_submit(&mut self) -> Result<(), SessionError> {
        self.require_phase(Phase::ConfirmPending)?;
        self.phase = Phase::InProgress;
        Ok(())
    }

    /// One elapsed second. Reaching zero submits exactly once.
    pub async fn tick(&mut self) -> Result<TickOutcome, SessionError> {
        let timed = self.data.as_ref().is_some_and(|d| d.mode.is_timed());
        if !timed
            || self.countdown_done
            || !matches!(self.phase, Phase::InProgress | Phase::ConfirmPending)
        {
            return Ok(TickOutcome::Idle);
        }

        let next = (self.remaining.unwrap_or(0) - 1).max(0);
        self.remaining = Some(next);

        if next > 0 {
            self.persist();
            return Ok(TickOutcome::Running(next));
        }

        self.countdown_done = true;
        self.persist();
        tracing::info!(session_id = self.session_id, "Time is up, submitting");
        let outcome = self.submit(true).await?;
        Ok(TickOutcome::Expired(outcome))
    }

    /// Keyboard shortcuts, mirroring the button paths.
    pub async fn handle_key(&mut self, key: Key) -> Result<KeyOutcome, SessionError> {
        if self.phase != Phase::InProgress {
            return Ok(KeyOutcome::Ignored);
        }
        let choice_count = self
            .current_question()
            .map(|q| q.choices.len())
            .unwrap_or(0);

        match key {
            Key::Space => Ok(KeyOutcome::Skipped(self.skip()?)),
            Key::Enter => {
                let target = self.current_question().and_then(|q| {
                    self.highlighted
                        .and_then(|i| q.choices.get(i))
                        .map(|c| (q.id, c.id))
                });
                match target {
                    Some((question_id, choice_id)) => {
                        self.select_answer(question_id, choice_id)?;
                        Ok(KeyOutcome::Selected)
                    }
                    None => Ok(KeyOutcome::Ignored),
                }
            }
            Key::ArrowLeft => Ok(KeyOutcome::Retreated(self.retreat()?)),
            Key::ArrowRight => Ok(KeyOutcome::Navigated(self.advance().await?)),
            Key::ArrowUp | Key::ArrowDown => {
                match keyboard::cycle_highlight(self.highlighted, choice_count, key == Key::ArrowUp) {
                    Some(i) => {
                        self.highlighted = Some(i);
                        Ok(KeyOutcome::Highlighted(i))
                    }
                    None => Ok(KeyOutcome::Ignored),
                }
            }
        }
    }

    /// One entry per question in session order; unanswered questions send `[]`.
    pub fn build_submission(&self) -> Result<Submission, SessionError> {
        let data = self.loaded()?;
        Ok(Submission {
            test_id: data.id,
            test_type: data.mode,
            answers: data
                .questions
                .iter()
                .map(|q| self.answers.get(&q.id).cloned().unwrap_or_default())
                .collect(),
        })
    }

    pub fn session_id(&self) -> i64 {
        self.session_id
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn mode(&self) -> Option<TestMode> {
        self.data.as_ref().map(|d| d.mode)
    }

    pub fn questions(&self) -> &[SessionQuestion] {
        self.data.as_ref().map(|d| d.questions.as_slice()).unwrap_or(&[])
    }

    pub fn current_question(&self) -> Option<&SessionQuestion> {
        self.questions().get(self.markers.current)
    }

    pub fn markers(&self) -> &ProgressMarkers {
        &self.markers
    }

    pub fn selected(&self, question_id: i64) -> &[i64] {
        self.answers.get(&question_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn answers(&self) -> &BTreeMap<i64, Vec<i64>> {
        &self.answers
    }

    pub fn remaining_time(&self) -> Option<i64> {
        self.remaining
    }

    pub fn highlighted(&self) -> Option<usize> {
        self.highlighted
    }

    pub fn result(&self) -> Option<&TestResult> {
        self.result.as_ref()
    }

    pub fn is_answered(&self, index: usize) -> bool {
        self.questions()
            .get(index)
            .is_some_and(|q| !self.selected(q.id).is_empty())
    }

    pub fn unanswered_count(&self) -> usize {
        self.questions()
            .iter()
            .filter(|q| self.selected(q.id).is_empty())
            .count()
    }

    fn move_to(&mut self, index: usize) {
        if self.markers.current != index {
            self.highlighted = None;
        }
        self.markers.current = index;
        self.persist();
    }

    fn loaded(&self) -> Result<&SessionData, SessionError> {
        self.data.as_ref().ok_or(SessionError::InvalidPhase(self.phase))
    }

    fn require_phase(&self, expected: Phase) -> Result<(), SessionError> {
        if self.phase != expected {
            return Err(SessionError::InvalidPhase(self.phase));
        }
        Ok(())
    }

    /// Writes the current progress to the store.
    pub fn save_progress(&self) -> Result<(), SessionError> {
        let state = PersistedSession {
            current_index: self.markers.current,
            answers: self.answers.clone(),
            skipped: self.markers.skipped.clone(),
            answered: self.markers.answered.clone(),
            remaining_time: self.remaining,
            payload: self.payload.clone(),
        };
        self.store.save(self.session_id, &state)?;
        Ok(())
    }

    /// Store failures are logged and do not undo the in-memory change.
    fn persist(&self) {
        if let Err(e) = self.save_progress() {
            tracing::warn!(session_id = self.session_id, "Failed to persist progress: {}", e);
        }
    }

    fn clear_store(&self) {
        if let Err(e) = self.store.clear(self.session_id) {
            tracing::warn!(session_id = self.session_id, "Failed to clear progress: {}", e);
        }
    }
}

/// Remaining seconds for a (re)loaded session.
///
/// Derived from the creation time whenever it is known; the stored countdown
/// is only a fallback.
pub fn resume_remaining(
    data: &SessionData,
    persisted: Option<&PersistedSession>,
    now: DateTime<Utc>,
) -> Option<i64> {
    if !data.mode.is_timed() {
        return None;
    }
    let duration = data.duration.unwrap_or(0);
    match data.created_at {
        Some(created_at) => {
            let elapsed = (now - created_at).num_seconds();
            Some((duration - elapsed).clamp(0, duration.max(0)))
        }
        None => Some(
            persisted
                .and_then(|p| p.remaining_time)
                .unwrap_or(duration)
                .max(0),
        ),
    }
}
