// src/session/client.rs

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;

use super::{
    SessionError,
    model::{SessionPayload, Submission, TestMode, TestResult},
};
use crate::models::envelope::Envelope;

/// The two server calls a test session makes. Each is attempted once.
#[async_trait]
pub trait SessionApi: Send + Sync {
    async fn fetch_session(
        &self,
        session_id: i64,
        mode: TestMode,
    ) -> Result<SessionPayload, SessionError>;

    async fn submit(&self, submission: &Submission) -> Result<TestResult, SessionError>;
}

#[async_trait]
impl<T: SessionApi + ?Sized> SessionApi for Arc<T> {
    async fn fetch_session(
        &self,
        session_id: i64,
        mode: TestMode,
    ) -> Result<SessionPayload, SessionError> {
        (**self).fetch_session(session_id, mode).await
    }

    async fn submit(&self, submission: &Submission) -> Result<TestResult, SessionError> {
        (**self).submit(submission).await
    }
}

/// `SessionApi` over the service's HTTP endpoints.
#[derive(Debug, Clone)]
pub struct HttpSessionApi {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpSessionApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        }
    }

    /// Sends `Authorization: Bearer <token>` on every call.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    fn test_url(&self, session_id: i64, mode: TestMode) -> String {
        format!("{}/api/test/{}/{}", self.base_url, session_id, mode)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

async fn unwrap_envelope<T: DeserializeOwned>(
    session_id: i64,
    response: reqwest::Response,
) -> Result<T, SessionError> {
    let status = response.status();
    let envelope: Envelope<T> = response
        .json()
        .await
        .map_err(|e| SessionError::Network(format!("unreadable response ({}): {}", status, e)))?;

    if envelope.err {
        if status == StatusCode::NOT_FOUND {
            return Err(SessionError::NotFound(session_id));
        }
        return Err(SessionError::Server(envelope.msg));
    }

    envelope
        .data
        .ok_or_else(|| SessionError::Server(format!("response without data: {}", envelope.msg)))
}

#[async_trait]
impl SessionApi for HttpSessionApi {
    async fn fetch_session(
        &self,
        session_id: i64,
        mode: TestMode,
    ) -> Result<SessionPayload, SessionError> {
        let response = self
            .authorized(self.client.get(self.test_url(session_id, mode)))
            .send()
            .await
            .map_err(|e| SessionError::Network(e.to_string()))?;

        unwrap_envelope(session_id, response).await
    }

    async fn submit(&self, submission: &Submission) -> Result<TestResult, SessionError> {
        let url = self.test_url(submission.test_id, submission.test_type);
        let response = self
            .authorized(self.client.post(url).json(submission))
            .send()
            .await
            .map_err(|e| SessionError::Network(e.to_string()))?;

        unwrap_envelope(submission.test_id, response).await
    }
}
