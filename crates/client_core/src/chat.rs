use std::sync::Arc;

use shared::{
    domain::ChatMode,
    protocol::{ChatRequest, ChatResponse, DEFAULT_CHAT_TOP_K},
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    error::QueryError,
    generation::GenerationGuard,
    render::{dispatch, ChatView},
    transport::{fetch_json, QueryRequest, QueryTransport},
};

pub const CHAT_ENDPOINT: &str = "/api/chat";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputStyle {
    SingleLine,
    MultiLine,
}

pub fn input_style(mode: Option<ChatMode>) -> InputStyle {
    match mode {
        Some(ChatMode::Audit) => InputStyle::MultiLine,
        Some(ChatMode::Map) | None => InputStyle::SingleLine,
    }
}

pub fn placeholder(mode: Option<ChatMode>) -> &'static str {
    match mode {
        Some(ChatMode::Audit) => {
            r#"audit {"policy": {"min_length": 10}, "mfa_factors": {"sms": true, "totp_app": false}, "mfa_enforcement": {"required_for_admins": false}}"#
        }
        Some(ChatMode::Map) | None => r#"e.g., "T1059", "AC-2", or a free-text question"#,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatSnapshot {
    pub mode: Option<ChatMode>,
    pub input: String,
    pub loading: bool,
    pub response: Option<ChatResponse>,
    pub error: Option<String>,
}

impl ChatSnapshot {
    pub fn input_style(&self) -> InputStyle {
        input_style(self.mode)
    }

    pub fn view(&self) -> Option<ChatView> {
        self.response.as_ref().map(dispatch)
    }
}

#[derive(Default)]
struct ChatState {
    mode: Option<ChatMode>,
    input: String,
    loading: bool,
    response: Option<ChatResponse>,
    error: Option<String>,
}

pub struct ChatSession {
    transport: Arc<dyn QueryTransport>,
    guard: GenerationGuard,
    top_k: u32,
    inner: Mutex<ChatState>,
}

impl ChatSession {
    pub fn new(transport: Arc<dyn QueryTransport>) -> Self {
        Self::with_top_k(transport, DEFAULT_CHAT_TOP_K)
    }

    pub fn with_top_k(transport: Arc<dyn QueryTransport>, top_k: u32) -> Self {
        Self {
            transport,
            guard: GenerationGuard::new(),
            top_k,
            inner: Mutex::new(ChatState::default()),
        }
    }

    pub async fn snapshot(&self) -> ChatSnapshot {
        let state = self.inner.lock().await;
        ChatSnapshot {
            mode: state.mode,
            input: state.input.clone(),
            loading: state.loading,
            response: state.response.clone(),
            error: state.error.clone(),
        }
    }

    pub async fn set_mode(&self, mode: Option<ChatMode>) {
        self.inner.lock().await.mode = mode;
    }

    pub async fn set_input(&self, input: impl Into<String>) {
        self.inner.lock().await.input = input.into();
    }

    pub async fn clear(&self) {
        let mut state = self.inner.lock().await;
        self.guard.invalidate();
        state.input.clear();
        state.response = None;
        state.error = None;
        state.loading = false;
    }

    pub async fn send_input(&self) -> Result<Option<ChatResponse>, QueryError> {
        let (input, mode) = {
            let state = self.inner.lock().await;
            (state.input.clone(), state.mode)
        };
        self.send(&input, mode).await
    }

    /// Sends one chat message. Returns `Ok(None)` without any request when
    /// the message is blank. An unrecognized response shape is returned to
    /// the caller but committed to the session as an error.
    pub async fn send(
        &self,
        message: &str,
        mode: Option<ChatMode>,
    ) -> Result<Option<ChatResponse>, QueryError> {
        let message = message.trim();
        if message.is_empty() {
            debug!("chat: ignoring blank message");
            return Ok(None);
        }

        let token = {
            let mut state = self.inner.lock().await;
            state.loading = true;
            state.error = None;
            state.response = None;
            self.guard.issue()
        };

        let request = ChatRequest {
            message: message.to_string(),
            mode,
            top_k: self.top_k,
        };
        debug!(mode = ?mode, generation = token.value(), "chat: sending");
        let outcome = match serde_json::to_value(&request) {
            Ok(body) => {
                fetch_json::<ChatResponse>(
                    self.transport.as_ref(),
                    QueryRequest::post(CHAT_ENDPOINT, body),
                )
                .await
            }
            Err(err) => Err(err.into()),
        };

        let mut state = self.inner.lock().await;
        if !self.guard.is_live(token) {
            debug!(generation = token.value(), "chat: discarding stale response");
            return outcome.map(Some);
        }
        state.loading = false;

        match &outcome {
            Ok(response) => match dispatch(response) {
                ChatView::Unrecognized(message) => {
                    warn!(kind = ?response.kind(), "chat: unrecognized response shape");
                    state.error = Some(message);
                }
                _ => {
                    info!(kind = ?response.kind(), "chat: committed response");
                    state.response = Some(response.clone());
                }
            },
            Err(err) => {
                warn!(error = ?err, "chat: request failed");
                state.error = Some(err.to_string());
            }
        }
        outcome.map(Some)
    }
}

#[cfg(test)]
#[path = "tests/chat_tests.rs"]
mod tests;
