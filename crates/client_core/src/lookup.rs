//! Debounced technique/control lookup.
//!
//! Every keystroke goes through [`LookupController::input`]. The debounced
//! value either clears the view (too short) or issues a request tagged with a
//! fresh generation token; only the response holding the live token is
//! committed. A mode switch clears the view and kills every in-flight request
//! before anything else happens.

use std::{sync::Arc, time::Duration};

use shared::{
    domain::LookupMode,
    protocol::{LookupResponse, LookupResult},
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::{
    debounce::Debouncer,
    error::QueryError,
    generation::{GenerationGuard, GenerationToken},
    transport::{fetch_json, QueryRequest, QueryTransport},
};

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);
pub const MIN_QUERY_CHARS: usize = 2;

pub fn qualifying_query(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    (trimmed.chars().count() >= MIN_QUERY_CHARS).then_some(trimmed)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupPhase {
    Idle,
    Debouncing,
    Fetching,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LookupSnapshot {
    pub mode: LookupMode,
    pub raw_input: String,
    pub phase: LookupPhase,
    pub result: Option<LookupResult>,
    pub error: Option<String>,
}

impl LookupSnapshot {
    pub fn loading(&self) -> bool {
        self.phase == LookupPhase::Fetching
    }
}

#[derive(Debug, Clone)]
pub enum LookupEvent {
    StateChanged(LookupSnapshot),
    FocusRequested,
}

struct LookupState {
    mode: LookupMode,
    raw_input: String,
    settled: Option<String>,
    // Bumped by every keystroke and explicit search; debounced values
    // carrying an older number are dropped.
    input_seq: u64,
    debouncing: bool,
    phase: LookupPhase,
    result: Option<LookupResult>,
    error: Option<String>,
}

impl LookupState {
    fn snapshot(&self) -> LookupSnapshot {
        LookupSnapshot {
            mode: self.mode,
            raw_input: self.raw_input.clone(),
            phase: self.phase,
            result: self.result.clone(),
            error: self.error.clone(),
        }
    }
}

pub struct LookupController {
    transport: Arc<dyn QueryTransport>,
    guard: GenerationGuard,
    debouncer: Mutex<Debouncer<(u64, String)>>,
    inner: Mutex<LookupState>,
    events: broadcast::Sender<LookupEvent>,
}

impl LookupController {
    /// Must be called inside a tokio runtime: a driver task forwards settled
    /// input from the debouncer to the controller.
    pub fn new(transport: Arc<dyn QueryTransport>, debounce: Duration) -> Arc<Self> {
        Self::with_mode(transport, debounce, LookupMode::default())
    }

    pub fn with_mode(
        transport: Arc<dyn QueryTransport>,
        debounce: Duration,
        mode: LookupMode,
    ) -> Arc<Self> {
        let (debouncer, mut settled_rx) = Debouncer::new(debounce);
        let (events, _) = broadcast::channel(256);
        let controller = Arc::new(Self {
            transport,
            guard: GenerationGuard::new(),
            debouncer: Mutex::new(debouncer),
            inner: Mutex::new(LookupState {
                mode,
                raw_input: String::new(),
                settled: None,
                input_seq: 0,
                debouncing: false,
                phase: LookupPhase::Idle,
                result: None,
                error: None,
            }),
            events,
        });

        let weak = Arc::downgrade(&controller);
        tokio::spawn(async move {
            while let Some((seq, value)) = settled_rx.recv().await {
                let Some(controller) = weak.upgrade() else {
                    break;
                };
                controller.settle_debounced(seq, value).await;
            }
        });

        controller
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<LookupEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> LookupSnapshot {
        self.inner.lock().await.snapshot()
    }

    pub async fn input(&self, raw: impl Into<String>) {
        let raw = raw.into();
        let mut debouncer = self.debouncer.lock().await;
        let seq = {
            let mut state = self.inner.lock().await;
            state.input_seq += 1;
            state.debouncing = true;
            state.raw_input = raw.clone();
            state.phase = LookupPhase::Debouncing;
            self.publish(&state);
            state.input_seq
        };
        debouncer.push((seq, raw));
    }

    pub async fn search(self: &Arc<Self>) {
        let mut debouncer = self.debouncer.lock().await;
        debouncer.cancel();
        let mut state = self.inner.lock().await;
        state.input_seq += 1;
        state.raw_input = state.raw_input.trim().to_string();
        let trimmed = state.raw_input.clone();
        self.settle(&mut state, trimmed);
    }

    /// Switches lookup direction. Result and error are cleared before this
    /// returns; responses for the previous mode are discarded. The last
    /// settled query, if it qualifies, is re-issued for the new mode.
    pub async fn set_mode(self: &Arc<Self>, mode: LookupMode) {
        let mut state = self.inner.lock().await;
        self.guard.invalidate();
        state.mode = mode;
        state.result = None;
        state.error = None;
        state.phase = LookupPhase::Idle;
        self.publish(&state);
        let _ = self.events.send(LookupEvent::FocusRequested);
        info!(%mode, "lookup: mode switched");

        let settled = state
            .settled
            .clone()
            .filter(|value| qualifying_query(value).is_some());
        if let Some(query) = settled {
            self.begin_fetch(&mut state, query);
        }
    }

    pub async fn shutdown(&self) {
        let mut debouncer = self.debouncer.lock().await;
        debouncer.cancel();
        let mut state = self.inner.lock().await;
        state.input_seq += 1;
        state.debouncing = false;
        self.guard.invalidate();
        state.phase = match (&state.result, &state.error) {
            (_, Some(_)) => LookupPhase::Error,
            (Some(_), None) => LookupPhase::Success,
            (None, None) => LookupPhase::Idle,
        };
        self.publish(&state);
    }

    async fn settle_debounced(self: &Arc<Self>, seq: u64, value: String) {
        let mut state = self.inner.lock().await;
        if seq != state.input_seq {
            debug!(seq, current = state.input_seq, "lookup: dropping superseded input");
            return;
        }
        self.settle(&mut state, value);
    }

    fn settle(self: &Arc<Self>, state: &mut LookupState, value: String) {
        state.debouncing = false;
        state.settled = Some(value.clone());

        if qualifying_query(&value).is_none() {
            self.guard.invalidate();
            state.phase = LookupPhase::Idle;
            state.result = None;
            state.error = None;
            debug!(query = %value, "lookup: input too short, cleared");
            self.publish(state);
            return;
        }

        self.begin_fetch(state, value);
    }

    fn begin_fetch(self: &Arc<Self>, state: &mut LookupState, query: String) {
        let token = self.guard.issue();
        let mode = state.mode;
        state.phase = LookupPhase::Fetching;
        state.error = None;
        self.publish(state);
        debug!(%mode, query = %query, generation = token.value(), "lookup: fetching");

        let controller = Arc::clone(self);
        tokio::spawn(async move {
            let request = QueryRequest::get(mode.endpoint()).with_query("q", query.as_str());
            let outcome =
                fetch_json::<LookupResponse>(controller.transport.as_ref(), request).await;
            controller.commit(token, mode, &query, outcome).await;
        });
    }

    async fn commit(
        &self,
        token: GenerationToken,
        mode: LookupMode,
        query: &str,
        outcome: Result<LookupResponse, QueryError>,
    ) {
        let mut state = self.inner.lock().await;
        if !self.guard.is_live(token) {
            debug!(
                %mode,
                query,
                generation = token.value(),
                "lookup: discarding stale response"
            );
            return;
        }

        // A newer keystroke still waiting on the debounce keeps the phase.
        let pending_input = state.debouncing;
        match outcome {
            Ok(body) => {
                let result = body.into_result(mode);
                info!(
                    %mode,
                    query,
                    exact = result.exact.len(),
                    semantic = result.semantic.len(),
                    "lookup: committed result"
                );
                state.result = Some(result);
                state.error = None;
                state.phase = LookupPhase::Success;
            }
            Err(err) => {
                warn!(%mode, query, error = ?err, "lookup: request failed");
                state.result = None;
                state.error = Some(err.to_string());
                state.phase = LookupPhase::Error;
            }
        }
        if pending_input {
            state.phase = LookupPhase::Debouncing;
        }
        self.publish(&state);
    }

    fn publish(&self, state: &LookupState) {
        let _ = self
            .events
            .send(LookupEvent::StateChanged(state.snapshot()));
    }
}

#[cfg(test)]
#[path = "tests/lookup_tests.rs"]
mod tests;
