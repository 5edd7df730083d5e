use std::sync::Arc;

use shared::{
    audit::{AuditEdit, AuditPayload, AuditResult, FormNumber, NumericField, ToggleField},
    domain::Environment,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::{
    error::QueryError,
    generation::GenerationGuard,
    transport::{fetch_json, QueryRequest, QueryTransport},
};

pub const AUDIT_ENDPOINT: &str = "/api/policy/audit";

pub async fn submit_audit(
    transport: &dyn QueryTransport,
    payload: &AuditPayload,
) -> Result<AuditResult, QueryError> {
    let suspicious = payload.suspicious_numbers();
    if !suspicious.is_empty() {
        let fields: Vec<&str> = suspicious.iter().map(|field| field.key()).collect();
        warn!(
            ?fields,
            "audit: submitting non-numeric or negative values; validation is left to the server"
        );
    }

    let body = serde_json::to_value(payload)?;
    fetch_json(transport, QueryRequest::post(AUDIT_ENDPOINT, body)).await
}

#[derive(Debug, Clone, PartialEq)]
pub struct AuditSnapshot {
    pub payload: AuditPayload,
    pub loading: bool,
    pub result: Option<AuditResult>,
    pub error: Option<String>,
}

struct AuditState {
    payload: AuditPayload,
    loading: bool,
    result: Option<AuditResult>,
    error: Option<String>,
}

pub struct AuditFormModel {
    transport: Arc<dyn QueryTransport>,
    guard: GenerationGuard,
    inner: Mutex<AuditState>,
}

impl AuditFormModel {
    pub fn new(transport: Arc<dyn QueryTransport>) -> Self {
        Self::with_payload(transport, AuditPayload::default())
    }

    pub fn with_payload(transport: Arc<dyn QueryTransport>, payload: AuditPayload) -> Self {
        Self {
            transport,
            guard: GenerationGuard::new(),
            inner: Mutex::new(AuditState {
                payload,
                loading: false,
                result: None,
                error: None,
            }),
        }
    }

    pub async fn payload(&self) -> AuditPayload {
        self.inner.lock().await.payload.clone()
    }

    pub async fn snapshot(&self) -> AuditSnapshot {
        let state = self.inner.lock().await;
        AuditSnapshot {
            payload: state.payload.clone(),
            loading: state.loading,
            result: state.result.clone(),
            error: state.error.clone(),
        }
    }

    pub async fn apply(&self, edit: AuditEdit) -> AuditPayload {
        let mut state = self.inner.lock().await;
        state.payload = state.payload.apply(edit);
        debug!(?edit, "audit: field updated");
        state.payload.clone()
    }

    pub async fn set_number(&self, field: NumericField, raw: &str) -> AuditPayload {
        self.apply(AuditEdit::Number(field, FormNumber::coerce(raw)))
            .await
    }

    pub async fn set_toggle(&self, field: ToggleField, enabled: bool) -> AuditPayload {
        self.apply(AuditEdit::Toggle(field, enabled)).await
    }

    pub async fn set_environment(&self, environment: Environment) -> AuditPayload {
        self.apply(AuditEdit::Environment(environment)).await
    }

    /// Submits the current payload. The returned outcome belongs to this
    /// call; visible state only changes if no newer submit was issued.
    pub async fn submit(&self) -> Result<AuditResult, QueryError> {
        let (token, payload) = {
            let mut state = self.inner.lock().await;
            state.loading = true;
            state.error = None;
            state.result = None;
            (self.guard.issue(), state.payload.clone())
        };

        let outcome = submit_audit(self.transport.as_ref(), &payload).await;

        let mut state = self.inner.lock().await;
        if !self.guard.is_live(token) {
            debug!(generation = token.value(), "audit: discarding stale response");
            return outcome;
        }
        state.loading = false;
        match &outcome {
            Ok(result) => {
                info!(
                    overall_score = result.overall_score,
                    risk_level = %result.risk_level,
                    findings = result.findings.len(),
                    "audit: committed result"
                );
                state.result = Some(result.clone());
            }
            Err(err) => {
                warn!(error = ?err, "audit: submission failed");
                state.error = Some(err.to_string());
            }
        }
        outcome
    }
}

#[cfg(test)]
#[path = "tests/audit_tests.rs"]
mod tests;
