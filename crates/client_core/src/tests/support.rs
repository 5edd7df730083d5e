use std::{
    collections::HashMap,
    future::Future,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use axum::{
    extract::Query,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use shared::audit::AuditPayload;
use tokio::{net::TcpListener, sync::oneshot};
use url::Url;

use crate::{
    error::QueryError,
    transport::{QueryClient, QueryRequest, QueryTransport},
};

type Responder = dyn Fn(&QueryRequest) -> Result<Value, QueryError> + Send + Sync;

/// Answers immediately from a closure and records every request.
pub(crate) struct FnTransport {
    responder: Box<Responder>,
    calls: Mutex<Vec<QueryRequest>>,
}

impl FnTransport {
    pub(crate) fn new(
        responder: impl Fn(&QueryRequest) -> Result<Value, QueryError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn calls(&self) -> Vec<QueryRequest> {
        self.calls.lock().expect("calls lock").clone()
    }
}

#[async_trait]
impl QueryTransport for FnTransport {
    async fn request(&self, request: QueryRequest) -> Result<Value, QueryError> {
        let reply = (self.responder)(&request);
        self.calls.lock().expect("calls lock").push(request);
        reply
    }
}

type Gate = oneshot::Sender<Result<Value, QueryError>>;

/// Parks every request until the test resolves it, in any order.
#[derive(Default)]
pub(crate) struct GatedTransport {
    calls: Mutex<Vec<QueryRequest>>,
    gates: Mutex<Vec<Option<Gate>>>,
}

impl GatedTransport {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn calls(&self) -> Vec<QueryRequest> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub(crate) fn resolve(&self, index: usize, reply: Result<Value, QueryError>) {
        let gate = self.gates.lock().expect("gates lock")[index]
            .take()
            .expect("request already resolved");
        let _ = gate.send(reply);
    }

    pub(crate) async fn wait_for_calls(&self, count: usize) {
        let this = self;
        wait_until(move || async move { this.calls.lock().expect("calls lock").len() >= count })
            .await;
    }
}

#[async_trait]
impl QueryTransport for GatedTransport {
    async fn request(&self, request: QueryRequest) -> Result<Value, QueryError> {
        let (tx, rx) = oneshot::channel();
        {
            self.calls.lock().expect("calls lock").push(request);
            self.gates.lock().expect("gates lock").push(Some(tx));
        }
        rx.await
            .unwrap_or_else(|_| Err(QueryError::network("gate dropped")))
    }
}

/// Polls `condition` every millisecond; panics after two seconds.
pub(crate) async fn wait_until<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..2_000 {
        if condition().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("condition not reached in time");
}

pub(crate) fn brute_force_body() -> Value {
    json!({
        "technique": "T1110",
        "name": "Brute Force",
        "exact": [{
            "control_id": "AC-7",
            "control_name": "Unsuccessful Logon Attempts",
            "mapping_type": "mitigates"
        }],
        "semantic": []
    })
}

pub(crate) fn weak_policy_result() -> Value {
    json!({
        "overall_score": 0.23,
        "risk_level": "high",
        "summary": "Overall risk: high. Top issues: MFA not enforced for admins.",
        "findings": [
            {
                "id": "PW_MINLEN",
                "title": "Password minimum length below 12",
                "severity": "high",
                "score": 0.8,
                "description": "Configured min length = 4.",
                "remediation": "Increase to ≥ 12 (preferably 14+).",
                "standard_refs": ["NIST SP 800-63B §5.1.1.2"]
            },
            {
                "id": "MFA_NONE",
                "title": "No MFA factor enabled",
                "severity": "critical",
                "score": 0.95,
                "description": "Accounts rely on passwords alone.",
                "remediation": "Enable TOTP and/or FIDO2/WebAuthn.",
                "standard_refs": []
            }
        ]
    })
}

async fn technique(Query(params): Query<HashMap<String, String>>) -> Response {
    let q = params.get("q").cloned().unwrap_or_default();
    if q.trim().eq_ignore_ascii_case("T1110") {
        return Json(brute_force_body()).into_response();
    }
    if q == "boom" {
        return (StatusCode::INTERNAL_SERVER_ERROR, "internal error").into_response();
    }
    Json(json!({"technique": q, "name": null, "exact": [], "semantic": []})).into_response()
}

async fn nist(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    let q = params.get("q").cloned().unwrap_or_default();
    Json(json!({
        "control": q,
        "name": "Access Control",
        "exact": [],
        "semantic": [{"id": "T1078", "name": "Valid Accounts", "score": 0.6123}]
    }))
}

async fn audit(Json(payload): Json<AuditPayload>) -> Response {
    if payload.policy.min_length.value().is_nan() {
        return (StatusCode::UNPROCESSABLE_ENTITY, "min_length must be an integer").into_response();
    }
    let factors = &payload.mfa_factors;
    let no_mfa = !(factors.sms
        || factors.totp_app
        || factors.fido2_webauthn
        || factors.push_approval
        || factors.email_otp);
    if payload.policy.min_length.value() < 12.0 && no_mfa {
        return Json(weak_policy_result()).into_response();
    }
    Json(json!({
        "overall_score": 1.0,
        "risk_level": "low",
        "summary": "Overall risk: low. Top issues: No material issues.",
        "findings": []
    }))
    .into_response()
}

async fn chat(Json(body): Json<Value>) -> Response {
    let message = body["message"].as_str().unwrap_or_default();
    match message {
        "T1059" => Json(json!({
            "type": "mapping",
            "direction": "MITRE→NIST",
            "query": {"technique_id": "T1059", "name": "Command and Scripting Interpreter"},
            "matches": [
                {"control_id": "CM-7", "description": "Least Functionality", "score": 0.7312}
            ]
        }))
        .into_response(),
        "echo" => Json(json!({"type": "qa", "answer": body.to_string(),
            "nist_candidates": [], "mitre_candidates": []}))
        .into_response(),
        "weird" => Json(json!({"type": "haiku", "text": "..."})).into_response(),
        "fail" => (StatusCode::BAD_REQUEST, "Send `audit { ...policy json... }` or use the UI form.")
            .into_response(),
        _ => Json(json!({
            "type": "qa",
            "answer": "Closest references in NIST and MITRE:",
            "nist_candidates": [],
            "mitre_candidates": [
                {"technique_id": "T1059", "name": "Command Scripting", "tactics": [], "score": 0.81}
            ]
        }))
        .into_response(),
    }
}

/// Binds a stand-in mapper API on an ephemeral port.
pub(crate) async fn spawn_mapper_server() -> (Url, QueryClient) {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let app = Router::new()
        .route("/api/technique", get(technique))
        .route("/api/nist", get(nist))
        .route("/api/policy/audit", post(audit))
        .route("/api/chat", post(chat));
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    let base_url = Url::parse(&format!("http://{addr}")).expect("url");
    (base_url.clone(), QueryClient::new(base_url))
}
