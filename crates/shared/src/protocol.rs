use serde::{de::Error as _, Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{
    audit::AuditResult,
    domain::{ChatMode, LookupMode},
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LookupResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technique: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub exact: Vec<MappingRow>,
    #[serde(default)]
    pub semantic: Vec<ScoredMatch>,
}

impl LookupResponse {
    pub fn into_result(self, mode: LookupMode) -> LookupResult {
        let id = match mode {
            LookupMode::Technique => self.technique,
            LookupMode::Nist => self.control,
        };
        LookupResult {
            mode,
            header: LookupHeader {
                id,
                name: self.name,
            },
            exact: self.exact,
            semantic: self.semantic,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attack_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attack_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredMatch {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupHeader {
    pub id: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LookupResult {
    pub mode: LookupMode,
    pub header: LookupHeader,
    pub exact: Vec<MappingRow>,
    pub semantic: Vec<ScoredMatch>,
}

pub const DEFAULT_CHAT_TOP_K: u32 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<ChatMode>,
    pub top_k: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingMatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technique_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingReply {
    pub direction: String,
    #[serde(default)]
    pub query: Value,
    #[serde(default)]
    pub matches: Vec<MappingMatch>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NistCandidate {
    pub control_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub family: Option<String>,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MitreCandidate {
    pub technique_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string_list")]
    pub tactics: Vec<String>,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaReply {
    pub answer: String,
    #[serde(default)]
    pub nist_candidates: Vec<NistCandidate>,
    #[serde(default)]
    pub mitre_candidates: Vec<MitreCandidate>,
}

/// Reply of `POST /api/chat`, discriminated by its `type` field.
///
/// Anything whose `type` is missing or unknown decodes to
/// [`ChatResponse::Unrecognized`] so callers must handle it explicitly.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatResponse {
    Mapping(MappingReply),
    Qa(QaReply),
    AuditResult(AuditResult),
    Unrecognized { kind: Option<String> },
}

#[derive(Deserialize)]
struct AuditEnvelope {
    data: AuditResult,
}

impl ChatResponse {
    pub const MAPPING: &'static str = "mapping";
    pub const QA: &'static str = "qa";
    pub const AUDIT_RESULT: &'static str = "audit_result";

    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let kind = match value.get("type") {
            Some(Value::String(kind)) => Some(kind.clone()),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        };

        match kind.as_deref() {
            Some(Self::MAPPING) => serde_json::from_value(value).map(ChatResponse::Mapping),
            Some(Self::QA) => serde_json::from_value(value).map(ChatResponse::Qa),
            Some(Self::AUDIT_RESULT) => serde_json::from_value::<AuditEnvelope>(value)
                .map(|envelope| ChatResponse::AuditResult(envelope.data)),
            _ => Ok(ChatResponse::Unrecognized { kind }),
        }
    }

    pub fn kind(&self) -> Option<&str> {
        match self {
            ChatResponse::Mapping(_) => Some(Self::MAPPING),
            ChatResponse::Qa(_) => Some(Self::QA),
            ChatResponse::AuditResult(_) => Some(Self::AUDIT_RESULT),
            ChatResponse::Unrecognized { kind } => kind.as_deref(),
        }
    }
}

impl<'de> Deserialize<'de> for ChatResponse {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        ChatResponse::from_value(value).map_err(D::Error::custom)
    }
}

// Tactics arrive as a list, but older catalog rows carry a bare string or null.
fn lenient_string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(item) => Some(item),
                _ => None,
            })
            .collect(),
        Value::String(tactic) if !tactic.trim().is_empty() => vec![tactic],
        _ => Vec::new(),
    })
}
