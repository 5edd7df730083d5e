//! Presentation view models for lookup, audit and chat results.
//!
//! These are plain data; the `Display` impls give a terminal rendering.

use std::fmt;

use shared::{
    audit::AuditResult,
    domain::{LookupMode, RiskLevel, Severity},
    protocol::{ChatResponse, LookupResult, MappingReply, QaReply},
};

pub const EMPTY_CELL: &str = "—";
pub const NO_EXACT_RESULTS: &str = "No exact results.";
pub const NO_SEMANTIC_SUGGESTIONS: &str = "No semantic suggestions.";
pub const NO_NIST_MATCHES: &str = "No NIST matches.";
pub const NO_MITRE_MATCHES: &str = "No MITRE matches.";
pub const NO_FINDINGS: &str = "No findings.";

const SCORE_BAR_WIDTH: usize = 20;

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|value| !value.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRow {
    pub headline: String,
    pub detail: Option<String>,
    pub score: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListSection {
    pub title: &'static str,
    pub rows: Vec<ListRow>,
    pub empty_text: &'static str,
}

impl fmt::Display for ListSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.title)?;
        if self.rows.is_empty() {
            return writeln!(f, "  {}", self.empty_text);
        }
        for row in &self.rows {
            writeln!(f, "  {}", row.headline)?;
            match (&row.detail, &row.score) {
                (Some(detail), Some(score)) => writeln!(f, "    {detail} • score: {score}")?,
                (Some(detail), None) => writeln!(f, "    {detail}")?,
                (None, Some(score)) => writeln!(f, "    score: {score}")?,
                (None, None) => {}
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupView {
    pub header: String,
    pub exact: ListSection,
    pub semantic: ListSection,
}

pub fn render_lookup(result: &LookupResult) -> LookupView {
    let fallback_name = match result.mode {
        LookupMode::Technique => "Technique",
        LookupMode::Nist => "Control",
    };
    let header = format!(
        "{} — {}",
        non_empty(result.header.id.as_ref()).unwrap_or("?"),
        non_empty(result.header.name.as_ref()).unwrap_or(fallback_name)
    );

    let exact = result
        .exact
        .iter()
        .map(|row| ListRow {
            headline: format!(
                "{} — {}",
                non_empty(row.control_id.as_ref())
                    .or(non_empty(row.attack_id.as_ref()))
                    .unwrap_or(EMPTY_CELL),
                non_empty(row.control_name.as_ref())
                    .or(non_empty(row.attack_name.as_ref()))
                    .unwrap_or(EMPTY_CELL)
            ),
            detail: non_empty(row.mapping_type.as_ref()).map(str::to_owned),
            score: None,
        })
        .collect();

    let semantic = result
        .semantic
        .iter()
        .map(|row| ListRow {
            headline: format!(
                "{} — {}",
                row.id,
                non_empty(row.name.as_ref()).unwrap_or(EMPTY_CELL)
            ),
            detail: None,
            score: row.score.map(|score| format!("{score:.3}")),
        })
        .collect();

    LookupView {
        header,
        exact: ListSection {
            title: "Exact mappings",
            rows: exact,
            empty_text: NO_EXACT_RESULTS,
        },
        semantic: ListSection {
            title: "Semantic suggestions",
            rows: semantic,
            empty_text: NO_SEMANTIC_SUGGESTIONS,
        },
    }
}

impl fmt::Display for LookupView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.header)?;
        writeln!(f)?;
        write!(f, "{}", self.exact)?;
        writeln!(f)?;
        write!(f, "{}", self.semantic)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindingView {
    pub title: String,
    pub severity: Severity,
    pub score: String,
    pub description: String,
    pub remediation: String,
    pub refs: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditReport {
    pub score: String,
    pub percent: u8,
    pub risk_level: RiskLevel,
    pub summary: String,
    pub findings: Vec<FindingView>,
}

pub fn score_percent(score: f64) -> u8 {
    if !score.is_finite() {
        return 0;
    }
    (score.clamp(0.0, 1.0) * 100.0).round() as u8
}

pub fn render_audit(result: &AuditResult) -> AuditReport {
    AuditReport {
        score: format!("{:.3}", result.overall_score),
        percent: score_percent(result.overall_score),
        risk_level: result.risk_level,
        summary: result.summary.clone(),
        findings: result
            .findings
            .iter()
            .map(|finding| FindingView {
                title: finding.title.clone(),
                severity: finding.severity,
                score: format!("{:.2}", finding.score),
                description: finding.description.clone(),
                remediation: finding.remediation.clone(),
                refs: (!finding.standard_refs.is_empty())
                    .then(|| finding.standard_refs.join(", ")),
            })
            .collect(),
    }
}

impl fmt::Display for AuditReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let filled = usize::from(self.percent) * SCORE_BAR_WIDTH / 100;
        writeln!(f, "Overall score: {} ({})", self.score, self.risk_level)?;
        writeln!(
            f,
            "[{}{}] {}%",
            "#".repeat(filled),
            ".".repeat(SCORE_BAR_WIDTH - filled),
            self.percent
        )?;
        writeln!(f, "{}", self.summary)?;
        writeln!(f)?;
        writeln!(f, "Findings")?;
        if self.findings.is_empty() {
            return writeln!(f, "  {NO_FINDINGS}");
        }
        for finding in &self.findings {
            writeln!(
                f,
                "  {} [{} • {}]",
                finding.title, finding.severity, finding.score
            )?;
            if !finding.description.is_empty() {
                writeln!(f, "    {}", finding.description)?;
            }
            writeln!(f, "    Remediation: {}", finding.remediation)?;
            if let Some(refs) = &finding.refs {
                writeln!(f, "    Refs: {refs}")?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingTableRow {
    pub label: String,
    pub description: String,
    pub score: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingTable {
    pub direction: String,
    pub rows: Vec<MappingTableRow>,
}

fn render_mapping(reply: &MappingReply) -> MappingTable {
    MappingTable {
        direction: reply.direction.clone(),
        rows: reply
            .matches
            .iter()
            .map(|m| {
                let id = non_empty(m.control_id.as_ref())
                    .or(non_empty(m.technique_id.as_ref()))
                    .unwrap_or(EMPTY_CELL);
                let label = match non_empty(m.name.as_ref()) {
                    Some(name) => format!("{id} — {name}"),
                    None => id.to_string(),
                };
                MappingTableRow {
                    label,
                    description: m
                        .description
                        .clone()
                        .unwrap_or_else(|| EMPTY_CELL.to_string()),
                    score: m
                        .score
                        .map(|score| format!("{score:.2}"))
                        .unwrap_or_else(|| EMPTY_CELL.to_string()),
                }
            })
            .collect(),
    }
}

impl fmt::Display for MappingTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.direction)?;
        writeln!(f, "ID / Name | Description | Score")?;
        for row in &self.rows {
            writeln!(f, "{} | {} | {}", row.label, row.description, row.score)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidatePanels {
    pub answer: String,
    pub nist: ListSection,
    pub mitre: ListSection,
}

fn render_qa(reply: &QaReply) -> CandidatePanels {
    let nist = reply
        .nist_candidates
        .iter()
        .map(|c| ListRow {
            headline: format!("{} — {}", c.control_id, c.description),
            detail: Some(format!(
                "family: {}",
                non_empty(c.family.as_ref()).unwrap_or(EMPTY_CELL)
            )),
            score: Some(format!("{:.2}", c.score)),
        })
        .collect();
    let mitre = reply
        .mitre_candidates
        .iter()
        .map(|c| ListRow {
            headline: format!("{} — {}", c.technique_id, c.name),
            detail: Some(format!(
                "tactics: {}",
                if c.tactics.is_empty() {
                    EMPTY_CELL.to_string()
                } else {
                    c.tactics.join(", ")
                }
            )),
            score: Some(format!("{:.2}", c.score)),
        })
        .collect();

    CandidatePanels {
        answer: reply.answer.clone(),
        nist: ListSection {
            title: "NIST candidates",
            rows: nist,
            empty_text: NO_NIST_MATCHES,
        },
        mitre: ListSection {
            title: "MITRE candidates",
            rows: mitre,
            empty_text: NO_MITRE_MATCHES,
        },
    }
}

impl fmt::Display for CandidatePanels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.answer)?;
        writeln!(f)?;
        write!(f, "{}", self.nist)?;
        writeln!(f)?;
        write!(f, "{}", self.mitre)
    }
}

pub fn unrecognized_message(kind: Option<&str>) -> String {
    match kind {
        Some(kind) => format!("Unrecognized response shape (type \"{kind}\")"),
        None => "Unrecognized response shape (missing type)".to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatView {
    Mapping(MappingTable),
    Qa(CandidatePanels),
    Audit(AuditReport),
    Unrecognized(String),
}

pub fn dispatch(response: &ChatResponse) -> ChatView {
    match response {
        ChatResponse::Mapping(reply) => ChatView::Mapping(render_mapping(reply)),
        ChatResponse::Qa(reply) => ChatView::Qa(render_qa(reply)),
        ChatResponse::AuditResult(result) => ChatView::Audit(render_audit(result)),
        ChatResponse::Unrecognized { kind } => {
            ChatView::Unrecognized(unrecognized_message(kind.as_deref()))
        }
    }
}

impl fmt::Display for ChatView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatView::Mapping(table) => write!(f, "{table}"),
            ChatView::Qa(panels) => write!(f, "{panels}"),
            ChatView::Audit(report) => write!(f, "{report}"),
            ChatView::Unrecognized(message) => writeln!(f, "{message}"),
        }
    }
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
