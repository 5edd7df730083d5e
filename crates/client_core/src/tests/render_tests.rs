use serde_json::json;
use shared::{
    audit::Finding,
    protocol::{LookupHeader, MappingMatch, MappingRow, MitreCandidate, NistCandidate, ScoredMatch},
};

use super::*;

fn finding(title: &str, refs: &[&str]) -> Finding {
    Finding {
        id: title.to_uppercase(),
        title: title.to_string(),
        severity: Severity::Medium,
        score: 0.5,
        description: String::new(),
        remediation: "Tighten it.".to_string(),
        standard_refs: refs.iter().map(|r| r.to_string()).collect(),
    }
}

#[test]
fn lookup_header_falls_back_per_mode() {
    let result = LookupResult {
        mode: LookupMode::Nist,
        header: LookupHeader {
            id: Some("AC-2".into()),
            name: None,
        },
        exact: Vec::new(),
        semantic: Vec::new(),
    };
    let view = render_lookup(&result);
    assert_eq!(view.header, "AC-2 — Control");

    let text = view.to_string();
    assert!(text.contains(NO_EXACT_RESULTS));
    assert!(text.contains(NO_SEMANTIC_SUGGESTIONS));

    let view = render_lookup(&LookupResult {
        mode: LookupMode::Technique,
        header: LookupHeader::default(),
        ..result
    });
    assert_eq!(view.header, "? — Technique");
}

#[test]
fn exact_rows_use_whichever_side_is_present() {
    let result = LookupResult {
        mode: LookupMode::Nist,
        header: LookupHeader::default(),
        exact: vec![
            MappingRow {
                attack_id: Some("T1078".into()),
                attack_name: Some("Valid Accounts".into()),
                ..MappingRow::default()
            },
            MappingRow::default(),
        ],
        semantic: vec![ScoredMatch {
            id: "T1110".into(),
            name: None,
            score: Some(0.61234),
        }],
    };
    let view = render_lookup(&result);
    assert_eq!(view.exact.rows[0].headline, "T1078 — Valid Accounts");
    assert_eq!(view.exact.rows[0].detail, None);
    assert_eq!(view.exact.rows[1].headline, "— — —");
    assert_eq!(view.semantic.rows[0].headline, "T1110 — —");
    assert_eq!(view.semantic.rows[0].score.as_deref(), Some("0.612"));
}

#[test]
fn score_percent_rounds_and_clamps() {
    assert_eq!(score_percent(0.23), 23);
    assert_eq!(score_percent(0.236), 24);
    assert_eq!(score_percent(1.7), 100);
    assert_eq!(score_percent(-0.2), 0);
    assert_eq!(score_percent(f64::NAN), 0);
}

#[test]
fn audit_report_omits_refs_line_when_empty() {
    let result = AuditResult {
        overall_score: 0.5,
        risk_level: RiskLevel::Elevated,
        summary: "Overall risk: elevated.".into(),
        findings: vec![
            finding("lockout", &["CIS 5.2", "NIST AC-7"]),
            finding("history", &[]),
        ],
    };
    let report = render_audit(&result);
    assert_eq!(report.score, "0.500");
    assert_eq!(report.findings[0].refs.as_deref(), Some("CIS 5.2, NIST AC-7"));
    assert_eq!(report.findings[0].score, "0.50");

    let text = report.to_string();
    assert!(text.contains("[##########..........] 50%"));
    assert!(text.contains("Refs: CIS 5.2, NIST AC-7"));
    assert_eq!(text.matches("Refs:").count(), 1);
    assert!(text.contains("Overall score: 0.500 (elevated)"));
}

#[test]
fn mapping_rows_fill_missing_cells() {
    let reply = MappingReply {
        direction: "NIST→MITRE".into(),
        query: json!({"control_id": "AC-2"}),
        matches: vec![
            MappingMatch {
                technique_id: Some("T1078".into()),
                name: Some("Valid Accounts".into()),
                score: Some(0.456),
                ..MappingMatch::default()
            },
            MappingMatch::default(),
        ],
    };
    let ChatView::Mapping(table) = dispatch(&ChatResponse::Mapping(reply)) else {
        panic!("expected mapping view");
    };
    assert_eq!(table.rows[0].label, "T1078 — Valid Accounts");
    assert_eq!(table.rows[0].description, EMPTY_CELL);
    assert_eq!(table.rows[0].score, "0.46");
    assert_eq!(table.rows[1].label, EMPTY_CELL);
    assert_eq!(table.rows[1].score, EMPTY_CELL);
}

#[test]
fn qa_panels_show_family_and_tactics() {
    let reply = QaReply {
        answer: "Closest references in NIST and MITRE:".into(),
        nist_candidates: vec![NistCandidate {
            control_id: "IA-2".into(),
            description: "Identification and Authentication".into(),
            family: Some("IA".into()),
            score: 0.9,
        }],
        mitre_candidates: vec![MitreCandidate {
            technique_id: "T1110".into(),
            name: "Brute Force".into(),
            tactics: vec!["credential-access".into(), "initial-access".into()],
            score: 0.7,
        }],
    };
    let ChatView::Qa(panels) = dispatch(&ChatResponse::Qa(reply)) else {
        panic!("expected qa view");
    };
    assert_eq!(panels.nist.rows[0].detail.as_deref(), Some("family: IA"));
    assert_eq!(panels.nist.rows[0].score.as_deref(), Some("0.90"));
    assert_eq!(
        panels.mitre.rows[0].detail.as_deref(),
        Some("tactics: credential-access, initial-access")
    );
}

#[test]
fn unrecognized_shapes_name_their_discriminant() {
    assert_eq!(
        dispatch(&ChatResponse::Unrecognized { kind: None }),
        ChatView::Unrecognized("Unrecognized response shape (missing type)".into())
    );
    let view = dispatch(&ChatResponse::Unrecognized {
        kind: Some("stream".into()),
    });
    assert_eq!(
        view.to_string(),
        "Unrecognized response shape (type \"stream\")\n"
    );
}
