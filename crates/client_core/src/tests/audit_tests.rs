use serde_json::json;
use shared::domain::{RiskLevel, Severity};

use super::*;
use crate::{
    render::render_audit,
    test_support::{spawn_mapper_server, wait_until, weak_policy_result, GatedTransport},
};

fn low_risk_result() -> serde_json::Value {
    json!({
        "overall_score": 1.0,
        "risk_level": "low",
        "summary": "Overall risk: low. Top issues: No material issues.",
        "findings": []
    })
}

async fn weaken(form: &AuditFormModel) {
    form.set_number(NumericField::MinLength, "4").await;
    form.set_toggle(ToggleField::RequireUpper, false).await;
    for factor in [
        ToggleField::Sms,
        ToggleField::TotpApp,
        ToggleField::Fido2Webauthn,
        ToggleField::PushApproval,
        ToggleField::EmailOtp,
    ] {
        form.set_toggle(factor, false).await;
    }
}

#[tokio::test]
async fn weak_policy_scores_high_risk() {
    let (_, client) = spawn_mapper_server().await;
    let form = AuditFormModel::new(Arc::new(client));
    weaken(&form).await;

    let result = form.submit().await.expect("audit");
    assert_eq!(result.risk_level, RiskLevel::High);
    assert!(result
        .findings
        .iter()
        .any(|finding| finding.severity == Severity::Critical));

    let snapshot = form.snapshot().await;
    assert!(!snapshot.loading);
    assert_eq!(snapshot.error, None);
    assert_eq!(snapshot.result.as_ref(), Some(&result));

    let report = render_audit(&result);
    assert_eq!(report.percent, 23);
    assert_eq!(report.score, "0.230");
    assert_eq!(report.findings[0].refs.as_deref(), Some("NIST SP 800-63B §5.1.1.2"));
    assert_eq!(report.findings[1].refs, None);

    let text = report.to_string();
    assert!(text.contains("23%"));
    assert_eq!(text.matches("Refs:").count(), 1);
}

#[tokio::test]
async fn strong_defaults_come_back_clean() {
    let (_, client) = spawn_mapper_server().await;
    let form = AuditFormModel::new(Arc::new(client));

    let result = form.submit().await.expect("audit");
    assert_eq!(result.risk_level, RiskLevel::Low);
    assert!(render_audit(&result).to_string().contains("No findings."));
}

#[tokio::test]
async fn non_numeric_entry_is_forwarded_and_rejection_surfaced() {
    let (_, client) = spawn_mapper_server().await;
    let form = AuditFormModel::new(Arc::new(client));
    let payload = form.set_number(NumericField::MinLength, "twelve").await;
    assert!(payload.policy.min_length.value().is_nan());

    let err = form.submit().await.expect_err("server rejects null");
    assert_eq!(err.status(), Some(422));

    let snapshot = form.snapshot().await;
    assert_eq!(
        snapshot.error.as_deref(),
        Some("min_length must be an integer")
    );
    assert_eq!(snapshot.result, None);
    assert!(!snapshot.loading);
}

#[tokio::test]
async fn single_edit_leaves_every_sibling_untouched() {
    let form = AuditFormModel::new(GatedTransport::new());
    let before = form.payload().await;

    let after = form.set_number(NumericField::LockoutThreshold, "").await;
    assert_eq!(after.policy.lockout_threshold, FormNumber::new(0.0));

    let mut expected = before.clone();
    expected.policy.lockout_threshold = FormNumber::new(0.0);
    assert_eq!(after, expected);

    let after = form.set_environment(Environment::Staging).await;
    assert_eq!(after.environment, Environment::Staging);
    assert_eq!(after.policy, expected.policy);
    assert_eq!(after.mfa_factors, before.mfa_factors);
}

#[tokio::test]
async fn parsed_edits_apply_like_direct_setters() {
    let form = AuditFormModel::new(GatedTransport::new());
    let edit: AuditEdit = "required_for_admins=off".parse().expect("edit");
    let payload = form.apply(edit).await;
    assert!(!payload.mfa_enforcement.required_for_admins);
    assert!(payload.toggle(ToggleField::RequiredForAllUsers));
}

#[tokio::test(start_paused = true)]
async fn older_submit_cannot_overwrite_newer_result() {
    let transport = GatedTransport::new();
    let form = Arc::new(AuditFormModel::new(transport.clone()));

    let first = tokio::spawn({
        let form = Arc::clone(&form);
        async move { form.submit().await }
    });
    transport.wait_for_calls(1).await;

    form.set_number(NumericField::MinLength, "16").await;
    let second = tokio::spawn({
        let form = Arc::clone(&form);
        async move { form.submit().await }
    });
    transport.wait_for_calls(2).await;
    assert_eq!(
        transport.calls()[1].body.as_ref().expect("body")["policy"]["min_length"],
        json!(16)
    );

    transport.resolve(1, Ok(low_risk_result()));
    let newer = second.await.expect("join").expect("audit");
    assert_eq!(newer.risk_level, RiskLevel::Low);

    transport.resolve(0, Ok(weak_policy_result()));
    let older = first.await.expect("join").expect("audit");
    assert_eq!(older.risk_level, RiskLevel::High, "caller still sees its own outcome");

    wait_until(|| {
        let form = Arc::clone(&form);
        async move { !form.snapshot().await.loading }
    })
    .await;
    let snapshot = form.snapshot().await;
    assert_eq!(
        snapshot.result.map(|result| result.risk_level),
        Some(RiskLevel::Low)
    );
}

#[tokio::test(start_paused = true)]
async fn submit_marks_loading_and_clears_previous_error() {
    let transport = GatedTransport::new();
    let form = Arc::new(AuditFormModel::new(transport.clone()));

    let failing = tokio::spawn({
        let form = Arc::clone(&form);
        async move { form.submit().await }
    });
    transport.wait_for_calls(1).await;
    assert!(form.snapshot().await.loading);
    transport.resolve(
        0,
        Err(QueryError::Http {
            status: 500,
            body: "scoring backend down".into(),
        }),
    );
    let _ = failing.await.expect("join");
    assert_eq!(
        form.snapshot().await.error.as_deref(),
        Some("scoring backend down")
    );

    let retry = tokio::spawn({
        let form = Arc::clone(&form);
        async move { form.submit().await }
    });
    transport.wait_for_calls(2).await;
    let snapshot = form.snapshot().await;
    assert!(snapshot.loading);
    assert_eq!(snapshot.error, None);

    transport.resolve(1, Ok(low_risk_result()));
    retry.await.expect("join").expect("audit");
    assert!(form.snapshot().await.result.is_some());
}
