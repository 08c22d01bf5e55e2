use policygap_core::citations::model::VerifyError;
use policygap_core::documents::extract::PlainTextExtractor;
use policygap_core::documents::model::ExtractedDocument;
use policygap_core::documents::windower::WindowParams;
use policygap_core::evidence::logs::CsvLogLoader;
use policygap_core::oracle::scripted::ScriptedOracle;
use policygap_core::policy::index::PolicyIndex;
use policygap_core::report::render::{render_report_json, render_report_markdown};
use policygap_core::run::config::RunConfig;
use policygap_core::run::manager::PipelineRunner;
use policygap_core::run::selection::SelectionBasis;
use policygap_core::run::state::{ComparisonMode, Confidence, PipelineState};
use serde_json::json;
use std::collections::BTreeMap;

const CIS_TEXT: &str = "CIS Controls Baseline
Account Management
Lock accounts after 5 failed logon attempts.
Require multi-factor authentication for remote access.
Review privileged accounts quarterly.
";

const PAN_TEXT: &str = "Pan User Account Policy
Users must choose a password of at least 8 characters.
Passwords expire every 90 days.
";

const SUMMARY: &str =
    "Observed 37 events with ID 4625 from 10.0.0.5 targeting user jdoe; consistent with brute force.";

#[test]
fn lockout_gap_is_verified_on_baseline_and_missing_on_target() {
    let dir = tempfile::tempdir().unwrap();
    let cis = dir.path().join("CIS_Controls.txt");
    let pan = dir.path().join("Pan User Account Policy.txt");
    std::fs::write(&cis, CIS_TEXT).unwrap();
    std::fs::write(&pan, PAN_TEXT).unwrap();
    let logs_dir = dir.path().join("logs");
    std::fs::create_dir(&logs_dir).unwrap();
    std::fs::write(
        logs_dir.join("security.csv"),
        "EventID,IpAddress,Account\n4625,10.0.0.5,jdoe\n4625,10.0.0.5,jdoe\n",
    )
    .unwrap();

    let cis_key = cis.to_string_lossy().to_string();
    let pan_key = pan.to_string_lossy().to_string();
    let mut cfg = RunConfig::new(
        "Brute force against Windows RDP",
        vec![pan_key.clone(), cis_key.clone()],
    );
    cfg.log_glob = logs_dir.join("*.csv").to_string_lossy().to_string();

    let compare = json!([
        {
            "gap": "No password lockout policy",
            "why": "Target never locks accounts after repeated failures.",
            "remediation": "Lock accounts after 5 failed attempts.",
            "cis_refs": [{
                "source": cis_key, "page": 1, "line_start": 1, "line_end": 5,
                "quote": "Lock accounts after 5 failed logon attempts."
            }],
            "pan_refs": []
        },
        {
            "gap": "MFA not required",
            "why": "Remote access relies on passwords only.",
            "remediation": "Require MFA.",
            "cis_refs": [{
                "source": cis_key, "page": 1, "line_start": 1, "line_end": 5,
                "quote": "Require MFA everywhere"
            }],
            "pan_refs": [{
                "source": pan_key, "page": 1, "line_start": 9, "line_end": 12,
                "quote": "anything"
            }]
        }
    ]);
    let oracle = ScriptedOracle::new(vec![
        SUMMARY.to_string(),
        format!("Pick these: {}", serde_json::to_string(&[&cis_key, &pan_key]).unwrap()),
        "CIS: lockout, MFA, privileged review.".to_string(),
        "Pan: password length and expiry only.".to_string(),
        format!("Here you go:\n{compare}\nLet me know."),
        json!([
            {"gap": "No password lockout policy", "evidence_linkage": "4625 burst from 10.0.0.5",
             "likely_impact": "account takeover", "confidence": "High"},
            {"gap": "MFA not required", "evidence_linkage": "n/a",
             "likely_impact": "credential reuse", "confidence": "very"}
        ])
        .to_string(),
        "# Post-incident review\nDone.".to_string(),
    ]);

    let runner = PipelineRunner::new(&oracle, &PlainTextExtractor, &CsvLogLoader, &cfg);
    let outcome = runner.run_config(&cfg).unwrap().unwrap();
    let state = &outcome.state;

    assert_eq!(oracle.remaining(), 0);
    assert!(state.evidence_plan.as_ref().unwrap().need_windows_logs);
    assert_eq!(state.logs.as_ref().unwrap().rows.len(), 2);
    assert!(state.logs_text.as_ref().unwrap().contains("source_file="));
    assert_eq!(state.evidence_signal.as_ref().unwrap().event_ids.get("4625"), Some(&2));
    assert_eq!(state.required_controls.as_ref().unwrap().len(), 4);

    assert_eq!(state.baseline_policy.as_deref(), Some(cis_key.as_str()));
    assert_eq!(state.target_policy.as_deref(), Some(pan_key.as_str()));
    assert_eq!(state.selection_basis, Some(SelectionBasis::NameMatched));
    assert_eq!(state.comparison_mode, Some(ComparisonMode::Snippets));

    let gaps = state.policy_gaps_structured.as_ref().unwrap();
    assert_eq!(gaps.len(), 2);
    assert_eq!(gaps[0].title, "No password lockout policy");
    assert!(gaps[0].verified);
    assert_eq!(gaps[0].refs.baseline[0].line_numbers, vec![1, 2, 3, 4, 5]);
    assert!(gaps[0].refs.target.is_empty());

    assert!(!gaps[1].verified);
    assert_eq!(
        gaps[1].refs.baseline[0].verify_error,
        Some(VerifyError::QuoteNotInSnippet)
    );
    assert_eq!(gaps[1].refs.baseline[0].line_numbers, vec![1, 2, 3, 4, 5]);
    assert_eq!(
        gaps[1].refs.target[0].verify_error,
        Some(VerifyError::NoMatchingSnippet)
    );
    assert!(gaps[1].refs.target[0].line_numbers.is_empty());

    let bullets = state.policy_gaps.as_ref().unwrap();
    assert!(bullets.contains(&format!("Policy A ({cis_key}) lines: 1–5")));
    assert!(bullets.contains(&format!("Policy B ({pan_key}) lines: missing")));

    let links = state.gaps_evidence_link_structured.as_ref().unwrap();
    assert_eq!(links[0].confidence, Confidence::High);
    assert_eq!(links[1].confidence, Confidence::Unknown);
    assert!(state.citations_block.as_ref().unwrap().contains("_none_"));
    assert_eq!(
        state.final_report.as_deref(),
        Some("# Post-incident review\nDone.")
    );

    let prompts = oracle.prompts();
    assert!(prompts[4].contains("Lock accounts after 5 failed logon attempts."));
    assert!(prompts[4].contains("Account lockout threshold"));
    assert!(prompts[6].contains("_none_"));

    let journal = &outcome.journal;
    journal.verify_chain().unwrap();
    assert_eq!(journal.count_of("RUN_STARTED"), 1);
    assert_eq!(journal.count_of("STAGE_COMPLETED"), 9);
    assert_eq!(journal.count_of("STAGE_SKIPPED"), 0);
    assert_eq!(journal.count_of("ORACLE_CALL_COMPLETED"), 7);
    assert_eq!(journal.count_of("CITATION_UNVERIFIED"), 2);
    assert_eq!(journal.count_of("RUN_FINALIZED"), 1);
    let last = journal.events().last().unwrap();
    assert_eq!(last.details["gap_count"], json!(2));
    assert_eq!(last.details["verified_gap_count"], json!(1));

    let md = render_report_markdown(state);
    assert!(md.contains("- Gaps: 2 (1 verified)"));
    assert!(md.contains("| No password lockout policy | 1–5 | missing | verified | - |"));
    let js = render_report_json(state).unwrap();
    assert!(js.starts_with("{\"baseline_policy\":"));
}

#[test]
fn summary_fallback_resolves_hints_in_full_text() {
    let a_text = "Password Policy\nPasswords need 14 characters.\nLock accounts after 5 failed attempts.\n";
    let b_text = "Office plants must be watered weekly.\n";
    let docs = vec![
        ExtractedDocument::from_text("a.txt", a_text),
        ExtractedDocument::from_text("b.txt", b_text),
    ];
    let index = PolicyIndex::build(&docs, &WindowParams::default());
    let texts: BTreeMap<String, String> = docs
        .iter()
        .map(|d| (d.source.clone(), d.text.clone()))
        .collect();

    let mut cfg = RunConfig::new("phishing", vec!["a.txt".to_string(), "b.txt".to_string()]);
    cfg.log_glob = "no/such/dir/*.csv".to_string();
    cfg.selected_policy_paths = Some(vec!["a.txt".to_string(), "b.txt".to_string()]);
    let state = PipelineState::from_config(&cfg).with_prebuilt_policies(index, texts);

    let oracle = ScriptedOracle::new(vec![
        "Nothing notable in the logs.",
        "A: passwords and lockout.",
        "B: no security controls.",
        r#"[{"gap": "No lockout", "why": "w", "remediation": "r",
             "refs": {"policy_a": [{"line_hint": "Lock accounts after 5 failed attempts"}],
                      "policy_b": []}}]"#,
        r#"[{"gap": "No lockout", "evidence_linkage": "none", "likely_impact": "low", "confidence": "low"}]"#,
        "report",
    ]);
    let runner = PipelineRunner::new(&oracle, &PlainTextExtractor, &CsvLogLoader, &cfg);
    let outcome = runner.run(state).unwrap();
    let state = &outcome.state;

    assert_eq!(state.logs_text.as_deref(), Some("NO_LOGS_FOUND"));
    assert_eq!(state.selection_basis, Some(SelectionBasis::Preselected));
    assert_eq!(state.comparison_mode, Some(ComparisonMode::Summaries));
    assert!(state.policy_snippets.as_ref().unwrap()["b.txt"].is_empty());

    let gap = &state.policy_gaps_structured.as_ref().unwrap()[0];
    assert_eq!(gap.refs.baseline[0].line_numbers, vec![3]);
    assert!(gap.refs.target.is_empty());
    assert!(!gap.verified);

    assert_eq!(outcome.journal.count_of("STAGE_SKIPPED"), 2);
    assert_eq!(outcome.journal.count_of("STAGE_COMPLETED"), 7);
    assert_eq!(oracle.remaining(), 0);
}
