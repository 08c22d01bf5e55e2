use policygap_core::error::CoreError;
use policygap_core::run::config::RunConfig;

fn field_of(err: CoreError) -> String {
    match err {
        CoreError::SchemaValidationFailed { field, .. } => field,
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn missing_required_field_is_named() {
    let err = RunConfig::from_json_str(r#"{"policy_paths": ["a.txt"]}"#).unwrap_err();
    assert_eq!(field_of(err), "threat");
}

#[test]
fn unknown_field_is_named() {
    let err = RunConfig::from_json_str(
        r#"{"threat": "t", "policy_paths": ["a.txt"], "polcy_paths": []}"#,
    )
    .unwrap_err();
    assert_eq!(field_of(err), "polcy_paths");
}

#[test]
fn type_mismatch_is_attributed_to_root() {
    let err = RunConfig::from_json_str(r#"{"threat": 7, "policy_paths": []}"#).unwrap_err();
    assert_eq!(field_of(err), "<root>");
}

#[test]
fn semantic_checks_name_the_offending_field() {
    let cases = [
        (r#"{"threat": " ", "policy_paths": ["a"]}"#, "threat"),
        (r#"{"threat": "t", "policy_paths": []}"#, "policy_paths"),
        (r#"{"threat": "t", "policy_paths": ["a", ""]}"#, "policy_paths[1]"),
        (
            r#"{"threat": "t", "policy_paths": ["a"], "selected_policy_paths": ["a"]}"#,
            "selected_policy_paths",
        ),
        (
            r#"{"threat": "t", "policy_paths": ["a"], "selected_policy_paths": ["a", "a"]}"#,
            "selected_policy_paths",
        ),
        (r#"{"threat": "t", "policy_paths": ["a"], "max_policy_choices": 0}"#, "max_policy_choices"),
        (
            r#"{"threat": "t", "policy_paths": ["a"], "window": {"window_chars": 0}}"#,
            "window.window_chars",
        ),
        (r#"{"threat": "t", "policy_paths": ["a"], "fuzzy_cutoff": 1.5}"#, "fuzzy_cutoff"),
    ];
    for (raw, field) in cases {
        let err = RunConfig::from_json_str(raw).unwrap_err();
        assert_eq!(field_of(err), field, "config {raw}");
    }
}

#[test]
fn config_file_round_trips_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run.json");
    std::fs::write(
        &path,
        r#"{"threat": "brute force", "policy_paths": ["a.pdf", "b.pdf"],
            "selected_policy_paths": ["b.pdf", "a.pdf"], "window": {"overlap": 2}}"#,
    )
    .unwrap();
    let cfg = RunConfig::from_json_file(&path).unwrap();
    assert_eq!(cfg.window.overlap, 2);
    assert_eq!(cfg.window.window_chars, 600);
    assert_eq!(
        cfg.selected_policy_paths,
        Some(vec!["b.pdf".to_string(), "a.pdf".to_string()])
    );
    assert!(matches!(
        RunConfig::from_json_file(&dir.path().join("absent.json")),
        Err(CoreError::Io(_))
    ));
}
