use policygap_core::evidence::heuristics::{extract_required_controls, render_required_controls};
use policygap_core::evidence::logs::{load_logs, CsvLogLoader, LogLoader, NO_LOGS_FOUND};
use policygap_core::evidence::signals::{derive_signals, EvidenceSignal};

#[test]
fn failed_logons_and_brute_force_yield_four_distinct_controls() {
    let controls = extract_required_controls(
        "Observed 4625 events consistent with brute force.",
        &EvidenceSignal::default(),
    );
    let names: Vec<&str> = controls.iter().map(|c| c.control.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "Account lockout threshold",
            "Failed logon alerting",
            "Multi-factor authentication",
            "Source IP rate limiting",
        ]
    );
    let rendered = render_required_controls(&controls);
    assert_eq!(rendered.matches("Account lockout threshold").count(), 1);
}

#[test]
fn triggers_are_case_insensitive_and_order_is_stable() {
    let summary = "RDP sessions by an ADMINISTRATOR after a Password Spray";
    let a = extract_required_controls(summary, &EvidenceSignal::default());
    let b = extract_required_controls(summary, &EvidenceSignal::default());
    assert_eq!(a, b);
    let names: Vec<&str> = a.iter().map(|c| c.control.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "Account lockout threshold",
            "Multi-factor authentication",
            "Source IP rate limiting",
            "Remote access hardening",
            "Privileged account restrictions",
        ]
    );
    assert_eq!(render_required_controls(&[]), "- (none derived from evidence)");
}

#[test]
fn log_event_ids_drive_controls_when_the_summary_is_vague() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("sec.csv"),
        "EventID,IpAddress\n4625,10.0.0.5\n4625,10.0.0.5\n4625,10.0.0.5\n",
    )
    .unwrap();
    let pattern = dir.path().join("*.csv").to_string_lossy().to_string();
    let table = load_logs(&pattern).unwrap();
    let signal = derive_signals(&table.render_for_prompt(200)).unwrap();
    assert_eq!(signal.event_ids.get("4625"), Some(&3));

    let summary = "Several events from one host.";
    assert!(extract_required_controls(summary, &EvidenceSignal::default()).is_empty());
    let controls = extract_required_controls(summary, &signal);
    let names: Vec<&str> = controls.iter().map(|c| c.control.as_str()).collect();
    assert_eq!(names, vec!["Account lockout threshold", "Failed logon alerting"]);
}

#[test]
fn signals_ignore_embedded_ids_and_invalid_addresses() {
    let s = derive_signals("id 46250 from 300.1.1.1; 4740 from 192.168.1.20; invalid user root").unwrap();
    assert!(s.event_ids.get("4625").is_none());
    assert_eq!(s.event_ids.get("4740"), Some(&1));
    assert_eq!(s.ip_addresses.iter().collect::<Vec<_>>(), vec!["192.168.1.20"]);
    assert_eq!(s.keyword_counts.get("invalid user"), Some(&1));
    assert!(s.render().contains("Source IPs: 192.168.1.20"));
    assert_eq!(derive_signals("").unwrap().render(), "No indicators derived.");
}

#[test]
fn csv_files_are_merged_with_source_column() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.csv"), "EventID,Account\n4625,jdoe\n").unwrap();
    std::fs::write(dir.path().join("b.csv"), "EventID,IpAddress\n4740,10.0.0.9\n").unwrap();
    std::fs::write(dir.path().join("notes.txt"), "not a log").unwrap();
    std::fs::write(dir.path().join("bad.csv"), b"\xff\xfe,\xfd\n1,2\n").unwrap();

    let pattern = dir.path().join("*.csv").to_string_lossy().to_string();
    let table = CsvLogLoader.load(&pattern).unwrap();

    assert_eq!(table.rows.len(), 2);
    assert_eq!(table.columns, vec!["EventID", "Account", "IpAddress", "source_file"]);
    assert!(table.rows[0]["source_file"].ends_with("a.csv"));
    assert_eq!(table.skipped.len(), 1);
    assert!(table.skipped[0].path.ends_with("bad.csv"));

    let text = table.render_for_prompt(1);
    assert_eq!(text.lines().count(), 1);
    assert!(text.starts_with("EventID=4625; Account=jdoe; IpAddress=; source_file="));
}

#[test]
fn missing_directory_is_an_empty_table() {
    let dir = tempfile::tempdir().unwrap();
    let pattern = dir.path().join("absent").join("*.csv").to_string_lossy().to_string();
    let table = load_logs(&pattern).unwrap();
    assert!(table.is_empty());
    assert_eq!(table.render_for_prompt(10), NO_LOGS_FOUND);
}

#[test]
fn directory_wildcards_and_character_classes_match() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("host1")).unwrap();
    std::fs::create_dir(dir.path().join("host2")).unwrap();
    std::fs::write(dir.path().join("host1").join("sec.csv"), "EventID\n4625\n").unwrap();
    std::fs::write(dir.path().join("host2").join("sec.csv"), "EventID\n4740\n").unwrap();
    std::fs::write(dir.path().join("sec1.csv"), "EventID\n4624\n").unwrap();
    std::fs::write(dir.path().join("secA.csv"), "EventID\n4672\n").unwrap();

    let nested = dir.path().join("*").join("sec.csv").to_string_lossy().to_string();
    let table = load_logs(&nested).unwrap();
    let ids: Vec<&str> = table.rows.iter().map(|r| r["EventID"].as_str()).collect();
    assert_eq!(ids, vec!["4625", "4740"]);
    assert!(table.rows[0]["source_file"].contains("host1"));

    let classed = dir.path().join("sec[0-9].csv").to_string_lossy().to_string();
    let table = load_logs(&classed).unwrap();
    assert_eq!(table.rows.len(), 1);
    assert_eq!(table.rows[0]["EventID"], "4624");
}

#[test]
fn malformed_pattern_is_an_empty_table() {
    let table = CsvLogLoader.load("logs/[.csv").unwrap();
    assert!(table.is_empty());
    assert_eq!(table.render_for_prompt(10), NO_LOGS_FOUND);
}
