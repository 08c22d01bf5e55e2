use policygap_core::audit::event::{finalize_event, JournalEvent, ZERO_HASH_64};
use policygap_core::audit::log::RunJournal;
use policygap_core::determinism::json_canonical::to_canonical_bytes;
use policygap_core::determinism::run_id::run_id_from_fingerprint_hex32;
use serde_json::json;

#[test]
fn canonical_json_is_stable_for_key_order() {
    let a = json!({"b": 1, "a": {"y": 2, "x": 3}});
    let b = json!({"a": {"x": 3, "y": 2}, "b": 1});
    assert_eq!(to_canonical_bytes(&a).unwrap(), to_canonical_bytes(&b).unwrap());
}

#[test]
fn event_hash_is_stable() {
    let ev = JournalEvent {
        ts_utc: "2026-02-10T00:00:00Z".to_string(),
        event_type: "STAGE_COMPLETED".to_string(),
        run_id: "r_aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa".to_string(),
        details: json!({"stage": "load_logs", "fields_written": ["logs", "logs_text"]}),
        prev_event_hash: ZERO_HASH_64.to_string(),
        event_hash: String::new(),
    };
    let a = finalize_event(ev.clone()).unwrap().event_hash;
    let b = finalize_event(ev).unwrap().event_hash;
    assert_eq!(a, b);
    assert_eq!(a.len(), 64);
}

#[test]
fn unknown_event_types_and_missing_details_are_rejected() {
    let mut journal = RunJournal::new("r_test");
    assert!(journal.record("RUN_CREATED", json!({})).is_err());
    assert!(journal.record("STAGE_SKIPPED", json!({"stage": "select_policies"})).is_err());
    assert!(journal.events().is_empty());
}

#[test]
fn edited_history_cannot_reproduce_original_hashes() {
    let mut journal = RunJournal::new("r_test");
    journal
        .record("STAGE_STARTED", json!({"stage": "plan_evidence"}))
        .unwrap();
    journal
        .record(
            "STAGE_COMPLETED",
            json!({"stage": "plan_evidence", "fields_written": ["evidence_plan"]}),
        )
        .unwrap();
    journal.verify_chain().unwrap();
    assert_eq!(journal.events()[1].prev_event_hash, journal.events()[0].event_hash);

    let jsonl = journal.to_jsonl().unwrap();
    assert_eq!(jsonl.lines().count(), 2);

    let mut events: Vec<JournalEvent> = jsonl
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    events[0].details = json!({"stage": "load_logs"});
    let mut forged = RunJournal::new("r_test");
    for e in events {
        forged.append(e).unwrap();
    }
    // Re-appending rehashes, so the forged journal is internally consistent
    // but diverges from the original.
    forged.verify_chain().unwrap();
    assert_ne!(
        forged.events()[1].event_hash,
        journal.events()[1].event_hash
    );
}

#[test]
fn deterministic_run_id_rule() {
    let fp = "1234567890ABCDEF1234567890abcdef9999";
    let run = run_id_from_fingerprint_hex32(fp).unwrap();
    assert_eq!(run, "r_1234567890abcdef1234567890abcdef");
    assert!(run_id_from_fingerprint_hex32("zz34567890abcdef1234567890abcdef").is_err());
}
