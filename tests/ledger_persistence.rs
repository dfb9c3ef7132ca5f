use contract_sweeper::error::LedgerError;
use contract_sweeper::storage::ledger::Ledger;
use std::fs;
use tempfile::TempDir;

#[test]
fn reload_sees_every_recorded_address() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("history.json");

    let mut ledger = Ledger::load(&path).expect("fresh ledger");
    assert!(path.exists(), "missing ledger is created on load");
    assert!(ledger.record("0xABC0000000000000000000000000000000000001", false).expect("record"));
    assert!(ledger.record("0xdef0000000000000000000000000000000000002", true).expect("record"));

    let reloaded = Ledger::load(&path).expect("reload");
    assert_eq!(reloaded.snapshot(), ledger.snapshot());
    assert_eq!(
        reloaded.get("0xabc0000000000000000000000000000000000001"),
        Some(false)
    );
    assert_eq!(reloaded.contract_count(), 1);
}

#[test]
fn restart_never_rerecords_known_addresses() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("history.json");
    fs::write(
        &path,
        r#"{"0xdef0000000000000000000000000000000000002": true}"#,
    )
    .expect("seed ledger");

    let mut ledger = Ledger::load(&path).expect("load");
    let before = fs::read_to_string(&path).expect("read");
    assert!(!ledger
        .record("0xdef0000000000000000000000000000000000002", false)
        .expect("record"));
    assert_eq!(ledger.get("0xdef0000000000000000000000000000000000002"), Some(true));
    assert_eq!(fs::read_to_string(&path).expect("read"), before);
}

#[test]
fn empty_file_loads_and_garbage_is_rejected() {
    let dir = TempDir::new().expect("tempdir");
    let empty = dir.path().join("empty.json");
    fs::write(&empty, "").expect("write");
    assert!(Ledger::load(&empty).expect("empty loads").is_empty());

    let garbage = dir.path().join("garbage.json");
    fs::write(&garbage, "[1, 2, 3]").expect("write");
    assert!(matches!(
        Ledger::load(&garbage),
        Err(LedgerError::Malformed { .. })
    ));
}

#[test]
fn persisted_file_is_a_flat_json_object() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("history.json");
    let mut ledger = Ledger::load(&path).expect("load");
    ledger
        .record("0x1110000000000000000000000000000000000003", true)
        .expect("record");

    let raw = fs::read_to_string(&path).expect("read");
    let parsed: serde_json::Value = serde_json::from_str(&raw).expect("json");
    assert_eq!(
        parsed,
        serde_json::json!({"0x1110000000000000000000000000000000000003": true})
    );
    assert!(!dir.path().join("history.json.tmp").exists());
}
